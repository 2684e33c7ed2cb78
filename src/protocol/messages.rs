// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Wire messages of the host protocol.
//!
//! Commands arrive as `opcode(u8) oid(u8) arg_len(u8) args`; every command is answered by
//! exactly one response frame `kind(u8) oid(u8) payload_len(u16 BE) payload`. Poll samples
//! travel in unsolicited `poll_data` frames with the same response layout.

use crate::bus::BusError;
use crate::bytes::ByteBuf;
use crate::registry::attrs::AttrError;
use crate::registry::driver::DriverError;
use crate::registry::RegistryError;

/// Command opcodes (host → firmware).
pub mod opcode {
    pub const REGISTER_DRIVER: u8 = 0x01;
    pub const SET_ATTRIBUTE: u8 = 0x02;
    pub const CONFIG_DRIVER: u8 = 0x03;
    pub const QUERY_DRIVER: u8 = 0x04;
    pub const START_POLL: u8 = 0x05;
    pub const STOP_POLL: u8 = 0x06;
    pub const CLOSE_DRIVER: u8 = 0x07;
}

/// Response kinds (firmware → host).
pub mod kind {
    pub const OK: u8 = 0x80;
    pub const ERR: u8 = 0x81;
    pub const POLL_DATA: u8 = 0x82;
}

/// Error codes carried in `err` responses.
pub mod err_code {
    pub const UNKNOWN: u8 = 1;
    pub const ALREADY_REGISTERED: u8 = 2;
    pub const WRONG_STATE: u8 = 3;
    pub const NO_HOOK: u8 = 4;
    pub const BUS_TIMEOUT: u8 = 5;
    pub const BUS_NACK: u8 = 6;
    pub const BUS_ERROR: u8 = 7;
    pub const ATTRIBUTE_LOCKED: u8 = 8;
    pub const ATTRIBUTE_TYPE_ERROR: u8 = 9;
    pub const INIT_FAILED: u8 = 10;
    pub const INTERNAL: u8 = 255;
}

/// Value type tags in `set_attribute` arguments.
pub mod attr_type {
    pub const U64: u8 = 0;
    pub const I64: u8 = 1;
    pub const BOOL: u8 = 2;
    pub const BYTES: u8 = 3;
}

/// Upper bound of a command's argument field (`arg_len` is one byte).
pub const MAX_ARGS: usize = 255;
/// Largest response payload: a `poll_data` timestamp plus a full sample.
pub const MAX_PAYLOAD: usize = 68;
/// Error detail strings are short ASCII.
pub const MAX_DETAIL: usize = 64;
/// Encoded response frame: 4-byte header plus payload.
pub const MAX_FRAME: usize = MAX_PAYLOAD + 4;

/// A decoded command frame.
#[derive(Copy, Clone, Debug)]
pub struct CommandFrame {
    pub opcode: u8,
    pub oid: u8,
    pub args: ByteBuf<MAX_ARGS>,
}

/// One firmware → host frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Response {
    kind: u8,
    oid: u8,
    payload: ByteBuf<MAX_PAYLOAD>,
}

impl Response {
    /// `ok` with an empty payload.
    pub fn ok(oid: u8) -> Self {
        Self {
            kind: kind::OK,
            oid,
            payload: ByteBuf::new(),
        }
    }

    /// `ok` carrying driver-returned bytes.
    pub fn ok_with(oid: u8, bytes: &[u8]) -> Self {
        let mut payload = ByteBuf::new();
        payload.extend_from_slice(bytes);
        Self {
            kind: kind::OK,
            oid,
            payload,
        }
    }

    /// `err` with `code(u8) detail_len(u8) detail`.
    pub fn err(oid: u8, code: u8, detail: &[u8]) -> Self {
        let mut payload = ByteBuf::new();
        payload.push(code);
        payload.push(detail.len() as u8);
        payload.extend_from_slice(detail);
        Self {
            kind: kind::ERR,
            oid,
            payload,
        }
    }

    /// `poll_data` with `timestamp(u32 BE) sample`.
    pub fn poll_data(oid: u8, timestamp: u32, sample: &[u8]) -> Self {
        let mut payload = ByteBuf::new();
        payload.extend_from_slice(&timestamp.to_be_bytes());
        payload.extend_from_slice(sample);
        Self {
            kind: kind::POLL_DATA,
            oid,
            payload,
        }
    }

    pub fn kind(&self) -> u8 {
        self.kind
    }

    pub fn oid(&self) -> u8 {
        self.oid
    }

    pub fn payload(&self) -> &[u8] {
        self.payload.as_slice()
    }

    /// Error code of an `err` frame.
    pub fn err_code(&self) -> Option<u8> {
        if self.kind == kind::ERR {
            self.payload.as_slice().first().copied()
        } else {
            None
        }
    }

    /// Detail string of an `err` frame.
    pub fn err_detail(&self) -> Option<&[u8]> {
        if self.kind != kind::ERR {
            return None;
        }
        let payload = self.payload.as_slice();
        let len = *payload.get(1)? as usize;
        payload.get(2..2 + len)
    }

    /// Timestamp of a `poll_data` frame.
    pub fn timestamp(&self) -> Option<u32> {
        if self.kind != kind::POLL_DATA {
            return None;
        }
        let raw = self.payload.as_slice().get(..4)?;
        Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Sample bytes of a `poll_data` frame.
    pub fn sample(&self) -> Option<&[u8]> {
        if self.kind != kind::POLL_DATA {
            return None;
        }
        self.payload.as_slice().get(4..)
    }

    /// Serialize to the wire layout.
    pub fn encode(&self) -> ByteBuf<MAX_FRAME> {
        let mut out = ByteBuf::new();
        out.push(self.kind);
        out.push(self.oid);
        out.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        out.extend_from_slice(self.payload.as_slice());
        out
    }
}

/// Consumer of firmware → host frames (the transport output path).
pub trait FrameSink {
    fn emit(&mut self, frame: &Response);
}

impl<F: FnMut(&Response)> FrameSink for F {
    fn emit(&mut self, frame: &Response) {
        self(frame)
    }
}

/// Wire code for a failed Read/Poll hook.
fn hook_code(err: DriverError) -> u8 {
    match err {
        DriverError::Bus(BusError::Timeout) => err_code::BUS_TIMEOUT,
        DriverError::Bus(BusError::Nack) => err_code::BUS_NACK,
        DriverError::Bus(BusError::Fault) => err_code::BUS_ERROR,
        DriverError::Attr {
            err: AttrError::Locked,
            ..
        } => err_code::ATTRIBUTE_LOCKED,
        DriverError::Attr { .. } => err_code::ATTRIBUTE_TYPE_ERROR,
        DriverError::NoHook => err_code::NO_HOOK,
        DriverError::Failed(_) => err_code::INTERNAL,
    }
}

fn attr_code(err: AttrError, detail: &mut ByteBuf<MAX_DETAIL>) -> u8 {
    match err {
        AttrError::Locked => {
            detail.extend_from_slice(b"attr_locked");
            err_code::ATTRIBUTE_LOCKED
        }
        AttrError::TypeMismatch => {
            detail.extend_from_slice(b"attr_type");
            err_code::ATTRIBUTE_TYPE_ERROR
        }
        AttrError::Reserved => {
            detail.extend_from_slice(b"attr_reserved");
            err_code::ATTRIBUTE_TYPE_ERROR
        }
        AttrError::Missing => {
            detail.extend_from_slice(b"attr_missing");
            err_code::INTERNAL
        }
        AttrError::Full => {
            detail.extend_from_slice(b"attr_full");
            err_code::INTERNAL
        }
        AttrError::BadKey => {
            detail.extend_from_slice(b"attr_key");
            err_code::INTERNAL
        }
    }
}

/// Build the `err` response for a registry failure, using the narrowest wire code.
pub fn registry_err(oid: u8, err: RegistryError) -> Response {
    let mut detail = ByteBuf::<MAX_DETAIL>::new();
    let code = match err {
        RegistryError::OidOutOfRange => {
            detail.extend_from_slice(b"oid_range");
            err_code::UNKNOWN
        }
        RegistryError::Unknown => err_code::UNKNOWN,
        RegistryError::AlreadyRegistered => err_code::ALREADY_REGISTERED,
        RegistryError::WrongState => err_code::WRONG_STATE,
        RegistryError::NoPollHook => {
            detail.extend_from_slice(b"no_poll_hook");
            err_code::NO_HOOK
        }
        RegistryError::Attr(e) => attr_code(e, &mut detail),
        RegistryError::Init(e) => {
            e.write_detail(&mut detail);
            err_code::INIT_FAILED
        }
        RegistryError::Hook(e) => {
            e.write_detail(&mut detail);
            hook_code(e)
        }
    };
    Response::err(oid, code, detail.as_slice())
}
