// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Command dispatcher.
//!
//! The dispatcher is the sole caller of registry operations: every command frame is decoded
//! here, routed into the registry (and mirrored into the scheduler for the poll commands),
//! and answered with exactly one `ok`/`err` response carrying the command's OID. Because the
//! dispatcher and the scheduler run interleaved on one context, a driver's hooks are never
//! re-entered.

use crate::bus::{BusKind, BusManager};
use crate::bytes::ByteBuf;
use crate::hw::fifo::Fifo;
use crate::protocol::messages::{
    self, attr_type, err_code, opcode, CommandFrame, FrameSink, Response,
};
use crate::protocol::parser::FrameParser;
use crate::registry::attrs::{AttrValue, MAX_VALUE_BYTES};
use crate::registry::driver::MAX_PARAMS;
use crate::registry::{Driver, Registry, SampleBuf};
use crate::sched::PollScheduler;

/// Cursor over a command's argument bytes. Every read is bounds-checked; `None` means the
/// host sent fewer bytes than the opcode's layout requires.
struct Args<'a> {
    buf: &'a [u8],
}

impl<'a> Args<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn u8(&mut self) -> Option<u8> {
        let (&first, rest) = self.buf.split_first()?;
        self.buf = rest;
        Some(first)
    }

    fn u16_be(&mut self) -> Option<u16> {
        let raw = self.bytes(2)?;
        Some(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn u32_be(&mut self) -> Option<u32> {
        let raw = self.bytes(4)?;
        Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn u64_be(&mut self) -> Option<u64> {
        let raw = self.bytes(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(raw);
        Some(u64::from_be_bytes(out))
    }

    fn i64_be(&mut self) -> Option<i64> {
        self.u64_be().map(|v| v as i64)
    }

    fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.buf.len() < n {
            return None;
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Some(head)
    }

    fn rest(&mut self) -> &'a [u8] {
        core::mem::take(&mut self.buf)
    }
}

fn short_args(oid: u8) -> Response {
    Response::err(oid, err_code::INTERNAL, b"short_args")
}

/// Frame-to-operation router. Owns only the parser state; the registry, scheduler, and bus
/// manager are passed in by the main loop that owns them.
pub struct Dispatcher {
    parser: FrameParser,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            parser: FrameParser::new(),
        }
    }

    /// Pull every byte the transport ISR queued and dispatch each completed command.
    pub fn drain<const N: usize, D: Driver, S: FrameSink>(
        &mut self,
        rx: &Fifo<N>,
        registry: &mut Registry<D>,
        sched: &mut PollScheduler,
        buses: &mut BusManager<'_>,
        now: u32,
        sink: &mut S,
    ) {
        while let Some(byte) = rx.pop() {
            if let Some(frame) = self.parser.push(byte) {
                self.dispatch(&frame, registry, sched, buses, now, sink);
            }
        }
    }

    /// Execute one command frame, emitting exactly one response.
    pub fn dispatch<D: Driver, S: FrameSink>(
        &mut self,
        frame: &CommandFrame,
        registry: &mut Registry<D>,
        sched: &mut PollScheduler,
        buses: &mut BusManager<'_>,
        now: u32,
        sink: &mut S,
    ) {
        let response = Self::execute(frame, registry, sched, buses, now);
        sink.emit(&response);
    }

    fn execute<D: Driver>(
        frame: &CommandFrame,
        registry: &mut Registry<D>,
        sched: &mut PollScheduler,
        buses: &mut BusManager<'_>,
        now: u32,
    ) -> Response {
        let oid = frame.oid;
        let mut args = Args::new(frame.args.as_slice());
        match frame.opcode {
            opcode::REGISTER_DRIVER => Self::register_driver(oid, &mut args, registry),
            opcode::SET_ATTRIBUTE => Self::set_attribute(oid, &mut args, registry),
            opcode::CONFIG_DRIVER => match registry.configure(oid, buses) {
                Ok(()) => Response::ok(oid),
                Err(err) => messages::registry_err(oid, err),
            },
            opcode::QUERY_DRIVER => {
                let params = args.rest();
                if params.len() > MAX_PARAMS {
                    return Response::err(oid, err_code::INTERNAL, b"params_len");
                }
                let mut out = SampleBuf::new();
                match registry.query(oid, buses, params, &mut out) {
                    Ok(()) => Response::ok_with(oid, out.as_slice()),
                    Err(err) => messages::registry_err(oid, err),
                }
            }
            opcode::START_POLL => {
                let Some(raw_period) = args.u32_be() else {
                    return short_args(oid);
                };
                let period = match raw_period {
                    // A zero period selects the driver's configured default.
                    0 => registry
                        .config(oid)
                        .and_then(|cfg| cfg.default_period())
                        .unwrap_or(0),
                    p => p,
                };
                if !sched.period_in_range(period) {
                    return Response::err(oid, err_code::INTERNAL, b"period_range");
                }
                match registry.start_poll(oid) {
                    Ok(()) => {
                        sched.add(oid, period, now);
                        Response::ok(oid)
                    }
                    Err(err) => messages::registry_err(oid, err),
                }
            }
            opcode::STOP_POLL => match registry.stop_poll(oid) {
                Ok(()) => {
                    sched.remove(oid);
                    Response::ok(oid)
                }
                Err(err) => messages::registry_err(oid, err),
            },
            opcode::CLOSE_DRIVER => {
                // Close on a polling entry carries stop_poll semantics first.
                sched.remove(oid);
                match registry.close(oid, buses) {
                    Ok(()) => Response::ok(oid),
                    Err(err) => messages::registry_err(oid, err),
                }
            }
            _ => Response::err(oid, err_code::INTERNAL, b"bad_opcode"),
        }
    }

    fn register_driver<D: Driver>(
        oid: u8,
        args: &mut Args<'_>,
        registry: &mut Registry<D>,
    ) -> Response {
        let Some(name_len) = args.u8() else {
            return short_args(oid);
        };
        let Some(name) = args.bytes(name_len as usize) else {
            return short_args(oid);
        };
        let Some(kind_raw) = args.u8() else {
            return short_args(oid);
        };
        let Some(bus_index) = args.u8() else {
            return short_args(oid);
        };
        let Some(address) = args.u16_be() else {
            return short_args(oid);
        };
        let kind = match kind_raw {
            0 => BusKind::I2c,
            1 => BusKind::Spi,
            _ => return Response::err(oid, err_code::INTERNAL, b"bus_kind"),
        };
        let Some(config) = crate::registry::DriverConfig::new(name, kind, bus_index, address)
        else {
            return Response::err(oid, err_code::INTERNAL, b"bad_name");
        };
        match registry.register(oid, config) {
            Ok(()) => Response::ok(oid),
            Err(err) => messages::registry_err(oid, err),
        }
    }

    fn set_attribute<D: Driver>(
        oid: u8,
        args: &mut Args<'_>,
        registry: &mut Registry<D>,
    ) -> Response {
        let Some(key_len) = args.u8() else {
            return short_args(oid);
        };
        let Some(key) = args.bytes(key_len as usize) else {
            return short_args(oid);
        };
        let Some(tag) = args.u8() else {
            return short_args(oid);
        };
        let value = match tag {
            attr_type::U64 => {
                let Some(v) = args.u64_be() else {
                    return short_args(oid);
                };
                AttrValue::U64(v)
            }
            attr_type::I64 => {
                let Some(v) = args.i64_be() else {
                    return short_args(oid);
                };
                AttrValue::I64(v)
            }
            attr_type::BOOL => {
                let Some(v) = args.u8() else {
                    return short_args(oid);
                };
                AttrValue::Bool(v != 0)
            }
            attr_type::BYTES => {
                let Some(len) = args.u8() else {
                    return short_args(oid);
                };
                let Some(raw) = args.bytes(len as usize) else {
                    return short_args(oid);
                };
                if len as usize > MAX_VALUE_BYTES {
                    return Response::err(oid, err_code::INTERNAL, b"value_len");
                }
                let Some(bytes) = ByteBuf::from_slice(raw) else {
                    return Response::err(oid, err_code::INTERNAL, b"value_len");
                };
                AttrValue::Bytes(bytes)
            }
            _ => return Response::err(oid, err_code::INTERNAL, b"attr_tag"),
        };
        match registry.set_attr(oid, key, value) {
            Ok(()) => Response::ok(oid),
            Err(err) => messages::registry_err(oid, err),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_cursor() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut args = Args::new(&data);
        assert_eq!(args.u8(), Some(0x01));
        assert_eq!(args.u16_be(), Some(0x0203));
        assert_eq!(args.u32_be(), Some(0x0405_0607));
        assert_eq!(args.u8(), None);
    }

    #[test]
    fn args_rest_consumes() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut args = Args::new(&data);
        assert_eq!(args.u8(), Some(0xAA));
        assert_eq!(args.rest(), &[0xBB, 0xCC]);
        assert_eq!(args.rest(), &[] as &[u8]);
    }

    #[test]
    fn args_i64() {
        let data = (-42i64).to_be_bytes();
        let mut args = Args::new(&data);
        assert_eq!(args.i64_be(), Some(-42));
    }
}
