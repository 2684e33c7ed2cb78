// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! The registration contract between the registry and peripheral drivers.
//!
//! A driver is a descriptive [`DriverConfig`] plus up to four behavior hooks. `init` consumes
//! the config and produces the device handle (the implementing value itself), which the
//! registry then owns exclusively. All hooks run to completion on the single cooperative
//! context and are never re-entered.

use bitflags::bitflags;

use crate::bus::{BusError, BusKind, BusManager};
use crate::bytes::ByteBuf;
use crate::registry::attrs::{AttrBag, AttrError, AttrKey};

/// Driver names are bounded ASCII.
pub const MAX_NAME: usize = 32;
/// `query_driver` parameter byte-strings.
pub const MAX_PARAMS: usize = 32;
/// Read responses and poll samples.
pub const MAX_SAMPLE: usize = 64;

pub type Name = ByteBuf<MAX_NAME>;
pub type SampleBuf = ByteBuf<MAX_SAMPLE>;

bitflags! {
    /// Which behavior hooks a driver implements.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct HookSet: u8 {
        const INIT  = 1 << 0;
        const READ  = 1 << 1;
        const POLL  = 1 << 2;
        const CLOSE = 1 << 3;
    }
}

/// Outcome of a Poll hook invocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PollStatus {
    /// A sample was written to the output buffer.
    Ready,
    /// Nothing to report this period.
    NoData,
}

/// Hook-level failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DriverError {
    Bus(BusError),
    Attr { err: AttrError, key: AttrKey },
    NoHook,
    /// Driver-specific failure with a short ASCII detail.
    Failed(&'static str),
}

impl DriverError {
    /// Tag an attribute failure with the key it concerns.
    pub fn attr(err: AttrError, key: &[u8]) -> Self {
        Self::Attr {
            err,
            key: AttrKey::from_slice(key).unwrap_or_default(),
        }
    }

    /// Append the wire detail string for this error (e.g. `bus_nack`, `attr_type:range`).
    pub fn write_detail<const N: usize>(&self, out: &mut ByteBuf<N>) {
        match self {
            DriverError::Bus(BusError::Timeout) => {
                out.extend_from_slice(b"bus_timeout");
            }
            DriverError::Bus(BusError::Nack) => {
                out.extend_from_slice(b"bus_nack");
            }
            DriverError::Bus(BusError::Fault) => {
                out.extend_from_slice(b"bus_error");
            }
            DriverError::Attr { err, key } => {
                let prefix: &[u8] = match err {
                    AttrError::Missing => b"attr_missing:",
                    AttrError::TypeMismatch => b"attr_type:",
                    AttrError::Locked => b"attr_locked:",
                    AttrError::Full => b"attr_full:",
                    AttrError::BadKey => b"attr_key:",
                    AttrError::Reserved => b"attr_reserved:",
                };
                out.extend_from_slice(prefix);
                out.extend_from_slice(key.as_slice());
            }
            DriverError::NoHook => {
                out.extend_from_slice(b"no_hook");
            }
            DriverError::Failed(detail) => {
                out.extend_from_slice(detail.as_bytes());
            }
        }
    }
}

impl From<BusError> for DriverError {
    fn from(err: BusError) -> Self {
        Self::Bus(err)
    }
}

/// Descriptive configuration for one registerable driver.
///
/// Purely a value type; it never touches hardware.
#[derive(Copy, Clone)]
pub struct DriverConfig {
    name: Name,
    bus_kind: BusKind,
    bus_index: u8,
    address: u16,
    attrs: AttrBag,
    default_period: Option<u32>,
}

impl DriverConfig {
    /// Build a config from the required fields. Returns `None` for an empty, oversized, or
    /// non-ASCII name.
    pub fn new(name: &[u8], bus_kind: BusKind, bus_index: u8, address: u16) -> Option<Self> {
        let name = Name::from_slice(name)?;
        if name.is_empty() || !name.is_printable_ascii() {
            return None;
        }
        Some(Self {
            name,
            bus_kind,
            bus_index,
            address,
            attrs: AttrBag::new(),
            default_period: None,
        })
    }

    /// Poll period, in ticks, used when `start_poll` carries a zero period.
    pub fn with_default_period(mut self, ticks: u32) -> Self {
        self.default_period = Some(ticks);
        self
    }

    pub fn name(&self) -> &[u8] {
        self.name.as_slice()
    }

    pub fn bus_kind(&self) -> BusKind {
        self.bus_kind
    }

    pub fn bus_index(&self) -> u8 {
        self.bus_index
    }

    /// 7-bit device address on I²C, chip-select line on SPI.
    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn attrs(&self) -> &AttrBag {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut AttrBag {
        &mut self.attrs
    }

    pub fn default_period(&self) -> Option<u32> {
        self.default_period
    }
}

/// The four behavior hooks. Default implementations report the hook as absent
/// (`read`, `poll`) or succeed trivially (`close`).
pub trait Driver: Sized {
    /// Init hook: consume the config, produce the device handle. May acquire bus resources;
    /// on failure it must leave no persistent state behind.
    fn init(config: &DriverConfig, buses: &mut BusManager<'_>) -> Result<Self, DriverError>;

    /// Which hooks this device implements.
    fn hooks(&self) -> HookSet;

    /// One-shot read with opaque parameters; the response goes into `out`.
    fn read(
        &mut self,
        buses: &mut BusManager<'_>,
        params: &[u8],
        out: &mut SampleBuf,
    ) -> Result<(), DriverError> {
        let _ = (buses, params, out);
        Err(DriverError::NoHook)
    }

    /// Periodic sample acquisition; a `Ready` result means `out` holds the sample.
    fn poll(
        &mut self,
        buses: &mut BusManager<'_>,
        out: &mut SampleBuf,
    ) -> Result<PollStatus, DriverError> {
        let _ = (buses, out);
        Err(DriverError::NoHook)
    }

    /// Release resources. Best-effort; errors are logged by the registry, never surfaced.
    fn close(&mut self, buses: &mut BusManager<'_>) -> Result<(), DriverError> {
        let _ = buses;
        Ok(())
    }
}
