// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Shared-bus manager.
//!
//! Each hardware I²C or SPI controller is installed here once at setup and afterwards only
//! reachable through [`BusManager::with_bus`], which hands out an exclusive guard for one
//! transaction. On the single cooperative context, exclusivity is the `&mut` borrow itself and
//! request order is call order.
//!
//! Drivers that completed Init hold a claim on their bus; a claimed bus keeps its clock
//! frequency until every holder is closed. The manager never retries a transfer.

use log::debug;

/// Bus technology of a managed controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusKind {
    I2c,
    Spi,
}

/// Transfer-level failure taxonomy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusError {
    /// The transfer did not complete within the adapter's bound (default 10 ms).
    Timeout,
    /// I²C address NACK.
    Nack,
    /// Any other hardware fault.
    Fault,
}

/// Bookkeeping failures from [`BusManager`] itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusConfigError {
    /// No controller installed under this `(kind, index)`.
    UnknownBus,
    /// A controller is already installed under this `(kind, index)`.
    AlreadyInstalled,
    /// Re-configuration at a new frequency while drivers hold the bus.
    HeldAtOtherRate,
    /// The adapter rejected the requested clock.
    RateRejected,
    /// All manager slots are in use.
    NoSlot,
}

/// Byte-level transfers against one addressed target on a bus.
///
/// `addr` is the 7-bit device address on I²C and the chip-select line index on SPI.
pub trait BusIo {
    fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), BusError>;
    fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), BusError>;
    fn write_then_read(&mut self, addr: u16, bytes: &[u8], buf: &mut [u8]) -> Result<(), BusError>;

    /// Reprogram the bus clock. Adapters fixed at construction time may ignore this.
    fn set_frequency(&mut self, freq_hz: u32) -> Result<(), BusError> {
        let _ = freq_hz;
        Ok(())
    }
}

/// Maximum number of installed controllers, shared across both kinds.
pub const MAX_BUSES: usize = 8;

/// Token recording that a driver holds `(kind, index)`; returned to the manager at Close.
#[derive(Copy, Clone, Debug)]
pub struct BusClaim {
    kind: BusKind,
    index: u8,
}

struct Slot<'b> {
    kind: BusKind,
    index: u8,
    io: &'b mut (dyn BusIo + 'b),
    freq_hz: u32,
    holders: u8,
}

/// Owner of every hardware bus controller.
pub struct BusManager<'b> {
    slots: [Option<Slot<'b>>; MAX_BUSES],
}

impl<'b> BusManager<'b> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    fn find(&mut self, kind: BusKind, index: u8) -> Option<&mut Slot<'b>> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|s| s.kind == kind && s.index == index)
    }

    fn find_ref(&self, kind: BusKind, index: u8) -> Option<&Slot<'b>> {
        self.slots
            .iter()
            .flatten()
            .find(|s| s.kind == kind && s.index == index)
    }

    /// Install a controller under `(kind, index)`. Setup-time only.
    pub fn install(
        &mut self,
        kind: BusKind,
        index: u8,
        io: &'b mut (dyn BusIo + 'b),
    ) -> Result<(), BusConfigError> {
        if self.find(kind, index).is_some() {
            return Err(BusConfigError::AlreadyInstalled);
        }
        let vacant = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(BusConfigError::NoSlot)?;
        *vacant = Some(Slot {
            kind,
            index,
            io,
            freq_hz: 0,
            holders: 0,
        });
        Ok(())
    }

    /// Set the bus clock. Idempotent at the current frequency; a different frequency is
    /// rejected while any driver holds the bus.
    pub fn configure(
        &mut self,
        kind: BusKind,
        index: u8,
        freq_hz: u32,
    ) -> Result<(), BusConfigError> {
        let slot = self.find(kind, index).ok_or(BusConfigError::UnknownBus)?;
        if slot.freq_hz == freq_hz {
            return Ok(());
        }
        if slot.holders > 0 {
            return Err(BusConfigError::HeldAtOtherRate);
        }
        if slot.io.set_frequency(freq_hz).is_err() {
            return Err(BusConfigError::RateRejected);
        }
        debug!("bus {:?}/{} clocked at {} Hz", kind, index, freq_hz);
        slot.freq_hz = freq_hz;
        Ok(())
    }

    /// Exclusive access to one bus for the duration of one transaction.
    pub fn with_bus(
        &mut self,
        kind: BusKind,
        index: u8,
    ) -> Result<BusGuard<'_, 'b>, BusConfigError> {
        let slot = self.find(kind, index).ok_or(BusConfigError::UnknownBus)?;
        Ok(BusGuard { io: &mut *slot.io })
    }

    /// Record that an initialized driver holds this bus.
    pub fn claim(&mut self, kind: BusKind, index: u8) -> Result<BusClaim, BusConfigError> {
        let slot = self.find(kind, index).ok_or(BusConfigError::UnknownBus)?;
        slot.holders += 1;
        Ok(BusClaim { kind, index })
    }

    /// Return a claim taken with [`BusManager::claim`].
    pub fn release(&mut self, claim: BusClaim) {
        if let Some(slot) = self.find(claim.kind, claim.index) {
            slot.holders = slot.holders.saturating_sub(1);
        }
    }

    /// Number of drivers currently holding `(kind, index)`.
    pub fn holders(&self, kind: BusKind, index: u8) -> u8 {
        self.find_ref(kind, index).map_or(0, |s| s.holders)
    }

    /// Configured frequency of `(kind, index)`, 0 when never configured.
    pub fn frequency(&self, kind: BusKind, index: u8) -> u32 {
        self.find_ref(kind, index).map_or(0, |s| s.freq_hz)
    }
}

impl<'b> Default for BusManager<'b> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive per-transaction handle to one bus controller.
pub struct BusGuard<'a, 'b> {
    io: &'a mut (dyn BusIo + 'b),
}

impl<'a, 'b> BusGuard<'a, 'b> {
    #[inline]
    pub fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), BusError> {
        self.io.write(addr, bytes)
    }

    #[inline]
    pub fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), BusError> {
        self.io.read(addr, buf)
    }

    #[inline]
    pub fn write_then_read(
        &mut self,
        addr: u16,
        bytes: &[u8],
        buf: &mut [u8],
    ) -> Result<(), BusError> {
        self.io.write_then_read(addr, bytes, buf)
    }
}
