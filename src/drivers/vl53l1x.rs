//! VL53L1X time-of-flight distance sensor.
//!
//! I²C device with 16-bit register indices. Init verifies the model id, applies the
//! `timing_budget` attribute (microseconds), and starts autonomous ranging; afterwards the
//! result register always holds the most recent range. Poll only reports a sample when the
//! data-ready flag is set and clears the interrupt after reading.

use crate::bus::{BusKind, BusManager};
use crate::registry::attrs::AttrError;
use crate::registry::driver::{
    Driver, DriverConfig, DriverError, HookSet, PollStatus, SampleBuf,
};

// Register indices
pub mod reg {
    pub const GPIO_TIO_HV_STATUS: u16 = 0x0031;
    pub const RANGE_CONFIG_TIMEOUT_MACROP_A: u16 = 0x005E;
    pub const SYSTEM_INTERRUPT_CLEAR: u16 = 0x0086;
    pub const SYSTEM_MODE_START: u16 = 0x0087;
    pub const RESULT_FINAL_RANGE_MM: u16 = 0x0096;
    pub const MODEL_ID: u16 = 0x010F;
}

pub const MODEL_ID_VALUE: u8 = 0xEA;
/// Autonomous ranging mode.
pub const MODE_AUTONOMOUS: u8 = 0x40;
/// Ranging results clamp at the sensor ceiling.
pub const MAX_RANGE_MM: u16 = 8190;
/// Applied when the host sets no `timing_budget` attribute, in microseconds.
pub const DEFAULT_TIMING_BUDGET_US: u32 = 50_000;

/// VL53L1X device handle.
pub struct Vl53l1x {
    bus_index: u8,
    address: u16,
    timing_budget_us: u32,
}

impl Vl53l1x {
    fn reg_write(
        &self,
        buses: &mut BusManager<'_>,
        reg: u16,
        data: &[u8],
    ) -> Result<(), DriverError> {
        let mut guard = buses
            .with_bus(BusKind::I2c, self.bus_index)
            .map_err(|_| DriverError::Failed("no_such_bus"))?;
        let mut frame = [0u8; 4];
        frame[..2].copy_from_slice(&reg.to_be_bytes());
        frame[2..2 + data.len()].copy_from_slice(data);
        guard
            .write(self.address, &frame[..2 + data.len()])
            .map_err(DriverError::Bus)
    }

    fn reg_read(
        &self,
        buses: &mut BusManager<'_>,
        reg: u16,
        out: &mut [u8],
    ) -> Result<(), DriverError> {
        let mut guard = buses
            .with_bus(BusKind::I2c, self.bus_index)
            .map_err(|_| DriverError::Failed("no_such_bus"))?;
        guard
            .write_then_read(self.address, &reg.to_be_bytes(), out)
            .map_err(DriverError::Bus)
    }

    /// Read the latest range and clamp to the sensor ceiling.
    fn read_range_mm(&self, buses: &mut BusManager<'_>) -> Result<u16, DriverError> {
        let mut raw = [0u8; 2];
        self.reg_read(buses, reg::RESULT_FINAL_RANGE_MM, &mut raw)?;
        Ok(u16::from_be_bytes(raw).min(MAX_RANGE_MM))
    }

    fn data_ready(&self, buses: &mut BusManager<'_>) -> Result<bool, DriverError> {
        let mut status = [0u8; 1];
        self.reg_read(buses, reg::GPIO_TIO_HV_STATUS, &mut status)?;
        Ok(status[0] & 0x01 != 0)
    }
}

impl Driver for Vl53l1x {
    fn init(config: &DriverConfig, buses: &mut BusManager<'_>) -> Result<Self, DriverError> {
        let timing_budget_us = match config.attrs().get_u64(b"timing_budget") {
            Ok(us) => us as u32,
            Err(AttrError::Missing) => DEFAULT_TIMING_BUDGET_US,
            Err(err) => return Err(DriverError::attr(err, b"timing_budget")),
        };
        let dev = Self {
            bus_index: config.bus_index(),
            address: config.address(),
            timing_budget_us,
        };

        let mut id = [0u8; 1];
        dev.reg_read(buses, reg::MODEL_ID, &mut id)?;
        if id[0] != MODEL_ID_VALUE {
            return Err(DriverError::Failed("bad_model_id"));
        }

        // Macro-period timeout derived from the budget; coarse but monotonic.
        let macrop = (dev.timing_budget_us / 1_000).clamp(1, u32::from(u16::MAX)) as u16;
        dev.reg_write(buses, reg::RANGE_CONFIG_TIMEOUT_MACROP_A, &macrop.to_be_bytes())?;
        dev.reg_write(buses, reg::SYSTEM_MODE_START, &[MODE_AUTONOMOUS])?;
        Ok(dev)
    }

    fn hooks(&self) -> HookSet {
        HookSet::INIT | HookSet::READ | HookSet::POLL | HookSet::CLOSE
    }

    fn read(
        &mut self,
        buses: &mut BusManager<'_>,
        params: &[u8],
        out: &mut SampleBuf,
    ) -> Result<(), DriverError> {
        // No read parameters defined for this device.
        let _ = params;
        let mm = self.read_range_mm(buses)?;
        out.extend_from_slice(&mm.to_be_bytes());
        Ok(())
    }

    fn poll(
        &mut self,
        buses: &mut BusManager<'_>,
        out: &mut SampleBuf,
    ) -> Result<PollStatus, DriverError> {
        if !self.data_ready(buses)? {
            return Ok(PollStatus::NoData);
        }
        let mm = self.read_range_mm(buses)?;
        self.reg_write(buses, reg::SYSTEM_INTERRUPT_CLEAR, &[0x01])?;
        out.extend_from_slice(&mm.to_be_bytes());
        Ok(PollStatus::Ready)
    }

    fn close(&mut self, buses: &mut BusManager<'_>) -> Result<(), DriverError> {
        // Stop ranging; best effort.
        self.reg_write(buses, reg::SYSTEM_MODE_START, &[0x00])
    }
}
