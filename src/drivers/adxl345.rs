// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! ADXL345 3-axis accelerometer.
//!
//! I²C device with 8-bit register indices. Init verifies DEVID, applies the optional `range`
//! attribute (g-range 2/4/8/16) and `rate` attribute (output data rate in Hz), and enables
//! measurement. Samples are three big-endian signed 16-bit values in X, Y, Z order, raw ADC
//! units; the device itself stores them little-endian.

use crate::bus::{BusKind, BusManager};
use crate::registry::attrs::AttrError;
use crate::registry::driver::{
    Driver, DriverConfig, DriverError, HookSet, PollStatus, SampleBuf,
};

// Register addresses
pub mod reg {
    pub const DEVID: u8 = 0x00;
    pub const BW_RATE: u8 = 0x2C;
    pub const POWER_CTL: u8 = 0x2D;
    pub const INT_SOURCE: u8 = 0x30;
    pub const DATA_FORMAT: u8 = 0x31;
    pub const DATAX0: u8 = 0x32;
}

pub const DEVID_VALUE: u8 = 0xE5;
/// POWER_CTL measure bit.
pub const MEASURE: u8 = 1 << 3;
/// INT_SOURCE data-ready bit.
pub const DATA_READY: u8 = 1 << 7;
/// DATA_FORMAT full-resolution bit.
pub const FULL_RES: u8 = 1 << 3;

/// ADXL345 device handle.
pub struct Adxl345 {
    bus_index: u8,
    address: u16,
}

fn range_bits(range_g: u64) -> Option<u8> {
    match range_g {
        2 => Some(0b00),
        4 => Some(0b01),
        8 => Some(0b10),
        16 => Some(0b11),
        _ => None,
    }
}

fn rate_bits(rate_hz: u64) -> Option<u8> {
    match rate_hz {
        25 => Some(0x08),
        50 => Some(0x09),
        100 => Some(0x0A),
        200 => Some(0x0B),
        400 => Some(0x0C),
        800 => Some(0x0D),
        1600 => Some(0x0E),
        3200 => Some(0x0F),
        _ => None,
    }
}

impl Adxl345 {
    fn reg_write(
        &self,
        buses: &mut BusManager<'_>,
        reg: u8,
        value: u8,
    ) -> Result<(), DriverError> {
        let mut guard = buses
            .with_bus(BusKind::I2c, self.bus_index)
            .map_err(|_| DriverError::Failed("no_such_bus"))?;
        guard
            .write(self.address, &[reg, value])
            .map_err(DriverError::Bus)
    }

    fn reg_read(
        &self,
        buses: &mut BusManager<'_>,
        reg: u8,
        out: &mut [u8],
    ) -> Result<(), DriverError> {
        let mut guard = buses
            .with_bus(BusKind::I2c, self.bus_index)
            .map_err(|_| DriverError::Failed("no_such_bus"))?;
        guard
            .write_then_read(self.address, &[reg], out)
            .map_err(DriverError::Bus)
    }

    /// Burst-read the six data registers and re-order to big-endian X, Y, Z.
    fn read_sample(
        &self,
        buses: &mut BusManager<'_>,
        out: &mut SampleBuf,
    ) -> Result<(), DriverError> {
        let mut raw = [0u8; 6];
        self.reg_read(buses, reg::DATAX0, &mut raw)?;
        for axis in 0..3 {
            let value = i16::from_le_bytes([raw[2 * axis], raw[2 * axis + 1]]);
            out.extend_from_slice(&value.to_be_bytes());
        }
        Ok(())
    }
}

impl Driver for Adxl345 {
    fn init(config: &DriverConfig, buses: &mut BusManager<'_>) -> Result<Self, DriverError> {
        let range_g = match config.attrs().get_u64(b"range") {
            Ok(g) => g,
            Err(AttrError::Missing) => 16,
            Err(err) => return Err(DriverError::attr(err, b"range")),
        };
        let rate_hz = match config.attrs().get_u64(b"rate") {
            Ok(hz) => hz,
            Err(AttrError::Missing) => 100,
            Err(err) => return Err(DriverError::attr(err, b"rate")),
        };
        let range = range_bits(range_g).ok_or(DriverError::Failed("bad_range"))?;
        let rate = rate_bits(rate_hz).ok_or(DriverError::Failed("bad_rate"))?;

        let dev = Self {
            bus_index: config.bus_index(),
            address: config.address(),
        };

        let mut id = [0u8; 1];
        dev.reg_read(buses, reg::DEVID, &mut id)?;
        if id[0] != DEVID_VALUE {
            return Err(DriverError::Failed("bad_devid"));
        }

        dev.reg_write(buses, reg::BW_RATE, rate)?;
        dev.reg_write(buses, reg::DATA_FORMAT, FULL_RES | range)?;
        dev.reg_write(buses, reg::POWER_CTL, MEASURE)?;
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
        let _ = params;
        self.read_sample(buses, out)
    }

    fn poll(
        &mut self,
        buses: &mut BusManager<'_>,
        out: &mut SampleBuf,
    ) -> Result<PollStatus, DriverError> {
        let mut int_source = [0u8; 1];
        self.reg_read(buses, reg::INT_SOURCE, &mut int_source)?;
        if int_source[0] & DATA_READY == 0 {
            return Ok(PollStatus::NoData);
        }
        self.read_sample(buses, out)?;
        Ok(PollStatus::Ready)
    }

    fn close(&mut self, buses: &mut BusManager<'_>) -> Result<(), DriverError> {
        // Back to standby; best effort.
        self.reg_write(buses, reg::POWER_CTL, 0x00)
    }
}
