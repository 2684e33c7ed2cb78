// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Device-Specific Drivers
//!
//! This module contains device-level drivers that satisfy the registry's registration
//! contract, plus the [`Device`] handle enumerating everything this firmware ships.
//!
//! ## Existing drivers
//!
//! - [`vl53l1x`] – ST VL53L1X time-of-flight distance sensor
//! - [`adxl345`] – Analog Devices ADXL345 3-axis accelerometer

pub mod adxl345;
pub mod vl53l1x;

pub use adxl345::Adxl345;
pub use vl53l1x::Vl53l1x;

use crate::bus::BusManager;
use crate::registry::driver::{
    Driver, DriverConfig, DriverError, HookSet, PollStatus, SampleBuf,
};

/// Device handle over every driver in this firmware build.
///
/// Init selects the implementation from the config's name prefix, so one host-side name
/// like `"vl53l1x_probe"` or `"adxl345_accel"` both identifies the driver type and labels
/// the instance.
pub enum Device {
    Vl53l1x(Vl53l1x),
    Adxl345(Adxl345),
}

impl Driver for Device {
    fn init(config: &DriverConfig, buses: &mut BusManager<'_>) -> Result<Self, DriverError> {
        let name = config.name();
        if name.starts_with(b"vl53l1x") {
            Vl53l1x::init(config, buses).map(Device::Vl53l1x)
        } else if name.starts_with(b"adxl345") {
            Adxl345::init(config, buses).map(Device::Adxl345)
        } else {
            Err(DriverError::Failed("unknown_driver"))
        }
    }

    fn hooks(&self) -> HookSet {
        match self {
            Device::Vl53l1x(dev) => dev.hooks(),
            Device::Adxl345(dev) => dev.hooks(),
        }
    }

    fn read(
        &mut self,
        buses: &mut BusManager<'_>,
        params: &[u8],
        out: &mut SampleBuf,
    ) -> Result<(), DriverError> {
        match self {
            Device::Vl53l1x(dev) => dev.read(buses, params, out),
            Device::Adxl345(dev) => dev.read(buses, params, out),
        }
    }

    fn poll(
        &mut self,
        buses: &mut BusManager<'_>,
        out: &mut SampleBuf,
    ) -> Result<PollStatus, DriverError> {
        match self {
            Device::Vl53l1x(dev) => dev.poll(buses, out),
            Device::Adxl345(dev) => dev.poll(buses, out),
        }
    }

    fn close(&mut self, buses: &mut BusManager<'_>) -> Result<(), DriverError> {
        match self {
            Device::Vl53l1x(dev) => dev.close(buses),
            Device::Adxl345(dev) => dev.close(buses),
        }
    }
}
