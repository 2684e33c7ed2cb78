// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! SPI port adapter.
//!
//! - `ChipSelect` is an active-low GPIO output wrapper for manual CS control.
//! - `SpiPort` exposes one SPI controller to the bus manager, mapping the device address
//!   onto one of its chip-select lines and driving 8-bit full-duplex transfers.
//!
//! SPI has no address acknowledge, so every HAL failure maps to `BusError::Fault`.

use embedded_hal::blocking::spi::{Transfer, Write};
use embedded_hal::digital::v2::OutputPin;

use crate::bus::{BusError, BusIo};

/// Manual chip-select line, active-low, generic over any GPIO output pin.
pub struct ChipSelect<PIN: OutputPin> {
    pin: PIN,
}

impl<PIN: OutputPin> ChipSelect<PIN> {
    /// Create an active-low chip select and set it to the inactive state (i.e., high).
    pub fn active_low(mut pin: PIN) -> Self {
        let _ = pin.set_high();
        Self { pin }
    }

    /// Assert the chip select.
    #[inline]
    pub fn select(&mut self) {
        let _ = self.pin.set_low();
    }

    /// Deassert the chip select.
    #[inline]
    pub fn deselect(&mut self) {
        let _ = self.pin.set_high();
    }

    pub fn free(self) -> PIN {
        self.pin
    }
}

/// Object-safe view of a chip-select line, so one port can hold lines on different pins.
pub trait CsLine {
    fn select(&mut self);
    fn deselect(&mut self);
}

impl<PIN: OutputPin> CsLine for ChipSelect<PIN> {
    fn select(&mut self) {
        ChipSelect::select(self)
    }

    fn deselect(&mut self) {
        ChipSelect::deselect(self)
    }
}

/// Chip-select lines per SPI controller.
pub const MAX_CS: usize = 4;

/// One SPI controller with its chip-select lines, addressable by line index.
pub struct SpiPort<'c, B> {
    spi: B,
    cs: [Option<&'c mut dyn CsLine>; MAX_CS],
}

impl<'c, B> SpiPort<'c, B> {
    pub fn new(spi: B) -> Self {
        Self {
            spi,
            cs: [None, None, None, None],
        }
    }

    /// Attach a chip-select line under index `line`.
    pub fn with_cs(mut self, line: u8, cs: &'c mut dyn CsLine) -> Self {
        if let Some(slot) = self.cs.get_mut(line as usize) {
            *slot = Some(cs);
        }
        self
    }

    pub fn free(self) -> B {
        self.spi
    }
}

impl<'c, B, E> BusIo for SpiPort<'c, B>
where
    B: Transfer<u8, Error = E> + Write<u8, Error = E>,
{
    fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), BusError> {
        let Some(cs) = self.cs.get_mut(addr as usize).and_then(|c| c.as_mut()) else {
            return Err(BusError::Fault);
        };
        cs.select();
        let result = self.spi.write(bytes);
        cs.deselect();
        result.map_err(|_| BusError::Fault)
    }

    fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), BusError> {
        let Some(cs) = self.cs.get_mut(addr as usize).and_then(|c| c.as_mut()) else {
            return Err(BusError::Fault);
        };
        buf.fill(0);
        cs.select();
        let result = self.spi.transfer(buf).map(|_| ());
        cs.deselect();
        result.map_err(|_| BusError::Fault)
    }

    fn write_then_read(&mut self, addr: u16, bytes: &[u8], buf: &mut [u8]) -> Result<(), BusError> {
        let Some(cs) = self.cs.get_mut(addr as usize).and_then(|c| c.as_mut()) else {
            return Err(BusError::Fault);
        };
        cs.select();
        let wrote = self.spi.write(bytes);
        let read = if wrote.is_ok() {
            buf.fill(0);
            self.spi.transfer(buf).map(|_| ())
        } else {
            Ok(())
        };
        cs.deselect();
        wrote.map_err(|_| BusError::Fault)?;
        read.map_err(|_| BusError::Fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echo bus: transfers return the last written byte repeated.
    struct FakeSpi {
        last: u8,
        written: Vec<u8>,
    }

    impl Transfer<u8> for FakeSpi {
        type Error = ();

        fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], ()> {
            for w in words.iter_mut() {
                *w = self.last;
            }
            Ok(words)
        }
    }

    impl Write<u8> for FakeSpi {
        type Error = ();

        fn write(&mut self, words: &[u8]) -> Result<(), ()> {
            self.written.extend_from_slice(words);
            if let Some(&last) = words.last() {
                self.last = last;
            }
            Ok(())
        }
    }

    struct FakePin {
        low: bool,
        toggles: u32,
    }

    impl OutputPin for FakePin {
        type Error = ();

        fn set_low(&mut self) -> Result<(), ()> {
            self.low = true;
            self.toggles += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), ()> {
            self.low = false;
            self.toggles += 1;
            Ok(())
        }
    }

    #[test]
    fn addresses_select_cs_lines() {
        let mut cs0 = ChipSelect::active_low(FakePin {
            low: false,
            toggles: 0,
        });
        let mut cs1 = ChipSelect::active_low(FakePin {
            low: false,
            toggles: 0,
        });
        {
            let mut port = SpiPort::new(FakeSpi {
                last: 0,
                written: Vec::new(),
            })
            .with_cs(0, &mut cs0)
            .with_cs(1, &mut cs1);

            port.write(1, &[0x9F]).unwrap();
            let mut buf = [0u8; 2];
            port.write_then_read(1, &[0x42], &mut buf).unwrap();
            assert_eq!(buf, [0x42, 0x42]);

            // Unmapped line is a fault.
            assert_eq!(port.write(3, &[0x00]), Err(BusError::Fault));
        }
        // cs1 saw both transactions: construction + 2×(select, deselect).
        let pin1 = cs1.free();
        assert_eq!(pin1.toggles, 1 + 4);
        assert!(!pin1.low);
        // cs0 was never selected after construction.
        assert_eq!(cs0.free().toggles, 1);
    }
}
