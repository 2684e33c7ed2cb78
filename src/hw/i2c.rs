// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! I²C port adapter.
//!
//! Bridges any `embedded-hal` blocking I²C implementation into the bus manager's [`BusIo`]
//! contract. HAL error types are opaque here, so the board supplies the classifier that maps
//! them onto the `BusError` taxonomy (NACK vs. timeout vs. other fault) when it constructs
//! the port.

use embedded_hal::blocking::i2c::{Read, Write, WriteRead};

use crate::bus::{BusError, BusIo};

/// One I²C controller exposed to the bus manager.
pub struct I2cPort<T, F> {
    dev: T,
    classify: F,
}

impl<T, F> I2cPort<T, F> {
    pub fn new(dev: T, classify: F) -> Self {
        Self { dev, classify }
    }

    /// Release the wrapped HAL device.
    pub fn free(self) -> T {
        self.dev
    }
}

impl<T, E, F> BusIo for I2cPort<T, F>
where
    T: Write<Error = E> + Read<Error = E> + WriteRead<Error = E>,
    F: FnMut(E) -> BusError,
{
    fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), BusError> {
        self.dev.write(addr as u8, bytes).map_err(&mut self.classify)
    }

    fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), BusError> {
        self.dev.read(addr as u8, buf).map_err(&mut self.classify)
    }

    fn write_then_read(&mut self, addr: u16, bytes: &[u8], buf: &mut [u8]) -> Result<(), BusError> {
        self.dev
            .write_read(addr as u8, bytes, buf)
            .map_err(&mut self.classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum FakeError {
        AddrNack,
        Other,
    }

    /// Register-file fake: one byte of address pointer, eight bytes of storage.
    struct FakeI2c {
        regs: [u8; 8],
        pointer: usize,
        nack: bool,
    }

    impl Write for FakeI2c {
        type Error = FakeError;

        fn write(&mut self, _addr: u8, bytes: &[u8]) -> Result<(), FakeError> {
            if self.nack {
                return Err(FakeError::AddrNack);
            }
            let (&reg, data) = bytes.split_first().ok_or(FakeError::Other)?;
            self.pointer = reg as usize;
            for (offset, &b) in data.iter().enumerate() {
                self.regs[self.pointer + offset] = b;
            }
            Ok(())
        }
    }

    impl Read for FakeI2c {
        type Error = FakeError;

        fn read(&mut self, _addr: u8, buf: &mut [u8]) -> Result<(), FakeError> {
            if self.nack {
                return Err(FakeError::AddrNack);
            }
            for (offset, b) in buf.iter_mut().enumerate() {
                *b = self.regs[self.pointer + offset];
            }
            Ok(())
        }
    }

    impl WriteRead for FakeI2c {
        type Error = FakeError;

        fn write_read(&mut self, addr: u8, bytes: &[u8], buf: &mut [u8]) -> Result<(), FakeError> {
            Write::write(self, addr, bytes)?;
            Read::read(self, addr, buf)
        }
    }

    fn classify(err: FakeError) -> BusError {
        match err {
            FakeError::AddrNack => BusError::Nack,
            FakeError::Other => BusError::Fault,
        }
    }

    #[test]
    fn write_then_read_roundtrip() {
        let fake = FakeI2c {
            regs: [0; 8],
            pointer: 0,
            nack: false,
        };
        let mut port = I2cPort::new(fake, classify);
        port.write(0x29, &[0x02, 0xAB, 0xCD]).unwrap();
        let mut buf = [0u8; 2];
        port.write_then_read(0x29, &[0x02], &mut buf).unwrap();
        assert_eq!(buf, [0xAB, 0xCD]);
    }

    #[test]
    fn classifier_maps_nack() {
        let fake = FakeI2c {
            regs: [0; 8],
            pointer: 0,
            nack: true,
        };
        let mut port = I2cPort::new(fake, classify);
        assert_eq!(port.write(0x29, &[0x00]), Err(BusError::Nack));
        let mut buf = [0u8; 1];
        assert_eq!(port.read(0x29, &mut buf), Err(BusError::Nack));
    }
}
