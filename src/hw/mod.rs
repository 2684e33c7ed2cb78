pub mod fifo;
pub mod i2c;
pub mod spi;
pub mod ticks;
pub mod usart;

pub use fifo::Fifo;
pub use i2c::I2cPort;
pub use spi::ChipSelect;
pub use spi::CsLine;
pub use spi::SpiPort;
pub use ticks::DwtTicks;
pub use usart::Usart;
