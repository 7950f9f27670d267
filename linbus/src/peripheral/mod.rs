//! Drivers for chips on the I2C bus.
//!
//! Each driver owns its [`I2cDevice`](crate::i2c::I2cDevice) and is generic
//! over the bus, so it runs against `/dev/i2c-N`, the stub bus, or a mock.
//! The `open` constructors take an optional bus index; `None` selects the
//! stub bus, where reads come back as zeros.

pub mod ad2420;
pub mod ltc2945;
pub mod ltc2991;
pub mod max6639;
pub mod n24c02;
pub mod tca6408;
pub mod tmp101;

pub use ad2420::Ad2420;
pub use ltc2945::Ltc2945;
pub use ltc2991::Ltc2991;
pub use max6639::Max6639;
pub use n24c02::N24c02;
pub use tca6408::Tca6408;
pub use tmp101::Tmp101;
