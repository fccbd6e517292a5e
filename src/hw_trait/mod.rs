//! Hardware abstraction traits.
//!
//! The driver talks to the chip through the narrow interfaces in this module
//! rather than a concrete bus. Platform code (a Linux i2c-dev wrapper, a
//! USB-to-I2C bridge, a simulated register file in tests) implements them and
//! hands the implementation to the driver at construction time.

pub mod i2c;

pub use i2c::I2c;

use thiserror::Error;

/// Errors surfaced by hardware interface implementations.
#[derive(Error, Debug)]
pub enum HwError {
    /// I2C bus transaction failed.
    #[error("I2C error: {0}")]
    I2c(#[from] i2c::I2cError),

    /// A parameter was outside the range the hardware accepts.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for hardware interface operations.
pub type Result<T> = std::result::Result<T, HwError>;
