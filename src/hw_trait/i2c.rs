//! I2C bus interface.

use async_trait::async_trait;
use thiserror::Error;

use super::Result;

/// I2C transaction errors.
#[derive(Error, Debug)]
pub enum I2cError {
    /// The device did not acknowledge its address or a data byte.
    #[error("no acknowledge from device 0x{0:02x}")]
    Nack(u8),

    /// Transport-specific failure (link down, timeout, short response).
    #[error("{0}")]
    Other(String),
}

/// Master-mode I2C bus access.
///
/// Each method is one complete bus transaction against the 7-bit address
/// `addr`. Implementations own clocking, ACK/NACK handling, and any retry
/// policy of the physical link; the driver layers no retries on top — a
/// failed transaction is returned to the caller as-is.
#[async_trait]
pub trait I2c: Send {
    /// Write `data` to the device.
    async fn write(&mut self, addr: u8, data: &[u8]) -> Result<()>;

    /// Read `buffer.len()` bytes from the device.
    async fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()>;

    /// Write `write`, then read `read.len()` bytes in one combined
    /// transaction (repeated start, no intervening stop).
    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<()>;
}
