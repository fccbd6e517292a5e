//! Register-level driver for the EMC2101 temperature sensor and PWM fan
//! controller.
//!
//! The driver is generic over a narrow bus transport: implement
//! [`hw_trait::I2c`] for your platform's bus (or a simulated register file)
//! and hand it to [`Emc2101`] at construction time. Every public operation is
//! one or more fixed-address register transactions, decoded or encoded per
//! the chip's bit layout, and returns a `Result` so a failed bus transaction
//! is never mistaken for a valid zero reading.
//!
//! ```no_run
//! # use emc2101::{Emc2101, hw_trait::I2c};
//! # async fn demo<B: I2c>(bus: B) -> Result<(), emc2101::Emc2101Error> {
//! let mut fan = Emc2101::new(bus);
//! fan.init().await?;
//! fan.set_duty_cycle(0.5).await?;
//! let rpm = fan.fan_rpm().await?;
//! let temp = fan.external_temperature().await?;
//! # Ok(())
//! # }
//! ```

pub mod emc2101;
pub mod hw_trait;

pub use emc2101::{
    DEFAULT_ADDRESS, DataRate, Emc2101, Emc2101Error, SpinUpDrive, SpinUpTime, Status, TempFilter,
};
pub use hw_trait::{HwError, I2c};
