//! EMC2101 PWM fan controller and temperature sensor driver.
//!
//! The EMC2101 is an I2C fan controller with integrated temperature sensing.
//! It monitors its own die temperature plus an external diode-connected
//! transistor, measures fan speed through a tachometer input, and drives the
//! fan with a 6-bit PWM duty cycle — either set directly or looked up from an
//! on-chip temperature-to-speed table (LUT).
//!
//! Datasheet: <https://www.microchip.com/en-us/product/emc2101>

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::hw_trait::{HwError, i2c::I2c};

/// Default I2C address for EMC2101
pub const DEFAULT_ADDRESS: u8 = 0x4C;

/// EMC2101 register addresses
mod regs {
    /// Internal temperature reading
    pub const INTERNAL_TEMP: u8 = 0x00;
    /// External temperature reading high byte (integer degC)
    pub const EXTERNAL_TEMP_HIGH: u8 = 0x01;
    /// Status flags
    pub const STATUS: u8 = 0x02;
    /// Configuration register
    pub const CONFIG: u8 = 0x03;
    /// Conversion rate register
    pub const CONVERSION_RATE: u8 = 0x04;
    /// Forced external temperature for LUT lookups
    pub const TEMP_FORCE: u8 = 0x0C;
    /// External temperature reading low byte (fraction in bits 7:5)
    pub const EXTERNAL_TEMP_LOW: u8 = 0x10;
    /// TACH reading low byte
    pub const TACH_LOW: u8 = 0x46;
    /// TACH reading high byte
    pub const TACH_HIGH: u8 = 0x47;
    /// TACH limit low byte
    pub const TACH_LIMIT_LOW: u8 = 0x48;
    /// TACH limit high byte
    pub const TACH_LIMIT_HIGH: u8 = 0x49;
    /// Fan configuration register
    pub const FAN_CONFIG: u8 = 0x4A;
    /// Fan spin-up configuration
    pub const FAN_SPINUP: u8 = 0x4B;
    /// Fan setting register (PWM duty cycle, bits 5:0)
    pub const FAN_SETTING: u8 = 0x4C;
    /// PWM frequency register
    pub const PWM_FREQ: u8 = 0x4D;
    /// PWM frequency divide register
    pub const PWM_DIV: u8 = 0x4E;
    /// LUT hysteresis register
    pub const LUT_HYSTERESIS: u8 = 0x4F;
    /// First LUT register; 8 temperature/setting pairs through 0x5F
    pub const LUT_BASE: u8 = 0x50;
    /// External diode averaging filter
    pub const AVG_FILTER: u8 = 0xBF;
    /// Product ID register
    pub const PRODUCT_ID: u8 = 0xFD;
    /// Manufacturer ID register
    pub const MFG_ID: u8 = 0xFE;
    /// Revision register
    pub const REVISION: u8 = 0xFF;
}

/// Configuration register bits (0x03)
mod config {
    #[expect(dead_code, reason = "ALERT masking is not exposed yet")]
    pub const MASK_ALERT: u8 = 0x80; // Bit 7: mask the ALERT output
    #[expect(dead_code, reason = "standby control is not exposed yet")]
    pub const STANDBY: u8 = 0x40; // Bit 6: low-power standby
    #[expect(dead_code, reason = "standby control is not exposed yet")]
    pub const FAN_STANDBY: u8 = 0x20; // Bit 5: fan output disabled in standby
    pub const DAC: u8 = 0x10; // Bit 4: analog (DAC) fan drive instead of PWM
    #[expect(dead_code, reason = "SMBus timeout control is not exposed yet")]
    pub const DIS_TO: u8 = 0x08; // Bit 3: disable SMBus timeout
    pub const ALT_TCH: u8 = 0x04; // Bit 2: ALERT/TACH pin is TACH input
}

/// Fan configuration register bits (0x4A)
mod fan_config {
    pub const FORCE: u8 = 0x40; // Bit 6: LUT lookups use TEMP_FORCE
    pub const PROG: u8 = 0x20; // Bit 5: fan setting register drives the fan (LUT bypassed)
    pub const POLARITY: u8 = 0x10; // Bit 4: invert the PWM output
    pub const CLK_SEL: u8 = 0x08; // Bit 3: 1.4 kHz PWM base clock instead of 360 kHz
    pub const CLK_OVR: u8 = 0x04; // Bit 2: base clock overridden by PWM_FREQ
    pub const TACH_MODE: u8 = 0x03; // Bits 1:0: TACH pin mode
}

/// Status register bits (0x02)
mod status {
    pub const BUSY: u8 = 0x80; // Bit 7: ADC converting
    pub const INT_HIGH: u8 = 0x40; // Bit 6: internal temp above high limit
    pub const INT_LOW: u8 = 0x20; // Bit 5: internal temp below low limit
    pub const EXT_HIGH: u8 = 0x10; // Bit 4: external temp above high limit
    pub const EXT_LOW: u8 = 0x08; // Bit 3: external temp below low limit
    pub const FAULT: u8 = 0x04; // Bit 2: external diode fault
    pub const TCRIT: u8 = 0x02; // Bit 1: external temp above TCRIT limit
    pub const TACH: u8 = 0x01; // Bit 0: TACH count above limit (fan too slow)
}

/// Fan spin-up register fields (0x4B)
mod spin_up {
    pub const DRIVE_MASK: u8 = 0x18; // Bits 4:3: spin-up drive level
    pub const DRIVE_SHIFT: u8 = 3;
    pub const TIME_MASK: u8 = 0x07; // Bits 2:0: spin-up time
}

/// Averaging filter register fields (0xBF)
mod filter {
    pub const FILTER_MASK: u8 = 0x06; // Bits 2:1: external diode averaging
    pub const FILTER_SHIFT: u8 = 1;
}

/// Temperature conversion rates.
///
/// The chip samples both diodes at one of ten discrete rates; the 4-bit
/// register codes are contiguous from slowest to fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataRate {
    /// 1/16 Hz
    Rate1_16Hz = 0x00,
    /// 1/8 Hz
    Rate1_8Hz = 0x01,
    /// 1/4 Hz
    Rate1_4Hz = 0x02,
    /// 1/2 Hz
    Rate1_2Hz = 0x03,
    /// 1 Hz
    Rate1Hz = 0x04,
    /// 2 Hz
    Rate2Hz = 0x05,
    /// 4 Hz
    Rate4Hz = 0x06,
    /// 8 Hz
    Rate8Hz = 0x07,
    /// 16 Hz
    Rate16Hz = 0x08,
    /// 32 Hz
    Rate32Hz = 0x09,
}

impl DataRate {
    /// Sampling frequency in hertz.
    pub fn hertz(self) -> f32 {
        match self {
            Self::Rate1_16Hz => 0.0625,
            Self::Rate1_8Hz => 0.125,
            Self::Rate1_4Hz => 0.25,
            Self::Rate1_2Hz => 0.5,
            Self::Rate1Hz => 1.0,
            Self::Rate2Hz => 2.0,
            Self::Rate4Hz => 4.0,
            Self::Rate8Hz => 8.0,
            Self::Rate16Hz => 16.0,
            Self::Rate32Hz => 32.0,
        }
    }
}

impl TryFrom<u8> for DataRate {
    type Error = Emc2101Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            x if x == Self::Rate1_16Hz as u8 => Ok(Self::Rate1_16Hz),
            x if x == Self::Rate1_8Hz as u8 => Ok(Self::Rate1_8Hz),
            x if x == Self::Rate1_4Hz as u8 => Ok(Self::Rate1_4Hz),
            x if x == Self::Rate1_2Hz as u8 => Ok(Self::Rate1_2Hz),
            x if x == Self::Rate1Hz as u8 => Ok(Self::Rate1Hz),
            x if x == Self::Rate2Hz as u8 => Ok(Self::Rate2Hz),
            x if x == Self::Rate4Hz as u8 => Ok(Self::Rate4Hz),
            x if x == Self::Rate8Hz as u8 => Ok(Self::Rate8Hz),
            x if x == Self::Rate16Hz as u8 => Ok(Self::Rate16Hz),
            x if x == Self::Rate32Hz as u8 => Ok(Self::Rate32Hz),
            _ => Err(Emc2101Error::InvalidDataRate(value)),
        }
    }
}

/// Spin-up drive level applied while kicking a stopped fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpinUpDrive {
    /// No spin-up drive
    Bypass = 0x00,
    /// 50% drive
    Half = 0x01,
    /// 75% drive
    ThreeQuarters = 0x02,
    /// 100% drive
    Full = 0x03,
}

/// How long the spin-up drive is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpinUpTime {
    /// No spin-up time
    Bypass = 0x00,
    /// 0.05 seconds
    Time50ms = 0x01,
    /// 0.1 seconds
    Time100ms = 0x02,
    /// 0.2 seconds
    Time200ms = 0x03,
    /// 0.4 seconds
    Time400ms = 0x04,
    /// 0.8 seconds
    Time800ms = 0x05,
    /// 1.6 seconds
    Time1600ms = 0x06,
    /// 3.2 seconds
    Time3200ms = 0x07,
}

/// Averaging filter applied to the external diode reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TempFilter {
    /// No filtering
    Off = 0x00,
    /// Single-level averaging
    Single = 0x01,
    /// Double-level averaging
    Double = 0x02,
}

/// Decoded status register.
///
/// Limit-trip flags clear on read, per the chip's alert semantics; callers
/// that poll should treat each returned `Status` as a one-shot snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    /// ADC conversion in progress
    pub busy: bool,
    /// Internal temperature exceeded its high limit
    pub internal_high: bool,
    /// Internal temperature fell below its low limit
    pub internal_low: bool,
    /// External temperature exceeded its high limit
    pub external_high: bool,
    /// External temperature fell below its low limit
    pub external_low: bool,
    /// External diode open or shorted
    pub diode_fault: bool,
    /// External temperature exceeded the TCRIT limit
    pub tcrit: bool,
    /// TACH count exceeded its limit (fan below minimum speed)
    pub tach_alarm: bool,
}

impl Status {
    fn from_bits(raw: u8) -> Self {
        Self {
            busy: raw & status::BUSY != 0,
            internal_high: raw & status::INT_HIGH != 0,
            internal_low: raw & status::INT_LOW != 0,
            external_high: raw & status::EXT_HIGH != 0,
            external_low: raw & status::EXT_LOW != 0,
            diode_fault: raw & status::FAULT != 0,
            tcrit: raw & status::TCRIT != 0,
            tach_alarm: raw & status::TACH != 0,
        }
    }

    /// Names of the set flags, for logging.
    pub fn flags(&self) -> Vec<&'static str> {
        let mut desc = Vec::new();
        if self.busy { desc.push("BUSY"); }
        if self.internal_high { desc.push("internal high limit"); }
        if self.internal_low { desc.push("internal low limit"); }
        if self.external_high { desc.push("external high limit"); }
        if self.external_low { desc.push("external low limit"); }
        if self.diode_fault { desc.push("diode fault"); }
        if self.tcrit { desc.push("TCRIT"); }
        if self.tach_alarm { desc.push("TACH alarm"); }
        desc
    }
}

/// EMC2101 error types
#[derive(Error, Debug)]
pub enum Emc2101Error {
    /// Bus transaction failed at the transport layer.
    #[error(transparent)]
    Hw(#[from] HwError),

    /// The part ID register did not report a known EMC2101 variant.
    #[error("part ID mismatch: got 0x{part_id:02X}, expected 0x16 or 0x28")]
    IdMismatch {
        /// The byte the part ID register reported.
        part_id: u8,
    },

    /// A raw conversion-rate code outside the ten defined values.
    #[error("undefined data rate code 0x{0:02X}")]
    InvalidDataRate(u8),

    /// A LUT index outside 0..=7.
    #[error("LUT index {0} out of range 0-7")]
    InvalidLutIndex(u8),
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, Emc2101Error>;

/// EMC2101 driver
///
/// Owns its bus transport exclusively for the lifetime of the driver value.
/// Read-modify-write operations are two bus transactions and are not atomic
/// against another master addressing the same device; callers sharing the
/// device supply their own mutual exclusion.
pub struct Emc2101<I: I2c> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Emc2101<I> {
    /// EMC2101 uses 6-bit PWM duty cycle (0-63 = 0-100%)
    const PWM_MAX: u8 = 63;

    /// RPM = numerator / TACH count
    const RPM_NUMERATOR: u32 = 5_400_000;

    /// TACH count reported when no rotation is measurable
    const TACH_STOPPED: u16 = 0xFFFF;

    /// Primary part ID
    const PART_ID: u8 = 0x16;
    /// Alternate part ID
    const PART_ID_ALT: u8 = 0x28;

    /// Number of LUT temperature/setting pairs
    const LUT_ENTRIES: u8 = 8;
    /// LUT temperatures are 7-bit
    const LUT_TEMP_MAX: u8 = 0x7F;
    /// LUT hysteresis is 5-bit, in degC
    const HYSTERESIS_MAX: u8 = 0x1F;
    /// Hysteresis applied by `reset`
    const HYSTERESIS_DEFAULT: u8 = 4;

    /// Create a new EMC2101 driver with default address
    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            address: DEFAULT_ADDRESS,
        }
    }

    /// Create a new EMC2101 driver with custom address
    pub fn new_with_address(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Consume the driver and hand back the bus transport.
    pub fn release(self) -> I {
        self.i2c
    }

    /// Initialize the EMC2101 for basic operation.
    ///
    /// Confirms the part ID register reports a known EMC2101 variant — the
    /// only identity check the chip offers — then applies the driver's
    /// default configuration via [`reset`](Self::reset). The manufacturer ID
    /// and revision are read for diagnostics only.
    pub async fn init(&mut self) -> Result<()> {
        let part_id = self.read_register(regs::PRODUCT_ID).await?;
        if part_id != Self::PART_ID && part_id != Self::PART_ID_ALT {
            return Err(Emc2101Error::IdMismatch { part_id });
        }

        let mfg_id = self.read_register(regs::MFG_ID).await?;
        let revision = self.read_register(regs::REVISION).await?;
        debug!(
            part_id = format!("{:#04x}", part_id),
            mfg_id = format!("{:#04x}", mfg_id),
            revision = format!("{:#04x}", revision),
            "Detected EMC2101 variant"
        );

        self.reset().await
    }

    /// Return the chip to the driver's default configuration.
    ///
    /// TACH input enabled, PWM output with the LUT bypassed, full duty,
    /// default LUT hysteresis, fastest conversion rate. The driver caches no
    /// state, so this is also safe to call after a failed `init` to restore
    /// default assumptions.
    pub async fn reset(&mut self) -> Result<()> {
        self.set_tach_input_enabled(true).await?;
        // Let the TACH input settle before the first reading
        tokio::time::sleep(Duration::from_millis(10)).await;

        self.write_register(regs::FAN_CONFIG, fan_config::PROG | fan_config::TACH_MODE)
            .await?;
        self.set_duty_cycle(1.0).await?;
        self.set_lut_hysteresis(Self::HYSTERESIS_DEFAULT).await?;
        self.set_data_rate(DataRate::Rate32Hz).await?;
        Ok(())
    }

    /// Read internal temperature in degrees Celsius.
    pub async fn internal_temperature(&mut self) -> Result<i8> {
        let raw = self.read_register(regs::INTERNAL_TEMP).await?;
        Ok(raw as i8)
    }

    /// Read external temperature in degrees Celsius.
    ///
    /// The value is 11-bit two's complement with 0.125 degC resolution:
    /// integer part in the high register, fraction in bits 7:5 of the low
    /// register. Reading the high byte latches the low byte on-chip, but the
    /// pair still spans two bus transactions; with conversion rates far below
    /// the bus rate a torn pair is unlikely, not impossible.
    pub async fn external_temperature(&mut self) -> Result<f32> {
        let high = self.read_register(regs::EXTERNAL_TEMP_HIGH).await?;
        let low = self.read_register(regs::EXTERNAL_TEMP_LOW).await?;

        // Arithmetic shift pulls the 11-bit value out sign-extended.
        let raw = i16::from_be_bytes([high, low]) >> 5;

        const RESOLUTION: f32 = 0.125; // degC per LSB
        Ok(raw as f32 * RESOLUTION)
    }

    /// Read fan speed in RPM.
    ///
    /// A TACH count of zero or saturated (no measurable rotation) reports
    /// 0 RPM rather than dividing by zero.
    pub async fn fan_rpm(&mut self) -> Result<u32> {
        let count = self.tach_count().await?;
        Ok(Self::count_to_rpm(count))
    }

    /// Read the raw TACH count.
    async fn tach_count(&mut self) -> Result<u16> {
        // Low byte first: reading it latches the high byte so the pair is
        // consistent even if the chip updates between the two transactions.
        let low = self.read_register(regs::TACH_LOW).await?;
        let high = self.read_register(regs::TACH_HIGH).await?;

        let count = u16::from_be_bytes([high, low]);
        trace!(
            "TACH registers: HIGH=0x{:02X}, LOW=0x{:02X}, combined=0x{:04X}",
            high, low, count
        );
        Ok(count)
    }

    /// Read the fan speed limit in RPM, 0 if no limit is measurable.
    pub async fn fan_max_rpm(&mut self) -> Result<u32> {
        let low = self.read_register(regs::TACH_LIMIT_LOW).await?;
        let high = self.read_register(regs::TACH_LIMIT_HIGH).await?;
        Ok(Self::count_to_rpm(u16::from_be_bytes([high, low])))
    }

    /// Set the fan speed limit in RPM.
    ///
    /// Converts to the TACH-limit encoding with the same saturation rules as
    /// the read path: 0 RPM (and any RPM too slow for the 16-bit count)
    /// writes the stopped-fan sentinel.
    pub async fn set_fan_max_rpm(&mut self, rpm: u32) -> Result<()> {
        let count = Self::rpm_to_count(rpm);
        let [high, low] = count.to_be_bytes();
        self.write_register(regs::TACH_LIMIT_LOW, low).await?;
        self.write_register(regs::TACH_LIMIT_HIGH, high).await?;
        Ok(())
    }

    fn count_to_rpm(count: u16) -> u32 {
        if count == 0 || count == Self::TACH_STOPPED {
            return 0; // Fan stopped or not measurable
        }
        Self::RPM_NUMERATOR / count as u32
    }

    fn rpm_to_count(rpm: u32) -> u16 {
        if rpm == 0 {
            return Self::TACH_STOPPED;
        }
        match Self::RPM_NUMERATOR / rpm {
            0 => 1,
            count if count >= Self::TACH_STOPPED as u32 => Self::TACH_STOPPED,
            count => count as u16,
        }
    }

    /// Read the manual PWM duty cycle as a fraction in 0.0..=1.0.
    pub async fn duty_cycle(&mut self) -> Result<f32> {
        let raw = self.read_register(regs::FAN_SETTING).await? & Self::PWM_MAX;
        Ok(raw as f32 / Self::PWM_MAX as f32)
    }

    /// Set the manual PWM duty cycle from a fraction.
    ///
    /// Out-of-range input is clamped to 0.0..=1.0 before quantizing to the
    /// 6-bit fan setting; the register never sees undefined bits.
    pub async fn set_duty_cycle(&mut self, fraction: f32) -> Result<()> {
        let raw = (fraction.clamp(0.0, 1.0) * Self::PWM_MAX as f32).round() as u8;
        self.write_register(regs::FAN_SETTING, raw).await
    }

    /// Read the temperature conversion rate.
    ///
    /// A stored code outside the ten defined values (the 4-bit field admits
    /// six the chip never uses) is surfaced as an error, never a bogus rate.
    pub async fn data_rate(&mut self) -> Result<DataRate> {
        let code = self.read_register(regs::CONVERSION_RATE).await? & 0x0F;
        DataRate::try_from(code)
    }

    /// Set the temperature conversion rate.
    pub async fn set_data_rate(&mut self, rate: DataRate) -> Result<()> {
        self.write_register(regs::CONVERSION_RATE, rate as u8).await
    }

    /// Whether the on-chip LUT is driving the fan.
    pub async fn lut_enabled(&mut self) -> Result<bool> {
        let cfg = self.read_register(regs::FAN_CONFIG).await?;
        // PROG set means the fan setting register drives the fan
        Ok(cfg & fan_config::PROG == 0)
    }

    /// Hand fan control to the LUT, or back to the fan setting register.
    ///
    /// Flips only the PROG bit; all other fan-configuration bits are
    /// preserved.
    pub async fn set_lut_enabled(&mut self, enable: bool) -> Result<()> {
        if enable {
            self.update_register(regs::FAN_CONFIG, 0, fan_config::PROG).await
        } else {
            self.update_register(regs::FAN_CONFIG, fan_config::PROG, 0).await
        }
    }

    /// Program one LUT temperature/duty pair.
    ///
    /// `index` selects one of the 8 entries; `temp_c` is clamped to the
    /// 7-bit LUT range and `fraction` to 0.0..=1.0. The chip only latches
    /// LUT writes while the LUT is bypassed, so the LUT is disabled around
    /// the write and the prior state restored.
    pub async fn set_lut_entry(&mut self, index: u8, temp_c: u8, fraction: f32) -> Result<()> {
        if index >= Self::LUT_ENTRIES {
            return Err(Emc2101Error::InvalidLutIndex(index));
        }
        let temp = temp_c.min(Self::LUT_TEMP_MAX);
        let duty = (fraction.clamp(0.0, 1.0) * Self::PWM_MAX as f32).round() as u8;

        let was_enabled = self.lut_enabled().await?;
        if was_enabled {
            self.set_lut_enabled(false).await?;
        }
        let reg = regs::LUT_BASE + index * 2;
        self.write_register(reg, temp).await?;
        self.write_register(reg + 1, duty).await?;
        if was_enabled {
            self.set_lut_enabled(true).await?;
        }
        Ok(())
    }

    /// Read the LUT hysteresis in degrees Celsius.
    pub async fn lut_hysteresis(&mut self) -> Result<u8> {
        self.read_register(regs::LUT_HYSTERESIS).await
    }

    /// Set the LUT hysteresis, clamped to the chip's 31 degC maximum.
    pub async fn set_lut_hysteresis(&mut self, degrees: u8) -> Result<()> {
        self.write_register(regs::LUT_HYSTERESIS, degrees.min(Self::HYSTERESIS_MAX))
            .await
    }

    /// Read and decode the status register.
    pub async fn status(&mut self) -> Result<Status> {
        let raw = self.read_register(regs::STATUS).await?;
        let status = Status::from_bits(raw);
        if raw != 0 {
            debug!("Status: 0x{:02X} ({})", raw, status.flags().join(", "));
        }
        Ok(status)
    }

    /// Read the forced external temperature.
    pub async fn forced_temperature(&mut self) -> Result<i8> {
        let raw = self.read_register(regs::TEMP_FORCE).await?;
        Ok(raw as i8)
    }

    /// Set the temperature the LUT consults while forcing is enabled.
    pub async fn set_forced_temperature(&mut self, temp_c: i8) -> Result<()> {
        self.write_register(regs::TEMP_FORCE, temp_c as u8).await
    }

    /// Make LUT lookups use the forced temperature instead of the diode.
    pub async fn set_forced_temperature_enabled(&mut self, enable: bool) -> Result<()> {
        if enable {
            self.update_register(regs::FAN_CONFIG, fan_config::FORCE, 0).await
        } else {
            self.update_register(regs::FAN_CONFIG, 0, fan_config::FORCE).await
        }
    }

    /// Configure the drive level and duration applied to kick a stopped fan.
    pub async fn set_spin_up(&mut self, drive: SpinUpDrive, time: SpinUpTime) -> Result<()> {
        let bits = ((drive as u8) << spin_up::DRIVE_SHIFT) | time as u8;
        self.update_register(
            regs::FAN_SPINUP,
            bits,
            spin_up::DRIVE_MASK | spin_up::TIME_MASK,
        )
        .await
    }

    /// Configure the external diode averaging filter.
    pub async fn set_temperature_filter(&mut self, level: TempFilter) -> Result<()> {
        self.update_register(
            regs::AVG_FILTER,
            (level as u8) << filter::FILTER_SHIFT,
            filter::FILTER_MASK,
        )
        .await
    }

    /// Select the PWM base clock.
    ///
    /// `slow_clock` picks the 1.4 kHz base over 360 kHz; `clock_override`
    /// derives the PWM frequency from the PWM_FREQ register instead.
    pub async fn configure_pwm_clock(&mut self, slow_clock: bool, clock_override: bool) -> Result<()> {
        let mut set = 0;
        if slow_clock {
            set |= fan_config::CLK_SEL;
        }
        if clock_override {
            set |= fan_config::CLK_OVR;
        }
        self.update_register(
            regs::FAN_CONFIG,
            set,
            fan_config::CLK_SEL | fan_config::CLK_OVR,
        )
        .await
    }

    /// Set the 5-bit PWM frequency value used when the clock override is on.
    pub async fn set_pwm_frequency(&mut self, freq: u8) -> Result<()> {
        self.write_register(regs::PWM_FREQ, freq & 0x1F).await
    }

    /// Set the PWM frequency divisor.
    pub async fn set_pwm_divisor(&mut self, divisor: u8) -> Result<()> {
        self.write_register(regs::PWM_DIV, divisor).await
    }

    /// Invert the PWM output polarity.
    pub async fn invert_fan_output(&mut self, invert: bool) -> Result<()> {
        if invert {
            self.update_register(regs::FAN_CONFIG, fan_config::POLARITY, 0).await
        } else {
            self.update_register(regs::FAN_CONFIG, 0, fan_config::POLARITY).await
        }
    }

    /// Drive the fan with the analog DAC output instead of PWM.
    pub async fn set_dac_output(&mut self, enable: bool) -> Result<()> {
        if enable {
            self.update_register(regs::CONFIG, config::DAC, 0).await
        } else {
            self.update_register(regs::CONFIG, 0, config::DAC).await
        }
    }

    /// Use the ALERT/TACH pin as a tachometer input.
    pub async fn set_tach_input_enabled(&mut self, enable: bool) -> Result<()> {
        if enable {
            self.update_register(regs::CONFIG, config::ALT_TCH, 0).await
        } else {
            self.update_register(regs::CONFIG, 0, config::ALT_TCH).await
        }
    }

    // Helper methods for register access

    async fn read_register(&mut self, reg: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(self.address, &[reg], &mut buf).await?;
        Ok(buf[0])
    }

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        trace!("W[0x{:02X}] <- 0x{:02X}", reg, value);
        self.i2c.write(self.address, &[reg, value]).await?;
        Ok(())
    }

    /// Read-modify-write: clear `mask_clear`, then set `mask_set`.
    async fn update_register(&mut self, reg: u8, mask_set: u8, mask_clear: u8) -> Result<()> {
        let current = self.read_register(reg).await?;
        let updated = (current & !mask_clear) | mask_set;
        self.write_register(reg, updated).await
    }
}
