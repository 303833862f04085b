//! Curve driven PWM fan control with tachometer RPM readings.
//!
//! The library is hardware agnostic: PWM output goes through [`DutyCycle`]
//! (implemented for every `embedded_hal::Pwm`), time through [`Clock`] and
//! temperature through [`Sensor`]. The `stm32f1` feature adds the board
//! support used by the firmware binary.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

#[cfg(feature = "stm32f1")]
pub mod board;
pub mod consts;
pub mod curve;
pub mod fan;
pub mod mode;
pub mod pwm;
pub mod sensor;
pub mod tacho;

use core::fmt::{self as core_fmt, Display};

pub use curve::{FanBounds, SpeedCurve, SpeedCurvePoint};
pub use fan::{Fan, FanDef};
pub use mode::{mode_name, Mode};
pub use pwm::{ConfigureOnce, DutyCycle, SharedTimer};
pub use sensor::{Sensor, SmoothedTemperature};
pub use tacho::{Clock, PulseCounter, PulseSink, TachoBank, TachoCell, TachoReader};

/// Result type used by the fan controller.
pub type Result<T> = ::core::result::Result<T, Error>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// a curve needs at least one point
    EmptyCurve,
    TooManyPoints,
    SpeedOutOfRange { index: usize },
    /// temperatures must be strictly ascending, `index` is the first
    /// offending point
    UnsortedCurve { index: usize },
    /// no speed strictly between off and full for `Low`/`High`
    DegenerateCurve,
    UnknownMode(u8),
}

impl Display for Error {
    fn fmt(&self, f: &mut core_fmt::Formatter<'_>) -> core_fmt::Result {
        match self {
            Error::EmptyCurve => f.write_str("speed curve has no points"),
            Error::TooManyPoints => write!(
                f,
                "speed curve has more than {} points",
                consts::MAX_CURVE_POINTS
            ),
            Error::SpeedOutOfRange { index } => {
                write!(f, "speed of curve point {index} is above 100%")
            }
            Error::UnsortedCurve { index } => write!(
                f,
                "curve point {index} is not hotter than the one before it"
            ),
            Error::DegenerateCurve => {
                f.write_str("speed curve has no speed between off and full")
            }
            Error::UnknownMode(raw) => write!(f, "unknown mode {raw}"),
        }
    }
}
