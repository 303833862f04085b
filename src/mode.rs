use core::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Label returned for raw mode values that don't name a [`Mode`].
pub const UNKNOWN_MODE: &str = "UNKNOWN";

/// How a fan picks its speed. Owned by the caller and passed in on every
/// update, the fan itself keeps no mode state.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// follow the speed curve
    #[default]
    Auto = 0,
    /// quietest speed on the curve that still spins the fan
    Low = 1,
    /// loudest speed on the curve short of full
    High = 2,
    Full = 3,
}

impl Mode {
    pub const fn name(self) -> &'static str {
        match self {
            Mode::Auto => "Auto",
            Mode::Low => "Low",
            Mode::High => "High",
            Mode::Full => "Full",
        }
    }

    /// Next mode in button order, wrapping from `Full` back to `Auto`.
    pub const fn next(self) -> Self {
        match self {
            Mode::Auto => Mode::Low,
            Mode::Low => Mode::High,
            Mode::High => Mode::Full,
            Mode::Full => Mode::Auto,
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Mode::Auto),
            1 => Ok(Mode::Low),
            2 => Ok(Mode::High),
            3 => Ok(Mode::Full),
            other => Err(Error::UnknownMode(other)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Human readable label for a raw mode value.
pub fn mode_name(raw: u8) -> &'static str {
    Mode::try_from(raw).map_or(UNKNOWN_MODE, Mode::name)
}
