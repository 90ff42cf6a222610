//! Error type shared by the engine and every hardware backend.
//!
//! Any of these reaching the engine is fatal: there is no valid fallback for a
//! group that is only partially synchronized, so callers halt instead of retrying.

use core::fmt;

/// Failure reported by a timer/compare/output operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmError {
    /// Counter (or trigger source) refused to start
    CounterStart,
    /// Counter did not stop
    CounterStop,
    /// Compare register write was rejected by the backend
    CompareWrite,
    /// Compare value does not fit the channel period
    CompareOutOfRange { ticks: u32, period: u32 },
    /// Output stage did not enable (e.g. a latched fault)
    OutputEnable,
    /// Output stage did not disable
    OutputDisable,
    /// Group or backend configuration is unusable
    InvalidConfig,
}

impl fmt::Display for PwmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CounterStart => write!(f, "counter start failed"),
            Self::CounterStop => write!(f, "counter stop failed"),
            Self::CompareWrite => write!(f, "compare write failed"),
            Self::CompareOutOfRange { ticks, period } => {
                write!(f, "compare {} ticks exceeds period {} ticks", ticks, period)
            }
            Self::OutputEnable => write!(f, "output enable failed"),
            Self::OutputDisable => write!(f, "output disable failed"),
            Self::InvalidConfig => write!(f, "invalid configuration"),
        }
    }
}

/// Result type for PWM operations
pub type PwmResult<T> = Result<T, PwmError>;
