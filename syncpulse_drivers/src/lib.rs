//! Timer backends implementing `PwmUnit` / `TriggerSource` for the supported boards.
//! Pick one with the `hrtim` (STM32G474) or `tim` (STM32H743) feature.
#![no_std]

#[cfg(all(feature = "hrtim", feature = "tim"))]
compile_error!("features `hrtim` and `tim` select different chips; enable only one");

pub mod pinout;

#[cfg(feature = "hrtim")]
pub mod hrtim;

#[cfg(feature = "tim")]
pub mod tim;
