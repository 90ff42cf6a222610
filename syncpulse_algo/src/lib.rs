// Hardware-agnostic core of the synchronized PWM firmware: phase groups that start
// from the same trigger, glitch-free duty updates and a RUN/STOP engine polled
// from the main loop.

// Key Features:
// - Duty translation with a fixed [10..90]% safety clamp
// - Shadow cache that skips redundant compare writes
// - Typestate start/stop sequences (slaves before master, outputs before counters)
// - Debugger-writable control surface built from single-byte atomics

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

#![cfg_attr(not(test), no_std)]

// Must stay first so the logging macros are visible in every module below.
#[macro_use]
mod fmt;

pub mod channel;
pub mod duty;
pub mod engine;
pub mod error;
pub mod group;
pub mod shadow;
pub mod surface;
pub mod sync;

#[cfg(test)]
mod sim;

pub use channel::{Channel, ChannelId, PwmUnit, TriggerSource};
pub use duty::{clamp_pct, to_ticks, DUTY_DEFAULT_PCT, DUTY_MAX_PCT, DUTY_MIN_PCT};
pub use engine::{Engine, EngineState};
pub use error::{PwmError, PwmResult};
pub use group::Group;
pub use shadow::ShadowEntry;
pub use surface::{ControlSnapshot, ControlSurface, RunState};
