// Implements the Channel model: one compare-controlled PWM output tied to a period
// counter, plus the capability traits every hardware backend provides.

// Key Features:
// - PwmUnit: counter control, compare write and output gating of one output
// - TriggerSource: the master whose start releases every armed unit at once
// - Channel: owns a unit, keeps period/compare/output state mirrored in software
// - Guards the invariant 0 <= compare_ticks <= period_ticks before touching hardware

// Detailed Operation:
// A Channel is created with the period its unit was configured with and never
// changes it afterwards. Compare writes are range-checked against that period and
// only then forwarded to the unit; the unit is expected to latch them into a
// preloaded (shadow) register so they take effect at the next period boundary.
// Output state is tracked so redundant enable/disable writes can be skipped.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::error::{PwmError, PwmResult};
use crate::shadow::ShadowEntry;

/// One physical compare unit (timer channel, HRTIM timer, ...).
///
/// `start` only arms the counter: it must not be visibly running until the group's
/// [`TriggerSource`] emits its trigger. Arming also moves a preloaded compare value
/// into the active register, so the first period after the trigger already runs
/// with the last `set_compare`.
pub trait PwmUnit {
    /// Period in counter ticks, as configured
    fn period_ticks(&self) -> u32;

    /// Current counter value
    fn count(&self) -> u32;

    /// Force the counter to 0
    fn reset(&mut self) -> PwmResult<()>;

    /// Arm the counter (it starts counting on the master trigger) and make the
    /// pending compare value active
    fn start(&mut self) -> PwmResult<()>;

    /// Stop counting
    fn stop(&mut self) -> PwmResult<()>;

    /// Write the compare value (applied at the next period boundary)
    fn set_compare(&mut self, ticks: u32) -> PwmResult<()>;

    /// Connect the output stage
    fn enable_output(&mut self) -> PwmResult<()>;

    /// Disconnect the output stage
    fn disable_output(&mut self) -> PwmResult<()>;
}

/// Master timing source of a group. Starting it emits the synchronizing trigger.
pub trait TriggerSource {
    /// Force the master counter to 0
    fn reset(&mut self) -> PwmResult<()>;

    /// Start the master, releasing every armed unit
    fn start(&mut self) -> PwmResult<()>;

    /// Stop the master
    fn stop(&mut self) -> PwmResult<()>;
}

/// Identity of a channel: which group, which phase inside the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId {
    pub group: u8,
    pub phase: u8,
}

/// Software view of one PWM output.
pub struct Channel<U: PwmUnit> {
    pub(crate) id: ChannelId,
    pub(crate) unit: U,
    /// Fixed at construction
    pub(crate) period_ticks: u32,
    /// Last value handed to the unit
    pub(crate) compare_ticks: u32,
    pub(crate) output_enabled: bool,
    pub(crate) shadow: ShadowEntry,
}

impl<U: PwmUnit> Channel<U> {
    /// Wraps a configured unit. Outputs are assumed disconnected until the first
    /// synchronized start.
    pub fn new(id: ChannelId, unit: U) -> Self {
        let period_ticks = unit.period_ticks();
        Channel {
            id,
            unit,
            period_ticks,
            compare_ticks: 0,
            output_enabled: false,
            shadow: ShadowEntry::new(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn period_ticks(&self) -> u32 {
        self.period_ticks
    }

    pub fn compare_ticks(&self) -> u32 {
        self.compare_ticks
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    /// Current hardware counter value
    pub fn count(&self) -> u32 {
        self.unit.count()
    }

    pub fn unit(&self) -> &U {
        &self.unit
    }

    /// Writes a compare value unconditionally (no shadow check).
    pub fn write_compare(&mut self, ticks: u32) -> PwmResult<()> {
        if ticks > self.period_ticks {
            return Err(PwmError::CompareOutOfRange {
                ticks,
                period: self.period_ticks,
            });
        }
        self.unit.set_compare(ticks)?;
        self.compare_ticks = ticks;
        trace!(
            "CH{}.{}: compare {} / {}",
            self.id.group,
            self.id.phase,
            ticks,
            self.period_ticks
        );
        Ok(())
    }

    /// Connects or disconnects the output, skipping the write when nothing changes.
    /// Returns whether the hardware was touched.
    pub fn set_output(&mut self, enabled: bool) -> PwmResult<bool> {
        if enabled == self.output_enabled {
            return Ok(false);
        }
        if enabled {
            self.unit.enable_output()?;
        } else {
            self.unit.disable_output()?;
        }
        self.output_enabled = enabled;
        Ok(true)
    }

    /// Disconnects the output regardless of the tracked state.
    pub fn force_output_off(&mut self) -> PwmResult<()> {
        self.unit.disable_output()?;
        self.output_enabled = false;
        Ok(())
    }

    pub fn reset(&mut self) -> PwmResult<()> {
        self.unit.reset()
    }

    pub fn start(&mut self) -> PwmResult<()> {
        self.unit.start()
    }

    pub fn stop(&mut self) -> PwmResult<()> {
        self.unit.stop()
    }
}
