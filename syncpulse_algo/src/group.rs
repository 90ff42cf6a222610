// Implements the Group synchronizer: one master trigger source plus the ordered
// channels that must start counting from the same instant.

// Key Features:
// - Validates at construction that every channel shares one non-zero period
// - synchronized_start / synchronized_stop built on the typestate `Sequence`
// - Runtime duty updates filtered through each channel's shadow cache
// - Output gating that leaves the counters untouched

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::channel::{Channel, ChannelId, PwmUnit, TriggerSource};
use crate::duty::to_ticks;
use crate::error::{PwmError, PwmResult};
use crate::sync::Sequence;

/// Phase-aligned set of `N` channels released by one master.
pub struct Group<T: TriggerSource, U: PwmUnit, const N: usize> {
    id: u8,
    master: T,
    channels: [Channel<U>; N],
    running: bool,
}

impl<T: TriggerSource, U: PwmUnit, const N: usize> Group<T, U, N> {
    /// Builds a group from already configured hardware. Phase ids follow the
    /// order of `units`.
    pub fn new(id: u8, master: T, units: [U; N]) -> PwmResult<Self> {
        if N == 0 || N > u8::MAX as usize {
            return Err(PwmError::InvalidConfig);
        }

        let mut phase = 0u8;
        let channels = units.map(|unit| {
            let ch = Channel::new(ChannelId { group: id, phase }, unit);
            phase = phase.wrapping_add(1);
            ch
        });

        let period = channels[0].period_ticks();
        if period == 0 || channels.iter().any(|ch| ch.period_ticks() != period) {
            return Err(PwmError::InvalidConfig);
        }

        Ok(Group {
            id,
            master,
            channels,
            running: false,
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Common period of every channel
    pub fn period_ticks(&self) -> u32 {
        self.channels[0].period_ticks()
    }

    pub fn channels(&self) -> &[Channel<U>; N] {
        &self.channels
    }

    pub fn channel(&self, phase: usize) -> Option<&Channel<U>> {
        self.channels.get(phase)
    }

    /// True between a successful synchronized start and the next stop
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stops and resets the group, preloads `duty_pct`, arms the slaves and
    /// releases them with the master. Outputs are connected only if
    /// `outputs_enabled`.
    pub fn synchronized_start(&mut self, duty_pct: &[u8; N], outputs_enabled: bool) -> PwmResult<()> {
        self.running = false;
        Sequence::new(&mut self.master, &mut self.channels)
            .disable_outputs()?
            .halt_counters()?
            .reset_counters()?
            .preload(duty_pct)?
            .arm_slaves()?
            .release()?
            .gate_outputs(outputs_enabled)?;
        self.running = true;
        debug!(
            "SYNC: group {} started, {} channels, outputs {}",
            self.id,
            N,
            outputs_enabled
        );
        Ok(())
    }

    /// Disconnects every output, then stops the master and every channel.
    /// Safe to call on an already stopped group.
    pub fn synchronized_stop(&mut self) -> PwmResult<()> {
        self.running = false;
        Sequence::new(&mut self.master, &mut self.channels)
            .disable_outputs()?
            .halt_counters()?;
        debug!("SYNC: group {} stopped", self.id);
        Ok(())
    }

    /// Applies `duty_pct` to every channel whose tick value changed.
    /// Returns the number of compare registers written.
    pub fn apply_duties(&mut self, duty_pct: &[u8; N]) -> PwmResult<usize> {
        let mut writes = 0;
        for (ch, &pct) in self.channels.iter_mut().zip(duty_pct.iter()) {
            let ticks = to_ticks(ch.period_ticks(), pct);
            if ch.apply_if_changed(ticks)? {
                writes += 1;
            }
        }
        Ok(writes)
    }

    /// Connects or disconnects every output without touching the counters.
    /// Returns the number of outputs that changed.
    pub fn set_outputs(&mut self, enabled: bool) -> PwmResult<usize> {
        let mut changed = 0;
        for ch in self.channels.iter_mut() {
            if ch.set_output(enabled)? {
                changed += 1;
            }
        }
        Ok(changed)
    }
}
