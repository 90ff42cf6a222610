// Implements the start/stop sequencing of a synchronized group as a typestate chain.

// Key Features:
// - Each step consumes the previous stage, so steps cannot be skipped or reordered
// - Stop: outputs off -> counters halted
// - Start: (stop) -> counters zeroed -> duties preloaded -> slaves armed -> master
//   released -> outputs gated
// - Every hardware failure aborts the chain and is propagated to the caller

// Detailed Operation:
// A `Sequence` borrows the master and the channels of one group for the duration of
// a start or stop. Stage markers carry no data; they only decide which methods are
// callable. The only public entry point is `Sequence::new`, which yields the `Live`
// stage, and the only way forward from there is through `disable_outputs` and
// `halt_counters`. A start therefore always begins with a complete stop, and the
// master can only be released after every slave was armed.
//
// Disabling outputs before halting counters avoids latching a transiently active
// output level while the counter is still free-running. Starting slaves before the
// master matters because the master's start is the trigger that releases them.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::marker::PhantomData;

use crate::channel::{Channel, PwmUnit, TriggerSource};
use crate::duty::to_ticks;
use crate::error::PwmResult;

/// Counters may be running, outputs may be connected
pub struct Live;
/// Every output disconnected, counters untouched
pub struct OutputsOff;
/// Master and every slave counter stopped
pub struct Halted;
/// Every counter forced to 0
pub struct Zeroed;
/// Compare registers hold the requested duties
pub struct Preloaded;
/// Slaves wait for the trigger
pub struct Armed;
/// Master started, slaves counting in lock-step
pub struct Released;

/// One step of a start/stop sequence over a group's hardware.
pub struct Sequence<'g, T, U, S, const N: usize>
where
    T: TriggerSource,
    U: PwmUnit,
{
    master: &'g mut T,
    channels: &'g mut [Channel<U>; N],
    _stage: PhantomData<S>,
}

impl<'g, T, U, S, const N: usize> Sequence<'g, T, U, S, N>
where
    T: TriggerSource,
    U: PwmUnit,
{
    #[inline(always)]
    fn advance<Next>(self) -> Sequence<'g, T, U, Next, N> {
        Sequence {
            master: self.master,
            channels: self.channels,
            _stage: PhantomData,
        }
    }
}

impl<'g, T, U, const N: usize> Sequence<'g, T, U, Live, N>
where
    T: TriggerSource,
    U: PwmUnit,
{
    pub fn new(master: &'g mut T, channels: &'g mut [Channel<U>; N]) -> Self {
        Sequence {
            master,
            channels,
            _stage: PhantomData,
        }
    }

    /// Disconnects every output, whatever state it is tracked in.
    pub fn disable_outputs(self) -> PwmResult<Sequence<'g, T, U, OutputsOff, N>> {
        for ch in self.channels.iter_mut() {
            ch.force_output_off()?;
        }
        Ok(self.advance())
    }
}

impl<'g, T, U, const N: usize> Sequence<'g, T, U, OutputsOff, N>
where
    T: TriggerSource,
    U: PwmUnit,
{
    /// Stops the master first so nothing can re-trigger, then every slave.
    pub fn halt_counters(self) -> PwmResult<Sequence<'g, T, U, Halted, N>> {
        self.master.stop()?;
        for ch in self.channels.iter_mut() {
            ch.stop()?;
        }
        Ok(self.advance())
    }
}

impl<'g, T, U, const N: usize> Sequence<'g, T, U, Halted, N>
where
    T: TriggerSource,
    U: PwmUnit,
{
    /// Zeroes every counter. Cached compare values are dropped here: after a reset
    /// they no longer say anything about what the next run needs.
    pub fn reset_counters(self) -> PwmResult<Sequence<'g, T, U, Zeroed, N>> {
        self.master.reset()?;
        for ch in self.channels.iter_mut() {
            ch.reset()?;
            ch.invalidate_shadow();
        }
        Ok(self.advance())
    }
}

impl<'g, T, U, const N: usize> Sequence<'g, T, U, Zeroed, N>
where
    T: TriggerSource,
    U: PwmUnit,
{
    /// Writes the requested duty of every channel (shadow is empty, so all write).
    pub fn preload(self, duty_pct: &[u8; N]) -> PwmResult<Sequence<'g, T, U, Preloaded, N>> {
        for (ch, &pct) in self.channels.iter_mut().zip(duty_pct.iter()) {
            let ticks = to_ticks(ch.period_ticks(), pct);
            ch.apply_if_changed(ticks)?;
        }
        Ok(self.advance())
    }
}

impl<'g, T, U, const N: usize> Sequence<'g, T, U, Preloaded, N>
where
    T: TriggerSource,
    U: PwmUnit,
{
    /// Arms every slave; none of them counts until the master is released.
    pub fn arm_slaves(self) -> PwmResult<Sequence<'g, T, U, Armed, N>> {
        for ch in self.channels.iter_mut() {
            ch.start()?;
        }
        Ok(self.advance())
    }
}

impl<'g, T, U, const N: usize> Sequence<'g, T, U, Armed, N>
where
    T: TriggerSource,
    U: PwmUnit,
{
    /// Starts the master; its trigger releases all armed slaves at once.
    pub fn release(self) -> PwmResult<Sequence<'g, T, U, Released, N>> {
        self.master.start()?;
        Ok(self.advance())
    }
}

impl<'g, T, U, const N: usize> Sequence<'g, T, U, Released, N>
where
    T: TriggerSource,
    U: PwmUnit,
{
    /// Connects every output when `enabled`, otherwise leaves them disconnected
    /// while the counters keep running.
    pub fn gate_outputs(self, enabled: bool) -> PwmResult<()> {
        if enabled {
            for ch in self.channels.iter_mut() {
                ch.set_output(true)?;
            }
        }
        Ok(())
    }
}
