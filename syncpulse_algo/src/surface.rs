// Implements the control surface: the externally writable inputs of the engine
// (run request, per-phase duty, output enable) shared with a debugger or another
// control agent.

// Key Features:
// - One byte per field, stored in atomics: every load/store is a single
//   indivisible access on any target, so no locks are needed
// - `snapshot()` reads each field exactly once, clamps, and writes the clamped
//   value back so the observer always sees what the hardware will get
// - Write-back uses compare-exchange, so an external write that lands between
//   our read and our write-back is never overwritten

// Detailed Operation:
// The surface is meant to live in a `static` (see the firmware's CONTROL symbol):
// a debugger pokes the bytes directly, the engine only reads them through
// `snapshot()`. Raw state bytes other than 1 are treated as STOP and sanitized
// to 0. Duties outside [10..90] are clamped in place. Any nonzero output-enable
// byte means enabled and is rewritten as 1.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::sync::atomic::{AtomicU8, Ordering};

use crate::duty::{clamp_pct, DUTY_DEFAULT_PCT};

/// Run request as stored in the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RunState {
    Stop = 0,
    Run = 1,
}

impl RunState {
    /// Only the exact RUN encoding runs; everything else is a stop request.
    pub const fn from_raw(raw: u8) -> Self {
        if raw == RunState::Run as u8 {
            RunState::Run
        } else {
            RunState::Stop
        }
    }
}

/// Sanitized, single-read copy of the surface for one engine iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSnapshot<const G: usize, const N: usize> {
    pub state: RunState,
    /// Clamped to [10..90], indexed `[group][phase]`
    pub duty_pct: [[u8; N]; G],
    pub outputs_enabled: bool,
}

/// Inputs for `G` groups of `N` phases each.
pub struct ControlSurface<const G: usize, const N: usize> {
    desired_state: AtomicU8,
    duty_pct: [[AtomicU8; N]; G],
    /// 0 = disabled, anything else = enabled
    outputs_enabled: AtomicU8,
}

impl<const G: usize, const N: usize> ControlSurface<G, N> {
    /// STOP, 50% on every phase, outputs enabled.
    pub const fn new() -> Self {
        ControlSurface {
            desired_state: AtomicU8::new(RunState::Stop as u8),
            duty_pct: [const { [const { AtomicU8::new(DUTY_DEFAULT_PCT) }; N] }; G],
            outputs_enabled: AtomicU8::new(1),
        }
    }

    // ---- writer side (debug agent, host tools, tests) ----

    pub fn request(&self, state: RunState) {
        self.desired_state.store(state as u8, Ordering::Relaxed);
    }

    /// Stores an arbitrary state byte, as a debugger would.
    pub fn write_raw_state(&self, raw: u8) {
        self.desired_state.store(raw, Ordering::Relaxed);
    }

    /// Stores a raw duty value; out-of-range values are clamped on the next
    /// snapshot. Out-of-range indices are ignored.
    pub fn set_duty(&self, group: usize, phase: usize, pct: u8) {
        if let Some(cell) = self.duty_pct.get(group).and_then(|row| row.get(phase)) {
            cell.store(pct, Ordering::Relaxed);
        }
    }

    pub fn set_outputs_enabled(&self, enabled: bool) {
        self.outputs_enabled.store(enabled as u8, Ordering::Relaxed);
    }

    /// Stores an arbitrary output-enable byte, as a debugger would.
    pub fn write_raw_outputs_enabled(&self, raw: u8) {
        self.outputs_enabled.store(raw, Ordering::Relaxed);
    }

    // ---- observer side ----

    pub fn raw_state(&self) -> u8 {
        self.desired_state.load(Ordering::Relaxed)
    }

    pub fn duty(&self, group: usize, phase: usize) -> Option<u8> {
        self.duty_pct
            .get(group)
            .and_then(|row| row.get(phase))
            .map(|cell| cell.load(Ordering::Relaxed))
    }

    pub fn outputs_enabled(&self) -> bool {
        self.raw_outputs_enabled() != 0
    }

    pub fn raw_outputs_enabled(&self) -> u8 {
        self.outputs_enabled.load(Ordering::Relaxed)
    }

    // ---- engine side ----

    /// Reads every field once, sanitizes it and writes the sanitized value back.
    pub fn snapshot(&self) -> ControlSnapshot<G, N> {
        let raw_state = self.desired_state.load(Ordering::Relaxed);
        let state = RunState::from_raw(raw_state);
        write_back(&self.desired_state, raw_state, state as u8);

        let mut duty_pct = [[DUTY_DEFAULT_PCT; N]; G];
        for (row, cells) in duty_pct.iter_mut().zip(self.duty_pct.iter()) {
            for (pct, cell) in row.iter_mut().zip(cells.iter()) {
                let raw = cell.load(Ordering::Relaxed);
                *pct = clamp_pct(raw);
                write_back(cell, raw, *pct);
            }
        }

        let raw_enable = self.outputs_enabled.load(Ordering::Relaxed);
        let outputs_enabled = raw_enable != 0;
        write_back(&self.outputs_enabled, raw_enable, outputs_enabled as u8);

        ControlSnapshot {
            state,
            duty_pct,
            outputs_enabled,
        }
    }
}

impl<const G: usize, const N: usize> Default for ControlSurface<G, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[inline(always)]
fn write_back(cell: &AtomicU8, seen: u8, sanitized: u8) {
    if seen != sanitized {
        // A concurrent external write wins; it gets sanitized next iteration.
        let _ = cell.compare_exchange(seen, sanitized, Ordering::Relaxed, Ordering::Relaxed);
    }
}
