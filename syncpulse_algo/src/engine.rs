// Implements the engine state machine polled from the firmware main loop.

// Key Features:
// - STOPPED/RUNNING states driven by the control surface's run request
// - STOPPED -> RUNNING: synchronized start of every group
// - RUNNING -> STOPPED: synchronized stop of every group
// - RUNNING: duty updates through the shadow cache, edge-triggered output gating
// - STOPPED: no hardware access, the surface is still sanitized every pass
// - Every hardware failure is returned as-is; the caller treats it as fatal

// Detailed Operation:
// `run_iteration` takes one snapshot of the surface (each field read once, clamped
// and written back) and then decides purely on that copy, so a debugger writing in
// the middle of the pass cannot produce a mixed decision. Gating the outputs off
// while RUNNING keeps all counters in lock-step; turning them back on does not reset
// anything because synchronization was never lost.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::channel::{PwmUnit, TriggerSource};
use crate::error::PwmResult;
use crate::group::Group;
use crate::surface::{ControlSnapshot, ControlSurface, RunState};

/// Engine state. There is exactly one engine per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineState {
    Stopped,
    Running,
}

/// Drives `G` groups of `N` channels from a `ControlSurface<G, N>`.
pub struct Engine<T: TriggerSource, U: PwmUnit, const G: usize, const N: usize> {
    groups: [Group<T, U, N>; G],
    state: EngineState,
    outputs_active: bool,
}

impl<T: TriggerSource, U: PwmUnit, const G: usize, const N: usize> Engine<T, U, G, N> {
    /// Takes ownership of the configured groups. Starts in STOPPED; hardware is
    /// left as configured until the first start.
    pub fn new(groups: [Group<T, U, N>; G]) -> Self {
        Engine {
            groups,
            state: EngineState::Stopped,
            outputs_active: false,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// True when the outputs of every group are connected
    pub fn outputs_active(&self) -> bool {
        self.outputs_active
    }

    pub fn groups(&self) -> &[Group<T, U, N>; G] {
        &self.groups
    }

    pub fn group(&self, idx: usize) -> Option<&Group<T, U, N>> {
        self.groups.get(idx)
    }

    /// One pass of the state machine. Never blocks.
    pub fn run_iteration(&mut self, surface: &ControlSurface<G, N>) -> PwmResult<EngineState> {
        let snap = surface.snapshot();

        match (self.state, snap.state) {
            (EngineState::Stopped, RunState::Run) => {
                info!("ENGINE: RUN requested, starting {} group(s)", G);
                self.start_with(&snap)?;
            }
            (EngineState::Running, RunState::Stop) => {
                info!("ENGINE: STOP requested");
                self.stop()?;
            }
            (EngineState::Running, RunState::Run) => {
                self.apply_duties(&snap)?;
                self.gate_outputs(snap.outputs_enabled)?;
            }
            // Nothing to do: the snapshot already sanitized the surface.
            (EngineState::Stopped, RunState::Stop) => {}
        }

        Ok(self.state)
    }

    /// Synchronized start of every group with the surface's current values,
    /// bypassing the run request.
    pub fn start(&mut self, surface: &ControlSurface<G, N>) -> PwmResult<()> {
        let snap = surface.snapshot();
        self.start_with(&snap)
    }

    /// Synchronized stop of every group, bypassing the run request.
    pub fn stop(&mut self) -> PwmResult<()> {
        // Recorded first: on failure the hardware is in an unknown, non-running state.
        self.state = EngineState::Stopped;
        self.outputs_active = false;
        for group in self.groups.iter_mut() {
            group.synchronized_stop()?;
        }
        info!("ENGINE: stopped");
        Ok(())
    }

    fn start_with(&mut self, snap: &ControlSnapshot<G, N>) -> PwmResult<()> {
        self.state = EngineState::Stopped;
        self.outputs_active = false;
        for (group, duty_pct) in self.groups.iter_mut().zip(snap.duty_pct.iter()) {
            group.synchronized_start(duty_pct, snap.outputs_enabled)?;
        }
        self.state = EngineState::Running;
        self.outputs_active = snap.outputs_enabled;
        info!("ENGINE: running, outputs {}", self.outputs_active);
        Ok(())
    }

    fn apply_duties(&mut self, snap: &ControlSnapshot<G, N>) -> PwmResult<()> {
        for (group, duty_pct) in self.groups.iter_mut().zip(snap.duty_pct.iter()) {
            group.apply_duties(duty_pct)?;
        }
        Ok(())
    }

    fn gate_outputs(&mut self, enabled: bool) -> PwmResult<()> {
        if enabled == self.outputs_active {
            return Ok(());
        }
        for group in self.groups.iter_mut() {
            group.set_outputs(enabled)?;
        }
        self.outputs_active = enabled;
        info!("ENGINE: outputs {}", if enabled { "enabled" } else { "suppressed" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Fault, Op, SimBus, SimMaster, SimUnit};
    use crate::PwmError;

    type TestEngine = Engine<SimMaster, SimUnit, 2, 3>;

    // Unit ids: group 0 -> 0..3, group 1 -> 3..6
    fn engine(bus: &SimBus) -> TestEngine {
        let g0 = Group::new(0, bus.master(0), [0; 3].map(|_| bus.unit(0, 17_000))).unwrap();
        let g1 = Group::new(1, bus.master(1), [0; 3].map(|_| bus.unit(1, 17_000))).unwrap();
        Engine::new([g0, g1])
    }

    fn starts(bus: &SimBus) -> usize {
        bus.count_ops(|op| matches!(op, Op::MasterStart(_)))
    }

    #[test]
    fn stopped_engine_leaves_hardware_alone() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();
        surface.set_duty(0, 0, 3);

        assert_eq!(eng.run_iteration(&surface).unwrap(), EngineState::Stopped);
        assert!(bus.log().is_empty());
        // still sanitized for the observer
        assert_eq!(surface.duty(0, 0), Some(10));
    }

    #[test]
    fn run_request_starts_each_group_once() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();

        surface.request(RunState::Run);
        assert_eq!(eng.run_iteration(&surface).unwrap(), EngineState::Running);
        assert_eq!(bus.count_ops(|op| matches!(op, Op::MasterStart(0))), 1);
        assert_eq!(bus.count_ops(|op| matches!(op, Op::MasterStart(1))), 1);

        eng.run_iteration(&surface).unwrap();
        eng.run_iteration(&surface).unwrap();
        assert_eq!(starts(&bus), 2);
    }

    #[test]
    fn running_engine_applies_duty_changes() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();
        surface.request(RunState::Run);
        eng.run_iteration(&surface).unwrap();

        surface.set_duty(1, 2, 75);
        eng.run_iteration(&surface).unwrap();

        assert_eq!(bus.compare(5), 12_750);
        assert_eq!(bus.compare_writes(5), 2);
        assert_eq!(bus.compare_writes(0), 1);
        assert_eq!(starts(&bus), 2);
    }

    #[test]
    fn running_duty_change_takes_effect_at_the_next_period() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();
        surface.request(RunState::Run);
        eng.run_iteration(&surface).unwrap();
        assert_eq!(bus.active_compare(5), 8_500);

        surface.set_duty(1, 2, 75);
        eng.run_iteration(&surface).unwrap();
        assert_eq!(bus.compare(5), 12_750);
        assert_eq!(bus.active_compare(5), 8_500, "no mid-period change");

        bus.advance(17_000);
        assert_eq!(bus.active_compare(5), 12_750);
    }

    #[test]
    fn stop_request_halts_everything() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();
        surface.request(RunState::Run);
        eng.run_iteration(&surface).unwrap();

        surface.request(RunState::Stop);
        assert_eq!(eng.run_iteration(&surface).unwrap(), EngineState::Stopped);
        for id in 0..6 {
            assert!(!bus.running(id));
            assert!(!bus.output(id));
        }
        assert!(!eng.outputs_active());
    }

    #[test]
    fn duties_are_not_applied_while_stopped() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();
        surface.request(RunState::Run);
        eng.run_iteration(&surface).unwrap();
        surface.request(RunState::Stop);
        eng.run_iteration(&surface).unwrap();
        bus.clear_log();

        surface.set_duty(0, 1, 80);
        eng.run_iteration(&surface).unwrap();
        assert!(bus.log().is_empty());
    }

    #[test]
    fn restart_uses_values_written_while_stopped() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();
        surface.request(RunState::Run);
        eng.run_iteration(&surface).unwrap();
        surface.request(RunState::Stop);
        eng.run_iteration(&surface).unwrap();

        surface.set_duty(0, 1, 80);
        surface.request(RunState::Run);
        eng.run_iteration(&surface).unwrap();
        assert_eq!(bus.compare(1), 13_600);
    }

    #[test]
    fn output_gating_while_running_keeps_counters() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();
        surface.request(RunState::Run);
        eng.run_iteration(&surface).unwrap();
        assert!(eng.outputs_active());

        surface.set_outputs_enabled(false);
        eng.run_iteration(&surface).unwrap();
        assert!(!eng.outputs_active());
        assert_eq!(eng.state(), EngineState::Running);
        for id in 0..6 {
            assert!(bus.running(id));
            assert!(!bus.output(id));
        }

        bus.clear_log();
        eng.run_iteration(&surface).unwrap();
        assert!(bus.log().is_empty());

        surface.set_outputs_enabled(true);
        eng.run_iteration(&surface).unwrap();
        assert_eq!(bus.count_ops(|op| matches!(op, Op::OutputOn(_))), 6);
        assert_eq!(
            bus.count_ops(|op| matches!(op, Op::Reset(_) | Op::Stop(_) | Op::MasterStart(_))),
            0
        );
    }

    #[test]
    fn direct_start_and_stop_record_the_state() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();

        eng.start(&surface).unwrap();
        assert_eq!(eng.state(), EngineState::Running);
        assert_eq!(starts(&bus), 2);

        eng.stop().unwrap();
        assert_eq!(eng.state(), EngineState::Stopped);
        // the surface still says STOP, so nothing restarts
        eng.run_iteration(&surface).unwrap();
        assert_eq!(starts(&bus), 2);
    }

    #[test]
    fn start_failure_is_propagated_and_not_retried_as_running() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();
        surface.request(RunState::Run);
        bus.inject(Fault::OutputOn);

        assert_eq!(eng.run_iteration(&surface), Err(PwmError::OutputEnable));
        assert_eq!(eng.state(), EngineState::Stopped);
        assert!(!eng.outputs_active());
    }

    #[test]
    fn duty_write_failure_while_running_is_propagated() {
        let bus = SimBus::new();
        let mut eng = engine(&bus);
        let surface = ControlSurface::new();
        surface.request(RunState::Run);
        eng.run_iteration(&surface).unwrap();

        bus.inject(Fault::Compare);
        surface.set_duty(0, 0, 20);
        assert_eq!(eng.run_iteration(&surface), Err(PwmError::CompareWrite));
    }
}
