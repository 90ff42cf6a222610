// Simulated timer hardware for unit tests.
//
// Every unit and master shares one bus that logs each call in order, so tests can
// assert sequencing, and that models the trigger: armed units only start counting
// when their group's master starts. Compare writes land in a preload register that
// becomes active when the unit is armed or its counter wraps.

use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use crate::channel::{PwmUnit, TriggerSource};
use crate::error::{PwmError, PwmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Reset(usize),
    Start(usize),
    Stop(usize),
    Compare(usize, u32),
    OutputOn(usize),
    OutputOff(usize),
    MasterReset(usize),
    MasterStart(usize),
    MasterStop(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Reset,
    Start,
    Stop,
    Compare,
    OutputOn,
    OutputOff,
    MasterStart,
    MasterStop,
}

#[derive(Default)]
struct UnitState {
    group: usize,
    period: u32,
    counter: u32,
    /// Last written compare, not yet in effect
    preload: u32,
    /// Compare the output is generated from
    active: u32,
    /// Active compare at the moment the master released the unit
    released_with: Option<u32>,
    armed: bool,
    running: bool,
    output: bool,
}

#[derive(Default)]
struct Bus {
    log: Vec<Op>,
    units: Vec<UnitState>,
    masters_running: Vec<bool>,
    faults: Vec<Fault>,
}

impl Bus {
    fn check(&self, fault: Fault, err: PwmError) -> PwmResult<()> {
        if self.faults.contains(&fault) {
            Err(err)
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Default)]
pub struct SimBus(Rc<RefCell<Bus>>);

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit to `group`. Ids are handed out in creation order from 0.
    pub fn unit(&self, group: usize, period: u32) -> SimUnit {
        let mut bus = self.0.borrow_mut();
        bus.units.push(UnitState {
            group,
            period,
            ..Default::default()
        });
        SimUnit {
            bus: self.clone(),
            id: bus.units.len() - 1,
        }
    }

    pub fn master(&self, group: usize) -> SimMaster {
        let mut bus = self.0.borrow_mut();
        if bus.masters_running.len() <= group {
            bus.masters_running.resize(group + 1, false);
        }
        SimMaster {
            bus: self.clone(),
            group,
        }
    }

    pub fn log(&self) -> Vec<Op> {
        self.0.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.0.borrow_mut().log.clear();
    }

    pub fn inject(&self, fault: Fault) {
        self.0.borrow_mut().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.0.borrow_mut().faults.clear();
    }

    /// Lets every running counter advance by `ticks`; a wrap latches the preload.
    pub fn advance(&self, ticks: u32) {
        for unit in self.0.borrow_mut().units.iter_mut() {
            if unit.running {
                unit.counter += ticks;
                if unit.counter >= unit.period {
                    unit.counter %= unit.period;
                    unit.active = unit.preload;
                }
            }
        }
    }

    pub fn counter(&self, id: usize) -> u32 {
        self.0.borrow().units[id].counter
    }

    /// Last compare value written (preload register)
    pub fn compare(&self, id: usize) -> u32 {
        self.0.borrow().units[id].preload
    }

    /// Compare value currently shaping the output
    pub fn active_compare(&self, id: usize) -> u32 {
        self.0.borrow().units[id].active
    }

    /// Active compare when the master last released the unit
    pub fn released_with(&self, id: usize) -> Option<u32> {
        self.0.borrow().units[id].released_with
    }

    pub fn running(&self, id: usize) -> bool {
        self.0.borrow().units[id].running
    }

    pub fn armed(&self, id: usize) -> bool {
        self.0.borrow().units[id].armed
    }

    pub fn output(&self, id: usize) -> bool {
        self.0.borrow().units[id].output
    }

    pub fn master_running(&self, group: usize) -> bool {
        self.0.borrow().masters_running[group]
    }

    pub fn compare_writes(&self, id: usize) -> usize {
        self.count_ops(|op| matches!(op, Op::Compare(unit, _) if *unit == id))
    }

    pub fn count_ops(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.0.borrow().log.iter().filter(|op| pred(op)).count()
    }

    /// Position of the first logged op matching `pred`
    pub fn position(&self, pred: impl Fn(&Op) -> bool) -> Option<usize> {
        self.0.borrow().log.iter().position(pred)
    }

    /// Position of the last logged op matching `pred`
    pub fn last_position(&self, pred: impl Fn(&Op) -> bool) -> Option<usize> {
        self.0.borrow().log.iter().rposition(pred)
    }
}

pub struct SimUnit {
    bus: SimBus,
    id: usize,
}

impl SimUnit {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl PwmUnit for SimUnit {
    fn period_ticks(&self) -> u32 {
        self.bus.0.borrow().units[self.id].period
    }

    fn count(&self) -> u32 {
        self.bus.counter(self.id)
    }

    fn reset(&mut self) -> PwmResult<()> {
        let mut bus = self.bus.0.borrow_mut();
        bus.check(Fault::Reset, PwmError::InvalidConfig)?;
        bus.log.push(Op::Reset(self.id));
        bus.units[self.id].counter = 0;
        Ok(())
    }

    fn start(&mut self) -> PwmResult<()> {
        let mut bus = self.bus.0.borrow_mut();
        bus.check(Fault::Start, PwmError::CounterStart)?;
        bus.log.push(Op::Start(self.id));
        let unit = &mut bus.units[self.id];
        unit.armed = true;
        unit.active = unit.preload;
        Ok(())
    }

    fn stop(&mut self) -> PwmResult<()> {
        let mut bus = self.bus.0.borrow_mut();
        bus.check(Fault::Stop, PwmError::CounterStop)?;
        bus.log.push(Op::Stop(self.id));
        let unit = &mut bus.units[self.id];
        unit.armed = false;
        unit.running = false;
        Ok(())
    }

    fn set_compare(&mut self, ticks: u32) -> PwmResult<()> {
        let mut bus = self.bus.0.borrow_mut();
        bus.check(Fault::Compare, PwmError::CompareWrite)?;
        bus.log.push(Op::Compare(self.id, ticks));
        bus.units[self.id].preload = ticks;
        Ok(())
    }

    fn enable_output(&mut self) -> PwmResult<()> {
        let mut bus = self.bus.0.borrow_mut();
        bus.check(Fault::OutputOn, PwmError::OutputEnable)?;
        bus.log.push(Op::OutputOn(self.id));
        bus.units[self.id].output = true;
        Ok(())
    }

    fn disable_output(&mut self) -> PwmResult<()> {
        let mut bus = self.bus.0.borrow_mut();
        bus.check(Fault::OutputOff, PwmError::OutputDisable)?;
        bus.log.push(Op::OutputOff(self.id));
        bus.units[self.id].output = false;
        Ok(())
    }
}

pub struct SimMaster {
    bus: SimBus,
    group: usize,
}

impl TriggerSource for SimMaster {
    fn reset(&mut self) -> PwmResult<()> {
        self.bus.0.borrow_mut().log.push(Op::MasterReset(self.group));
        Ok(())
    }

    fn start(&mut self) -> PwmResult<()> {
        let mut bus = self.bus.0.borrow_mut();
        bus.check(Fault::MasterStart, PwmError::CounterStart)?;
        bus.log.push(Op::MasterStart(self.group));
        bus.masters_running[self.group] = true;
        let group = self.group;
        for unit in bus.units.iter_mut().filter(|u| u.group == group && u.armed) {
            unit.armed = false;
            unit.running = true;
            unit.released_with = Some(unit.active);
        }
        Ok(())
    }

    fn stop(&mut self) -> PwmResult<()> {
        let mut bus = self.bus.0.borrow_mut();
        bus.check(Fault::MasterStop, PwmError::CounterStop)?;
        bus.log.push(Op::MasterStop(self.group));
        bus.masters_running[self.group] = false;
        Ok(())
    }
}
