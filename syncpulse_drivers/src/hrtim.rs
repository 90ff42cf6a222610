// Implements the HRTIM1 backend of the STM32G474 board: six timing units (A..F)
// released by the HRTIM master timer.

// Key Features:
// - One complementary output pair per timing unit with hardware dead time
// - Compare 1 preloaded, transferred to the active register on every period
// - Arming a unit forces a software update (CR2.TxSWU) so the preloaded compare is
//   already active on the first period after release
// - Slaves are "started" by joining an armed mask; the master writes the whole mask
//   into MCR in a single store, so every armed counter begins on the same HRTIM tick
// - Output enable/disable verified by reading OENR back (a latched fault keeps it clear)

// Detailed Operation:
// Timer X output 1 is set on the period event and reset on compare 1, so the high time
// equals the compare value in ticks; output 2 is its complement produced by the
// dead-time generator. The counter clock is fHRTIM (CKPSC = 0b101), i.e. 170 MHz on
// the board, which makes 17000 ticks a 10 kHz period.
// Units B..F have the register layout of unit A and are accessed through it.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::cell::Cell;

use hal::pac::{
    self, hrtim_common, hrtim_master, hrtim_tima, HRTIM_COMMON, HRTIM_MASTER, HRTIM_TIMA,
    HRTIM_TIMB, HRTIM_TIMC, HRTIM_TIMD, HRTIM_TIME, HRTIM_TIMF,
};
use syncpulse_algo::{PwmError, PwmResult, PwmUnit, TriggerSource};

// TIMxCR / MCR
const CR_CKPSC_MUL1: u32 = 0b101;
const CR_CONT: u32 = 1 << 3;
const CR_REPU: u32 = 1 << 17;
const CR_PREEN: u32 = 1 << 27;
const MCR_TCEN_SHIFT: u32 = 17;
// SETx1R / RSTx1R events
const EVT_PER: u32 = 1 << 2;
const EVT_CMP1: u32 = 1 << 3;
// OUTxR
const OUT_DTEN: u32 = 1 << 8;
// CR2.TASWU, TBSWU.. follow MSWU (bit 0)
const CR2_SWU_SHIFT: u32 = 1;
const ALL_OUTPUTS: u32 = 0x0FFF;

const DLL_TIMEOUT_LOOPS: u32 = 100_000;
/// Lowest period the counter accepts at CKPSC = 0b101
const PERIOD_MIN: u32 = 0x0003;
const PERIOD_MAX: u32 = 0xFFDF;

/// HRTIM timing units
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum HrTimer {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
}

impl HrTimer {
    pub const ALL: [HrTimer; 6] = [
        HrTimer::A,
        HrTimer::B,
        HrTimer::C,
        HrTimer::D,
        HrTimer::E,
        HrTimer::F,
    ];

    fn idx(self) -> u32 {
        self as u32
    }

    /// TxCEN bit in MCR
    fn enable_bit(self) -> u32 {
        1 << (MCR_TCEN_SHIFT + self.idx())
    }

    /// TxSWU bit in CR2
    fn update_bit(self) -> u32 {
        1 << (CR2_SWU_SHIFT + self.idx())
    }

    /// TxyOEN bits of both outputs in OENR/ODISR
    fn output_bits(self) -> u32 {
        0b11 << (2 * self.idx())
    }
}

/// Timing configuration shared by the master and every unit
#[derive(Debug, Clone, Copy)]
pub struct HrtimConfig {
    /// Period in HRTIM ticks (fHRTIM)
    pub period_ticks: u32,
    /// Rising and falling dead time in dead-time generator ticks (9 bits)
    pub dead_time: u16,
}

/// The six timing unit peripherals, A..F
pub struct HrtimUnits {
    pub tima: HRTIM_TIMA,
    pub timb: HRTIM_TIMB,
    pub timc: HRTIM_TIMC,
    pub timd: HRTIM_TIMD,
    pub time: HRTIM_TIME,
    pub timf: HRTIM_TIMF,
}

/// Owner of HRTIM1. Hands out units and the master, all borrowing it.
pub struct Hrtim {
    master: HRTIM_MASTER,
    common: HRTIM_COMMON,
    _units: HrtimUnits,
    period_ticks: u32,
    /// TxCEN bits of the units waiting for the next master start
    armed: Cell<u32>,
}

impl Hrtim {
    /// Clocks HRTIM1, calibrates its DLL and configures the master and every unit
    /// with the same period. All counters are stopped and all outputs disabled
    /// on return.
    pub fn new(
        rcc: &pac::RCC,
        master: HRTIM_MASTER,
        common: HRTIM_COMMON,
        units: HrtimUnits,
        cfg: &HrtimConfig,
    ) -> PwmResult<Self> {
        if !(PERIOD_MIN..=PERIOD_MAX).contains(&cfg.period_ticks) || cfg.dead_time > 0x1FF {
            defmt::error!("HRTIM: unusable config, period {} ticks", cfg.period_ticks);
            return Err(PwmError::InvalidConfig);
        }

        rcc.apb2enr.modify(|_, w| w.hrtim1en().set_bit());

        let hrtim = Hrtim {
            master,
            common,
            _units: units,
            period_ticks: cfg.period_ticks,
            armed: Cell::new(0),
        };

        hrtim.calibrate_dll()?;

        let period = cfg.period_ticks;
        let mst = hrtim.master_regs();
        mst.mcr.write(|w| unsafe { w.bits(CR_CKPSC_MUL1 | CR_CONT) });
        mst.mper.write(|w| unsafe { w.bits(period) });
        mst.mrep.write(|w| unsafe { w.bits(0) });
        mst.mcntr.write(|w| unsafe { w.bits(0) });

        let dead_time = u32::from(cfg.dead_time);
        for timer in HrTimer::ALL {
            let tim = hrtim.unit_regs(timer);
            tim.timacr
                .write(|w| unsafe { w.bits(CR_CKPSC_MUL1 | CR_CONT | CR_PREEN | CR_REPU) });
            tim.perar.write(|w| unsafe { w.bits(period) });
            tim.repar.write(|w| unsafe { w.bits(0) });
            tim.cmp1ar.write(|w| unsafe { w.bits(0) });
            tim.cntar.write(|w| unsafe { w.bits(0) });
            tim.dtar.write(|w| unsafe { w.bits(dead_time | (dead_time << 16)) });
            tim.seta1r.write(|w| unsafe { w.bits(EVT_PER) });
            tim.rsta1r.write(|w| unsafe { w.bits(EVT_CMP1) });
            tim.outar.write(|w| unsafe { w.bits(OUT_DTEN) });
        }

        hrtim.common.odisr.write(|w| unsafe { w.bits(ALL_OUTPUTS) });
        defmt::info!(
            "HRTIM: configured, period {} ticks, dead time {}",
            cfg.period_ticks,
            cfg.dead_time
        );
        Ok(hrtim)
    }

    pub fn period_ticks(&self) -> u32 {
        self.period_ticks
    }

    /// Compare/output unit for one timing unit
    pub fn unit(&self, timer: HrTimer) -> HrtimUnit<'_> {
        HrtimUnit { hrtim: self, timer }
    }

    /// Trigger source releasing every armed unit
    pub fn master(&self) -> HrtimMaster<'_> {
        HrtimMaster { hrtim: self }
    }

    fn master_regs(&self) -> &hrtim_master::RegisterBlock {
        &self.master
    }

    fn common_regs(&self) -> &hrtim_common::RegisterBlock {
        &self.common
    }

    fn unit_regs(&self, timer: HrTimer) -> &hrtim_tima::RegisterBlock {
        let ptr = match timer {
            HrTimer::A => HRTIM_TIMA::ptr() as *const hrtim_tima::RegisterBlock,
            HrTimer::B => HRTIM_TIMB::ptr() as *const hrtim_tima::RegisterBlock,
            HrTimer::C => HRTIM_TIMC::ptr() as *const hrtim_tima::RegisterBlock,
            HrTimer::D => HRTIM_TIMD::ptr() as *const hrtim_tima::RegisterBlock,
            HrTimer::E => HRTIM_TIME::ptr() as *const hrtim_tima::RegisterBlock,
            HrTimer::F => HRTIM_TIMF::ptr() as *const hrtim_tima::RegisterBlock,
        };
        // SAFETY: the block is owned through `_units` for as long as `self` lives, and
        // every timing unit has the same register layout as unit A.
        unsafe { &*ptr }
    }

    fn calibrate_dll(&self) -> PwmResult<()> {
        let common = self.common_regs();
        common.dllcr.modify(|_, w| w.cal().set_bit());
        for _ in 0..DLL_TIMEOUT_LOOPS {
            if common.isr.read().dllrdy().bit_is_set() {
                defmt::debug!("HRTIM: DLL calibrated");
                return Ok(());
            }
        }
        defmt::error!("HRTIM: DLL calibration timed out");
        Err(PwmError::InvalidConfig)
    }

    fn counting(&self, bits: u32) -> bool {
        self.master_regs().mcr.read().bits() & bits != 0
    }
}

/// One HRTIM timing unit (compare 1 + output pair).
pub struct HrtimUnit<'a> {
    hrtim: &'a Hrtim,
    timer: HrTimer,
}

impl HrtimUnit<'_> {
    pub fn timer(&self) -> HrTimer {
        self.timer
    }

    fn regs(&self) -> &hrtim_tima::RegisterBlock {
        self.hrtim.unit_regs(self.timer)
    }
}

impl PwmUnit for HrtimUnit<'_> {
    fn period_ticks(&self) -> u32 {
        self.hrtim.period_ticks
    }

    fn count(&self) -> u32 {
        self.regs().cntar.read().bits() & 0xFFFF
    }

    fn reset(&mut self) -> PwmResult<()> {
        // CNTxR is only writable while the counter is stopped
        if self.hrtim.counting(self.timer.enable_bit()) {
            return Err(PwmError::CounterStop);
        }
        self.regs().cntar.write(|w| unsafe { w.bits(0) });
        Ok(())
    }

    fn start(&mut self) -> PwmResult<()> {
        let bit = self.timer.enable_bit();
        if self.hrtim.counting(bit) {
            defmt::warn!("HRTIM: timer {} already counting, cannot arm", self.timer);
            return Err(PwmError::CounterStart);
        }
        // latch the preloaded compare before the master release
        self.hrtim
            .common_regs()
            .cr2
            .write(|w| unsafe { w.bits(self.timer.update_bit()) });
        self.hrtim.armed.set(self.hrtim.armed.get() | bit);
        Ok(())
    }

    fn stop(&mut self) -> PwmResult<()> {
        let bit = self.timer.enable_bit();
        self.hrtim.armed.set(self.hrtim.armed.get() & !bit);
        self.hrtim
            .master_regs()
            .mcr
            .modify(|r, w| unsafe { w.bits(r.bits() & !bit) });
        if self.hrtim.counting(bit) {
            return Err(PwmError::CounterStop);
        }
        Ok(())
    }

    fn set_compare(&mut self, ticks: u32) -> PwmResult<()> {
        let period = self.hrtim.period_ticks;
        if ticks > period {
            return Err(PwmError::CompareOutOfRange { ticks, period });
        }
        self.regs().cmp1ar.write(|w| unsafe { w.bits(ticks) });
        Ok(())
    }

    fn enable_output(&mut self) -> PwmResult<()> {
        let bits = self.timer.output_bits();
        let common = self.hrtim.common_regs();
        common.oenr.write(|w| unsafe { w.bits(bits) });
        if common.oenr.read().bits() & bits != bits {
            defmt::warn!("HRTIM: timer {} outputs held off", self.timer);
            return Err(PwmError::OutputEnable);
        }
        Ok(())
    }

    fn disable_output(&mut self) -> PwmResult<()> {
        let bits = self.timer.output_bits();
        let common = self.hrtim.common_regs();
        common.odisr.write(|w| unsafe { w.bits(bits) });
        if common.oenr.read().bits() & bits != 0 {
            return Err(PwmError::OutputDisable);
        }
        Ok(())
    }
}

/// The HRTIM master timer as group trigger.
pub struct HrtimMaster<'a> {
    hrtim: &'a Hrtim,
}

impl TriggerSource for HrtimMaster<'_> {
    fn reset(&mut self) -> PwmResult<()> {
        let mst = self.hrtim.master_regs();
        if mst.mcr.read().mcen().bit_is_set() {
            return Err(PwmError::CounterStop);
        }
        mst.mcntr.write(|w| unsafe { w.bits(0) });
        Ok(())
    }

    fn start(&mut self) -> PwmResult<()> {
        let armed = self.hrtim.armed.get();
        if armed == 0 {
            defmt::error!("HRTIM: master start with no armed timer");
            return Err(PwmError::InvalidConfig);
        }

        // single store: master and every armed unit start on the same clock edge
        let mst = self.hrtim.master_regs();
        mst.mcr
            .modify(|r, w| unsafe { w.bits(r.bits() | armed) }.mcen().set_bit());

        let mcr = mst.mcr.read();
        if mcr.mcen().bit_is_clear() || mcr.bits() & armed != armed {
            return Err(PwmError::CounterStart);
        }
        self.hrtim.armed.set(0);
        defmt::debug!("HRTIM: released mask {=u32:#x}", armed);
        Ok(())
    }

    fn stop(&mut self) -> PwmResult<()> {
        self.hrtim.armed.set(0);
        let mst = self.hrtim.master_regs();
        mst.mcr.modify(|_, w| w.mcen().clear_bit());
        if mst.mcr.read().mcen().bit_is_set() {
            return Err(PwmError::CounterStop);
        }
        Ok(())
    }
}
