// Implements the general-purpose timer backend of the STM32H743 board: TIM2 as
// master, TIM1 and TIM8 as slaves with three PWM channels each.

// Key Features:
// - TIM2 in master mode "Enable": TRGO follows its CEN bit
// - TIM1/TIM8 in slave trigger mode on ITR1 (TIM2 TRGO): CEN is set by hardware on
//   the trigger edge, so both slaves start on the same timer clock
// - CCR preload and ARR preload: compare writes take effect at the next update;
//   arming forces one (EGR.UG) so the first period after the trigger uses them
// - Output gating through CCxE plus the advanced-timer MOE bit (break keeps it clear)

// Detailed Operation:
// Slave "start" does not touch CEN: trigger mode already waits for TRGO. It checks the
// counter is not running and generates an update event, which copies the preloaded
// CCRs into the active registers and clears the already stopped counter. Every phase
// shares its slave timer with the other phases of the same motor, hence the `RefCell`;
// phases of a motor are driven strictly one after the other by the engine, so borrows
// never overlap.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::cell::RefCell;

use hal::{
    clocks::Clocks,
    pac::{TIM1, TIM2, TIM8},
    timer::{
        Alignment, CaptureCompareDma, CountDir, OutputCompare, TimChannel, Timer, TimerConfig,
        UpdateReqSrc,
    },
};
use syncpulse_algo::{PwmError, PwmResult, PwmUnit, TriggerSource};

// CR2.MMS = 0b001 (Enable)
const MMS_MASK: u32 = 0b111 << 4;
const MMS_ENABLE: u32 = 0b001 << 4;
// SMCR.SMS[3:0] and SMCR.TS[4:0] (split fields)
const SMCR_MASK: u32 = 0b111 | (1 << 16) | (0b111 << 4) | (0b11 << 20);
const SMS_TRIGGER: u32 = 0b110;
const TS_ITR1: u32 = 0b001 << 4;

/// Channels driven on each slave timer, one per motor phase
pub const PHASE_CHANNELS: [TimChannel; 3] = [TimChannel::C1, TimChannel::C2, TimChannel::C3];

/// Timer frequency of every PWM counter
#[derive(Debug, Clone, Copy)]
pub struct TimConfig {
    pub freq_hz: f32,
}

fn timer_config() -> TimerConfig {
    TimerConfig {
        one_pulse_mode: false,
        update_request_source: UpdateReqSrc::Any,
        auto_reload_preload: true,
        alignment: Alignment::Edge,
        capture_compare_dma: CaptureCompareDma::Update,
        direction: CountDir::Up,
    }
}

/// Both slave timers. Phases borrow it, the engine never owns it.
pub struct TimSlaves {
    tim1: RefCell<Timer<TIM1>>,
    tim8: RefCell<Timer<TIM8>>,
}

/// Configures the master and both slaves with the same frequency. Counters are
/// stopped and every output disconnected on return.
pub fn init(
    tim2: TIM2,
    tim1: TIM1,
    tim8: TIM8,
    cfg: &TimConfig,
    clock_cfg: &Clocks,
) -> PwmResult<(TimMaster, TimSlaves)> {
    let master = TimMaster::new(tim2, cfg, clock_cfg);

    let mut tim1 = Timer::new_tim1(tim1, cfg.freq_hz, timer_config(), clock_cfg);
    let mut tim8 = Timer::new_tim8(tim8, cfg.freq_hz, timer_config(), clock_cfg);

    for ch in PHASE_CHANNELS {
        tim1.enable_pwm_output(ch, OutputCompare::Pwm1, 0.0);
        tim1.disable_capture_compare(ch);
        tim8.enable_pwm_output(ch, OutputCompare::Pwm1, 0.0);
        tim8.disable_capture_compare(ch);
    }

    tim1.regs
        .smcr
        .modify(|r, w| unsafe { w.bits((r.bits() & !SMCR_MASK) | SMS_TRIGGER | TS_ITR1) });
    tim8.regs
        .smcr
        .modify(|r, w| unsafe { w.bits((r.bits() & !SMCR_MASK) | SMS_TRIGGER | TS_ITR1) });

    let period = u32::from(tim1.get_max_duty());
    if period == 0 || period != u32::from(tim8.get_max_duty()) {
        defmt::error!("TIM: TIM1/TIM8 periods differ or are zero");
        return Err(PwmError::InvalidConfig);
    }
    defmt::info!("TIM: configured, {} Hz, period {} ticks", cfg.freq_hz, period);

    let slaves = TimSlaves {
        tim1: RefCell::new(tim1),
        tim8: RefCell::new(tim8),
    };
    Ok((master, slaves))
}

impl TimSlaves {
    /// Motor 1 phases (TIM1 CH1..CH3) followed by motor 2 phases (TIM8 CH1..CH3)
    pub fn phases(&self) -> [TimPhase<'_>; 6] {
        [0, 1, 2, 3, 4, 5].map(|i| TimPhase {
            slave: if i < 3 {
                Slave::Tim1(&self.tim1)
            } else {
                Slave::Tim8(&self.tim8)
            },
            channel: PHASE_CHANNELS[i % 3],
        })
    }
}

/// TIM2 as trigger source of both slaves
pub struct TimMaster {
    timer: Timer<TIM2>,
}

impl TimMaster {
    fn new(tim2: TIM2, cfg: &TimConfig, clock_cfg: &Clocks) -> Self {
        let timer = Timer::new_tim2(tim2, cfg.freq_hz, timer_config(), clock_cfg);
        timer
            .regs
            .cr2
            .modify(|r, w| unsafe { w.bits((r.bits() & !MMS_MASK) | MMS_ENABLE) });
        TimMaster { timer }
    }
}

/// Shared handle to a slave; one phase of the motor
#[derive(Clone, Copy)]
enum Slave<'a> {
    Tim1(&'a RefCell<Timer<TIM1>>),
    Tim8(&'a RefCell<Timer<TIM8>>),
}

/// Runs `$body` with `$t` bound to the slave timer, whichever type it is.
macro_rules! with_slave {
    ($slave:expr, |$t:ident| $body:expr) => {
        match $slave {
            Slave::Tim1(cell) => {
                #[allow(unused_mut)]
                let mut $t = cell.borrow_mut();
                $body
            }
            Slave::Tim8(cell) => {
                #[allow(unused_mut)]
                let mut $t = cell.borrow_mut();
                $body
            }
        }
    };
}

/// One channel of a slave timer.
pub struct TimPhase<'a> {
    slave: Slave<'a>,
    channel: TimChannel,
}

impl PwmUnit for TimPhase<'_> {
    fn period_ticks(&self) -> u32 {
        with_slave!(self.slave, |t| u32::from(t.get_max_duty()))
    }

    fn count(&self) -> u32 {
        with_slave!(self.slave, |t| u32::from(t.read_count()))
    }

    fn reset(&mut self) -> PwmResult<()> {
        with_slave!(self.slave, |t| t.reset_count());
        Ok(())
    }

    fn start(&mut self) -> PwmResult<()> {
        let counting = with_slave!(self.slave, |t| t.regs.cr1.read().cen().bit_is_set());
        if counting {
            defmt::warn!("TIM: slave still counting, cannot arm");
            return Err(PwmError::CounterStart);
        }
        // CEN comes from TRGO; only latch the preloaded compares
        with_slave!(self.slave, |t| t.regs.egr.write(|w| w.ug().set_bit()));
        Ok(())
    }

    fn stop(&mut self) -> PwmResult<()> {
        let counting = with_slave!(self.slave, |t| {
            t.disable();
            t.regs.cr1.read().cen().bit_is_set()
        });
        if counting {
            return Err(PwmError::CounterStop);
        }
        Ok(())
    }

    fn set_compare(&mut self, ticks: u32) -> PwmResult<()> {
        let period = self.period_ticks();
        if ticks > period {
            return Err(PwmError::CompareOutOfRange { ticks, period });
        }
        let duty = u16::try_from(ticks).map_err(|_| PwmError::CompareWrite)?;
        let channel = self.channel;
        with_slave!(self.slave, |t| t.set_duty(channel, duty));
        Ok(())
    }

    fn enable_output(&mut self) -> PwmResult<()> {
        let channel = self.channel;
        let moe = with_slave!(self.slave, |t| {
            t.enable_capture_compare(channel);
            t.regs.bdtr.modify(|_, w| w.moe().set_bit());
            t.regs.bdtr.read().moe().bit_is_set()
        });
        if !moe {
            defmt::warn!("TIM: MOE held off by break input");
            return Err(PwmError::OutputEnable);
        }
        Ok(())
    }

    fn disable_output(&mut self) -> PwmResult<()> {
        let channel = self.channel;
        with_slave!(self.slave, |t| t.disable_capture_compare(channel));
        Ok(())
    }
}

impl TriggerSource for TimMaster {
    fn reset(&mut self) -> PwmResult<()> {
        self.timer.reset_count();
        Ok(())
    }

    fn start(&mut self) -> PwmResult<()> {
        self.timer.enable();
        if self.timer.regs.cr1.read().cen().bit_is_clear() {
            return Err(PwmError::CounterStart);
        }
        defmt::debug!("TIM: master TRGO raised");
        Ok(())
    }

    fn stop(&mut self) -> PwmResult<()> {
        self.timer.disable();
        if self.timer.regs.cr1.read().cen().bit_is_set() {
            return Err(PwmError::CounterStop);
        }
        Ok(())
    }
}
