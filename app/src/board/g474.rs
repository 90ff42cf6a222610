// STM32G474 board: HRTIM1 units A..F, released together by the HRTIM master.

use hal::{clocks::Clocks, pac};

use syncpulse_algo::{Engine, Group};
use syncpulse_drivers::{
    hrtim::{HrTimer, Hrtim, HrtimConfig, HrtimUnits},
    pinout,
};

use crate::{fatal, run_engine};

/// 10 kHz at fHRTIM = 170 MHz
const HRTIM_CFG: HrtimConfig = HrtimConfig {
    period_ticks: 17_000,
    dead_time: 100,
};
const EXPECTED_SYSCLK: u32 = 170_000_000;

pub fn run(dp: pac::Peripherals, clock_cfg: &Clocks) -> ! {
    if clock_cfg.sysclk() != EXPECTED_SYSCLK {
        defmt::warn!(
            "HRTIM: sysclk {} Hz, PWM will not run at 10 kHz",
            clock_cfg.sysclk()
        );
    }

    pinout::init_all(&pinout::hrtim::ALL);

    let units = HrtimUnits {
        tima: dp.HRTIM_TIMA,
        timb: dp.HRTIM_TIMB,
        timc: dp.HRTIM_TIMC,
        timd: dp.HRTIM_TIMD,
        time: dp.HRTIM_TIME,
        timf: dp.HRTIM_TIMF,
    };
    let hrtim = Hrtim::new(&dp.RCC, dp.HRTIM_MASTER, dp.HRTIM_COMMON, units, &HRTIM_CFG)
        .unwrap_or_else(|e| fatal(e));

    let units = HrTimer::ALL.map(|timer| hrtim.unit(timer));
    let group = Group::new(0, hrtim.master(), units).unwrap_or_else(|e| fatal(e));

    run_engine(Engine::new([group]))
}
