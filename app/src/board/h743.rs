// STM32H743 board: TIM1 (motor 1) and TIM8 (motor 2) triggered by TIM2.

use hal::{clocks::Clocks, pac};

use syncpulse_algo::{Engine, Group};
use syncpulse_drivers::{
    pinout,
    tim::{self, TimConfig},
};

use crate::{fatal, run_engine};

const TIM_CFG: TimConfig = TimConfig { freq_hz: 10_000.0 };

pub fn run(dp: pac::Peripherals, clock_cfg: &Clocks) -> ! {
    pinout::init_all(&pinout::tim::ALL);

    let (master, slaves) =
        tim::init(dp.TIM2, dp.TIM1, dp.TIM8, &TIM_CFG, clock_cfg).unwrap_or_else(|e| fatal(e));

    let group = Group::new(0, master, slaves.phases()).unwrap_or_else(|e| fatal(e));

    run_engine(Engine::new([group]))
}
