#![no_main]
#![no_std]

use defmt_rtt as _;
use panic_probe as _;

use cortex_m_rt::entry;
use hal::{self, clocks::Clocks, pac};

use syncpulse_algo::{ControlSurface, Engine, PwmError, PwmUnit, TriggerSource};

mod board;

/// One group of six phases (two three-phase motors released by one master)
pub const GROUPS: usize = 1;
pub const PHASES: usize = 6;

/// Idle time between two engine iterations
const LOOP_DELAY_CYCLES: u32 = 1_000;

/// Engine inputs. Written by the debugger through the `CONTROL` symbol:
/// byte 0 run request (1 = RUN), then one duty byte per phase in %, then the
/// output enable byte.
#[no_mangle]
pub static CONTROL: ControlSurface<GROUPS, PHASES> = ControlSurface::new();

#[entry]
fn main() -> ! {
    let Some(dp) = pac::Peripherals::take() else {
        defmt::panic!("SYSTEM: peripherals already taken");
    };

    let clock_cfg = Clocks::default();
    if clock_cfg.setup().is_err() {
        defmt::panic!("SYSTEM: clock setup failed");
    }
    defmt::debug!(
        "SYSTEM: Clock frequency is {} MHz",
        clock_cfg.sysclk() / 1_000_000
    );

    board::run(dp, &clock_cfg)
}

/// Polls the engine forever. Any hardware error stops the firmware.
pub fn run_engine<T, U>(mut engine: Engine<T, U, GROUPS, PHASES>) -> !
where
    T: TriggerSource,
    U: PwmUnit,
{
    defmt::info!("ENGINE: ready, waiting for RUN on CONTROL");
    loop {
        if let Err(err) = engine.run_iteration(&CONTROL) {
            fatal(err);
        }
        cortex_m::asm::delay(LOOP_DELAY_CYCLES);
    }
}

/// Unrecoverable PWM failure: the outputs can no longer be trusted to be in lock-step.
pub fn fatal(err: PwmError) -> ! {
    defmt::error!("ENGINE: fatal error: {}", err);
    defmt::panic!("ENGINE: halted")
}

// same panicking *behavior* as `panic-probe` but doesn't print a panic message
// this prevents the panic message being printed *twice* when `defmt::panic` is invoked
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}
