//! Const pin tables of the PWM outputs, one module per board.

use hal::gpio::{Pin, PinMode, Port};

#[cfg(feature = "hrtim")]
pub mod hrtim;
#[cfg(feature = "tim")]
pub mod tim;

/// Pin wiring known at compile time: port, number and the alternate function
/// that connects it to its timer output.
pub struct PinDef {
    port: Port,
    pin: u8,
    mode: PinMode,
}

impl PinDef {
    pub const fn new(port: Port, pin: u8, mode: PinMode) -> PinDef {
        PinDef { port, pin, mode }
    }

    /// Configures the GPIO and returns the HAL pin.
    pub fn init(&self) -> Pin {
        Pin::new(self.port, self.pin, self.mode)
    }
}

/// Hands every pin of a board table over to its timer.
pub fn init_all(pins: &[PinDef]) {
    for pin in pins {
        pin.init();
    }
    defmt::debug!("PINOUT: {} timer pins configured", pins.len());
}
