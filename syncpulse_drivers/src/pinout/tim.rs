//! Advanced-timer PWM outputs on the STM32H743 board.
use super::PinDef;
use super::{PinMode, Port};

/// Motor 1 (TIM1 CH1..CH3)
pub const M1_U: PinDef = PinDef::new(Port::E, 9, PinMode::Alt(1));
pub const M1_V: PinDef = PinDef::new(Port::E, 11, PinMode::Alt(1));
pub const M1_W: PinDef = PinDef::new(Port::E, 13, PinMode::Alt(1));

/// Motor 2 (TIM8 CH1..CH3)
pub const M2_U: PinDef = PinDef::new(Port::C, 6, PinMode::Alt(3));
pub const M2_V: PinDef = PinDef::new(Port::C, 7, PinMode::Alt(3));
pub const M2_W: PinDef = PinDef::new(Port::C, 8, PinMode::Alt(3));

pub const ALL: [PinDef; 6] = [M1_U, M1_V, M1_W, M2_U, M2_V, M2_W];
