//! HRTIM complementary output pairs on the STM32G474 board (Tx1 high side, Tx2 low side).
use super::PinDef;
use super::{PinMode, Port};

/// Motor 1, phase U
pub const TA1: PinDef = PinDef::new(Port::A, 8, PinMode::Alt(13));
pub const TA2: PinDef = PinDef::new(Port::A, 9, PinMode::Alt(13));
/// Motor 1, phase V
pub const TB1: PinDef = PinDef::new(Port::A, 10, PinMode::Alt(13));
pub const TB2: PinDef = PinDef::new(Port::A, 11, PinMode::Alt(13));
/// Motor 1, phase W
pub const TC1: PinDef = PinDef::new(Port::B, 12, PinMode::Alt(13));
pub const TC2: PinDef = PinDef::new(Port::B, 13, PinMode::Alt(13));
/// Motor 2, phase U
pub const TD1: PinDef = PinDef::new(Port::B, 14, PinMode::Alt(13));
pub const TD2: PinDef = PinDef::new(Port::B, 15, PinMode::Alt(13));
/// Motor 2, phase V
pub const TE1: PinDef = PinDef::new(Port::C, 8, PinMode::Alt(3));
pub const TE2: PinDef = PinDef::new(Port::C, 9, PinMode::Alt(3));
/// Motor 2, phase W
pub const TF1: PinDef = PinDef::new(Port::C, 6, PinMode::Alt(13));
pub const TF2: PinDef = PinDef::new(Port::C, 7, PinMode::Alt(13));

pub const ALL: [PinDef; 12] = [TA1, TA2, TB1, TB2, TC1, TC2, TD1, TD2, TE1, TE2, TF1, TF2];
