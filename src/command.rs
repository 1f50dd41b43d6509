//! Software data protection command sequences of the 28C256.
//!
//! Each step is one raw write cycle at a fixed unlock address.

pub(crate) const UNLOCK_ADDR_1: u16 = 0x5555;
pub(crate) const UNLOCK_ADDR_2: u16 = 0x2AAA;

#[repr(u8)]
#[derive(Clone, Copy)]
pub(crate) enum Command {
    Unlock1 = 0xAA,
    Unlock2 = 0x55,
    ExtendedMode = 0x80,
    ChipErase = 0x10,
    ProtectEnable = 0xA0,
    ProtectDisable = 0x20,
}

const fn step(addr: u16, cmd: Command) -> (u16, u8) {
    (addr, cmd as u8)
}

pub(crate) const CHIP_ERASE: [(u16, u8); 6] = [
    step(UNLOCK_ADDR_1, Command::Unlock1),
    step(UNLOCK_ADDR_2, Command::Unlock2),
    step(UNLOCK_ADDR_1, Command::ExtendedMode),
    step(UNLOCK_ADDR_1, Command::Unlock1),
    step(UNLOCK_ADDR_2, Command::Unlock2),
    step(UNLOCK_ADDR_1, Command::ChipErase),
];

pub(crate) const PROTECT_ENABLE: [(u16, u8); 3] = [
    step(UNLOCK_ADDR_1, Command::Unlock1),
    step(UNLOCK_ADDR_2, Command::Unlock2),
    step(UNLOCK_ADDR_1, Command::ProtectEnable),
];

pub(crate) const PROTECT_DISABLE: [(u16, u8); 6] = [
    step(UNLOCK_ADDR_1, Command::Unlock1),
    step(UNLOCK_ADDR_2, Command::Unlock2),
    step(UNLOCK_ADDR_1, Command::ExtendedMode),
    step(UNLOCK_ADDR_1, Command::Unlock1),
    step(UNLOCK_ADDR_2, Command::Unlock2),
    step(UNLOCK_ADDR_1, Command::ProtectDisable),
];
