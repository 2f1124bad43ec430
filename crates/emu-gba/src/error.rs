//! Machine construction errors.

use thiserror::Error;

use crate::bus::BIOS_SIZE;
use crate::cartridge::ROM_MAX_SIZE;

/// Errors raised while building a [`Gba`](crate::Gba).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GbaError {
    #[error("BIOS image is {0} bytes, expected {expected}", expected = BIOS_SIZE)]
    BiosSize(usize),
    #[error("cartridge image is empty")]
    EmptyRom,
    #[error("cartridge image is {0} bytes, larger than {max}", max = ROM_MAX_SIZE)]
    RomTooLarge(usize),
}
