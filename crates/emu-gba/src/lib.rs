//! Handheld machine built around the ARM7TDMI core.
//!
//! The crate owns the memory map, the interrupt and power-down controller,
//! the keypad and the scheduler that keeps the CPU and the timed
//! peripherals in lockstep. Video, audio, timers, serial, DMA and backup
//! storage plug in through the traits in [`device`].

mod bus;
mod cartridge;
mod config;
pub mod control;
pub mod device;
mod error;
mod gba;
pub mod keypad;

pub use bus::{BIOS_SIZE, GbaBus};
pub use cartridge::{Header, ROM_MAX_SIZE};
pub use config::{BootMode, GbaConfig};
pub use control::{Control, Interrupt, PowerDown};
pub use device::{Detached, Device, Dma, DmaTrigger, Io, NoDma, Signals, Video};
pub use error::GbaError;
pub use gba::Gba;
pub use keypad::{Button, Keypad, KeypadHandle};
