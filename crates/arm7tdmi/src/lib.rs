//! ARM7TDMI CPU core.
//!
//! Each call to [`Cpu::step`](emu_core::Cpu::step) retires one ARM or Thumb
//! instruction and returns the bus cycles it took. The core owns no memory;
//! the bus is passed into every entry point.

mod arm;
pub mod alu;
mod cpu;
pub mod exception;
pub mod flags;
pub mod registers;
mod thumb;
pub mod timing;

pub use cpu::{
    Arm7tdmi, DIRECT_BOOT_ENTRY, DIRECT_BOOT_SP_IRQ, DIRECT_BOOT_SP_SVC, DIRECT_BOOT_SP_SYS,
    InstructionSet,
};
pub use exception::Exception;
pub use flags::{C, F, I, Mode, N, Psr, T, V, Z, condition_passed};
pub use registers::{Bank, Registers};
