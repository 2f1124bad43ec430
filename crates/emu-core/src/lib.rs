//! Core traits and types for cycle-driven emulation.
//!
//! Everything counts cycles of the master crystal. The CPU reports what each
//! instruction cost; the machine hands that time to every other component.

mod bus;
mod clock;
mod cpu;
mod observable;
mod ticks;

pub use bus::{AccessTiming, AccessWidth, Bus, ReadResult, SimpleBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use observable::{Observable, Value};
pub use ticks::Ticks;
