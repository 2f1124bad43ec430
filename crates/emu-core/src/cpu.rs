//! CPU core trait.

use crate::Bus;

/// A CPU core driven one instruction at a time.
///
/// The bus is passed in, not owned, so the machine that owns both can
/// hand the same bus to other components between steps. Every entry point
/// returns the number of bus cycles it consumed; the caller is responsible
/// for advancing the rest of the machine by that amount.
///
/// CPUs expose their internal state for observation and debugging.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Retire exactly one instruction and return the cycles it took.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Reset the CPU and return the cycles spent refilling the pipeline.
    fn reset<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Request a maskable interrupt.
    ///
    /// Returns the cycles spent entering the handler, or 0 when the
    /// request was not accepted (masked or locked out).
    fn interrupt<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Returns the address of the next instruction to execute.
    ///
    /// Returns `u32` to support all CPU address widths: 16-bit (6502, Z80),
    /// 24-bit (68000), and 32-bit (ARM7TDMI).
    fn pc(&self) -> u32;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;
}
