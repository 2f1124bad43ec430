//! Shared setup for the instruction tests.

#![allow(dead_code)]

use arm7tdmi::Arm7tdmi;
use emu_core::{Cpu, SimpleBus};

/// Where test programs are loaded.
pub const BASE: u32 = 0x1000;

/// Reset, switch to system mode with interrupts enabled and start an ARM
/// program at [`BASE`].
pub fn arm(program: &[u32]) -> (Arm7tdmi, SimpleBus) {
    let mut bus = SimpleBus::new();
    bus.load_words(BASE, program);
    let mut cpu = Arm7tdmi::new();
    cpu.reset(&mut bus);
    cpu.set_cpsr(0x1F);
    cpu.jump(&mut bus, BASE);
    (cpu, bus)
}

/// As [`arm`], for a Thumb program.
pub fn thumb(program: &[u16]) -> (Arm7tdmi, SimpleBus) {
    let mut bus = SimpleBus::new();
    bus.load_halfwords(BASE, program);
    let mut cpu = Arm7tdmi::new();
    cpu.reset(&mut bus);
    cpu.set_cpsr(0x1F);
    cpu.jump(&mut bus, BASE | 1);
    (cpu, bus)
}

/// Retire `n` instructions and return the cycles they took.
pub fn run(cpu: &mut Arm7tdmi, bus: &mut SimpleBus, n: usize) -> u32 {
    (0..n).map(|_| cpu.step(bus)).sum()
}
