//! Unit tests for individual Thumb instructions.

mod common;

use arm7tdmi::{Arm7tdmi, C, InstructionSet, Mode, N, T, V, Z};
use common::{BASE, run, thumb};
use emu_core::{AccessWidth, Cpu};

fn flags(cpu: &Arm7tdmi) -> u32 {
    cpu.cpsr().bits() & (N | Z | C | V)
}

#[test]
fn test_mov_and_cmp_immediate() {
    let (mut cpu, mut bus) = thumb(&[0x2042, 0x2842]); // MOV r0, #0x42; CMP r0, #0x42
    assert_eq!(run(&mut cpu, &mut bus, 2), 2);
    assert_eq!(cpu.reg(0), 0x42);
    assert_eq!(flags(&cpu), Z | C);
    assert_eq!(cpu.pc(), BASE + 4);
}

#[test]
fn test_add_register() {
    let (mut cpu, mut bus) = thumb(&[0x1888]); // ADD r0, r1, r2
    cpu.set_reg(1, 3);
    cpu.set_reg(2, 4);
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(0), 7);
    assert_eq!(flags(&cpu), 0);
}

#[test]
fn test_lsl_immediate_carry() {
    let (mut cpu, mut bus) = thumb(&[0x0108]); // LSL r0, r1, #4
    cpu.set_reg(1, 0x1000_0001);
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(0), 0x10);
    assert_eq!(flags(&cpu), C);
}

#[test]
fn test_lsr_immediate_zero_shifts_by_32() {
    let (mut cpu, mut bus) = thumb(&[0x0808]); // LSR r0, r1, #32
    cpu.set_reg(1, 0x8000_0000);
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(0), 0);
    assert_eq!(flags(&cpu), Z | C);
}

#[test]
fn test_alu_orr() {
    let (mut cpu, mut bus) = thumb(&[0x4308]); // ORR r0, r1
    cpu.set_reg(0, 0xF0);
    cpu.set_reg(1, 0x0F);
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(0), 0xFF);
}

#[test]
fn test_alu_neg() {
    let (mut cpu, mut bus) = thumb(&[0x4248]); // NEG r0, r1
    cpu.set_reg(1, 5);
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(0), 0xFFFF_FFFB);
    assert_eq!(flags(&cpu), N);
}

#[test]
fn test_alu_mul_uses_destination_as_multiplier() {
    let (mut cpu, mut bus) = thumb(&[0x4348]); // MUL r0, r1
    cpu.set_reg(0, 6);
    cpu.set_reg(1, 7);
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(cpu.reg(0), 42);
}

#[test]
fn test_alu_shift_by_register_past_32() {
    let (mut cpu, mut bus) = thumb(&[0x4088]); // LSL r0, r1
    cpu.set_reg(0, 1);
    cpu.set_reg(1, 33);
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(cpu.reg(0), 0);
    assert_eq!(flags(&cpu), Z);
}

#[test]
fn test_hi_register_mov_keeps_flags() {
    let (mut cpu, mut bus) = thumb(&[0x4680]); // MOV r8, r0
    cpu.set_reg(0, 0x77);
    cpu.set_cpsr(cpu.cpsr().bits() | Z);
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(8), 0x77);
    assert_eq!(flags(&cpu), Z);
}

#[test]
fn test_bx_to_arm() {
    let (mut cpu, mut bus) = thumb(&[0x4700]); // BX r0
    cpu.set_reg(0, BASE + 0x100);
    assert_eq!(cpu.step(&mut bus), 3);
    assert_eq!(cpu.instruction_set(), InstructionSet::Arm);
    assert_eq!(cpu.pc(), BASE + 0x100);
}

#[test]
fn test_push_pop_round_trip() {
    // PUSH {r0, lr}; POP {r1, pc}
    let (mut cpu, mut bus) = thumb(&[0xB501, 0xBD02]);
    cpu.set_reg(13, 0x3000);
    cpu.set_reg(0, 0x11);
    cpu.set_reg(14, BASE + 0x41);

    cpu.step(&mut bus);
    assert_eq!(cpu.reg(13), 0x2FF8);
    assert_eq!(bus.peek(0x2FF8, AccessWidth::Word), 0x11);
    assert_eq!(bus.peek(0x2FFC, AccessWidth::Word), BASE + 0x41);

    cpu.step(&mut bus);
    assert_eq!(cpu.reg(1), 0x11);
    assert_eq!(cpu.reg(13), 0x3000);
    assert_eq!(cpu.pc(), BASE + 0x40);
    assert_eq!(cpu.instruction_set(), InstructionSet::Thumb);
}

#[test]
fn test_long_branch_link() {
    // BL +0xFC
    let (mut cpu, mut bus) = thumb(&[0xF000, 0xF87E]);

    assert_eq!(cpu.step(&mut bus), 1);
    assert!(cpu.exception_lock());
    assert_eq!(cpu.request_interrupt(&mut bus), 0);
    assert_eq!(cpu.mode(), Mode::System);

    assert_eq!(cpu.step(&mut bus), 3);
    assert!(!cpu.exception_lock());
    assert_eq!(cpu.pc(), BASE + 0x100);
    assert_eq!(cpu.reg(14), BASE + 5);
}

#[test]
fn test_long_branch_link_round_trip() {
    let (mut cpu, mut bus) = thumb(&[
        0xF000, 0xF806, // BL +0x0C
        0x2001, // MOVS r0, #1
        0, 0, 0, 0, 0,
        0x4770, // BX lr
    ]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.pc(), BASE + 0x10);
    assert_eq!(cpu.reg(14), BASE + 5);

    cpu.step(&mut bus);
    assert_eq!(cpu.pc(), BASE + 4);
    assert_eq!(cpu.instruction_set(), InstructionSet::Thumb);
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(0), 1);
    assert_eq!(cpu.pc(), BASE + 6);
}

#[test]
fn test_conditional_branch() {
    let (mut cpu, mut bus) = thumb(&[0xD002]); // BEQ +4
    assert_eq!(cpu.step(&mut bus), 1);
    assert_eq!(cpu.pc(), BASE + 2);

    // CMP r0, #0; BEQ +4
    let (mut cpu, mut bus) = thumb(&[0x2800, 0xD002]);
    assert_eq!(run(&mut cpu, &mut bus, 2), 4);
    assert_eq!(cpu.pc(), BASE + 10);
}

#[test]
fn test_branch_to_self() {
    let (mut cpu, mut bus) = thumb(&[0xE7FE]); // B .
    assert_eq!(cpu.step(&mut bus), 3);
    assert_eq!(cpu.pc(), BASE);
    assert_eq!(cpu.step(&mut bus), 3);
    assert_eq!(cpu.pc(), BASE);
}

#[test]
fn test_adjust_sp() {
    let (mut cpu, mut bus) = thumb(&[0xB082]); // SUB sp, #8
    cpu.set_reg(13, 0x3000);
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(13), 0x2FF8);
}

#[test]
fn test_load_address_aligns_pc() {
    // MOV r0, #0; ADD r0, pc, #8
    let (mut cpu, mut bus) = thumb(&[0x2000, 0xA002]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.reg(0), BASE + 12);
}

#[test]
fn test_ldmia_writes_back() {
    let (mut cpu, mut bus) = thumb(&[0xC806]); // LDMIA r0!, {r1, r2}
    bus.load_words(0x2000, &[0xA, 0xB]);
    cpu.set_reg(0, 0x2000);
    cpu.step(&mut bus);
    assert_eq!((cpu.reg(1), cpu.reg(2)), (0xA, 0xB));
    assert_eq!(cpu.reg(0), 0x2008);
}

#[test]
fn test_strh_and_ldrsb_register_offset() {
    // STRH r0, [r1, r2]; LDRSB r3, [r1, r2]
    let (mut cpu, mut bus) = thumb(&[0x5288, 0x568B]);
    cpu.set_reg(0, 0x1234_5680);
    cpu.set_reg(1, 0x2000);
    cpu.set_reg(2, 2);
    cpu.step(&mut bus);
    assert_eq!(bus.peek(0x2000, AccessWidth::Word), 0x5680_0000);
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(3), 0xFFFF_FF80);
}

#[test]
fn test_strb_immediate_offset() {
    let (mut cpu, mut bus) = thumb(&[0x7048]); // STRB r0, [r1, #1]
    cpu.set_reg(0, 0x1FF);
    cpu.set_reg(1, 0x2000);
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(bus.peek(0x2000, AccessWidth::Word), 0x0000_FF00);
}

#[test]
fn test_undefined_enters_arm_state() {
    let (mut cpu, mut bus) = thumb(&[0xDE00]);
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(cpu.mode(), Mode::Undefined);
    assert_eq!(cpu.instruction_set(), InstructionSet::Arm);
    assert_eq!(cpu.reg(14), BASE + 2);
    assert_eq!(cpu.spsr().map(|psr| psr.bits()), Some(0x1F | T));
    assert_eq!(cpu.pc(), 0x04);
}

#[test]
fn test_swi() {
    let (mut cpu, mut bus) = thumb(&[0xDF00]);
    assert_eq!(cpu.step(&mut bus), 3);
    assert_eq!(cpu.mode(), Mode::Supervisor);
    assert_eq!(cpu.reg(14), BASE + 2);
    assert_eq!(cpu.pc(), 0x08);
}
