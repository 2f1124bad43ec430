//! Thumb (16-bit) instruction set.
//!
//! Every Thumb instruction executes unconditionally apart from the
//! conditional branch. Formats are numbered as in the ARM7TDMI data sheet.

use emu_core::{AccessWidth, Bus};

use crate::alu::{self, Opcode, Shift};
use crate::cpu::{Arm7tdmi, Indexing, LR, PC, SP, Transfer};
use crate::exception::Exception;
use crate::flags::Flags;
use crate::timing::{self, REGISTER_SHIFT_CYCLES};

const fn bit(op: u32, n: u32) -> bool {
    op & (1 << n) != 0
}

const fn low(op: u32, shift: u32) -> usize {
    ((op >> shift) & 7) as usize
}

const fn load(rd: usize, width: AccessWidth, sign: bool) -> Transfer {
    Transfer {
        load: true,
        rd,
        width,
        rotate: true,
        sign,
    }
}

const fn store(rd: usize, width: AccessWidth) -> Transfer {
    Transfer {
        load: false,
        rd,
        width,
        rotate: true,
        sign: false,
    }
}

const fn load_or_store(is_load: bool, rd: usize, width: AccessWidth) -> Transfer {
    if is_load { load(rd, width, false) } else { store(rd, width) }
}

/// Decode and execute one Thumb opcode. Returns the cycles it took,
/// including the fetch made by the step.
pub(crate) fn execute<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u16) -> u32 {
    let op = u32::from(op);
    match op >> 13 {
        0 if (op >> 11) & 3 == 3 => add_subtract(cpu, op),
        0 => shift_immediate(cpu, op),
        1 => immediate(cpu, op),
        2 if bit(op, 12) && bit(op, 9) => signed_transfer(cpu, bus, op),
        2 if bit(op, 12) => register_offset_transfer(cpu, bus, op),
        2 if bit(op, 11) => pc_relative_load(cpu, bus, op),
        2 if bit(op, 10) => hi_register(cpu, bus, op),
        2 => alu_operation(cpu, op),
        3 => immediate_offset_transfer(cpu, bus, op),
        4 if bit(op, 12) => sp_relative_transfer(cpu, bus, op),
        4 => halfword_transfer(cpu, bus, op),
        5 if bit(op, 12) && bit(op, 10) && bit(op, 9) => undefined(cpu, bus, op),
        5 if bit(op, 12) && bit(op, 10) => push_pop(cpu, bus, op),
        5 if bit(op, 12) && op & 0xF00 == 0 => adjust_sp(cpu, op),
        5 if bit(op, 12) => undefined(cpu, bus, op),
        5 => load_address(cpu, op),
        6 if bit(op, 12) => match (op >> 8) & 0xF {
            0xE => undefined(cpu, bus, op),
            0xF => cpu.fetch.seq + cpu.enter_exception(bus, Exception::SoftwareInterrupt),
            cond => conditional_branch(cpu, bus, op, cond),
        },
        6 => multiple_transfer(cpu, bus, op),
        _ if bit(op, 12) => long_branch_link(cpu, bus, op),
        _ if bit(op, 11) => undefined(cpu, bus, op),
        _ => branch(cpu, bus, op),
    }
}

fn undefined<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    cpu.fetch.seq + cpu.undefined(bus, op)
}

/// Format 1: LSL/LSR/ASR by immediate.
fn shift_immediate(cpu: &mut Arm7tdmi, op: u32) -> u32 {
    let shift = Shift::from_bits(op >> 11);
    let (value, carry) = shift.by_immediate(cpu.reg(low(op, 3)), (op >> 6) & 0x1F, cpu.cpsr.carry());
    cpu.regs.set(low(op, 0), value);
    cpu.cpsr.set_nzc(Flags::nz(value, carry, false));
    cpu.fetch.seq
}

/// Format 2: ADD/SUB with a register or 3-bit immediate.
fn add_subtract(cpu: &mut Arm7tdmi, op: u32) -> u32 {
    let field = low(op, 6);
    let operand = if bit(op, 10) {
        field as u32
    } else {
        cpu.reg(field)
    };
    let rs = cpu.reg(low(op, 3));
    let result = if bit(op, 9) {
        alu::sub(rs, operand)
    } else {
        alu::add_with_carry(rs, operand, false)
    };
    cpu.regs.set(low(op, 0), result.value);
    cpu.cpsr.set_flags(result.flags);
    cpu.fetch.seq
}

/// Format 3: MOV/CMP/ADD/SUB with an 8-bit immediate.
fn immediate(cpu: &mut Arm7tdmi, op: u32) -> u32 {
    let rd = low(op, 8);
    let imm = op & 0xFF;
    let value = cpu.reg(rd);
    match (op >> 11) & 3 {
        0 => {
            cpu.regs.set(rd, imm);
            cpu.cpsr.set_nz(Flags::nz(imm, false, false));
        }
        1 => cpu.cpsr.set_flags(alu::sub(value, imm).flags),
        2 => {
            let result = alu::add_with_carry(value, imm, false);
            cpu.regs.set(rd, result.value);
            cpu.cpsr.set_flags(result.flags);
        }
        _ => {
            let result = alu::sub(value, imm);
            cpu.regs.set(rd, result.value);
            cpu.cpsr.set_flags(result.flags);
        }
    }
    cpu.fetch.seq
}

/// Format 4: register-to-register ALU operations.
fn alu_operation(cpu: &mut Arm7tdmi, op: u32) -> u32 {
    let rd = low(op, 0);
    let a = cpu.reg(rd);
    let b = cpu.reg(low(op, 3));
    let flags = cpu.cpsr.flags();
    let mut cycles = cpu.fetch.seq;

    let logical = |opcode| alu::execute(opcode, a, b, flags.c, flags);
    let (result, write) = match (op >> 6) & 0xF {
        0x0 => (logical(Opcode::And), true),
        0x1 => (logical(Opcode::Eor), true),
        code @ (0x2 | 0x3 | 0x4 | 0x7) => {
            cycles += REGISTER_SHIFT_CYCLES;
            let shift = match code {
                0x2 => Shift::Lsl,
                0x3 => Shift::Lsr,
                0x4 => Shift::Asr,
                _ => Shift::Ror,
            };
            let (value, carry) = shift.by_register(a, b & 0xFF, flags.c);
            (alu::logical(value, carry, flags.v), true)
        }
        0x5 => (alu::add_with_carry(a, b, flags.c), true),
        0x6 => (alu::sub_with_carry(a, b, flags.c), true),
        0x8 => (logical(Opcode::Tst), false),
        0x9 => (alu::sub(0, b), true),
        0xA => (alu::sub(a, b), false),
        0xB => (alu::add_with_carry(a, b, false), false),
        0xC => (logical(Opcode::Orr), true),
        0xD => {
            cycles += timing::multiplier_cycles(a, true);
            (alu::multiply(b, a, 0, flags), true)
        }
        0xE => (logical(Opcode::Bic), true),
        _ => (logical(Opcode::Mvn), true),
    };

    cpu.cpsr.set_flags(result.flags);
    if write {
        cpu.regs.set(rd, result.value);
    }
    cycles
}

/// Format 5: ADD/CMP/MOV on the full register set, and BX.
fn hi_register<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let rd = low(op, 0) | usize::from(bit(op, 7)) << 3;
    let rs = ((op >> 3) & 0xF) as usize;
    let source = cpu.reg(rs);
    let mut cycles = cpu.fetch.seq;

    match (op >> 8) & 3 {
        0 | 2 => {
            let value = if (op >> 8) & 3 == 0 {
                cpu.reg(rd).wrapping_add(source)
            } else {
                source
            };
            cpu.regs.set(rd, value);
            if rd == PC {
                cycles += cpu.write_pc(bus, false);
            }
        }
        1 => cpu.cpsr.set_flags(alu::sub(cpu.reg(rd), source).flags),
        _ => cycles += cpu.branch(bus, source, true, None),
    }
    cycles
}

/// Format 6: LDR relative to the word-aligned PC.
fn pc_relative_load<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let address = (cpu.reg(PC) & !2).wrapping_add((op & 0xFF) * 4);
    let mut t = load(low(op, 8), AccessWidth::Word, false);
    t.rotate = false;
    cpu.transfer(bus, address, t)
}

/// Format 7: LDR/STR/LDRB/STRB with a register offset.
fn register_offset_transfer<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let address = cpu.reg(low(op, 3)).wrapping_add(cpu.reg(low(op, 6)));
    let width = if bit(op, 10) {
        AccessWidth::Byte
    } else {
        AccessWidth::Word
    };
    cpu.transfer(bus, address, load_or_store(bit(op, 11), low(op, 0), width))
}

/// Format 8: STRH/LDRSB/LDRH/LDRSH with a register offset.
fn signed_transfer<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let address = cpu.reg(low(op, 3)).wrapping_add(cpu.reg(low(op, 6)));
    let rd = low(op, 0);
    let t = match (op >> 10) & 3 {
        0 => store(rd, AccessWidth::Halfword),
        1 => load(rd, AccessWidth::Byte, true),
        2 => load(rd, AccessWidth::Halfword, false),
        _ => load(rd, AccessWidth::Halfword, true),
    };
    cpu.transfer(bus, address, t)
}

/// Format 9: LDR/STR/LDRB/STRB with a 5-bit immediate offset.
fn immediate_offset_transfer<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let width = if bit(op, 12) {
        AccessWidth::Byte
    } else {
        AccessWidth::Word
    };
    let offset = ((op >> 6) & 0x1F) * width.bytes();
    let address = cpu.reg(low(op, 3)).wrapping_add(offset);
    cpu.transfer(bus, address, load_or_store(bit(op, 11), low(op, 0), width))
}

/// Format 10: LDRH/STRH with a 5-bit immediate offset.
fn halfword_transfer<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let address = cpu.reg(low(op, 3)).wrapping_add(((op >> 6) & 0x1F) * 2);
    cpu.transfer(
        bus,
        address,
        load_or_store(bit(op, 11), low(op, 0), AccessWidth::Halfword),
    )
}

/// Format 11: LDR/STR relative to SP.
fn sp_relative_transfer<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let address = cpu.reg(SP).wrapping_add((op & 0xFF) * 4);
    cpu.transfer(
        bus,
        address,
        load_or_store(bit(op, 11), low(op, 8), AccessWidth::Word),
    )
}

/// Format 12: ADD Rd, PC/SP, #imm.
fn load_address(cpu: &mut Arm7tdmi, op: u32) -> u32 {
    let base = if bit(op, 11) {
        cpu.reg(SP)
    } else {
        cpu.reg(PC) & !2
    };
    cpu.regs.set(low(op, 8), base.wrapping_add((op & 0xFF) * 4));
    cpu.fetch.seq
}

/// Format 13: ADD SP, #±imm.
fn adjust_sp(cpu: &mut Arm7tdmi, op: u32) -> u32 {
    let magnitude = (op & 0x7F) * 4;
    let sp = cpu.reg(SP);
    let sp = if bit(op, 7) {
        sp.wrapping_sub(magnitude)
    } else {
        sp.wrapping_add(magnitude)
    };
    cpu.regs.set(SP, sp);
    cpu.fetch.seq
}

/// Format 14: PUSH {list, LR} and POP {list, PC}.
fn push_pop<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let is_load = bit(op, 11);
    let mut list = (op & 0xFF) as u16;
    if bit(op, 8) {
        list |= 1 << if is_load { PC } else { LR };
    }
    let ix = Indexing {
        rn: SP,
        offset: 0,
        up: is_load,
        pre: !is_load,
        writeback: true,
    };
    cpu.block_transfer(bus, is_load, list, ix, false)
}

/// Format 15: LDMIA/STMIA with write-back.
fn multiple_transfer<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let ix = Indexing {
        rn: low(op, 8),
        offset: 0,
        up: true,
        pre: false,
        writeback: true,
    };
    cpu.block_transfer(bus, bit(op, 11), (op & 0xFF) as u16, ix, false)
}

/// Format 16: B<cond> with an 8-bit offset.
fn conditional_branch<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32, cond: u32) -> u32 {
    if !cpu.condition_passed(cond) {
        return cpu.fetch.seq;
    }
    let offset = (op as u8 as i8 as u32) << 1;
    let target = cpu.reg(PC).wrapping_add(offset);
    cpu.fetch.seq + cpu.branch(bus, target, false, None)
}

/// Format 18: B with an 11-bit offset.
fn branch<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let target = cpu.reg(PC).wrapping_add(sign_extend_11(op) << 1);
    cpu.fetch.seq + cpu.branch(bus, target, false, None)
}

/// Format 19: the two halves of BL.
///
/// The first half parks the upper offset in LR and locks out interrupts
/// so that nothing can run between the two halves.
fn long_branch_link<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    if !bit(op, 11) {
        cpu.exception_lock = true;
        let upper = cpu.reg(PC).wrapping_add(sign_extend_11(op) << 12);
        cpu.regs.set(LR, upper);
        return cpu.fetch.seq;
    }
    let target = cpu.reg(LR).wrapping_add((op & 0x7FF) << 1);
    let link = cpu.next_pc() | 1;
    cpu.fetch.seq + cpu.branch(bus, target, false, Some(link))
}

const fn sign_extend_11(op: u32) -> u32 {
    (((op & 0x7FF) << 21) as i32 >> 21) as u32
}
