//! ARM (32-bit) instruction set.

use emu_core::{AccessWidth, Bus};

use crate::alu::{self, Opcode, Shift};
use crate::cpu::{Arm7tdmi, Indexing, PC, Transfer};
use crate::exception::Exception;
use crate::flags::{FLAGS_MASK, Psr};
use crate::timing::{self, CP14_READ_CYCLES, CP14_WRITE_CYCLES, REGISTER_SHIFT_CYCLES};

/// The only coprocessor that answers register transfers.
const CP14: u32 = 14;

const fn bit(op: u32, n: u32) -> bool {
    op & (1 << n) != 0
}

const fn reg(op: u32, shift: u32) -> usize {
    ((op >> shift) & 0xF) as usize
}

/// Decode and execute one ARM opcode. Returns the cycles it took,
/// including the fetch made by the step.
pub(crate) fn execute<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    if !cpu.condition_passed(op >> 28) {
        return cpu.fetch.seq;
    }

    match (op >> 25) & 7 {
        0 => {
            if op & 0x0FFF_FFF0 == 0x012F_FF10 {
                return branch_exchange(cpu, bus, op);
            }
            match (op >> 4) & 0xF {
                0x9 if bit(op, 24) => {
                    if op & 0x00B0_0F00 == 0 {
                        swap(cpu, bus, op)
                    } else {
                        undefined(cpu, bus, op)
                    }
                }
                0x9 if bit(op, 23) => multiply_long(cpu, op),
                0x9 if bit(op, 22) => undefined(cpu, bus, op),
                0x9 => multiply(cpu, op),
                0xB | 0xD | 0xF => {
                    if bit(op, 22) || op & 0xF00 == 0 {
                        halfword_transfer(cpu, bus, op)
                    } else {
                        undefined(cpu, bus, op)
                    }
                }
                _ if is_status_transfer(op) => {
                    if op & 0xFF0 == 0 {
                        status_transfer(cpu, op)
                    } else {
                        undefined(cpu, bus, op)
                    }
                }
                _ => data_processing(cpu, bus, op),
            }
        }
        1 if is_status_transfer(op) => {
            if bit(op, 21) {
                status_transfer(cpu, op)
            } else {
                undefined(cpu, bus, op)
            }
        }
        1 => data_processing(cpu, bus, op),
        2 => single_transfer(cpu, bus, op),
        3 if bit(op, 4) => undefined(cpu, bus, op),
        3 => single_transfer(cpu, bus, op),
        4 => block_transfer(cpu, bus, op),
        5 => branch(cpu, bus, op),
        // LDC/STC: no coprocessor answers.
        6 => undefined(cpu, bus, op),
        _ if bit(op, 24) => software_interrupt(cpu, bus),
        _ if bit(op, 4) => coprocessor_register(cpu, bus, op),
        // CDP
        _ => undefined(cpu, bus, op),
    }
}

/// A test/compare opcode without S: the slot used by MRS/MSR.
const fn is_status_transfer(op: u32) -> bool {
    bit(op, 24) && !bit(op, 23) && !bit(op, 20)
}

fn undefined<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    cpu.fetch.seq + cpu.undefined(bus, op)
}

fn software_interrupt<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B) -> u32 {
    cpu.fetch.seq + cpu.enter_exception(bus, Exception::SoftwareInterrupt)
}

fn branch_exchange<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let target = cpu.reg(reg(op, 0));
    cpu.fetch.seq + cpu.branch(bus, target, true, None)
}

fn branch<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let offset = ((op << 8) as i32 >> 6) as u32;
    let target = cpu.reg(PC).wrapping_add(offset);
    let link = bit(op, 24).then(|| cpu.next_pc());
    cpu.fetch.seq + cpu.branch(bus, target, false, link)
}

fn data_processing<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let set_flags = bit(op, 20);
    let opcode = Opcode::from_bits(op >> 21);
    let carry = cpu.cpsr.carry();
    let mut cycles = cpu.fetch.seq;

    let (operand, shifter_carry, pc_extra) = if bit(op, 25) {
        let (value, c) = alu::ror(op & 0xFF, ((op >> 8) & 0xF) * 2, carry);
        (value, c, 0)
    } else {
        let shift = Shift::from_bits(op >> 5);
        if bit(op, 4) {
            cycles += REGISTER_SHIFT_CYCLES;
            let extra = cpu.width().bytes();
            let amount = cpu.operand(reg(op, 8), extra) & 0xFF;
            let (value, c) = shift.by_register(cpu.operand(reg(op, 0), extra), amount, carry);
            (value, c, extra)
        } else {
            let (value, c) = shift.by_immediate(cpu.reg(reg(op, 0)), (op >> 7) & 0x1F, carry);
            (value, c, 0)
        }
    };

    let rn = cpu.operand(reg(op, 16), pc_extra);
    let result = alu::execute(opcode, rn, operand, shifter_carry, cpu.cpsr.flags());
    if set_flags {
        cpu.cpsr.set_flags(result.flags);
    }

    let rd = reg(op, 12);
    if opcode.writes_result() {
        cpu.regs.set(rd, result.value);
        if rd == PC {
            cycles += cpu.write_pc(bus, set_flags);
        }
    }
    cycles
}

/// MRS and MSR.
///
/// MSR writes whole bytes selected by bits 16-19. Outside user mode any
/// byte of the status word may change; in user mode only the flag byte.
fn status_transfer(cpu: &mut Arm7tdmi, op: u32) -> u32 {
    let use_spsr = bit(op, 22);

    if !bit(op, 21) {
        let value = if use_spsr {
            cpu.regs.spsr()
        } else {
            cpu.cpsr.bits()
        };
        cpu.regs.set(reg(op, 12), value);
        return cpu.fetch.seq;
    }

    let value = if bit(op, 25) {
        (op & 0xFF).rotate_right(((op >> 8) & 0xF) * 2)
    } else {
        cpu.reg(reg(op, 0))
    };
    let mut mask = (0..4)
        .filter(|&byte| bit(op, 16 + byte))
        .fold(0u32, |mask, byte| mask | 0xFF << (byte * 8));

    if use_spsr {
        let spsr = cpu.regs.spsr();
        cpu.regs.set_spsr((spsr & !mask) | (value & mask));
    } else {
        if !cpu.mode().is_privileged() && mask & 0x00FF_FFFF != 0 {
            log::trace!("msr: control bytes {:#010X} dropped in user mode", value & mask & 0x00FF_FFFF);
            mask &= 0xFF00_0000;
        }
        cpu.write_cpsr((cpu.cpsr.bits() & !mask) | (value & mask));
    }
    cpu.fetch.seq
}

fn multiply(cpu: &mut Arm7tdmi, op: u32) -> u32 {
    let accumulate = bit(op, 21);
    let multiplier = cpu.reg(reg(op, 8));
    let acc = if accumulate { cpu.reg(reg(op, 12)) } else { 0 };
    let result = alu::multiply(cpu.reg(reg(op, 0)), multiplier, acc, cpu.cpsr.flags());
    cpu.regs.set(reg(op, 16), result.value);
    if bit(op, 20) {
        cpu.cpsr.set_nz(result.flags);
    }
    timing::multiply(cpu.fetch, multiplier, accumulate)
}

fn multiply_long(cpu: &mut Arm7tdmi, op: u32) -> u32 {
    let accumulate = bit(op, 21);
    let signed = bit(op, 22);
    let (lo, hi) = (reg(op, 12), reg(op, 16));
    let multiplier = cpu.reg(reg(op, 8));
    let acc = if accumulate {
        u64::from(cpu.reg(hi)) << 32 | u64::from(cpu.reg(lo))
    } else {
        0
    };
    let (value, flags) =
        alu::multiply_long(cpu.reg(reg(op, 0)), multiplier, acc, signed, cpu.cpsr.flags());
    cpu.regs.set(lo, value as u32);
    cpu.regs.set(hi, (value >> 32) as u32);
    if bit(op, 20) {
        cpu.cpsr.set_nz(flags);
    }
    timing::multiply_long(cpu.fetch, multiplier, signed, accumulate)
}

/// LDR, STR, LDRB, STRB.
fn single_transfer<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let offset = if bit(op, 25) {
        let shift = Shift::from_bits(op >> 5);
        shift
            .by_immediate(cpu.reg(reg(op, 0)), (op >> 7) & 0x1F, cpu.cpsr.carry())
            .0
    } else {
        op & 0xFFF
    };
    let width = if bit(op, 22) {
        AccessWidth::Byte
    } else {
        AccessWidth::Word
    };
    cpu.indexed_transfer(
        bus,
        indexing(op, offset),
        Transfer {
            load: bit(op, 20),
            rd: reg(op, 12),
            width,
            rotate: true,
            sign: false,
        },
    )
}

/// LDRH, STRH, LDRSB, LDRSH.
fn halfword_transfer<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let offset = if bit(op, 22) {
        (op & 0xF) | ((op >> 4) & 0xF0)
    } else {
        cpu.reg(reg(op, 0))
    };
    let width = if bit(op, 5) {
        AccessWidth::Halfword
    } else {
        AccessWidth::Byte
    };
    cpu.indexed_transfer(
        bus,
        indexing(op, offset),
        Transfer {
            load: bit(op, 20),
            rd: reg(op, 12),
            width,
            rotate: true,
            sign: bit(op, 6),
        },
    )
}

const fn indexing(op: u32, offset: u32) -> Indexing {
    Indexing {
        rn: reg(op, 16),
        offset,
        up: bit(op, 23),
        pre: bit(op, 24),
        writeback: bit(op, 21),
    }
}

/// LDM and STM.
fn block_transfer<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    cpu.block_transfer(bus, bit(op, 20), op as u16, indexing(op, 0), bit(op, 22))
}

/// SWP and SWPB.
fn swap<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    let width = if bit(op, 22) {
        AccessWidth::Byte
    } else {
        AccessWidth::Word
    };
    let address = cpu.reg(reg(op, 16));
    let (value, read) = cpu.load(bus, address, width, true, false);
    let source = cpu.reg(reg(op, 0));
    let write = cpu.store(bus, address, source, width);
    cpu.regs.set(reg(op, 12), value);
    timing::swap(cpu.fetch, read, write)
}

/// MRC and MCR. Only coprocessor 14 answers.
fn coprocessor_register<B: Bus>(cpu: &mut Arm7tdmi, bus: &mut B, op: u32) -> u32 {
    if (op >> 8) & 0xF != CP14 {
        return undefined(cpu, bus, op);
    }
    if !bit(op, 20) {
        return cpu.fetch.seq + CP14_WRITE_CYCLES;
    }
    let data = cpu.prefetch();
    let rd = reg(op, 12);
    if rd == PC {
        cpu.cpsr = Psr::new((cpu.cpsr.bits() & !FLAGS_MASK) | (data & FLAGS_MASK));
    } else {
        cpu.regs.set(rd, data);
    }
    cpu.fetch.seq + CP14_READ_CYCLES
}
