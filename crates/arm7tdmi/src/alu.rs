//! ALU and barrel shifter.
//!
//! Everything here is pure: operands and incoming flags in, a value and the
//! resulting flags out. The engines decide whether the flags are kept.

use crate::flags::Flags;

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u32,
    pub flags: Flags,
}

/// Barrel shifter operation, encoded in bits 5-6 of a shifted operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl Shift {
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::Lsl,
            1 => Self::Lsr,
            2 => Self::Asr,
            _ => Self::Ror,
        }
    }

    /// Shift by an amount taken from a register (low byte, 0-255).
    ///
    /// An amount of zero passes the value and carry through untouched.
    #[must_use]
    pub fn by_register(self, value: u32, amount: u32, carry: bool) -> (u32, bool) {
        match self {
            Self::Lsl => lsl(value, amount, carry),
            Self::Lsr => lsr(value, amount, carry),
            Self::Asr => asr(value, amount, carry),
            Self::Ror => ror(value, amount, carry),
        }
    }

    /// Shift by a 5-bit immediate.
    ///
    /// An immediate of zero means 32 for LSR and ASR, and RRX for ROR.
    #[must_use]
    pub fn by_immediate(self, value: u32, amount: u32, carry: bool) -> (u32, bool) {
        match (self, amount) {
            (Self::Lsr | Self::Asr, 0) => self.by_register(value, 32, carry),
            (Self::Ror, 0) => rrx(value, carry),
            _ => self.by_register(value, amount, carry),
        }
    }
}

#[must_use]
pub const fn lsl(value: u32, amount: u32, carry: bool) -> (u32, bool) {
    match amount {
        0 => (value, carry),
        1..=31 => (value << amount, value & (1 << (32 - amount)) != 0),
        32 => (0, value & 1 != 0),
        _ => (0, false),
    }
}

#[must_use]
pub const fn lsr(value: u32, amount: u32, carry: bool) -> (u32, bool) {
    match amount {
        0 => (value, carry),
        1..=31 => (value >> amount, value & (1 << (amount - 1)) != 0),
        32 => (0, value & 0x8000_0000 != 0),
        _ => (0, false),
    }
}

#[must_use]
pub const fn asr(value: u32, amount: u32, carry: bool) -> (u32, bool) {
    match amount {
        0 => (value, carry),
        1..=31 => (
            ((value as i32) >> amount) as u32,
            value & (1 << (amount - 1)) != 0,
        ),
        _ => (((value as i32) >> 31) as u32, value & 0x8000_0000 != 0),
    }
}

#[must_use]
pub const fn ror(value: u32, amount: u32, carry: bool) -> (u32, bool) {
    if amount == 0 {
        return (value, carry);
    }
    let result = value.rotate_right(amount & 31);
    (result, result & 0x8000_0000 != 0)
}

/// Rotate right by one through carry.
#[must_use]
pub const fn rrx(value: u32, carry: bool) -> (u32, bool) {
    ((carry as u32) << 31 | value >> 1, value & 1 != 0)
}

/// `a + b + carry` with canonical carry-out and signed overflow.
#[must_use]
pub const fn add_with_carry(a: u32, b: u32, carry: bool) -> AluResult {
    let wide = a as u64 + b as u64 + carry as u64;
    let value = wide as u32;
    let overflow = (!(a ^ b) & (a ^ value)) & 0x8000_0000 != 0;
    AluResult {
        value,
        flags: Flags::nz(value, wide > 0xFFFF_FFFF, overflow),
    }
}

/// `a - b`. Carry is set when no borrow occurred.
#[must_use]
pub const fn sub(a: u32, b: u32) -> AluResult {
    add_with_carry(a, !b, true)
}

/// `a - b - !carry`.
#[must_use]
pub const fn sub_with_carry(a: u32, b: u32, carry: bool) -> AluResult {
    add_with_carry(a, !b, carry)
}

/// A logical result: N and Z from the value, C from the shifter, V kept.
#[must_use]
pub const fn logical(value: u32, shifter_carry: bool, v: bool) -> AluResult {
    AluResult {
        value,
        flags: Flags::nz(value, shifter_carry, v),
    }
}

/// Data-processing opcode, bits 21-24 of an ARM instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    And,
    Eor,
    Sub,
    Rsb,
    Add,
    Adc,
    Sbc,
    Rsc,
    Tst,
    Teq,
    Cmp,
    Cmn,
    Orr,
    Mov,
    Bic,
    Mvn,
}

impl Opcode {
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0xF {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Sub,
            0x3 => Self::Rsb,
            0x4 => Self::Add,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Rsc,
            0x8 => Self::Tst,
            0x9 => Self::Teq,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mov,
            0xE => Self::Bic,
            _ => Self::Mvn,
        }
    }

    /// Test and compare operations only update flags.
    #[must_use]
    pub const fn writes_result(self) -> bool {
        !matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }

    /// Whether C comes from the shifter and V is untouched.
    #[must_use]
    pub const fn is_logical(self) -> bool {
        matches!(
            self,
            Self::And | Self::Eor | Self::Tst | Self::Teq | Self::Orr | Self::Mov | Self::Bic | Self::Mvn
        )
    }
}

/// Evaluate a data-processing operation.
///
/// `shifter_carry` is the carry out of the second operand's shift;
/// `flags` are the flags before the instruction.
#[must_use]
pub const fn execute(op: Opcode, a: u32, b: u32, shifter_carry: bool, flags: Flags) -> AluResult {
    match op {
        Opcode::And | Opcode::Tst => logical(a & b, shifter_carry, flags.v),
        Opcode::Eor | Opcode::Teq => logical(a ^ b, shifter_carry, flags.v),
        Opcode::Orr => logical(a | b, shifter_carry, flags.v),
        Opcode::Mov => logical(b, shifter_carry, flags.v),
        Opcode::Bic => logical(a & !b, shifter_carry, flags.v),
        Opcode::Mvn => logical(!b, shifter_carry, flags.v),
        Opcode::Sub | Opcode::Cmp => sub(a, b),
        Opcode::Rsb => sub(b, a),
        Opcode::Add | Opcode::Cmn => add_with_carry(a, b, false),
        Opcode::Adc => add_with_carry(a, b, flags.c),
        Opcode::Sbc => sub_with_carry(a, b, flags.c),
        Opcode::Rsc => sub_with_carry(b, a, flags.c),
    }
}

/// 32-bit multiply (accumulate when `acc` is given). C and V are kept.
#[must_use]
pub const fn multiply(a: u32, b: u32, acc: u32, flags: Flags) -> AluResult {
    let value = a.wrapping_mul(b).wrapping_add(acc);
    AluResult {
        value,
        flags: Flags::nz(value, flags.c, flags.v),
    }
}

/// 64-bit multiply with optional 64-bit accumulator.
///
/// Returns the full result plus N (bit 63) and Z (all 64 bits); C and V
/// are kept.
#[must_use]
pub const fn multiply_long(a: u32, b: u32, acc: u64, signed: bool, flags: Flags) -> (u64, Flags) {
    let product = if signed {
        ((a as i32 as i64) * (b as i32 as i64)) as u64
    } else {
        a as u64 * b as u64
    };
    let value = product.wrapping_add(acc);
    let flags = Flags {
        n: value & (1 << 63) != 0,
        z: value == 0,
        c: flags.c,
        v: flags.v,
    };
    (value, flags)
}
