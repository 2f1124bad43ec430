//! Program status word.
//!
//! The status word is 32 bits:
//! - Bits 0-4: Mode field (one of seven privilege encodings)
//! - Bit 5: T, instruction width (set: 16-bit Thumb, clear: 32-bit ARM)
//! - Bit 6: F, fast interrupts disabled
//! - Bit 7: I, interrupts disabled
//! - Bits 8-27: Reserved
//! - Bit 28: V, overflow
//! - Bit 29: C, carry
//! - Bit 30: Z, zero
//! - Bit 31: N, negative

/// Negative flag.
pub const N: u32 = 1 << 31;
/// Zero flag.
pub const Z: u32 = 1 << 30;
/// Carry flag.
pub const C: u32 = 1 << 29;
/// Overflow flag.
pub const V: u32 = 1 << 28;
/// Interrupt disable.
pub const I: u32 = 1 << 7;
/// Fast interrupt disable.
pub const F: u32 = 1 << 6;
/// Thumb state.
pub const T: u32 = 1 << 5;

/// Mask for the four condition flags.
pub const FLAGS_MASK: u32 = N | Z | C | V;
/// Mask for the mode field.
pub const MODE_MASK: u32 = 0x1F;

/// Processor privilege mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    User = 0x10,
    Fiq = 0x11,
    Irq = 0x12,
    Supervisor = 0x13,
    Abort = 0x17,
    Undefined = 0x1B,
    System = 0x1F,
}

impl Mode {
    /// Decode a mode field. Returns `None` for reserved encodings.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits & MODE_MASK {
            0x10 => Some(Self::User),
            0x11 => Some(Self::Fiq),
            0x12 => Some(Self::Irq),
            0x13 => Some(Self::Supervisor),
            0x17 => Some(Self::Abort),
            0x1B => Some(Self::Undefined),
            0x1F => Some(Self::System),
            _ => None,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Everything but user mode may touch the control byte.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Self::User)
    }

    /// Short lowercase name, as used in debugger output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::User => "usr",
            Self::Fiq => "fiq",
            Self::Irq => "irq",
            Self::Supervisor => "svc",
            Self::Abort => "abt",
            Self::Undefined => "und",
            Self::System => "sys",
        }
    }
}

/// Condition flags extracted from a status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
}

impl Flags {
    /// N and Z for a 32-bit result; C and V as given.
    #[must_use]
    pub const fn nz(result: u32, c: bool, v: bool) -> Self {
        Self {
            n: result & 0x8000_0000 != 0,
            z: result == 0,
            c,
            v,
        }
    }

    /// The packed NZCV nibble (N in bit 3).
    #[must_use]
    pub const fn nibble(self) -> u32 {
        (self.n as u32) << 3 | (self.z as u32) << 2 | (self.c as u32) << 1 | self.v as u32
    }
}

/// A program status word (current or saved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Psr(pub u32);

impl Psr {
    #[must_use]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Current mode. `None` only for a saved word that was never written.
    #[must_use]
    pub const fn mode(self) -> Option<Mode> {
        Mode::from_bits(self.0)
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.0 = (self.0 & !MODE_MASK) | mode.bits();
    }

    #[must_use]
    pub const fn thumb(self) -> bool {
        self.0 & T != 0
    }

    pub fn set_thumb(&mut self, thumb: bool) {
        self.set_bit(T, thumb);
    }

    #[must_use]
    pub const fn irq_disabled(self) -> bool {
        self.0 & I != 0
    }

    #[must_use]
    pub const fn fiq_disabled(self) -> bool {
        self.0 & F != 0
    }

    #[must_use]
    pub const fn carry(self) -> bool {
        self.0 & C != 0
    }

    #[must_use]
    pub const fn flags(self) -> Flags {
        Flags {
            n: self.0 & N != 0,
            z: self.0 & Z != 0,
            c: self.0 & C != 0,
            v: self.0 & V != 0,
        }
    }

    /// Replace all four condition flags.
    pub fn set_flags(&mut self, flags: Flags) {
        self.0 = (self.0 & !FLAGS_MASK) | flags.nibble() << 28;
    }

    /// Replace N, Z and C, leaving V alone. Logical operations use this.
    pub fn set_nzc(&mut self, flags: Flags) {
        let v = self.0 & V;
        self.set_flags(flags);
        self.0 = (self.0 & !V) | v;
    }

    /// Replace N and Z only. Multiplies use this.
    pub fn set_nz(&mut self, flags: Flags) {
        let cv = self.0 & (C | V);
        self.set_flags(flags);
        self.0 = (self.0 & !(C | V)) | cv;
    }

    pub fn set_bit(&mut self, mask: u32, on: bool) {
        if on {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// The NZCV nibble used to index the condition table.
    #[must_use]
    pub const fn flag_nibble(self) -> usize {
        (self.0 >> 28) as usize
    }
}

/// Condition truth table, indexed `[condition][nzcv]`.
///
/// Row order follows the condition encoding: EQ NE CS CC MI PL VS VC HI LS
/// GE LT GT LE AL, then the reserved code, which executes like AL.
const CONDITION_TABLE: [u16; 16] = build_condition_table();

const fn condition_holds(cond: u32, nzcv: u32) -> bool {
    let n = nzcv & 8 != 0;
    let z = nzcv & 4 != 0;
    let c = nzcv & 2 != 0;
    let v = nzcv & 1 != 0;
    match cond {
        0x0 => z,
        0x1 => !z,
        0x2 => c,
        0x3 => !c,
        0x4 => n,
        0x5 => !n,
        0x6 => v,
        0x7 => !v,
        0x8 => c && !z,
        0x9 => !c || z,
        0xA => n == v,
        0xB => n != v,
        0xC => !z && n == v,
        0xD => z || n != v,
        _ => true,
    }
}

const fn build_condition_table() -> [u16; 16] {
    let mut table = [0u16; 16];
    let mut cond = 0;
    while cond < 16 {
        let mut nzcv = 0;
        while nzcv < 16 {
            if condition_holds(cond, nzcv) {
                table[cond as usize] |= 1 << nzcv;
            }
            nzcv += 1;
        }
        cond += 1;
    }
    table
}

/// Evaluate a 4-bit condition code against a status word.
#[must_use]
pub const fn condition_passed(cond: u32, psr: Psr) -> bool {
    CONDITION_TABLE[(cond & 0xF) as usize] & (1 << psr.flag_nibble()) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_match_reference_layout() {
        // EQ: true for every nibble with Z set (bit 2).
        assert_eq!(CONDITION_TABLE[0x0], 0xF0F0);
        // HI: C set and Z clear -> nibbles 2, 3, 10, 11.
        assert_eq!(CONDITION_TABLE[0x8], 0x0C0C);
        // GE: N == V.
        assert_eq!(CONDITION_TABLE[0xA], 0xAA55);
        assert_eq!(CONDITION_TABLE[0xE], 0xFFFF);
        assert_eq!(CONDITION_TABLE[0xF], 0xFFFF);
    }

    #[test]
    fn reserved_mode_bits_decode_to_none() {
        assert_eq!(Mode::from_bits(0x00), None);
        assert_eq!(Mode::from_bits(0x14), None);
        assert_eq!(Mode::from_bits(0xFFFF_FF1F), Some(Mode::System));
    }

    #[test]
    fn set_nzc_preserves_overflow() {
        let mut psr = Psr::new(V | Mode::User.bits());
        psr.set_nzc(Flags::nz(0, true, false));
        assert_eq!(psr.bits(), Z | C | V | Mode::User.bits());
    }
}
