//! Banked register file.
//!
//! - R0-R7: unbanked
//! - R8-R12: two physical sets (FIQ, everyone else)
//! - R13-R14: one pair per bank
//! - R15: program counter, unbanked
//! - SPSR: one saved status word per privileged bank
//!
//! User and system mode share the user bank. The active bank is rebound on
//! every mode change; no storage is aliased.

use crate::flags::Mode;

/// Physical storage bank for R13, R14 and the saved status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    User = 0,
    Fiq = 1,
    Irq = 2,
    Supervisor = 3,
    Abort = 4,
    Undefined = 5,
}

impl Bank {
    pub const COUNT: usize = 6;

    #[must_use]
    pub const fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::User | Mode::System => Self::User,
            Mode::Fiq => Self::Fiq,
            Mode::Irq => Self::Irq,
            Mode::Supervisor => Self::Supervisor,
            Mode::Abort => Self::Abort,
            Mode::Undefined => Self::Undefined,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Snapshot of the registers visible in the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub r: [u32; 16],
    pub cpsr: u32,
    /// Saved status word of the current bank (0 in user/system mode).
    pub spsr: u32,
}

/// The full register file with every bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    /// R0-R7.
    low: [u32; 8],
    /// R8-R12 for every bank but FIQ.
    high_usr: [u32; 5],
    /// R8-R12 for FIQ.
    high_fiq: [u32; 5],
    /// R13-R14 per bank.
    sp_lr: [[u32; 2]; Bank::COUNT],
    /// Saved status per bank. The user slot is never observable.
    spsr: [u32; Bank::COUNT],
    /// R15.
    pc: u32,
    bank: Bank,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            low: [0; 8],
            high_usr: [0; 5],
            high_fiq: [0; 5],
            sp_lr: [[0; 2]; Bank::COUNT],
            spsr: [0; Bank::COUNT],
            pc: 0,
            bank: Bank::User,
        }
    }

    #[must_use]
    pub const fn bank(&self) -> Bank {
        self.bank
    }

    /// Rebind R8-R14 and the saved status word to `bank`.
    pub fn switch_bank(&mut self, bank: Bank) {
        self.bank = bank;
    }

    /// Read register `n` (0-15) through the active bank.
    #[must_use]
    pub fn get(&self, n: usize) -> u32 {
        self.read(self.bank, n)
    }

    /// Write register `n` (0-15) through the active bank.
    pub fn set(&mut self, n: usize, value: u32) {
        self.write(self.bank, n, value);
    }

    /// Read register `n` as user mode sees it.
    #[must_use]
    pub fn get_user(&self, n: usize) -> u32 {
        self.read(Bank::User, n)
    }

    /// Write register `n` as user mode sees it.
    pub fn set_user(&mut self, n: usize, value: u32) {
        self.write(Bank::User, n, value);
    }

    fn read(&self, bank: Bank, n: usize) -> u32 {
        match n {
            0..=7 => self.low[n],
            8..=12 if bank == Bank::Fiq => self.high_fiq[n - 8],
            8..=12 => self.high_usr[n - 8],
            13 | 14 => self.sp_lr[bank.index()][n - 13],
            _ => self.pc,
        }
    }

    fn write(&mut self, bank: Bank, n: usize, value: u32) {
        match n {
            0..=7 => self.low[n] = value,
            8..=12 if bank == Bank::Fiq => self.high_fiq[n - 8] = value,
            8..=12 => self.high_usr[n - 8] = value,
            13 | 14 => self.sp_lr[bank.index()][n - 13] = value,
            _ => self.pc = value,
        }
    }

    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, value: u32) {
        self.pc = value;
    }

    /// Saved status word of the active bank.
    #[must_use]
    pub const fn spsr(&self) -> u32 {
        self.spsr[self.bank.index()]
    }

    pub fn set_spsr(&mut self, value: u32) {
        self.spsr[self.bank.index()] = value;
    }

    /// Stack pointer of an arbitrary bank.
    pub fn set_banked_sp(&mut self, bank: Bank, value: u32) {
        self.sp_lr[bank.index()][0] = value;
    }

    #[must_use]
    pub const fn banked_sp(&self, bank: Bank) -> u32 {
        self.sp_lr[bank.index()][0]
    }

    /// Whether the active bank has a saved status word.
    #[must_use]
    pub fn has_spsr(&self) -> bool {
        self.bank != Bank::User
    }

    /// Clear every register in every bank.
    pub fn clear(&mut self) {
        *self = Self { bank: self.bank, ..Self::new() };
    }

    /// The sixteen registers visible in the active bank.
    #[must_use]
    pub fn visible(&self) -> [u32; 16] {
        core::array::from_fn(|n| self.get(n))
    }
}
