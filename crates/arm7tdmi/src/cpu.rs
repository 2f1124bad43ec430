//! ARM7TDMI core: pipeline, mode changes, exceptions and data transfer.
//!
//! R15 always reads two instructions ahead of the one executing: the
//! three pipeline slots hold the executing opcode, the decoded opcode and
//! the opcode just fetched at R15.

use emu_core::{AccessTiming, AccessWidth, Bus, Cpu, Observable, Value};

use crate::exception::Exception;
use crate::flags::{self, Mode, Psr, F, I, MODE_MASK};
use crate::registers::{Bank, RegisterFile, Registers};
use crate::{arm, thumb, timing};

/// Cartridge entry point used by [`Arm7tdmi::boot_direct`].
pub const DIRECT_BOOT_ENTRY: u32 = 0x0800_0000;
/// System/user stack pointer seeded by [`Arm7tdmi::boot_direct`].
pub const DIRECT_BOOT_SP_SYS: u32 = 0x0300_7F00;
/// IRQ stack pointer seeded by [`Arm7tdmi::boot_direct`].
pub const DIRECT_BOOT_SP_IRQ: u32 = 0x0300_7FA0;
/// Supervisor stack pointer seeded by [`Arm7tdmi::boot_direct`].
pub const DIRECT_BOOT_SP_SVC: u32 = 0x0300_7FE0;

pub(crate) const SP: usize = 13;
pub(crate) const LR: usize = 14;
pub(crate) const PC: usize = 15;

/// Instruction set selected by the T bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionSet {
    Arm,
    Thumb,
}

impl InstructionSet {
    #[must_use]
    pub const fn width(self) -> AccessWidth {
        match self {
            Self::Arm => AccessWidth::Word,
            Self::Thumb => AccessWidth::Halfword,
        }
    }

    #[must_use]
    pub const fn bytes(self) -> u32 {
        self.width().bytes()
    }
}

/// Operands of a single load or store.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Transfer {
    pub load: bool,
    pub rd: usize,
    pub width: AccessWidth,
    /// Realign misaligned loads by rotation.
    pub rotate: bool,
    pub sign: bool,
}

/// Addressing of a base-register transfer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Indexing {
    pub rn: usize,
    pub offset: u32,
    pub up: bool,
    pub pre: bool,
    pub writeback: bool,
}

/// ARM7TDMI CPU.
#[derive(Debug, Clone)]
pub struct Arm7tdmi {
    pub(crate) regs: RegisterFile,
    pub(crate) cpsr: Psr,
    pipeline: [u32; 3],
    /// Timing of the opcode fetch made by the current step.
    pub(crate) fetch: AccessTiming,
    /// Blocks interrupt entry until the next step.
    pub(crate) exception_lock: bool,
    cycles: u64,
}

impl Default for Arm7tdmi {
    fn default() -> Self {
        Self::new()
    }
}

impl Arm7tdmi {
    /// A core in the power-on state. Call [`Cpu::reset`] before stepping.
    #[must_use]
    pub fn new() -> Self {
        let mut regs = RegisterFile::new();
        regs.switch_bank(Bank::Supervisor);
        Self {
            regs,
            cpsr: Psr::new(Mode::Supervisor.bits() | I | F),
            pipeline: [0; 3],
            fetch: AccessTiming::SINGLE,
            exception_lock: false,
            cycles: 0,
        }
    }

    #[must_use]
    pub const fn instruction_set(&self) -> InstructionSet {
        if self.cpsr.thumb() {
            InstructionSet::Thumb
        } else {
            InstructionSet::Arm
        }
    }

    pub(crate) const fn width(&self) -> AccessWidth {
        self.instruction_set().width()
    }

    #[must_use]
    pub const fn cpsr(&self) -> Psr {
        self.cpsr
    }

    /// Saved status word of the current mode, if it has one.
    #[must_use]
    pub fn spsr(&self) -> Option<Psr> {
        self.regs.has_spsr().then_some(Psr::new(self.regs.spsr()))
    }

    /// The mode field always holds a valid encoding.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.cpsr.mode().unwrap_or(Mode::Supervisor)
    }

    /// Register `n` as the current mode sees it. R15 reads two
    /// instructions ahead.
    #[must_use]
    pub fn reg(&self, n: usize) -> u32 {
        self.regs.get(n)
    }

    /// Write register `n` through the current bank.
    ///
    /// Writing R15 this way does not refill the pipeline.
    pub fn set_reg(&mut self, n: usize, value: u32) {
        self.regs.set(n, value);
    }

    /// Register file with every bank.
    #[must_use]
    pub const fn register_file(&self) -> &RegisterFile {
        &self.regs
    }

    /// Write the status word. Reserved mode encodings are ignored.
    pub fn set_cpsr(&mut self, bits: u32) {
        self.write_cpsr(bits);
    }

    /// Total cycles consumed through every entry point.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub const fn pipeline(&self) -> [u32; 3] {
        self.pipeline
    }

    #[must_use]
    pub const fn exception_lock(&self) -> bool {
        self.exception_lock
    }

    /// The word in the fetch slot. In Thumb state the halfword is
    /// duplicated into both halves, as it appears on the data bus.
    #[must_use]
    pub const fn prefetch(&self) -> u32 {
        let word = self.pipeline[2];
        match self.instruction_set() {
            InstructionSet::Arm => word,
            InstructionSet::Thumb => (word & 0xFFFF) * 0x0001_0001,
        }
    }

    /// Address of the instruction after the one executing.
    pub(crate) fn next_pc(&self) -> u32 {
        self.regs.pc().wrapping_sub(self.width().bytes())
    }

    /// Read a register with R15 advanced by `pc_extra`.
    ///
    /// Register-specified shifts and stores see R15 one instruction later.
    pub(crate) fn operand(&self, n: usize, pc_extra: u32) -> u32 {
        if n == PC {
            self.regs.pc().wrapping_add(pc_extra)
        } else {
            self.regs.get(n)
        }
    }

    pub(crate) fn condition_passed(&self, cond: u32) -> bool {
        flags::condition_passed(cond, self.cpsr)
    }

    fn fill<B: Bus>(&mut self, bus: &mut B, slot: usize, address: u32) -> AccessTiming {
        let width = self.width();
        let fetched = bus.fetch(address, width);
        self.pipeline[slot] = fetched.data & width.mask();
        if slot == 2 {
            bus.latch_prefetch(self.prefetch());
        }
        fetched.timing
    }

    /// Flush and refill the pipeline at `address`.
    ///
    /// With `exchange` set, bit 0 of the address selects the instruction
    /// set. Returns the refill cost.
    pub(crate) fn branch<B: Bus>(
        &mut self,
        bus: &mut B,
        address: u32,
        exchange: bool,
        link: Option<u32>,
    ) -> u32 {
        if exchange {
            self.cpsr.set_thumb(address & 1 != 0);
        }
        if let Some(link) = link {
            self.regs.set(LR, link);
        }
        let width = self.width().bytes();
        let target = address & !(width - 1);
        self.regs.set_pc(target.wrapping_add(width));
        let first = self.fill(bus, 1, target);
        let second = self.fill(bus, 2, target.wrapping_add(width));
        timing::refill(first, second)
    }

    /// Complete a write to R15: optionally restore the saved status word,
    /// then refill at the written address.
    pub(crate) fn write_pc<B: Bus>(&mut self, bus: &mut B, restore: bool) -> u32 {
        if restore {
            self.restore_cpsr();
        }
        let target = self.regs.pc();
        self.branch(bus, target, false, None)
    }

    /// Jump to `address`, selecting Thumb state from bit 0.
    ///
    /// Returns the refill cost. Hosts and debuggers use this to start
    /// execution somewhere other than the reset vector.
    pub fn jump<B: Bus>(&mut self, bus: &mut B, address: u32) -> u32 {
        self.branch(bus, address, true, None)
    }

    fn switch_mode(&mut self, mode: Mode) {
        self.regs.switch_bank(Bank::for_mode(mode));
        self.cpsr.set_mode(mode);
    }

    /// Replace the status word and rebind the register bank.
    pub(crate) fn write_cpsr(&mut self, bits: u32) {
        match Mode::from_bits(bits) {
            Some(mode) => {
                self.cpsr = Psr::new(bits);
                self.switch_mode(mode);
            }
            None => {
                log::trace!("cpsr: reserved mode {:#04X} ignored", bits & MODE_MASK);
                self.cpsr = Psr::new((bits & !MODE_MASK) | (self.cpsr.bits() & MODE_MASK));
            }
        }
    }

    fn restore_cpsr(&mut self) {
        if self.regs.has_spsr() {
            self.write_cpsr(self.regs.spsr());
        } else {
            log::trace!("cpsr: no saved status in {} mode", self.mode().name());
        }
    }

    /// Switch to the exception's mode, save the status word and branch
    /// to its vector.
    pub(crate) fn enter_exception<B: Bus>(&mut self, bus: &mut B, exception: Exception) -> u32 {
        let descriptor = exception.descriptor();
        let saved = self.cpsr;
        let link = self.next_pc().wrapping_add(descriptor.link_offset);
        log::trace!(
            "{} exception from {:#010X} in {} mode",
            exception.name(),
            link,
            self.mode().name()
        );
        self.switch_mode(descriptor.mode);
        self.cpsr.set_thumb(false);
        self.cpsr.set_bit(descriptor.mask, true);
        self.regs.set_spsr(saved.bits());
        self.branch(bus, descriptor.vector, false, Some(link)) + descriptor.extra_cycles
    }

    /// Trap an opcode that decodes to nothing.
    pub(crate) fn undefined<B: Bus>(&mut self, bus: &mut B, opcode: u32) -> u32 {
        log::warn!(
            "undefined {:?} instruction {:#010X} at {:#010X}",
            self.instruction_set(),
            opcode,
            self.next_pc().wrapping_sub(self.width().bytes())
        );
        self.enter_exception(bus, Exception::Undefined)
    }

    /// Take a normal interrupt unless masked or locked out.
    ///
    /// Returns 0 without touching any state when refused.
    pub fn request_interrupt<B: Bus>(&mut self, bus: &mut B) -> u32 {
        if self.cpsr.irq_disabled() || self.exception_lock {
            return 0;
        }
        let cycles = self.enter_exception(bus, Exception::Interrupt);
        self.cycles += u64::from(cycles);
        cycles
    }

    /// Take a fast interrupt unless masked or locked out.
    pub fn request_fast_interrupt<B: Bus>(&mut self, bus: &mut B) -> u32 {
        if self.cpsr.fiq_disabled() || self.exception_lock {
            return 0;
        }
        let cycles = self.enter_exception(bus, Exception::FastInterrupt);
        self.cycles += u64::from(cycles);
        cycles
    }

    /// Start as the boot ROM would leave the machine: stacks seeded,
    /// system mode, executing from the cartridge entry point.
    pub fn boot_direct<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.regs = RegisterFile::new();
        self.regs.set_banked_sp(Bank::User, DIRECT_BOOT_SP_SYS);
        self.regs.set_banked_sp(Bank::Irq, DIRECT_BOOT_SP_IRQ);
        self.regs.set_banked_sp(Bank::Supervisor, DIRECT_BOOT_SP_SVC);
        self.cpsr = Psr::new(Mode::System.bits());
        self.switch_mode(Mode::System);
        self.pipeline = [0; 3];
        self.exception_lock = false;
        log::debug!("direct boot to {DIRECT_BOOT_ENTRY:#010X}");
        let cycles = self.branch(bus, DIRECT_BOOT_ENTRY, false, None);
        self.cycles += u64::from(cycles);
        cycles
    }

    /// Load with rotation realignment and sign extension.
    ///
    /// A misaligned halfword rotates and then counts as a byte, so a
    /// signed misaligned halfword load sign-extends the addressed byte.
    pub(crate) fn load<B: Bus>(
        &mut self,
        bus: &mut B,
        address: u32,
        width: AccessWidth,
        rotate: bool,
        sign: bool,
    ) -> (u32, AccessTiming) {
        let misaligned = address & (width.bytes() - 1);
        let read = bus.read(width.align(address), width);
        let mut value = read.data & width.mask();
        let mut width = width;
        if rotate && misaligned != 0 {
            value = value.rotate_right(misaligned * 8);
            if width == AccessWidth::Halfword {
                width = AccessWidth::Byte;
            }
        }
        if sign {
            value = match width {
                AccessWidth::Byte => value as u8 as i8 as u32,
                AccessWidth::Halfword => value as u16 as i16 as u32,
                AccessWidth::Word => value,
            };
        }
        (value, read.timing)
    }

    pub(crate) fn store<B: Bus>(
        &mut self,
        bus: &mut B,
        address: u32,
        value: u32,
        width: AccessWidth,
    ) -> AccessTiming {
        bus.write(width.align(address), value & width.mask(), width)
    }

    /// One load or store at an absolute address.
    pub(crate) fn transfer<B: Bus>(&mut self, bus: &mut B, address: u32, t: Transfer) -> u32 {
        if t.load {
            let (value, data) = self.load(bus, address, t.width, t.rotate, t.sign);
            self.regs.set(t.rd, value);
            let mut cycles = timing::load(self.fetch, data);
            if t.rd == PC {
                cycles += self.write_pc(bus, false);
            }
            cycles
        } else {
            let value = self.operand(t.rd, self.width().bytes());
            let data = self.store(bus, address, value, t.width);
            timing::store(self.fetch, data)
        }
    }

    /// One load or store addressed from a base register.
    ///
    /// Post-indexed transfers always write back. A loaded value wins over
    /// the written-back base when both target the same register.
    pub(crate) fn indexed_transfer<B: Bus>(&mut self, bus: &mut B, ix: Indexing, t: Transfer) -> u32 {
        let base = self.regs.get(ix.rn);
        let moved = if ix.up {
            base.wrapping_add(ix.offset)
        } else {
            base.wrapping_sub(ix.offset)
        };
        let address = if ix.pre { moved } else { base };
        let cycles = self.transfer(bus, address, t);
        let clobbered = t.load && t.rd == ix.rn;
        if (ix.writeback || !ix.pre) && !clobbered && ix.rn != PC {
            self.regs.set(ix.rn, moved);
        }
        cycles
    }

    /// Load or store a register list in ascending register order.
    ///
    /// An empty list transfers R15 and moves the base by 64. With
    /// `user_bank` set the user registers are transferred, except for a
    /// load that includes R15, which instead restores the saved status.
    /// The base is written back after the first transfer, so a stored
    /// base holds its old value only when it is the lowest listed.
    pub(crate) fn block_transfer<B: Bus>(
        &mut self,
        bus: &mut B,
        load: bool,
        list: u16,
        ix: Indexing,
        user_bank: bool,
    ) -> u32 {
        let (list, offset) = if list == 0 {
            (1u16 << PC, 64)
        } else {
            (list, list.count_ones() * 4)
        };
        let base = self.regs.get(ix.rn);
        let (start, moved) = if ix.up {
            (base.wrapping_add(if ix.pre { 4 } else { 0 }), base.wrapping_add(offset))
        } else {
            let moved = base.wrapping_sub(offset);
            (moved.wrapping_add(if ix.pre { 0 } else { 4 }), moved)
        };
        let loads_pc = load && list & (1 << PC) != 0;
        let user = user_bank && !loads_pc;
        let writeback = ix.writeback && ix.rn != PC && !(load && list & (1 << ix.rn) != 0);
        let pc_extra = self.width().bytes();

        let mut cycles = timing::block_start(self.fetch, load);
        let mut address = start;
        let mut first = true;
        for n in (0..16).filter(|&n| list & (1 << n) != 0) {
            let data = if load {
                let (value, data) = self.load(bus, address, AccessWidth::Word, false, false);
                if user {
                    self.regs.set_user(n, value);
                } else {
                    self.regs.set(n, value);
                }
                data
            } else {
                let value = if n == PC {
                    self.operand(PC, pc_extra)
                } else if user {
                    self.regs.get_user(n)
                } else {
                    self.regs.get(n)
                };
                self.store(bus, address, value, AccessWidth::Word)
            };
            cycles += timing::block_word(data, first);
            if first && writeback {
                self.regs.set(ix.rn, moved);
            }
            first = false;
            address = address.wrapping_add(4);
        }

        if loads_pc {
            cycles += self.write_pc(bus, user_bank);
        }
        cycles
    }
}

impl Cpu for Arm7tdmi {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.exception_lock = false;
        self.pipeline[0] = self.pipeline[1];
        self.pipeline[1] = self.pipeline[2];
        let pc = self.regs.pc().wrapping_add(self.width().bytes());
        self.regs.set_pc(pc);
        self.fetch = self.fill(bus, 2, pc);

        let opcode = self.pipeline[0];
        let cycles = match self.instruction_set() {
            InstructionSet::Arm => arm::execute(self, bus, opcode),
            InstructionSet::Thumb => thumb::execute(self, bus, opcode as u16),
        };
        self.cycles += u64::from(cycles);
        cycles
    }

    fn reset<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.regs = RegisterFile::new();
        self.cpsr = Psr::new(Mode::Supervisor.bits());
        self.switch_mode(Mode::Supervisor);
        self.pipeline = [0; 3];
        self.exception_lock = false;
        log::debug!("cpu reset");
        let cycles = self.enter_exception(bus, Exception::Reset);
        self.cycles += u64::from(cycles);
        cycles
    }

    fn interrupt<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.request_interrupt(bus)
    }

    fn pc(&self) -> u32 {
        self.next_pc()
    }

    fn registers(&self) -> Registers {
        Registers {
            r: self.regs.visible(),
            cpsr: self.cpsr.bits(),
            spsr: self.spsr().map_or(0, Psr::bits),
        }
    }
}

const QUERY_PATHS: &[&str] = &[
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15", "sp", "lr", "pc", "cpsr", "spsr", "mode", "thumb", "flags.n", "flags.z",
    "flags.c", "flags.v", "irq_disabled", "fiq_disabled", "prefetch", "cycles",
];

impl Observable for Arm7tdmi {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(n) = path.strip_prefix('r').and_then(|n| n.parse::<usize>().ok()) {
            return (n < 16).then_some(Value::from(self.regs.get(n)));
        }
        let flags = self.cpsr.flags();
        match path {
            "sp" => Some(self.regs.get(SP).into()),
            "lr" => Some(self.regs.get(LR).into()),
            "pc" => Some(self.next_pc().into()),
            "cpsr" => Some(self.cpsr.bits().into()),
            "spsr" => Some(self.spsr().map_or(0, Psr::bits).into()),
            "mode" => Some(self.mode().name().into()),
            "thumb" => Some(self.cpsr.thumb().into()),
            "flags.n" => Some(flags.n.into()),
            "flags.z" => Some(flags.z.into()),
            "flags.c" => Some(flags.c.into()),
            "flags.v" => Some(flags.v.into()),
            "irq_disabled" => Some(self.cpsr.irq_disabled().into()),
            "fiq_disabled" => Some(self.cpsr.fiq_disabled().into()),
            "prefetch" => Some(self.prefetch().into()),
            "cycles" => Some(self.cycles.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}
