//! Memory bus interface.

/// Width of a single bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessWidth {
    Byte = 1,
    Halfword = 2,
    Word = 4,
}

impl AccessWidth {
    /// Number of bytes moved by one access.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        self as u32
    }

    /// Mask an address down to this width's natural alignment.
    #[must_use]
    pub const fn align(self, address: u32) -> u32 {
        address & !(self.bytes() - 1)
    }

    /// Value mask covering the bits this width carries.
    #[must_use]
    pub const fn mask(self) -> u32 {
        match self {
            Self::Byte => 0x0000_00FF,
            Self::Halfword => 0x0000_FFFF,
            Self::Word => 0xFFFF_FFFF,
        }
    }
}

/// Cycle cost of a bus access.
///
/// Every region reports two costs: one for a non-sequential access (a new
/// address) and one for a sequential follow-up at the next address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessTiming {
    /// Cycles for a non-sequential access.
    pub nonseq: u32,
    /// Cycles for a sequential access.
    pub seq: u32,
}

impl AccessTiming {
    /// The cheapest possible access: one cycle either way.
    pub const SINGLE: Self = Self::uniform(1);

    #[must_use]
    pub const fn new(nonseq: u32, seq: u32) -> Self {
        Self { nonseq, seq }
    }

    /// Same cost for sequential and non-sequential accesses.
    #[must_use]
    pub const fn uniform(cycles: u32) -> Self {
        Self {
            nonseq: cycles,
            seq: cycles,
        }
    }
}

/// Result of a bus read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    /// Value read, zero-extended to 32 bits.
    pub data: u32,
    /// Cost of the access.
    pub timing: AccessTiming,
}

impl ReadResult {
    /// A read that costs a single cycle.
    #[must_use]
    pub const fn new(data: u32) -> Self {
        Self {
            data,
            timing: AccessTiming::SINGLE,
        }
    }

    #[must_use]
    pub const fn with_timing(data: u32, timing: AccessTiming) -> Self {
        Self { data, timing }
    }
}

/// Memory bus interface.
///
/// The CPU reaches memory and memory-mapped peripherals through this trait.
/// The bus decodes the address, routes the access and reports what it cost.
/// Addresses are masked to the access width's alignment before dispatch.
pub trait Bus {
    /// Read `width` bytes at `address`.
    fn read(&mut self, address: u32, width: AccessWidth) -> ReadResult;

    /// Write the low `width` bytes of `value` at `address`.
    fn write(&mut self, address: u32, value: u32, width: AccessWidth) -> AccessTiming;

    /// Read an opcode for the CPU's prefetch pipeline.
    ///
    /// Buses that time instruction fetches differently from data reads
    /// override this.
    fn fetch(&mut self, address: u32, width: AccessWidth) -> ReadResult {
        self.read(address, width)
    }

    /// The CPU reports the word sitting in its prefetch slot after every fetch.
    ///
    /// Buses that model open-bus reads remember it.
    fn latch_prefetch(&mut self, _word: u32) {}
}

/// Flat little-endian RAM covering the low end of the address space.
///
/// Addresses wrap at the end of the backing store. Every access costs the
/// configured timing. Used for CPU tests.
pub struct SimpleBus {
    memory: Vec<u8>,
    timing: AccessTiming,
}

impl SimpleBus {
    /// Default backing size: 64K.
    pub const DEFAULT_SIZE: usize = 0x1_0000;

    #[must_use]
    pub fn new() -> Self {
        Self::with_size(Self::DEFAULT_SIZE)
    }

    /// Create a bus of `size` bytes. `size` must be a power of two.
    #[must_use]
    pub fn with_size(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());
        Self {
            memory: vec![0; size],
            timing: AccessTiming::SINGLE,
        }
    }

    /// Charge `timing` for every access from now on.
    pub fn set_timing(&mut self, timing: AccessTiming) {
        self.timing = timing;
    }

    fn index(&self, address: u32) -> usize {
        address as usize & (self.memory.len() - 1)
    }

    /// Copy `data` into memory starting at `address`.
    pub fn load(&mut self, address: u32, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            let i = self.index(address.wrapping_add(offset as u32));
            self.memory[i] = byte;
        }
    }

    /// Copy 32-bit words into memory starting at `address`.
    pub fn load_words(&mut self, address: u32, words: &[u32]) {
        for (n, word) in words.iter().enumerate() {
            self.load(address.wrapping_add(n as u32 * 4), &word.to_le_bytes());
        }
    }

    /// Copy 16-bit halfwords into memory starting at `address`.
    pub fn load_halfwords(&mut self, address: u32, halfwords: &[u16]) {
        for (n, half) in halfwords.iter().enumerate() {
            self.load(address.wrapping_add(n as u32 * 2), &half.to_le_bytes());
        }
    }

    /// Read without side effects.
    #[must_use]
    pub fn peek(&self, address: u32, width: AccessWidth) -> u32 {
        let base = width.align(address);
        (0..width.bytes()).fold(0, |acc, i| {
            acc | u32::from(self.memory[self.index(base.wrapping_add(i))]) << (i * 8)
        })
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u32, width: AccessWidth) -> ReadResult {
        ReadResult::with_timing(self.peek(address, width), self.timing)
    }

    fn write(&mut self, address: u32, value: u32, width: AccessWidth) -> AccessTiming {
        let base = width.align(address);
        for i in 0..width.bytes() {
            let index = self.index(base.wrapping_add(i));
            self.memory[index] = (value >> (i * 8)) as u8;
        }
        self.timing
    }
}
