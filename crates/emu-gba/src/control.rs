//! System control registers.
//!
//! Interrupt enable/request/master-enable, the cartridge wait-state
//! control, the power-down latch and internal memory control. The bus asks
//! this block for the wait states of each region; the scheduler asks it for
//! the power-down mode and for pending interrupts.

use emu_core::{AccessTiming, AccessWidth};

use crate::device::Io;

pub const IE: u32 = 0x0400_0200;
pub const IF: u32 = 0x0400_0202;
pub const WAITCNT: u32 = 0x0400_0204;
pub const IME: u32 = 0x0400_0208;
pub const POSTFLG: u32 = 0x0400_0300;
pub const HALTCNT: u32 = 0x0400_0301;
pub const MEMCNT: u32 = 0x0400_0800;

/// Memory control after reset: 256K work RAM on, wait control 13.
const MEMCNT_RESET: u32 = 0x0D00_0020;

/// All fourteen interrupt sources.
const IRQ_ALL: u16 = 0x3FFF;

/// Sources that can bring the machine out of stop.
const STOP_WAKE: u16 = Interrupt::Keypad.bit() | Interrupt::GamePak.bit() | Interrupt::Serial.bit();

/// Cartridge PHI terminal output, by WAITCNT bits 11-12.
const PHI_FREQUENCY: [u32; 4] = [0, 4_194_304, 8_388_608, 16_777_216];

/// First-access wait, including the access cycle itself.
const FIRST_ACCESS: [u32; 4] = [5, 4, 3, 9];
const WS0_SECOND_ACCESS: [u32; 2] = [3, 2];
const WS1_SECOND_ACCESS: [u32; 2] = [5, 2];
const WS2_SECOND_ACCESS: [u32; 2] = [9, 2];

/// Interrupt sources, by IE/IF bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupt {
    VBlank,
    HBlank,
    VCount,
    Timer0,
    Timer1,
    Timer2,
    Timer3,
    Serial,
    Dma0,
    Dma1,
    Dma2,
    Dma3,
    Keypad,
    GamePak,
}

impl Interrupt {
    #[must_use]
    pub const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// How far the CPU is powered down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PowerDown {
    #[default]
    None,
    /// CPU stopped until an enabled interrupt is requested.
    Halt,
    /// Everything but video and keypad stopped until a wake source fires.
    Stop,
}

impl PowerDown {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Halt => "halt",
            Self::Stop => "stop",
        }
    }
}

/// System control block.
#[derive(Debug, Clone)]
pub struct Control {
    enabled: u16,
    requested: u16,
    master_enable: u8,
    waitcnt: u16,
    postflg: u8,
    undocumented_410: u8,
    memcnt: u32,
    power: PowerDown,
}

impl Default for Control {
    fn default() -> Self {
        Self::new()
    }
}

impl Control {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: 0,
            requested: 0,
            master_enable: 0,
            waitcnt: 0,
            postflg: 0,
            undocumented_410: 0,
            memcnt: MEMCNT_RESET,
            power: PowerDown::None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Latch an interrupt request.
    ///
    /// While stopped nothing is latched; an enabled keypad, cartridge or
    /// serial source only wakes the machine.
    pub fn request(&mut self, irq: u16) {
        if self.power != PowerDown::Stop {
            self.requested |= irq;
        } else if irq & STOP_WAKE & self.enabled != 0 {
            log::debug!("stop: woken by {irq:#06X}");
            self.wake();
        }
    }

    /// Wake on any enabled request. Returns true when the CPU should take
    /// an interrupt.
    pub fn sync(&mut self) -> bool {
        let cause = self.enabled & self.requested & IRQ_ALL != 0;
        if cause {
            self.wake();
        }
        cause && self.master_enable & 1 != 0
    }

    fn wake(&mut self) {
        if self.power != PowerDown::None {
            log::debug!("power-down: {} -> none", self.power.name());
        }
        self.power = PowerDown::None;
    }

    #[must_use]
    pub const fn power_down(&self) -> PowerDown {
        self.power
    }

    #[must_use]
    pub const fn enabled(&self) -> u16 {
        self.enabled
    }

    #[must_use]
    pub const fn requested(&self) -> u16 {
        self.requested
    }

    #[must_use]
    pub const fn master_enabled(&self) -> bool {
        self.master_enable & 1 != 0
    }

    #[must_use]
    pub const fn waitcnt(&self) -> u16 {
        self.waitcnt
    }

    #[must_use]
    pub const fn post_boot(&self) -> bool {
        self.postflg & 1 != 0
    }

    #[must_use]
    pub const fn prefetch_enabled(&self) -> bool {
        self.waitcnt & (1 << 14) != 0
    }

    /// Frequency on the cartridge PHI pin, in Hz. Zero when off.
    #[must_use]
    pub const fn phi_frequency(&self) -> u32 {
        PHI_FREQUENCY[((self.waitcnt >> 11) & 3) as usize]
    }

    #[must_use]
    pub const fn wram_enabled(&self) -> bool {
        self.memcnt & 1 == 0
    }

    #[must_use]
    pub const fn wram_256k_enabled(&self) -> bool {
        self.memcnt & (1 << 5) != 0
    }

    /// Cartridge ROM wait states for the mirror `address` falls in.
    ///
    /// Word accesses take two bus cycles on the 16-bit cartridge bus. An
    /// access at a 128K boundary is never sequential.
    #[must_use]
    pub fn rom_wait(&self, address: u32, width: AccessWidth) -> AccessTiming {
        let base = width.align(address);
        let w = u32::from(self.waitcnt);
        let (mut n, mut s) = if base < 0x0A00_0000 {
            (
                FIRST_ACCESS[((w >> 2) & 3) as usize],
                WS0_SECOND_ACCESS[((w >> 4) & 1) as usize],
            )
        } else if base < 0x0C00_0000 {
            (
                FIRST_ACCESS[((w >> 5) & 3) as usize],
                WS1_SECOND_ACCESS[((w >> 7) & 1) as usize],
            )
        } else {
            (
                FIRST_ACCESS[((w >> 8) & 3) as usize],
                WS2_SECOND_ACCESS[((w >> 10) & 1) as usize],
            )
        };
        if width == AccessWidth::Word {
            n += s;
            s += s;
        }
        if base & 0x0001_FFFF == 0 {
            s = n;
        }
        AccessTiming::new(n, s)
    }

    /// Backup SRAM is only ever accessed non-sequentially.
    #[must_use]
    pub const fn sram_wait(&self) -> AccessTiming {
        AccessTiming::uniform(FIRST_ACCESS[(self.waitcnt & 3) as usize])
    }

    /// 256K work RAM: 16-bit bus, wait set by memory control bits 24-27.
    #[must_use]
    pub const fn wram_256k_wait(&self, width: AccessWidth) -> AccessTiming {
        let per_half = 16 - ((self.memcnt >> 24) & 0xF);
        let cycles = match width {
            AccessWidth::Word => per_half << 1,
            AccessWidth::Byte | AccessWidth::Halfword => per_half,
        };
        AccessTiming::uniform(cycles)
    }

    fn write_haltcnt(&mut self, value: u8) {
        let mode = if value & 0x80 != 0 {
            PowerDown::Stop
        } else {
            PowerDown::Halt
        };
        log::debug!("power-down: {} -> {}", self.power.name(), mode.name());
        self.power = mode;
    }
}

/// Memory control is mirrored every 64K through the I/O page.
const fn unmirror(address: u32) -> u32 {
    if address & 0xFF00_FFFC == MEMCNT {
        address & 0xFF00_FFFF
    } else {
        address
    }
}

impl Io for Control {
    fn read_io(&mut self, address: u32) -> Option<u8> {
        let [ie_lo, ie_hi] = self.enabled.to_le_bytes();
        let [if_lo, if_hi] = self.requested.to_le_bytes();
        let [wait_lo, wait_hi] = self.waitcnt.to_le_bytes();
        let memcnt = self.memcnt.to_le_bytes();
        match unmirror(address) {
            0x0400_0200 => Some(ie_lo),
            0x0400_0201 => Some(ie_hi),
            0x0400_0202 => Some(if_lo),
            0x0400_0203 => Some(if_hi),
            0x0400_0204 => Some(wait_lo),
            0x0400_0205 => Some(wait_hi),
            0x0400_0208 => Some(self.master_enable),
            0x0400_0206 | 0x0400_0207 | 0x0400_0209..=0x0400_020B => Some(0),
            0x0400_0300 => Some(self.postflg),
            0x0400_0301..=0x0400_0303 => Some(0),
            0x0400_0410 => Some(self.undocumented_410),
            0x0400_0800 => Some(memcnt[0]),
            0x0400_0801 | 0x0400_0802 => Some(0),
            0x0400_0803 => Some(memcnt[3]),
            _ => None,
        }
    }

    fn write_io(&mut self, address: u32, value: u8) {
        match unmirror(address) {
            0x0400_0200 => self.enabled = (self.enabled & 0xFF00) | u16::from(value),
            0x0400_0201 => self.enabled = (self.enabled & 0x00FF) | u16::from(value & 0x3F) << 8,
            0x0400_0202 => self.requested &= !u16::from(value),
            0x0400_0203 => self.requested &= !(u16::from(value) << 8) & IRQ_ALL,
            0x0400_0204 => self.waitcnt = (self.waitcnt & 0xFF00) | u16::from(value),
            0x0400_0205 => {
                self.waitcnt = (self.waitcnt & 0x00FF) | u16::from(value & !0xA0) << 8;
            }
            0x0400_0208 => self.master_enable = value & 1,
            0x0400_0300 => self.postflg = value & 1,
            0x0400_0301 => self.write_haltcnt(value),
            0x0400_0410 => self.undocumented_410 = value,
            0x0400_0800 => self.memcnt = (self.memcnt & !0xFF) | u32::from(value & !0xD0),
            0x0400_0803 => self.memcnt = (self.memcnt & 0x00FF_FFFF) | u32::from(value) << 24,
            _ => {}
        }
    }
}
