//! Machine bus: address decoding and wait states.
//!
//! Implements `emu_core::Bus` for the handheld. Bits 24-31 of the address
//! select the region:
//!
//! | Region | Contents                         | Bus      |
//! |--------|----------------------------------|----------|
//! | 0x00   | BIOS, 16K                        | 32-bit   |
//! | 0x02   | Work RAM, 256K                   | 16-bit   |
//! | 0x03   | Work RAM, 32K                    | 32-bit   |
//! | 0x04   | I/O registers                    | 32-bit   |
//! | 0x05   | Palette RAM (video)              | 16-bit   |
//! | 0x06   | VRAM (video)                     | 16-bit   |
//! | 0x07   | OAM (video)                      | 32-bit   |
//! | 0x08+  | Cartridge ROM, three mirrors     | 16-bit   |
//! | 0x0E+  | Cartridge backup                 | 8-bit    |
//!
//! Anything unmapped reads back the word in the CPU's prefetch slot.

use emu_core::{AccessTiming, AccessWidth, Bus, ReadResult};

use crate::cartridge;
use crate::config::{BootMode, GbaConfig};
use crate::control::Control;
use crate::device::{Detached, Device, Dma, Io, NoDma, Video};
use crate::error::GbaError;
use crate::keypad::Keypad;

pub const BIOS_SIZE: usize = 0x4000;
const EWRAM_SIZE: usize = 0x4_0000;
const IWRAM_SIZE: usize = 0x8000;

/// Offset mask within a cartridge ROM mirror.
const ROM_MIRROR_MASK: u32 = 0x01FF_FFFF;

/// Which block owns an I/O register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoBlock {
    Video,
    Audio,
    Dma,
    Timers,
    Serial,
    Keypad,
    Control,
}

impl IoBlock {
    const fn at(address: u32) -> Self {
        if address < 0x0400_0060 {
            Self::Video
        } else if address < 0x0400_00B0 {
            Self::Audio
        } else if address < 0x0400_0100 {
            Self::Dma
        } else if address < 0x0400_0120 {
            Self::Timers
        } else if address < 0x0400_0130 {
            Self::Serial
        } else if address < 0x0400_0134 {
            Self::Keypad
        } else if address < 0x0400_0200 {
            Self::Serial
        } else {
            Self::Control
        }
    }
}

/// The handheld bus, implementing `emu_core::Bus`.
pub struct GbaBus {
    bios: Box<[u8]>,
    ewram: Box<[u8]>,
    iwram: Box<[u8]>,
    rom: Box<[u8]>,
    /// Interrupt, wait-state and power-down control.
    pub control: Control,
    pub keypad: Keypad,
    /// Video unit, also owner of palette RAM, VRAM and OAM.
    pub video: Box<dyn Video>,
    pub audio: Box<dyn Device>,
    pub timers: Box<dyn Device>,
    pub serial: Box<dyn Io>,
    pub dma: Box<dyn Dma>,
    /// Cartridge backup, one byte per address. Unbacked reads return 0.
    pub backup: Box<dyn Io>,
    /// Last word the CPU latched into its prefetch slot.
    prefetch: u32,
    /// Set while the CPU is fetching an opcode.
    opcode_fetch: bool,
}

impl GbaBus {
    /// Build the bus from the configured images, with no peripherals
    /// attached.
    pub fn new(config: &GbaConfig) -> Result<Self, GbaError> {
        Ok(Self {
            bios: bios_image(&config.bios, config.boot)?,
            ewram: vec![0; EWRAM_SIZE].into_boxed_slice(),
            iwram: vec![0; IWRAM_SIZE].into_boxed_slice(),
            rom: cartridge::rom_image(&config.rom)?,
            control: Control::new(),
            keypad: Keypad::new(),
            video: Box::new(Detached),
            audio: Box::new(Detached),
            timers: Box::new(Detached),
            serial: Box::new(Detached),
            dma: Box::new(NoDma),
            backup: Box::new(Detached),
            prefetch: 0,
            opcode_fetch: false,
        })
    }

    /// Clear work RAM and the internal registers.
    ///
    /// Attached peripherals keep their state.
    pub fn reset(&mut self) {
        self.ewram.fill(0);
        self.iwram.fill(0);
        self.control.reset();
        self.keypad.reset();
        self.prefetch = 0;
        self.opcode_fetch = false;
    }

    /// The padded cartridge image.
    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    /// Read a byte of BIOS, work RAM or ROM without side effects.
    ///
    /// Returns `None` for regions owned by peripherals.
    #[must_use]
    pub fn peek(&self, address: u32) -> Option<u8> {
        let offset = address as usize;
        match address >> 24 {
            0x00 => self.bios.get(offset).copied(),
            0x02 => Some(self.ewram[offset & (EWRAM_SIZE - 1)]),
            0x03 => Some(self.iwram[offset & (IWRAM_SIZE - 1)]),
            0x08..=0x0D => self
                .rom
                .get((address & ROM_MIRROR_MASK) as usize)
                .copied(),
            _ => None,
        }
    }

    /// The prefetch word as a read of `width` at `address` sees it.
    fn open_bus(&self, address: u32, width: AccessWidth) -> u32 {
        match width {
            AccessWidth::Word => self.prefetch,
            AccessWidth::Halfword => (self.prefetch >> ((address & 2) * 8)) & 0xFFFF,
            AccessWidth::Byte => (self.prefetch >> ((address & 3) * 8)) & 0xFF,
        }
    }

    fn read_io(&mut self, address: u32) -> Option<u8> {
        match IoBlock::at(address) {
            IoBlock::Video => self.video.read_io(address),
            IoBlock::Audio => self.audio.read_io(address),
            IoBlock::Dma => self.dma.read_io(address),
            IoBlock::Timers => self.timers.read_io(address),
            IoBlock::Serial => self.serial.read_io(address),
            IoBlock::Keypad => self.keypad.read_io(address),
            IoBlock::Control => self.control.read_io(address),
        }
    }

    fn write_io(&mut self, address: u32, value: u8) {
        match IoBlock::at(address) {
            IoBlock::Video => self.video.write_io(address, value),
            IoBlock::Audio => self.audio.write_io(address, value),
            IoBlock::Dma => self.dma.write_io(address, value),
            IoBlock::Timers => self.timers.write_io(address, value),
            IoBlock::Serial => self.serial.write_io(address, value),
            IoBlock::Keypad => self.keypad.write_io(address, value),
            IoBlock::Control => self.control.write_io(address, value),
        }
    }

    /// Assemble an I/O read byte by byte; unbacked bytes keep the open-bus
    /// lane.
    fn read_io_lanes(&mut self, base: u32, width: AccessWidth) -> u32 {
        let open = self.open_bus(base, width);
        (0..width.bytes()).fold(0, |acc, lane| {
            let fallback = (open >> (lane * 8)) as u8;
            let byte = self.read_io(base + lane).unwrap_or(fallback);
            acc | u32::from(byte) << (lane * 8)
        })
    }

    fn read_rom(&self, base: u32, width: AccessWidth) -> u32 {
        let offset = (base & ROM_MIRROR_MASK) as usize;
        if offset < self.rom.len() {
            load(&self.rom, offset, width)
        } else {
            0
        }
    }

    /// Small work RAM, also reached through region 0x02 when the large
    /// bank is switched off.
    fn iwram_offset(base: u32) -> usize {
        base as usize & (IWRAM_SIZE - 1)
    }
}

/// Video memory costs an extra cycle for words on its 16-bit bus.
const fn narrow_bus(width: AccessWidth) -> AccessTiming {
    match width {
        AccessWidth::Word => AccessTiming::uniform(2),
        AccessWidth::Byte | AccessWidth::Halfword => AccessTiming::SINGLE,
    }
}

fn load(memory: &[u8], offset: usize, width: AccessWidth) -> u32 {
    memory[offset..offset + width.bytes() as usize]
        .iter()
        .rev()
        .fold(0, |acc, &b| acc << 8 | u32::from(b))
}

fn store(memory: &mut [u8], offset: usize, value: u32, width: AccessWidth) {
    let n = width.bytes() as usize;
    memory[offset..offset + n].copy_from_slice(&value.to_le_bytes()[..n]);
}

/// The byte a backup access carries: the lane selected by the address.
const fn backup_lane(address: u32, value: u32, width: AccessWidth) -> u8 {
    (value >> ((address & (width.bytes() - 1)) * 8)) as u8
}

fn bios_image(bios: &[u8], boot: BootMode) -> Result<Box<[u8]>, GbaError> {
    match bios.len() {
        0 if boot == BootMode::Direct => Ok(vec![0; BIOS_SIZE].into_boxed_slice()),
        n if n < BIOS_SIZE => Err(GbaError::BiosSize(n)),
        n => {
            if n > BIOS_SIZE {
                log::warn!("BIOS image is {n} bytes; using the first {BIOS_SIZE}");
            }
            Ok(bios[..BIOS_SIZE].into())
        }
    }
}

impl Bus for GbaBus {
    fn read(&mut self, address: u32, width: AccessWidth) -> ReadResult {
        let base = width.align(address);
        match base >> 24 {
            0x00 => {
                let data = if (base as usize) < BIOS_SIZE {
                    load(&self.bios, base as usize, width)
                } else {
                    self.open_bus(base, width)
                };
                ReadResult::new(data)
            }
            0x02 if self.control.wram_enabled() && self.control.wram_256k_enabled() => {
                let data = load(&self.ewram, base as usize & (EWRAM_SIZE - 1), width);
                ReadResult::with_timing(data, self.control.wram_256k_wait(width))
            }
            0x02 | 0x03 if self.control.wram_enabled() => {
                ReadResult::new(load(&self.iwram, Self::iwram_offset(base), width))
            }
            0x04 => ReadResult::new(self.read_io_lanes(base, width)),
            region @ 0x05..=0x07 => {
                let data = self
                    .video
                    .read_memory(base, width)
                    .unwrap_or_else(|| self.open_bus(base, width));
                let timing = if region == 0x07 {
                    AccessTiming::SINGLE
                } else {
                    narrow_bus(width)
                };
                ReadResult::with_timing(data, timing)
            }
            0x08..=0x0D => {
                let data = self.read_rom(base, width);
                let timing = if self.control.prefetch_enabled() && self.opcode_fetch {
                    narrow_bus(width)
                } else {
                    self.control.rom_wait(base, width)
                };
                ReadResult::with_timing(data, timing)
            }
            0x0E | 0x0F => {
                let byte = self.backup.read_io(address).unwrap_or(0);
                let data = u32::from(byte) * 0x0101_0101 & width.mask();
                ReadResult::with_timing(data, self.control.sram_wait())
            }
            _ => ReadResult::new(self.open_bus(base, width)),
        }
    }

    fn write(&mut self, address: u32, value: u32, width: AccessWidth) -> AccessTiming {
        let base = width.align(address);
        match base >> 24 {
            0x02 if self.control.wram_enabled() && self.control.wram_256k_enabled() => {
                store(&mut self.ewram, base as usize & (EWRAM_SIZE - 1), value, width);
                self.control.wram_256k_wait(width)
            }
            0x02 | 0x03 if self.control.wram_enabled() => {
                store(&mut self.iwram, Self::iwram_offset(base), value, width);
                AccessTiming::SINGLE
            }
            0x04 => {
                for lane in 0..width.bytes() {
                    self.write_io(base + lane, (value >> (lane * 8)) as u8);
                }
                AccessTiming::SINGLE
            }
            region @ 0x05..=0x07 => {
                self.video.write_memory(base, value, width);
                if region == 0x07 {
                    AccessTiming::SINGLE
                } else {
                    narrow_bus(width)
                }
            }
            0x08..=0x0D => self.control.rom_wait(base, width),
            0x0E | 0x0F => {
                self.backup
                    .write_io(address, backup_lane(address, value, width));
                self.control.sram_wait()
            }
            _ => AccessTiming::SINGLE,
        }
    }

    fn fetch(&mut self, address: u32, width: AccessWidth) -> ReadResult {
        self.opcode_fetch = true;
        let result = self.read(address, width);
        self.opcode_fetch = false;
        result
    }

    fn latch_prefetch(&mut self, word: u32) {
        self.prefetch = word;
    }
}
