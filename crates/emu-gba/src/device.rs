//! Peripheral contracts.
//!
//! The scheduler needs two things from a peripheral: how long until it next
//! needs attention, and a way to hand it elapsed time. Register access goes
//! through [`Io`], one byte at a time, so every device sees the same
//! byte-lane decoding regardless of the CPU's access width.
//!
//! Video, audio, timers, serial and DMA engines are not part of this crate.
//! [`Detached`] and [`NoDma`] stand in for whichever of them are not plugged
//! in.

use emu_core::{AccessWidth, Bus};

use crate::control::Interrupt;

/// Horizon reported by a peripheral with nothing scheduled: one scanline.
pub const IDLE_HORIZON: i32 = 1232;

/// Byte-wide register access.
pub trait Io {
    /// Read the register byte at `address`.
    ///
    /// `None` means the address is not backed by a register and the bus
    /// keeps the open-bus byte.
    fn read_io(&mut self, _address: u32) -> Option<u8> {
        None
    }

    fn write_io(&mut self, _address: u32, _value: u8) {}
}

/// A peripheral driven by elapsed time.
pub trait Device: Io {
    /// Cycles until this device next changes state on its own.
    ///
    /// Zero or negative means it is already due.
    fn next_event(&self) -> i32;

    /// Advance by `ticks` cycles and report what the device raised.
    ///
    /// The scheduler never calls this with zero.
    fn sync(&mut self, ticks: u32) -> Signals;
}

/// The video unit also owns palette RAM, VRAM and OAM.
pub trait Video: Device {
    /// Read from regions 0x05-0x07. `None` reads open bus.
    fn read_memory(&mut self, _address: u32, _width: AccessWidth) -> Option<u32> {
        None
    }

    fn write_memory(&mut self, _address: u32, _value: u32, _width: AccessWidth) {}
}

/// Video events that start DMA channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmaTrigger {
    VBlank,
    HBlank,
    /// Video capture line start (lines 2-161).
    Capture,
    /// Video capture finished (line 162).
    CaptureEnd,
}

impl DmaTrigger {
    pub const ALL: [Self; 4] = [Self::VBlank, Self::HBlank, Self::Capture, Self::CaptureEnd];

    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// What a device raised while it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signals {
    /// Interrupt sources, as IF bits.
    pub interrupts: u16,
    /// DMA triggers, as [`DmaTrigger::bit`] flags.
    pub dma: u8,
}

impl Signals {
    pub const NONE: Self = Self {
        interrupts: 0,
        dma: 0,
    };

    #[must_use]
    pub const fn with_interrupt(mut self, irq: Interrupt) -> Self {
        self.interrupts |= irq.bit();
        self
    }

    #[must_use]
    pub const fn with_dma(mut self, trigger: DmaTrigger) -> Self {
        self.dma |= trigger.bit();
        self
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.interrupts == 0 && self.dma == 0
    }

    /// Triggers raised, in [`DmaTrigger::ALL`] order.
    pub fn triggers(self) -> impl Iterator<Item = DmaTrigger> {
        DmaTrigger::ALL
            .into_iter()
            .filter(move |trigger| self.dma & trigger.bit() != 0)
    }
}

impl core::ops::BitOr for Signals {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            interrupts: self.interrupts | rhs.interrupts,
            dma: self.dma | rhs.dma,
        }
    }
}

impl core::ops::BitOrAssign for Signals {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// The DMA controller.
///
/// Transfers run on the machine bus while the CPU is stalled. The
/// scheduler hands the controller a cycle limit and calls it again while
/// any channel is still active.
pub trait Dma: Io {
    /// Whether any channel has work to do.
    fn is_pending(&self) -> bool;

    /// A video event fired; start the channels waiting on it.
    fn trigger(&mut self, trigger: DmaTrigger);

    /// Run the first active channel for roughly `limit` cycles.
    ///
    /// Returns the cycles spent and the interrupts raised by channels that
    /// finished.
    fn transfer(&mut self, bus: &mut dyn Bus, limit: i32) -> (u32, Signals);
}

/// A peripheral slot with nothing plugged in.
///
/// Never raises anything and reports an idle horizon so the CPU runs in
/// scanline-sized batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl Io for Detached {}

impl Device for Detached {
    fn next_event(&self) -> i32 {
        IDLE_HORIZON
    }

    fn sync(&mut self, _ticks: u32) -> Signals {
        Signals::NONE
    }
}

impl Video for Detached {}

/// A DMA controller with no channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDma;

impl Io for NoDma {}

impl Dma for NoDma {
    fn is_pending(&self) -> bool {
        false
    }

    fn trigger(&mut self, _trigger: DmaTrigger) {}

    fn transfer(&mut self, _bus: &mut dyn Bus, _limit: i32) -> (u32, Signals) {
        (0, Signals::NONE)
    }
}
