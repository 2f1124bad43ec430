//! Exception descriptors.

use crate::flags::{F, I, Mode};

/// One of the seven exception kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exception {
    Reset,
    Undefined,
    SoftwareInterrupt,
    PrefetchAbort,
    DataAbort,
    Interrupt,
    FastInterrupt,
}

/// Fixed entry parameters for an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub vector: u32,
    pub mode: Mode,
    /// Status bits set on entry.
    pub mask: u32,
    /// Added to the address of the next instruction to form the link.
    pub link_offset: u32,
    /// Cycles charged on top of the pipeline refill.
    pub extra_cycles: u32,
}

/// Extra internal cycles for an undefined instruction trap.
pub const UND_EXTRA_CYCLES: u32 = 1;
/// Extra internal cycles for interrupt entry.
pub const IRQ_EXTRA_CYCLES: u32 = 4;

impl Exception {
    #[must_use]
    pub const fn descriptor(self) -> Descriptor {
        match self {
            Self::Reset => Descriptor {
                vector: 0x00,
                mode: Mode::Supervisor,
                mask: I | F,
                link_offset: 0,
                extra_cycles: 0,
            },
            Self::Undefined => Descriptor {
                vector: 0x04,
                mode: Mode::Undefined,
                mask: I,
                link_offset: 0,
                extra_cycles: UND_EXTRA_CYCLES,
            },
            Self::SoftwareInterrupt => Descriptor {
                vector: 0x08,
                mode: Mode::Supervisor,
                mask: I,
                link_offset: 0,
                extra_cycles: 0,
            },
            Self::PrefetchAbort => Descriptor {
                vector: 0x0C,
                mode: Mode::Abort,
                mask: I,
                link_offset: 0,
                extra_cycles: 0,
            },
            Self::DataAbort => Descriptor {
                vector: 0x10,
                mode: Mode::Abort,
                mask: I,
                link_offset: 4,
                extra_cycles: 0,
            },
            Self::Interrupt => Descriptor {
                vector: 0x18,
                mode: Mode::Irq,
                mask: I,
                link_offset: 4,
                extra_cycles: IRQ_EXTRA_CYCLES,
            },
            Self::FastInterrupt => Descriptor {
                vector: 0x1C,
                mode: Mode::Fiq,
                mask: I | F,
                link_offset: 4,
                extra_cycles: IRQ_EXTRA_CYCLES,
            },
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Undefined => "undefined",
            Self::SoftwareInterrupt => "swi",
            Self::PrefetchAbort => "prefetch abort",
            Self::DataAbort => "data abort",
            Self::Interrupt => "irq",
            Self::FastInterrupt => "fiq",
        }
    }
}
