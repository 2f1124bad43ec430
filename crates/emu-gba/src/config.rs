//! Machine configuration.

/// How the machine starts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    /// Run the boot ROM from the reset vector.
    #[default]
    Bios,
    /// Skip the boot ROM: seed the stacks as it would and jump straight to
    /// the cartridge. The BIOS image may be empty.
    Direct,
}

/// Machine configuration.
#[derive(Debug, Clone, Default)]
pub struct GbaConfig {
    /// Boot ROM image, exactly 16K.
    pub bios: Vec<u8>,
    /// Cartridge ROM image, at most 32M.
    pub rom: Vec<u8>,
    /// Defaults to running the boot ROM.
    pub boot: BootMode,
}
