//! Cartridge ROM image and header.

use crate::error::GbaError;

/// Largest ROM the cartridge bus can address: 32M.
pub const ROM_MAX_SIZE: usize = 0x0200_0000;

/// Images are padded to whole words and to at least the header size.
const ROM_MIN_SIZE: usize = 0x100;

const TITLE: core::ops::Range<usize> = 0xA0..0xAC;
const GAME_CODE: core::ops::Range<usize> = 0xAC..0xB0;
const CHECKSUM_START: usize = 0xA0;
const CHECKSUM: usize = 0xBD;

/// Fields of the cartridge header that identify the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    /// Four-letter code, prefixed "AGB-".
    pub game_code: String,
    /// Complement check byte stored at 0xBD.
    pub checksum: u8,
    /// Check byte computed over 0xA0-0xBC.
    pub computed_checksum: u8,
}

impl Header {
    /// Read the header from a padded image.
    #[must_use]
    pub fn parse(image: &[u8]) -> Self {
        let computed = image[CHECKSUM_START..CHECKSUM]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_sub(b))
            .wrapping_sub(0x19);
        Self {
            title: printable(&image[TITLE]),
            game_code: format!("AGB-{}", printable(&image[GAME_CODE])),
            checksum: image[CHECKSUM],
            computed_checksum: computed,
        }
    }

    #[must_use]
    pub const fn checksum_ok(&self) -> bool {
        self.checksum == self.computed_checksum
    }
}

/// Header text up to the first NUL, with anything unprintable shown as '?'.
fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '?' })
        .collect()
}

/// Pad a ROM dump into the image the bus maps.
///
/// The image is a whole number of words, at least 256 bytes, and filled
/// with 0xFF past the end of the dump.
pub fn rom_image(rom: &[u8]) -> Result<Box<[u8]>, GbaError> {
    if rom.is_empty() {
        return Err(GbaError::EmptyRom);
    }
    if rom.len() > ROM_MAX_SIZE {
        return Err(GbaError::RomTooLarge(rom.len()));
    }
    let size = rom.len().next_multiple_of(4).max(ROM_MIN_SIZE);
    let mut image = vec![0xFF; size];
    image[..rom.len()].copy_from_slice(rom);
    Ok(image.into_boxed_slice())
}
