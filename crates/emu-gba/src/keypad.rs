//! Keypad: KEYINPUT and KEYCNT.
//!
//! The host thread writes button state through a [`KeypadHandle`]; the
//! emulation thread latches a snapshot into KEYINPUT at each poll. Nothing
//! else is shared.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use crate::device::Io;

pub const KEYINPUT: u32 = 0x0400_0130;
pub const KEYCNT: u32 = 0x0400_0132;

const BUTTON_ALL: u16 = 0x03FF;
const IRQ_ENABLE: u16 = 1 << 14;
/// Set: interrupt when all selected buttons are down. Clear: any.
const IRQ_AND: u16 = 1 << 15;

/// Handheld buttons, in KEYINPUT bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    Select,
    Start,
    Right,
    Left,
    Up,
    Down,
    R,
    L,
}

impl Button {
    #[must_use]
    pub const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Host-side view of the buttons.
///
/// Cloneable and lock-free; bits are set for pressed buttons.
#[derive(Debug, Clone, Default)]
pub struct KeypadHandle(Arc<AtomicU16>);

impl KeypadHandle {
    pub fn press(&self, button: Button) {
        self.0.fetch_or(button.bit(), Ordering::Relaxed);
    }

    pub fn release(&self, button: Button) {
        self.0.fetch_and(!button.bit(), Ordering::Relaxed);
    }

    /// Replace the whole button state.
    pub fn set(&self, pressed: u16) {
        self.0.store(pressed & BUTTON_ALL, Ordering::Relaxed);
    }

    #[must_use]
    pub fn pressed(&self) -> u16 {
        self.0.load(Ordering::Relaxed) & BUTTON_ALL
    }
}

/// Keypad registers.
#[derive(Debug, Clone)]
pub struct Keypad {
    handle: KeypadHandle,
    /// Active low.
    keyinput: u16,
    keycnt: u16,
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Keypad {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: KeypadHandle::default(),
            keyinput: BUTTON_ALL,
            keycnt: 0,
        }
    }

    /// Reset the registers. Buttons held on the handle stay held.
    pub fn reset(&mut self) {
        self.keyinput = BUTTON_ALL;
        self.keycnt = 0;
    }

    #[must_use]
    pub fn handle(&self) -> KeypadHandle {
        self.handle.clone()
    }

    #[must_use]
    pub const fn keyinput(&self) -> u16 {
        self.keyinput
    }

    /// Latch the host's buttons. Returns true when the keypad interrupt
    /// condition holds.
    ///
    /// While stopped the condition is checked even with the interrupt
    /// disabled in KEYCNT, so a key combination can wake the machine.
    pub fn sync(&mut self, stopped: bool) -> bool {
        let selected = self.keycnt & BUTTON_ALL;
        self.keyinput = !self.handle.pressed() & BUTTON_ALL;
        if (self.keycnt & IRQ_ENABLE == 0 && !stopped) || selected == 0 {
            return false;
        }
        let down = !self.keyinput & selected;
        if self.keycnt & IRQ_AND == 0 {
            down != 0
        } else {
            down == selected
        }
    }
}

impl Io for Keypad {
    fn read_io(&mut self, address: u32) -> Option<u8> {
        let [input_lo, input_hi] = self.keyinput.to_le_bytes();
        let [cnt_lo, cnt_hi] = self.keycnt.to_le_bytes();
        match address {
            0x0400_0130 => Some(input_lo),
            0x0400_0131 => Some(input_hi),
            0x0400_0132 => Some(cnt_lo),
            0x0400_0133 => Some(cnt_hi),
            _ => None,
        }
    }

    fn write_io(&mut self, address: u32, value: u8) {
        match address {
            0x0400_0132 => self.keycnt = (self.keycnt & 0xFF00) | u16::from(value),
            0x0400_0133 => self.keycnt = (self.keycnt & 0x00FF) | u16::from(value & 0xC3) << 8,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keycnt(keypad: &mut Keypad, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        keypad.write_io(KEYCNT, lo);
        keypad.write_io(KEYCNT + 1, hi);
    }

    #[test]
    fn keyinput_is_active_low() {
        let mut keypad = Keypad::new();
        let handle = keypad.handle();
        assert_eq!(keypad.keyinput(), 0x03FF);

        handle.press(Button::A);
        handle.press(Button::L);
        // Not visible until the next poll.
        assert_eq!(keypad.read_io(KEYINPUT), Some(0xFF));
        keypad.sync(false);
        assert_eq!(keypad.read_io(KEYINPUT), Some(0xFE));
        assert_eq!(keypad.read_io(KEYINPUT + 1), Some(0x01));

        handle.release(Button::A);
        keypad.sync(false);
        assert_eq!(keypad.keyinput(), 0x01FF);
    }

    #[test]
    fn keycnt_masks_reserved_bits() {
        let mut keypad = Keypad::new();
        keycnt(&mut keypad, 0xFFFF);
        assert_eq!(keypad.read_io(KEYCNT + 1), Some(0xC3));
    }

    #[test]
    fn any_selected_button_raises() {
        let mut keypad = Keypad::new();
        let handle = keypad.handle();
        keycnt(&mut keypad, IRQ_ENABLE | Button::Start.bit() | Button::Select.bit());
        assert!(!keypad.sync(false));
        handle.press(Button::B);
        assert!(!keypad.sync(false));
        handle.press(Button::Start);
        assert!(keypad.sync(false));
    }

    #[test]
    fn all_selected_buttons_required() {
        let mut keypad = Keypad::new();
        let handle = keypad.handle();
        keycnt(&mut keypad, IRQ_ENABLE | IRQ_AND | Button::A.bit() | Button::B.bit());
        handle.press(Button::A);
        assert!(!keypad.sync(false));
        handle.press(Button::B);
        assert!(keypad.sync(false));
    }

    #[test]
    fn disabled_interrupt_still_wakes_from_stop() {
        let mut keypad = Keypad::new();
        let handle = keypad.handle();
        keycnt(&mut keypad, Button::Up.bit());
        handle.set(Button::Up.bit());
        assert!(!keypad.sync(false));
        assert!(keypad.sync(true));
    }

    #[test]
    fn nothing_selected_never_raises() {
        let mut keypad = Keypad::new();
        keypad.handle().set(0x03FF);
        keycnt(&mut keypad, IRQ_ENABLE);
        assert!(!keypad.sync(true));
    }
}
