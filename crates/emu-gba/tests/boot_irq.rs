//! Boot through a minimal BIOS and service vertical-blank interrupts.
//!
//! The BIOS image is built as a byte array:
//! - 0x00: reset vector, loads PC from the literal at 0x20 (cartridge entry)
//! - 0x18: IRQ vector, branches to a handler at 0x28 that acknowledges IF
//!   and counts interrupts in r10
//!
//! The cartridge enables the vertical-blank interrupt, unmasks IRQs and
//! halts in a loop. A stand-in video unit raises vertical blank every
//! 1000 cycles.

use emu_core::{Cpu, Observable, Value};
use emu_gba::{
    BIOS_SIZE, BootMode, Device, Gba, GbaConfig, Interrupt, Io, PowerDown, Signals, Video,
};

const PERIOD: i32 = 1000;

/// Raises vertical blank every `PERIOD` cycles.
struct Blanker {
    remaining: i32,
}

impl Io for Blanker {}

impl Device for Blanker {
    fn next_event(&self) -> i32 {
        self.remaining
    }

    fn sync(&mut self, ticks: u32) -> Signals {
        self.remaining -= ticks as i32;
        let mut signals = Signals::NONE;
        while self.remaining <= 0 {
            self.remaining += PERIOD;
            signals = signals.with_interrupt(Interrupt::VBlank);
        }
        signals
    }
}

impl Video for Blanker {}

fn words(code: &[u32]) -> Vec<u8> {
    code.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn build_bios() -> Vec<u8> {
    let mut bios = vec![0u8; BIOS_SIZE];
    let code = words(&[
        0xE59F_F018, // 0x00: LDR pc, [pc, #0x18]
        0, 0, 0, 0, 0,
        0xEA00_0002, // 0x18: B 0x28
        0,
        0x0800_0000, // 0x20: cartridge entry
        0,
        0xE3A0_C301, // 0x28: MOV r12, #0x04000000
        0xE28C_CC02, //       ADD r12, r12, #0x200
        0xE3A0_B001, //       MOV r11, #1
        0xE1CC_B0B2, //       STRH r11, [r12, #2]   ; IF = VBlank
        0xE28A_A001, //       ADD r10, r10, #1
        0xE25E_F004, //       SUBS pc, lr, #4
    ]);
    bios[..code.len()].copy_from_slice(&code);
    bios
}

fn build_rom() -> Vec<u8> {
    words(&[
        0xE3A0_0301, // MOV r0, #0x04000000
        0xE280_1C02, // ADD r1, r0, #0x200
        0xE3A0_2001, // MOV r2, #1
        0xE1C1_20B0, // STRH r2, [r1]          ; IE = VBlank
        0xE5C1_2008, // STRB r2, [r1, #8]      ; IME = 1
        0xE321_F01F, // MSR cpsr_c, #0x1F      ; system mode, IRQs on
        0xE3A0_3000, // idle: MOV r3, #0
        0xE5C0_3301, //       STRB r3, [r0, #0x301] ; HALTCNT: halt
        0xEAFF_FFFC, //       B idle
    ])
}

fn boot() -> Gba {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = GbaConfig {
        bios: build_bios(),
        rom: build_rom(),
        boot: BootMode::Bios,
    };
    Gba::new(&config)
        .expect("valid images")
        .with_video(Box::new(Blanker { remaining: PERIOD }))
}

#[test]
fn test_reset_vector_reaches_cartridge() {
    let mut gba = boot();
    assert_eq!(gba.cpu().pc(), 0);
    while gba.cpu().pc() < 0x0800_0000 {
        gba.run_batch();
    }
    assert_eq!(gba.query("cpu.mode"), Some(Value::from("sys")));
}

#[test]
fn test_vblank_interrupts_are_serviced() {
    let mut gba = boot();
    while gba.cycles().get() < 10_500 {
        gba.run_batch();
    }
    assert_eq!(gba.cpu().reg(10), 10);
}

#[test]
fn test_cpu_sleeps_between_interrupts() {
    let mut gba = boot();
    while gba.cycles().get() < 5_000 {
        gba.run_batch();
    }
    // Halted batches cost the CPU nothing: a whole period passes in far
    // fewer instructions than it has cycles.
    let before = gba.cpu().cycles();
    let start = gba.cycles().get();
    while gba.cycles().get() < start + 3 * PERIOD as u64 {
        gba.run_batch();
    }
    assert!(gba.cpu().cycles() - before < PERIOD as u64);
    assert_ne!(gba.bus().control.power_down(), PowerDown::Stop);
}
