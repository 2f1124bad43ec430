//! Top-level handheld system and its scheduler.
//!
//! Everything runs off one 16.78 MHz crystal. The scheduler works in
//! batches: it asks the timers, audio and video how long until each next
//! needs attention, runs the CPU up to the nearest of those horizons, then
//! hands the elapsed cycles to all three. No peripheral ever sees time the
//! CPU has not spent, and the CPU never runs past a horizon by more than
//! one instruction.
//!
//! A batch ends early when an interrupt becomes due, a DMA channel becomes
//! active or the CPU writes HALTCNT.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};

use arm7tdmi::Arm7tdmi;
use emu_core::{AccessWidth, Bus, Cpu, MasterClock, Observable, Ticks, Value};

use crate::bus::GbaBus;
use crate::cartridge::Header;
use crate::config::{BootMode, GbaConfig};
use crate::control::{Interrupt, POSTFLG, PowerDown};
use crate::device::{Device, Dma, Io, NoDma, Signals, Video};
use crate::error::GbaError;
use crate::keypad::KeypadHandle;

/// The handheld.
pub struct Gba {
    cpu: Arm7tdmi,
    bus: GbaBus,
    header: Header,
    boot: BootMode,
    /// Crystal ticks handed to the peripherals since reset.
    cycles: Ticks,
    /// CPU cycles spent outside a batch (reset, interrupt entry), charged
    /// to the next one.
    carried: u32,
}

impl Gba {
    /// Build the machine and reset it.
    ///
    /// No peripherals are attached; plug them in with the `with_*`
    /// builders.
    pub fn new(config: &GbaConfig) -> Result<Self, GbaError> {
        let bus = GbaBus::new(config)?;
        let header = Header::parse(bus.rom());
        log::debug!(
            "cartridge {:?} ({}), {} bytes, header check {}",
            header.title,
            header.game_code,
            bus.rom().len(),
            if header.checksum_ok() { "ok" } else { "bad" }
        );
        let mut gba = Self {
            cpu: Arm7tdmi::new(),
            bus,
            header,
            boot: config.boot,
            cycles: Ticks::ZERO,
            carried: 0,
        };
        gba.reset();
        Ok(gba)
    }

    #[must_use]
    pub fn with_video(mut self, video: Box<dyn Video>) -> Self {
        self.bus.video = video;
        self
    }

    #[must_use]
    pub fn with_audio(mut self, audio: Box<dyn Device>) -> Self {
        self.bus.audio = audio;
        self
    }

    #[must_use]
    pub fn with_timers(mut self, timers: Box<dyn Device>) -> Self {
        self.bus.timers = timers;
        self
    }

    #[must_use]
    pub fn with_serial(mut self, serial: Box<dyn Io>) -> Self {
        self.bus.serial = serial;
        self
    }

    #[must_use]
    pub fn with_dma(mut self, dma: Box<dyn Dma>) -> Self {
        self.bus.dma = dma;
        self
    }

    #[must_use]
    pub fn with_backup(mut self, backup: Box<dyn Io>) -> Self {
        self.bus.backup = backup;
        self
    }

    /// Reset the CPU, work RAM and internal registers.
    ///
    /// With [`BootMode::Direct`] the machine starts at the cartridge entry
    /// point in the state the boot ROM would leave it in.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cycles = Ticks::ZERO;
        self.carried = match self.boot {
            BootMode::Bios => self.cpu.reset(&mut self.bus),
            BootMode::Direct => {
                self.bus.write(POSTFLG, 1, AccessWidth::Byte);
                self.cpu.boot_direct(&mut self.bus)
            }
        };
        log::debug!("reset ({:?} boot)", self.boot);
    }

    /// Run one scheduler batch. Returns the cycles it handed to the
    /// peripherals, always at least one.
    pub fn run_batch(&mut self) -> u64 {
        let start = self.cycles;
        self.poll_keypad();

        match self.bus.control.power_down() {
            PowerDown::None => {
                let ticks = self.run_cpu();
                self.sync(ticks);
            }
            PowerDown::Halt => {
                let carried = i64::from(mem::take(&mut self.carried));
                self.sync(carried + i64::from(self.horizon().max(1)));
            }
            PowerDown::Stop => {
                self.run_stopped();
                return (self.cycles - start).get();
            }
        }

        self.drain_dma();
        if self.bus.control.sync() {
            self.carried += self.cpu.request_interrupt(&mut self.bus);
        }
        (self.cycles - start).get()
    }

    /// Run batches until `stop` is set. The flag is checked between
    /// batches.
    pub fn run(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            self.run_batch();
        }
        log::debug!("stopped after {} cycles", self.cycles.get());
    }

    /// Run batches until at least one video frame of time has passed.
    ///
    /// Returns the cycles run, which overshoot the frame by at most one
    /// batch.
    pub fn run_frame(&mut self) -> u64 {
        let target = MasterClock::HANDHELD.ticks_per_frame().get();
        let mut elapsed = 0;
        while elapsed < target {
            elapsed += self.run_batch();
        }
        elapsed
    }

    /// Step the CPU until the horizon, or until something needs the
    /// scheduler's attention.
    fn run_cpu(&mut self) -> i64 {
        let horizon = i64::from(self.horizon());
        let mut ticks = i64::from(mem::take(&mut self.carried));
        loop {
            ticks += i64::from(self.cpu.step(&mut self.bus));
            if ticks >= horizon
                || self.bus.control.sync()
                || self.bus.dma.is_pending()
                || self.bus.control.power_down() != PowerDown::None
            {
                return ticks;
            }
        }
    }

    /// Stopped: only the video unit keeps running.
    fn run_stopped(&mut self) {
        let ticks = self.bus.video.next_event().max(1);
        let signals = self.bus.video.sync(ticks as u32);
        self.raise(signals);
        self.cycles.advance(i64::from(ticks));
    }

    /// Nearest horizon across the timed peripherals.
    fn horizon(&self) -> i32 {
        self.bus
            .timers
            .next_event()
            .min(self.bus.audio.next_event())
            .min(self.bus.video.next_event())
    }

    /// Hand elapsed time to the timed peripherals, latching the interrupts
    /// they raise. Returns what they raised so the caller can route DMA
    /// triggers.
    fn advance(&mut self, ticks: i64) -> Signals {
        let Some(elapsed) = Ticks::elapsed(ticks) else {
            return Signals::NONE;
        };
        let signals = self.bus.timers.sync(elapsed)
            | self.bus.audio.sync(elapsed)
            | self.bus.video.sync(elapsed);
        if signals.interrupts != 0 {
            self.bus.control.request(signals.interrupts);
        }
        self.cycles.advance(ticks);
        signals
    }

    fn sync(&mut self, ticks: i64) {
        let signals = self.advance(ticks);
        trigger(self.bus.dma.as_mut(), signals);
    }

    fn raise(&mut self, signals: Signals) {
        if signals.interrupts != 0 {
            self.bus.control.request(signals.interrupts);
        }
        trigger(self.bus.dma.as_mut(), signals);
    }

    /// Run active DMA channels in slices no longer than the horizon,
    /// syncing the peripherals between slices.
    ///
    /// The controller is lifted off the bus while it runs; its own
    /// registers read as open bus during a transfer.
    fn drain_dma(&mut self) {
        if !self.bus.dma.is_pending() {
            return;
        }
        let mut dma = mem::replace(&mut self.bus.dma, Box::new(NoDma));
        let mut ticks = 0i64;
        let mut next = self.horizon();
        while dma.is_pending() {
            let (spent, signals) = dma.transfer(&mut self.bus, next);
            if signals.interrupts != 0 {
                self.bus.control.request(signals.interrupts);
            }
            if spent == 0 {
                log::warn!("dma: active channel made no progress");
                break;
            }
            ticks += i64::from(spent);
            if ticks >= i64::from(next) {
                let raised = self.advance(ticks);
                trigger(dma.as_mut(), raised);
                ticks = 0;
                next = self.horizon();
            }
        }
        if ticks > 0 {
            let raised = self.advance(ticks);
            trigger(dma.as_mut(), raised);
        }
        log::trace!("dma: drained");
        self.bus.dma = dma;
    }

    fn poll_keypad(&mut self) {
        let stopped = self.bus.control.power_down() == PowerDown::Stop;
        if self.bus.keypad.sync(stopped) {
            self.bus.control.request(Interrupt::Keypad.bit());
        }
    }

    /// Crystal ticks handed to the peripherals since reset.
    #[must_use]
    pub const fn cycles(&self) -> Ticks {
        self.cycles
    }

    /// Cartridge header of the loaded ROM.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Handle for the host thread to press buttons.
    #[must_use]
    pub fn keypad_handle(&self) -> KeypadHandle {
        self.bus.keypad.handle()
    }

    #[must_use]
    pub const fn cpu(&self) -> &Arm7tdmi {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Arm7tdmi {
        &mut self.cpu
    }

    #[must_use]
    pub const fn bus(&self) -> &GbaBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut GbaBus {
        &mut self.bus
    }
}

fn trigger(dma: &mut dyn Dma, signals: Signals) {
    for t in signals.triggers() {
        dma.trigger(t);
    }
}

fn parse_address(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

impl Observable for Gba {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest)
                .and_then(|address| self.bus.peek(address))
                .map(Value::U8)
        } else {
            let control = &self.bus.control;
            match path {
                "cycles" => Some(self.cycles.get().into()),
                "horizon" => Some(self.horizon().into()),
                "power_down" => Some(control.power_down().name().into()),
                "ie" => Some(control.enabled().into()),
                "if" => Some(control.requested().into()),
                "ime" => Some(control.master_enabled().into()),
                "waitcnt" => Some(control.waitcnt().into()),
                "keyinput" => Some(self.bus.keypad.keyinput().into()),
                "cartridge.title" => Some(self.header.title.clone().into()),
                "cartridge.code" => Some(self.header.game_code.clone().into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<arm7tdmi_paths>",
            "memory.<address>",
            "cycles",
            "horizon",
            "power_down",
            "ie",
            "if",
            "ime",
            "waitcnt",
            "keyinput",
            "cartridge.title",
            "cartridge.code",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{HALTCNT, IE, IME};
    use crate::device::DmaTrigger;
    use crate::keypad::{Button, KEYCNT};
    use arm7tdmi::Mode;
    use std::cell::RefCell;
    use std::rc::Rc;

    const B_SELF: u32 = 0xEAFF_FFFE;

    /// Timed peripheral with a fixed horizon that logs every sync.
    struct Probe {
        horizon: i32,
        log: Rc<RefCell<Vec<u32>>>,
        /// Raised on the first sync only.
        fire: Signals,
    }

    impl Probe {
        fn new(horizon: i32) -> (Self, Rc<RefCell<Vec<u32>>>) {
            let log = Rc::new(RefCell::new(Vec::new()));
            let probe = Self {
                horizon,
                log: Rc::clone(&log),
                fire: Signals::NONE,
            };
            (probe, log)
        }
    }

    impl Io for Probe {}

    impl Device for Probe {
        fn next_event(&self) -> i32 {
            self.horizon
        }

        fn sync(&mut self, ticks: u32) -> Signals {
            self.log.borrow_mut().push(ticks);
            mem::take(&mut self.fire)
        }
    }

    impl Video for Probe {}

    /// One channel that copies for `length` cycles once triggered.
    struct BurstDma {
        length: u32,
        remaining: u32,
        first_word: Rc<RefCell<Option<u32>>>,
    }

    impl Io for BurstDma {}

    impl Dma for BurstDma {
        fn is_pending(&self) -> bool {
            self.remaining > 0
        }

        fn trigger(&mut self, trigger: DmaTrigger) {
            if trigger == DmaTrigger::VBlank {
                self.remaining = self.length;
            }
        }

        fn transfer(&mut self, bus: &mut dyn Bus, limit: i32) -> (u32, Signals) {
            let word = bus.read(0x0800_0000, AccessWidth::Word).data;
            self.first_word.borrow_mut().get_or_insert(word);
            let spent = self.remaining.min(limit.max(1) as u32);
            self.remaining -= spent;
            let signals = if self.remaining == 0 {
                Signals::NONE.with_interrupt(Interrupt::Dma0)
            } else {
                Signals::NONE
            };
            (spent, signals)
        }
    }

    fn rom(program: &[u32]) -> Vec<u8> {
        program.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn direct(program: &[u32]) -> Gba {
        let config = GbaConfig {
            bios: Vec::new(),
            rom: rom(program),
            boot: BootMode::Direct,
        };
        Gba::new(&config).unwrap()
    }

    fn write16(gba: &mut Gba, address: u32, value: u16) {
        gba.bus_mut().write(address, u32::from(value), AccessWidth::Halfword);
    }

    #[test]
    fn construction_errors_propagate() {
        let config = GbaConfig {
            bios: Vec::new(),
            rom: Vec::new(),
            boot: BootMode::Direct,
        };
        assert!(matches!(Gba::new(&config), Err(GbaError::EmptyRom)));
        let config = GbaConfig {
            bios: Vec::new(),
            rom: vec![0; 4],
            boot: BootMode::Bios,
        };
        assert!(matches!(Gba::new(&config), Err(GbaError::BiosSize(0))));
    }

    #[test]
    fn direct_boot_state() {
        let gba = direct(&[B_SELF]);
        assert_eq!(gba.cpu().pc(), 0x0800_0000);
        assert_eq!(gba.cpu().mode(), Mode::System);
        assert!(gba.bus().control.post_boot());
        assert_eq!(gba.cycles(), Ticks::ZERO);
    }

    #[test]
    fn batches_run_to_the_horizon() {
        let (timers, log) = Probe::new(100);
        let mut gba = direct(&[B_SELF]).with_timers(Box::new(timers));

        let mut last = gba.cycles();
        for _ in 0..20 {
            let elapsed = gba.run_batch();
            assert!(elapsed >= 100);
            assert!(gba.cycles() > last);
            last = gba.cycles();
        }
        let log = log.borrow();
        assert_eq!(log.len(), 20);
        assert!(log.iter().all(|&ticks| (100..200).contains(&ticks)));
        assert_eq!(log.iter().map(|&t| u64::from(t)).sum::<u64>(), gba.cycles().get());
    }

    #[test]
    fn halt_skips_to_horizon_and_wakes() {
        // MOV r0, #0x04000000; STRB r0, [r0, #0x301]; B .
        let (timers, log) = Probe::new(100);
        let mut gba = direct(&[0xE3A0_0301, 0xE5C0_0301, B_SELF]).with_timers(Box::new(timers));
        write16(&mut gba, IE, Interrupt::VBlank.bit());

        gba.run_batch();
        assert_eq!(gba.bus().control.power_down(), PowerDown::Halt);
        let pc = gba.cpu().pc();

        assert_eq!(gba.run_batch(), 100);
        assert_eq!(gba.cpu().pc(), pc);
        assert_eq!(log.borrow().last(), Some(&100));

        gba.bus_mut().control.request(Interrupt::VBlank.bit());
        gba.run_batch();
        assert_eq!(gba.bus().control.power_down(), PowerDown::None);
        // IME is clear: woken, but no interrupt taken.
        assert_eq!(gba.cpu().mode(), Mode::System);
    }

    #[test]
    fn due_horizon_still_advances_while_halted() {
        let (timers, log) = Probe::new(-5);
        let mut gba = direct(&[B_SELF]).with_timers(Box::new(timers));
        gba.run_batch();
        gba.bus_mut().write(HALTCNT, 0, AccessWidth::Byte);
        log.borrow_mut().clear();
        assert_eq!(gba.run_batch(), 1);
        assert_eq!(log.borrow().as_slice(), &[1]);
    }

    #[test]
    fn pending_interrupt_is_taken_after_the_batch() {
        let mut gba = direct(&[B_SELF]);
        write16(&mut gba, IE, Interrupt::Timer0.bit());
        gba.bus_mut().write(IME, 1, AccessWidth::Byte);
        gba.bus_mut().control.request(Interrupt::Timer0.bit());

        gba.run_batch();
        assert_eq!(gba.cpu().mode(), Mode::Irq);
        assert_eq!(gba.cpu().pc(), 0x18);
    }

    #[test]
    fn interrupt_entry_is_charged_to_the_next_batch() {
        let (timers, log) = Probe::new(10_000);
        let mut gba = direct(&[B_SELF]).with_timers(Box::new(timers));
        write16(&mut gba, IE, Interrupt::Timer0.bit());
        gba.bus_mut().write(IME, 1, AccessWidth::Byte);
        gba.bus_mut().control.request(Interrupt::Timer0.bit());

        gba.run_batch();
        let before = gba.cpu().cycles();
        let synced: u64 = log.borrow().iter().map(|&t| u64::from(t)).sum();
        // The first batch ended after one instruction; the entry came after.
        assert!(synced < before);

        // Acknowledge so the handler is not re-entered, then keep running.
        gba.bus_mut().write(0x0400_0202, 0xFFFF, AccessWidth::Halfword);
        gba.run_batch();
        let synced: u64 = log.borrow().iter().map(|&t| u64::from(t)).sum();
        assert_eq!(synced, gba.cpu().cycles());
    }

    #[test]
    fn stop_runs_only_video_until_keypad_wakes() {
        let (timers, timer_log) = Probe::new(100);
        let (video, video_log) = Probe::new(300);
        let mut gba = direct(&[B_SELF])
            .with_timers(Box::new(timers))
            .with_video(Box::new(video));
        write16(&mut gba, IE, Interrupt::Keypad.bit());
        write16(&mut gba, KEYCNT, Button::A.bit());
        gba.bus_mut().write(HALTCNT, 0x80, AccessWidth::Byte);

        assert_eq!(gba.run_batch(), 300);
        assert_eq!(gba.run_batch(), 300);
        assert_eq!(video_log.borrow().as_slice(), &[300, 300]);
        assert!(timer_log.borrow().is_empty());

        gba.keypad_handle().press(Button::A);
        gba.run_batch();
        assert_eq!(gba.bus().control.power_down(), PowerDown::None);
        assert_eq!(gba.bus().control.requested() & Interrupt::Keypad.bit(), 0);
        assert_eq!(timer_log.borrow().len(), 1);
    }

    #[test]
    fn dma_drains_in_horizon_slices() {
        let (timers, log) = Probe::new(100);
        let (mut video, _) = Probe::new(1000);
        video.fire = Signals::NONE.with_dma(DmaTrigger::VBlank);
        let first_word = Rc::new(RefCell::new(None));
        let dma = BurstDma {
            length: 250,
            remaining: 0,
            first_word: Rc::clone(&first_word),
        };
        let mut gba = direct(&[B_SELF])
            .with_timers(Box::new(timers))
            .with_video(Box::new(video))
            .with_dma(Box::new(dma));

        gba.run_batch();
        assert_eq!(&log.borrow()[1..], &[100, 100, 50]);
        assert_eq!(*first_word.borrow(), Some(B_SELF));
        assert_ne!(gba.bus().control.requested() & Interrupt::Dma0.bit(), 0);
        assert!(!gba.bus().dma.is_pending());
    }

    #[test]
    fn run_stops_on_flag() {
        let stop = AtomicBool::new(true);
        let mut gba = direct(&[B_SELF]);
        gba.run(&stop);
        assert_eq!(gba.cycles(), Ticks::ZERO);
    }

    #[test]
    fn run_frame_covers_a_frame() {
        let mut gba = direct(&[B_SELF]);
        let elapsed = gba.run_frame();
        assert!(elapsed >= 280_896);
        assert!(elapsed < 280_896 + 1232 + 100);
        assert_eq!(gba.cycles().get(), elapsed);
    }

    #[test]
    fn reset_restarts_time() {
        let mut gba = direct(&[B_SELF]);
        gba.run_batch();
        gba.reset();
        assert_eq!(gba.cycles(), Ticks::ZERO);
        assert_eq!(gba.cpu().pc(), 0x0800_0000);
    }

    #[test]
    fn queries() {
        let gba = direct(&[B_SELF]);
        assert_eq!(gba.query("cpu.pc"), Some(Value::U32(0x0800_0000)));
        assert_eq!(gba.query("memory.0x08000003"), Some(Value::U8(0xEA)));
        assert_eq!(gba.query("memory.0x04000000"), None);
        assert_eq!(gba.query("power_down"), Some(Value::from("none")));
        assert_eq!(gba.query("horizon"), Some(Value::I32(1232)));
        assert_eq!(gba.query("keyinput"), Some(Value::U16(0x03FF)));
        for path in gba.query_paths().iter().filter(|p| !p.contains('<')) {
            assert!(gba.query(path).is_some(), "{path}");
        }
    }
}
