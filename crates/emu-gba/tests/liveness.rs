//! Scheduler liveness against peripherals with arbitrary positive horizons.

use std::cell::RefCell;
use std::rc::Rc;

use emu_core::{AccessWidth, Bus};
use emu_gba::{BootMode, Device, Gba, GbaConfig, Io, Signals, control::HALTCNT};
use proptest::prelude::*;

/// Cycles through a fixed list of event spacings, logging every sync.
struct Jittery {
    spacings: Vec<i32>,
    index: usize,
    remaining: i32,
    log: Rc<RefCell<Vec<u32>>>,
}

impl Jittery {
    fn new(spacings: Vec<i32>, log: Rc<RefCell<Vec<u32>>>) -> Self {
        let remaining = spacings[0];
        Self {
            spacings,
            index: 0,
            remaining,
            log,
        }
    }
}

impl Io for Jittery {}

impl Device for Jittery {
    fn next_event(&self) -> i32 {
        self.remaining
    }

    fn sync(&mut self, ticks: u32) -> Signals {
        self.log.borrow_mut().push(ticks);
        self.remaining -= ticks as i32;
        while self.remaining <= 0 {
            self.index = (self.index + 1) % self.spacings.len();
            self.remaining += self.spacings[self.index];
        }
        Signals::NONE
    }
}

fn machine(spacings: Vec<i32>, log: &Rc<RefCell<Vec<u32>>>) -> Gba {
    let config = GbaConfig {
        bios: Vec::new(),
        rom: 0xEAFF_FFFEu32.to_le_bytes().to_vec(), // B .
        boot: BootMode::Direct,
    };
    Gba::new(&config)
        .expect("valid images")
        .with_timers(Box::new(Jittery::new(spacings, Rc::clone(log))))
}

proptest! {
    #[test]
    fn running_batches_always_move_time_forward(
        spacings in prop::collection::vec(1i32..3000, 1..8),
        batches in 1usize..40,
    ) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut gba = machine(spacings, &log);
        let mut last = gba.cycles().get();
        for _ in 0..batches {
            let ran = gba.run_batch();
            prop_assert!(ran > 0);
            prop_assert_eq!(gba.cycles().get(), last + ran);
            last = gba.cycles().get();
        }
        prop_assert!(log.borrow().iter().all(|&ticks| ticks > 0));
        prop_assert_eq!(log.borrow().iter().map(|&t| u64::from(t)).sum::<u64>(), last);
    }

    #[test]
    fn halted_batches_land_on_the_horizon(
        spacings in prop::collection::vec(1i32..3000, 1..8),
        batches in 1usize..40,
    ) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut gba = machine(spacings, &log);
        gba.run_batch();
        gba.bus_mut().write(HALTCNT, 0, AccessWidth::Byte);
        gba.run_batch();
        log.borrow_mut().clear();

        for _ in 0..batches {
            let before = gba.cycles().get();
            gba.run_batch();
            prop_assert!(gba.cycles().get() > before);
        }
        prop_assert_eq!(log.borrow().len(), batches);
        prop_assert!(log.borrow().iter().all(|&ticks| ticks > 0));
    }
}
