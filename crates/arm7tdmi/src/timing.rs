//! Instruction cost model.
//!
//! Costs are computed from the access timings the bus reported, separately
//! from the work the instruction does. `fetch` is always the timing of the
//! opcode fetch made at the start of the step.

use emu_core::AccessTiming;

/// Internal cycle for a register-specified shift amount.
pub const REGISTER_SHIFT_CYCLES: u32 = 1;
/// Internal cycle a load spends writing the register file.
pub const LOAD_INTERNAL_CYCLES: u32 = 1;
/// Coprocessor 14 register write (ignored).
pub const CP14_WRITE_CYCLES: u32 = 2;
/// Coprocessor 14 register read (returns the prefetch word).
pub const CP14_READ_CYCLES: u32 = 3;

/// Multiplier array cycles for a multiplier operand: 1-4.
///
/// Each leading byte of zeros (and, for signed multiplies, of ones) lets
/// the array terminate one cycle early. At most three bytes count.
#[must_use]
pub const fn multiplier_cycles(rs: u32, signed: bool) -> u32 {
    let zeros = leading_bytes(rs.leading_zeros());
    if !signed {
        return 4 - zeros;
    }
    let ones = leading_bytes(rs.leading_ones());
    let cheapest = if zeros > ones { zeros } else { ones };
    4 - cheapest
}

const fn leading_bytes(bits: u32) -> u32 {
    let bytes = bits / 8;
    if bytes > 3 { 3 } else { bytes }
}

/// MUL/MLA: `S + m (+1 for accumulate)`.
#[must_use]
pub const fn multiply(fetch: AccessTiming, rs: u32, accumulate: bool) -> u32 {
    fetch.seq + multiplier_cycles(rs, true) + accumulate as u32
}

/// UMULL/SMULL/UMLAL/SMLAL: `S + m + 1 (+1 for accumulate)`.
#[must_use]
pub const fn multiply_long(fetch: AccessTiming, rs: u32, signed: bool, accumulate: bool) -> u32 {
    fetch.seq + multiplier_cycles(rs, signed) + accumulate as u32 + 1
}

/// Single load: `S + N + 1`.
#[must_use]
pub const fn load(fetch: AccessTiming, data: AccessTiming) -> u32 {
    fetch.seq + data.nonseq + LOAD_INTERNAL_CYCLES
}

/// Single store: `N + N`.
#[must_use]
pub const fn store(fetch: AccessTiming, data: AccessTiming) -> u32 {
    fetch.nonseq + data.nonseq
}

/// SWP: `S + N + N + 1`.
#[must_use]
pub const fn swap(fetch: AccessTiming, read: AccessTiming, write: AccessTiming) -> u32 {
    fetch.seq + read.nonseq + write.nonseq + LOAD_INTERNAL_CYCLES
}

/// Fixed part of a block transfer.
#[must_use]
pub const fn block_start(fetch: AccessTiming, load: bool) -> u32 {
    if load {
        fetch.seq + LOAD_INTERNAL_CYCLES
    } else {
        fetch.nonseq
    }
}

/// Per-word part of a block transfer.
#[must_use]
pub const fn block_word(data: AccessTiming, first: bool) -> u32 {
    (if first { data.nonseq } else { data.seq }) + data.seq
}

/// Pipeline refill after a branch: `N(target) + S(target + width)`.
#[must_use]
pub const fn refill(first: AccessTiming, second: AccessTiming) -> u32 {
    first.nonseq + second.seq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_counts_significant_bytes() {
        assert_eq!(multiplier_cycles(0, false), 1);
        assert_eq!(multiplier_cycles(0xFF, false), 1);
        assert_eq!(multiplier_cycles(0x100, false), 2);
        assert_eq!(multiplier_cycles(0xFFFF, false), 2);
        assert_eq!(multiplier_cycles(0x0001_0000, false), 3);
        assert_eq!(multiplier_cycles(0x0100_0000, false), 4);
        assert_eq!(multiplier_cycles(0xFFFF_FFFF, false), 4);
    }

    #[test]
    fn signed_multiplier_also_counts_leading_ones() {
        assert_eq!(multiplier_cycles(0xFFFF_FFFF, true), 1);
        assert_eq!(multiplier_cycles(0xFFFF_FF00, true), 1);
        assert_eq!(multiplier_cycles(0xFFFF_0000, true), 2);
        assert_eq!(multiplier_cycles(0x8000_0000, true), 4);
        assert_eq!(multiplier_cycles(0x10, true), 1);
    }

    #[test]
    fn transfer_costs() {
        let fetch = AccessTiming::new(3, 2);
        let data = AccessTiming::new(5, 4);
        assert_eq!(load(fetch, data), 2 + 5 + 1);
        assert_eq!(store(fetch, data), 3 + 5);
        assert_eq!(swap(fetch, data, data), 2 + 5 + 5 + 1);
        assert_eq!(block_start(fetch, true), 3);
        assert_eq!(block_start(fetch, false), 3);
        assert_eq!(block_word(data, true), 9);
        assert_eq!(block_word(data, false), 8);
    }

    #[test]
    fn coprocessor_constants() {
        assert_eq!(CP14_WRITE_CYCLES, 2);
        assert_eq!(CP14_READ_CYCLES, 3);
    }
}
