use crate::config::PointerPolicy;

/// Fixed-length row of cells, each holding `cell_bits` wrapping bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<u32>,
    mask: u32,
}

impl Tape {
    /// Zero-filled tape. `cell_bits` must be in `1..=32`.
    ///
    /// # Panics
    ///
    /// Panics if `length` is 0; [`MachineConfig::validate`](crate::MachineConfig::validate)
    /// rejects such configs before a machine builds its tape.
    pub fn new(length: usize, cell_bits: u32) -> Self {
        assert!(length > 0, "tape needs at least one cell");
        let mask = if cell_bits >= 32 { u32::MAX } else { (1u32 << cell_bits) - 1 };
        Self { cells: vec![0; length], mask }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Largest value a cell can hold.
    pub fn max_value(&self) -> u32 {
        self.mask
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    /// Panics if `index` is off the tape; the machine only passes in-range pointers.
    pub fn get(&self, index: usize) -> u32 {
        self.cells[index]
    }

    /// Store `value` truncated to the cell width.
    pub fn set(&mut self, index: usize, value: u32) {
        self.cells[index] = value & self.mask;
    }

    pub fn increment(&mut self, index: usize) -> u32 {
        let after = self.cells[index].wrapping_add(1) & self.mask;
        self.cells[index] = after;
        after
    }

    pub fn decrement(&mut self, index: usize) -> u32 {
        let after = self.cells[index].wrapping_sub(1) & self.mask;
        self.cells[index] = after;
        after
    }

    /// Move pointer `dp` by `delta` cells under `policy`.
    ///
    /// On failure returns the pointer the move would have produced.
    pub fn shift(&self, dp: usize, delta: isize, policy: PointerPolicy) -> Result<usize, isize> {
        let len = self.cells.len() as isize;
        let target = dp as isize + delta;
        match policy {
            PointerPolicy::Wrap => Ok(target.rem_euclid(len) as usize),
            PointerPolicy::Strict if (0..len).contains(&target) => Ok(target as usize),
            PointerPolicy::Strict => Err(target),
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_zeroed() {
        let tape = Tape::new(8, 8);
        assert_eq!(tape.len(), 8);
        assert!(tape.cells().iter().all(|&c| c == 0));
    }

    #[test]
    #[should_panic(expected = "at least one cell")]
    fn zero_length_tape_is_refused() {
        Tape::new(0, 8);
    }

    #[test]
    fn decrement_below_zero_wraps_to_max() {
        let mut tape = Tape::new(1, 8);
        assert_eq!(tape.decrement(0), 255);
        let mut wide = Tape::new(1, 16);
        assert_eq!(wide.decrement(0), 65_535);
        let mut full = Tape::new(1, 32);
        assert_eq!(full.decrement(0), u32::MAX);
        assert_eq!(full.increment(0), 0);
    }

    #[test]
    fn set_truncates_to_cell_width() {
        let mut tape = Tape::new(1, 8);
        tape.set(0, 0x20AC);
        assert_eq!(tape.get(0), 0xAC);
    }

    #[test]
    fn wrap_policy_wraps_both_ends() {
        let tape = Tape::new(3, 8);
        assert_eq!(tape.shift(0, -1, PointerPolicy::Wrap), Ok(2));
        assert_eq!(tape.shift(2, 1, PointerPolicy::Wrap), Ok(0));
    }

    #[test]
    fn strict_policy_reports_attempted_pointer() {
        let tape = Tape::new(3, 8);
        assert_eq!(tape.shift(0, -1, PointerPolicy::Strict), Err(-1));
        assert_eq!(tape.shift(2, 1, PointerPolicy::Strict), Err(3));
        assert_eq!(tape.shift(1, 1, PointerPolicy::Strict), Ok(2));
    }

    proptest! {
        #[test]
        fn full_cycle_of_increments_is_identity(start in 0u32..256) {
            let mut tape = Tape::new(1, 8);
            tape.set(0, start);
            for _ in 0..256 {
                tape.increment(0);
            }
            prop_assert_eq!(tape.get(0), start);
        }

        #[test]
        fn increment_then_decrement_restores(bits in 1u32..=32, start in any::<u32>()) {
            let mut tape = Tape::new(1, bits);
            tape.set(0, start);
            let before = tape.get(0);
            tape.increment(0);
            tape.decrement(0);
            prop_assert_eq!(tape.get(0), before);
        }
    }
}
