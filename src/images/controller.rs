use std::ops::RangeInclusive;

/// Number of rows prefetched per window unless configured otherwise.
pub const DEFAULT_PREFETCH_RANGE: usize = 10;

/// Decides which rows of the displayed item list need their images fetched.
///
/// Images are fetched in windows of `range` rows. The last row of the
/// current window is the trigger: selecting it (or anything past it) moves
/// the window forward. Row 0 is shown on display and never prefetched.
///
/// Selecting a row behind the trigger is a no-op, including jumps back to
/// rows before the current window; those rows keep whatever is cached.
///
/// Pure state machine, no I/O.
#[derive(Debug, Clone)]
pub struct PrefetchController {
    range: usize,
    range_start: usize,
    range_end: usize,
    trigger: usize,
    max_row: usize,
    pending: bool,
}

impl PrefetchController {
    /// Create a controller with a window of `range` rows (at least one).
    pub fn new(range: usize) -> Self {
        let range = range.max(1);
        Self {
            range,
            range_start: 1,
            range_end: range - 1,
            trigger: range - 1,
            max_row: 0,
            pending: false,
        }
    }

    /// Reset for a freshly displayed list of `num_rows` items.
    ///
    /// Always leaves a prefetch pending for the first window.
    pub fn set_num_rows(&mut self, num_rows: usize) {
        self.max_row = num_rows.saturating_sub(1);
        self.range_start = 1;
        self.range_end = (self.range - 1).min(self.max_row);
        self.trigger = self.range_end;
        self.pending = true;
    }

    /// Record that the selection moved to `row`.
    pub fn row_selected(&mut self, row: usize) {
        if row < self.trigger {
            return;
        }

        if self.range_end == self.max_row {
            self.pending = false;
            return;
        }

        self.range_start = self.range_end + 1;
        self.range_end = self.range_end.saturating_add(self.range).min(self.max_row);
        self.trigger = self.range_end;
        self.pending = true;
    }

    /// True when a window is waiting to be fetched.
    pub fn prefetch_needed(&self) -> bool {
        self.pending
    }

    /// Take the rows of the current window and clear the pending flag.
    ///
    /// The range is empty when the list has one row or none.
    pub fn prefetch_list(&mut self) -> RangeInclusive<usize> {
        self.pending = false;
        self.range_start..=self.range_end
    }

    pub fn range(&self) -> usize {
        self.range
    }

    pub fn trigger(&self) -> usize {
        self.trigger
    }
}

impl Default for PrefetchController {
    fn default() -> Self {
        Self::new(DEFAULT_PREFETCH_RANGE)
    }
}
