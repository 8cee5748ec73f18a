//! [`SlotManager`]: the dense, SIMD-aligned structure-of-arrays slot allocator.

use crate::constants::{DEFAULT_PACKED_LANES, GROWTH_DENOMINATOR, GROWTH_NUMERATOR, round_up_lanes};
use crate::slots::column::Column;
use crate::slots::compaction::find_descending_run;
use crate::slots::error::SlotError;
use crate::slots::rebase::{ManagerTag, RebaseListener};

/// Construction parameters for a [`SlotManager`].
#[derive(Debug, Clone)]
pub struct SlotManagerConfig {
    /// Per-column element sizes, in bytes. Must be non-empty.
    pub columns: Vec<usize>,
    /// Hint capacity (`N0`); rounded up to a multiple of `packed_lanes`.
    pub hint_capacity: usize,
    /// Hard upper bound on capacity (`H0`); rounded up the same way.
    pub hard_limit: usize,
    /// Number of stranded free slots tolerated before a compaction runs.
    pub cleanup_threshold: usize,
    /// SIMD packed-lane count `W`; capacity is always a multiple of this.
    /// `0` is treated as [`DEFAULT_PACKED_LANES`].
    pub packed_lanes: usize,
    /// Opaque identity passed to the rebase listener.
    pub tag: ManagerTag,
}

/// A dense, SIMD-aligned slot allocator backing structure-of-arrays scene
/// data. See the crate-level docs and spec §3.1/§4.1 for the full contract.
pub struct SlotManager {
    elem_sizes: Vec<usize>,
    columns: Vec<Column>,
    packed_lanes: usize,
    capacity: usize,
    hard_limit: usize,
    used: usize,
    free: Vec<usize>,
    cleanup_threshold: usize,
    listener: Option<Box<dyn RebaseListener>>,
    tag: ManagerTag,
}

impl SlotManager {
    /// Build a new manager. `listener` may be omitted, in which case the
    /// manager can never grow past its initial (rounded) capacity and
    /// compaction is disabled (spec §4.1: "without a listener the manager
    /// cannot announce moves, so it must never move").
    pub fn new(config: SlotManagerConfig, listener: Option<Box<dyn RebaseListener>>) -> Self {
        assert!(
            !config.columns.is_empty(),
            "SlotManager requires a non-empty column schema"
        );
        assert!(
            config.columns.iter().all(|&e| e > 0),
            "column element sizes must be non-zero"
        );

        let lanes = if config.packed_lanes == 0 {
            DEFAULT_PACKED_LANES
        } else {
            config.packed_lanes
        };

        let capacity = round_up_lanes(config.hint_capacity.max(2), lanes);
        let mut hard_limit = round_up_lanes(config.hard_limit, lanes).max(capacity);
        let mut cleanup_threshold = config.cleanup_threshold;

        if listener.is_none() {
            // No listener to announce a move to: pin the hard limit to the
            // initial capacity and disable compaction entirely.
            hard_limit = capacity;
            cleanup_threshold = usize::MAX;
        }

        let columns = config
            .columns
            .iter()
            .map(|&elem_size| Column::new(capacity, elem_size))
            .collect();

        log::debug!(
            "slot manager {:?} initialised: capacity={capacity} hard_limit={hard_limit} lanes={lanes}",
            config.tag
        );

        Self {
            elem_sizes: config.columns,
            columns,
            packed_lanes: lanes,
            capacity,
            hard_limit,
            used: 0,
            free: Vec::new(),
            cleanup_threshold,
            listener,
            tag: config.tag,
        }
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocate a slot, preferring to reuse a freed one over extending the
    /// dense prefix (spec §4.1.1).
    pub fn allocate(&mut self) -> Result<usize, SlotError> {
        if let Some(slot) = self.free.pop() {
            return Ok(slot);
        }

        if self.used >= self.capacity {
            self.grow()?;
        }

        let slot = self.used;
        self.used += 1;
        Ok(slot)
    }

    fn grow(&mut self) -> Result<(), SlotError> {
        if self.capacity >= self.hard_limit {
            return Err(SlotError::CapacityExhausted {
                max_memory: self.capacity,
                hard_limit: self.hard_limit,
            });
        }

        // capacity/denom*(numerator-denom) + capacity, not capacity*numerator/denom,
        // to match the overflow-avoidance of the growth factor's original "N + N/2" form.
        let growth_step = self.capacity / GROWTH_DENOMINATOR * (GROWTH_NUMERATOR - GROWTH_DENOMINATOR);
        let proposed = round_up_lanes(self.capacity + growth_step, self.packed_lanes);
        let new_capacity = proposed.min(self.hard_limit);

        log::debug!(
            "slot manager {:?} growing {} -> {new_capacity}",
            self.tag,
            self.capacity
        );

        let diffs = self.listener.as_mut().map(|listener| {
            let bases: Vec<*const u8> = self.columns.iter().map(Column::base_ptr).collect();
            listener.build_diff_list(self.tag, &bases)
        });

        for column in &mut self.columns {
            column.grow_to(new_capacity);
        }
        self.capacity = new_capacity;

        if let (Some(listener), Some(diffs)) = (self.listener.as_mut(), diffs) {
            let bases: Vec<*const u8> = self.columns.iter().map(Column::base_ptr).collect();
            listener.apply_rebase(self.tag, &bases, &diffs);
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Deallocation
    // ------------------------------------------------------------------

    /// Free the slot addressed by `lane_index` lanes past the element that
    /// `column0_ptr` points to, within column 0 (spec §4.1.2). `column0_ptr`
    /// must point at an element of column 0 owned by this manager, and
    /// `lane_index` must be `< packed_lanes`.
    pub fn free(&mut self, column0_ptr: *const u8, lane_index: usize) {
        debug_assert!(
            lane_index < self.packed_lanes,
            "lane_index out of range for this manager's packed lane width"
        );

        let base = self.columns[0].base_ptr() as usize;
        let ptr = column0_ptr as usize;
        let elem0 = self.elem_sizes[0];

        debug_assert!(
            ptr >= base,
            "pointer does not belong to this manager's column 0"
        );
        let byte_offset = ptr - base;
        debug_assert!(
            byte_offset % elem0 == 0,
            "pointer is not aligned to column 0's element stride"
        );

        let slot = byte_offset / elem0 + lane_index;
        debug_assert!(
            slot < self.capacity,
            "slot {slot} is out of range for this manager (capacity {})",
            self.capacity
        );

        if slot + 1 == self.used {
            // Trailing-free fast path: the common LIFO case needs no bookkeeping.
            self.used -= 1;
            return;
        }

        self.free.push(slot);
        if self.free.len() > self.cleanup_threshold {
            self.compact();
        }
    }

    // ------------------------------------------------------------------
    // Compaction
    // ------------------------------------------------------------------

    /// Eliminate holes in `[0, used)` and notify the listener so it can
    /// remap any external indices (spec §4.1.3).
    fn compact(&mut self) {
        if self.free.is_empty() {
            return;
        }

        self.free.sort_unstable_by(|a, b| b.cmp(a));

        let mut used = self.used;
        let mut i = 0;
        while i < self.free.len() {
            let run = find_descending_run(&self.free, i);
            let highest = self.free[i];
            let dest_start = highest - run + 1;
            let move_count = used - highest - 1;

            if move_count > 0 {
                for (column, &elem_size) in self.columns.iter_mut().zip(self.elem_sizes.iter()) {
                    // SAFETY: both ranges lie within the column's current
                    // allocation: src ends at `used * elem_size <= capacity
                    // * elem_size`, dst starts at an index `<= src start`.
                    unsafe {
                        let base = column.base_ptr_mut();
                        let src = base.add((highest + 1) * elem_size);
                        let dst = base.add(dest_start * elem_size);
                        std::ptr::copy(src, dst, move_count * elem_size);
                    }
                }
            }

            if let Some(listener) = self.listener.as_mut() {
                let bases: Vec<*const u8> = self.columns.iter().map(Column::base_ptr).collect();
                listener.perform_cleanup(self.tag, &bases, &self.elem_sizes, highest, run);
            }

            used -= run;
            i += run;
        }

        self.used = used;
        self.free.clear();
    }

    // ------------------------------------------------------------------
    // Introspection (spec §4.1.4)
    // ------------------------------------------------------------------

    fn total_elem_size(&self) -> usize {
        self.elem_sizes.iter().sum()
    }

    pub fn free_memory(&self) -> usize {
        (self.capacity - self.used + self.free.len()) * self.total_elem_size()
    }

    pub fn used_memory(&self) -> usize {
        (self.used - self.free.len()) * self.total_elem_size()
    }

    pub fn wasted_memory(&self) -> usize {
        self.free.len() * self.total_elem_size()
    }

    pub fn total_memory(&self) -> usize {
        self.capacity * self.total_elem_size()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn hard_limit(&self) -> usize {
        self.hard_limit
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn packed_lanes(&self) -> usize {
        self.packed_lanes
    }

    /// Base pointer of column `index`. Panics if `index` is out of range.
    #[inline]
    pub fn column_ptr(&self, index: usize) -> *const u8 {
        self.columns[index].base_ptr()
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::rebase::DiffList;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn cfg(columns: Vec<usize>, hint: usize, hard_limit: usize, cleanup: usize) -> SlotManagerConfig {
        SlotManagerConfig {
            columns,
            hint_capacity: hint,
            hard_limit,
            cleanup_threshold: cleanup,
            packed_lanes: 4,
            tag: ManagerTag::new(0, 0),
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        cleanups: Rc<RefCell<Vec<(usize, usize)>>>,
        diff_calls: Rc<RefCell<usize>>,
        rebase_calls: Rc<RefCell<usize>>,
    }

    impl RebaseListener for RecordingListener {
        fn build_diff_list(&mut self, _tag: ManagerTag, columns: &[*const u8]) -> DiffList {
            *self.diff_calls.borrow_mut() += 1;
            DiffList {
                old_bases: columns.to_vec(),
            }
        }

        fn apply_rebase(&mut self, _tag: ManagerTag, _columns: &[*const u8], _diffs: &DiffList) {
            *self.rebase_calls.borrow_mut() += 1;
        }

        fn perform_cleanup(
            &mut self,
            _tag: ManagerTag,
            _columns: &[*const u8],
            _element_sizes: &[usize],
            start_slot: usize,
            run_length: usize,
        ) {
            self.cleanups.borrow_mut().push((start_slot, run_length));
        }
    }

    #[test]
    fn scenario_1_no_listener_exhausts_at_hard_limit() {
        let _ = env_logger::try_init();
        let mut mgr = SlotManager::new(cfg(vec![64, 32], 3, 32, usize::MAX), None);
        assert_eq!(mgr.capacity(), 4);
        assert_eq!(mgr.hard_limit(), 4);

        for expected in 0..4 {
            assert_eq!(mgr.allocate().unwrap(), expected);
        }

        assert_eq!(
            mgr.allocate(),
            Err(SlotError::CapacityExhausted {
                max_memory: 4,
                hard_limit: 4
            })
        );
    }

    #[test]
    fn scenario_2_compaction_on_lifo_break() {
        let cleanups = Rc::new(RefCell::new(Vec::new()));
        let listener = RecordingListener {
            cleanups: cleanups.clone(),
            ..Default::default()
        };
        let mut mgr = SlotManager::new(cfg(vec![64, 32], 4, 16, 2), Some(Box::new(listener)));

        for _ in 0..4 {
            mgr.allocate().unwrap();
        }

        let col0 = mgr.column_ptr(0);
        let elem0 = mgr.elem_sizes[0];
        let ptr_for = |slot: usize| unsafe { col0.add(slot * elem0) };

        mgr.free(ptr_for(1), 0);
        mgr.free(ptr_for(2), 0);
        assert_eq!(mgr.free_count(), 2);

        mgr.free(ptr_for(0), 0);

        assert_eq!(mgr.used(), 1);
        assert_eq!(mgr.free_count(), 0);
        assert_eq!(*cleanups.borrow(), vec![(2, 3)]);
    }

    #[test]
    fn scenario_3_growth_invokes_diff_then_rebase() {
        let diff_calls = Rc::new(RefCell::new(0));
        let rebase_calls = Rc::new(RefCell::new(0));
        let listener = RecordingListener {
            diff_calls: diff_calls.clone(),
            rebase_calls: rebase_calls.clone(),
            ..Default::default()
        };
        let mut mgr = SlotManager::new(cfg(vec![64, 32], 4, 16, 2), Some(Box::new(listener)));

        for _ in 0..4 {
            mgr.allocate().unwrap();
        }
        assert_eq!(mgr.capacity(), 4);

        let fifth = mgr.allocate().unwrap();
        assert_eq!(fifth, 4);
        assert_eq!(mgr.capacity(), 8);
        assert_eq!(*diff_calls.borrow(), 1);
        assert_eq!(*rebase_calls.borrow(), 1);
    }

    #[test]
    fn scenario_6_multiple_compaction_runs() {
        let cleanups = Rc::new(RefCell::new(Vec::new()));
        let listener = RecordingListener {
            cleanups: cleanups.clone(),
            ..Default::default()
        };
        let mut mgr = SlotManager::new(cfg(vec![16], 9, 32, usize::MAX), Some(Box::new(listener)));

        for _ in 0..9 {
            mgr.allocate().unwrap();
        }

        let col0 = mgr.column_ptr(0);
        let elem0 = mgr.elem_sizes[0];
        let ptr_for = |slot: usize| unsafe { col0.add(slot * elem0) };

        for &slot in &[1usize, 3, 4, 7] {
            mgr.free(ptr_for(slot), 0);
        }
        // Force a compaction manually to exercise the exact run partition in
        // the spec's literal scenario (the production path triggers this via
        // cleanup_threshold; here we want the scenario's specific free set).
        mgr.compact();

        assert_eq!(*cleanups.borrow(), vec![(7, 1), (4, 2), (1, 1)]);
        assert_eq!(mgr.used(), 5);
    }

    #[test]
    fn lifo_sequence_never_grows_or_frees_into_freelist() {
        let mut mgr = SlotManager::new(cfg(vec![8], 4, 4, 0), None);
        for _ in 0..100 {
            let slot = mgr.allocate().unwrap();
            let col0 = mgr.column_ptr(0);
            let ptr = unsafe { col0.add(slot * 8) };
            mgr.free(ptr, 0);
            assert_eq!(mgr.free_count(), 0);
        }
    }

    #[test]
    fn zero_tail_after_growth() {
        let mut mgr = SlotManager::new(cfg(vec![4], 4, 16, 0), Some(Box::new(RecordingListener::default())));
        for _ in 0..5 {
            mgr.allocate().unwrap();
        }
        let col0 = mgr.column_ptr(0);
        let tail = unsafe { std::slice::from_raw_parts(col0.add(5 * 4), (mgr.capacity() - 5) * 4) };
        assert!(tail.iter().all(|&b| b == 0));
    }
}
