//! The rebase listener contract consumed by [`super::SlotManager`] (spec §6.1).

/// Identifies which manager a rebase callback is for, since one engine
/// typically owns several `SlotManager`s (one per scene-graph depth level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManagerTag {
    pub manager_type: u32,
    pub depth_level: u16,
}

impl ManagerTag {
    pub fn new(manager_type: u32, depth_level: u16) -> Self {
        Self {
            manager_type,
            depth_level,
        }
    }
}

/// Snapshot of column base pointers taken before a grow, handed back to
/// [`RebaseListener::apply_rebase`] unchanged after the reallocation so the
/// listener can translate any addresses it cached against the old bases.
#[derive(Debug, Clone)]
pub struct DiffList {
    pub old_bases: Vec<*const u8>,
}

/// External collaborator notified when a [`super::SlotManager`]'s columns
/// move (growth) or live slots shift (compaction).
///
/// Callbacks run synchronously inside `allocate`/`free` and must not call
/// back into the originating manager (spec §5).
pub trait RebaseListener {
    /// Called before growth. `columns` are the *current* (pre-grow) column
    /// base pointers; the listener should record whatever it needs to
    /// translate old pointers to new ones in `apply_rebase`.
    fn build_diff_list(&mut self, tag: ManagerTag, columns: &[*const u8]) -> DiffList;

    /// Called after growth with the new column base pointers and the
    /// `DiffList` built just before the reallocation.
    fn apply_rebase(&mut self, tag: ManagerTag, columns: &[*const u8], diffs: &DiffList);

    /// Called once per contiguous run during compaction. Any external slot
    /// reference `s'` with `s' > start_slot` must be remapped to
    /// `s' - run_length`.
    fn perform_cleanup(
        &mut self,
        tag: ManagerTag,
        columns: &[*const u8],
        element_sizes: &[usize],
        start_slot: usize,
        run_length: usize,
    );
}
