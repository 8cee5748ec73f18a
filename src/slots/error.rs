//! Error type for [`super::SlotManager`] (spec §7).

/// Failure modes for [`super::SlotManager::allocate`].
///
/// Precondition violations (freeing a slot that does not belong to this
/// manager, a `lane_index` out of range) are programmer errors and remain
/// `debug_assert!`s rather than variants here, per spec §7.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    /// Growing would exceed the manager's hard limit `H`, or no listener
    /// was supplied and the manager is already full.
    #[error("slot manager exhausted capacity (max_memory={max_memory}, hard_limit={hard_limit})")]
    CapacityExhausted {
        max_memory: usize,
        hard_limit: usize,
    },
}
