//! [`Block`] and [`StrideChanger`]: the free-list bookkeeping records a
//! [`super::Pool`] carries (spec §3.2).

/// A contiguous free byte range inside a pool. `offset + size` never exceeds
/// the owning pool's `capacity_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub offset: usize,
    pub size: usize,
}

/// A recorded padding insertion: `padded_bytes` immediately preceding
/// `offset_after_padding` were reserved purely to satisfy an allocation's
/// stride alignment and must be folded back into the free list when that
/// allocation is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrideChanger {
    pub offset_after_padding: usize,
    pub padded_bytes: usize,
}
