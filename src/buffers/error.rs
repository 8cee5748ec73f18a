//! Error type for [`super::BufferSubAllocator`] (spec §7).

use crate::buffers::BufferClass;

/// Failure modes for [`super::BufferSubAllocator::allocate`].
///
/// An invalid `(pool_index, offset, size)` triple passed to `deallocate`
/// remains a `debug_assert!` (spec §7 calls this a programmer error,
/// assertion-level); `ZeroStride` is upgraded to a typed error here since a
/// bad `bytes_per_element` is a much more plausible caller mistake at this
/// boundary than a slot manager being handed a foreign pointer.
#[derive(Debug, thiserror::Error)]
pub enum BufferError<E: std::error::Error + 'static> {
    #[error("buffer sub-allocator out of memory for {class:?} (requested {requested_bytes} bytes)")]
    OutOfMemory {
        class: BufferClass,
        requested_bytes: usize,
        #[source]
        source: E,
    },

    #[error("bytes_per_element must be non-zero")]
    ZeroStride,
}
