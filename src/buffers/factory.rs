//! The backing buffer factory contract consumed by [`super::BufferSubAllocator`]
//! (spec §6.2).

use crate::buffers::BufferClass;

/// Opaque identity for a pool's backing device buffer, assigned by the
/// factory. The allocator never dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle(pub u64);

/// External collaborator that owns the actual device/host buffers a
/// [`super::Pool`] carves ranges out of.
pub trait PoolFactory {
    type Error: std::error::Error + 'static;

    /// Allocate a new backing buffer of at least `size_bytes`, mapped
    /// appropriately for `class`.
    fn create_pool(&mut self, size_bytes: usize, class: BufferClass) -> Result<PoolHandle, Self::Error>;

    /// Release a previously created buffer. Infallible: retirement failures
    /// are out of scope (spec §5: deferred to the driver facade).
    fn destroy_pool(&mut self, handle: PoolHandle);
}
