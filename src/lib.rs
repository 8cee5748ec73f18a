//! Scene arena allocators for the Vulfram engine.
//!
//! Two independent allocators extracted from the engine's scene-graph
//! memory subsystem:
//!
//! - [`slots`]: a dense, SIMD-aligned slot allocator backing structure-of-arrays
//!   scene data (transforms, bounding volumes, ...).
//! - [`buffers`]: a sub-allocator that carves variable-sized, stride-aligned
//!   regions out of a small set of large GPU buffer pools.
//!
//! Both are single-threaded, cooperative allocators: each instance is owned
//! by one frame-stepping thread and none of its operations suspend or may
//! be entered reentrantly. There is no internal locking, and the rebase /
//! factory callbacks consumed by `slots` and `buffers` run synchronously
//! inside the call that triggers them.

pub mod buffers;
pub mod constants;
pub mod slots;

pub use buffers::{BufferClass, BufferError, BufferSubAllocator, PoolFactory, PoolHandle};
pub use slots::{ManagerTag, RebaseListener, SlotError, SlotManager};
