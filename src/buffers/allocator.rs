//! [`BufferSubAllocator`]: carves variable-sized, stride-aligned regions
//! out of a small set of large GPU buffer pools (spec §4.2).

use crate::buffers::block::{Block, StrideChanger};
use crate::buffers::error::BufferError;
use crate::buffers::factory::PoolFactory;
use crate::buffers::pool::Pool;
use crate::buffers::BufferClass;
use crate::constants::round_up;

/// Per-class construction parameters: a default pool size and an optional
/// dynamic-ring multiplier applied to every `allocate` request against
/// this class before stride alignment (spec §4.2.1, Open Question in spec
/// §9). `1` disables the multiplier.
#[derive(Debug, Clone, Copy)]
pub struct PoolAllocatorConfig {
    pub default_pool_size: usize,
    pub dynamic_multiplier: usize,
}

impl Default for PoolAllocatorConfig {
    fn default() -> Self {
        Self {
            default_pool_size: 0,
            dynamic_multiplier: 1,
        }
    }
}

struct ClassState {
    default_pool_size: usize,
    dynamic_multiplier: usize,
    pools: Vec<Pool>,
}

impl ClassState {
    fn new(config: PoolAllocatorConfig) -> Self {
        Self {
            default_pool_size: config.default_pool_size,
            dynamic_multiplier: config.dynamic_multiplier.max(1),
            pools: Vec::new(),
        }
    }
}

/// A sub-allocator over a small set of GPU buffer pools, one pool list per
/// [`BufferClass`]. `F` is the backing buffer factory that actually owns
/// device memory; this type only tracks ranges within it.
pub struct BufferSubAllocator<F: PoolFactory> {
    factory: F,
    cpu_accessible: ClassState,
    cpu_inaccessible: ClassState,
}

impl<F: PoolFactory> BufferSubAllocator<F> {
    pub fn new(
        factory: F,
        cpu_accessible: PoolAllocatorConfig,
        cpu_inaccessible: PoolAllocatorConfig,
    ) -> Self {
        Self {
            factory,
            cpu_accessible: ClassState::new(cpu_accessible),
            cpu_inaccessible: ClassState::new(cpu_inaccessible),
        }
    }

    fn class_state(&self, class: BufferClass) -> &ClassState {
        match class {
            BufferClass::CpuAccessible => &self.cpu_accessible,
            BufferClass::CpuInaccessible => &self.cpu_inaccessible,
        }
    }

    fn class_state_mut(&mut self, class: BufferClass) -> &mut ClassState {
        match class {
            BufferClass::CpuAccessible => &mut self.cpu_accessible,
            BufferClass::CpuInaccessible => &mut self.cpu_inaccessible,
        }
    }

    /// Pools currently held for `class`, for introspection/tests.
    pub fn pools(&self, class: BufferClass) -> &[Pool] {
        &self.class_state(class).pools
    }

    /// Carve a `size`-byte, `bytes_per_element`-aligned region out of a
    /// pool of `class`, creating a new pool via the factory if no existing
    /// free block fits (spec §4.2.1).
    pub fn allocate(
        &mut self,
        size: usize,
        bytes_per_element: usize,
        class: BufferClass,
    ) -> Result<(usize, usize), BufferError<F::Error>> {
        if bytes_per_element == 0 {
            return Err(BufferError::ZeroStride);
        }

        let state = self.class_state(class);
        let size = size * state.dynamic_multiplier;

        let mut found: Option<(usize, usize, usize, usize)> = None;
        'search: for (pool_index, pool) in state.pools.iter().enumerate() {
            for (block_index, block) in pool.free_blocks.iter().enumerate() {
                let aligned = round_up(block.offset, bytes_per_element);
                let pad = aligned - block.offset;
                if pad > block.size {
                    continue;
                }
                let remaining = block.size - pad;
                if size <= remaining {
                    found = Some((pool_index, block_index, aligned, pad));
                    if pad == 0 {
                        break 'search;
                    }
                }
            }
        }

        let (pool_index, block_index, aligned, pad) = match found {
            Some(hit) => hit,
            None => {
                let default_pool_size = self.class_state(class).default_pool_size;
                let new_pool_size = default_pool_size.max(size);
                log::debug!(
                    "buffer sub-allocator creating new {class:?} pool of {new_pool_size} bytes \
                     (no free block fit {size} bytes)"
                );
                let handle = self
                    .factory
                    .create_pool(new_pool_size, class)
                    .map_err(|source| BufferError::OutOfMemory {
                        class,
                        requested_bytes: size,
                        source,
                    })?;
                let pools = &mut self.class_state_mut(class).pools;
                pools.push(Pool::new(handle, new_pool_size));
                (pools.len() - 1, 0, 0, 0)
            }
        };

        let pool = &mut self.class_state_mut(class).pools[pool_index];
        let block = pool.free_blocks[block_index];
        let remainder = block.size - (size + pad);
        if remainder > 0 {
            pool.free_blocks[block_index] = Block {
                offset: aligned + size,
                size: remainder,
            };
        } else {
            pool.free_blocks.remove(block_index);
        }

        if pad > 0 {
            pool.insert_stride_changer(StrideChanger {
                offset_after_padding: aligned,
                padded_bytes: pad,
            });
        }

        Ok((pool_index, aligned))
    }

    /// Release a previously allocated `(pool_index, offset, size)` region
    /// back to `class`'s pool, reclaiming any stride padding recorded
    /// against it and coalescing with adjacent free blocks (spec §4.2.2).
    pub fn deallocate(&mut self, pool_index: usize, offset: usize, size: usize, class: BufferClass) {
        debug_assert!(size > 0, "deallocate size must be non-zero");

        let pool = &mut self.class_state_mut(class).pools[pool_index];
        debug_assert!(
            offset + size <= pool.capacity_bytes,
            "deallocate range [{offset}, {}) out of pool bounds (capacity {})",
            offset + size,
            pool.capacity_bytes
        );

        let (offset, size) = match pool.take_stride_changer(offset) {
            Some(changer) => (offset - changer.padded_bytes, size + changer.padded_bytes),
            None => (offset, size),
        };

        pool.insert_free_block(Block { offset, size });
    }
}
