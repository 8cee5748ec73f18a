//! [`Pool`]: one backing buffer's free-block list and stride-changer
//! bookkeeping (spec §3.2/§4.2.3).

use crate::buffers::block::{Block, StrideChanger};
use crate::buffers::factory::PoolHandle;

/// One large backing buffer, subdivided by [`super::BufferSubAllocator`].
#[derive(Debug)]
pub struct Pool {
    pub handle: PoolHandle,
    pub capacity_bytes: usize,
    pub free_blocks: Vec<Block>,
    pub stride_changers: Vec<StrideChanger>,
}

impl Pool {
    /// A freshly created pool: one free block covering the whole range.
    pub fn new(handle: PoolHandle, capacity_bytes: usize) -> Self {
        Self {
            handle,
            capacity_bytes,
            free_blocks: vec![Block {
                offset: 0,
                size: capacity_bytes,
            }],
            stride_changers: Vec::new(),
        }
    }

    /// Insert `block` into the free list, coalescing with any block it is
    /// adjacent to and repeating until no neighbour touches the merged
    /// result (spec §4.2.3). A loop rather than recursion, since the source
    /// coalesces recursively but a free list's depth is bounded only by its
    /// own length.
    pub fn insert_free_block(&mut self, mut block: Block) {
        loop {
            let neighbour = self.free_blocks.iter().position(|other| {
                other.offset + other.size == block.offset || block.offset + block.size == other.offset
            });

            let Some(index) = neighbour else {
                break;
            };

            let other = self.free_blocks.swap_remove(index);
            block = if other.offset < block.offset {
                Block {
                    offset: other.offset,
                    size: other.size + block.size,
                }
            } else {
                Block {
                    offset: block.offset,
                    size: block.size + other.size,
                }
            };
        }

        self.free_blocks.push(block);
    }

    /// Insert a stride changer, keeping the sequence sorted by
    /// `offset_after_padding` so lookup is a binary search (spec §9).
    pub fn insert_stride_changer(&mut self, changer: StrideChanger) {
        let index = self
            .stride_changers
            .partition_point(|existing| existing.offset_after_padding < changer.offset_after_padding);
        self.stride_changers.insert(index, changer);
    }

    /// Remove and return the stride changer recorded at `offset`, if any.
    pub fn take_stride_changer(&mut self, offset: usize) -> Option<StrideChanger> {
        let index = self
            .stride_changers
            .binary_search_by(|existing| existing.offset_after_padding.cmp(&offset))
            .ok()?;
        Some(self.stride_changers.remove(index))
    }
}
