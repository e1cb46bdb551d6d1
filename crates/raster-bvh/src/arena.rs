//! Block-based arena handing out stable indices.
//!
//! Items are bump-allocated into fixed-capacity blocks. A block never grows,
//! so an item stays where it was put until the arena is reset or dropped.
//! Resetting keeps every block for reuse, which lets a tree be rebuilt without
//! going back to the system allocator.
//!
//! The arena is single-writer: allocation takes `&mut self` and the type is
//! deliberately not `Clone`.

use std::ops::{Index, IndexMut, Range};

/// Default block size in bytes.
pub const DEFAULT_BLOCK_BYTES: usize = 256 * 1024;

#[derive(Debug)]
struct Block<T> {
    /// Index of the first item stored in this block.
    start: usize,
    items: Vec<T>,
}

impl<T> Block<T> {
    fn new(start: usize, items: Vec<T>) -> Self {
        Self { start, items }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.items.capacity() - self.items.len()
    }
}

/// A typed bump arena.
#[derive(Debug)]
pub struct Arena<T> {
    block_len: usize,
    current: Block<T>,
    /// Full blocks, ordered by `start`.
    used: Vec<Block<T>>,
    /// Empty blocks released by [`Arena::reset`].
    available: Vec<Vec<T>>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an arena with [`DEFAULT_BLOCK_BYTES`] blocks.
    pub fn new() -> Self {
        Self::with_block_bytes(DEFAULT_BLOCK_BYTES)
    }

    /// Creates an arena whose blocks hold `bytes / size_of::<T>()` items
    /// (at least one).
    pub fn with_block_bytes(bytes: usize) -> Self {
        let item_size = std::mem::size_of::<T>().max(1);
        Self {
            block_len: (bytes / item_size).max(1),
            current: Block::new(0, Vec::new()),
            used: Vec::new(),
            available: Vec::new(),
            len: 0,
        }
    }

    /// Number of items a default-sized block holds.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of live items.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocates one item and returns its index.
    pub fn alloc(&mut self, value: T) -> usize {
        self.reserve_contiguous(1);
        let index = self.len;
        self.current.items.push(value);
        self.len += 1;
        index
    }

    /// Allocates `n` contiguous items, initializing item `i` with `init(i)`.
    pub fn alloc_with<F>(&mut self, n: usize, init: F) -> Range<usize>
    where
        F: FnMut(usize) -> T,
    {
        if n == 0 {
            return self.len..self.len;
        }
        self.reserve_contiguous(n);
        let start = self.len;
        self.current.items.extend((0..n).map(init));
        self.len += n;
        start..self.len
    }

    /// Makes sure the current block can take `n` more items without moving.
    fn reserve_contiguous(&mut self, n: usize) {
        if self.current.remaining() >= n {
            return;
        }

        let retired = std::mem::replace(&mut self.current, Block::new(self.len, Vec::new()));
        if !retired.items.is_empty() {
            self.used.push(retired);
        } else if retired.items.capacity() > 0 {
            self.available.push(retired.items);
        }

        // First fit among released blocks, then a fresh one.
        let items = match self.available.iter().position(|b| b.capacity() >= n) {
            Some(i) => self.available.remove(i),
            None => Vec::with_capacity(n.max(self.block_len)),
        };
        self.current = Block::new(self.len, items);
    }

    /// Drops every item but keeps all blocks for reuse.
    pub fn reset(&mut self) {
        self.current.items.clear();
        self.current.start = 0;
        for mut block in self.used.drain(..) {
            block.items.clear();
            self.available.push(block.items);
        }
        self.len = 0;
    }

    /// Bytes reserved across all blocks, in use or not.
    pub fn total_allocated(&self) -> usize {
        let items: usize = self.current.items.capacity()
            + self.used.iter().map(|b| b.items.capacity()).sum::<usize>()
            + self.available.iter().map(Vec::capacity).sum::<usize>();
        items * std::mem::size_of::<T>()
    }

    /// Number of blocks owned by the arena.
    pub fn block_count(&self) -> usize {
        let current = usize::from(self.current.items.capacity() > 0);
        current + self.used.len() + self.available.len()
    }

    fn block_of(&self, index: usize) -> &Block<T> {
        if index >= self.current.start {
            &self.current
        } else {
            &self.used[self.used.partition_point(|b| b.start <= index) - 1]
        }
    }

    fn block_of_mut(&mut self, index: usize) -> &mut Block<T> {
        if index >= self.current.start {
            &mut self.current
        } else {
            let i = self.used.partition_point(|b| b.start <= index) - 1;
            &mut self.used[i]
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        let block = self.block_of(index);
        block.items.get(index - block.start)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        let block = self.block_of_mut(index);
        let offset = index - block.start;
        block.items.get_mut(offset)
    }

    /// Iterates items in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.used
            .iter()
            .chain(std::iter::once(&self.current))
            .flat_map(|b| b.items.iter())
    }
}

impl<T> Index<usize> for Arena<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(item) => item,
            None => panic!("arena index {index} out of bounds (len {})", self.len),
        }
    }
}

impl<T> IndexMut<usize> for Arena<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len;
        match self.get_mut(index) {
            Some(item) => item,
            None => panic!("arena index {index} out of bounds (len {len})"),
        }
    }
}
