use std::{collections::BTreeMap, mem};

use tracing::{debug, trace, warn};

use crate::{
  block::{Block, BlockId, BlockList, BlockPtr, HEADER_SIZE, Slots},
  checked_align,
  config::HeapConfig,
  error::{AllocError, ConfigError, FatalError, ResizeError, fatal},
};

/// Snapshot of the heap bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  /// Arena size in bytes.
  pub capacity: usize,
  /// First never-allocated byte.
  pub frontier: usize,
  /// Allocations not yet released.
  pub live_allocations: usize,
  /// Length of the allocated list.
  pub allocated_blocks: usize,
  /// Length of the free list.
  pub free_blocks: usize,
  /// Payload bytes sitting on the free list.
  pub free_bytes: usize,
}

/// First-fit allocator over one fixed-size arena.
///
/// The arena is carved into header-prefixed blocks from offset zero up to the
/// frontier. Every block is on exactly one of two lists: allocated or free.
///
/// # Thread Safety
///
/// Every mutating operation takes `&mut self`. Share a heap between threads
/// through [`LockedHeap`](crate::LockedHeap).
pub struct Heap {
  config: HeapConfig,
  words: Box<[usize]>,
  frontier: usize,
  slots: Slots,
  by_offset: BTreeMap<usize, BlockId>,
  allocated: BlockList,
  free: BlockList,
  live_count: usize,
  epoch: u64,
}

impl Default for Heap {
  fn default() -> Self {
    Self::new()
  }
}

impl Heap {
  /// Creates a heap with the default configuration.
  pub fn new() -> Self {
    Self::build(HeapConfig::default())
  }

  pub fn with_config(config: HeapConfig) -> Result<Self, ConfigError> {
    Ok(Self::build(config.validate()?))
  }

  fn build(config: HeapConfig) -> Self {
    let words = config.capacity().div_ceil(mem::size_of::<usize>());
    debug!(
      capacity = config.capacity(),
      min_fragment = config.min_fragment(),
      "heap created"
    );

    Self {
      config,
      words: vec![0; words].into_boxed_slice(),
      frontier: 0,
      slots: Slots::default(),
      by_offset: BTreeMap::new(),
      allocated: BlockList::default(),
      free: BlockList::default(),
      live_count: 0,
      epoch: 0,
    }
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn frontier(&self) -> usize {
    self.frontier
  }

  pub fn stats(&self) -> HeapStats {
    HeapStats {
      capacity: self.config.capacity(),
      frontier: self.frontier,
      live_allocations: self.live_count,
      allocated_blocks: self.allocated.len(),
      free_blocks: self.free.len(),
      free_bytes: self
        .slots
        .walk(self.free.head())
        .map(|id| self.slots[id].capacity)
        .sum(),
    }
  }

  /// Hands out a block of at least `size` bytes.
  ///
  /// The free list is searched first-fit from its head, so the most recently
  /// freed block that fits wins. A hit large enough to leave a usable
  /// remainder is split; otherwise it is handed out whole. A miss advances the
  /// frontier.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<BlockPtr, AllocError> {
    let id = self.allocate_block(size)?;
    Ok(self.ptr_of(id))
  }

  /// Like [`Heap::allocate`], with the whole block zeroed.
  pub fn zero_allocate(
    &mut self,
    size: usize,
  ) -> Result<BlockPtr, AllocError> {
    let id = self.allocate_block(size)?;
    let range = self.slots[id].payload_range();
    self.arena_mut()[range].fill(0);
    Ok(self.ptr_of(id))
  }

  /// Returns the block behind `ptr` to the free list, merging it with free
  /// physical neighbors on both sides.
  ///
  /// # Panics
  ///
  /// Releasing an address that is already free, a handle whose address was
  /// handed out again since, or an address the heap never returned is a
  /// contract violation and panics.
  pub fn release(
    &mut self,
    ptr: BlockPtr,
  ) {
    let target = ptr.offset();

    // Closest free block below the target is the only left-merge candidate.
    let mut left: Option<BlockId> = None;
    for id in self.slots.walk(self.free.head()) {
      let block = &self.slots[id];
      if block.payload() == target {
        fatal(FatalError::DoubleFreeDetected { offset: target });
      }
      if block.payload() < target && left.is_none_or(|l| self.slots[l].offset < block.offset) {
        left = Some(id);
      }
    }

    let Some(mut id) = self
      .slots
      .walk(self.allocated.head())
      .find(|&id| self.slots[id].payload() == target)
    else {
      // A header absorbed by a free neighbor sits inside that neighbor's payload.
      if left.is_some_and(|l| self.slots[l].payload_range().contains(&target)) {
        fatal(FatalError::DoubleFreeDetected { offset: target });
      }
      fatal(FatalError::UnknownBlock { offset: target });
    };

    let current = self.slots[id].epoch;
    if current != ptr.epoch() {
      fatal(FatalError::StaleHandle {
        offset: target,
        found: ptr.epoch(),
        current,
      });
    }

    self.allocated.unlink(&mut self.slots, id);
    trace!(offset = target, capacity = self.slots[id].capacity, "release");

    if let Some(left) = left {
      if self.slots[left].end() == self.slots[id].offset {
        self.free.unlink(&mut self.slots, left);
        self.absorb(left, id);
        id = left;
      }
    }

    let next = self.slots[id].end();
    if next < self.frontier {
      if let Some(&right) = self.by_offset.get(&next) {
        if self.slots[right].is_free() {
          self.free.unlink(&mut self.slots, right);
          self.absorb(id, right);
        }
      }
    }

    self.slots[id].live_size = 0;
    self.free.push_front(&mut self.slots, id);
    self.live_count = self.live_count.saturating_sub(1);
  }

  /// Moves the contents behind `ptr` into a block of at least `new_size`
  /// bytes, keeping the first `min(old capacity, new_size)` bytes.
  ///
  /// On success the old handle is dead. If `new_size` cannot be allocated the
  /// old contents are put back into a block of the old capacity, which comes
  /// back inside [`ResizeError::Unsatisfied`] and replaces the old handle.
  ///
  /// The only address check is that `ptr` lies in the touched part of the
  /// arena. A handle pointing into the middle of a block passes it and is
  /// resolved to the block that contains it, which is then moved and freed.
  ///
  /// # Panics
  ///
  /// Panics when the block is already free, when the handle's epoch does not
  /// match the block, or when the old contents cannot be put back.
  pub fn resize(
    &mut self,
    ptr: BlockPtr,
    new_size: usize,
  ) -> Result<BlockPtr, ResizeError> {
    let offset = ptr.offset();
    if offset < HEADER_SIZE || offset >= self.frontier {
      debug!(offset, frontier = self.frontier, "resize outside touched arena");
      return Err(ResizeError::OutOfRange { offset });
    }

    let Some((_, &id)) = self.by_offset.range(..=offset - HEADER_SIZE).next_back() else {
      fatal(FatalError::HeapCorrupted {
        detail: format!("no block covers offset {offset}"),
      });
    };

    let block = &self.slots[id];
    if block.is_free() || block.epoch != ptr.epoch() {
      fatal(FatalError::UseAfterFree { offset });
    }

    let old_capacity = block.capacity;
    let current = self.ptr_of(id);
    let saved = self.arena()[block.payload_range()].to_vec();
    trace!(offset, old_capacity, new_size, "resize");

    self.release(current);

    match self.allocate_block(new_size) {
      Ok(id) => {
        let kept = old_capacity.min(new_size);
        self.write_payload(id, &saved[..kept]);
        Ok(self.ptr_of(id))
      }
      Err(source) => {
        let Ok(id) = self.allocate_block(old_capacity) else {
          fatal(FatalError::HeapCorrupted {
            detail: format!("could not restore a block of {old_capacity} bytes after resize"),
          });
        };
        self.write_payload(id, &saved);
        let recovered = self.ptr_of(id);
        warn!(
          new_size,
          recovered = recovered.offset(),
          %source,
          "resize unsatisfied, contents restored"
        );
        Err(ResizeError::Unsatisfied { recovered, source })
      }
    }
  }

  /// The requested bytes of a live block.
  pub fn bytes(
    &self,
    ptr: BlockPtr,
  ) -> Option<&[u8]> {
    let block = &self.slots[self.resolve(ptr)?];
    let start = block.payload();
    Some(&self.arena()[start..start + block.live_size])
  }

  pub fn bytes_mut(
    &mut self,
    ptr: BlockPtr,
  ) -> Option<&mut [u8]> {
    let block = &self.slots[self.resolve(ptr)?];
    let range = block.payload()..block.payload() + block.live_size;
    Some(&mut self.arena_mut()[range])
  }

  /// Usable size of a live block; at least the requested size.
  pub fn capacity_of(
    &self,
    ptr: BlockPtr,
  ) -> Option<usize> {
    self.resolve(ptr).map(|id| self.slots[id].capacity)
  }

  /// Checks the bookkeeping: blocks tile `[0, frontier)` without gaps, no two
  /// free blocks touch, no block is below the minimum fragment, and each list
  /// holds exactly the blocks in its state.
  pub fn verify(&self) -> Result<(), FatalError> {
    let corrupted = |detail: String| Err(FatalError::HeapCorrupted { detail });

    if self.frontier > self.config.capacity() {
      return corrupted(format!(
        "frontier {} past capacity {}",
        self.frontier,
        self.config.capacity()
      ));
    }

    let mut cursor = 0;
    let mut previous_free = false;
    let (mut live, mut free) = (0, 0);
    for (&offset, &id) in &self.by_offset {
      let block = &self.slots[id];
      if block.offset != offset || offset != cursor {
        return corrupted(format!("block at {offset} does not start at {cursor}"));
      }
      if block.capacity < self.config.min_fragment() {
        return corrupted(format!("block at {offset} below minimum fragment"));
      }
      if block.is_free() {
        if previous_free {
          return corrupted(format!("free block at {offset} touches a free neighbor"));
        }
        free += 1;
      } else {
        if block.live_size > block.capacity {
          return corrupted(format!("block at {offset} holds more than its capacity"));
        }
        live += 1;
      }
      previous_free = block.is_free();
      cursor = block.end();
    }

    if cursor != self.frontier {
      return corrupted(format!("blocks end at {cursor}, frontier at {}", self.frontier));
    }

    for (list, expect_free, expected) in [(&self.allocated, false, live), (&self.free, true, free)] {
      let mut members = 0;
      for id in self.slots.walk(list.head()).take(self.by_offset.len() + 1) {
        if self.slots[id].is_free() != expect_free {
          return corrupted(format!("block at {} on the wrong list", self.slots[id].offset));
        }
        members += 1;
      }
      if members != expected || list.len() != expected {
        return corrupted(format!(
          "list holds {members} blocks (len {}), {expected} expected",
          list.len()
        ));
      }
    }

    Ok(())
  }

  fn allocate_block(
    &mut self,
    size: usize,
  ) -> Result<BlockId, AllocError> {
    if size == 0 {
      return Err(AllocError::InvalidSize);
    }

    let Some(needed) = checked_align!(size).map(|n| n.max(self.config.min_fragment())) else {
      return Err(self.out_of_memory(size));
    };

    let id = match self.find_free(needed) {
      Some(id) => self.take_free(id, needed),
      None => self.bump(needed).ok_or_else(|| self.out_of_memory(size))?,
    };

    self.epoch += 1;
    let block = &mut self.slots[id];
    block.live_size = size;
    block.epoch = self.epoch;
    trace!(offset = block.payload(), size, capacity = block.capacity, "allocate");

    self.allocated.push_front(&mut self.slots, id);
    self.live_count += 1;
    Ok(id)
  }

  fn find_free(
    &self,
    needed: usize,
  ) -> Option<BlockId> {
    self
      .slots
      .walk(self.free.head())
      .find(|&id| self.slots[id].capacity >= needed)
  }

  /// Takes `id` off the free list, splitting off the tail when it can stand
  /// alone as a free block.
  fn take_free(
    &mut self,
    id: BlockId,
    needed: usize,
  ) -> BlockId {
    let capacity = self.slots[id].capacity;

    if capacity - needed >= HEADER_SIZE + self.config.min_fragment() {
      let offset = self.slots[id].payload() + needed;
      let rest = self.slots.insert(Block::new(offset, capacity - needed - HEADER_SIZE));
      self.by_offset.insert(offset, rest);
      self.free.replace(&mut self.slots, id, rest);
      self.slots[id].capacity = needed;
      debug!(offset, remainder = self.slots[rest].capacity, "split");
    } else {
      self.free.unlink(&mut self.slots, id);
    }

    id
  }

  fn bump(
    &mut self,
    needed: usize,
  ) -> Option<BlockId> {
    let end = self.frontier.checked_add(HEADER_SIZE)?.checked_add(needed)?;
    if end > self.config.capacity() {
      return None;
    }

    let id = self.slots.insert(Block::new(self.frontier, needed));
    self.by_offset.insert(self.frontier, id);
    debug!(offset = self.frontier, frontier = end, "bump");
    self.frontier = end;
    Some(id)
  }

  /// Grows `into` over its right neighbor `victim`, whose header is retired.
  fn absorb(
    &mut self,
    into: BlockId,
    victim: BlockId,
  ) {
    let (offset, capacity) = (self.slots[victim].offset, self.slots[victim].capacity);
    self.slots[into].capacity += HEADER_SIZE + capacity;
    self.by_offset.remove(&offset);
    self.slots.retire(victim);
    debug!(
      into = self.slots[into].offset,
      absorbed = offset,
      capacity = self.slots[into].capacity,
      "coalesce"
    );
  }

  /// Live block whose payload starts exactly at the handle's offset and whose
  /// epoch matches.
  fn resolve(
    &self,
    ptr: BlockPtr,
  ) -> Option<BlockId> {
    let header = ptr.offset().checked_sub(HEADER_SIZE)?;
    let &id = self.by_offset.get(&header)?;
    let block = &self.slots[id];
    (!block.is_free() && block.epoch == ptr.epoch()).then_some(id)
  }

  fn ptr_of(
    &self,
    id: BlockId,
  ) -> BlockPtr {
    BlockPtr::from_raw_parts(self.slots[id].payload(), self.slots[id].epoch)
  }

  fn write_payload(
    &mut self,
    id: BlockId,
    data: &[u8],
  ) {
    let start = self.slots[id].payload();
    self.arena_mut()[start..start + data.len()].copy_from_slice(data);
  }

  fn out_of_memory(
    &self,
    size: usize,
  ) -> AllocError {
    let available = self.config.capacity() - self.frontier;
    warn!(requested = size, available, "out of memory");
    AllocError::OutOfMemory {
      requested: size,
      available,
    }
  }

  fn arena(&self) -> &[u8] {
    bytemuck::cast_slice(&self.words)
  }

  fn arena_mut(&mut self) -> &mut [u8] {
    bytemuck::cast_slice_mut(&mut self.words)
  }
}
