use std::{
  iter, mem,
  ops::{Index, IndexMut, Range},
};

/// Arena bytes every block reserves in front of its payload: capacity, live
/// size and the two list links, one word each.
pub const HEADER_SIZE: usize = 4 * mem::size_of::<usize>();

/// Index of a header record in the [`Slots`] table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BlockId(usize);

/// Header record of one block.
///
/// `live_size` is the only allocated/free discriminator: it holds the
/// requested size while the block is handed out and is zero while it sits on
/// the free list.
#[derive(Debug, Clone)]
pub(crate) struct Block {
  pub offset: usize,
  pub capacity: usize,
  pub live_size: usize,
  pub epoch: u64,
  pub prev: Option<BlockId>,
  pub next: Option<BlockId>,
}

impl Block {
  pub fn new(
    offset: usize,
    capacity: usize,
  ) -> Self {
    Self {
      offset,
      capacity,
      live_size: 0,
      epoch: 0,
      prev: None,
      next: None,
    }
  }

  pub fn payload(&self) -> usize {
    self.offset + HEADER_SIZE
  }

  /// First arena byte past the payload, where the physical neighbor begins.
  pub fn end(&self) -> usize {
    self.payload() + self.capacity
  }

  pub fn payload_range(&self) -> Range<usize> {
    self.payload()..self.end()
  }

  pub fn is_free(&self) -> bool {
    self.live_size == 0
  }
}

/// Handle to an allocated payload.
///
/// `offset` is the payload position inside the arena and `epoch` the stamp the
/// heap wrote into the block when it was handed out. A handle stays valid
/// until it is released or resized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockPtr {
  offset: usize,
  epoch: u64,
}

impl BlockPtr {
  /// Builds a handle from its parts, the way a raw pointer is built from an
  /// address. The heap checks it against its own bookkeeping on every use.
  pub const fn from_raw_parts(
    offset: usize,
    epoch: u64,
  ) -> Self {
    Self { offset, epoch }
  }

  pub const fn offset(self) -> usize {
    self.offset
  }

  pub const fn epoch(self) -> u64 {
    self.epoch
  }
}

/// Backing table of header records.
///
/// Records are never removed. A header swallowed by coalescing is retired and
/// its slot is handed to the next header that gets created.
#[derive(Debug, Default)]
pub(crate) struct Slots {
  blocks: Vec<Block>,
  retired: Vec<BlockId>,
}

impl Slots {
  pub fn insert(
    &mut self,
    block: Block,
  ) -> BlockId {
    match self.retired.pop() {
      Some(id) => {
        self[id] = block;
        id
      }
      None => {
        self.blocks.push(block);
        BlockId(self.blocks.len() - 1)
      }
    }
  }

  pub fn retire(
    &mut self,
    id: BlockId,
  ) {
    let block = &mut self[id];
    block.capacity = 0;
    block.live_size = 0;
    block.prev = None;
    block.next = None;
    self.retired.push(id);
  }

  /// Follows `next` links starting at `head`.
  pub fn walk(
    &self,
    head: Option<BlockId>,
  ) -> impl Iterator<Item = BlockId> + '_ {
    iter::successors(head, move |&id| self[id].next)
  }
}

impl Index<BlockId> for Slots {
  type Output = Block;

  fn index(
    &self,
    id: BlockId,
  ) -> &Block {
    &self.blocks[id.0]
  }
}

impl IndexMut<BlockId> for Slots {
  fn index_mut(
    &mut self,
    id: BlockId,
  ) -> &mut Block {
    &mut self.blocks[id.0]
  }
}

/// Intrusive doubly linked list threaded through `Block::prev` and
/// `Block::next`. New members go to the head.
#[derive(Debug, Default)]
pub(crate) struct BlockList {
  head: Option<BlockId>,
  len: usize,
}

impl BlockList {
  pub fn head(&self) -> Option<BlockId> {
    self.head
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn push_front(
    &mut self,
    slots: &mut Slots,
    id: BlockId,
  ) {
    slots[id].prev = None;
    slots[id].next = self.head;
    if let Some(head) = self.head {
      slots[head].prev = Some(id);
    }
    self.head = Some(id);
    self.len += 1;
  }

  /// Removes `id`, which must be a member of this list.
  pub fn unlink(
    &mut self,
    slots: &mut Slots,
    id: BlockId,
  ) {
    let (prev, next) = (slots[id].prev, slots[id].next);

    match prev {
      Some(prev) => slots[prev].next = next,
      None => {
        debug_assert_eq!(self.head, Some(id));
        self.head = next;
      }
    }
    if let Some(next) = next {
      slots[next].prev = prev;
    }

    slots[id].prev = None;
    slots[id].next = None;
    self.len -= 1;
  }

  /// Puts `new` at the position `old` held; `old` leaves the list.
  pub fn replace(
    &mut self,
    slots: &mut Slots,
    old: BlockId,
    new: BlockId,
  ) {
    let (prev, next) = (slots[old].prev, slots[old].next);

    slots[new].prev = prev;
    slots[new].next = next;
    match prev {
      Some(prev) => slots[prev].next = Some(new),
      None => self.head = Some(new),
    }
    if let Some(next) = next {
      slots[next].prev = Some(new);
    }

    slots[old].prev = None;
    slots[old].next = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn slots_with(count: usize) -> (Slots, Vec<BlockId>) {
    let mut slots = Slots::default();
    let ids = (0..count)
      .map(|i| slots.insert(Block::new(i * 64, 32)))
      .collect();
    (slots, ids)
  }

  fn order(
    list: &BlockList,
    slots: &Slots,
  ) -> Vec<BlockId> {
    slots.walk(list.head()).collect()
  }

  #[test]
  fn test_push_front_is_lifo() {
    let (mut slots, ids) = slots_with(3);
    let mut list = BlockList::default();

    for &id in &ids {
      list.push_front(&mut slots, id);
    }

    assert_eq!(order(&list, &slots), vec![ids[2], ids[1], ids[0]]);
    assert_eq!(list.len(), 3);
    assert_eq!(slots[ids[0]].prev, Some(ids[1]));
  }

  #[test]
  fn test_unlink_head_middle_tail() {
    let (mut slots, ids) = slots_with(4);
    let mut list = BlockList::default();
    for &id in &ids {
      list.push_front(&mut slots, id);
    }

    list.unlink(&mut slots, ids[2]);
    assert_eq!(order(&list, &slots), vec![ids[3], ids[1], ids[0]]);

    list.unlink(&mut slots, ids[3]);
    assert_eq!(order(&list, &slots), vec![ids[1], ids[0]]);
    assert_eq!(slots[ids[1]].prev, None);

    list.unlink(&mut slots, ids[0]);
    assert_eq!(order(&list, &slots), vec![ids[1]]);

    list.unlink(&mut slots, ids[1]);
    assert_eq!(list.head(), None);
    assert_eq!(list.len(), 0);
  }

  #[test]
  fn test_replace_keeps_neighbors() {
    let (mut slots, ids) = slots_with(4);
    let mut list = BlockList::default();
    for &id in &ids[..3] {
      list.push_front(&mut slots, id);
    }

    list.replace(&mut slots, ids[1], ids[3]);
    assert_eq!(order(&list, &slots), vec![ids[2], ids[3], ids[0]]);
    assert_eq!(slots[ids[0]].prev, Some(ids[3]));
    assert_eq!(list.len(), 3);

    list.replace(&mut slots, ids[2], ids[1]);
    assert_eq!(list.head(), Some(ids[1]));
  }

  #[test]
  fn test_retired_slot_is_reused() {
    let (mut slots, ids) = slots_with(2);

    slots.retire(ids[0]);
    let reused = slots.insert(Block::new(512, 48));

    assert_eq!(reused, ids[0]);
    assert_eq!(slots[reused].offset, 512);
    assert_eq!(slots[reused].end(), 512 + HEADER_SIZE + 48);
  }
}
