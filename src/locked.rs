use parking_lot::Mutex;

use crate::{
  block::BlockPtr,
  error::{AllocError, ResizeError},
  heap::{Heap, HeapStats},
};

/// A [`Heap`] behind one mutex.
///
/// Every operation locks the whole arena for its duration. A fatal contract
/// violation panics while the lock is held; `parking_lot` does not poison, so
/// other threads keep working on whatever state the panic left behind.
#[derive(Default)]
pub struct LockedHeap {
  inner: Mutex<Heap>,
}

impl From<Heap> for LockedHeap {
  fn from(heap: Heap) -> Self {
    Self::new(heap)
  }
}

impl LockedHeap {
  pub fn new(heap: Heap) -> Self {
    Self {
      inner: Mutex::new(heap),
    }
  }

  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<BlockPtr, AllocError> {
    self.inner.lock().allocate(size)
  }

  pub fn zero_allocate(
    &self,
    size: usize,
  ) -> Result<BlockPtr, AllocError> {
    self.inner.lock().zero_allocate(size)
  }

  pub fn release(
    &self,
    ptr: BlockPtr,
  ) {
    self.inner.lock().release(ptr)
  }

  pub fn resize(
    &self,
    ptr: BlockPtr,
    new_size: usize,
  ) -> Result<BlockPtr, ResizeError> {
    self.inner.lock().resize(ptr, new_size)
  }

  pub fn stats(&self) -> HeapStats {
    self.inner.lock().stats()
  }

  /// Runs `f` with the heap locked, e.g. to read or write a payload.
  pub fn with<R>(
    &self,
    f: impl FnOnce(&mut Heap) -> R,
  ) -> R {
    f(&mut *self.inner.lock())
  }

  pub fn into_inner(self) -> Heap {
    self.inner.into_inner()
  }
}
