//! # rheap - A Fixed-Arena Free-List Allocator
//!
//! This crate provides a general-purpose **first-fit free-list allocator**
//! over a single fixed-size arena, with block splitting and eager coalescing.
//!
//! ## Overview
//!
//! The arena is carved into blocks from offset zero. Each block is a header
//! followed by its payload. Everything past the frontier has never been
//! handed out:
//!
//! ```text
//!   Arena Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                              ARENA                                   │
//!   │                                                                      │
//!   │   ┌───┬──────┬───┬──────┬───┬────────┬─────────────────────────────┐ │
//!   │   │ H │  A1  │ H │  F1  │ H │   A2   │        never touched        │ │
//!   │   └───┴──────┴───┴──────┴───┴────────┴─────────────────────────────┘ │
//!   │                                      ▲                          ▲    │
//!   │                                      │                          │    │
//!   │                                  Frontier                 Capacity   │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   A = allocated, F = free, H = header.
//!   The frontier only moves forward.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rheap
//!   ├── align      - Word rounding macros (align!, checked_align!)
//!   ├── block      - Header records, handles, intrusive lists (internal)
//!   ├── config     - HeapConfig and its defaults
//!   ├── error      - Recoverable and fatal error types
//!   ├── heap       - Heap, the allocator engine
//!   └── locked     - LockedHeap, a mutex around Heap
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rheap::Heap;
//!
//! let mut heap = Heap::new();
//!
//! let greeting = heap.allocate(8).unwrap();
//! heap.bytes_mut(greeting).unwrap().copy_from_slice(b"hello!\n\0");
//!
//! // Grow it; the old contents come along.
//! let greeting = heap.resize(greeting, 72).unwrap();
//! assert!(heap.bytes(greeting).unwrap().starts_with(b"hello!\n"));
//!
//! heap.release(greeting);
//! ```
//!
//! ## How It Works
//!
//! Allocation searches the free list from its head and takes the first block
//! that fits. A block with room to spare is split:
//!
//! ```text
//!   Split on allocate(n):
//!
//!   before  ┌───┬───────────────────────────────────┐
//!           │ H │            free: cap              │
//!           └───┴───────────────────────────────────┘
//!
//!   after   ┌───┬──────────────┬───┬────────────────┐
//!           │ H │ allocated: n │ H │ free: cap-n-H  │
//!           └───┴──────────────┴───┴────────────────┘
//!
//!   Only when cap - n >= H + min_fragment; otherwise the whole
//!   block is handed out.
//! ```
//!
//! When nothing fits, the frontier is bumped. Releasing a block merges it with
//! free physical neighbors on both sides, so two free blocks never touch:
//!
//! ```text
//!   Coalesce on release(B):
//!
//!   ┌───┬─────────┬───┬─────────┬───┬─────────┐
//!   │ H │ free: A │ H │ B       │ H │ free: C │
//!   └───┴─────────┴───┴─────────┴───┴─────────┘
//!                    ▼
//!   ┌───┬─────────────────────────────────────┐
//!   │ H │          free: A + B + C + 2H       │
//!   └───┴─────────────────────────────────────┘
//! ```
//!
//! Resize copies the payload aside, releases the block, allocates the new
//! size and copies back. If the new size does not fit, the contents are put
//! back into a block of the old size and that handle is returned in the error.
//!
//! ## Handles
//!
//! A [`BlockPtr`] is the payload offset plus an epoch stamped at allocation.
//! Releasing a handle twice, or releasing a handle after its address was handed
//! out again, is caught and aborts with a panic.
//!
//! ## Limitations
//!
//! - **Fixed capacity**: The arena never grows
//! - **Single-threaded core**: [`Heap`] needs `&mut`; use [`LockedHeap`] to share
//! - **Word alignment only**: Payloads are aligned to `usize`, nothing more
//! - **Best-effort misuse detection**: Resize only range-checks its handle

pub mod align;
mod block;
mod config;
mod error;
mod heap;
mod locked;

pub use block::{BlockPtr, HEADER_SIZE};
pub use config::{HEAP_CAPACITY, HeapConfig, MIN_FRAGMENT_SIZE};
pub use error::{AllocError, ConfigError, FatalError, ResizeError};
pub use heap::{Heap, HeapStats};
pub use locked::LockedHeap;
