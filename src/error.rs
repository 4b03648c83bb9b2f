//! Error types.
//!
//! Recoverable failures are returned to the caller and never change heap
//! state. Contract violations and broken invariants are [`FatalError`]s,
//! raised through [`fatal`] and never returned.

use thiserror::Error;

use crate::block::BlockPtr;

/// Recoverable allocation failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// Zero bytes were requested.
  #[error("invalid allocation size: zero bytes requested")]
  InvalidSize,

  /// No free block fits and the frontier cannot advance far enough.
  #[error("out of memory: requested {requested} bytes, {available} bytes left past the frontier")]
  OutOfMemory {
    /// Size the caller asked for.
    requested: usize,
    /// Untouched bytes between the frontier and the arena end.
    available: usize,
  },
}

/// Recoverable resize failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeError {
  /// The handle lies outside the touched part of the arena. Nothing changed.
  #[error("resize target at offset {offset} lies outside the touched arena")]
  OutOfRange {
    /// Offset carried by the rejected handle.
    offset: usize,
  },

  /// The new size could not be allocated. The old contents were moved into
  /// `recovered`, which replaces the handle passed in.
  #[error("resize unsatisfied ({source}), contents recovered at offset {}", .recovered.offset())]
  Unsatisfied {
    /// Handle now holding the previous contents.
    recovered: BlockPtr,
    /// Why the new size could not be allocated.
    source: AllocError,
  },
}

/// Rejected heap configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
  /// The arena cannot hold a single minimum-sized block.
  #[error("arena capacity {capacity} is below the {required} bytes one block needs")]
  CapacityTooSmall {
    /// Configured capacity.
    capacity: usize,
    /// One header plus one minimum fragment.
    required: usize,
  },

  /// The minimum fragment size must be nonzero.
  #[error("minimum fragment size must be nonzero")]
  ZeroFragment,

  /// The TOML document could not be parsed.
  #[error("invalid heap configuration: {0}")]
  Parse(#[from] toml::de::Error),
}

/// Contract violations and corruption. Continuing after one of these is
/// unsafe, so they abort the operation instead of being returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
  /// The released address is already on the free list.
  #[error("double free detected at offset {offset}")]
  DoubleFreeDetected {
    /// Payload offset that was released twice.
    offset: usize,
  },

  /// The address is live, but was handed out again after the handle's own
  /// allocation was released.
  #[error("stale handle at offset {offset}: handle epoch {found}, block epoch {current}")]
  StaleHandle {
    /// Payload offset of the handle.
    offset: usize,
    /// Epoch the handle carries.
    found: u64,
    /// Epoch of the block currently at that address.
    current: u64,
  },

  /// The address is neither allocated nor free.
  #[error("release of unknown block at offset {offset}")]
  UnknownBlock {
    /// Offending payload offset.
    offset: usize,
  },

  /// Resize was called on a block that is no longer allocated.
  #[error("use after free: resize of released block at offset {offset}")]
  UseAfterFree {
    /// Offending payload offset.
    offset: usize,
  },

  /// Internal bookkeeping no longer holds.
  #[error("heap corrupted: {detail}")]
  HeapCorrupted {
    /// What was found broken.
    detail: String,
  },
}

/// Logs `err` and unwinds.
#[cold]
#[track_caller]
pub(crate) fn fatal(err: FatalError) -> ! {
  tracing::error!(error = %err, "aborting on heap contract violation");
  panic!("{err}")
}
