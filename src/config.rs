//! Heap configuration.
//!
//! Both knobs are fixed once a [`Heap`](crate::Heap) is built. Changing them
//! means building a new heap.

use serde::Deserialize;

use crate::{block::HEADER_SIZE, checked_align, error::ConfigError};

/// Default arena size in bytes.
pub const HEAP_CAPACITY: usize = 64_000;

/// Default smallest capacity a block may have.
pub const MIN_FRAGMENT_SIZE: usize = 32;

/// Arena capacity and minimum fragment size.
///
/// Can be loaded from TOML; missing keys keep their defaults:
///
/// ```rust
/// use rheap::HeapConfig;
///
/// let config = HeapConfig::from_toml("capacity = 4096").unwrap();
/// assert_eq!(config.capacity(), 4096);
/// assert_eq!(config.min_fragment(), rheap::MIN_FRAGMENT_SIZE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeapConfig {
  capacity: usize,
  min_fragment: usize,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}

impl HeapConfig {
  pub const fn new() -> Self {
    Self {
      capacity: HEAP_CAPACITY,
      min_fragment: MIN_FRAGMENT_SIZE,
    }
  }

  pub const fn with_capacity(
    mut self,
    capacity: usize,
  ) -> Self {
    self.capacity = capacity;
    self
  }

  pub const fn with_min_fragment(
    mut self,
    min_fragment: usize,
  ) -> Self {
    self.min_fragment = min_fragment;
    self
  }

  pub const fn capacity(&self) -> usize {
    self.capacity
  }

  pub const fn min_fragment(&self) -> usize {
    self.min_fragment
  }

  /// Parses and validates a TOML document.
  pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(source)?;
    config.validate()
  }

  /// Checks that the arena can hold at least one block and rounds the
  /// minimum fragment up to a whole word.
  pub fn validate(mut self) -> Result<Self, ConfigError> {
    if self.min_fragment == 0 {
      return Err(ConfigError::ZeroFragment);
    }

    self.min_fragment = checked_align!(self.min_fragment).unwrap_or(usize::MAX);

    let required = self.min_fragment.saturating_add(HEADER_SIZE);
    if required > self.capacity {
      return Err(ConfigError::CapacityTooSmall {
        capacity: self.capacity,
        required,
      });
    }

    Ok(self)
  }
}
