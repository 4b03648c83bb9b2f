/// Rounds `value` up to the next multiple of the machine word.
///
/// Block capacities and header offsets are always word multiples, which keeps
/// every payload naturally aligned relative to the arena base.
///
/// # Examples
///
/// ```rust
/// use rheap::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// assert_eq!(align!(0), 0);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + ::core::mem::size_of::<usize>() - 1) & !(::core::mem::size_of::<usize>() - 1)
  };
}

/// Same as [`align!`], but `None` instead of wrapping when `value` is within a
/// word of `usize::MAX`.
#[macro_export]
macro_rules! checked_align {
  ($value:expr) => {
    ($value as usize)
      .checked_add(::core::mem::size_of::<usize>() - 1)
      .map(|v| v & !(::core::mem::size_of::<usize>() - 1))
  };
}

#[cfg(test)]
mod tests {
  use std::mem;

  #[test]
  fn test_align() {
    let word = mem::size_of::<usize>();

    for i in 0..10 {
      let expected = word * (i + 1);

      for size in (word * i + 1)..=(word * (i + 1)) {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_keeps_word_multiples() {
    let word = mem::size_of::<usize>();

    for i in 0..10 {
      assert_eq!(word * i, align!(word * i));
    }
  }

  #[test]
  fn test_checked_align_overflow() {
    let word = mem::size_of::<usize>();

    assert_eq!(checked_align!(usize::MAX), None);
    assert_eq!(checked_align!(usize::MAX - word + 1), Some(usize::MAX - word + 1));
    assert_eq!(checked_align!(word + 1), Some(2 * word));
  }
}
