/// Rounds `value` up to the machine word, which is also the alignment of
/// every block header.
///
/// # Examples
///
/// ```rust
/// use firstfit::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, ::core::mem::size_of::<usize>())
  };
}

/// Rounds `value` up to `alignment`, which must be a power of two.
///
/// ```rust
/// use firstfit::align_to;
///
/// assert_eq!(align_to!(1025, 1024), 2048);
/// assert_eq!(align_to!(64, 16), 64);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    ($value + $alignment - 1) & !($alignment - 1)
  };
}

/// Checked form of [`align!`]: `None` when rounding would overflow.
pub fn align_size(size: usize) -> Option<usize> {
  let word = core::mem::size_of::<usize>();
  size.checked_add(word - 1).map(|value| value & !(word - 1))
}
