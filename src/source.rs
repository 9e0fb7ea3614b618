//! Where heap memory comes from.

use std::{alloc::Layout, ptr::NonNull};

use libc::{c_void, intptr_t, sbrk};

use crate::{
  align::align_size,
  block::ALIGNMENT,
  error::{HeapError, HeapResult},
};

/// The single operating-system primitive the heap needs: extend the heap by
/// `len` bytes.
///
/// # Safety
///
/// Implementors must return header-aligned regions of at least `len` bytes
/// that nobody else reads or writes, valid for as long as the source lives
/// (or until [`HeapSource::reset`]).
pub unsafe trait HeapSource {
  unsafe fn extend(
    &mut self,
    len: usize,
  ) -> HeapResult<NonNull<u8>>;

  /// Forgets every region handed out so far, where the source can.
  unsafe fn reset(&mut self) {}
}

/// Grows the process data segment with `sbrk(2)`.
///
/// Memory is never handed back; the break only moves up.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sbrk;

fn sbrk_failed(address: *mut c_void) -> bool {
  address == usize::MAX as *mut c_void
}

unsafe impl HeapSource for Sbrk {
  unsafe fn extend(
    &mut self,
    len: usize,
  ) -> HeapResult<NonNull<u8>> {
    let out_of_memory = HeapError::OutOfMemory { requested: len };

    unsafe {
      let brk = sbrk(0);
      if sbrk_failed(brk) {
        return Err(out_of_memory);
      }

      // The break is not necessarily word aligned, e.g. after a foreign
      // sbrk(1); pad it up so the header lands aligned.
      let start = brk as usize;
      let padding = align_size(start).ok_or(out_of_memory)? - start;
      let total = len
        .checked_add(padding)
        .filter(|&total| total <= isize::MAX as usize)
        .ok_or(out_of_memory)?;

      let address = sbrk(total as intptr_t);
      if sbrk_failed(address) {
        return Err(out_of_memory);
      }

      NonNull::new(address.cast::<u8>().add(padding)).ok_or(out_of_memory)
    }
  }
}

/// A fixed buffer from the Rust global allocator, carved front to back.
///
/// Gives a heap with a hard ceiling and no process-wide side effects, which
/// is what tests and embedders usually want.
pub struct Arena {
  base: NonNull<u8>,
  layout: Layout,
  used: usize,
}

impl Arena {
  pub fn with_capacity(capacity: usize) -> HeapResult<Self> {
    let overflow = HeapError::Overflow { requested: capacity };
    let size = align_size(capacity.max(ALIGNMENT)).ok_or(overflow)?;
    let layout = Layout::from_size_align(size, ALIGNMENT).map_err(|_| overflow)?;

    let base = NonNull::new(unsafe { std::alloc::alloc(layout) })
      .ok_or(HeapError::OutOfMemory { requested: size })?;

    Ok(Self {
      base,
      layout,
      used: 0,
    })
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  pub fn remaining(&self) -> usize {
    self.capacity() - self.used
  }
}

unsafe impl HeapSource for Arena {
  unsafe fn extend(
    &mut self,
    len: usize,
  ) -> HeapResult<NonNull<u8>> {
    let len = align_size(len)
      .filter(|&len| len <= self.remaining())
      .ok_or(HeapError::OutOfMemory { requested: len })?;

    let address = unsafe { self.base.add(self.used) };
    self.used += len;

    Ok(address)
  }

  unsafe fn reset(&mut self) {
    self.used = 0;
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    unsafe { std::alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}

impl std::fmt::Debug for Arena {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    f.debug_struct("Arena")
      .field("base", &self.base)
      .field("capacity", &self.capacity())
      .field("used", &self.used)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_arena_hands_out_consecutive_regions() {
    let mut arena = Arena::with_capacity(256).unwrap();

    unsafe {
      let first = arena.extend(64).unwrap();
      let second = arena.extend(64).unwrap();

      assert_eq!(first.as_ptr() as usize % ALIGNMENT, 0);
      assert_eq!(second.as_ptr() as usize, first.as_ptr() as usize + 64);
    }

    assert_eq!(arena.remaining(), 128);
  }

  #[test]
  fn test_arena_exhaustion_leaves_cursor() {
    let mut arena = Arena::with_capacity(128).unwrap();

    unsafe {
      arena.extend(100).unwrap();
      let err = arena.extend(64).unwrap_err();

      assert_eq!(err, HeapError::OutOfMemory { requested: 64 });
    }

    assert_eq!(arena.remaining(), 128 - align_size(100).unwrap());
  }

  #[test]
  fn test_arena_reset_rewinds() {
    let mut arena = Arena::with_capacity(128).unwrap();

    unsafe {
      let first = arena.extend(128).unwrap();
      assert!(arena.extend(8).is_err());

      arena.reset();
      let again = arena.extend(8).unwrap();

      assert_eq!(first, again);
    }
  }
}
