//! Block headers and every piece of address arithmetic the heap performs.
//!
//! ```text
//!   ┌──────────────────────┬──────────────────────────┬──────────────── ...
//!   │ Block                │ payload (size bytes)     │ next Block
//!   │ size | canary | free │                          │
//!   │ next | prev          │                          │
//!   └──────────────────────┴──────────────────────────┴──────────────── ...
//!   ▲                      ▲                          ▲
//!   BlockPtr::addr()       BlockPtr::payload()        BlockPtr::end()
//! ```
//!
//! Nothing outside this module offsets a pointer by a header or a size.

use std::{mem, ptr::NonNull};

/// Written into every live header, cleared when the header is absorbed by a
/// neighbour. A pointer whose header does not carry it was never handed out.
const CANARY: u32 = 0x0B10_CF17;

/// Bytes taken by a header in front of every payload.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

/// Alignment of headers, and therefore of every payload and block size.
pub const ALIGNMENT: usize = mem::align_of::<Block>();

#[repr(C)]
pub struct Block {
  size: usize,
  canary: u32,
  is_free: bool,
  next: Option<BlockPtr>,
  prev: Option<BlockPtr>,
}

/// Handle to a header living inside memory obtained from a heap source.
///
/// Accessors are `unsafe`: the caller promises the handle still names an
/// intact header that no other reference is touching.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockPtr(NonNull<Block>);

impl BlockPtr {
  /// Writes a fresh, unlinked header at `addr`.
  ///
  /// # Safety
  ///
  /// `addr` must be header-aligned and own at least `HEADER_SIZE + size`
  /// writable bytes.
  pub unsafe fn init(
    addr: NonNull<u8>,
    size: usize,
    is_free: bool,
  ) -> Self {
    let block = addr.cast::<Block>();
    unsafe {
      block.as_ptr().write(Block {
        size,
        canary: CANARY,
        is_free,
        next: None,
        prev: None,
      });
    }
    Self(block)
  }

  /// Recovers the header sitting right before `payload`.
  ///
  /// # Safety
  ///
  /// `payload` must be at least `HEADER_SIZE` bytes past the start of a
  /// region owned by the heap. The header is not validated, see
  /// [`BlockPtr::is_intact`].
  pub unsafe fn from_payload(payload: NonNull<u8>) -> Self {
    Self(unsafe { payload.sub(HEADER_SIZE) }.cast())
  }

  pub fn addr(self) -> usize {
    self.0.as_ptr() as usize
  }

  pub fn payload(self) -> NonNull<u8> {
    // A header is never the last byte of an allocation, so stepping over it
    // stays in bounds.
    unsafe { self.0.cast::<u8>().add(HEADER_SIZE) }
  }

  /// First address past this block's payload.
  pub unsafe fn end(self) -> usize {
    self.payload().as_ptr() as usize + unsafe { self.size() }
  }

  pub unsafe fn size(self) -> usize {
    unsafe { (*self.0.as_ptr()).size }
  }

  pub unsafe fn set_size(
    self,
    size: usize,
  ) {
    unsafe { (*self.0.as_ptr()).size = size }
  }

  pub unsafe fn is_free(self) -> bool {
    unsafe { (*self.0.as_ptr()).is_free }
  }

  pub unsafe fn set_free(
    self,
    is_free: bool,
  ) {
    unsafe { (*self.0.as_ptr()).is_free = is_free }
  }

  pub unsafe fn next(self) -> Option<BlockPtr> {
    unsafe { (*self.0.as_ptr()).next }
  }

  pub unsafe fn set_next(
    self,
    next: Option<BlockPtr>,
  ) {
    unsafe { (*self.0.as_ptr()).next = next }
  }

  pub unsafe fn prev(self) -> Option<BlockPtr> {
    unsafe { (*self.0.as_ptr()).prev }
  }

  pub unsafe fn set_prev(
    self,
    prev: Option<BlockPtr>,
  ) {
    unsafe { (*self.0.as_ptr()).prev = prev }
  }

  pub unsafe fn is_intact(self) -> bool {
    unsafe { (*self.0.as_ptr()).canary == CANARY }
  }

  /// Marks the header as dead once its bytes belong to a neighbour.
  pub unsafe fn retire(self) {
    unsafe { (*self.0.as_ptr()).canary = 0 }
  }

  /// True when `next` starts exactly where this payload ends.
  pub unsafe fn touches(
    self,
    next: BlockPtr,
  ) -> bool {
    unsafe { self.end() == next.addr() }
  }

  /// Shrinks this block to `size` bytes and writes a free, unlinked header
  /// for the remainder right after the shortened payload.
  ///
  /// # Safety
  ///
  /// `size` must be aligned and `size + HEADER_SIZE` must be smaller than the
  /// current size.
  pub unsafe fn carve(
    self,
    size: usize,
  ) -> BlockPtr {
    unsafe {
      let remainder = self.size() - size - HEADER_SIZE;
      let tail = BlockPtr::init(self.payload().add(size), remainder, true);
      self.set_size(size);
      tail
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[repr(C, align(16))]
  struct Backing([u8; 512]);

  fn backing() -> Box<Backing> {
    Box::new(Backing([0xAA; 512]))
  }

  #[test]
  fn test_header_is_word_aligned() {
    assert_eq!(HEADER_SIZE % ALIGNMENT, 0);
    assert_eq!(ALIGNMENT, mem::size_of::<usize>());
  }

  #[test]
  fn test_payload_round_trip() {
    let mut memory = backing();
    let base = NonNull::from(&mut memory.0).cast::<u8>();

    unsafe {
      let block = BlockPtr::init(base, 128, false);

      assert_eq!(block.addr(), base.as_ptr() as usize);
      assert_eq!(block.payload().as_ptr() as usize, block.addr() + HEADER_SIZE);
      assert_eq!(block.end(), block.addr() + HEADER_SIZE + 128);
      assert_eq!(BlockPtr::from_payload(block.payload()), block);
      assert!(block.is_intact());
      assert!(!block.is_free());
    }
  }

  #[test]
  fn test_carve_writes_adjacent_tail() {
    let mut memory = backing();
    let base = NonNull::from(&mut memory.0).cast::<u8>();

    unsafe {
      let block = BlockPtr::init(base, 512 - HEADER_SIZE, true);
      let tail = block.carve(64);

      assert_eq!(block.size(), 64);
      assert!(block.touches(tail));
      assert!(tail.is_free());
      assert_eq!(tail.size(), 512 - 64 - 2 * HEADER_SIZE);
      assert_eq!(tail.end(), base.as_ptr() as usize + 512);
      assert_eq!(tail.next(), None);
      assert_eq!(tail.prev(), None);
    }
  }

  #[test]
  fn test_retire_clears_canary() {
    let mut memory = backing();
    let base = NonNull::from(&mut memory.0).cast::<u8>();

    unsafe {
      let block = BlockPtr::init(base, 32, true);
      block.retire();

      assert!(!block.is_intact());
    }
  }
}
