use std::ptr::{self, NonNull};

use log::{debug, trace, warn};

use crate::{
  align::align_size,
  block::{ALIGNMENT, BlockPtr, HEADER_SIZE},
  config::Config,
  error::{HeapError, HeapResult},
  list::BlockList,
  source::{HeapSource, Sbrk},
};

/// A block as seen from outside the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Payload address, as handed to callers.
  pub address: usize,
  pub size: usize,
  pub is_free: bool,
}

/// First-fit heap over an address-ordered list of headers.
///
/// Counters are kept so that at every point
///
/// ```text
///   owned_bytes = Σ size(every block)  + HEADER_SIZE * blocks
///   live_bytes  = Σ size(used blocks)  + HEADER_SIZE * blocks
/// ```
///
/// which makes `owned_bytes - live_bytes` the exact number of free payload
/// bytes.
pub struct HeapManager<S: HeapSource = Sbrk> {
  source: S,
  config: Config,
  blocks: BlockList,
  live_bytes: usize,
  owned_bytes: usize,
}

impl HeapManager<Sbrk> {
  pub const fn sbrk(config: Config) -> Self {
    Self::new(Sbrk, config)
  }
}

impl<S: HeapSource> HeapManager<S> {
  pub const fn new(
    source: S,
    config: Config,
  ) -> Self {
    Self {
      source,
      config,
      blocks: BlockList::new(),
      live_bytes: 0,
      owned_bytes: 0,
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// Bytes charged to callers, headers included.
  pub fn live_bytes(&self) -> usize {
    self.live_bytes
  }

  /// Bytes obtained from the heap source, headers included.
  pub fn owned_bytes(&self) -> usize {
    self.owned_bytes
  }

  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.blocks.iter().map(|block| unsafe {
      BlockInfo {
        address: block.payload().as_ptr() as usize,
        size: block.size(),
        is_free: block.is_free(),
      }
    })
  }

  /// Drops every block and zeroes the counters.
  ///
  /// # Safety
  ///
  /// Every pointer handed out so far becomes dangling.
  pub unsafe fn reset(&mut self) {
    self.blocks = BlockList::new();
    self.live_bytes = 0;
    self.owned_bytes = 0;
    unsafe { self.source.reset() };
  }

  /// Allocates at least `size` bytes. `Ok(None)` for a zero-sized request.
  ///
  /// # Safety
  ///
  /// The heap's headers must not have been overwritten through earlier
  /// allocations.
  pub unsafe fn try_allocate(
    &mut self,
    size: usize,
  ) -> HeapResult<Option<NonNull<u8>>> {
    if size == 0 {
      return Ok(None);
    }
    let size = align_size(size).ok_or(HeapError::Overflow { requested: size })?;

    unsafe {
      if let Some(block) = self.find_free_block(size) {
        if self.should_split(block, size) {
          self.split_mem(block, size);
        }

        block.set_free(false);
        self.live_bytes += block.size();

        if self.config.log_events {
          debug!("reused block {:#x} ({} bytes) for {} bytes", block.addr(), block.size(), size);
        }

        return Ok(Some(block.payload()));
      }

      self.grow(size).map(|block| Some(block.payload()))
    }
  }

  /// Allocates `count * size` bytes, all zero.
  pub unsafe fn try_array_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> HeapResult<Option<NonNull<u8>>> {
    let total = count.checked_mul(size).ok_or(HeapError::Overflow { requested: usize::MAX })?;

    unsafe {
      let payload = self.try_allocate(total)?;
      if let Some(payload) = payload {
        ptr::write_bytes(payload.as_ptr(), 0, total);
      }
      Ok(payload)
    }
  }

  /// Returns a block to the heap and merges it with free address neighbours.
  ///
  /// # Safety
  ///
  /// `payload` must be `None` or a pointer obtained from this heap. Pointers
  /// are checked, but a forged pointer into the middle of a payload can
  /// still pass when its bytes happen to look like a header.
  pub unsafe fn try_release(
    &mut self,
    payload: Option<NonNull<u8>>,
  ) -> HeapResult<()> {
    let Some(payload) = payload else {
      return Ok(());
    };

    unsafe {
      let block = self.resolve_allocated(payload)?;

      block.set_free(true);
      self.live_bytes -= block.size();

      let block = self.coalesce_prev(block);
      self.coalesce_next(block);
    }

    Ok(())
  }

  /// Grows or keeps the block behind `payload` so it holds `new_size` bytes.
  ///
  /// A zero `new_size` releases `payload` (checked first, so a null pointer
  /// with zero size is a no-op) and a null `payload` allocates.
  ///
  /// # Safety
  ///
  /// Same contract as [`HeapManager::try_release`].
  pub unsafe fn try_resize(
    &mut self,
    payload: Option<NonNull<u8>>,
    new_size: usize,
  ) -> HeapResult<Option<NonNull<u8>>> {
    unsafe {
      if new_size == 0 {
        self.try_release(payload)?;
        return Ok(None);
      }

      let Some(payload) = payload else {
        return self.try_allocate(new_size);
      };

      let block = self.resolve_allocated(payload)?;
      let wanted = align_size(new_size).ok_or(HeapError::Overflow { requested: new_size })?;
      let old_size = block.size();

      if old_size >= wanted {
        return Ok(Some(payload));
      }

      if let Some(prev) = block.prev() {
        if prev.is_free() && prev.touches(block) && old_size + prev.size() + HEADER_SIZE >= wanted {
          return Ok(Some(self.absorb_prev(block, prev)));
        }
      }

      let Some(moved) = self.try_allocate(wanted)? else {
        return Ok(None);
      };
      ptr::copy_nonoverlapping(payload.as_ptr(), moved.as_ptr(), old_size);
      self.try_release(Some(payload))?;

      Ok(Some(moved))
    }
  }

  /// Pointer-level [`HeapManager::try_allocate`]: null on zero size or error.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    let result = unsafe { self.try_allocate(size) };
    self.to_raw(result)
  }

  pub unsafe fn array_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    let result = unsafe { self.try_array_allocate(count, size) };
    self.to_raw(result)
  }

  pub unsafe fn resize(
    &mut self,
    address: *mut u8,
    new_size: usize,
  ) -> *mut u8 {
    let result = unsafe { self.try_resize(NonNull::new(address), new_size) };
    self.to_raw(result)
  }

  /// Pointer-level [`HeapManager::try_release`]; releasing a released or
  /// unknown pointer does nothing.
  pub unsafe fn release(
    &mut self,
    address: *mut u8,
  ) {
    if let Err(err) = unsafe { self.try_release(NonNull::new(address)) } {
      self.report(&err);
    }
  }

  fn to_raw(
    &self,
    result: HeapResult<Option<NonNull<u8>>>,
  ) -> *mut u8 {
    match result {
      Ok(payload) => payload.map_or(ptr::null_mut(), NonNull::as_ptr),
      Err(err) => {
        self.report(&err);
        ptr::null_mut()
      }
    }
  }

  fn report(
    &self,
    err: &HeapError,
  ) {
    if self.config.log_events {
      warn!("{}", err);
    }
  }

  unsafe fn find_free_block(
    &self,
    size: usize,
  ) -> Option<BlockPtr> {
    if self.config.slack_gate && self.owned_bytes - self.live_bytes < size {
      return None;
    }

    unsafe { self.blocks.iter().find(|&block| block.is_free() && block.size() >= size) }
  }

  unsafe fn should_split(
    &self,
    block: BlockPtr,
    size: usize,
  ) -> bool {
    let available = unsafe { block.size() };
    size.checked_mul(2).is_some_and(|double| available >= double)
      && available - size >= self.config.effective_split_threshold()
  }

  /// Obtains `HEADER_SIZE + size` bytes from the source as a new used block.
  unsafe fn grow(
    &mut self,
    size: usize,
  ) -> HeapResult<BlockPtr> {
    let total = size.checked_add(HEADER_SIZE).ok_or(HeapError::Overflow { requested: size })?;

    unsafe {
      let address = self.source.extend(total)?;
      let block = BlockPtr::init(address, size, false);
      self.blocks.insert(block);

      self.owned_bytes += total;
      self.live_bytes += total;

      if self.config.log_events {
        trace!("grew heap by {} bytes at {:#x}", total, block.addr());
      }

      Ok(block)
    }
  }

  /// Cuts `block` down to `size` bytes; the remainder becomes a free block
  /// linked right after it.
  unsafe fn split_mem(
    &mut self,
    block: BlockPtr,
    size: usize,
  ) {
    unsafe {
      let tail = block.carve(size);
      self.blocks.insert_after(block, tail);
      self.live_bytes += HEADER_SIZE;

      if self.config.log_events {
        trace!("split block {:#x}: kept {} bytes, {} bytes free at {:#x}", block.addr(), size, tail.size(), tail.addr());
      }
    }
  }

  /// Folds free `block` into its free lower neighbour. Returns the survivor.
  unsafe fn coalesce_prev(
    &mut self,
    block: BlockPtr,
  ) -> BlockPtr {
    unsafe {
      match block.prev() {
        Some(prev) if prev.is_free() && prev.touches(block) => {
          self.merge(prev, block);
          prev
        }
        _ => block,
      }
    }
  }

  /// Folds the free upper neighbour into free `block`.
  unsafe fn coalesce_next(
    &mut self,
    block: BlockPtr,
  ) {
    unsafe {
      if let Some(next) = block.next() {
        if next.is_free() && block.touches(next) {
          self.merge(block, next);
        }
      }
    }
  }

  unsafe fn merge(
    &mut self,
    lower: BlockPtr,
    upper: BlockPtr,
  ) {
    unsafe {
      let absorbed = upper.size();
      self.blocks.unlink(upper);
      upper.retire();

      lower.set_size(lower.size() + absorbed + HEADER_SIZE);
      self.live_bytes -= HEADER_SIZE;

      if self.config.log_events {
        trace!("merged block {:#x} into {:#x} ({} bytes)", upper.addr(), lower.addr(), lower.size());
      }
    }
  }

  /// Grows used `block` downward over its free lower neighbour and moves the
  /// payload bytes to the neighbour's payload address.
  unsafe fn absorb_prev(
    &mut self,
    block: BlockPtr,
    prev: BlockPtr,
  ) -> NonNull<u8> {
    unsafe {
      let kept = block.size();
      let gained = prev.size();
      let source = block.payload();

      // The old header is about to be overwritten by the moved bytes; finish
      // with it first.
      self.blocks.unlink(block);
      block.retire();

      ptr::copy(source.as_ptr(), prev.payload().as_ptr(), kept);

      prev.set_size(gained + HEADER_SIZE + kept);
      prev.set_free(false);
      self.live_bytes += gained;

      if self.config.log_events {
        trace!("resized {:#x} in place over free {:#x} ({} bytes)", block.addr(), prev.addr(), prev.size());
      }

      prev.payload()
    }
  }

  /// Maps a caller pointer back to its header, refusing anything the heap
  /// cannot vouch for and blocks that are already free.
  unsafe fn resolve_allocated(
    &self,
    payload: NonNull<u8>,
  ) -> HeapResult<BlockPtr> {
    let address = payload.as_ptr() as usize;
    let invalid = HeapError::InvalidPointer { address };

    unsafe {
      if address % ALIGNMENT != 0 || !self.blocks.spans(address) {
        return Err(invalid);
      }

      let block = BlockPtr::from_payload(payload);
      if !block.is_intact() {
        return Err(invalid);
      }
      if self.config.verify_ownership && !self.blocks.contains(block) {
        return Err(invalid);
      }
      if block.is_free() {
        return Err(HeapError::NotAllocated { address });
      }

      Ok(block)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::Arena;

  fn heap(capacity: usize) -> HeapManager<Arena> {
    HeapManager::new(Arena::with_capacity(capacity).unwrap(), Config::quiet())
  }

  fn layout(heap: &HeapManager<Arena>) -> Vec<(usize, bool)> {
    heap.blocks().map(|block| (block.size, block.is_free)).collect()
  }

  #[test]
  fn test_grow_charges_header_to_both_counters() {
    let mut heap = heap(4096);

    unsafe {
      let first = heap.allocate(100);
      assert!(!first.is_null());
    }

    assert_eq!(heap.owned_bytes(), 104 + HEADER_SIZE);
    assert_eq!(heap.live_bytes(), 104 + HEADER_SIZE);
    assert_eq!(layout(&heap), vec![(104, false)]);
  }

  #[test]
  fn test_split_keeps_front_and_frees_tail() {
    let mut heap = heap(8192);

    unsafe {
      let big = heap.allocate(4096);
      heap.release(big);

      let small = heap.allocate(100);

      assert_eq!(small, big);
      assert_eq!(layout(&heap), vec![(104, false), (4096 - 104 - HEADER_SIZE, true)]);
      assert_eq!(heap.live_bytes(), 104 + 2 * HEADER_SIZE);
      assert_eq!(heap.owned_bytes(), 4096 + HEADER_SIZE);
    }
  }

  #[test]
  fn test_no_split_below_threshold() {
    let mut heap = heap(8192);

    unsafe {
      // 2000 covers twice 504 and leaves 1496: enough for the default
      // threshold, not for 2048.
      let mut strict = HeapManager::new(Arena::with_capacity(8192).unwrap(), Config::quiet().with_split_threshold(2048));
      let block = strict.allocate(2000);
      strict.release(block);
      strict.allocate(500);
      assert_eq!(strict.blocks().count(), 1);

      let block = heap.allocate(2000);
      heap.release(block);
      heap.allocate(500);
      assert_eq!(heap.blocks().count(), 2);
    }
  }

  #[test]
  fn test_absorb_prev_moves_bytes() {
    let mut heap = heap(4096);

    unsafe {
      let below = heap.allocate(256);
      let data = heap.allocate(64);
      let _guard = heap.allocate(8);

      for i in 0..64 {
        data.add(i).write(i as u8);
      }
      heap.release(below);

      let owned = heap.owned_bytes();
      let resized = heap.resize(data, 200);

      assert_eq!(resized, below);
      for i in 0..64 {
        assert_eq!(resized.add(i).read(), i as u8);
      }
      assert_eq!(heap.owned_bytes(), owned);
      assert_eq!(layout(&heap), vec![(256 + HEADER_SIZE + 64, false), (8, false)]);
      assert_eq!(heap.live_bytes(), 256 + HEADER_SIZE + 64 + 8 + 2 * HEADER_SIZE);
    }
  }

  #[test]
  fn test_slack_gate_skips_hopeless_scan() {
    let mut heap = heap(4096);

    unsafe {
      let first = heap.allocate(64);
      heap.release(first);

      assert!(heap.find_free_block(128).is_none());
      assert_eq!(heap.find_free_block(64).map(|block| block.payload().as_ptr()), Some(first));
    }
  }

  #[test]
  fn test_resolve_rejects_foreign_pointers() {
    let mut heap = heap(4096);
    let mut local = [0usize; 4];

    unsafe {
      let first = heap.allocate(64);
      let foreign = NonNull::new(local.as_mut_ptr().cast::<u8>()).unwrap();

      assert_eq!(
        heap.resolve_allocated(foreign).unwrap_err(),
        HeapError::InvalidPointer { address: foreign.as_ptr() as usize }
      );

      let misaligned = NonNull::new(first.add(1)).unwrap();
      assert!(matches!(heap.resolve_allocated(misaligned), Err(HeapError::InvalidPointer { .. })));
    }
  }
}
