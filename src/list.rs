//! Intrusive doubly linked list of block headers, kept in address order.

use crate::block::{BlockPtr, HEADER_SIZE};

pub struct BlockList {
  head: Option<BlockPtr>,
  tail: Option<BlockPtr>,
}

impl BlockList {
  pub const fn new() -> Self {
    Self {
      head: None,
      tail: None,
    }
  }

  /// Links `block` at its address position. The heap only grows upward, so
  /// this is the tail in practice; the walk handles any other source.
  pub unsafe fn insert(
    &mut self,
    block: BlockPtr,
  ) {
    unsafe {
      match self.tail {
        None => {
          block.set_prev(None);
          block.set_next(None);
          self.head = Some(block);
          self.tail = Some(block);
        }
        Some(tail) if tail.addr() < block.addr() => self.insert_after(tail, block),
        Some(_) => {
          let mut current = self.head;
          while let Some(node) = current {
            if node.addr() > block.addr() {
              self.insert_before(node, block);
              return;
            }
            current = node.next();
          }
        }
      }
    }
  }

  pub unsafe fn insert_after(
    &mut self,
    anchor: BlockPtr,
    block: BlockPtr,
  ) {
    unsafe {
      let next = anchor.next();
      block.set_prev(Some(anchor));
      block.set_next(next);
      match next {
        Some(next) => next.set_prev(Some(block)),
        None => self.tail = Some(block),
      }
      anchor.set_next(Some(block));
    }
  }

  unsafe fn insert_before(
    &mut self,
    anchor: BlockPtr,
    block: BlockPtr,
  ) {
    unsafe {
      let prev = anchor.prev();
      block.set_prev(prev);
      block.set_next(Some(anchor));
      match prev {
        Some(prev) => prev.set_next(Some(block)),
        None => self.head = Some(block),
      }
      anchor.set_prev(Some(block));
    }
  }

  pub unsafe fn unlink(
    &mut self,
    block: BlockPtr,
  ) {
    unsafe {
      let prev = block.prev();
      let next = block.next();
      match prev {
        Some(prev) => prev.set_next(next),
        None => self.head = next,
      }
      match next {
        Some(next) => next.set_prev(prev),
        None => self.tail = prev,
      }
      block.set_prev(None);
      block.set_next(None);
    }
  }

  /// Whether `payload` could be the payload address of some block, judging
  /// only by the span between the first header and the end of the last
  /// payload.
  pub unsafe fn spans(
    &self,
    payload: usize,
  ) -> bool {
    match (self.head, self.tail) {
      (Some(head), Some(tail)) => {
        payload >= head.addr() + HEADER_SIZE && payload < unsafe { tail.end() }
      }
      _ => false,
    }
  }

  pub unsafe fn contains(
    &self,
    block: BlockPtr,
  ) -> bool {
    self.iter().any(|node| node == block)
  }

  pub fn iter(&self) -> Iter {
    Iter { current: self.head }
  }
}

pub struct Iter {
  current: Option<BlockPtr>,
}

impl Iterator for Iter {
  type Item = BlockPtr;

  fn next(&mut self) -> Option<BlockPtr> {
    let node = self.current?;
    // Links are only ever rewritten through the owning list.
    self.current = unsafe { node.next() };
    Some(node)
  }
}
