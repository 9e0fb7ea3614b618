use thiserror::Error;

/// Result of a checked heap operation
pub type HeapResult<T> = Result<T, HeapError>;

/// Heap manager errors
///
/// None of these leave partial state behind: an operation that fails has not
/// touched the block list or the counters.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
  #[error("Out of memory: heap source refused to grow by {requested} bytes")]
  OutOfMemory { requested: usize },

  #[error("Size overflow: a request of {requested} bytes cannot be represented")]
  Overflow { requested: usize },

  #[error("Invalid pointer: 0x{address:x} was not handed out by this heap")]
  InvalidPointer { address: usize },

  #[error("Block at 0x{address:x} is not allocated")]
  NotAllocated { address: usize },
}
