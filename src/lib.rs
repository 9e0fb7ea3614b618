//! # firstfit - A First-Fit Heap Manager
//!
//! This crate provides a drop-in replacement for `malloc`, `calloc`,
//! `realloc` and `free`, built on a **first-fit** free list over memory
//! obtained with the `sbrk` system call.
//!
//! ## Overview
//!
//! Every region of the heap is a block: a small header followed by the
//! payload handed to the caller. Headers are linked in **address order**:
//!
//! ```text
//!   First-Fit Heap:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                           HEAP MEMORY                                │
//!   │                                                                      │
//!   │   ┌───┬──────┬───┬──────────┬───┬────┬───┬────────────┐              │
//!   │   │ H │ used │ H │   free   │ H │used│ H │    free    │              │
//!   │   └───┴──────┴───┴──────────┴───┴────┴───┴────────────┘              │
//!   │     │   ▲      │                │      │              ▲              │
//!   │     └───┼──────┴─── next ───────┴──────┘              │              │
//!   │         │                                          Program           │
//!   │   payload returned                                  Break            │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   allocate:  first free block large enough, from the lowest address,
//!              split when it is far too large; otherwise grow the heap.
//!   release:   flip the free flag, merge with free neighbours.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   firstfit
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── block      - Block header and all header/payload address math (internal)
//!   ├── list       - Address-ordered block list (internal)
//!   ├── source     - HeapSource trait, Sbrk and Arena
//!   ├── config     - Config
//!   ├── error      - HeapError
//!   ├── heap       - HeapManager
//!   └── ffi        - C ABI: firstfit_malloc & co, optional malloc override
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use firstfit::{Arena, Config, HeapManager};
//!
//! let mut heap = HeapManager::new(Arena::with_capacity(64 * 1024).unwrap(), Config::DEFAULT);
//!
//! unsafe {
//!     let first = heap.allocate(100);
//!     let second = heap.allocate(200);
//!     first.write_bytes(0xAB, 100);
//!
//!     heap.release(first);
//!
//!     // First fit: the freed block comes back before the heap grows.
//!     let third = heap.allocate(50);
//!     assert_eq!(third, first);
//!
//!     let grown = heap.resize(second, 4000);
//!     assert!(!grown.is_null());
//!     heap.release(grown);
//!     heap.release(third);
//! }
//! ```
//!
//! ## Splitting and Coalescing
//!
//! ```text
//!   split (block >= 2 * request and leftover >= 1024):
//!
//!   ┌───┬────────────────────────────────┐      ┌───┬────────┬───┬─────────────────┐
//!   │ H │            free 4096           │  ->  │ H │ used   │ H │    free 3960    │
//!   └───┴────────────────────────────────┘      └───┴────────┴───┴─────────────────┘
//!
//!   coalesce (neighbours in the list AND in memory):
//!
//!   ┌───┬────────┬───┬────────┐                 ┌───┬───────────────────────┐
//!   │ H │ free A │ H │ free B │       ->        │ H │  free A + H + B       │
//!   └───┴────────┴───┴────────┘                 └───┴───────────────────────┘
//! ```
//!
//! ## Accounting
//!
//! [`HeapManager::owned_bytes`] counts everything obtained from the source,
//! headers included. [`HeapManager::live_bytes`] counts used payloads plus
//! every header; the difference is exactly the free payload total, and a
//! scan is skipped when that total cannot cover a request.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **No shrinking**: Memory is never handed back to the OS
//! - **Word alignment only**: Payloads are aligned to `usize`, nothing more
//! - **Unix-only**: Requires `libc` and `sbrk` (POSIX systems)
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! All allocation and deallocation operations require `unsafe` blocks.

pub mod align;
mod block;
mod config;
mod error;
pub mod ffi;
mod heap;
mod list;
mod source;

pub use block::{ALIGNMENT, HEADER_SIZE};
pub use config::{Config, DEFAULT_SPLIT_THRESHOLD};
pub use error::{HeapError, HeapResult};
pub use heap::{BlockInfo, HeapManager};
pub use source::{Arena, HeapSource, Sbrk};
