//! C ABI over one process-wide, `sbrk`-backed heap.
//!
//! The heap has no lock. Callers from more than one thread corrupt it.

use std::cell::UnsafeCell;

use libc::{c_void, size_t};

use crate::{config::Config, heap::HeapManager, source::Sbrk};

struct GlobalHeap(UnsafeCell<HeapManager<Sbrk>>);

// Single-threaded use only, see the module docs.
unsafe impl Sync for GlobalHeap {}

// A logger that allocates would re-enter the heap mid-operation.
static HEAP: GlobalHeap = GlobalHeap(UnsafeCell::new(HeapManager::sbrk(Config::quiet())));

unsafe fn heap() -> &'static mut HeapManager<Sbrk> {
  unsafe { &mut *HEAP.0.get() }
}

/// `malloc(3)`: null for a zero size or when the break cannot move.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn firstfit_malloc(size: size_t) -> *mut c_void {
  unsafe { heap().allocate(size).cast() }
}

/// `calloc(3)`: zero-filled, null when `count * size` overflows.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn firstfit_calloc(
  count: size_t,
  size: size_t,
) -> *mut c_void {
  unsafe { heap().array_allocate(count, size).cast() }
}

/// `realloc(3)`: on failure the original block is left untouched.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn firstfit_realloc(
  ptr: *mut c_void,
  size: size_t,
) -> *mut c_void {
  unsafe { heap().resize(ptr.cast(), size).cast() }
}

/// `free(3)`: null, already released and unknown pointers are ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn firstfit_free(ptr: *mut c_void) {
  unsafe { heap().release(ptr.cast()) }
}

#[cfg(feature = "malloc-override")]
mod override_symbols {
  use libc::{c_void, size_t};

  #[unsafe(no_mangle)]
  pub unsafe extern "C" fn malloc(size: size_t) -> *mut c_void {
    unsafe { super::firstfit_malloc(size) }
  }

  #[unsafe(no_mangle)]
  pub unsafe extern "C" fn calloc(
    count: size_t,
    size: size_t,
  ) -> *mut c_void {
    unsafe { super::firstfit_calloc(count, size) }
  }

  #[unsafe(no_mangle)]
  pub unsafe extern "C" fn realloc(
    ptr: *mut c_void,
    size: size_t,
  ) -> *mut c_void {
    unsafe { super::firstfit_realloc(ptr, size) }
  }

  #[unsafe(no_mangle)]
  pub unsafe extern "C" fn free(ptr: *mut c_void) {
    unsafe { super::firstfit_free(ptr) }
  }
}
