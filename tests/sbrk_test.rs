/*!
 * Program Break Tests
 * The sbrk-backed manager and the C ABI built on it
 */

use firstfit::ffi::{firstfit_calloc, firstfit_free, firstfit_malloc, firstfit_realloc};
use firstfit::{ALIGNMENT, Config, HeapManager};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::ptr;

#[test]
#[serial]
fn test_sbrk_heap_grows_and_reuses() {
  let mut heap = HeapManager::sbrk(Config::quiet());

  unsafe {
    let first = heap.allocate(128);
    assert!(!first.is_null());
    assert_eq!(first as usize % ALIGNMENT, 0);
    first.write_bytes(0x11, 128);

    let second = heap.allocate(256);
    assert!(!second.is_null());
    second.write_bytes(0x22, 256);
    assert_eq!(first.read(), 0x11);

    heap.release(first);
    assert_eq!(heap.allocate(64), first);
  }

  assert!(heap.owned_bytes() >= 128 + 256);
}

#[test]
#[serial]
fn test_sbrk_heap_moves_break() {
  let mut heap = HeapManager::sbrk(Config::quiet());

  unsafe {
    let before = libc::sbrk(0) as usize;
    let block = heap.allocate(64 * 1024);
    let after = libc::sbrk(0) as usize;

    assert!(!block.is_null());
    assert!(after >= before + 64 * 1024);
    assert!(block as usize >= before);
  }
}

#[test]
#[serial]
fn test_c_abi_round_trip() {
  unsafe {
    assert!(firstfit_malloc(0).is_null());

    let bytes = firstfit_malloc(32).cast::<u8>();
    assert!(!bytes.is_null());
    for i in 0..32 {
      bytes.add(i).write(i as u8);
    }

    let grown = firstfit_realloc(bytes.cast(), 4096).cast::<u8>();
    assert!(!grown.is_null());
    for i in 0..32 {
      assert_eq!(grown.add(i).read(), i as u8);
    }

    let zeroed = firstfit_calloc(16, 16).cast::<u8>();
    assert!(!zeroed.is_null());
    assert!(std::slice::from_raw_parts(zeroed, 256).iter().all(|&byte| byte == 0));
    assert!(firstfit_calloc(usize::MAX, 16).is_null());

    assert!(firstfit_realloc(grown.cast(), 0).is_null());
    firstfit_free(zeroed.cast());
    firstfit_free(zeroed.cast());
    firstfit_free(ptr::null_mut());
  }
}
