use std::io::Read;

use firstfit::{Config, HeapManager, Sbrk};
use libc::sbrk;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `gdb`, or just visually track how the program break moves.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_blocks(heap: &HeapManager<Sbrk>) {
  println!("    live = {} bytes, owned = {} bytes", heap.live_bytes(), heap.owned_bytes());
  for block in heap.blocks() {
    println!(
      "    {:#x}  {:>6} bytes  {}",
      block.address,
      block.size,
      if block.is_free { "free" } else { "used" }
    );
  }
}

fn main() {
  // RUST_LOG=trace shows every growth, split and merge.
  env_logger::init();

  let mut heap = HeapManager::sbrk(Config::DEFAULT);

  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Two allocations grow the heap twice.
    // --------------------------------------------------------------------
    let first = heap.allocate(100);
    let second = heap.allocate(200);
    println!("\n[1] allocate(100) = {:?}, allocate(200) = {:?}", first, second);
    print_program_break("after two allocations");
    print_blocks(&heap);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Releasing the first block and asking for less reuses it.
    // --------------------------------------------------------------------
    heap.release(first);
    let third = heap.allocate(50);
    println!("\n[2] release(first); allocate(50) = {:?}", third);
    println!("[2] reused first block? {}", if third == first { "Yes" } else { "No" });
    print_blocks(&heap);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) A large block, released and partly reused, gets split.
    // --------------------------------------------------------------------
    let big = heap.allocate(64 * 1024);
    let _guard = heap.allocate(8);
    heap.release(big);
    let front = heap.allocate(1000);
    println!("\n[3] allocate(64 KiB), release, allocate(1000) = {:?}", front);
    print_blocks(&heap);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Growing a block keeps its contents.
    // --------------------------------------------------------------------
    front.write_bytes(0xAB, 1000);
    let grown = heap.resize(front, 8000);
    println!("\n[4] resize(front, 8000) = {:?}, first byte = {:#x}", grown, grown.read());
    print_blocks(&heap);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Zero-filled arrays.
    // --------------------------------------------------------------------
    let zeroed = heap.array_allocate(16, 4);
    let all_zero = std::slice::from_raw_parts(zeroed, 64).iter().all(|&byte| byte == 0);
    println!("\n[5] array_allocate(16, 4) = {:?}, all zero? {}", zeroed, all_zero);

    heap.release(zeroed);
    heap.release(grown);
    heap.release(second);
    heap.release(third);
    print_blocks(&heap);
    print_program_break("end");

    println!("\n[6] End of example. The break never moves back; the OS reclaims it at exit.");
  }
}
