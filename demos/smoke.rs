use rheap::{BlockPtr, Heap};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Logs where a block landed and how far the frontier has moved.
fn report(
  heap: &Heap,
  label: &str,
  ptr: BlockPtr,
) {
  info!(
    label,
    offset = ptr.offset(),
    capacity = ?heap.capacity_of(ptr),
    frontier = heap.frontier(),
    "allocated"
  );
}

fn main() {
  // RUST_LOG=rheap=debug shows splits and merges as they happen.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let mut heap = Heap::new();

  // --------------------------------------------------------------------
  // 1) Four blocks bumped off the frontier, back to back.
  // --------------------------------------------------------------------
  let text = heap.allocate(32).expect("arena has room for text");
  report(&heap, "text", text);
  let numbers = heap
    .allocate(10 * size_of::<i32>())
    .expect("arena has room for numbers");
  report(&heap, "numbers", numbers);
  let second = heap.allocate(32).expect("arena has room");
  let third = heap.allocate(32).expect("arena has room");

  // --------------------------------------------------------------------
  // 2) Free the last three. The second and third releases merge with the
  //    free block on their left, leaving one free block behind `text`.
  // --------------------------------------------------------------------
  heap.release(numbers);
  heap.release(second);
  heap.release(third);
  info!(stats = ?heap.stats(), "released three blocks");

  // --------------------------------------------------------------------
  // 3) Reuse: the merged block is split for the first request.
  // --------------------------------------------------------------------
  let wide = heap.allocate(64).expect("merged block fits 64 bytes");
  report(&heap, "wide", wide);
  let zeroed = heap.zero_allocate(100).expect("arena has room for 100 bytes");
  report(&heap, "zeroed", zeroed);

  // --------------------------------------------------------------------
  // 4) Grow `text`; its contents move along.
  // --------------------------------------------------------------------
  let greeting = b"hello\n";
  heap.bytes_mut(text).expect("text is live")[..greeting.len()].copy_from_slice(greeting);
  let text = heap.resize(text, 72).expect("arena has room for 72 bytes");
  report(&heap, "text", text);

  heap.release(wide);
  heap.release(zeroed);

  let bytes = heap.bytes(text).expect("text is live");
  let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
  println!("{}", String::from_utf8_lossy(&bytes[..end]));

  heap.release(text);
  info!(stats = ?heap.stats(), "done");
}
