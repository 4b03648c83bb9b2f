use proptest::prelude::*;
use rheap::{BlockPtr, Heap, HeapConfig, ResizeError};

#[derive(Debug, Clone, Copy)]
enum Op {
  Allocate(usize),
  ZeroAllocate(usize),
  Release(usize),
  Resize(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![
    3 => (1_usize..512).prop_map(Op::Allocate),
    1 => (1_usize..512).prop_map(Op::ZeroAllocate),
    2 => any::<usize>().prop_map(Op::Release),
    2 => (any::<usize>(), 0_usize..768).prop_map(|(i, size)| Op::Resize(i, size)),
  ]
}

/// A live allocation and the byte it was filled with.
struct Live {
  ptr: BlockPtr,
  tag: u8,
}

fn fill(
  heap: &mut Heap,
  live: &Live,
) {
  heap.bytes_mut(live.ptr).unwrap().fill(live.tag);
}

fn prefix_is(
  heap: &Heap,
  ptr: BlockPtr,
  len: usize,
  tag: u8,
) -> bool {
  heap.bytes(ptr).unwrap()[..len].iter().all(|&b| b == tag)
}

fn check_disjoint(
  heap: &Heap,
  live: &[Live],
) -> Result<(), TestCaseError> {
  let mut ranges: Vec<_> = live
    .iter()
    .map(|l| (l.ptr.offset(), l.ptr.offset() + heap.capacity_of(l.ptr).unwrap()))
    .collect();
  ranges.sort_unstable();

  for pair in ranges.windows(2) {
    prop_assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
  }
  if let Some(last) = ranges.last() {
    prop_assert!(last.1 <= heap.frontier());
  }
  Ok(())
}

proptest! {
  #[test]
  fn random_workload_keeps_invariants(ops in proptest::collection::vec(op(), 1..120)) {
    let mut heap = Heap::with_config(HeapConfig::new().with_capacity(4096)).unwrap();
    let mut live: Vec<Live> = Vec::new();
    let mut next_tag = 1u8;

    for op in ops {
      let frontier = heap.frontier();

      match op {
        Op::Allocate(size) | Op::ZeroAllocate(size) => {
          let zeroed = matches!(op, Op::ZeroAllocate(_));
          let result = if zeroed { heap.zero_allocate(size) } else { heap.allocate(size) };

          if let Ok(ptr) = result {
            if zeroed {
              prop_assert!(prefix_is(&heap, ptr, size, 0));
            }
            let entry = Live { ptr, tag: next_tag };
            next_tag = next_tag.wrapping_add(1).max(1);
            fill(&mut heap, &entry);
            live.push(entry);
          } else {
            prop_assert_eq!(heap.frontier(), frontier);
          }
        }
        Op::Release(i) if !live.is_empty() => {
          let entry = live.swap_remove(i % live.len());
          heap.release(entry.ptr);
        }
        Op::Resize(i, size) if !live.is_empty() => {
          let index = i % live.len();
          let Live { ptr, tag } = live[index];
          let old_len = heap.bytes(ptr).unwrap().len();

          let ptr = match heap.resize(ptr, size) {
            Ok(ptr) => {
              prop_assert!(prefix_is(&heap, ptr, old_len.min(size), tag));
              ptr
            }
            Err(ResizeError::Unsatisfied { recovered, .. }) => {
              prop_assert!(prefix_is(&heap, recovered, old_len, tag));
              recovered
            }
            Err(err) => return Err(TestCaseError::fail(format!("unexpected: {err}"))),
          };

          live[index] = Live { ptr, tag };
          fill(&mut heap, &live[index]);
        }
        _ => {}
      }

      prop_assert!(heap.frontier() >= frontier);
      prop_assert_eq!(heap.stats().live_allocations, live.len());
      prop_assert!(heap.verify().is_ok(), "{:?}", heap.verify());
      check_disjoint(&heap, &live)?;
      for entry in &live {
        prop_assert!(prefix_is(&heap, entry.ptr, heap.bytes(entry.ptr).unwrap().len(), entry.tag));
      }
    }

    for entry in live {
      heap.release(entry.ptr);
    }
    prop_assert_eq!(heap.stats().allocated_blocks, 0);
    prop_assert!(heap.verify().is_ok());
  }

  #[test]
  fn release_all_coalesces_into_one_block(sizes in proptest::collection::vec(1_usize..256, 1..16), seed in any::<u64>()) {
    let mut heap = Heap::new();
    let mut ptrs: Vec<BlockPtr> = sizes.iter().map(|&size| heap.allocate(size).unwrap()).collect();
    let frontier = heap.frontier();

    // Release in a scrambled order.
    let len = ptrs.len();
    for i in 0..len {
      ptrs.swap(i, (seed as usize).wrapping_add(i * 7) % len);
    }
    for ptr in ptrs {
      heap.release(ptr);
    }

    let stats = heap.stats();
    prop_assert_eq!(stats.free_blocks, 1);
    prop_assert_eq!(stats.free_bytes + rheap::HEADER_SIZE, frontier);
    prop_assert!(heap.verify().is_ok());
  }
}
