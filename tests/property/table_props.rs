//! Handle-table properties checked against a naive free-set model.

use std::collections::BTreeSet;

use proptest::prelude::*;

use fdsim_rs::file::File;
use fdsim_rs::handles::{Fd, HandleTable, MAX_HANDLES};

#[derive(Clone, Debug)]
enum Op {
    Insert,
    Release(u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Insert),
        1 => (0u32..64).prop_map(Op::Release),
    ]
}

proptest! {
    #[test]
    fn allocation_is_smallest_free_and_live_count_is_exact(
        ops in proptest::collection::vec(op_strategy(), 0..128),
    ) {
        let mut table = HandleTable::new();
        let mut free: BTreeSet<u32> = (0..MAX_HANDLES as u32).collect();

        for op in ops {
            match op {
                Op::Insert => {
                    let expected = free.iter().next().copied();
                    match table.insert(File::socket()) {
                        Ok(fd) => {
                            prop_assert_eq!(Some(fd.raw()), expected);
                            free.remove(&fd.raw());
                        }
                        Err(_) => prop_assert_eq!(expected, None),
                    }
                }
                Op::Release(raw) => {
                    let fd = Fd::from_u32(raw);
                    let bound = !free.contains(&raw);
                    prop_assert_eq!(table.release(fd).is_ok(), bound);
                    if bound {
                        free.insert(raw);
                    }
                }
            }
            let live = MAX_HANDLES as u32 - free.len() as u32;
            prop_assert_eq!(table.live_handles(), live);
        }
    }
}
