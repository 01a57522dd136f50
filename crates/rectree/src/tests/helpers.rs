use crate::{read_header_at, read_value_block, FILE_HEADER, FILE_HEADER_LEN};
use registry::{open_table_file, DbFileHandle};
use tempfile::TempDir;

/// Opens a fresh data file in its own temp directory.
pub fn open_temp_file(name: &str) -> (TempDir, DbFileHandle) {
    let dir = tempfile::tempdir().expect("tempdir");
    let handle = open_table_file(&dir.path().join(name)).expect("open");
    (dir, handle)
}

/// A single-field key that sorts in numeric order as text.
pub fn key(n: u64) -> String {
    format!("{:08}", n)
}

/// Walks the whole tree verifying the structural invariants:
/// parent/child linkage, strict value order, subtree counts and — when
/// `check_balance` is set — the 4:1 weight bound at internal nodes.
///
/// Returns the total node count (tombstones included).
pub fn check_tree(file: &DbFileHandle, check_balance: bool) -> u64 {
    let mut head = [0u8; 16];
    file.read_exact_at(0, &mut head).expect("file header");
    assert_eq!(&head, FILE_HEADER, "file header literal");

    if crate::data_len(file).expect("len") == 0 {
        return 0;
    }
    let root = read_header_at(file, FILE_HEADER_LEN).expect("root");
    assert_eq!(root.top, 0, "root has no parent");
    let (count, _, _) = check_subtree(file, FILE_HEADER_LEN, check_balance);
    assert_eq!(root.num_records, count, "root count covers the tree");
    count
}

fn check_subtree(
    file: &DbFileHandle,
    pos: u64,
    check_balance: bool,
) -> (u64, Vec<u8>, Vec<u8>) {
    let header = read_header_at(file, pos).expect("header");
    let block = read_value_block(file, &header).expect("block");
    assert!(block.ends_with(b";EOB"), "value block magic at {pos}");

    let mut count = 1;
    let mut min = block.clone();
    let mut max = block.clone();

    for (child_pos, is_lower) in [(header.lower, true), (header.higher, false)] {
        if child_pos == 0 {
            continue;
        }
        let child = read_header_at(file, child_pos).expect("child header");
        assert_eq!(child.top, pos, "child {child_pos} links back to {pos}");

        let (child_count, child_min, child_max) = check_subtree(file, child_pos, check_balance);
        count += child_count;
        if is_lower {
            assert!(child_max < block, "left subtree below {pos} out of order");
            min = child_min;
        } else {
            assert!(child_min > block, "right subtree below {pos} out of order");
            max = child_max;
        }

        if check_balance && header.top != 0 {
            // Rebalancing only inspects the insertion path, so the sibling
            // of the walked child can drift a few counts past the exact
            // 1/4..3/4 band before an insert through it snaps it back.
            let total = count_of(file, pos);
            assert!(
                !(child_count > 4 && child_count * 4 + 8 < total),
                "child {child_pos} far under a quarter of {pos}"
            );
            assert!(
                !(total > 4 && child_count * 4 > total * 3 + 8),
                "child {child_pos} far over three quarters of {pos}"
            );
        }
    }

    let header = read_header_at(file, pos).expect("header");
    assert_eq!(header.num_records, count, "subtree count at {pos}");

    (count, min, max)
}

fn count_of(file: &DbFileHandle, pos: u64) -> u64 {
    read_header_at(file, pos).expect("header").num_records
}
