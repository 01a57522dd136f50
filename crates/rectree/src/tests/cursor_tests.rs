use super::helpers::{key, open_temp_file};
use crate::{init_file, post_record, read_fields, Cursor, CursorMode};
use anyhow::Result;
use registry::DbFileHandle;

fn post_key(file: &DbFileHandle, k: &str) -> Result<()> {
    post_record(file, &[k], k.len() as u64)?;
    Ok(())
}

fn collect_forward(file: &DbFileHandle, filter: &[u8]) -> Result<Vec<String>> {
    let mut cursor = Cursor::new(1);
    let mut out = Vec::new();
    cursor.first(file, filter)?;
    while cursor.mode == CursorMode::Browse {
        out.push(read_fields(file, &cursor.header)?.remove(0));
        cursor.next(file, filter)?;
    }
    Ok(out)
}

fn collect_backward(file: &DbFileHandle, filter: &[u8]) -> Result<Vec<String>> {
    let mut cursor = Cursor::new(1);
    let mut out = Vec::new();
    cursor.last(file, filter)?;
    while cursor.mode == CursorMode::Browse {
        out.push(read_fields(file, &cursor.header)?.remove(0));
        cursor.prev(file, filter)?;
    }
    Ok(out)
}

// --------------------- empty file ---------------------

#[test]
fn empty_file_is_eof_and_bof() -> Result<()> {
    let (_dir, file) = open_temp_file("empty.data");
    init_file(&file)?;

    let mut cursor = Cursor::new(1);
    cursor.first(&file, b"")?;
    assert!(cursor.eof());

    cursor.last(&file, b"")?;
    assert!(cursor.bof());
    Ok(())
}

// --------------------- plain walks ---------------------

#[test]
fn forward_walk_visits_records_in_order() -> Result<()> {
    let (_dir, file) = open_temp_file("walk.data");
    init_file(&file)?;

    for n in [5, 2, 9, 1, 7, 3, 8, 4, 6] {
        post_key(&file, &key(n))?;
    }

    let expected: Vec<String> = (1..=9).map(key).collect();
    assert_eq!(collect_forward(&file, b"")?, expected);
    Ok(())
}

#[test]
fn backward_walk_is_the_mirror() -> Result<()> {
    let (_dir, file) = open_temp_file("walkback.data");
    init_file(&file)?;

    for n in 1..=50 {
        post_key(&file, &key(n))?;
    }

    let expected: Vec<String> = (1..=50).rev().map(key).collect();
    assert_eq!(collect_backward(&file, b"")?, expected);
    Ok(())
}

#[test]
fn long_ordered_walk_after_rotations() -> Result<()> {
    let (_dir, file) = open_temp_file("long.data");
    init_file(&file)?;

    for n in 1..=800 {
        post_key(&file, &key(n))?;
    }

    let expected: Vec<String> = (1..=800).map(key).collect();
    assert_eq!(collect_forward(&file, b"")?, expected);
    Ok(())
}

// --------------------- tombstone skipping ---------------------

#[test]
fn walk_skips_tombstones() -> Result<()> {
    let (_dir, file) = open_temp_file("skip.data");
    init_file(&file)?;

    for n in 1..=6 {
        post_key(&file, &key(n))?;
    }

    // Delete 2 and 5.
    let mut cursor = Cursor::new(1);
    cursor.first(&file, b"")?;
    cursor.next(&file, b"")?;
    cursor.delete(&file, false)?;
    cursor.next(&file, b"")?;
    cursor.next(&file, b"")?;
    cursor.delete(&file, false)?;

    let expected: Vec<String> = [1, 3, 4, 6].into_iter().map(key).collect();
    assert_eq!(collect_forward(&file, b"")?, expected);
    assert_eq!(
        collect_backward(&file, b"")?,
        expected.iter().rev().cloned().collect::<Vec<_>>()
    );
    Ok(())
}

#[test]
fn first_skips_a_deleted_leftmost_record() -> Result<()> {
    let (_dir, file) = open_temp_file("delfirst.data");
    init_file(&file)?;

    for n in 1..=4 {
        post_key(&file, &key(n))?;
    }
    let mut cursor = Cursor::new(1);
    cursor.first(&file, b"")?;
    cursor.delete(&file, false)?;

    cursor.first(&file, b"")?;
    assert_eq!(read_fields(&file, &cursor.header)?[0], key(2));
    Ok(())
}

#[test]
fn deleting_every_record_ends_the_walk() -> Result<()> {
    let (_dir, file) = open_temp_file("drain.data");
    init_file(&file)?;

    for n in 1..=10 {
        post_key(&file, &key(n))?;
    }

    let mut cursor = Cursor::new(1);
    cursor.first(&file, b"")?;
    while cursor.mode == CursorMode::Browse {
        cursor.delete(&file, false)?;
    }

    cursor.first(&file, b"")?;
    assert!(cursor.eof());
    Ok(())
}

#[test]
fn delete_falls_back_to_the_previous_record_at_the_end() -> Result<()> {
    let (_dir, file) = open_temp_file("delend.data");
    init_file(&file)?;

    for n in 1..=3 {
        post_key(&file, &key(n))?;
    }
    let mut cursor = Cursor::new(1);
    cursor.last(&file, b"")?;
    cursor.delete(&file, false)?;

    assert_eq!(cursor.mode, CursorMode::Browse);
    assert_eq!(read_fields(&file, &cursor.header)?[0], key(2));
    Ok(())
}

// --------------------- prefix filter ---------------------

#[test]
fn filter_restricts_the_walk_to_a_prefix() -> Result<()> {
    let (_dir, file) = open_temp_file("prefix.data");
    init_file(&file)?;

    for k in ["AA01", "AB01", "AA02", "AC01", "AA03", "AB02"] {
        post_key(&file, k)?;
    }

    assert_eq!(collect_forward(&file, b"AA")?, ["AA01", "AA02", "AA03"]);
    assert_eq!(collect_forward(&file, b"AB")?, ["AB01", "AB02"]);
    assert_eq!(collect_backward(&file, b"AB")?, ["AB02", "AB01"]);
    assert!(collect_forward(&file, b"ZZ")?.is_empty());
    Ok(())
}

#[test]
fn filter_applies_to_first_and_last_landings() -> Result<()> {
    let (_dir, file) = open_temp_file("prefix2.data");
    init_file(&file)?;

    for k in ["AA01", "BB01", "CC01"] {
        post_key(&file, k)?;
    }

    let mut cursor = Cursor::new(1);
    cursor.first(&file, b"BB")?;
    assert_eq!(read_fields(&file, &cursor.header)?[0], "BB01");

    cursor.last(&file, b"BB")?;
    assert_eq!(read_fields(&file, &cursor.header)?[0], "BB01");
    Ok(())
}

// --------------------- multi-field frames ---------------------

#[test]
fn fields_round_trip_through_the_sidecar() -> Result<()> {
    let (_dir, file) = open_temp_file("fields.data");
    init_file(&file)?;

    let fields = ["alpha", "", "with;separator", "omega"];
    post_record(&file, &fields, 5)?;

    let mut cursor = Cursor::new(fields.len() as u64);
    cursor.first(&file, b"")?;
    let back = read_fields(&file, &cursor.header)?;
    assert_eq!(back, fields);
    Ok(())
}

#[test]
fn read_at_loads_a_frame_by_offset() -> Result<()> {
    let (_dir, file) = open_temp_file("byoffset.data");
    init_file(&file)?;

    post_key(&file, &key(1))?;
    let second = post_record(&file, &[&key(2)], 8)?;

    let mut cursor = Cursor::new(1);
    cursor.read_at(&file, second.address)?;
    assert_eq!(read_fields(&file, &cursor.header)?[0], key(2));
    assert_eq!(cursor.position(), second.address);
    Ok(())
}
