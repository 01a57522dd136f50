//! Insertion and the weight-balance rotation.

use crate::frame::{
    build_sidecar, data_len, init_file, join_values, uniquifier, FILE_HEADER_LEN,
};
use crate::header::{read_header_at, write_header, RecordHeader, HEADER_LEN};
use crate::locate::{locate_from, Located};
use crate::TreeError;
use log::trace;
use registry::DbFile;
use std::cmp::Ordering;

/// Appends a record built from the encoded `fields` and links it into the
/// tree. Returns the header of the new record, its `address` set.
///
/// `primary_len` is the byte length of the leading primary-key prefix
/// within the joined field text (0 when the schema has no primary fields).
pub fn post_record(
    file: &DbFile,
    fields: &[&str],
    primary_len: u64,
) -> Result<RecordHeader, TreeError> {
    if file.len()? < FILE_HEADER_LEN {
        init_file(file)?;
    }
    let file_len = data_len(file)?;

    // The joined values plus the uniquifier are the node's comparison key.
    let mut values = join_values(fields);
    values.push_str(&uniquifier(file_len));

    let parent = if file_len > 0 {
        Some(locate_from(file, FILE_HEADER_LEN, values.as_bytes(), false)?)
    } else {
        None
    };

    let side = build_sidecar(fields);
    values.push_str(";EOB");

    let mut header = RecordHeader {
        address: 0,
        top: parent.as_ref().map_or(0, |p| p.pos),
        lower: 0,
        higher: 0,
        num_records: 1,
        num_fields: fields.len() as u64,
        side_len: side.len() as u64,
        primary_len,
        buffer_len: values.len() as u64,
        status: 0,
    };

    let mut frame = Vec::with_capacity(HEADER_LEN + values.len() + side.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(values.as_bytes());
    frame.extend_from_slice(side.as_bytes());
    header.address = file.append(&frame)?;
    trace!("posted record at {}", header.address);

    if let Some(Located {
        pos,
        header: mut parent_header,
        ordering,
    }) = parent
    {
        match ordering {
            Ordering::Less => parent_header.higher = header.address,
            Ordering::Greater => parent_header.lower = header.address,
            // A tie would need two records with the same uniquifier, which
            // insertion offsets rule out; keep the lower slot deterministic.
            Ordering::Equal => parent_header.lower = header.address,
        }
        parent_header.num_records += 1;
        write_header(file, &parent_header)?;
        bubble_up(file, pos, parent_header)?;
    }

    Ok(header)
}

/// Walks from the new record's parent toward the root, incrementing subtree
/// counts and rotating where a child's weight leaves the 1/4..3/4 band.
fn bubble_up(
    file: &DbFile,
    mut prev_pos: u64,
    mut prev_header: RecordHeader,
) -> Result<(), TreeError> {
    loop {
        let cur_pos = prev_header.top;
        if cur_pos == 0 {
            return Ok(());
        }
        let mut cur_header = read_header_at(file, cur_pos)?;
        cur_header.num_records += 1;

        if cur_header.top == 0 {
            // The root takes its increment and ends the walk; it is never
            // rotated.
            write_header(file, &cur_header)?;
            return Ok(());
        }

        let prev_size = prev_header.num_records;
        let cur_size = cur_header.num_records;
        let prev_too_small = prev_size > 4 && prev_size * 4 < cur_size;
        let prev_too_big = cur_size > 4 && prev_size * 4 > cur_size * 3;

        if prev_too_small || prev_too_big {
            let (next_pos, next_header) =
                rotate(file, cur_pos, cur_header, prev_pos, &prev_header, prev_too_big)?;
            prev_pos = next_pos;
            prev_header = next_header;
        } else {
            write_header(file, &cur_header)?;
            prev_pos = cur_pos;
            prev_header = cur_header;
        }
    }
}

/// One zig rotation at `cur`.
///
/// `prev` is the child the walk came from. The pivot — `prev` itself when it
/// outweighs the 3/4 bound, its sibling when `prev` fell under 1/4 — moves
/// into `cur`'s place; `cur` descends to the vacated side and adopts the
/// pivot's inward subtree (`tmp`). The grandparent absorbs its count
/// increment here, and the walk resumes from it.
fn rotate(
    file: &DbFile,
    cur_pos: u64,
    mut cur: RecordHeader,
    prev_pos: u64,
    prev: &RecordHeader,
    prev_too_big: bool,
) -> Result<(u64, RecordHeader), TreeError> {
    let prev_is_higher = cur.higher == prev_pos;
    let other_pos = if prev_is_higher { cur.lower } else { cur.higher };
    let other = if other_pos != 0 {
        Some(read_header_at(file, other_pos)?)
    } else {
        None
    };
    let other_count = other.as_ref().map_or(0, |h| h.num_records);

    let (pivot_pos, mut pivot, kept_count) = if prev_too_big {
        (prev_pos, prev.clone(), other_count)
    } else {
        match other {
            Some(other) => (other_pos, other, prev.num_records),
            // An undersized child implies an oversized sibling; a missing
            // sibling would contradict the trigger. Treat it as a corrupt
            // count rather than rotating into nothing.
            None => return Err(TreeError::IllegalRecordHeader(cur_pos)),
        }
    };
    let pivot_is_higher = cur.higher == pivot_pos;

    let tmp_pos = if pivot_is_higher { pivot.lower } else { pivot.higher };
    let mut tmp = if tmp_pos != 0 {
        Some(read_header_at(file, tmp_pos)?)
    } else {
        None
    };
    let tmp_count = tmp.as_ref().map_or(0, |h| h.num_records);

    let root_pos = cur.top;
    let mut root = read_header_at(file, root_pos)?;

    trace!(
        "rotating at {cur_pos}: pivot {pivot_pos} ({}) of {}",
        pivot.num_records,
        cur.num_records
    );

    pivot.top = cur.top;
    if pivot_is_higher {
        pivot.lower = cur_pos;
        cur.higher = tmp_pos;
    } else {
        pivot.higher = cur_pos;
        cur.lower = tmp_pos;
    }

    // The pivot inherits cur's whole (already incremented) subtree; cur
    // keeps the sibling it did not lose plus the adopted inward subtree.
    let cur_size = cur.num_records;
    cur.top = pivot_pos;
    cur.num_records = tmp_count + kept_count + 1;
    pivot.num_records = cur_size;

    if let Some(tmp) = tmp.as_mut() {
        tmp.top = cur_pos;
    }

    if root.lower == cur_pos {
        root.lower = pivot_pos;
    } else {
        root.higher = pivot_pos;
    }
    root.num_records += 1;

    write_header(file, &cur)?;
    write_header(file, &pivot)?;
    if let Some(tmp) = &tmp {
        write_header(file, tmp)?;
    }
    write_header(file, &root)?;

    Ok((root_pos, root))
}
