//! # Rectree — a binary search tree embedded in an append-only file
//!
//! The engine stores records as frames laid out end-to-end behind a 16-byte
//! file header; a record's identity is its starting byte offset. Each frame
//! header encodes a node of an unbalanced-but-weight-corrected binary search
//! tree over the record's value text, so the file is simultaneously the heap
//! and the index.
//!
//! ## File Layout
//!
//! ```text
//! offset 0:   "0000000000000000"            16-byte file header (reserved)
//! offset 16:  first record frame            (the tree root, forever)
//! ...         further frames in insertion order
//! ```
//!
//! ## Record Frame
//!
//! ```text
//! [header: 142]  top;lower;higher;numRecords;numFields;sideLen;primaryLen;bufferLen (16-digit
//!                decimal each, ';'-separated) status(2) ";EOH"
//! [value block]  v0;v1;...;vN-1 <uniquifier: 16 hex> ";EOB"     bufferLen bytes
//! [sidecar]      len(v0);len(v1);...;len(vN-1) ";EOB"           sideLen bytes, 16-hex lengths
//! ```
//!
//! The uniquifier is the data-file length at insertion time, so two
//! logically equal rows still compare differently for tree placement; ties
//! therefore cannot occur. The sidecar lets a reader slice the value block
//! without scanning for separators.
//!
//! ## Tree maintenance
//!
//! Insertion appends the frame, links it under the locate endpoint and walks
//! the parent chain incrementing subtree counts. Whenever a child holds more
//! than 3/4 or less than 1/4 of its parent's subtree, a single zig rotation
//! promotes the heavy side; the result is a weight-balanced tree with a
//! worst-case 4:1 imbalance between siblings.
//!
//! Deletion only sets a status bit. The node keeps its place, its children
//! and its subtree count; cursors skip it. Removal would mean re-parenting
//! an arbitrary subtree inside an append-only file, so the space leak is
//! accepted.

use std::io;
use thiserror::Error;

mod cursor;
mod frame;
mod header;
mod insert;
mod locate;

pub use cursor::{Cursor, CursorMode};
pub use frame::{
    data_len, init_file, read_fields, read_value_block, verify_file_header, FILE_HEADER,
    FILE_HEADER_LEN,
};
pub use header::{read_header_at, write_header, RecordHeader, HEADER_LEN};
pub use insert::post_record;
pub use locate::{locate_value, Located};

/// Errors raised by the record-tree engine.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A header frame was short, failed the `;EOH` magic or did not parse.
    #[error("illegal record header at offset {0}")]
    IllegalRecordHeader(u64),

    /// A value or sidecar block was short or missed its `;EOB` trailer.
    #[error("illegal record length at offset {0}")]
    IllegalRecordLength(u64),

    /// A read buffer could not be allocated.
    #[error("out of memory allocating a record buffer")]
    OutOfMemory,

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests;
