//! Value block and sidecar handling.

use crate::header::{RecordHeader, HEADER_LEN};
use crate::TreeError;
use registry::DbFile;
use std::io;

/// The reserved 16-byte literal at offset 0 of every data file. Its content
/// is never interpreted.
pub const FILE_HEADER: &[u8; 16] = b"0000000000000000";

/// Byte length of the file header.
pub const FILE_HEADER_LEN: u64 = FILE_HEADER.len() as u64;

pub(crate) const BLOCK_MAGIC: &[u8; 4] = b";EOB";

/// Writes the file header at offset 0.
pub fn init_file(file: &DbFile) -> Result<(), TreeError> {
    file.write_all_at(0, FILE_HEADER)?;
    Ok(())
}

/// Number of record bytes beyond the file header.
pub fn data_len(file: &DbFile) -> Result<u64, TreeError> {
    Ok(file.len()?.saturating_sub(FILE_HEADER_LEN))
}

/// Rejects a non-empty file whose first 16 bytes are not the reserved
/// header literal.
pub fn verify_file_header(file: &DbFile) -> Result<(), TreeError> {
    if file.len()? == 0 {
        return Ok(());
    }
    let mut buf = [0u8; FILE_HEADER.len()];
    file.read_exact_at(0, &mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TreeError::IllegalRecordHeader(0)
        } else {
            TreeError::Io(e)
        }
    })?;
    if &buf != FILE_HEADER {
        return Err(TreeError::IllegalRecordHeader(0));
    }
    Ok(())
}

/// Allocates a read buffer, surfacing allocation failure instead of
/// aborting.
fn alloc_buffer(len: usize) -> Result<Vec<u8>, TreeError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| TreeError::OutOfMemory)?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Reads `len` bytes of a record's value region starting right after the
/// header at `pos`. Full (non-primary) reads must end with the `;EOB`
/// trailer; prefix reads are unchecked.
pub(crate) fn read_buffer(
    file: &DbFile,
    pos: u64,
    len: u64,
    primary: bool,
) -> Result<Vec<u8>, TreeError> {
    let len = usize::try_from(len).map_err(|_| TreeError::IllegalRecordLength(pos))?;
    let mut buf = alloc_buffer(len)?;
    file.read_exact_at(pos + HEADER_LEN as u64, &mut buf)
        .map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                TreeError::IllegalRecordLength(pos)
            } else {
                TreeError::Io(e)
            }
        })?;
    if !primary && (len < BLOCK_MAGIC.len() || &buf[len - 4..] != BLOCK_MAGIC) {
        return Err(TreeError::IllegalRecordLength(pos));
    }
    Ok(buf)
}

/// Reads the complete value block of the record described by `header`.
pub fn read_value_block(file: &DbFile, header: &RecordHeader) -> Result<Vec<u8>, TreeError> {
    read_buffer(file, header.address, header.buffer_len, false)
}

/// Reads and splits a record frame into its per-field texts.
///
/// The sidecar drives the split, so field values may contain the `;`
/// separator without ambiguity. The trailing uniquifier is not a field and
/// is skipped.
pub fn read_fields(file: &DbFile, header: &RecordHeader) -> Result<Vec<String>, TreeError> {
    let block = read_value_block(file, header)?;
    let side_pos = header.address + header.buffer_len;
    let side = read_buffer(file, side_pos, header.side_len, false)?;
    let bad = || TreeError::IllegalRecordLength(header.address);

    let lengths = &side[..side.len() - BLOCK_MAGIC.len()];
    let mut entries = lengths.split(|&b| b == b';');

    let num_fields = usize::try_from(header.num_fields).map_err(|_| bad())?;
    let mut fields = Vec::with_capacity(num_fields);
    let mut offset = 0usize;
    for _ in 0..num_fields {
        let text = entries.next().ok_or_else(bad)?;
        let text = std::str::from_utf8(text).map_err(|_| bad())?;
        let len = usize::try_from(u64::from_str_radix(text, 16).map_err(|_| bad())?)
            .map_err(|_| bad())?;
        let end = offset.checked_add(len).ok_or_else(bad)?;
        if end > block.len() {
            return Err(bad());
        }
        fields.push(String::from_utf8_lossy(&block[offset..end]).into_owned());
        offset = end + 1;
    }

    Ok(fields)
}

/// Joins encoded field texts into the stored value text (without
/// uniquifier and trailer).
pub(crate) fn join_values(fields: &[&str]) -> String {
    fields.join(";")
}

/// Formats a sidecar body for the given field texts, `;EOB` included.
pub(crate) fn build_sidecar(fields: &[&str]) -> String {
    let mut side = String::with_capacity(fields.len() * 17 + 4);
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            side.push(';');
        }
        side.push_str(&format!("{:016X}", field.len()));
    }
    side.push_str(";EOB");
    side
}

/// The 16-hex uniquifier for a record inserted while the data area holds
/// `data_len` bytes.
pub(crate) fn uniquifier(data_len: u64) -> String {
    format!("{:016X}", data_len)
}
