//! The fixed-width textual record header.

use crate::TreeError;
use registry::DbFile;
use std::fmt::Write as _;
use std::io;

const INT_LEN: usize = 16;
const NUM_INT: usize = 8;
const STATUS_LEN: usize = 2;
const HEADER_MAGIC: &[u8; 4] = b";EOH";

/// Total header frame size: 8 integers with separators, 2-digit status and
/// the `;EOH` magic. 8*(16+1) + 2 + 1 + 3 = 142.
pub const HEADER_LEN: usize = NUM_INT * (INT_LEN + 1) + STATUS_LEN + 1 + 3;

const STATUS_DELETED: u32 = 1;
// Bit 1 is reserved for record locking.

/// One tree node as stored in a record frame.
///
/// `address` is the frame's own offset; it is derived when the header is
/// read and never persisted. Pointer fields hold absolute frame offsets,
/// with 0 meaning absent (offset 0 is the file header, never a record).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHeader {
    pub address: u64,
    pub top: u64,
    pub lower: u64,
    pub higher: u64,
    /// Number of records in this subtree, including this one and any
    /// tombstones.
    pub num_records: u64,
    pub num_fields: u64,
    /// Byte length of the length sidecar block.
    pub side_len: u64,
    /// Byte length of the primary-key prefix inside the value block.
    pub primary_len: u64,
    /// Byte length of the value block.
    pub buffer_len: u64,
    /// Bit 0: deleted. Bit 1: locked (reserved).
    pub status: u32,
}

impl RecordHeader {
    pub fn is_deleted(&self) -> bool {
        self.status & STATUS_DELETED != 0
    }

    pub fn set_deleted(&mut self) {
        self.status |= STATUS_DELETED;
    }

    pub fn clear_deleted(&mut self) {
        self.status &= !STATUS_DELETED;
    }

    /// Resets everything but the field count, the shape a record has before
    /// its first post.
    pub fn reset(&mut self) {
        let fields = self.num_fields;
        *self = RecordHeader::default();
        self.num_fields = fields;
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = String::with_capacity(HEADER_LEN);
        for v in [
            self.top,
            self.lower,
            self.higher,
            self.num_records,
            self.num_fields,
            self.side_len,
            self.primary_len,
            self.buffer_len,
        ] {
            let _ = write!(out, "{:016};", v);
        }
        let _ = write!(out, "{:02};EOH", self.status & 0x03);
        debug_assert_eq!(out.len(), HEADER_LEN);
        out.into_bytes()
    }

    fn decode(buf: &[u8], address: u64) -> Result<RecordHeader, TreeError> {
        let bad = || TreeError::IllegalRecordHeader(address);

        if buf.len() != HEADER_LEN || &buf[HEADER_LEN - 4..] != HEADER_MAGIC {
            return Err(bad());
        }

        let mut ints = [0u64; NUM_INT];
        for (i, slot) in ints.iter_mut().enumerate() {
            let start = i * (INT_LEN + 1);
            let text = std::str::from_utf8(&buf[start..start + INT_LEN]).map_err(|_| bad())?;
            *slot = text.parse().map_err(|_| bad())?;
            if buf[start + INT_LEN] != b';' {
                return Err(bad());
            }
        }

        let status_start = NUM_INT * (INT_LEN + 1);
        let status_text =
            std::str::from_utf8(&buf[status_start..status_start + STATUS_LEN]).map_err(|_| bad())?;
        let status = status_text.parse().map_err(|_| bad())?;

        Ok(RecordHeader {
            address,
            top: ints[0],
            lower: ints[1],
            higher: ints[2],
            num_records: ints[3],
            num_fields: ints[4],
            side_len: ints[5],
            primary_len: ints[6],
            buffer_len: ints[7],
            status,
        })
    }
}

/// Reads and decodes the header frame at `pos`.
pub fn read_header_at(file: &DbFile, pos: u64) -> Result<RecordHeader, TreeError> {
    let mut buf = [0u8; HEADER_LEN];
    file.read_exact_at(pos, &mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TreeError::IllegalRecordHeader(pos)
        } else {
            TreeError::Io(e)
        }
    })?;
    RecordHeader::decode(&buf, pos)
}

/// Writes the header frame back to its own address.
pub fn write_header(file: &DbFile, header: &RecordHeader) -> Result<(), TreeError> {
    file.write_all_at(header.address, &header.encode())?;
    Ok(())
}
