//! Tree search over stored value text.

use crate::frame::{data_len, read_buffer, FILE_HEADER_LEN};
use crate::header::{read_header_at, RecordHeader};
use crate::TreeError;
use registry::DbFile;
use std::cmp::Ordering;

/// Result of a tree search.
///
/// `pos == 0` means the file holds no records, or — for a primary search
/// that ended on a tombstone — that no live record carries the key.
#[derive(Debug)]
pub struct Located {
    pub pos: u64,
    pub header: RecordHeader,
    /// How the stored text at the endpoint compared to the search text:
    /// `Less` means the stored text sorts below it.
    pub ordering: Ordering,
}

/// Searches the tree from the root.
///
/// With `primary` set, only the `primary_len` prefix of each visited value
/// block is compared; otherwise the whole block is, so the uniquifier (and
/// trailer) breaks ties between logically equal rows.
pub fn locate_value(file: &DbFile, search: &[u8], primary: bool) -> Result<Located, TreeError> {
    if data_len(file)? == 0 {
        return Ok(Located {
            pos: 0,
            header: RecordHeader::default(),
            ordering: Ordering::Equal,
        });
    }
    locate_from(file, FILE_HEADER_LEN, search, primary)
}

pub(crate) fn locate_from(
    file: &DbFile,
    start: u64,
    search: &[u8],
    primary: bool,
) -> Result<Located, TreeError> {
    let mut pos = start;
    loop {
        let header = read_header_at(file, pos)?;
        let len = if primary { header.primary_len } else { header.buffer_len };
        let stored = read_buffer(file, pos, len, primary)?;
        let ordering = stored.as_slice().cmp(search);

        if primary && ordering == Ordering::Equal && header.is_deleted() {
            // The same key may live on in either subtree of a tombstone: the
            // records below it were placed while it still counted as a match.
            // Prefer a live hit from the higher side, then fall through to
            // the lower side whatever it yields.
            if header.higher != 0 {
                let found = locate_from(file, header.higher, search, primary)?;
                if found.ordering == Ordering::Equal && found.pos != 0 {
                    return Ok(found);
                }
            }
            if header.lower != 0 {
                return locate_from(file, header.lower, search, primary);
            }
            return Ok(Located {
                pos: 0,
                header,
                ordering,
            });
        } else if ordering == Ordering::Less && header.higher != 0 {
            pos = header.higher;
        } else if ordering == Ordering::Greater && header.lower != 0 {
            pos = header.lower;
        } else {
            return Ok(Located {
                pos,
                header,
                ordering,
            });
        }
    }
}
