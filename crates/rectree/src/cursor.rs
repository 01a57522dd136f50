//! In-order traversal over the embedded tree.

use crate::frame::{data_len, read_value_block, FILE_HEADER_LEN};
use crate::header::{read_header_at, write_header, RecordHeader};
use crate::insert::post_record;
use crate::TreeError;
use registry::DbFile;

/// What the cursor currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// A fresh record being composed; all fields null, no on-disk address.
    Insert,
    /// A stored record with local modifications.
    Update,
    /// A stored record.
    Browse,
    /// Walked past the last record.
    Eof,
    /// Walked before the first record.
    Bof,
}

/// The engine's only piece of between-call state: a position, the header
/// read there and the traversal mode. Everything else lives in the file.
///
/// `pos` goes to 0 at either end of the walk while `header` keeps the last
/// node read, which is what lets a follow-up step in the other direction
/// resume from the right place.
#[derive(Debug)]
pub struct Cursor {
    pub mode: CursorMode,
    pos: u64,
    pub header: RecordHeader,
}

impl Cursor {
    /// A cursor in insert mode over a schema of `num_fields` fields.
    #[must_use]
    pub fn new(num_fields: u64) -> Self {
        Cursor {
            mode: CursorMode::Insert,
            pos: 0,
            header: RecordHeader {
                num_fields,
                ..RecordHeader::default()
            },
        }
    }

    pub fn eof(&self) -> bool {
        self.mode == CursorMode::Eof
    }

    pub fn bof(&self) -> bool {
        self.mode == CursorMode::Bof
    }

    /// The current record's frame offset, 0 when there is none.
    pub fn position(&self) -> u64 {
        self.header.address
    }

    /// Rebinds the cursor to a schema of `num_fields` fields and enters
    /// insert mode.
    pub fn rebind(&mut self, num_fields: u64) {
        self.header = RecordHeader {
            num_fields,
            ..RecordHeader::default()
        };
        self.pos = 0;
        self.mode = CursorMode::Insert;
    }

    /// Enters insert mode, dropping any current position.
    pub fn set_insert_mode(&mut self) {
        if self.mode != CursorMode::Insert {
            self.header.reset();
            self.pos = 0;
            self.mode = CursorMode::Insert;
        }
    }

    /// Posts the composed record and leaves the cursor on it.
    pub fn post(
        &mut self,
        file: &DbFile,
        fields: &[&str],
        primary_len: u64,
    ) -> Result<(), TreeError> {
        self.header = post_record(file, fields, primary_len)?;
        self.pos = self.header.address;
        self.mode = CursorMode::Browse;
        Ok(())
    }

    /// Tombstones the current record.
    ///
    /// Without `no_move` the cursor steps to the next live record, falling
    /// back to the previous one, and to Eof/Bof when none remain. With
    /// `no_move` the record object stays current — the deleted bit is
    /// cleared in memory so a follow-up post writes a clean status — which
    /// is how an update replaces a row.
    pub fn delete(&mut self, file: &DbFile, no_move: bool) -> Result<(), TreeError> {
        self.header.set_deleted();
        write_header(file, &self.header)?;
        if no_move {
            self.header.clear_deleted();
        } else {
            self.step_next(file)?;
            if self.mode == CursorMode::Eof {
                // No live successor: land on the last live record instead.
                self.last(file, b"")?;
            }
        }
        Ok(())
    }

    /// Positions on the root frame without touching the walk state beyond
    /// the header. An empty file reports Eof.
    pub fn root(&mut self, file: &DbFile) -> Result<(), TreeError> {
        if data_len(file)? == 0 {
            self.mode = CursorMode::Eof;
            return Ok(());
        }
        self.pos = FILE_HEADER_LEN;
        self.header = read_header_at(file, self.pos)?;
        Ok(())
    }

    /// Moves to the first live record whose value block starts with
    /// `filter` (any record when `filter` is empty).
    pub fn first(&mut self, file: &DbFile, filter: &[u8]) -> Result<(), TreeError> {
        if data_len(file)? == 0 {
            self.mode = CursorMode::Eof;
            return Ok(());
        }
        self.pos = FILE_HEADER_LEN;
        loop {
            self.header = read_header_at(file, self.pos)?;
            if self.header.lower != 0 {
                self.pos = self.header.lower;
            } else if !self.header.is_deleted() {
                self.mode = CursorMode::Browse;
                self.settle(file, filter, true)?;
                return Ok(());
            } else {
                self.step_next(file)?;
                self.settle(file, filter, true)?;
                return Ok(());
            }
        }
    }

    /// Moves to the last live record matching `filter`.
    pub fn last(&mut self, file: &DbFile, filter: &[u8]) -> Result<(), TreeError> {
        if data_len(file)? == 0 {
            self.mode = CursorMode::Bof;
            return Ok(());
        }
        self.pos = FILE_HEADER_LEN;
        loop {
            self.header = read_header_at(file, self.pos)?;
            if self.header.higher != 0 {
                self.pos = self.header.higher;
            } else if !self.header.is_deleted() {
                self.mode = CursorMode::Browse;
                self.settle(file, filter, false)?;
                return Ok(());
            } else {
                self.step_prev(file)?;
                self.settle(file, filter, false)?;
                return Ok(());
            }
        }
    }

    /// Moves to the next live record matching `filter`.
    pub fn next(&mut self, file: &DbFile, filter: &[u8]) -> Result<(), TreeError> {
        self.step_next(file)?;
        self.settle(file, filter, true)
    }

    /// Moves to the previous live record matching `filter`.
    pub fn prev(&mut self, file: &DbFile, filter: &[u8]) -> Result<(), TreeError> {
        self.step_prev(file)?;
        self.settle(file, filter, false)
    }

    /// Loads the record frame at `pos` directly, as cursor redirection over
    /// an index does.
    pub fn read_at(&mut self, file: &DbFile, pos: u64) -> Result<(), TreeError> {
        self.header = read_header_at(file, pos)?;
        self.pos = pos;
        self.mode = CursorMode::Browse;
        Ok(())
    }

    /// One in-order step forward, skipping tombstones, ignoring filters.
    fn step_next(&mut self, file: &DbFile) -> Result<(), TreeError> {
        loop {
            let mut found = false;

            if self.header.higher != 0 {
                // Down into the higher subtree, then all the way left.
                self.pos = self.header.higher;
                self.header = read_header_at(file, self.pos)?;
                while self.header.lower != 0 {
                    self.pos = self.header.lower;
                    self.header = read_header_at(file, self.pos)?;
                }
                found = true;
            } else {
                // Up while we are the higher child; the first parent
                // reached from the lower side is the successor.
                loop {
                    let old = self.pos;
                    self.pos = self.header.top;
                    if self.pos == 0 {
                        break;
                    }
                    self.header = read_header_at(file, self.pos)?;
                    if self.header.higher == old {
                        continue;
                    }
                    found = true;
                    break;
                }
            }

            if self.pos == 0 {
                self.mode = CursorMode::Eof;
                return Ok(());
            }
            if found && !self.header.is_deleted() {
                self.mode = CursorMode::Browse;
                return Ok(());
            }
        }
    }

    /// One in-order step backward; the mirror image.
    fn step_prev(&mut self, file: &DbFile) -> Result<(), TreeError> {
        loop {
            let mut found = false;

            if self.header.lower != 0 {
                self.pos = self.header.lower;
                self.header = read_header_at(file, self.pos)?;
                while self.header.higher != 0 {
                    self.pos = self.header.higher;
                    self.header = read_header_at(file, self.pos)?;
                }
                found = true;
            } else {
                loop {
                    let old = self.pos;
                    self.pos = self.header.top;
                    if self.pos == 0 {
                        break;
                    }
                    self.header = read_header_at(file, self.pos)?;
                    if self.header.lower == old {
                        continue;
                    }
                    found = true;
                    break;
                }
            }

            if self.pos == 0 {
                self.mode = CursorMode::Bof;
                return Ok(());
            }
            if found && !self.header.is_deleted() {
                self.mode = CursorMode::Browse;
                return Ok(());
            }
        }
    }

    /// Steps past records whose value block does not start with `filter`.
    fn settle(&mut self, file: &DbFile, filter: &[u8], forward: bool) -> Result<(), TreeError> {
        if filter.is_empty() {
            return Ok(());
        }
        while self.mode == CursorMode::Browse {
            let block = read_value_block(file, &self.header)?;
            if block.starts_with(filter) {
                break;
            }
            if forward {
                self.step_next(file)?;
            } else {
                self.step_prev(file)?;
            }
        }
        Ok(())
    }
}
