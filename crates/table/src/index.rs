//! One record-tree file plus its field schema.

use crate::TableError;
use codec::{FieldDefinition, FieldDefinitions, FieldType, FieldValue};
use log::trace;
use rectree::{Cursor, CursorMode, RecordHeader};
use registry::DbFileHandle;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// A named, ordered projection of records in one data file.
///
/// The index owns its file handle, its schema and the single current
/// record: a cursor plus one [`FieldValue`] per field. Cursor movements
/// load the landed record into the field values; posts compose the field
/// values into a new record frame.
#[derive(Debug)]
pub struct Index {
    data_path: PathBuf,
    file: DbFileHandle,
    defs: FieldDefinitions,
    values: Vec<FieldValue>,
    cursor: Cursor,
    drop_after_close: bool,
}

impl Index {
    /// Opens (or creates) the data file at `data_path` with an empty
    /// schema. The schema arrives through [`add_field`](Index::add_field)
    /// or [`open`](Index::open).
    pub fn open_path(data_path: PathBuf) -> Result<Index, TableError> {
        let file = registry::open_table_file(&data_path)?;
        Ok(Index {
            data_path,
            file,
            defs: Vec::new(),
            values: Vec::new(),
            cursor: Cursor::new(0),
            drop_after_close: false,
        })
    }

    /// Writes the reserved file header, making the file a valid empty
    /// tree.
    pub fn create(&self) -> Result<(), TableError> {
        rectree::init_file(&self.file)?;
        Ok(())
    }

    /// Drops every record and re-initializes the file in place.
    pub fn truncate(&mut self) -> Result<(), TableError> {
        self.file.truncate()?;
        rectree::init_file(&self.file)?;
        self.cursor.rebind(self.defs.len() as u64);
        Ok(())
    }

    /// Adopts `defs` as the schema, validates the file header and
    /// positions on the first record.
    pub fn open(&mut self, defs: FieldDefinitions) -> Result<(), TableError> {
        rectree::verify_file_header(&self.file)?;
        self.values = defs.iter().map(|d| FieldValue::new(d.clone())).collect();
        self.defs = defs;
        self.cursor.rebind(self.defs.len() as u64);
        self.first_record("")?;
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn definitions(&self) -> &FieldDefinitions {
        &self.defs
    }

    pub fn num_fields(&self) -> usize {
        self.defs.len()
    }

    pub fn mode(&self) -> CursorMode {
        self.cursor.mode
    }

    pub fn eof(&self) -> bool {
        self.cursor.eof()
    }

    pub fn bof(&self) -> bool {
        self.cursor.bof()
    }

    /// The current record's frame offset; 0 while composing an insert.
    pub fn current_position(&self) -> u64 {
        self.cursor.position()
    }

    /// The current record's header.
    pub fn header(&self) -> &RecordHeader {
        &self.cursor.header
    }

    pub(crate) fn set_eof(&mut self) {
        self.cursor.mode = CursorMode::Eof;
    }

    pub(crate) fn set_bof(&mut self) {
        self.cursor.mode = CursorMode::Bof;
    }

    /// Unlinks the data file when this index is dropped.
    pub fn drop_data_file(&mut self) {
        self.drop_after_close = true;
    }

    /// Total number of records in the file, tombstones included.
    pub fn num_records(&self) -> Result<u64, TableError> {
        if rectree::data_len(&self.file)? == 0 {
            return Ok(0);
        }
        Ok(rectree::read_header_at(&self.file, rectree::FILE_HEADER_LEN)?.num_records)
    }

    /// Index of the field named `name`, compared case-insensitively.
    pub fn find_field(&self, name: &str) -> Option<usize> {
        self.defs
            .iter()
            .position(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Appends a field to the schema and resets the current record.
    ///
    /// Adding a field to an index that already holds rows is accepted; the
    /// stored rows keep their old shape and reading them back is
    /// undefined.
    pub fn add_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        primary: bool,
        not_null: bool,
        reference: &str,
    ) -> Result<(), TableError> {
        if self.find_field(name).is_some() {
            return Err(TableError::FieldExists(name.to_string()));
        }
        let mut def = FieldDefinition::new(name, field_type, primary, not_null);
        def.reference = reference.to_string();
        self.defs.push(def);

        self.values = self
            .defs
            .iter()
            .map(|d| FieldValue::new(d.clone()))
            .collect();
        self.cursor.rebind(self.defs.len() as u64);
        Ok(())
    }

    pub fn field(&self, name: &str) -> Result<&FieldValue, TableError> {
        let idx = self
            .find_field(name)
            .ok_or_else(|| TableError::FieldNotFound(name.to_string()))?;
        Ok(&self.values[idx])
    }

    pub fn field_mut(&mut self, name: &str) -> Result<&mut FieldValue, TableError> {
        let idx = self
            .find_field(name)
            .ok_or_else(|| TableError::FieldNotFound(name.to_string()))?;
        Ok(&mut self.values[idx])
    }

    pub fn field_at(&self, idx: usize) -> Result<&FieldValue, TableError> {
        self.values
            .get(idx)
            .ok_or_else(|| TableError::FieldNotFound(idx.to_string()))
    }

    pub fn field_at_mut(&mut self, idx: usize) -> Result<&mut FieldValue, TableError> {
        self.values
            .get_mut(idx)
            .ok_or_else(|| TableError::FieldNotFound(idx.to_string()))
    }

    /// Starts composing a fresh record: every field null, no address.
    pub fn insert_record(&mut self) {
        if self.mode() != CursorMode::Insert {
            self.cursor.set_insert_mode();
            for value in &mut self.values {
                value.set_null();
            }
        }
    }

    /// Posts the composed record into the tree.
    pub fn post_record(&mut self) -> Result<(), TableError> {
        let (texts, primary_len) = compose(&self.values, false)?;
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.cursor.post(&self.file, &refs, primary_len)?;
        trace!(
            "{}: posted record at {}",
            self.data_path.display(),
            self.cursor.position()
        );
        Ok(())
    }

    /// Tombstones the current record. Without `no_move` the cursor steps
    /// to a neighboring live record (or Eof/Bof).
    pub fn delete_record(&mut self, no_move: bool) -> Result<(), TableError> {
        self.cursor.delete(&self.file, no_move)?;
        if !no_move && self.mode() == CursorMode::Browse {
            self.sync_record()?;
        }
        Ok(())
    }

    /// The concatenated primary-key text of the current field values, with
    /// the same null checks a post would make.
    pub fn compose_primary_key(&self) -> Result<String, TableError> {
        let (texts, _) = compose(&self.values, true)?;
        Ok(texts.join(";"))
    }

    pub fn first_record(&mut self, filter: &str) -> Result<(), TableError> {
        self.cursor.first(&self.file, filter.as_bytes())?;
        self.sync_if_browsing()
    }

    pub fn next_record(&mut self, filter: &str) -> Result<(), TableError> {
        self.cursor.next(&self.file, filter.as_bytes())?;
        self.sync_if_browsing()
    }

    pub fn previous_record(&mut self, filter: &str) -> Result<(), TableError> {
        self.cursor.prev(&self.file, filter.as_bytes())?;
        self.sync_if_browsing()
    }

    pub fn last_record(&mut self, filter: &str) -> Result<(), TableError> {
        self.cursor.last(&self.file, filter.as_bytes())?;
        self.sync_if_browsing()
    }

    /// Positions on the root frame without loading its values.
    pub fn root(&mut self) -> Result<(), TableError> {
        self.cursor.root(&self.file)?;
        Ok(())
    }

    /// Loads the record frame at `pos` into the current record.
    pub fn read_record_at(&mut self, pos: u64) -> Result<(), TableError> {
        self.cursor.read_at(&self.file, pos)?;
        self.sync_record()
    }

    /// Searches the tree for `search`, comparing primary prefixes or whole
    /// value blocks. Position 0 means an empty file (or, for primary
    /// searches, a key that only tombstones carry).
    pub fn locate_value(&self, search: &str, primary: bool) -> Result<(u64, Ordering), TableError> {
        let found = rectree::locate_value(&self.file, search.as_bytes(), primary)?;
        Ok((found.pos, found.ordering))
    }

    /// Refreshes every field's backup slot from its current text.
    pub fn backup_values(&mut self) {
        for value in &mut self.values {
            value.backup_value();
        }
    }

    fn sync_if_browsing(&mut self) -> Result<(), TableError> {
        if self.mode() == CursorMode::Browse {
            self.sync_record()?;
        }
        Ok(())
    }

    /// Loads the landed record's texts into the field values; value and
    /// backup both hold the stored text afterwards.
    fn sync_record(&mut self) -> Result<(), TableError> {
        let texts = rectree::read_fields(&self.file, &self.cursor.header)?;
        for (value, text) in self.values.iter_mut().zip(texts) {
            value.set_string(&text);
            value.backup_value();
        }
        Ok(())
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if self.drop_after_close {
            trace!("unlinking {}", self.data_path.display());
            let _ = std::fs::remove_file(&self.data_path);
        }
    }
}

/// Joins the field values into their stored texts.
///
/// Checks `not_null` along the way; with `primary_only` the walk stops at
/// the first non-primary field (after its null check, before its text).
/// Returns the texts and the byte length of the leading primary run inside
/// the `;`-joined result.
fn compose(
    values: &[FieldValue],
    primary_only: bool,
) -> Result<(Vec<String>, u64), TableError> {
    let mut texts = Vec::with_capacity(values.len());
    let mut joined_len = 0u64;
    let mut primary_len = 0u64;
    let mut in_primary_run = true;

    for (i, value) in values.iter().enumerate() {
        if value.not_null() && value.is_null() {
            return Err(TableError::NullValueNotAllowed(value.name().to_string()));
        }
        if primary_only && !value.is_primary() {
            break;
        }

        if i > 0 {
            joined_len += 1;
        }
        joined_len += value.string_value().len() as u64;
        texts.push(value.string_value().to_string());

        if in_primary_run && value.is_primary() {
            primary_len = joined_len;
        } else {
            in_primary_run = false;
        }
    }

    Ok((texts, primary_len))
}
