//! The table: a primary index plus its secondary indices.

use crate::definition::{parse_definition, render_definition};
use crate::index::Index;
use crate::{TableError, DATA_EXT, DEFINITION_EXT, REC_POS};
use codec::{FieldType, FieldValue};
use log::{debug, trace};
use rectree::{CursorMode, RecordHeader};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct SecondaryIndex {
    name: String,
    index: Index,
}

/// `<prefix>.<suffix>` without treating dots in the table name as an
/// extension boundary.
fn append_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_os_string();
    path.push(".");
    path.push(suffix);
    PathBuf::from(path)
}

/// A named table: the primary data file, any number of secondary indices
/// and the definition sidecar tying them together.
///
/// Secondary index schemas are always `[key fields..., REC_POS]`; their
/// rows hold the key-field texts of a table row plus that row's byte
/// offset in the primary file. Every post and delete keeps them in step.
#[derive(Debug)]
pub struct Table {
    prefix: PathBuf,
    definition_path: PathBuf,
    primary: Index,
    indices: Vec<SecondaryIndex>,
    current: Option<usize>,
}

impl Table {
    /// Binds a table rooted at `prefix` (`<dir>/<name>`), opening
    /// `<prefix>.data` through the registry. Directories on the path are
    /// created as needed.
    pub fn new(prefix: &Path) -> Result<Table, TableError> {
        Ok(Table {
            prefix: prefix.to_path_buf(),
            definition_path: append_suffix(prefix, DEFINITION_EXT),
            primary: Index::open_path(append_suffix(prefix, DATA_EXT))?,
            indices: Vec::new(),
            current: None,
        })
    }

    /// Initializes the primary data file of a brand-new table.
    pub fn create(&self) -> Result<(), TableError> {
        debug!("creating table {}", self.prefix.display());
        self.primary.create()
    }

    /// Loads the definition sidecar and reconstructs schema and indices.
    pub fn open(&mut self) -> Result<(), TableError> {
        debug!("opening table {}", self.prefix.display());
        let text = std::fs::read_to_string(&self.definition_path)?;
        let parsed = parse_definition(&text)?;

        self.primary.open(parsed.fields)?;
        for (name, defs) in parsed.indices {
            let mut index = Index::open_path(self.index_path(&name))?;
            index.open(defs)?;
            self.indices.push(SecondaryIndex { name, index });
        }
        Ok(())
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// The file a secondary index of this table lives in.
    fn index_path(&self, index_name: &str) -> PathBuf {
        append_suffix(&self.prefix, index_name)
    }

    fn find_index(&self, name: &str) -> Option<usize> {
        self.indices.iter().position(|s| s.name == name)
    }

    // --------------------- schema ---------------------

    /// Appends a field to the table schema and persists the definition.
    pub fn add_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        primary: bool,
        not_null: bool,
        reference: &str,
    ) -> Result<(), TableError> {
        self.primary
            .add_field(name, field_type, primary, not_null, reference)?;
        self.write_definition()
    }

    /// Creates a new, empty secondary index.
    pub fn create_index(&mut self, name: &str) -> Result<(), TableError> {
        if self.find_index(name).is_some() {
            return Err(TableError::IndexExists(name.to_string()));
        }
        debug!("creating index {name} on {}", self.prefix.display());
        let index = Index::open_path(self.index_path(name))?;
        index.create()?;
        self.indices.push(SecondaryIndex {
            name: name.to_string(),
            index,
        });
        self.write_definition()
    }

    /// Appends a key field to a secondary index. With `last_field` the
    /// synthetic `REC_POS` field is appended too and the index is built
    /// from the table's rows; if that build fails — a duplicate key, say —
    /// the partial index is dropped and the failure propagated.
    pub fn add_field_to_index(
        &mut self,
        index_name: &str,
        field_name: &str,
        primary: bool,
        last_field: bool,
    ) -> Result<(), TableError> {
        let slot = self
            .find_index(index_name)
            .ok_or_else(|| TableError::IndexNotFound(index_name.to_string()))?;
        if self.current == Some(slot) {
            // The index currently driving the cursor cannot be rebuilt
            // under its own feet.
            return Err(TableError::IndexExists(index_name.to_string()));
        }

        let field_idx = self
            .primary
            .find_field(field_name)
            .ok_or_else(|| TableError::FieldNotFound(field_name.to_string()))?;
        let field_type = self.primary.definitions()[field_idx].field_type;

        self.indices[slot]
            .index
            .add_field(field_name, field_type, primary, false, "")?;

        if last_field {
            self.indices[slot]
                .index
                .add_field(REC_POS, FieldType::Number, false, false, "")?;
            if let Err(err) = self.refresh_index(slot) {
                self.drop_index(index_name)?;
                return Err(err);
            }
        }

        self.write_definition()
    }

    /// Rebuilds an index from scratch: truncate, then walk the table and
    /// insert one index row per live row, checking uniqueness on the way.
    fn refresh_index(&mut self, slot: usize) -> Result<(), TableError> {
        debug!(
            "refreshing index {} on {}",
            self.indices[slot].name,
            self.prefix.display()
        );
        self.indices[slot].index.truncate()?;

        self.first_record("")?;
        while !self.eof() {
            self.check_key_violation(slot)?;
            self.insert_key_record(slot)?;
            self.next_record("")?;
        }
        Ok(())
    }

    /// Routes cursor calls through the named index; `None` restores the
    /// primary ordering.
    pub fn set_index(&mut self, name: Option<&str>) -> Result<(), TableError> {
        match name {
            Some(name) => {
                let slot = self
                    .find_index(name)
                    .ok_or_else(|| TableError::IndexNotFound(name.to_string()))?;
                self.current = Some(slot);
            }
            None => self.current = None,
        }
        Ok(())
    }

    /// Detaches the named index; its data file is unlinked on destruction.
    pub fn drop_index(&mut self, name: &str) -> Result<(), TableError> {
        let slot = self
            .find_index(name)
            .ok_or_else(|| TableError::IndexNotFound(name.to_string()))?;
        debug!("dropping index {name} on {}", self.prefix.display());

        match self.current {
            Some(current) if current == slot => self.current = None,
            Some(current) if current > slot => self.current = Some(current - 1),
            _ => {}
        }

        let mut removed = self.indices.remove(slot);
        removed.index.drop_data_file();
        drop(removed);

        self.write_definition()
    }

    fn write_definition(&self) -> Result<(), TableError> {
        let indices: Vec<(String, &codec::FieldDefinitions)> = self
            .indices
            .iter()
            .map(|s| (s.name.clone(), s.index.definitions()))
            .collect();
        let text = render_definition(self.primary.definitions(), &indices);
        std::fs::write(&self.definition_path, text)?;
        Ok(())
    }

    // --------------------- record access ---------------------

    pub fn field(&self, name: &str) -> Result<&FieldValue, TableError> {
        self.primary.field(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Result<&mut FieldValue, TableError> {
        self.primary.field_mut(name)
    }

    pub fn insert_record(&mut self) {
        self.primary.insert_record();
    }

    pub fn eof(&self) -> bool {
        self.primary.eof()
    }

    pub fn bof(&self) -> bool {
        self.primary.bof()
    }

    pub fn num_records(&self) -> Result<u64, TableError> {
        self.primary.num_records()
    }

    /// Positions the current record on the tree root (header only).
    pub fn root(&mut self) -> Result<(), TableError> {
        self.primary.root()
    }

    pub fn header(&self) -> &RecordHeader {
        self.primary.header()
    }

    pub fn locate_value(&self, search: &str, primary: bool) -> Result<(u64, Ordering), TableError> {
        self.primary.locate_value(search, primary)
    }

    // --------------------- write path ---------------------

    /// Posts the current record: key checks first, then the update-path
    /// tombstone, then the row itself, then one row per secondary index.
    pub fn post_record(&mut self) -> Result<(), TableError> {
        // The table's own primary key.
        let key = self.primary.compose_primary_key()?;
        if !key.is_empty() {
            let (pos, ordering) = self.primary.locate_value(&key, true)?;
            if ordering == Ordering::Equal && pos != 0 && self.primary.current_position() != pos {
                return Err(TableError::KeyViolation(
                    self.primary.data_path().to_path_buf(),
                ));
            }
        }

        // Unique keys of every secondary index.
        for slot in 0..self.indices.len() {
            self.check_key_violation(slot)?;
        }

        // Updating a browsed row replaces it: tombstone the old version
        // (and its index rows) and fall through to a fresh insert.
        if self.primary.mode() == CursorMode::Browse {
            self.delete_record(true)?;
        }

        self.primary.post_record()?;

        for slot in 0..self.indices.len() {
            self.insert_key_record(slot)?;
        }

        // The post survived; the stored texts are the new pre-image.
        self.primary.backup_values();
        Ok(())
    }

    /// Tombstones the current row and the matching row in every secondary
    /// index, found through the backed-up key values.
    pub fn delete_record(&mut self, no_move: bool) -> Result<(), TableError> {
        let position = self.primary.current_position();
        trace!("{}: deleting row at {position}", self.prefix.display());

        for slot in 0..self.indices.len() {
            let key_fields = self.indices[slot].index.num_fields() - 1;
            let mut search = String::new();
            for field_idx in 0..key_fields {
                let name = self.indices[slot].index.field_at(field_idx)?.name().to_string();
                search.push_str(self.primary.field(&name)?.backup());
                search.push(';');
            }
            // REC_POS was stored through the integer codec; the pre-image
            // has to be composed the same way to match.
            search.push_str(&codec::encode_integer(position as i64));

            let secondary = &mut self.indices[slot].index;
            secondary.first_record(&search)?;
            if !secondary.eof() {
                secondary.delete_record(false)?;
            }
        }

        self.primary.delete_record(no_move)
    }

    /// Refuses the post when an index already holds the composed key for a
    /// different row.
    fn check_key_violation(&mut self, slot: usize) -> Result<(), TableError> {
        let key_fields = self.indices[slot].index.num_fields() - 1;
        let mut key = String::new();
        for field_idx in 0..key_fields {
            let (name, primary) = {
                let field = self.indices[slot].index.field_at(field_idx)?;
                (field.name().to_string(), field.is_primary())
            };
            if !primary {
                break;
            }
            if field_idx > 0 {
                key.push(';');
            }
            key.push_str(self.primary.field(&name)?.string_value());
        }
        if key.is_empty() {
            return Ok(());
        }

        let (pos, ordering) = self.indices[slot].index.locate_value(&key, true)?;
        if ordering == Ordering::Equal && pos != 0 {
            let current = self.primary.current_position();
            if current != 0 {
                self.indices[slot].index.read_record_at(pos)?;
            }
            let points_here = current != 0
                && self.indices[slot]
                    .index
                    .field_at(key_fields)?
                    .integer_value()?
                    == current as i64;
            if !points_here {
                return Err(TableError::KeyViolation(
                    self.indices[slot].index.data_path().to_path_buf(),
                ));
            }
        }
        Ok(())
    }

    /// Appends one index row for the current table row.
    fn insert_key_record(&mut self, slot: usize) -> Result<(), TableError> {
        let key_fields = self.indices[slot].index.num_fields() - 1;

        self.indices[slot].index.insert_record();
        for field_idx in 0..key_fields {
            let name = self.indices[slot].index.field_at(field_idx)?.name().to_string();
            let text = self.primary.field(&name)?.string_value().to_string();
            self.indices[slot]
                .index
                .field_at_mut(field_idx)?
                .set_string(&text);
        }
        let position = self.primary.current_position() as i64;
        self.indices[slot]
            .index
            .field_at_mut(key_fields)?
            .set_integer(position);
        self.indices[slot].index.post_record()
    }

    // --------------------- cursor ---------------------

    pub fn first_record(&mut self, filter: &str) -> Result<(), TableError> {
        match self.current {
            Some(slot) => {
                self.indices[slot].index.first_record(filter)?;
                self.follow_index(slot, true)
            }
            None => self.primary.first_record(filter),
        }
    }

    pub fn next_record(&mut self, filter: &str) -> Result<(), TableError> {
        match self.current {
            Some(slot) => {
                self.indices[slot].index.next_record(filter)?;
                self.follow_index(slot, true)
            }
            None => self.primary.next_record(filter),
        }
    }

    pub fn previous_record(&mut self, filter: &str) -> Result<(), TableError> {
        match self.current {
            Some(slot) => {
                self.indices[slot].index.previous_record(filter)?;
                self.follow_index(slot, false)
            }
            None => self.primary.previous_record(filter),
        }
    }

    pub fn last_record(&mut self, filter: &str) -> Result<(), TableError> {
        match self.current {
            Some(slot) => {
                self.indices[slot].index.last_record(filter)?;
                self.follow_index(slot, false)
            }
            None => self.primary.last_record(filter),
        }
    }

    /// Loads the primary row the current index row points at, or marks the
    /// walk finished when the index ran out.
    fn follow_index(&mut self, slot: usize, forward: bool) -> Result<(), TableError> {
        let secondary = &self.indices[slot].index;
        let ended = if forward { secondary.eof() } else { secondary.bof() };
        if ended {
            if forward {
                self.primary.set_eof();
            } else {
                self.primary.set_bof();
            }
            return Ok(());
        }
        let rec_pos_field = secondary.num_fields() - 1;
        let position = secondary.field_at(rec_pos_field)?.integer_value()? as u64;
        self.primary.read_record_at(position)
    }
}
