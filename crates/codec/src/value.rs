use crate::{
    decode_boolean, decode_integer, decode_number, encode_boolean, encode_integer, encode_number,
    CodecError, FieldDefinition, FieldType,
};

/// One field of the current record: the encoded text, its definition and a
/// single-slot backup of the previous text.
///
/// The backup slot is what index maintenance works from: when a row is
/// updated or deleted, the secondary-index rows for the *old* values must be
/// found again, and the old values are exactly the backups. Every setter
/// snapshots the prior text before overwriting, and reading a record from
/// disk refreshes both slots.
///
/// Null is represented by the empty string; a value is either non-empty
/// text or null.
#[derive(Debug, Clone)]
pub struct FieldValue {
    definition: FieldDefinition,
    value: String,
    backup: String,
}

impl FieldValue {
    /// Creates a null value bound to `definition`.
    #[must_use]
    pub fn new(definition: FieldDefinition) -> Self {
        FieldValue {
            definition,
            value: String::new(),
            backup: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn field_type(&self) -> FieldType {
        self.definition.field_type
    }

    pub fn is_primary(&self) -> bool {
        self.definition.primary
    }

    pub fn not_null(&self) -> bool {
        self.definition.not_null
    }

    pub fn is_null(&self) -> bool {
        self.value.is_empty()
    }

    /// Copies the current text into the backup slot.
    pub fn backup_value(&mut self) {
        self.backup = self.value.clone();
    }

    /// The previously held text (as of the last snapshot).
    pub fn backup(&self) -> &str {
        &self.backup
    }

    /// Clears the value. Refuses no type; always snapshots first.
    pub fn set_null(&mut self) {
        self.backup_value();
        self.value.clear();
    }

    /// The raw encoded text of the current value.
    pub fn string_value(&self) -> &str {
        &self.value
    }

    /// Replaces the raw encoded text, snapshotting the old one.
    pub fn set_string(&mut self, value: &str) {
        self.backup_value();
        self.value.clear();
        self.value.push_str(value);
    }

    pub fn set_integer(&mut self, value: i64) {
        let encoded = encode_integer(value);
        self.backup_value();
        self.value = encoded;
    }

    pub fn integer_value(&self) -> Result<i64, CodecError> {
        decode_integer(&self.value)
    }

    pub fn set_number(&mut self, value: f64) {
        let encoded = encode_number(value);
        self.backup_value();
        self.value = encoded;
    }

    pub fn number_value(&self) -> Result<f64, CodecError> {
        decode_number(&self.value)
    }

    pub fn set_boolean(&mut self, value: bool) {
        let encoded = encode_boolean(value);
        self.backup_value();
        self.value = encoded;
    }

    pub fn boolean_value(&self) -> bool {
        decode_boolean(&self.value)
    }
}
