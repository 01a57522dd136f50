//! # Codec — order-preserving field value encoding
//!
//! Every field value is stored as text, and the storage engine compares
//! values with plain bytewise ordering. The encodings here are chosen so
//! that *lexicographic byte order of the text equals natural order of the
//! value*:
//!
//! | Type      | Encoding                                                  |
//! |-----------|-----------------------------------------------------------|
//! | Boolean   | `"Y"` / `"N"`                                             |
//! | Integer   | value biased by 2^63, 16-digit zero-padded uppercase hex  |
//! | Number    | IEEE-754 bit trick (see below), 16-digit uppercase hex    |
//! | String    | verbatim                                                  |
//! | Date      | verbatim (type tag only)                                  |
//! | Blob      | verbatim (type tag only)                                  |
//!
//! The integer bias maps `i64::MIN` to `"0000000000000000"`, `0` to
//! `"8000000000000000"` and `i64::MAX` to `"FFFFFFFFFFFFFFFF"`, so signed
//! order falls out of a byte compare.
//!
//! For doubles, the raw IEEE bit pattern does not sort: negative values
//! order backwards and above positive ones. Flipping all bits of negative
//! values and setting the sign bit of non-negative values yields a `u64`
//! whose unsigned order equals numeric order; that `u64` is then written
//! the same fixed-width hex way.
//!
//! The null sentinel for every type is the empty string.

use thiserror::Error;

mod value;

pub use value::FieldValue;

/// Errors produced when decoding a stored text back into a typed value.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The text is not a valid encoding for the requested type.
    #[error("malformed {kind} encoding: {text:?}")]
    Malformed {
        /// Human-readable type name ("integer", "number").
        kind: &'static str,
        /// The offending text.
        text: String,
    },
}

/// The supported field types.
///
/// The numeric tag (0..=5) is what the definition sidecar persists in the
/// `TYPE` attribute; keep the order stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Integer,
    Number,
    Date,
    String,
    Blob,
}

impl FieldType {
    /// Returns the persisted integer tag for this type.
    #[must_use]
    pub fn tag(self) -> u32 {
        match self {
            FieldType::Boolean => 0,
            FieldType::Integer => 1,
            FieldType::Number => 2,
            FieldType::Date => 3,
            FieldType::String => 4,
            FieldType::Blob => 5,
        }
    }

    /// Maps a persisted tag back to the type, `None` for unknown tags.
    #[must_use]
    pub fn from_tag(tag: u32) -> Option<FieldType> {
        match tag {
            0 => Some(FieldType::Boolean),
            1 => Some(FieldType::Integer),
            2 => Some(FieldType::Number),
            3 => Some(FieldType::Date),
            4 => Some(FieldType::String),
            5 => Some(FieldType::Blob),
            _ => None,
        }
    }
}

/// The definition of one field: name, type and constraints.
///
/// `reference` carries a symbolic cross-reference for consumers; the engine
/// stores it in the definition sidecar and otherwise treats it as opaque.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub primary: bool,
    pub not_null: bool,
    pub reference: String,
}

impl FieldDefinition {
    /// Convenience constructor for a field without a reference.
    pub fn new(name: &str, field_type: FieldType, primary: bool, not_null: bool) -> Self {
        FieldDefinition {
            name: name.to_string(),
            field_type,
            primary,
            not_null,
            reference: String::new(),
        }
    }
}

/// An ordered field schema. Field names are unique case-insensitively.
pub type FieldDefinitions = Vec<FieldDefinition>;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

/// Encodes a signed 64-bit integer as biased fixed-width hex.
#[must_use]
pub fn encode_integer(value: i64) -> String {
    format!("{:016X}", (value as u64) ^ SIGN_BIT)
}

/// Decodes a biased fixed-width hex integer.
pub fn decode_integer(text: &str) -> Result<i64, CodecError> {
    let bits = u64::from_str_radix(text, 16).map_err(|_| CodecError::Malformed {
        kind: "integer",
        text: text.to_string(),
    })?;
    Ok((bits ^ SIGN_BIT) as i64)
}

/// Encodes an `f64` order-preservingly.
///
/// Total order over the bit patterns; `-0.0` and `+0.0` encode differently
/// (`-0.0` sorts first), NaN payloads sort above every finite value.
#[must_use]
pub fn encode_number(value: f64) -> String {
    let bits = value.to_bits();
    let ordered = if bits & SIGN_BIT != 0 { !bits } else { bits | SIGN_BIT };
    format!("{:016X}", ordered)
}

/// Decodes an order-preserving `f64` encoding.
pub fn decode_number(text: &str) -> Result<f64, CodecError> {
    let ordered = u64::from_str_radix(text, 16).map_err(|_| CodecError::Malformed {
        kind: "number",
        text: text.to_string(),
    })?;
    let bits = if ordered & SIGN_BIT != 0 {
        ordered ^ SIGN_BIT
    } else {
        !ordered
    };
    Ok(f64::from_bits(bits))
}

/// Encodes a boolean as `"Y"` / `"N"`.
#[must_use]
pub fn encode_boolean(value: bool) -> String {
    if value { "Y".to_string() } else { "N".to_string() }
}

/// Decodes a boolean; anything but a leading `Y` is false.
#[must_use]
pub fn decode_boolean(text: &str) -> bool {
    text.starts_with('Y')
}
