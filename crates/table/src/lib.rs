//! # Table — typed records over record-tree files
//!
//! This crate turns the raw record-tree engine into named, typed tables:
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                      TABLE                        │
//! │                                                   │
//! │  primary Index ──────────► <name>.data            │
//! │    field schema + cursor + current record         │
//! │                                                   │
//! │  secondary Index "SEC" ──► <name>.SEC             │
//! │    [key fields..., REC_POS] rows pointing back    │
//! │    at primary row offsets                         │
//! │                                                   │
//! │  <name>.definition  ◄──── schema + index list     │
//! │    (XML sidecar, rewritten on schema changes)     │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! An [`Index`] is one record-tree file plus its field schema and a single
//! current-record cursor. A [`Table`] wraps the primary index (the file
//! holding the rows) and any number of secondary indices, keeping them
//! consistent on every post and delete and enforcing uniqueness through
//! primary-prefix searches.
//!
//! Ordering of a table walk is the lexicographic order of the concatenated
//! encoded row; setting a current index reorders the walk by that index's
//! key fields, following the stored `REC_POS` offsets back to the rows.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

mod definition;
mod index;
mod table;

pub use codec::{FieldDefinition, FieldDefinitions, FieldType, FieldValue};
pub use index::Index;
pub use rectree::CursorMode;
pub use table::Table;

/// The synthetic trailing field of every secondary index: the byte offset
/// of the referenced primary row.
pub const REC_POS: &str = "REC_POS";

/// Extension of the primary data file.
pub const DATA_EXT: &str = "data";

/// Extension of the definition sidecar.
pub const DEFINITION_EXT: &str = "definition";

/// Errors raised by indices and tables.
#[derive(Debug, Error)]
pub enum TableError {
    /// A field with this name is already part of the schema.
    #[error("field {0} already exists")]
    FieldExists(String),

    /// No field with this name.
    #[error("field {0} not found")]
    FieldNotFound(String),

    /// An index with this name is already attached (or is in active use).
    #[error("index {0} already exists")]
    IndexExists(String),

    /// No index with this name.
    #[error("index {0} not found")]
    IndexNotFound(String),

    /// A unique-key check failed; carries the offending file path.
    #[error("key violation on {0}")]
    KeyViolation(PathBuf),

    /// A `not_null` field was null on post.
    #[error("field {0} must not be null")]
    NullValueNotAllowed(String),

    /// The definition sidecar was missing a piece or failed to parse.
    #[error("bad table definition: {0}")]
    Definition(String),

    /// A stored field did not decode as its declared type.
    #[error(transparent)]
    Codec(#[from] codec::CodecError),

    /// A record frame was malformed.
    #[error(transparent)]
    Tree(#[from] rectree::TreeError),

    /// The data file could not be opened.
    #[error(transparent)]
    Registry(#[from] registry::RegistryError),

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests;
