//! The database config sidecar.
//!
//! A flat TOML document of string keys. The engine itself only reads the
//! numbered table-search fallbacks:
//!
//! ```toml
//! DB_PATH_0 = "/mnt/fast/tables"
//! DB_PATH_1 = "/mnt/archive/tables"
//! ```

use crate::DatabaseError;
use serde::Deserialize;
use std::collections::HashMap;

/// Parsed config: a key-value map with typed accessors for the keys the
/// core recognizes.
#[derive(Debug, Default, Deserialize)]
pub struct DbConfig {
    #[serde(flatten)]
    entries: HashMap<String, String>,
}

impl DbConfig {
    /// Parses the sidecar text. Unknown keys are kept and ignored.
    pub fn parse(text: &str) -> Result<DbConfig, DatabaseError> {
        toml::from_str(text).map_err(|e| DatabaseError::Config(e.to_string()))
    }

    /// An arbitrary config value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// The `i`-th table-search fallback path, if configured.
    pub fn db_path(&self, i: usize) -> Option<&str> {
        self.get(&format!("DB_PATH_{i}"))
    }
}
