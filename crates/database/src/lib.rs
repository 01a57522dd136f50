//! # Database — table naming and lifecycle
//!
//! A database is little more than a directory convention plus a config
//! sidecar:
//!
//! ```text
//! <db_path>/
//!   <server>-<user>.dbconfig      TOML: DB_PATH_0, DB_PATH_1, ... fallbacks
//!   <user>/
//!     <name>.data                 primary record tree
//!     <name>.definition           schema sidecar
//!     <name>.<index>              one record tree per secondary index
//! ```
//!
//! Table lookup probes `<base>/<user>/<name>.data` for the database path
//! first and then every configured `DB_PATH_i` in order, so cold tables can
//! live on secondary volumes. Directories spring into existence on first
//! table write; dropping a table unlinks its whole file family.

use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use table::Table;
use thiserror::Error;

mod config;

pub use config::DbConfig;

/// Errors raised by database lifecycle and table lookup.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// `create` found an existing config sidecar.
    #[error("database already exists: {0}")]
    DatabaseExists(PathBuf),

    /// `connect` found no config sidecar.
    #[error("database not found: {0}")]
    DatabaseNotFound(PathBuf),

    /// `create_table` found a data file for the name on some search path.
    #[error("table {0} already exists")]
    TableExists(String),

    /// No search path holds a data file for the name.
    #[error("table {0} not found")]
    TableNotFound(String),

    /// The config sidecar did not parse as TOML.
    #[error("bad database config: {0}")]
    Config(String),

    /// A table-level failure.
    #[error(transparent)]
    Table(#[from] table::TableError),

    /// The registry could not open a data file.
    #[error(transparent)]
    Registry(#[from] registry::RegistryError),

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A connected (or freshly created) database.
#[derive(Debug)]
pub struct Database {
    db_path: PathBuf,
    user: String,
    config_file: PathBuf,
    config: DbConfig,
}

impl Database {
    fn build(server: &str, db_path: &Path, user: &str) -> Database {
        let mut stem = String::new();
        if !server.is_empty() {
            stem.push_str(server);
            stem.push('-');
        }
        stem.push_str(user);
        stem.push_str(".dbconfig");

        Database {
            db_path: db_path.to_path_buf(),
            user: user.to_string(),
            config_file: db_path.join(stem),
            config: DbConfig::default(),
        }
    }

    /// Creates a new database rooted at `db_path`.
    ///
    /// Refuses when the config sidecar already exists; otherwise writes an
    /// empty one so a later [`connect`](Database::connect) succeeds. The
    /// `password` is accepted for interface compatibility and unused — the
    /// engine trusts the file system.
    pub fn create(
        server: &str,
        db_path: &Path,
        user: &str,
        _password: &str,
    ) -> Result<Database, DatabaseError> {
        let db = Database::build(server, db_path, user);
        if db.config_file.exists() {
            return Err(DatabaseError::DatabaseExists(db.config_file));
        }
        debug!("creating database at {}", db_path.display());
        std::fs::create_dir_all(&db.db_path)?;
        std::fs::write(&db.config_file, "")?;
        Ok(db)
    }

    /// Connects to an existing database, loading its config sidecar.
    pub fn connect(
        server: &str,
        db_path: &Path,
        user: &str,
        _password: &str,
    ) -> Result<Database, DatabaseError> {
        let mut db = Database::build(server, db_path, user);
        if !db.config_file.exists() {
            return Err(DatabaseError::DatabaseNotFound(db.config_file));
        }
        debug!("connecting to database at {}", db_path.display());
        let text = std::fs::read_to_string(&db.config_file)?;
        db.config = DbConfig::parse(&text)?;
        Ok(db)
    }

    /// The directory holding this user's tables.
    pub fn user_dir(&self) -> PathBuf {
        self.db_path.join(&self.user)
    }

    /// Resolves a table name to its path prefix by probing the database
    /// path and then every configured fallback.
    fn find_table_path(&self, name: &str) -> Option<PathBuf> {
        let mut base = Some(self.db_path.clone());
        let mut fallback = 0usize;

        while let Some(dir) = base {
            let prefix = dir.join(&self.user).join(name);
            let mut data_file = prefix.clone().into_os_string();
            data_file.push(".");
            data_file.push(table::DATA_EXT);
            if Path::new(&data_file).exists() {
                return Some(prefix);
            }

            base = self.config.db_path(fallback).map(PathBuf::from);
            fallback += 1;
        }
        None
    }

    /// Creates a new table under `<db_path>/<user>/<name>`.
    pub fn create_table(&self, name: &str) -> Result<Table, DatabaseError> {
        if self.find_table_path(name).is_some() {
            return Err(DatabaseError::TableExists(name.to_string()));
        }
        debug!("creating table {name}");
        let table = Table::new(&self.user_dir().join(name))?;
        table.create()?;
        Ok(table)
    }

    /// Opens the first table called `name` on any search path.
    pub fn open_table(&self, name: &str) -> Result<Table, DatabaseError> {
        let prefix = self
            .find_table_path(name)
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))?;
        let mut table = Table::new(&prefix)?;
        table.open()?;
        Ok(table)
    }

    /// Unlinks every file belonging to `name`: data, definition and all
    /// index files.
    pub fn drop_table(&self, name: &str) -> Result<(), DatabaseError> {
        let prefix = self
            .find_table_path(name)
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))?;
        debug!("dropping table {name}");

        let dir = prefix.parent().unwrap_or_else(|| Path::new("."));
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            if file_name.to_string_lossy().starts_with(name) {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}
