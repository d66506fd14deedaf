//! Thin adapter over the embedded SQLite engine.
//!
//! The adapter owns the connection, maps open failures into the two cases
//! the cache layer reacts to (`CannotOpen`, `NotADatabase`), and provides
//! pooled prepared statements keyed by SQL text. Statements return to the
//! pool reset when their handle drops, so reuse never observes stale
//! bindings.

use std::path::{Path, PathBuf};

use rusqlite::{CachedStatement, Connection, ErrorCode, OpenFlags, Transaction};
use thiserror::Error;

/// Distinct statements the cache layer keeps pooled; sized with headroom.
const STATEMENT_CACHE_CAPACITY: usize = 32;

/// How [`Store::open`] treats a missing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing store; fail if the file is missing.
    ReadWrite,
    /// Open the store, creating the file if necessary.
    Create,
}

/// Errors raised by the store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file could not be created or opened under the requested mode.
    #[error("cannot open store at {path:?}")]
    CannotOpen {
        /// Location of the store file.
        path: PathBuf,
        /// Source error returned by the engine.
        #[source]
        source: rusqlite::Error,
    },
    /// The file exists but is not a valid store.
    #[error("file at {path:?} is not a valid store")]
    NotADatabase {
        /// Location of the offending file.
        path: PathBuf,
    },
    /// Any other engine failure.
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

/// Connection to one embedded store file (or a volatile in-memory store).
#[derive(Debug)]
pub struct Store {
    connection: Connection,
    location: Option<PathBuf>,
}

impl Store {
    /// Open the store at `path`.
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self, StoreError> {
        let flags = match mode {
            OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::Create => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let connection = Connection::open_with_flags(path, flags)
            .map_err(|source| classify_open_error(path, source))?;
        configure(&connection)?;
        Ok(Self {
            connection,
            location: Some(path.to_path_buf()),
        })
    }

    /// Open a volatile store that is discarded when dropped.
    pub fn in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()?;
        configure(&connection)?;
        Ok(Self {
            connection,
            location: None,
        })
    }

    /// Fetch a pooled prepared statement for `sql`, compiling on first use.
    pub fn prepare(&self, sql: &str) -> Result<CachedStatement<'_>, StoreError> {
        self.connection
            .prepare_cached(sql)
            .map_err(|source| self.classify(source))
    }

    /// Run DDL or PRAGMA statements outside the statement pool.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.connection
            .execute_batch(sql)
            .map_err(|source| self.classify(source))
    }

    /// Begin a transaction that rolls back unless committed.
    pub fn transaction(&self) -> Result<Transaction<'_>, StoreError> {
        self.connection
            .unchecked_transaction()
            .map_err(StoreError::from)
    }

    /// Rowid of the most recent insert on this connection.
    #[must_use]
    pub fn last_insert_id(&self) -> i64 {
        self.connection.last_insert_rowid()
    }

    /// Read the schema-version marker.
    pub fn schema_version(&self) -> Result<i64, StoreError> {
        self.connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|source| self.classify(source))
    }

    /// Stamp the schema-version marker.
    pub fn set_schema_version(&self, version: i64) -> Result<(), StoreError> {
        self.connection
            .pragma_update(None, "user_version", version)
            .map_err(|source| self.classify(source))
    }

    /// Location of the store file; `None` for in-memory stores.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Close the connection, reporting any failure instead of panicking.
    pub fn close(self) -> Result<(), StoreError> {
        self.connection
            .close()
            .map_err(|(_, source)| StoreError::Sql(source))
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.connection
    }

    fn classify(&self, error: rusqlite::Error) -> StoreError {
        if is_not_a_database(&error) {
            StoreError::NotADatabase {
                path: self.location.clone().unwrap_or_default(),
            }
        } else {
            StoreError::Sql(error)
        }
    }
}

fn configure(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
    connection.pragma_update(None, "foreign_keys", true)
}

fn classify_open_error(path: &Path, error: rusqlite::Error) -> StoreError {
    match sqlite_code(&error) {
        Some(ErrorCode::CannotOpen) => StoreError::CannotOpen {
            path: path.to_path_buf(),
            source: error,
        },
        Some(ErrorCode::NotADatabase) => StoreError::NotADatabase {
            path: path.to_path_buf(),
        },
        _ => StoreError::Sql(error),
    }
}

fn is_not_a_database(error: &rusqlite::Error) -> bool {
    matches!(sqlite_code(error), Some(ErrorCode::NotADatabase))
}

fn sqlite_code(error: &rusqlite::Error) -> Option<ErrorCode> {
    match error {
        rusqlite::Error::SqliteFailure(inner, _) => Some(inner.code),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    #[rstest]
    fn missing_file_without_create_fails(temp_dir: TempDir) {
        let path = temp_dir.path().join("absent.db");
        let result = Store::open(&path, OpenMode::ReadWrite);
        assert!(matches!(result, Err(StoreError::CannotOpen { .. })));
    }

    #[rstest]
    fn create_mode_materialises_the_file(temp_dir: TempDir) {
        let path = temp_dir.path().join("fresh.db");
        let store = Store::open(&path, OpenMode::Create).expect("create store");
        store
            .execute_batch("CREATE TABLE sample (id INTEGER PRIMARY KEY)")
            .expect("run DDL");
        assert!(path.exists());
        assert_eq!(store.location(), Some(path.as_path()));
    }

    #[rstest]
    fn version_marker_round_trips() {
        let store = Store::in_memory().expect("open in-memory store");
        assert_eq!(store.schema_version().expect("read version"), 0);
        store.set_schema_version(7).expect("stamp version");
        assert_eq!(store.schema_version().expect("read version"), 7);
    }

    #[rstest]
    fn foreign_file_reports_not_a_database(temp_dir: TempDir) {
        let path = temp_dir.path().join("foreign.db");
        std::fs::write(&path, b"definitely not a database file, promise".repeat(8))
            .expect("write foreign file");
        let store = Store::open(&path, OpenMode::ReadWrite).expect("open succeeds lazily");
        let result = store.schema_version();
        assert!(matches!(result, Err(StoreError::NotADatabase { .. })));
    }

    #[rstest]
    fn pooled_statements_reset_between_uses() {
        let store = Store::in_memory().expect("open in-memory store");
        store
            .execute_batch("CREATE TABLE sample (id INTEGER PRIMARY KEY, label TEXT)")
            .expect("run DDL");
        {
            let mut insert = store
                .prepare("INSERT INTO sample (label) VALUES (?1)")
                .expect("prepare insert");
            insert.execute(["first"]).expect("insert row");
        }
        {
            // Same SQL text fetches the pooled handle with fresh bindings.
            let mut insert = store
                .prepare("INSERT INTO sample (label) VALUES (?1)")
                .expect("prepare insert again");
            insert.execute(["second"]).expect("insert row");
        }
        assert_eq!(store.last_insert_id(), 2);
    }
}
