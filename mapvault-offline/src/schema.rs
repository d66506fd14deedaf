//! Cache schema: DDL, version stamp, and destructive recovery.
//!
//! There is no data-preserving upgrade path: a version mismatch or a
//! foreign file wipes the store and recreates it from the current DDL.
//! Callers must treat the cache as disposable across version bumps.

use std::fs;
use std::path::Path;

use crate::cache::CacheError;
use crate::store::{OpenMode, Store, StoreError};

/// Bump when changing the DDL below to force existing stores to be
/// recreated.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "\
CREATE TABLE resources (
    url TEXT NOT NULL PRIMARY KEY,
    kind INTEGER NOT NULL,
    etag TEXT,
    expires INTEGER,
    modified INTEGER,
    accessed INTEGER,
    data BLOB,
    compressed INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE tilesets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url_template TEXT NOT NULL,
    pixel_ratio REAL NOT NULL,
    UNIQUE (url_template, pixel_ratio)
);
CREATE TABLE tiles (
    tileset_id INTEGER NOT NULL REFERENCES tilesets(id),
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    z INTEGER NOT NULL,
    etag TEXT,
    expires INTEGER,
    modified INTEGER,
    accessed INTEGER,
    data BLOB,
    compressed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (tileset_id, x, y, z)
);
CREATE TABLE regions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    definition TEXT NOT NULL,
    metadata BLOB
);
CREATE TABLE region_resources (
    region_id INTEGER NOT NULL REFERENCES regions(id),
    resource_url TEXT NOT NULL REFERENCES resources(url),
    PRIMARY KEY (region_id, resource_url)
);
CREATE TABLE region_tiles (
    region_id INTEGER NOT NULL REFERENCES regions(id),
    tileset_id INTEGER NOT NULL REFERENCES tilesets(id),
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    z INTEGER NOT NULL,
    PRIMARY KEY (region_id, tileset_id, x, y, z)
);
";

/// Open the store at `path`, recreating it when the stamped version does
/// not match [`SCHEMA_VERSION`] or the file is not a store at all.
pub(crate) fn open_or_recreate(path: &Path) -> Result<Store, CacheError> {
    match Store::open(path, OpenMode::ReadWrite) {
        Ok(store) => match store.schema_version() {
            Ok(version) if version == SCHEMA_VERSION => return Ok(store),
            Ok(version) => {
                log::warn!(
                    "offline store at {} carries schema version {version}, expected \
                     {SCHEMA_VERSION}",
                    path.display()
                );
                drop(store);
                remove_existing(path)?;
            }
            Err(StoreError::NotADatabase { .. }) => {
                drop(store);
                remove_existing(path)?;
            }
            Err(source) => return Err(source.into()),
        },
        // No file yet; fall through and create one.
        Err(StoreError::CannotOpen { .. }) => ensure_parent_dir(path)?,
        Err(StoreError::NotADatabase { .. }) => remove_existing(path)?,
        Err(source) => return Err(source.into()),
    }

    let store = Store::open(path, OpenMode::Create)?;
    initialise(&store)?;
    Ok(store)
}

/// Run the DDL and stamp the version on a freshly opened store.
pub(crate) fn initialise(store: &Store) -> Result<(), CacheError> {
    store.execute_batch(SCHEMA)?;
    store.set_schema_version(SCHEMA_VERSION)?;
    Ok(())
}

fn remove_existing(path: &Path) -> Result<(), CacheError> {
    log::warn!(
        "removing incompatible offline store at {}",
        path.display()
    );
    fs::remove_file(path).map_err(|source| CacheError::RemoveStore {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent_dir(path: &Path) -> Result<(), CacheError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(|source| CacheError::CreateDirectory {
        path: parent.to_path_buf(),
        source,
    })
}
