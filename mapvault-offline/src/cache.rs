//! The offline cache: resource/tile rows, the region catalog, and the
//! usage rows tying them together.
//!
//! Writes use full-row upserts; a revalidation (`not_modified`) only
//! refreshes `accessed`/`expires` so the cached body survives. Payloads
//! are stored deflated only when that is strictly smaller than the raw
//! bytes. A row with a NULL payload is a tombstone: the upstream confirmed
//! the resource does not exist.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use mapvault_core::{
    Region, RegionDefinition, Resource, ResourceKind, Response, ResponseError, TileKey, Timestamp,
};
use rusqlite::{OptionalExtension, params};
use thiserror::Error;

use crate::compression;
use crate::schema;
use crate::store::{Store, StoreError};

/// Errors raised by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A statement failed while reading or writing rows.
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
    /// An incompatible store file could not be deleted during recovery.
    #[error("failed to remove incompatible store at {path:?}")]
    RemoveStore {
        /// Location of the store file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The directory for a new store file could not be created.
    #[error("failed to create store directory {path:?}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Deflating a payload for storage failed.
    #[error("failed to compress cached payload")]
    Compress(#[source] io::Error),
    /// Inflating a stored payload failed.
    #[error("failed to decompress cached payload")]
    Decompress(#[source] io::Error),
    /// A stored region definition could not be decoded.
    #[error("malformed stored region definition")]
    Definition(#[source] serde_json::Error),
    /// The region id matched no catalog row.
    #[error("region {0} does not exist")]
    UnknownRegion(i64),
}

/// Content-addressed cache of map resources plus the offline region
/// catalog, backed by one embedded store file.
///
/// All methods are synchronous and must stay on the execution context that
/// owns the instance; callers elsewhere marshal onto it.
#[derive(Debug)]
pub struct OfflineCache {
    store: Store,
}

impl OfflineCache {
    /// Open (or create) the cache at `path`, recreating the store when its
    /// schema version is incompatible.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let store = schema::open_or_recreate(path.as_ref())?;
        Ok(Self { store })
    }

    /// Open a volatile cache that never touches disk.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let store = Store::in_memory()?;
        schema::initialise(&store)?;
        Ok(Self { store })
    }

    /// Close the cache, logging rather than surfacing teardown failures.
    pub fn close(self) {
        if let Err(error) = self.store.close() {
            log::error!("failed to close offline store: {error}");
        }
    }

    /// Look up a resource.
    ///
    /// `Ok(None)` is a cache miss, not an error. A hit whose payload column
    /// is NULL comes back as a [`ResponseError::NotFound`] tombstone.
    pub fn get(&self, resource: &Resource) -> Result<Option<Response>, CacheError> {
        match resource {
            Resource::Generic { url, .. } => self.get_resource(url),
            Resource::Tile(key) => self.get_tile(key),
        }
    }

    /// Write a fetched response through to storage.
    ///
    /// Responses carrying any error other than `NotFound` are silently
    /// dropped. A `not_modified` response only refreshes `accessed` and
    /// `expires` on the existing row.
    pub fn put(&self, resource: &Resource, response: &Response) -> Result<(), CacheError> {
        self.put_if_cacheable(resource, response).map(|_| ())
    }

    /// Look up a resource for a region, recording usage on a hit.
    pub fn get_region_resource(
        &self,
        region_id: i64,
        resource: &Resource,
    ) -> Result<Option<Response>, CacheError> {
        let response = self.get(resource)?;
        if response.is_some() {
            self.mark_used(region_id, resource)?;
        }
        Ok(response)
    }

    /// Write a response through to storage and record usage for a region.
    ///
    /// Usage is only recorded when a row was actually written or refreshed,
    /// so dropped responses never leave dangling usage rows.
    pub fn put_region_resource(
        &self,
        region_id: i64,
        resource: &Resource,
        response: &Response,
    ) -> Result<(), CacheError> {
        if self.put_if_cacheable(resource, response)? {
            self.mark_used(region_id, resource)?;
        }
        Ok(())
    }

    /// Record that `region_id` uses `resource`. Idempotent.
    pub fn mark_used(&self, region_id: i64, resource: &Resource) -> Result<(), CacheError> {
        match resource {
            Resource::Generic { url, .. } => {
                let mut stmt = self.store.prepare(
                    "INSERT OR IGNORE INTO region_resources (region_id, resource_url) \
                     VALUES (?1, ?2)",
                )?;
                stmt.execute(params![region_id, url])?;
            }
            Resource::Tile(key) => {
                let mut stmt = self.store.prepare(
                    "INSERT OR IGNORE INTO region_tiles (region_id, tileset_id, x, y, z) \
                     SELECT ?1, tilesets.id, ?4, ?5, ?6 \
                     FROM tilesets \
                     WHERE url_template = ?2 AND pixel_ratio = ?3",
                )?;
                stmt.execute(params![
                    region_id,
                    key.url_template,
                    f64::from(key.pixel_ratio),
                    i64::from(key.x),
                    i64::from(key.y),
                    i64::from(key.z),
                ])?;
            }
        }
        Ok(())
    }

    /// All regions in storage order (ascending id).
    pub fn list_regions(&self) -> Result<Vec<Region>, CacheError> {
        let mut stmt = self
            .store
            .prepare("SELECT id, definition, metadata FROM regions ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<Vec<u8>>>(2)?,
            ))
        })?;
        let mut regions = Vec::new();
        for row in rows {
            let (id, encoded, metadata) = row?;
            regions.push(Region {
                id,
                definition: decode_definition(&encoded)?,
                metadata: metadata.unwrap_or_default(),
            });
        }
        Ok(regions)
    }

    /// Insert a region and return it with its store-assigned id.
    pub fn create_region(
        &self,
        definition: &RegionDefinition,
        metadata: Vec<u8>,
    ) -> Result<Region, CacheError> {
        let encoded = serde_json::to_string(definition).map_err(CacheError::Definition)?;
        let mut stmt = self
            .store
            .prepare("INSERT INTO regions (definition, metadata) VALUES (?1, ?2)")?;
        stmt.execute(params![encoded, metadata])?;
        Ok(Region {
            id: self.store.last_insert_id(),
            definition: definition.clone(),
            metadata,
        })
    }

    /// Remove a region and its usage rows.
    ///
    /// Cached resource and tile rows are deliberately left in place: other
    /// regions or the ambient cache may still reference the same bytes.
    pub fn delete_region(&self, region: &Region) -> Result<(), CacheError> {
        self.delete_region_by_id(region.id)
    }

    pub(crate) fn delete_region_by_id(&self, region_id: i64) -> Result<(), CacheError> {
        let tx = self.store.transaction()?;
        tx.execute(
            "DELETE FROM region_resources WHERE region_id = ?1",
            params![region_id],
        )?;
        tx.execute(
            "DELETE FROM region_tiles WHERE region_id = ?1",
            params![region_id],
        )?;
        let removed = tx.execute("DELETE FROM regions WHERE id = ?1", params![region_id])?;
        tx.commit()?;
        if removed == 0 {
            return Err(CacheError::UnknownRegion(region_id));
        }
        Ok(())
    }

    /// Decode the stored definition of one region.
    pub fn region_definition(&self, region_id: i64) -> Result<RegionDefinition, CacheError> {
        let mut stmt = self
            .store
            .prepare("SELECT definition FROM regions WHERE id = ?1")?;
        let encoded: Option<String> = stmt
            .query_row(params![region_id], |row| row.get(0))
            .optional()?;
        let encoded = encoded.ok_or(CacheError::UnknownRegion(region_id))?;
        decode_definition(&encoded)
    }

    /// Delete resource, tile, and tileset rows no region references.
    ///
    /// Never invoked implicitly; region deletion keeps payloads around and
    /// callers run this pass when they want the space back.
    pub fn remove_unused(&self) -> Result<(), CacheError> {
        let tx = self.store.transaction()?;
        tx.execute(
            "DELETE FROM resources \
             WHERE url NOT IN (SELECT resource_url FROM region_resources)",
            [],
        )?;
        tx.execute(
            "DELETE FROM tiles WHERE NOT EXISTS ( \
                 SELECT 1 FROM region_tiles \
                 WHERE region_tiles.tileset_id = tiles.tileset_id \
                 AND region_tiles.x = tiles.x \
                 AND region_tiles.y = tiles.y \
                 AND region_tiles.z = tiles.z)",
            [],
        )?;
        tx.execute(
            "DELETE FROM tilesets \
             WHERE id NOT IN (SELECT tileset_id FROM tiles) \
             AND id NOT IN (SELECT tileset_id FROM region_tiles)",
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn put_if_cacheable(
        &self,
        resource: &Resource,
        response: &Response,
    ) -> Result<bool, CacheError> {
        // Except for NotFound, errors are never persisted.
        if let Some(error) = &response.error {
            if *error != ResponseError::NotFound {
                return Ok(false);
            }
        }
        match resource {
            Resource::Generic { kind, url } => self.put_resource(*kind, url, response),
            Resource::Tile(key) => self.put_tile(key, response),
        }
    }

    fn get_resource(&self, url: &str) -> Result<Option<Response>, CacheError> {
        let mut stmt = self.store.prepare(
            "SELECT etag, expires, modified, data, compressed \
             FROM resources \
             WHERE url = ?1",
        )?;
        let row = stmt
            .query_row(params![url], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<Timestamp>>(1)?,
                    row.get::<_, Option<Timestamp>>(2)?,
                    row.get::<_, Option<Vec<u8>>>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })
            .optional()?;
        row.map(row_to_response).transpose()
    }

    fn put_resource(
        &self,
        kind: ResourceKind,
        url: &str,
        response: &Response,
    ) -> Result<bool, CacheError> {
        if response.not_modified {
            let mut stmt = self.store.prepare(
                "UPDATE resources SET accessed = ?1, expires = ?2 WHERE url = ?3",
            )?;
            let updated = stmt.execute(params![unix_now(), response.expires, url])?;
            return Ok(updated > 0);
        }
        let (blob, compressed) = encode_payload(response)?;
        let mut stmt = self.store.prepare(
            "INSERT INTO resources (url, kind, etag, expires, modified, accessed, data, \
                                    compressed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT (url) DO UPDATE SET \
                 kind = excluded.kind, \
                 etag = excluded.etag, \
                 expires = excluded.expires, \
                 modified = excluded.modified, \
                 accessed = excluded.accessed, \
                 data = excluded.data, \
                 compressed = excluded.compressed",
        )?;
        stmt.execute(params![
            url,
            kind.code(),
            response.etag,
            response.expires,
            response.modified,
            unix_now(),
            blob,
            compressed,
        ])?;
        Ok(true)
    }

    fn get_tile(&self, key: &TileKey) -> Result<Option<Response>, CacheError> {
        let mut stmt = self.store.prepare(
            "SELECT tiles.etag, tiles.expires, tiles.modified, tiles.data, tiles.compressed \
             FROM tilesets, tiles \
             WHERE tilesets.url_template = ?1 \
             AND tilesets.pixel_ratio = ?2 \
             AND tiles.x = ?3 \
             AND tiles.y = ?4 \
             AND tiles.z = ?5 \
             AND tilesets.id = tiles.tileset_id",
        )?;
        let row = stmt
            .query_row(
                params![
                    key.url_template,
                    f64::from(key.pixel_ratio),
                    i64::from(key.x),
                    i64::from(key.y),
                    i64::from(key.z),
                ],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<Timestamp>>(1)?,
                        row.get::<_, Option<Timestamp>>(2)?,
                        row.get::<_, Option<Vec<u8>>>(3)?,
                        row.get::<_, bool>(4)?,
                    ))
                },
            )
            .optional()?;
        row.map(row_to_response).transpose()
    }

    fn put_tile(&self, key: &TileKey, response: &Response) -> Result<bool, CacheError> {
        if response.not_modified {
            let mut stmt = self.store.prepare(
                "UPDATE tiles SET accessed = ?1, expires = ?2 \
                 WHERE tileset_id = ( \
                     SELECT id FROM tilesets \
                     WHERE url_template = ?3 AND pixel_ratio = ?4) \
                 AND x = ?5 AND y = ?6 AND z = ?7",
            )?;
            let updated = stmt.execute(params![
                unix_now(),
                response.expires,
                key.url_template,
                f64::from(key.pixel_ratio),
                i64::from(key.x),
                i64::from(key.y),
                i64::from(key.z),
            ])?;
            return Ok(updated > 0);
        }
        // Upsert the owning tileset first so the tile row's reference is
        // valid; ids stay stable across repeated puts.
        let mut upsert_tileset = self.store.prepare(
            "INSERT OR IGNORE INTO tilesets (url_template, pixel_ratio) VALUES (?1, ?2)",
        )?;
        upsert_tileset.execute(params![key.url_template, f64::from(key.pixel_ratio)])?;

        let (blob, compressed) = encode_payload(response)?;
        let mut stmt = self.store.prepare(
            "INSERT INTO tiles (tileset_id, x, y, z, etag, expires, modified, accessed, data, \
                                compressed) \
             SELECT tilesets.id, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11 \
             FROM tilesets \
             WHERE url_template = ?1 AND pixel_ratio = ?2 \
             ON CONFLICT (tileset_id, x, y, z) DO UPDATE SET \
                 etag = excluded.etag, \
                 expires = excluded.expires, \
                 modified = excluded.modified, \
                 accessed = excluded.accessed, \
                 data = excluded.data, \
                 compressed = excluded.compressed",
        )?;
        stmt.execute(params![
            key.url_template,
            f64::from(key.pixel_ratio),
            i64::from(key.x),
            i64::from(key.y),
            i64::from(key.z),
            response.etag,
            response.expires,
            response.modified,
            unix_now(),
            blob,
            compressed,
        ])?;
        Ok(true)
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &Store {
        &self.store
    }
}

fn row_to_response(
    row: (
        Option<String>,
        Option<Timestamp>,
        Option<Timestamp>,
        Option<Vec<u8>>,
        bool,
    ),
) -> Result<Response, CacheError> {
    let (etag, expires, modified, blob, compressed) = row;
    let mut response = Response {
        etag,
        expires,
        modified,
        ..Response::default()
    };
    match blob {
        None => response.error = Some(ResponseError::NotFound),
        Some(data) if compressed => {
            let decoded = compression::decompress(&data).map_err(CacheError::Decompress)?;
            response.data = Some(Bytes::from(decoded));
        }
        Some(data) => response.data = Some(Bytes::from(data)),
    }
    Ok(response)
}

fn encode_payload(response: &Response) -> Result<(Option<Vec<u8>>, bool), CacheError> {
    let Some(data) = &response.data else {
        // Tombstone: the NULL payload is the marker.
        return Ok((None, false));
    };
    let packed = compression::compress(data).map_err(CacheError::Compress)?;
    if packed.len() < data.len() {
        Ok((Some(packed), true))
    } else {
        Ok((Some(data.to_vec()), false))
    }
}

fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| {
            i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
        })
}

fn decode_definition(encoded: &str) -> Result<RegionDefinition, CacheError> {
    serde_json::from_str(encoded).map_err(CacheError::Definition)
}
