//! Integration coverage for on-disk persistence and schema recovery.

use std::fs;

use mapvault_core::{Resource, Response};
use mapvault_offline::{OfflineCache, SCHEMA_VERSION};
use rusqlite::Connection;
use tempfile::TempDir;

fn sample_resource() -> Resource {
    Resource::source("https://example.org/streets.json")
}

#[test]
fn payloads_persist_across_reopen() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("cache.db");
    {
        let cache = OfflineCache::open(&path).expect("open cache");
        cache
            .put(&sample_resource(), &Response::from_data(b"tilejson".to_vec()))
            .expect("put");
        cache.close();
    }
    let cache = OfflineCache::open(&path).expect("reopen cache");
    let cached = cache
        .get(&sample_resource())
        .expect("get")
        .expect("hit after reopen");
    assert_eq!(cached.data.expect("data").as_ref(), b"tilejson");
}

#[test]
fn stale_schema_version_wipes_the_store() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("cache.db");
    {
        let cache = OfflineCache::open(&path).expect("open cache");
        cache
            .put(&sample_resource(), &Response::from_data(b"old".to_vec()))
            .expect("put");
        cache.close();
    }
    {
        // Stamp a version from the future; the next open must recreate.
        let connection = Connection::open(&path).expect("open raw connection");
        connection
            .pragma_update(None, "user_version", 99)
            .expect("stamp stale version");
    }
    {
        let cache = OfflineCache::open(&path).expect("open recreated cache");
        assert!(cache.get(&sample_resource()).expect("get").is_none());
        assert!(cache.list_regions().expect("list").is_empty());
        cache.close();
    }
    let connection = Connection::open(&path).expect("open raw connection");
    let version: i64 = connection
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .expect("read version");
    assert_eq!(version, SCHEMA_VERSION);
}

#[test]
fn foreign_file_is_replaced_with_a_fresh_store() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("cache.db");
    fs::write(&path, b"this was never a database ".repeat(8)).expect("write foreign file");

    let cache = OfflineCache::open(&path).expect("open over foreign file");
    assert!(cache.get(&sample_resource()).expect("get").is_none());
    cache
        .put(&sample_resource(), &Response::from_data(b"fresh".to_vec()))
        .expect("put");
    let cached = cache.get(&sample_resource()).expect("get").expect("hit");
    assert_eq!(cached.data.expect("data").as_ref(), b"fresh");
}

#[test]
fn missing_parent_directories_are_created() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("nested/stores/cache.db");
    let cache = OfflineCache::open(&path).expect("open with nested path");
    cache
        .put(&sample_resource(), &Response::from_data(b"x".to_vec()))
        .expect("put");
    assert!(path.exists());
}
