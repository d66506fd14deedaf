//! Facade crate for the Mapvault offline map engine.
//!
//! This crate re-exports the core value types and the offline cache plus
//! region download engine. The HTTP-backed online source is available
//! behind the `http-source` feature flag.

#![forbid(unsafe_code)]

pub use mapvault_core::{
    DownloadState, GLYPH_RANGE_SIZE, Region, RegionDefinition, RegionDefinitionError,
    RegionStatus, Resource, ResourceKind, Response, ResponseError, TileCoordinates, TileKey,
    Timestamp, glyph_ranges, tile_cover,
};

pub use mapvault_offline::{
    CacheError, DownloadError, OfflineCache, OfflineService, OnlineSource, OpenMode,
    RegionDownload, RegionObserver, SCHEMA_VERSION, Store, StoreError, StyleError, StyleManifest,
    StyleParser, TransportError,
};

#[cfg(feature = "http-source")]
pub use mapvault_offline::{DEFAULT_USER_AGENT, HttpOnlineSource, HttpOnlineSourceConfig};
