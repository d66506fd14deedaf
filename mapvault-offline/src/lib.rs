//! Offline cache and region download engine for a tile-based map client.
//!
//! Responsibilities:
//! - Persist fetched map resources (styles, sources, sprites, glyphs, tiles)
//!   in an embedded SQLite store with compression and conditional-request
//!   semantics.
//! - Maintain a catalog of offline regions and the usage rows tying cached
//!   payloads to the regions that need them.
//! - Drive region downloads: discover a region's resource closure, fetch
//!   what the cache lacks, and report aggregate progress to an observer.
//!
//! Boundaries:
//! - The network transport and the style parser are collaborators behind
//!   the [`OnlineSource`] and [`StyleParser`] traits.
//! - All access to one cache instance stays on a single execution context;
//!   the engine is built around `Rc`/`RefCell` sharing on a current-thread
//!   runtime and download completions funnel back onto that context before
//!   any row is written.

#![forbid(unsafe_code)]

mod cache;
mod compression;
mod download;
mod schema;
mod service;
mod store;

pub use cache::{CacheError, OfflineCache};
pub use download::{
    DownloadError, OnlineSource, RegionDownload, RegionObserver, StyleError, StyleManifest,
    StyleParser, TransportError,
};
#[cfg(feature = "http-source")]
pub use download::{DEFAULT_USER_AGENT, HttpOnlineSource, HttpOnlineSourceConfig};
pub use schema::SCHEMA_VERSION;
pub use service::OfflineService;
pub use store::{OpenMode, Store, StoreError};
