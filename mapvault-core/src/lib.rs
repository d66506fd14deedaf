//! Core value types for the Mapvault offline map engine.
//!
//! These models are shared between the offline cache and the region
//! downloader: resource identities, cached/fetched responses, offline
//! region definitions, and the pure tile-coverage maths used to enumerate
//! a region's tile closure. Constructors validate their input and return
//! `Result` so invalid definitions surface early.

#![forbid(unsafe_code)]

mod cover;
mod region;
mod resource;
mod response;

pub use cover::{TileCoordinates, tile_cover};
pub use region::{DownloadState, Region, RegionDefinition, RegionDefinitionError, RegionStatus};
pub use resource::{GLYPH_RANGE_SIZE, Resource, ResourceKind, TileKey, glyph_ranges};
pub use response::{Response, ResponseError, Timestamp};
