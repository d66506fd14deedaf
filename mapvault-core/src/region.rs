//! Offline region definitions, catalog entries, and download status.

use geo::Rect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by [`RegionDefinition::new`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionDefinitionError {
    /// The minimum zoom exceeded the maximum zoom.
    #[error("minimum zoom {min} exceeds maximum zoom {max}")]
    InvalidZoomRange {
        /// Requested minimum zoom.
        min: u8,
        /// Requested maximum zoom.
        max: u8,
    },
    /// The pixel ratio was zero, negative, or not finite.
    #[error("pixel ratio must be positive and finite")]
    InvalidPixelRatio,
}

/// Declarative description of an area of interest to make available
/// offline.
///
/// Bounds use WGS84 coordinates (`x = longitude`, `y = latitude`); regions
/// crossing the antimeridian must be split by the caller. The definition is
/// serialised for storage and decoded on read; callers should treat the
/// encoding as private to the cache.
///
/// # Examples
/// ```
/// use geo::{Coord, Rect};
/// use mapvault_core::RegionDefinition;
///
/// # fn main() -> Result<(), mapvault_core::RegionDefinitionError> {
/// let definition = RegionDefinition::new(
///     "https://example.org/style.json",
///     Rect::new(Coord { x: -1.0, y: -1.0 }, Coord { x: 1.0, y: 1.0 }),
///     0,
///     4,
///     1.0,
/// )?;
/// assert_eq!(definition.max_zoom, 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDefinition {
    /// URL of the style the region renders.
    pub style_url: String,
    /// Geographic bounds of the region.
    pub bounds: Rect<f64>,
    /// Lowest zoom level to download.
    pub min_zoom: u8,
    /// Highest zoom level to download.
    pub max_zoom: u8,
    /// Device pixel ratio tiles are requested for.
    pub pixel_ratio: f32,
}

impl RegionDefinition {
    /// Validates and constructs a [`RegionDefinition`].
    pub fn new(
        style_url: impl Into<String>,
        bounds: Rect<f64>,
        min_zoom: u8,
        max_zoom: u8,
        pixel_ratio: f32,
    ) -> Result<Self, RegionDefinitionError> {
        if min_zoom > max_zoom {
            return Err(RegionDefinitionError::InvalidZoomRange {
                min: min_zoom,
                max: max_zoom,
            });
        }
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(RegionDefinitionError::InvalidPixelRatio);
        }
        Ok(Self {
            style_url: style_url.into(),
            bounds,
            min_zoom,
            max_zoom,
            pixel_ratio,
        })
    }
}

/// One entry of the offline region catalog.
///
/// `metadata` is an opaque, caller-defined blob returned verbatim; the
/// engine never interprets it. Ids are assigned by the store on creation
/// and never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Store-assigned identifier.
    pub id: i64,
    /// The declarative area of interest.
    pub definition: RegionDefinition,
    /// Opaque caller-defined bytes.
    pub metadata: Vec<u8>,
}

/// Whether a region's downloader is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadState {
    /// No network activity for the region.
    #[default]
    Inactive,
    /// The downloader is discovering and fetching the region's closure.
    Active,
}

/// Aggregate progress of a region download.
///
/// `required_resource_count` grows while the closure is being discovered;
/// `required_resource_count_is_precise` becomes true once the style has
/// been parsed and every tile enumerated. Completion is a condition, not a
/// state: [`RegionStatus::complete`] holds exactly when the discovered
/// closure has been fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionStatus {
    /// Whether the downloader is running.
    pub download_state: DownloadState,
    /// Resources resolved so far, from cache or network.
    pub completed_resource_count: u64,
    /// Bytes newly transferred from the network.
    pub completed_resource_size: u64,
    /// Size of the discovered closure so far.
    pub required_resource_count: u64,
    /// Whether the closure has been fully enumerated.
    pub required_resource_count_is_precise: bool,
}

impl RegionStatus {
    /// True once every discovered resource has been resolved.
    #[must_use]
    pub fn complete(&self) -> bool {
        self.required_resource_count_is_precise
            && self.completed_resource_count == self.required_resource_count
    }
}
