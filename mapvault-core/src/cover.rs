//! Web Mercator tile coverage of a geographic bounds rectangle.

use geo::Rect;

/// Latitude limit of the Web Mercator projection; input is clamped here.
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Position of one tile in the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoordinates {
    /// Tile column.
    pub x: u32,
    /// Tile row, counted from the north.
    pub y: u32,
    /// Zoom level.
    pub z: u8,
}

/// Enumerate every tile whose zoom lies in `[min_zoom, max_zoom]` and
/// which intersects `bounds`.
///
/// Bounds use WGS84 coordinates (`x = longitude`, `y = latitude`).
/// Latitudes outside the Web Mercator range are clamped; bounds crossing
/// the antimeridian are not modelled and must be split by the caller.
///
/// # Examples
/// ```
/// use geo::{Coord, Rect};
/// use mapvault_core::tile_cover;
///
/// let world = Rect::new(
///     Coord { x: -180.0, y: -90.0 },
///     Coord { x: 180.0, y: 90.0 },
/// );
/// let tiles = tile_cover(&world, 0, 0);
/// assert_eq!(tiles.len(), 1);
/// assert_eq!((tiles[0].x, tiles[0].y, tiles[0].z), (0, 0, 0));
/// ```
#[must_use]
pub fn tile_cover(bounds: &Rect<f64>, min_zoom: u8, max_zoom: u8) -> Vec<TileCoordinates> {
    let mut tiles = Vec::new();
    if min_zoom > max_zoom {
        return tiles;
    }
    for z in min_zoom..=max_zoom {
        // Northwest corner has the smallest column and row indices.
        let (x_start, y_start) = tile_at(bounds.min().x, bounds.max().y, z);
        let (x_end, y_end) = tile_at(bounds.max().x, bounds.min().y, z);
        for x in x_start..=x_end {
            for y in y_start..=y_end {
                tiles.push(TileCoordinates { x, y, z });
            }
        }
    }
    tiles
}

/// Tile containing the given coordinate at zoom `z`.
fn tile_at(lon: f64, lat: f64, z: u8) -> (u32, u32) {
    let scale = 2f64.powi(i32::from(z));
    let limit = scale - 1.0;

    let x = ((lon + 180.0) / 360.0 * scale).floor().clamp(0.0, limit);

    let clamped = lat
        .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
        .to_radians();
    let y = ((1.0 - (clamped.tan() + 1.0 / clamped.cos()).ln() / std::f64::consts::PI) / 2.0
        * scale)
        .floor()
        .clamp(0.0, limit);

    (x as u32, y as u32)
}
