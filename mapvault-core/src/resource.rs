//! Resource identities: bare-URL resources and tile compound keys.

use std::fmt;

/// Classifies what a cached resource is.
///
/// The discriminants double as the storage codes persisted in the cache's
/// `kind` column, so their values must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A resource whose role is not known to the engine.
    Unknown,
    /// A style document.
    Style,
    /// A source description (e.g. a TileJSON document).
    Source,
    /// A raster or vector tile.
    Tile,
    /// A glyph range.
    Glyphs,
    /// A sprite sheet image.
    SpriteImage,
    /// Sprite sheet metadata.
    SpriteJson,
}

impl ResourceKind {
    /// Storage code for the `kind` column.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Style => 1,
            Self::Source => 2,
            Self::Tile => 3,
            Self::Glyphs => 4,
            Self::SpriteImage => 5,
            Self::SpriteJson => 6,
        }
    }

    /// Inverse of [`ResourceKind::code`]; unknown codes map to `Unknown`.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Style,
            2 => Self::Source,
            3 => Self::Tile,
            4 => Self::Glyphs,
            5 => Self::SpriteImage,
            6 => Self::SpriteJson,
            _ => Self::Unknown,
        }
    }
}

/// Compound key identifying one tile of one tileset.
///
/// Tiles are never addressed by a bare URL in the cache; the template plus
/// pixel ratio identify the tileset and `(x, y, z)` the tile within it.
///
/// # Examples
/// ```
/// use mapvault_core::TileKey;
///
/// let key = TileKey::new("https://example.org/{z}-{x}-{y}.vector.pbf", 1.0, 4, 3, 5);
/// assert_eq!(key.url(), "https://example.org/5-4-3.vector.pbf");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TileKey {
    /// URL template containing `{z}`, `{x}` and `{y}` placeholders, and
    /// optionally `{ratio}`.
    pub url_template: String,
    /// Device pixel ratio the tile was rendered for.
    pub pixel_ratio: f32,
    /// Tile column.
    pub x: u32,
    /// Tile row.
    pub y: u32,
    /// Zoom level.
    pub z: u8,
}

impl TileKey {
    /// Construct a tile key.
    pub fn new(url_template: impl Into<String>, pixel_ratio: f32, x: u32, y: u32, z: u8) -> Self {
        Self {
            url_template: url_template.into(),
            pixel_ratio,
            x,
            y,
            z,
        }
    }

    /// Expand the template into a concrete request URL.
    ///
    /// `{ratio}` expands to `@2x` for high-density tilesets and to nothing
    /// otherwise.
    #[must_use]
    pub fn url(&self) -> String {
        let ratio = if self.pixel_ratio > 1.0 { "@2x" } else { "" };
        self.url_template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
            .replace("{ratio}", ratio)
    }
}

/// A single fetchable, cacheable unit.
///
/// Exactly one identification mode applies per resource: either an opaque
/// URL tagged with a [`ResourceKind`], or a tile compound key. The enum
/// makes mixing the two impossible.
///
/// # Examples
/// ```
/// use mapvault_core::{Resource, ResourceKind};
///
/// let style = Resource::style("https://example.org/style.json");
/// assert_eq!(style.kind(), ResourceKind::Style);
///
/// let tile = Resource::tile("https://example.org/{z}/{x}/{y}.pbf", 1.0, 0, 0, 0);
/// assert_eq!(tile.kind(), ResourceKind::Tile);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    /// A resource identified by an opaque URL.
    Generic {
        /// Role of the resource.
        kind: ResourceKind,
        /// Request URL, treated as an opaque cache key.
        url: String,
    },
    /// A tile identified by its compound key.
    Tile(TileKey),
}

impl Resource {
    /// A style document resource.
    pub fn style(url: impl Into<String>) -> Self {
        Self::Generic {
            kind: ResourceKind::Style,
            url: url.into(),
        }
    }

    /// A source description resource.
    pub fn source(url: impl Into<String>) -> Self {
        Self::Generic {
            kind: ResourceKind::Source,
            url: url.into(),
        }
    }

    /// A glyph range resource.
    pub fn glyphs(url: impl Into<String>) -> Self {
        Self::Generic {
            kind: ResourceKind::Glyphs,
            url: url.into(),
        }
    }

    /// A sprite sheet image resource.
    pub fn sprite_image(url: impl Into<String>) -> Self {
        Self::Generic {
            kind: ResourceKind::SpriteImage,
            url: url.into(),
        }
    }

    /// A sprite metadata resource.
    pub fn sprite_json(url: impl Into<String>) -> Self {
        Self::Generic {
            kind: ResourceKind::SpriteJson,
            url: url.into(),
        }
    }

    /// A tile resource.
    pub fn tile(url_template: impl Into<String>, pixel_ratio: f32, x: u32, y: u32, z: u8) -> Self {
        Self::Tile(TileKey::new(url_template, pixel_ratio, x, y, z))
    }

    /// Role of the resource.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Generic { kind, .. } => *kind,
            Self::Tile(_) => ResourceKind::Tile,
        }
    }

    /// Concrete request URL (tile templates are expanded).
    #[must_use]
    pub fn url(&self) -> String {
        match self {
            Self::Generic { url, .. } => url.clone(),
            Self::Tile(key) => key.url(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic { kind, url } => write!(f, "{kind:?} {url}"),
            Self::Tile(key) => write!(
                f,
                "Tile {}/{}/{} of {}",
                key.z, key.x, key.y, key.url_template
            ),
        }
    }
}

/// Codepoints covered by one glyph range resource.
pub const GLYPH_RANGE_SIZE: u32 = 256;

/// Enumerate the glyph ranges covering the Basic Multilingual Plane.
///
/// Yields 256 `(start, end)` pairs: `(0, 255)`, `(256, 511)`, and so on.
/// Each pair substitutes a `{range}` placeholder as `start-end`.
///
/// # Examples
/// ```
/// use mapvault_core::glyph_ranges;
///
/// let ranges: Vec<_> = glyph_ranges().collect();
/// assert_eq!(ranges.len(), 256);
/// assert_eq!(ranges[0], (0, 255));
/// assert_eq!(ranges[255], (65280, 65535));
/// ```
pub fn glyph_ranges() -> impl Iterator<Item = (u32, u32)> {
    (0..GLYPH_RANGE_SIZE).map(|index| {
        let start = index * GLYPH_RANGE_SIZE;
        (start, start + GLYPH_RANGE_SIZE - 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ResourceKind::Unknown)]
    #[case(ResourceKind::Style)]
    #[case(ResourceKind::Source)]
    #[case(ResourceKind::Tile)]
    #[case(ResourceKind::Glyphs)]
    #[case(ResourceKind::SpriteImage)]
    #[case(ResourceKind::SpriteJson)]
    fn kind_codes_round_trip(#[case] kind: ResourceKind) {
        assert_eq!(ResourceKind::from_code(kind.code()), kind);
    }

    #[rstest]
    fn unknown_codes_map_to_unknown() {
        assert_eq!(ResourceKind::from_code(99), ResourceKind::Unknown);
        assert_eq!(ResourceKind::from_code(-1), ResourceKind::Unknown);
    }

    #[rstest]
    fn tile_url_expands_placeholders() {
        let key = TileKey::new("https://t.example/{z}/{x}/{y}{ratio}.png", 1.0, 7, 11, 3);
        assert_eq!(key.url(), "https://t.example/3/7/11.png");
    }

    #[rstest]
    fn tile_url_expands_high_density_ratio() {
        let key = TileKey::new("https://t.example/{z}/{x}/{y}{ratio}.png", 2.0, 7, 11, 3);
        assert_eq!(key.url(), "https://t.example/3/7/11@2x.png");
    }

    #[rstest]
    fn glyph_ranges_cover_the_bmp_contiguously() {
        let mut expected_start = 0;
        for (start, end) in glyph_ranges() {
            assert_eq!(start, expected_start);
            assert_eq!(end, start + 255);
            expected_start = end + 1;
        }
        assert_eq!(expected_start, 65536);
    }
}
