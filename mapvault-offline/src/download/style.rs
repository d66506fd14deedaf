//! The style-parsing collaborator boundary.
//!
//! Deciding which sub-resources a style references is not this engine's
//! concern; the downloader hands raw style bytes to a [`StyleParser`] and
//! walks whatever it returns.

use thiserror::Error;

/// Sub-resources referenced by a style document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleManifest {
    /// URLs of the referenced source descriptions.
    pub sources: Vec<String>,
    /// URL of the sprite sheet image, if the style uses sprites.
    pub sprite_image: Option<String>,
    /// URL of the sprite metadata document.
    pub sprite_json: Option<String>,
    /// Glyph URL template containing a `{range}` placeholder; the
    /// downloader enumerates every range.
    pub glyph_template: Option<String>,
    /// Tile URL templates; the downloader enumerates the region's tile
    /// cover for each.
    pub tile_templates: Vec<String>,
}

/// Errors raised by a [`StyleParser`].
#[derive(Debug, Error)]
pub enum StyleError {
    /// The style bytes could not be interpreted.
    #[error("malformed style document: {0}")]
    Malformed(String),
}

/// Extracts the set of referenced sub-resources from raw style bytes.
pub trait StyleParser {
    /// Parse `style` and enumerate what it references.
    fn parse(&self, style: &[u8]) -> Result<StyleManifest, StyleError>;
}
