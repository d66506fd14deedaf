//! Region download orchestration.
//!
//! The downloader walks a region's declarative definition into its full
//! resource closure, resolves each resource cache-first, fetches misses
//! through the [`OnlineSource`], and reports progress to a single-slot
//! observer. Network collaborators live behind traits so the engine never
//! owns transport or style-parsing concerns.

#[cfg(feature = "http-source")]
mod http;
mod region;
mod source;
mod style;

#[cfg(feature = "http-source")]
pub use http::{DEFAULT_USER_AGENT, HttpOnlineSource, HttpOnlineSourceConfig};
pub use region::{DownloadError, RegionDownload, RegionObserver};
pub use source::{OnlineSource, TransportError};
pub use style::{StyleError, StyleManifest, StyleParser};
