//! The online data source boundary.

use std::io;

use async_trait::async_trait;
use mapvault_core::{Resource, Response};
use thiserror::Error;

/// Transport-level failures raised by an [`OnlineSource`].
///
/// These are the hard errors: they surface to the caller or observer and
/// are never persisted. A confirmed-absent resource is not a transport
/// error; sources report it as a [`Response`] carrying
/// [`mapvault_core::ResponseError::NotFound`] so the cache can tombstone
/// it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server answered with an error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short description supplied by the server or transport.
        message: String,
    },
    /// The request never completed.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        #[source]
        source: io::Error,
    },
}

/// The only network path of the engine.
///
/// Implementations receive a fully specified [`Resource`] (URL or tile
/// compound key) and resolve to a [`Response`] — success, `NotFound`, or a
/// [`TransportError`]. Retry policy, if any, belongs to the
/// implementation; the engine never retries.
#[async_trait(?Send)]
pub trait OnlineSource {
    /// Fetch one resource from the network.
    async fn request(&self, resource: &Resource) -> Result<Response, TransportError>;
}
