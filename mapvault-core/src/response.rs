//! The cached/fetched payload model shared by the cache and downloader.

use bytes::Bytes;
use thiserror::Error;

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

/// Error attached to a [`Response`].
///
/// `NotFound` is the single cacheable kind: the cache persists it as a
/// tombstone so a confirmed-absent resource is not re-requested. Every
/// other kind is transient and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// The upstream confirmed the resource does not exist.
    #[error("resource not found upstream")]
    NotFound,
    /// The upstream returned a server-side failure.
    #[error("server error: {0}")]
    Server(String),
    /// The request never reached the upstream.
    #[error("connection error: {0}")]
    Connection(String),
    /// Any other failure.
    #[error("request failed: {0}")]
    Other(String),
}

/// Outcome of fetching a resource, from the network or the cache.
///
/// Payload bytes are held in a [`Bytes`] buffer so multiple readers share
/// one allocation. A `not_modified` response carries no payload: it means
/// the upstream confirmed the cached body is still valid and only the
/// freshness metadata should be refreshed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// Entity tag reported by the upstream.
    pub etag: Option<String>,
    /// When the payload stops being fresh.
    pub expires: Option<Timestamp>,
    /// When the payload last changed upstream.
    pub modified: Option<Timestamp>,
    /// Payload bytes; absent for tombstones and revalidations.
    pub data: Option<Bytes>,
    /// Failure attached to this response, if any.
    pub error: Option<ResponseError>,
    /// The upstream confirmed the cached payload is still valid.
    pub not_modified: bool,
}

impl Response {
    /// A successful response carrying `data`.
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// A confirmed-absent response, cacheable as a tombstone.
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            error: Some(ResponseError::NotFound),
            ..Self::default()
        }
    }

    /// A revalidation: refresh `expires` but keep the cached payload.
    #[must_use]
    pub fn revalidated(expires: Option<Timestamp>) -> Self {
        Self {
            expires,
            not_modified: true,
            ..Self::default()
        }
    }

    /// Whether this response records a confirmed-absent resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.error, Some(ResponseError::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_has_no_payload() {
        let response = Response::not_found();
        assert!(response.is_not_found());
        assert!(response.data.is_none());
        assert!(!response.not_modified);
    }

    #[test]
    fn revalidation_refreshes_expiry_only() {
        let response = Response::revalidated(Some(1_700_000_000));
        assert!(response.not_modified);
        assert_eq!(response.expires, Some(1_700_000_000));
        assert!(response.data.is_none());
        assert!(response.error.is_none());
    }

    #[test]
    fn payloads_share_the_underlying_buffer() {
        let response = Response::from_data(vec![1u8, 2, 3]);
        let first = response.data.clone().unwrap();
        let second = response.data.unwrap();
        assert_eq!(first, second);
    }
}
