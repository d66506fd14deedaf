//! HTTP implementation of [`OnlineSource`] backed by reqwest.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use mapvault_core::{Resource, Response};
use reqwest::header::{ETAG, USER_AGENT};
use reqwest::{Client, StatusCode};

use super::source::{OnlineSource, TransportError};

/// Default user agent for map resource requests.
pub const DEFAULT_USER_AGENT: &str = "mapvault-offline/0.1";

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for [`HttpOnlineSource`].
#[derive(Debug, Clone)]
pub struct HttpOnlineSourceConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent string sent with every request.
    pub user_agent: String,
}

impl Default for HttpOnlineSourceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

/// Online source that fetches resources over HTTP.
///
/// Status mapping: 404 becomes a cacheable `NotFound` response, 304 a
/// `not_modified` revalidation, any other error status a
/// [`TransportError::Http`]. Freshness headers are left to the caller;
/// only the entity tag is lifted from the response.
#[derive(Debug)]
pub struct HttpOnlineSource {
    client: Client,
    config: HttpOnlineSourceConfig,
}

impl HttpOnlineSource {
    /// Construct a source with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpOnlineSourceConfig::default())
    }

    /// Construct a source with explicit configuration.
    #[must_use]
    pub fn with_config(config: HttpOnlineSourceConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .expect("client builder only fails with invalid configuration");
        Self { client, config }
    }

    /// Override the default user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }
}

impl Default for HttpOnlineSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl OnlineSource for HttpOnlineSource {
    async fn request(&self, resource: &Resource) -> Result<Response, TransportError> {
        let url = resource.url();
        let reply = self
            .client
            .get(&url)
            .timeout(self.config.timeout)
            .header(USER_AGENT, self.config.user_agent.as_str())
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, &url))?;

        let status = reply.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Response::not_found());
        }
        if status == StatusCode::NOT_MODIFIED {
            return Ok(Response::revalidated(None));
        }
        if !status.is_success() {
            return Err(TransportError::Http {
                url,
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_owned(),
            });
        }

        let etag = reply
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let data = reply
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(err, &url))?;
        Ok(Response {
            etag,
            data: Some(data),
            ..Response::default()
        })
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}
