//! HTTP/GraphQL implementation of the Indico submissions client.
//!
//! [`HttpClientFactory`] is what a [`Connector`](indico_connector::Connector)
//! uses in production to turn `init(token, uri)` into a live
//! [`IndicoClient`].

use std::sync::Arc;
use std::time::Duration;

use indico_connector::{ClientFactory, ConnectorConfig, ConnectorError, Result, SubmissionsClient};
use reqwest::Client;
use tracing::debug;
use url::Url;

mod client;
mod queries;

pub use client::IndicoClient;

/// Builds an [`IndicoClient`] per `init` call.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    request_timeout: Duration,
}

impl HttpClientFactory {
    /// Creates a factory whose clients time out each request after `request_timeout`.
    #[must_use]
    pub const fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    /// Creates a factory using the configured per-request timeout.
    #[must_use]
    pub const fn from_config(config: &ConnectorConfig) -> Self {
        Self::new(config.request_timeout())
    }
}

impl ClientFactory for HttpClientFactory {
    fn connect(&self, token: &str, uri: &Url) -> Result<Arc<dyn SubmissionsClient>> {
        let http = Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| ConnectorError::remote(format!("Failed to create HTTP client: {e}")))?;

        debug!(host = %uri, timeout = ?self.request_timeout, "Created HTTP client");
        Ok(Arc::new(IndicoClient::new(http, token, uri.clone())))
    }
}
