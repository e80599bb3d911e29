//! Blocking JSON-over-HTTP transport shared by source readers and the sync
//! client.
//!
//! The reader and catalogue traits are synchronous so the engine can be
//! driven from plain threads and the CLI alike. [`HttpTransport`] bridges to
//! `reqwest` by blocking on a Tokio runtime it owns.

use std::collections::BTreeMap;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use url::Url;

/// Error type for [`HttpTransport`] construction failures.
#[derive(Debug)]
pub enum HttpBuildError {
    /// Failed to build the HTTP client.
    HttpClient(reqwest::Error),
    /// Failed to build the Tokio runtime.
    Runtime(std::io::Error),
}

impl std::fmt::Display for HttpBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpClient(err) => write!(f, "failed to build HTTP client: {err}"),
            Self::Runtime(err) => write!(f, "failed to build Tokio runtime: {err}"),
        }
    }
}

impl std::error::Error for HttpBuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::HttpClient(err) => Some(err),
            Self::Runtime(err) => Some(err),
        }
    }
}

/// Failure fetching one JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("GET {url} returned HTTP {status}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
        /// Error text reported by the client.
        message: String,
    },
    /// The request timed out.
    #[error("GET {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The connection failed before a response arrived.
    #[error("GET {url} failed: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Error text reported by the client.
        message: String,
    },
    /// The body was not valid JSON.
    #[error("GET {url} returned invalid JSON: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Parser message.
        message: String,
    },
}

/// Fetches JSON documents.
pub trait JsonFetcher {
    /// GET `url` with `headers` attached and parse the body as JSON.
    fn get_json(&self, url: &Url, headers: &BTreeMap<String, String>)
    -> Result<Value, TransportError>;
}

impl<T: JsonFetcher + ?Sized> JsonFetcher for &T {
    fn get_json(
        &self,
        url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Result<Value, TransportError> {
        (**self).get_json(url, headers)
    }
}

impl<T: JsonFetcher + ?Sized> JsonFetcher for std::sync::Arc<T> {
    fn get_json(
        &self,
        url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Result<Value, TransportError> {
        (**self).get_json(url, headers)
    }
}

/// Default user agent for outbound requests.
pub const DEFAULT_USER_AGENT: &str = "srd-engine/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// `reqwest` client paired with the runtime that drives it.
///
/// When called from outside any Tokio runtime, or from a `current_thread`
/// runtime, requests run on the owned runtime. Inside a multi-threaded
/// runtime the transport uses [`tokio::task::block_in_place`] on the
/// caller's handle to avoid nested runtime panics.
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
    runtime: Runtime,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn new() -> Result<Self, HttpBuildError> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a transport with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn with_config(config: HttpConfig) -> Result<Self, HttpBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(HttpBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(HttpBuildError::Runtime)?;
        Ok(Self {
            client,
            config,
            runtime,
        })
    }

    async fn fetch_json(
        &self,
        url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Result<Value, TransportError> {
        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, url))?;

        response.json().await.map_err(|err| {
            if err.is_decode() {
                TransportError::Decode {
                    url: url.to_string(),
                    message: err.to_string(),
                }
            } else {
                self.convert_reqwest_error(&err, url)
            }
        })
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &Url) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout {
                url: url.to_string(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return TransportError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        TransportError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

impl JsonFetcher for HttpTransport {
    fn get_json(
        &self,
        url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Result<Value, TransportError> {
        debug!("GET {url}");
        // block_in_place requires a multi-threaded runtime; current_thread
        // callers fall back to the owned runtime.
        let future = self.fetch_json(url, headers);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }
    }
}
