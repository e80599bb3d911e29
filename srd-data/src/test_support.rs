//! Test doubles for the HTTP seam.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use url::Url;

use crate::http::{JsonFetcher, TransportError};

/// A request observed by [`StubJsonFetcher`]: URL and headers.
pub type RecordedRequest = (String, BTreeMap<String, String>);

/// Serves canned JSON documents keyed by exact URL.
///
/// Unknown URLs answer with HTTP 404. Every request is recorded so tests
/// can assert on pagination and headers.
#[derive(Debug, Default)]
pub struct StubJsonFetcher {
    responses: Mutex<BTreeMap<String, Result<Value, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl StubJsonFetcher {
    /// A stub with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `body`.
    #[must_use]
    pub fn with_response(self, url: impl Into<String>, body: Value) -> Self {
        self.set_response(url, body);
        self
    }

    /// Answer `url` with `error`.
    #[must_use]
    pub fn with_failure(self, url: impl Into<String>, error: TransportError) -> Self {
        self.lock_responses().insert(url.into(), Err(error));
        self
    }

    /// Replace the answer for `url` after construction.
    pub fn set_response(&self, url: impl Into<String>, body: Value) {
        self.lock_responses().insert(url.into(), Ok(body));
    }

    /// Requests seen so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|(url, _)| url).collect()
    }

    fn lock_responses(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<String, Result<Value, TransportError>>> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl JsonFetcher for StubJsonFetcher {
    fn get_json(
        &self,
        url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Result<Value, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((url.to_string(), headers.clone()));
        self.lock_responses()
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| {
                Err(TransportError::Http {
                    url: url.to_string(),
                    status: 404,
                    message: "no canned response".to_owned(),
                })
            })
    }
}
