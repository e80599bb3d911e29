//! Remote catalogue reached over the sync wire protocol.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use serde::de::DeserializeOwned;
use srd_core::{EntityEnvelope, EntityType, Manifest, PageRequest};
use url::Url;

use super::{RemoteCatalog, SyncError};
use crate::http::JsonFetcher;

/// Talks to a server exposing `GET /manifest` and
/// `GET /sync/{entityType}?updatedSinceUtc=&page=&pageSize=`.
#[derive(Debug, Clone)]
pub struct HttpRemoteCatalog<F> {
    fetcher: F,
    base: Url,
    headers: BTreeMap<String, String>,
}

impl<F: JsonFetcher> HttpRemoteCatalog<F> {
    /// Address the server rooted at `base_url`.
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidUrl`] when `base_url` does not parse.
    pub fn new(fetcher: F, base_url: &str) -> Result<Self, SyncError> {
        let mut base = Url::parse(base_url.trim()).map_err(|err| SyncError::InvalidUrl {
            url: base_url.to_owned(),
            source: err,
        })?;
        if !base.path().ends_with('/') {
            let directory = format!("{}/", base.path());
            base.set_path(&directory);
        }
        Ok(Self {
            fetcher,
            base,
            headers: BTreeMap::new(),
        })
    }

    /// Send `name: value` with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Root URL requests are resolved against.
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// URL of one sync page.
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidUrl`] if the path cannot be joined.
    pub fn batch_url(
        &self,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> Result<Url, SyncError> {
        let mut url = self.endpoint(&format!("sync/{entity_type}"))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(since) = updated_since {
                query.append_pair(
                    "updatedSinceUtc",
                    &since.to_rfc3339_opts(SecondsFormat::Micros, true),
                );
            }
            query
                .append_pair("page", &page.page().to_string())
                .append_pair("pageSize", &page.page_size().to_string());
        }
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        self.base.join(path).map_err(|err| SyncError::InvalidUrl {
            url: format!("{}{path}", self.base),
            source: err,
        })
    }

    fn fetch<T: DeserializeOwned>(&self, url: &Url, document: &str) -> Result<T, SyncError> {
        debug!("GET {url}");
        let body = self.fetcher.get_json(url, &self.headers)?;
        serde_json::from_value(body).map_err(|err| SyncError::Decode {
            document: document.to_owned(),
            source: err,
        })
    }
}

impl<F: JsonFetcher> RemoteCatalog for HttpRemoteCatalog<F> {
    fn manifest(&self) -> Result<Manifest, SyncError> {
        let url = self.endpoint("manifest")?;
        self.fetch(&url, "manifest")
    }

    fn get_batch(
        &self,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> Result<Vec<EntityEnvelope>, SyncError> {
        let url = self.batch_url(entity_type, updated_since, page)?;
        self.fetch(&url, &format!("{entity_type} sync page"))
    }
}
