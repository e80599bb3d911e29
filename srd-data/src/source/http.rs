//! Reader for paginated JSON APIs.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;
use serde_json::Value;
use srd_core::{FetchConfig, SourceDefinition, SourceEntityFeed};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::items::{extract_items, next_page};
use super::{RecordStream, SourceError, SourceReader};
use crate::http::JsonFetcher;

/// Reads a feed from an HTTP endpoint, following next-page links.
///
/// Absolute feed URLs are used as given; relative ones are joined onto the
/// source's `base_url`. Source headers accompany every request.
#[derive(Debug, Clone)]
pub struct HttpSourceReader<F> {
    fetcher: F,
}

impl<F: JsonFetcher> HttpSourceReader<F> {
    /// Read through `fetcher`.
    pub const fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Fetcher used for page requests.
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

impl<F: JsonFetcher> SourceReader for HttpSourceReader<F> {
    fn read(
        &self,
        source: &SourceDefinition,
        feed: &SourceEntityFeed,
        cancel: &CancellationToken,
    ) -> Result<RecordStream<'_>, SourceError> {
        let first = resolve_url(source, feed)?;
        let mut visited = BTreeSet::new();
        visited.insert(first.to_string());
        Ok(Box::new(HttpPages {
            fetcher: &self.fetcher,
            headers: source.connection.headers.clone(),
            fetch: feed.fetch.clone(),
            cancel: cancel.clone(),
            next: Some(first),
            buffer: VecDeque::new(),
            visited,
            pages: 0,
            looped: None,
        }))
    }
}

/// Resolve the first page URL of `feed`.
fn resolve_url(source: &SourceDefinition, feed: &SourceEntityFeed) -> Result<Url, SourceError> {
    let target = feed.fetch.path_or_url.trim();
    if target.is_empty() {
        return Err(SourceError::MissingFetchTarget {
            feed_id: feed.id.clone(),
        });
    }
    if let Ok(absolute) = Url::parse(target) {
        return Ok(absolute);
    }

    let base = source
        .connection
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|base| !base.is_empty())
        .ok_or_else(|| SourceError::MissingConnection {
            source_id: source.id.clone(),
            field: "base_url",
        })?;
    let mut base_url = Url::parse(base).map_err(|err| SourceError::InvalidUrl {
        url: base.to_owned(),
        source: err,
    })?;
    if !base_url.path().ends_with('/') {
        let directory = format!("{}/", base_url.path());
        base_url.set_path(&directory);
    }
    base_url
        .join(target.trim_start_matches('/'))
        .map_err(|err| SourceError::InvalidUrl {
            url: target.to_owned(),
            source: err,
        })
}

/// Lazily fetched pages of one feed.
struct HttpPages<'a, F> {
    fetcher: &'a F,
    headers: BTreeMap<String, String>,
    fetch: FetchConfig,
    cancel: CancellationToken,
    next: Option<Url>,
    buffer: VecDeque<Value>,
    visited: BTreeSet<String>,
    pages: usize,
    looped: Option<SourceError>,
}

impl<F: JsonFetcher> HttpPages<'_, F> {
    fn fetch_page(&mut self, url: &Url) -> Result<(), SourceError> {
        let document = self.fetcher.get_json(url, &self.headers)?;
        let link = next_page(&document, &self.fetch);
        let records = extract_items(document, &self.fetch, url.as_str())?;
        self.pages += 1;
        debug!("page {} of {url} held {} records", self.pages, records.len());
        self.buffer.extend(records);

        if let Some(link) = link {
            let resolved = url.join(&link).map_err(|err| SourceError::InvalidUrl {
                url: link.clone(),
                source: err,
            })?;
            if self.visited.insert(resolved.to_string()) {
                self.next = Some(resolved);
            } else {
                self.looped = Some(SourceError::PaginationLoop {
                    url: url.to_string(),
                    link: resolved.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl<F: JsonFetcher> Iterator for HttpPages<'_, F> {
    type Item = Result<Value, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            let Some(url) = self.next.take() else {
                return self.looped.take().map(Err);
            };
            if self.cancel.is_cancelled() {
                return Some(Err(SourceError::Cancelled));
            }
            if let Err(err) = self.fetch_page(&url) {
                self.buffer.clear();
                return Some(Err(err));
            }
        }
    }
}
