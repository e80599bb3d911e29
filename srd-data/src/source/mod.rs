//! Readers that turn a feed's fetch configuration into raw records.
//!
//! File sources read one local JSON document. HTTP sources follow
//! next-page links until a page has none, yielding the records of every
//! page as one lazy stream. Readers check the cancellation token before
//! each request; stopping between records is left to the caller.

mod file;
mod http;
mod items;

use camino::Utf8PathBuf;
use serde_json::Value;
use srd_core::{SourceDefinition, SourceEntityFeed, SourceKind};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::http::{HttpBuildError, HttpConfig, HttpTransport, TransportError};

pub use file::FileSourceReader;
pub use http::HttpSourceReader;

/// Lazy, single-pass stream of raw records.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<Value, SourceError>> + 'a>;

/// Failure while reading a feed.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source lacks a connection setting its kind requires.
    #[error("source '{source_id}' has no {field} configured")]
    MissingConnection {
        /// Source being read.
        source_id: String,
        /// Name of the missing setting.
        field: &'static str,
    },
    /// The feed names nothing to fetch.
    #[error("feed '{feed_id}' has no path or URL configured")]
    MissingFetchTarget {
        /// Feed being read.
        feed_id: String,
    },
    /// A configured or linked URL could not be parsed.
    #[error("invalid URL '{url}'")]
    InvalidUrl {
        /// Text that failed to parse.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// A local document could not be read.
    #[error("failed to read {path}")]
    Read {
        /// File that failed to open or read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A local document was not valid JSON.
    #[error("{location} is not valid JSON")]
    Parse {
        /// File holding the document.
        location: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// A page request failed.
    #[error(transparent)]
    Fetch(#[from] TransportError),
    /// The items field held a scalar.
    #[error("'{field}' in {location} does not hold records")]
    ItemsNotArray {
        /// Document the field was read from.
        location: String,
        /// Configured items field.
        field: String,
    },
    /// A next-page link pointed back at a page already read, so the feed
    /// was cut short after that page.
    #[error("{url} links back to {link}; pagination stopped")]
    PaginationLoop {
        /// Page holding the offending link.
        url: String,
        /// Link that was already visited.
        link: String,
    },
    /// The cancellation token fired before the next request.
    #[error("reading was cancelled")]
    Cancelled,
}

impl SourceError {
    /// Whether the stream ended early but every record it yielded is sound,
    /// so the condition is worth a warning rather than an error.
    #[must_use]
    pub const fn is_truncation(&self) -> bool {
        matches!(self, Self::PaginationLoop { .. })
    }

    /// Whether the error stems from registry configuration rather than
    /// from the data or the network.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingConnection { .. } | Self::MissingFetchTarget { .. } | Self::InvalidUrl { .. }
        )
    }
}

/// Produces the raw records of one feed.
pub trait SourceReader {
    /// Open `feed` of `source` as a record stream.
    ///
    /// # Errors
    /// Configuration problems and failures before the first record surface
    /// here; later failures arrive as items of the stream, after which the
    /// stream ends.
    fn read(
        &self,
        source: &SourceDefinition,
        feed: &SourceEntityFeed,
        cancel: &CancellationToken,
    ) -> Result<RecordStream<'_>, SourceError>;
}

/// Readers for every [`SourceKind`], dispatched on the source.
pub struct SourceReaders {
    file: FileSourceReader,
    http: Box<dyn SourceReader>,
}

impl std::fmt::Debug for SourceReaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceReaders")
            .field("file", &self.file)
            .field("http", &"<dyn SourceReader>")
            .finish()
    }
}

impl SourceReaders {
    /// Pair the file reader with `http` for HTTP sources.
    #[must_use]
    pub fn new(http: impl SourceReader + 'static) -> Self {
        Self {
            file: FileSourceReader,
            http: Box::new(http),
        }
    }

    /// Readers backed by a live [`HttpTransport`].
    ///
    /// # Errors
    /// Returns [`HttpBuildError`] when the transport cannot be built.
    pub fn with_transport(config: HttpConfig) -> Result<Self, HttpBuildError> {
        let transport = HttpTransport::with_config(config)?;
        Ok(Self::new(HttpSourceReader::new(transport)))
    }

    /// Reader responsible for sources of `kind`.
    #[must_use]
    pub fn reader_for(&self, kind: SourceKind) -> &dyn SourceReader {
        match kind {
            SourceKind::File => &self.file,
            SourceKind::Http => self.http.as_ref(),
        }
    }
}

impl SourceReader for SourceReaders {
    fn read(
        &self,
        source: &SourceDefinition,
        feed: &SourceEntityFeed,
        cancel: &CancellationToken,
    ) -> Result<RecordStream<'_>, SourceError> {
        self.reader_for(source.kind).read(source, feed, cancel)
    }
}
