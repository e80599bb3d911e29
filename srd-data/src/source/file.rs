//! Reader for feeds stored as local JSON documents.

use camino::Utf8Path;
use log::debug;
use serde_json::Value;
use srd_core::{SourceDefinition, SourceEntityFeed};
use tokio_util::sync::CancellationToken;

use super::items::extract_items;
use super::{RecordStream, SourceError, SourceReader};

/// Reads a feed from one JSON file.
///
/// The feed path is resolved against the source's `base_path`; without one,
/// relative paths resolve against the working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSourceReader;

impl SourceReader for FileSourceReader {
    fn read(
        &self,
        source: &SourceDefinition,
        feed: &SourceEntityFeed,
        cancel: &CancellationToken,
    ) -> Result<RecordStream<'_>, SourceError> {
        let target = feed.fetch.path_or_url.trim();
        if target.is_empty() {
            return Err(SourceError::MissingFetchTarget {
                feed_id: feed.id.clone(),
            });
        }
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }

        let base = source
            .connection
            .base_path
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .map(Utf8Path::new);
        let path = srd_fs::resolve_against(base, target);
        let text = srd_fs::read_utf8(&path).map_err(|err| SourceError::Read {
            path: path.clone(),
            source: err,
        })?;
        let document: Value = serde_json::from_str(&text).map_err(|err| SourceError::Parse {
            location: path.to_string(),
            source: err,
        })?;
        let records = extract_items(document, &feed.fetch, path.as_str())?;
        debug!("read {} records from {path}", records.len());
        Ok(Box::new(records.into_iter().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use srd_core::{EntityType, FetchConfig, SourceConnection, SourceKind};
    use tempfile::TempDir;

    #[fixture]
    fn library() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        srd_fs::write_utf8(
            &root.join("monsters.json"),
            &json!({"results": [{"slug": "goblin"}, {"slug": "orc"}]}).to_string(),
        )
        .expect("write monsters");
        srd_fs::write_utf8(&root.join("broken.json"), "{\"results\": [").expect("write broken");
        (dir, root)
    }

    fn source(base: &Utf8Path) -> SourceDefinition {
        SourceDefinition::new(
            "local",
            "Local files",
            SourceKind::File,
            SourceConnection::file(base.as_str()),
        )
    }

    fn feed(path: &str) -> SourceEntityFeed {
        SourceEntityFeed::new("local_monsters", "local", EntityType::Monster, "p", FetchConfig::new(path))
    }

    fn read_all(source: &SourceDefinition, feed: &SourceEntityFeed) -> Result<Vec<Value>, SourceError> {
        FileSourceReader
            .read(source, feed, &CancellationToken::new())?
            .collect()
    }

    #[rstest]
    fn reads_records_relative_to_the_base_path(library: (TempDir, Utf8PathBuf)) {
        let (_dir, root) = library;
        let records = read_all(&source(&root), &feed("monsters.json")).expect("records");
        assert_eq!(records, vec![json!({"slug": "goblin"}), json!({"slug": "orc"})]);
    }

    #[rstest]
    fn absolute_feed_paths_ignore_the_base(library: (TempDir, Utf8PathBuf)) {
        let (_dir, root) = library;
        let absolute = root.join("monsters.json");
        let records = read_all(&source(Utf8Path::new("/nowhere")), &feed(absolute.as_str()))
            .expect("records");
        assert_eq!(records.len(), 2);
    }

    #[rstest]
    #[case("missing.json")]
    #[case("broken.json")]
    #[case("")]
    fn unreadable_documents_fail_before_streaming(
        library: (TempDir, Utf8PathBuf),
        #[case] path: &str,
    ) {
        let (_dir, root) = library;
        let err = read_all(&source(&root), &feed(path)).expect_err("unreadable");
        match path {
            "missing.json" => assert!(matches!(err, SourceError::Read { .. })),
            "broken.json" => assert!(matches!(err, SourceError::Parse { .. })),
            _ => assert!(err.is_configuration()),
        }
    }

    #[rstest]
    fn cancelled_reads_do_not_touch_the_disk(library: (TempDir, Utf8PathBuf)) {
        let (_dir, root) = library;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = FileSourceReader.read(&source(&root), &feed("monsters.json"), &cancel);
        assert!(matches!(result, Err(SourceError::Cancelled)));
    }
}
