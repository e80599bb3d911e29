//! Counters and messages accumulated by an ingestion run.

use std::fmt;

use serde::Serialize;

/// Outcome of ingesting one feed, one source or a whole run.
///
/// Reports add up: a run's report is the sum of its feeds' reports.
/// Messages are kept in full and in the order they were raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    /// Label supplied by the caller to tell runs apart.
    pub run_label: String,
    /// Records yielded by source readers.
    pub read: u64,
    /// Records mapped and written to the store.
    pub upserted: u64,
    /// Records rejected by mapping.
    pub skipped: u64,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
    /// Record-level and feed-level failures.
    pub errors: Vec<String>,
    /// Whether the run stopped early because it was cancelled.
    pub cancelled: bool,
}

impl IngestionReport {
    /// An empty report for `run_label`.
    #[must_use]
    pub fn new(run_label: impl Into<String>) -> Self {
        Self {
            run_label: run_label.into(),
            ..Self::default()
        }
    }

    /// Add the counters and messages of `other` to this report.
    pub fn merge(&mut self, other: Self) {
        self.read += other.read;
        self.upserted += other.upserted;
        self.skipped += other.skipped;
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
        self.cancelled |= other.cancelled;
    }

    /// Whether any record or feed failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl fmt::Display for IngestionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run '{}': read {}, upserted {}, skipped {}, {} warnings, {} errors",
            self.run_label,
            self.read,
            self.upserted,
            self.skipped,
            self.warnings.len(),
            self.errors.len()
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn merging_sums_counters_and_keeps_message_order() {
        let mut run = IngestionReport::new("nightly");
        run.read = 2;
        run.upserted = 2;
        run.warnings.push("first".to_owned());

        let mut feed = IngestionReport::new("nightly");
        feed.read = 3;
        feed.upserted = 1;
        feed.skipped = 2;
        feed.warnings.push("second".to_owned());
        feed.errors.push("broken".to_owned());
        feed.cancelled = true;
        run.merge(feed);

        assert_eq!((run.read, run.upserted, run.skipped), (5, 3, 2));
        assert_eq!(run.warnings, vec!["first", "second"]);
        assert!(run.has_errors());
        assert!(run.cancelled);
    }

    #[rstest]
    fn summaries_fit_on_one_line() {
        let mut report = IngestionReport::new("manual");
        report.read = 1;
        report.upserted = 1;
        assert_eq!(
            report.to_string(),
            "run 'manual': read 1, upserted 1, skipped 0, 0 warnings, 0 errors"
        );
        report.cancelled = true;
        assert!(report.to_string().ends_with("(cancelled)"));
    }

    #[rstest]
    fn reports_serialise_with_wire_names() {
        let value = serde_json::to_value(IngestionReport::new("api")).expect("encode");
        assert_eq!(value["runLabel"], "api");
        assert_eq!(value["upserted"], 0);
    }
}
