//! Focused unit tests covering command configuration and marker handling.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use ortho_config::MergeComposer;
use rstest::rstest;
use serde_json::json;
use srd_core::{EntityStore, EntityType, Manifest, SqliteStore};
use srd_data::test_support::StubJsonFetcher;

use super::helpers::{StubReaderFactory, Workspace, run_cli};
use super::*;
use crate::catalog::{ExportArgs, ExportConfig, ManifestView};
use crate::ingest::{self, DEFAULT_RUN_LABEL, IngestConfig, IngestScope};
use crate::sync::{self, SyncConfig, read_marker, write_marker};

#[rstest]
fn ingest_without_database_names_the_flag_and_variable() {
    let err = IngestConfig::try_from(IngestArgs::default()).expect_err("database is required");
    assert!(
        matches!(
            err,
            CliError::MissingArgument {
                field: ARG_DATABASE,
                env: ENV_INGEST_DATABASE,
            }
        ),
        "unexpected error {err:?}"
    );
    assert_eq!(
        err.to_string(),
        "missing database (set --database or SRD_CMDS_INGEST_DATABASE)"
    );
}

#[rstest]
#[case(None, None, IngestScope::AllEnabled)]
#[case(Some("open5e"), None, IngestScope::Source("open5e".to_owned()))]
#[case(None, Some("open5e_monsters"), IngestScope::Feed("open5e_monsters".to_owned()))]
fn ingest_scope_follows_the_narrowest_selector(
    #[case] source: Option<&str>,
    #[case] feed: Option<&str>,
    #[case] expected: IngestScope,
) {
    let args = IngestArgs {
        database: Some("srd.db".into()),
        source: source.map(str::to_owned),
        feed: feed.map(str::to_owned),
        ..IngestArgs::default()
    };
    let config = IngestConfig::try_from(args).expect("config should build");
    assert_eq!(config.scope, expected);
}

#[rstest]
#[case(None)]
#[case(Some("   "))]
fn blank_labels_fall_back_to_the_default(#[case] label: Option<&str>) {
    let args = IngestArgs {
        database: Some("srd.db".into()),
        label: label.map(str::to_owned),
        ..IngestArgs::default()
    };
    let config = IngestConfig::try_from(args).expect("config should build");
    assert_eq!(config.label, DEFAULT_RUN_LABEL);
    assert_eq!(config.timeout, DEFAULT_TIMEOUT);
}

#[rstest]
fn source_and_feed_selectors_conflict() {
    let err = Cli::try_parse_from([
        "srd",
        "ingest",
        "--database",
        "srd.db",
        "--source",
        "open5e",
        "--feed",
        "open5e_monsters",
    ])
    .expect_err("selectors are exclusive");
    assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
}

#[rstest]
fn ingest_layers_honour_precedence() {
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "database": "/srv/srd/from-file.db",
            "label": "from-file",
            "timeout_secs": 5,
        }),
        None,
    );
    composer.push_environment(json!({ "label": "from-env" }));
    composer.push_cli(json!({ "feed": "open5e_spells" }));

    let config =
        ingest::config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(config.database, "/srv/srd/from-file.db");
    assert_eq!(config.label, "from-env");
    assert_eq!(config.scope, IngestScope::Feed("open5e_spells".to_owned()));
    assert_eq!(config.timeout, std::time::Duration::from_secs(5));
}

#[rstest]
fn malformed_layers_map_to_configuration_errors() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "database": 42 }));

    let err = ingest::config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    assert!(matches!(err, CliError::Configuration(_)), "unexpected error {err:?}");
}

#[rstest]
fn sync_requires_a_server() {
    let args = SyncArgs {
        database: Some("local.db".into()),
        ..SyncArgs::default()
    };
    let err = SyncConfig::try_from(args).expect_err("server is required");
    assert!(
        matches!(
            err,
            CliError::MissingArgument {
                field: ARG_SERVER,
                env: ENV_SYNC_SERVER,
            }
        ),
        "unexpected error {err:?}"
    );
}

#[rstest]
fn sync_parses_since_and_clamps_page_size() {
    let mut composer = MergeComposer::new();
    composer.push_environment(json!({
        "database": "local.db",
        "server": "https://srd.example.test/api/",
    }));
    composer.push_cli(json!({
        "since": "2024-01-01T02:00:00+02:00",
        "page_size": 0,
    }));

    let config =
        sync::config_from_layers_for_test(composer.layers()).expect("merged config should build");
    let expected = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid instant");
    assert_eq!(config.since, Some(expected));
    assert_eq!(config.client.page_size(), 1);
    assert_eq!(config.server, "https://srd.example.test/api/");
}

#[rstest]
fn sync_rejects_malformed_since() {
    let args = SyncArgs {
        database: Some("local.db".into()),
        server: Some("https://srd.example.test/".to_owned()),
        since: Some("yesterday".to_owned()),
        ..SyncArgs::default()
    };
    let err = SyncConfig::try_from(args).expect_err("since must be RFC 3339");
    assert!(
        matches!(err, CliError::InvalidTimestamp { field: ARG_SINCE, .. }),
        "unexpected error {err:?}"
    );
}

#[rstest]
fn markers_survive_a_round_trip() {
    let workspace = Workspace::new();
    let path = workspace.path("state/marker.txt");
    assert_eq!(read_marker(&path).expect("missing marker"), None);

    let marker = Utc
        .with_ymd_and_hms(2024, 3, 1, 12, 30, 0)
        .single()
        .expect("valid instant")
        + ChronoDuration::microseconds(250);
    write_marker(&path, marker).expect("write marker");

    assert_eq!(
        srd_fs::read_utf8(&path).expect("read marker"),
        "2024-03-01T12:30:00.000250Z\n"
    );
    assert_eq!(read_marker(&path).expect("read marker"), Some(marker));
}

#[rstest]
fn garbage_markers_are_rejected() {
    let workspace = Workspace::new();
    let path = workspace.path("marker.txt");
    srd_fs::write_utf8(&path, "not a time").expect("write marker");
    let err = read_marker(&path).expect_err("garbage marker");
    assert!(matches!(err, CliError::InvalidMarker { .. }), "unexpected error {err:?}");
}

#[rstest]
fn export_requires_an_output_directory() {
    let args = ExportArgs {
        database: Some("srd.db".into()),
        output_dir: None,
    };
    let err = ExportConfig::try_from(args).expect_err("output dir is required");
    assert!(
        matches!(
            err,
            CliError::MissingArgument {
                field: ARG_OUTPUT_DIR,
                env: ENV_EXPORT_OUTPUT_DIR,
            }
        ),
        "unexpected error {err:?}"
    );
}

#[rstest]
#[case(Some(0), Some(0), Some(true))]
#[case(Some(0), Some(5), Some(false))]
#[case(None, Some(5), Some(false))]
#[case(Some(5), None, Some(true))]
fn manifest_view_compares_newest_changes(
    #[case] local_offset: Option<i64>,
    #[case] remote_offset: Option<i64>,
    #[case] expected: Option<bool>,
) {
    let manifest = |offset: Option<i64>| Manifest {
        latest_updated_at: offset.map(|seconds| {
            srd_core::test_support::fixed_instant() + ChronoDuration::seconds(seconds)
        }),
        counts: EntityType::ALL.into_iter().map(|kind| (kind, 0)).collect(),
    };
    let view = ManifestView::new(Some(manifest(local_offset)), Some(manifest(remote_offset)));
    assert_eq!(view.up_to_date, expected);
}

#[rstest]
fn manifest_view_without_both_sides_skips_the_comparison() {
    let view = ManifestView::new(Some(Manifest::default()), None);
    assert_eq!(view.up_to_date, None);
    let rendered = serde_json::to_value(&view).expect("serialise view");
    assert_eq!(rendered, json!({"local": {"latestUpdatedAt": null, "counts": {}}}));
}

#[rstest]
fn store_failures_still_print_the_partial_report() {
    let workspace = Workspace::new();
    workspace.register_monster_feed();
    workspace.reject_monster("orc");
    workspace.write_json(
        "monsters.json",
        &json!([
            {"slug": "goblin", "name": "Goblin", "hit_points": 7},
            {"slug": "orc", "name": "Orc", "hit_points": 15}
        ]),
    );
    let readers = StubReaderFactory {
        http: Arc::new(StubJsonFetcher::new()),
    };
    let argv = [
        "srd".to_owned(),
        "ingest".to_owned(),
        format!("--{ARG_DATABASE}"),
        workspace.database().into_string(),
    ];

    let (result, output) = run_cli(&argv, &readers);

    assert!(
        matches!(result, Err(CliError::Ingest(_))),
        "unexpected result {result:?}"
    );
    let printed: serde_json::Value = serde_json::from_str(&output).expect("partial report");
    assert_eq!(printed["runLabel"], DEFAULT_RUN_LABEL);
    assert_eq!(printed["read"], 2);
    assert_eq!(printed["upserted"], 1);
    let store = SqliteStore::open(workspace.database().as_std_path()).expect("reopen catalogue");
    let stored = store.get_all(EntityType::Monster).expect("list monsters");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "goblin");
}
