//! Unit tests for the sync client.

use std::cell::Cell;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rstest::{fixture, rstest};
use serde_json::json;
use srd_core::test_support::{MemoryStore, fixed_instant};
use srd_core::{EntityEnvelope, EntityStore, EntityType, ManualClock, Manifest, PageRequest};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::test_support::StubJsonFetcher;

const SERVER: &str = "https://srd.example.test/";

struct Remote {
    clock: Arc<ManualClock>,
    store: MemoryStore,
}

impl Remote {
    fn write(&self, entity_type: EntityType, id: &str) -> DateTime<Utc> {
        self.store
            .upsert(entity_type, id, &json!({"id": id}))
            .expect("remote upsert")
    }
}

#[fixture]
fn remote() -> Remote {
    let clock = Arc::new(ManualClock::new(fixed_instant()));
    let store = MemoryStore::with_clock(clock.clone());
    Remote { clock, store }
}

fn client<'a>(
    remote: &'a Remote,
    local: &'a MemoryStore,
) -> SyncClient<StoreCatalog<&'a MemoryStore>, &'a MemoryStore> {
    SyncClient::new(StoreCatalog(&remote.store), local)
        .with_config(SyncConfig::with_page_size(2))
        .with_clock(remote.clock.clone())
}

#[rstest]
fn first_sync_copies_every_type(remote: Remote) {
    for id in ["bugbear", "goblin", "hobgoblin", "kobold", "orc"] {
        remote.write(EntityType::Monster, id);
    }
    remote.clock.advance(Duration::seconds(1));
    let latest = remote.write(EntityType::Spell, "fireball");

    let local = MemoryStore::default();
    let report = client(&remote, &local)
        .sync_all(None, &CancellationToken::new())
        .expect("sync");

    assert_eq!(report.marker, latest);
    assert_eq!(report.upserted, 6);
    assert_eq!(report.per_type.get(&EntityType::Monster), Some(&5));
    assert_eq!(report.per_type.get(&EntityType::Spell), Some(&1));
    assert_eq!(local.count(EntityType::Monster).expect("count"), 5);
}

#[rstest]
fn repeated_syncs_are_quiet_and_monotonic(remote: Remote) {
    remote.write(EntityType::Monster, "goblin");
    remote.write(EntityType::Armor, "chain-mail");
    let local = MemoryStore::default();
    let sync = client(&remote, &local);
    let cancel = CancellationToken::new();

    let first = sync.sync_all(None, &cancel).expect("first sync");
    let second = sync.sync_all(Some(first.marker), &cancel).expect("second sync");

    assert!(second.marker >= first.marker);
    assert_eq!(second.upserted, 0);
    assert!(second.per_type.is_empty());
}

#[rstest]
fn only_changes_after_the_marker_are_copied(remote: Remote) {
    remote.write(EntityType::Monster, "goblin");
    let local = MemoryStore::default();
    let sync = client(&remote, &local);
    let cancel = CancellationToken::new();
    let first = sync.sync_all(None, &cancel).expect("first sync");

    remote.clock.advance(Duration::minutes(1));
    let changed = remote.write(EntityType::Monster, "orc");
    let second = sync.sync_all(Some(first.marker), &cancel).expect("second sync");

    assert_eq!(second.upserted, 1);
    assert_eq!(second.marker, changed);
    let ids: Vec<_> = local
        .get_all(EntityType::Monster)
        .expect("list")
        .into_iter()
        .map(|entity| entity.id)
        .collect();
    assert_eq!(ids, vec!["goblin", "orc"]);
}

#[rstest]
fn empty_remotes_advance_the_marker_to_now(remote: Remote) {
    remote.clock.advance(Duration::hours(3));
    let local = MemoryStore::default();
    let report = client(&remote, &local)
        .sync_all(None, &CancellationToken::new())
        .expect("sync");
    assert_eq!(report.marker, fixed_instant() + Duration::hours(3));
    assert_eq!(report.upserted, 0);
}

#[rstest]
fn markers_never_move_backwards(remote: Remote) {
    remote.write(EntityType::Monster, "goblin");
    let local = MemoryStore::default();
    let later = fixed_instant() + Duration::days(1);
    let report = client(&remote, &local)
        .sync_all(Some(later), &CancellationToken::new())
        .expect("sync");
    assert_eq!(report.marker, later);
}

/// Writes one more monster the first time a monster page is requested.
struct BusyRemote<'a> {
    inner: StoreCatalog<&'a MemoryStore>,
    remote: &'a Remote,
    written: Cell<bool>,
}

impl RemoteCatalog for BusyRemote<'_> {
    fn manifest(&self) -> Result<Manifest, SyncError> {
        self.inner.manifest()
    }

    fn get_batch(
        &self,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> Result<Vec<EntityEnvelope>, SyncError> {
        if entity_type == EntityType::Monster && !self.written.replace(true) {
            self.remote.clock.advance(Duration::seconds(5));
            self.remote.write(EntityType::Monster, "latecomer");
        }
        self.inner.get_batch(entity_type, updated_since, page)
    }
}

#[rstest]
fn writes_during_a_run_are_caught_by_the_next_one(remote: Remote) {
    let before = remote.write(EntityType::Monster, "goblin");
    let busy = BusyRemote {
        inner: StoreCatalog(&remote.store),
        remote: &remote,
        written: Cell::new(false),
    };
    let local = MemoryStore::default();
    let sync = SyncClient::new(&busy, &local).with_clock(remote.clock.clone());
    let cancel = CancellationToken::new();

    let first = sync.sync_all(None, &cancel).expect("first sync");
    assert_eq!(first.marker, before);

    let second = sync.sync_all(Some(first.marker), &cancel).expect("second sync");
    assert_eq!(second.upserted, 1);
    assert!(second.marker > first.marker);
}

#[rstest]
fn cancellation_is_an_error_so_markers_stay_put(remote: Remote) {
    remote.write(EntityType::Monster, "goblin");
    let local = MemoryStore::default();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client(&remote, &local)
        .sync_all(None, &cancel)
        .expect_err("cancelled");
    assert!(matches!(err, SyncError::Cancelled));
    assert_eq!(local.count(EntityType::Monster).expect("count"), 0);
}

#[rstest]
fn batch_urls_carry_the_wire_parameters() {
    let catalog =
        HttpRemoteCatalog::new(StubJsonFetcher::new(), "https://srd.example.test/api").expect("url");
    let url = catalog
        .batch_url(EntityType::MagicItem, Some(fixed_instant()), PageRequest::new(3, 50))
        .expect("batch url");
    assert_eq!(
        url.as_str(),
        "https://srd.example.test/api/sync/MagicItem?updatedSinceUtc=2024-01-01T00%3A00%3A00.000000Z&page=3&pageSize=50"
    );

    let first = catalog
        .batch_url(EntityType::Monster, None, PageRequest::default())
        .expect("batch url");
    assert_eq!(
        first.as_str(),
        "https://srd.example.test/api/sync/Monster?page=0&pageSize=200"
    );
}

#[rstest]
fn syncs_over_the_wire_protocol() {
    let stub = Arc::new(StubJsonFetcher::new().with_response(
        format!("{SERVER}manifest"),
        json!({"latestUpdatedAt": "2024-01-01T00:00:00Z", "counts": {"Monster": 1}}),
    ));
    for entity_type in EntityType::ALL {
        stub.set_response(format!("{SERVER}sync/{entity_type}?page=0&pageSize=200"), json!([]));
    }
    stub.set_response(
        format!("{SERVER}sync/Monster?page=0&pageSize=200"),
        json!([{
            "entityType": "Monster",
            "id": "goblin",
            "payload": {"id": "goblin", "hit_points": 7},
            "updatedAt": "2024-01-01T00:00:00Z"
        }]),
    );

    let catalog = HttpRemoteCatalog::new(Arc::clone(&stub), SERVER)
        .expect("url")
        .with_header("X-Api-Key", "secret");
    let local = MemoryStore::default();
    let report = SyncClient::new(catalog, &local)
        .sync_all(None, &CancellationToken::new())
        .expect("sync");

    assert_eq!(report.marker, fixed_instant());
    assert_eq!(report.upserted, 1);
    let stored = local.get_all(EntityType::Monster).expect("list");
    assert_eq!(stored[0].payload["hit_points"], 7);
    assert_eq!(stub.requests().len(), 1 + EntityType::ALL.len());
    assert!(
        stub.requests()
            .iter()
            .all(|(_, headers)| headers.get("X-Api-Key").map(String::as_str) == Some("secret"))
    );
}

#[rstest]
fn malformed_manifests_are_decode_errors() {
    let stub = StubJsonFetcher::new().with_response(format!("{SERVER}manifest"), json!("nope"));
    let catalog = HttpRemoteCatalog::new(stub, SERVER).expect("url");
    let err = catalog.manifest().expect_err("malformed");
    assert!(matches!(err, SyncError::Decode { ref document, .. } if document == "manifest"));
}

#[rstest]
fn unreachable_servers_surface_transport_errors() {
    let catalog = HttpRemoteCatalog::new(StubJsonFetcher::new(), SERVER).expect("url");
    let err = catalog.latest_updated_at().expect_err("no manifest");
    assert!(matches!(err, SyncError::Remote(_)));
}
