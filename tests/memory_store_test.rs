//! In-memory store: add-if-absent enqueue, exclusive leases, marker expiry.

use std::time::Duration;

use gallery_relay::store::{
    DedupStore, EnqueueOutcome, JobStatus, MarkOutcome, MemoryStore, Presence, WorkQueue,
};
use serde_json::json;

const LEASE: Duration = Duration::from_secs(30);

#[tokio::test]
async fn second_enqueue_of_same_id_is_a_no_op() {
    let store = MemoryStore::new();

    let first = store.enqueue_if_absent("a", json!({"v": 1})).await.unwrap();
    let second = store.enqueue_if_absent("a", json!({"v": 2})).await.unwrap();

    assert_eq!(first, EnqueueOutcome::Added);
    assert_eq!(second, EnqueueOutcome::AlreadyQueued);
    assert_eq!(store.queued_len().unwrap(), 1);

    let jobs = store.lease(10, LEASE).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload, json!({"v": 1}), "first payload kept");
}

#[tokio::test]
async fn enqueue_of_a_leased_id_is_still_a_no_op() {
    let store = MemoryStore::new();
    store.enqueue_if_absent("a", json!({})).await.unwrap();
    store.lease(1, LEASE).await.unwrap();

    let again = store.enqueue_if_absent("a", json!({})).await.unwrap();
    assert_eq!(again, EnqueueOutcome::AlreadyQueued);
}

#[tokio::test]
async fn lease_hands_out_oldest_first_up_to_max() {
    let store = MemoryStore::new();
    for id in ["c", "a", "b"] {
        store.enqueue_if_absent(id, json!({})).await.unwrap();
    }

    let jobs = store.lease(2, LEASE).await.unwrap();
    let ids: Vec<_> = jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, ["c", "a"]);
    assert!(jobs.iter().all(|j| j.deliveries == 1));
}

#[tokio::test(start_paused = true)]
async fn leased_job_is_hidden_until_the_lease_expires() {
    let store = MemoryStore::new();
    store.enqueue_if_absent("a", json!({})).await.unwrap();

    assert_eq!(store.lease(10, LEASE).await.unwrap().len(), 1);
    assert_eq!(store.status("a").await.unwrap(), Some(JobStatus::Leased));
    assert!(store.lease(10, LEASE).await.unwrap().is_empty());

    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(store.lease(10, LEASE).await.unwrap().is_empty());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(store.status("a").await.unwrap(), Some(JobStatus::Ready));
    let again = store.lease(10, LEASE).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].deliveries, 2);
}

#[tokio::test]
async fn deleted_job_is_gone_and_delete_is_idempotent() {
    let store = MemoryStore::new();
    store.enqueue_if_absent("a", json!({})).await.unwrap();
    store.lease(1, LEASE).await.unwrap();

    store.delete("a").await.unwrap();
    store.delete("a").await.unwrap();

    assert_eq!(store.status("a").await.unwrap(), None);
    assert_eq!(store.queued_len().unwrap(), 0);
    assert_eq!(
        store.enqueue_if_absent("a", json!({})).await.unwrap(),
        EnqueueOutcome::Added
    );
}

#[tokio::test(start_paused = true)]
async fn seen_marker_expires_after_its_ttl() {
    let store = MemoryStore::new();
    let ttl = Duration::from_secs(72 * 60 * 60);

    assert_eq!(store.lookup("a").await.unwrap(), Presence::Unseen);
    assert_eq!(store.mark_seen("a", ttl).await.unwrap(), MarkOutcome::Marked);
    assert_eq!(store.lookup("a").await.unwrap(), Presence::Seen);

    tokio::time::advance(ttl - Duration::from_secs(1)).await;
    assert_eq!(store.lookup("a").await.unwrap(), Presence::Seen);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(store.lookup("a").await.unwrap(), Presence::Unseen);
}

#[tokio::test(start_paused = true)]
async fn marking_twice_keeps_the_first_marker() {
    let store = MemoryStore::new();
    let ttl = Duration::from_secs(60);

    store.mark_seen("a", ttl).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(store.mark_seen("a", ttl).await.unwrap(), MarkOutcome::AlreadyMarked);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(store.lookup("a").await.unwrap(), Presence::Unseen);
    assert_eq!(store.mark_seen("a", ttl).await.unwrap(), MarkOutcome::Marked);
}

#[tokio::test(start_paused = true)]
async fn purge_removes_only_expired_markers() {
    let store = MemoryStore::new();
    store.mark_seen("short", Duration::from_secs(10)).await.unwrap();
    store.mark_seen("long", Duration::from_secs(100)).await.unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 0);
    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(store.purge_expired().await.unwrap(), 1);

    assert_eq!(store.lookup("long").await.unwrap(), Presence::Seen);
    assert_eq!(store.lookup("short").await.unwrap(), Presence::Unseen);
}

#[tokio::test(start_paused = true)]
async fn enqueue_is_refused_while_a_marker_is_live() {
    let store = MemoryStore::new();
    let ttl = Duration::from_secs(60);
    store.mark_seen("a", ttl).await.unwrap();

    assert_eq!(
        store.enqueue_if_absent("a", json!({})).await.unwrap(),
        EnqueueOutcome::AlreadySeen
    );
    assert_eq!(store.queued_len().unwrap(), 0);

    tokio::time::advance(ttl).await;
    assert_eq!(
        store.enqueue_if_absent("a", json!({})).await.unwrap(),
        EnqueueOutcome::Added
    );
}

#[tokio::test(start_paused = true)]
async fn marker_reports_wall_clock_expiry_while_live() {
    let store = MemoryStore::new();
    let ttl = Duration::from_secs(72 * 60 * 60);
    assert!(store.marker("a").await.unwrap().is_none());

    let before = chrono::Utc::now();
    store.mark_seen("a", ttl).await.unwrap();
    let marker = store.marker("a").await.unwrap().expect("live marker");

    assert_eq!(marker.id, "a");
    assert!(marker.is_live(before + chrono::Duration::hours(71)));
    assert!(!marker.is_live(before + chrono::Duration::hours(73)));

    tokio::time::advance(ttl).await;
    assert!(store.marker("a").await.unwrap().is_none());
}
