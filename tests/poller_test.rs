//! Poller reconciliation: ordering, dedup, per-entry failure isolation.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FeedScript, Harness, entry};
use gallery_relay::error::Error;
use gallery_relay::model::{Lifecycle, PublishJob};
use gallery_relay::pipeline::PollReport;
use gallery_relay::store::{DedupStore, WorkQueue};

#[tokio::test]
async fn entries_are_enqueued_oldest_first() {
    // The feed lists newest first.
    let h = Harness::new(vec![entry("2"), entry("1")]);

    let report = h.poller.poll().await.unwrap();

    assert_eq!(h.store.enqueued(), ["1", "2"]);
    assert_eq!(
        report,
        PollReport {
            entries: 2,
            enqueued: 2,
            ..PollReport::default()
        }
    );
    assert_eq!(h.lifecycle("1").await, Lifecycle::Queued);
    assert_eq!(h.lifecycle("2").await, Lifecycle::Queued);
}

#[tokio::test]
async fn queued_payload_is_the_rendered_job() {
    let e = entry("x").cover("cv");
    let h = Harness::new(vec![e.clone()]);
    h.poller.poll().await.unwrap();

    let jobs = h.store.inner.lease(1, Duration::from_secs(30)).await.unwrap();
    let job: PublishJob = serde_json::from_value(jobs[0].payload.clone()).unwrap();
    assert_eq!(job, PublishJob::from_entry(&e));
}

#[tokio::test]
async fn seen_entry_is_not_enqueued() {
    let h = Harness::new(vec![entry("a"), entry("b")]);
    h.store
        .inner
        .mark_seen("a", Duration::from_secs(3600))
        .await
        .unwrap();

    let report = h.poller.poll().await.unwrap();

    assert_eq!(h.store.enqueued(), ["b"]);
    assert_eq!(report.seen, 1);
    assert_eq!(report.enqueued, 1);
}

#[tokio::test]
async fn repeated_poll_does_not_duplicate_jobs() {
    let h = Harness::new(vec![entry("a")]);

    h.poller.poll().await.unwrap();
    let report = h.poller.poll().await.unwrap();

    assert_eq!(report.already_queued, 1);
    assert_eq!(report.enqueued, 0);
    assert_eq!(h.store.inner.queued_len().unwrap(), 1);
}

#[tokio::test]
async fn lookup_failure_skips_only_that_entry() {
    let h = Harness::new(vec![entry("c"), entry("b"), entry("a")]);
    h.store.faults().lookup.insert("b".to_string());

    let report = h.poller.poll().await.unwrap();

    assert_eq!(h.store.enqueued(), ["a", "c"]);
    assert_eq!(report.failed, 1);
    assert_eq!(report.enqueued, 2);
    assert_eq!(h.lifecycle("b").await, Lifecycle::Unseen);
}

#[tokio::test]
async fn enqueue_failure_continues_with_the_next_entry() {
    let h = Harness::new(vec![entry("c"), entry("b"), entry("a")]);
    h.store.faults().enqueue.insert("a".to_string());

    let report = h.poller.poll().await.unwrap();

    assert_eq!(h.store.enqueue_calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.failed, 1);
    assert_eq!(h.lifecycle("b").await, Lifecycle::Queued);
    assert_eq!(h.lifecycle("c").await, Lifecycle::Queued);

    // Picked up by the next poll once the queue recovers.
    h.store.faults().enqueue.clear();
    let report = h.poller.poll().await.unwrap();
    assert_eq!(report.enqueued, 1);
    assert_eq!(h.lifecycle("a").await, Lifecycle::Queued);
}

#[tokio::test]
async fn unreachable_feed_aborts_without_enqueueing() {
    let h = Harness::new(vec![entry("a")]);
    h.feed.set(FeedScript::Unreachable);

    let err = h.poller.poll().await.unwrap_err();

    assert!(matches!(err, Error::Fetch(_)), "got {err:?}");
    assert_eq!(h.store.enqueue_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upstream_failure_aborts_without_enqueueing() {
    let h = Harness::new(vec![entry("a")]);
    h.feed.set(FeedScript::Upstream(403));

    let err = h.poller.poll().await.unwrap_err();

    assert!(matches!(err, Error::Upstream { status: 403 }), "got {err:?}");
    assert_eq!(h.store.enqueue_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_feed_is_a_successful_no_op() {
    let h = Harness::new(vec![]);
    let report = h.poller.poll().await.unwrap();
    assert_eq!(report, PollReport::default());
}

#[tokio::test(start_paused = true)]
async fn poll_purges_expired_markers() {
    let h = Harness::new(vec![]);
    h.store
        .inner
        .mark_seen("old", Duration::from_secs(5))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;

    h.poller.poll().await.unwrap();

    assert_eq!(h.store.inner.purge_expired().await.unwrap(), 0);
}
