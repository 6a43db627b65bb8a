//! Shared fakes: a scripted feed, a recording publisher, and a store wrapper
//! that records calls and injects failures.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gallery_relay::error::{Error, Result};
use gallery_relay::feed::FeedSource;
use gallery_relay::model::{FeedEntry, SeenMarker};
use gallery_relay::pipeline::{Poller, PollerConfig, Worker, WorkerConfig};
use gallery_relay::publish::Publisher;
use gallery_relay::store::{
    DedupStore, EnqueueOutcome, JobStatus, LeasedJob, MarkOutcome, MemoryStore, Presence,
    WorkQueue,
};

pub fn entry(id: &str) -> FeedEntry {
    FeedEntry::new(id, format!("title {id}"), format!("https://i.example/{id}"))
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

pub enum FeedScript {
    Entries(Vec<FeedEntry>),
    Upstream(i64),
    Unreachable,
    /// Never answers.
    Hang,
}

pub struct ScriptedFeed {
    script: Mutex<FeedScript>,
}

impl ScriptedFeed {
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        Self {
            script: Mutex::new(FeedScript::Entries(entries)),
        }
    }

    pub fn set(&self, script: FeedScript) {
        *self.script.lock().unwrap() = script;
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch_hot_feed(&self) -> Result<Vec<FeedEntry>> {
        let answer = match &*self.script.lock().unwrap() {
            FeedScript::Entries(entries) => Some(Ok(entries.clone())),
            FeedScript::Upstream(status) => Some(Err(Error::Upstream { status: *status })),
            FeedScript::Unreachable => Some(Err(Error::Fetch("connection refused".to_string()))),
            FeedScript::Hang => None,
        };
        match answer {
            Some(answer) => answer,
            None => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingPublisher {
    pub posted: Mutex<Vec<String>>,
    pub attempts: AtomicUsize,
    failing: AtomicBool,
    hanging: AtomicBool,
    failing_for: Mutex<HashSet<String>>,
}

impl RecordingPublisher {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Never answer until unset.
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    /// Fail any status containing `needle`.
    pub fn fail_when_contains(&self, needle: &str) {
        self.failing_for.lock().unwrap().insert(needle.to_string());
    }

    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, status: &str, media: Option<&[u8]>) -> Result<()> {
        assert!(media.is_none(), "worker should not attach media");
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let targeted = self
            .failing_for
            .lock()
            .unwrap()
            .iter()
            .any(|needle| status.contains(needle.as_str()));
        if self.failing.load(Ordering::SeqCst) || targeted {
            return Err(Error::Publish("503 Service Unavailable".to_string()));
        }
        self.posted.lock().unwrap().push(status.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Failures to inject into [`FaultyStore`].
#[derive(Default)]
pub struct Faults {
    pub lookup: HashSet<String>,
    /// Lookups that never answer.
    pub hang_lookup: HashSet<String>,
    /// Lookups that answer `Unseen` whatever the store holds, as when the
    /// marker lands just after the read.
    pub stale_lookup: HashSet<String>,
    pub enqueue: HashSet<String>,
    pub mark: bool,
    pub delete: bool,
    pub lease: bool,
}

/// A [`MemoryStore`] that records enqueue order and can be told to fail.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub enqueued: Mutex<Vec<String>>,
    pub enqueue_calls: AtomicUsize,
    pub faults: Mutex<Faults>,
}

impl FaultyStore {
    pub fn enqueued(&self) -> Vec<String> {
        self.enqueued.lock().unwrap().clone()
    }

    pub fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap()
    }
}

#[async_trait]
impl DedupStore for FaultyStore {
    async fn lookup(&self, id: &str) -> Result<Presence> {
        if self.faults().lookup.contains(id) {
            return Err(Error::Store("cache unavailable".to_string()));
        }
        if self.faults().hang_lookup.contains(id) {
            std::future::pending::<()>().await;
        }
        if self.faults().stale_lookup.contains(id) {
            return Ok(Presence::Unseen);
        }
        self.inner.lookup(id).await
    }

    async fn marker(&self, id: &str) -> Result<Option<SeenMarker>> {
        self.inner.marker(id).await
    }

    async fn mark_seen(&self, id: &str, ttl: Duration) -> Result<MarkOutcome> {
        if self.faults().mark {
            return Err(Error::Store("cache unavailable".to_string()));
        }
        self.inner.mark_seen(id, ttl).await
    }

    async fn purge_expired(&self) -> Result<u64> {
        self.inner.purge_expired().await
    }
}

#[async_trait]
impl WorkQueue for FaultyStore {
    async fn enqueue_if_absent(
        &self,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<EnqueueOutcome> {
        self.enqueue_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults().enqueue.contains(id) {
            return Err(Error::Queue("queue unavailable".to_string()));
        }
        self.enqueued.lock().unwrap().push(id.to_string());
        self.inner.enqueue_if_absent(id, payload).await
    }

    async fn lease(&self, max: usize, lease: Duration) -> Result<Vec<LeasedJob>> {
        if self.faults().lease {
            return Err(Error::Queue("queue unavailable".to_string()));
        }
        self.inner.lease(max, lease).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.faults().delete {
            return Err(Error::Queue("queue unavailable".to_string()));
        }
        self.inner.delete(id).await
    }

    async fn status(&self, id: &str) -> Result<Option<JobStatus>> {
        self.inner.status(id).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<FaultyStore>,
    pub feed: Arc<ScriptedFeed>,
    pub publisher: Arc<RecordingPublisher>,
    pub poller: Poller,
    pub worker: Worker,
}

impl Harness {
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        Self::with_worker_config(entries, WorkerConfig::default())
    }

    pub fn with_worker_config(entries: Vec<FeedEntry>, config: WorkerConfig) -> Self {
        let store = Arc::new(FaultyStore::default());
        let feed = Arc::new(ScriptedFeed::new(entries));
        let publisher = Arc::new(RecordingPublisher::default());
        let poller = Poller::new(
            feed.clone(),
            store.clone(),
            store.clone(),
            PollerConfig::default(),
        );
        let worker = Worker::new(store.clone(), store.clone(), publisher.clone(), config);
        Self {
            store,
            feed,
            publisher,
            poller,
            worker,
        }
    }

    /// Lifecycle as seen by the underlying store, bypassing injected faults.
    pub async fn lifecycle(&self, id: &str) -> gallery_relay::model::Lifecycle {
        gallery_relay::pipeline::lifecycle_of(&self.store.inner, &self.store.inner, id)
            .await
            .unwrap()
    }
}
