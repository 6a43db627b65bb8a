//! In-process scheduler: drive the poller and the worker on independent
//! timers, for deployments without an external cron hitting the HTTP
//! triggers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info};

use super::{Poller, Worker};

pub struct Scheduler {
    poller: Arc<Poller>,
    worker: Arc<Worker>,
    poll_every: Option<Duration>,
    process_every: Option<Duration>,
    shutdown: Arc<Notify>,
}

fn interval(every: Option<Duration>) -> Option<Interval> {
    every.map(|every| {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    })
}

/// Next tick, or never when the timer is disabled.
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl Clone for Scheduler {
    fn clone(&self) -> Self {
        Self {
            poller: Arc::clone(&self.poller),
            worker: Arc::clone(&self.worker),
            poll_every: self.poll_every,
            process_every: self.process_every,
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl Scheduler {
    /// `None` disables that timer.
    pub fn new(
        poller: Arc<Poller>,
        worker: Arc<Worker>,
        poll_every: Option<Duration>,
        process_every: Option<Duration>,
    ) -> Self {
        Self {
            poller,
            worker,
            poll_every,
            process_every,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal the scheduler to stop after the current run.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run both timers until shutdown. Run errors are logged, never fatal.
    pub async fn run(&self) {
        let mut poll_tick = interval(self.poll_every);
        let mut process_tick = interval(self.process_every);

        info!(
            poll_every = ?self.poll_every,
            process_every = ?self.process_every,
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("scheduler shutting down");
                    return;
                }
                _ = tick(&mut poll_tick) => {
                    if let Err(e) = self.poller.poll().await {
                        error!("scheduled poll failed: {e}");
                    }
                }
                _ = tick(&mut process_tick) => {
                    if let Err(e) = self.worker.process_batch().await {
                        error!("scheduled batch failed: {e}");
                    }
                }
            }
        }
    }
}
