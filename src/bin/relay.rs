//! relay CLI: run the gallery relay as a server or one step at a time.

use gallery_relay::config::{Config, Settings};
use gallery_relay::db::Db;
use gallery_relay::feed::ImgurFeed;
use gallery_relay::pipeline::{Poller, Scheduler, Worker, lifecycle_of};
use gallery_relay::publish::StatusPublisher;
use gallery_relay::server::{self, AppState};
use gallery_relay::store::{DedupStore, MemoryStore, WorkQueue};
use gallery_relay::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Parser)]
#[command(name = "relay", about = "Relay hot-gallery entries to a social feed")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the /tasks/poll and /tasks/process triggers
    Serve {
        /// Listen address (overrides BIND_ADDR)
        #[arg(long)]
        bind: Option<String>,
        /// Also poll in-process every N seconds
        #[arg(long)]
        poll_every: Option<u64>,
        /// Also process a batch in-process every N seconds
        #[arg(long)]
        process_every: Option<u64>,
    },
    /// Run a single poll and print its report
    Poll,
    /// Process a single batch and print its report
    Process,
    /// Show where an entry id is in the pipeline
    Status {
        /// Feed entry id
        id: String,
    },
}

struct Stores {
    store: Arc<dyn DedupStore>,
    queue: Arc<dyn WorkQueue>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "gallery-relay".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let outcome = run(cli.command, &config).await;
    guard.force_flush();
    outcome
}

async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let stores = open_stores(config).await?;

    match command {
        Command::Serve {
            bind,
            poll_every,
            process_every,
        } => cmd_serve(config, stores, bind, poll_every, process_every).await,
        Command::Poll => {
            let poller = build_poller(config, &stores)?;
            let report = poller.poll().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Process => {
            let worker = build_worker(config, &stores)?;
            let report = worker.process_batch().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Status { id } => {
            let state = lifecycle_of(stores.store.as_ref(), stores.queue.as_ref(), &id).await?;
            match stores.store.marker(&id).await? {
                Some(marker) => println!("{id}: {state} (until {})", marker.expires_at),
                None => println!("{id}: {state}"),
            }
            Ok(())
        }
    }
}

async fn open_stores(config: &Config) -> anyhow::Result<Stores> {
    match config.database_url {
        Some(ref url) => {
            let db = Db::connect(url.expose_secret()).await?;
            db.migrate().await?;
            let db = Arc::new(db);
            let store: Arc<dyn DedupStore> = db.clone();
            Ok(Stores { store, queue: db })
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store (single process, lost on exit)");
            let memory = Arc::new(MemoryStore::new());
            let store: Arc<dyn DedupStore> = memory.clone();
            Ok(Stores {
                store,
                queue: memory,
            })
        }
    }
}

fn build_poller(config: &Config, stores: &Stores) -> anyhow::Result<Poller> {
    let settings = Settings::load_or_default(&config.settings_path);
    let feed = ImgurFeed::new(settings.feed_credentials(), config.poller.fetch_timeout)?;
    Ok(Poller::new(
        Arc::new(feed),
        Arc::clone(&stores.store),
        Arc::clone(&stores.queue),
        config.poller.clone(),
    ))
}

fn build_worker(config: &Config, stores: &Stores) -> anyhow::Result<Worker> {
    let settings = Settings::load_or_default(&config.settings_path);
    let publisher = StatusPublisher::new(
        settings.publisher_credentials(),
        config.worker.publish_timeout,
    )?;
    Ok(Worker::new(
        Arc::clone(&stores.store),
        Arc::clone(&stores.queue),
        Arc::new(publisher),
        config.worker.clone(),
    ))
}

async fn cmd_serve(
    config: &Config,
    stores: Stores,
    bind: Option<String>,
    poll_every: Option<u64>,
    process_every: Option<u64>,
) -> anyhow::Result<()> {
    let poller = Arc::new(build_poller(config, &stores)?);
    let worker = Arc::new(build_worker(config, &stores)?);

    let scheduler = Scheduler::new(
        Arc::clone(&poller),
        Arc::clone(&worker),
        poll_every.map(Duration::from_secs),
        process_every.map(Duration::from_secs),
    );
    if poll_every.is_some() || process_every.is_some() {
        let sched = scheduler.clone();
        tokio::spawn(async move { sched.run().await });
    }

    let state = Arc::new(AppState {
        poller,
        worker,
        queue: stores.queue,
    });
    let bind = bind.unwrap_or_else(|| config.bind_addr.clone());
    server::serve(&bind, state, async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;
    scheduler.shutdown();
    Ok(())
}
