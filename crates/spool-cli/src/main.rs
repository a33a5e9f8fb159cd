//! spool - worker server for HTTP-triggered background queues.
//!
//! Settings come from `SPOOL_*` variables (a `.env` file is loaded first);
//! see `spool_core::config`.

mod demo;
mod logger;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use spool_core::app::{AppContext, AsyncTask, BatchQueue, ContextBuilder, CronRunner, WorkerRoutes};
use spool_core::config::{DEFAULT_ENV_PREFIX, QueueConfig, ServerConfig};
use spool_core::impls::{FileStore, HttpTransport, InMemoryScheduler};
use spool_core::ports::{Clock, KeyValueStore, SystemClock};

use crate::demo::{LineLogger, PayloadLogger};
use crate::logger::LogFormat;

#[derive(Parser)]
#[command(name = "spool", about = "HTTP-triggered background queue worker")]
struct Cli {
    /// Log output: text or json
    #[arg(long, env = "SPOOL_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// JSON file holding batches and locks
    #[arg(long, env = "SPOOL_STORE", default_value = "spool-store.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the worker routes and run the health-check loop
    Serve {
        /// Lines to queue and dispatch once the server is up
        #[arg(long = "enqueue")]
        lines: Vec<String>,
        /// Seconds between health-check ticks
        #[arg(long, default_value = "30")]
        cron_tick_secs: u64,
    },
    /// Print the queue status as JSON
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logger::init(cli.log_format, "info")?;

    let queue_config = QueueConfig::from_env(DEFAULT_ENV_PREFIX).context("queue config")?;
    let server = ServerConfig::from_env(DEFAULT_ENV_PREFIX).context("server config")?;
    let ctx = build_context(&cli.store, server).await?;

    match cli.command {
        Commands::Serve {
            lines,
            cron_tick_secs,
        } => serve(ctx, queue_config, lines, Duration::from_secs(cron_tick_secs)).await,
        Commands::Status => {
            let queue = BatchQueue::with_default_pointer(ctx, LineLogger, queue_config);
            let status = queue.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

async fn build_context(store: &Path, server: ServerConfig) -> anyhow::Result<Arc<AppContext>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(store, clock.clone())
            .await
            .with_context(|| format!("open store {}", store.display()))?,
    );
    let ctx = ContextBuilder::new()
        .store(store)
        .scheduler(Arc::new(InMemoryScheduler::new(clock.clone())))
        .transport(Arc::new(HttpTransport::new(clock.clone())?))
        .clock(clock)
        .server(server)
        .build()?;
    Ok(ctx)
}

async fn serve(
    ctx: Arc<AppContext>,
    config: QueueConfig,
    lines: Vec<String>,
    cron_tick: Duration,
) -> anyhow::Result<()> {
    let queue = Arc::new(BatchQueue::with_default_pointer(ctx.clone(), LineLogger, config));
    let job = Arc::new(AsyncTask::with_default_pointer(ctx.clone(), PayloadLogger));

    let mut routes = WorkerRoutes::new();
    queue.register(&mut routes)?;
    job.register(&mut routes)?;

    let mut cron = CronRunner::new(ctx.clone(), cron_tick);
    cron.bind_queue(&queue);
    let cron = cron.spawn();

    let listener = tokio::net::TcpListener::bind(ctx.server.bind)
        .await
        .with_context(|| format!("bind {}", ctx.server.bind))?;
    tracing::info!(addr = %ctx.server.bind, base_url = %ctx.server.base_url, "worker server listening");

    // batches left by an earlier run resume through the health-check
    if !queue.is_queue_empty().await? {
        queue.schedule_event().await?;
    }
    if !lines.is_empty() {
        let count = lines.len();
        for line in lines {
            queue.push(line);
        }
        queue.save().await?;
        queue.dispatch().await?;
        tracing::info!(items = count, "lines queued");
    }

    axum::serve(listener, routes.into_router())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "ctrl-c handler failed");
            }
            tracing::info!("shutdown requested");
        })
        .await
        .context("worker server")?;

    cron.shutdown_and_join().await;
    Ok(())
}
