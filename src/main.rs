//! The mdwatch daemon: wires the cache, the HTTP feed, and the NATS
//! publisher together and runs the watch loop until interrupted.

mod cli;
mod notify;

use crate::cli::Args;
use crate::notify::NatsNotify;
use clap::Parser;
use mdwatch_cache::{Database, Repository};
use mdwatch_config::Config;
use mdwatch_feed::HttpFeed;
use mdwatch_latest::Watcher;
use miette::IntoDiagnostic;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = diagnose(Config::load(args.config.as_deref()))?;

    let db_path = diagnose(config.database.resolve_path())?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).into_diagnostic()?;
    }
    tracing::info!(path = %db_path.display(), "opening cache database");
    let database = diagnose(Database::connect(&db_path).await)?;
    let repo = Repository::from(&database);

    let feed = diagnose(HttpFeed::with_api_url(config.feed.api_url.clone()))?;
    let notify = diagnose(NatsNotify::connect(&config.nats.url).await)?;

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            signal.cancel();
        }
    });

    let watcher = Watcher::new(feed, repo, notify);
    let result = watcher.watch(args.period(), &args.fetch_settings(), &cancel).await;
    database.close().await;
    diagnose(result)?;
    Ok(())
}

/// Turn an error tree into a report at the binary boundary. `exn::Exn`
/// carries its context in its `Debug` rendering rather than a source chain,
/// so the whole tree is formatted into the report here.
fn diagnose<T, K: std::error::Error + Send + Sync>(
    result: Result<T, exn::Exn<K>>,
) -> miette::Result<T> {
    result.map_err(|error| miette::miette!("{error:?}"))
}
