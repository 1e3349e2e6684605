//! Quip server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the JSON API over HTTP. A background
//! task runs the daily delivery batch shortly after each midnight in the
//! configured service timezone.
//!
//! # Seeding
//!
//! ```
//! cargo run -p quip-api --bin server -- --seed demo-seed.json
//! ```
//!
//! loads taxonomy terms, jokes, users, and saves from a JSON file and exits.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use chrono::{Days, NaiveTime, Offset as _, Utc};
use clap::Parser;
use quip_api::{AppState, ServerConfig};
use quip_engine::Scheduler;
use quip_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Quip joke discovery server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Load a JSON seed file into the store and exit.
  #[arg(long)]
  seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("QUIP").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Helper mode: load seed data and exit.
  if let Some(seed_path) = cli.seed {
    quip_api::seed::load(&store, &seed_path).await?;
    return Ok(());
  }

  let state =
    AppState::new(Arc::new(store), server_cfg.scheduler.clone());

  tokio::spawn(batch_loop(
    Arc::clone(&state.scheduler),
    server_cfg.scheduler.utc_offset_minutes,
  ));

  let app = quip_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Run the daily batch one minute after each midnight in the service
/// timezone. The batch is idempotent, so an extra run after a restart is
/// harmless.
async fn batch_loop(
  scheduler: Arc<Scheduler<SqliteStore>>,
  utc_offset_minutes: i32,
) {
  let offset =
    chrono::FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
      .unwrap_or_else(|| Utc.fix());

  loop {
    let now = Utc::now().with_timezone(&offset);
    let Some(tomorrow) = now.date_naive().checked_add_days(Days::new(1))
    else {
      return;
    };
    let next_run =
      tomorrow.and_time(NaiveTime::MIN) + chrono::Duration::minutes(1);
    let wait = (next_run - now.naive_local())
      .to_std()
      .unwrap_or(Duration::from_secs(3600));

    tokio::time::sleep(wait).await;

    let date = scheduler.today();
    match scheduler.run_daily_batch(date).await {
      Ok(stats) => {
        tracing::info!(created = stats.created, %date, "overnight batch done")
      }
      Err(error) => tracing::error!(%error, %date, "overnight batch failed"),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
