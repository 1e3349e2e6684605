//! The daily-delivery scheduler.
//!
//! Guarantees at most one delivery per user per calendar day, whether a
//! delivery is produced by the overnight batch or on demand when the user
//! opens the app. The `(user, date)` uniqueness lives in the store; the
//! scheduler turns insert conflicts into idempotent outcomes.

use std::{sync::Arc, time::Duration};

use chrono::{Days, NaiveDate, Offset as _, Utc};
use quip_core::{
  joke::Joke,
  store::{InsertDelivery, JokeStore},
};
use rand::{rngs::StdRng, SeedableRng as _};
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};
use uuid::Uuid;

use crate::{recommend::select_next, EngineError};

// ─── Config ──────────────────────────────────────────────────────────────────

fn default_window_days() -> u32 { 30 }
fn default_batch_concurrency() -> usize { 8 }
fn default_on_demand_timeout_ms() -> u64 { 250 }

/// Scheduler tuning. All fields have sensible defaults so a config file can
/// set only what it cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
  /// Days a delivered joke stays excluded from re-selection.
  #[serde(default = "default_window_days")]
  pub window_days:          u32,
  /// Concurrent per-user tasks in the overnight batch.
  #[serde(default = "default_batch_concurrency")]
  pub batch_concurrency:    usize,
  /// Deadline for the on-demand daily lookup.
  #[serde(default = "default_on_demand_timeout_ms")]
  pub on_demand_timeout_ms: u64,
  /// Offset applied to UTC when deciding which calendar day "today" is.
  #[serde(default)]
  pub utc_offset_minutes:   i32,
  /// Fixed RNG seed for reproducible selection; `None` seeds from entropy.
  #[serde(default)]
  pub rng_seed:             Option<u64>,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      window_days:          default_window_days(),
      batch_concurrency:    default_batch_concurrency(),
      on_demand_timeout_ms: default_on_demand_timeout_ms(),
      utc_offset_minutes:   0,
      rng_seed:             None,
    }
  }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of making sure a user has a delivery for a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
  /// A delivery already existed (or a concurrent attempt won the race).
  Existing(Uuid),
  /// A new delivery was recorded for this joke.
  Created(Uuid),
  /// The exclusion window left no candidate at all.
  Exhausted,
}

/// What the user sees when they ask for today's joke.
#[derive(Debug, Clone)]
pub enum DailyOutcome {
  Joke(Joke),
  /// No candidate available today; try again tomorrow.
  Unavailable,
}

/// Counters reported by one overnight batch run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BatchStats {
  /// Eligible users examined.
  pub processed:         u64,
  /// New deliveries recorded.
  pub created:           u64,
  /// Users who already had a delivery for the day.
  pub skipped_existing:  u64,
  /// Users whose exclusion window emptied the pool.
  pub skipped_exhausted: u64,
  /// Users whose task failed or panicked.
  pub failed:            u64,
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

pub struct Scheduler<S> {
  store:  Arc<S>,
  config: SchedulerConfig,
}

// Manual impl; S itself need not be Clone behind the Arc.
impl<S> Clone for Scheduler<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), config: self.config.clone() }
  }
}

impl<S: JokeStore> Scheduler<S> {
  pub fn new(store: Arc<S>, config: SchedulerConfig) -> Self {
    Self { store, config }
  }

  /// Today's calendar date in the configured service timezone.
  pub fn today(&self) -> NaiveDate {
    let offset = chrono::FixedOffset::east_opt(
      self.config.utc_offset_minutes.saturating_mul(60),
    )
    .unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset).date_naive()
  }

  fn window_start(&self, date: NaiveDate) -> NaiveDate {
    date
      .checked_sub_days(Days::new(u64::from(self.config.window_days)))
      .unwrap_or(NaiveDate::MIN)
  }

  fn rng(&self) -> StdRng {
    match self.config.rng_seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    }
  }

  /// Make sure `user_id` has a delivery for `date`, creating one if needed.
  ///
  /// Safe to call any number of times and from concurrent tasks; exactly one
  /// delivery row per `(user, date)` ever exists.
  pub async fn ensure_delivered(
    &self,
    user_id: Uuid,
    date: NaiveDate,
  ) -> Result<DeliveryOutcome, EngineError<S::Error>> {
    if let Some(existing) = self
      .store
      .delivery(user_id, date)
      .await
      .map_err(EngineError::Store)?
    {
      return Ok(DeliveryOutcome::Existing(existing.joke_id));
    }

    let shown = self
      .store
      .recently_shown(user_id, self.window_start(date))
      .await
      .map_err(EngineError::Store)?;

    let mut rng = self.rng();
    let picked = select_next(self.store.as_ref(), user_id, &shown, &mut rng)
      .await
      .map_err(EngineError::Store)?;
    let Some(candidate) = picked else {
      return Ok(DeliveryOutcome::Exhausted);
    };

    match self
      .store
      .insert_delivery(user_id, date, candidate.joke.joke_id)
      .await
      .map_err(EngineError::Store)?
    {
      InsertDelivery::Inserted(delivery) => {
        Ok(DeliveryOutcome::Created(delivery.joke_id))
      }
      InsertDelivery::Conflict(winner) => {
        Ok(DeliveryOutcome::Existing(winner.joke_id))
      }
    }
  }

  /// On-demand path: the user opened the app and wants today's joke.
  ///
  /// Creates the delivery if the batch has not run yet, stamps the
  /// first-viewed timestamp, and returns the joke. The whole lookup runs
  /// under the configured deadline.
  pub async fn today_for(
    &self,
    user_id: Uuid,
  ) -> Result<DailyOutcome, EngineError<S::Error>> {
    let date = self.today();
    let deadline = Duration::from_millis(self.config.on_demand_timeout_ms);

    let work = async {
      let joke_id = match self.ensure_delivered(user_id, date).await? {
        DeliveryOutcome::Existing(id) | DeliveryOutcome::Created(id) => id,
        DeliveryOutcome::Exhausted => return Ok(DailyOutcome::Unavailable),
      };

      self
        .store
        .mark_viewed(user_id, date, Utc::now())
        .await
        .map_err(EngineError::Store)?;

      let joke = self
        .store
        .get_joke(joke_id)
        .await
        .map_err(EngineError::Store)?
        .ok_or(EngineError::MissingJoke(joke_id))?;
      Ok(DailyOutcome::Joke(joke))
    };

    match tokio::time::timeout(deadline, work).await {
      Ok(result) => result,
      Err(_) => Err(EngineError::Timeout),
    }
  }
}

impl<S: JokeStore + 'static> Scheduler<S> {
  /// Run the overnight batch for `date`: one delivery per eligible user.
  ///
  /// Per-user failures are counted and logged, never fatal to the run.
  pub async fn run_daily_batch(
    &self,
    date: NaiveDate,
  ) -> Result<BatchStats, EngineError<S::Error>> {
    let users = self
      .store
      .eligible_users()
      .await
      .map_err(EngineError::Store)?;

    let mut stats = BatchStats {
      processed: users.len() as u64,
      ..BatchStats::default()
    };

    let semaphore =
      Arc::new(Semaphore::new(self.config.batch_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for user_id in users {
      let scheduler = self.clone();
      let semaphore = Arc::clone(&semaphore);
      tasks.spawn(async move {
        let _permit = semaphore.acquire_owned().await.ok();
        (user_id, scheduler.ensure_delivered(user_id, date).await)
      });
    }

    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((_, Ok(DeliveryOutcome::Created(_)))) => stats.created += 1,
        Ok((_, Ok(DeliveryOutcome::Existing(_)))) => {
          stats.skipped_existing += 1
        }
        Ok((user_id, Ok(DeliveryOutcome::Exhausted))) => {
          stats.skipped_exhausted += 1;
          tracing::debug!(%user_id, "no candidate available for daily joke");
        }
        Ok((user_id, Err(error))) => {
          stats.failed += 1;
          tracing::warn!(%user_id, %error, "daily delivery failed");
        }
        Err(error) => {
          stats.failed += 1;
          tracing::warn!(%error, "daily delivery task panicked");
        }
      }
    }

    tracing::info!(
      processed = stats.processed,
      created = stats.created,
      skipped_existing = stats.skipped_existing,
      skipped_exhausted = stats.skipped_exhausted,
      failed = stats.failed,
      %date,
      "daily batch finished"
    );
    Ok(stats)
  }
}
