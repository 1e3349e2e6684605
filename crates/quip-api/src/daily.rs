//! Handlers for the daily-joke endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/:id/daily/today` | Creates the delivery on demand |
//! | `GET`  | `/users/:id/daily/history` | Newest first, `?limit=` caps it |
//! | `POST` | `/admin/daily-run` | Runs the batch for today, returns stats |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, NaiveDate, Utc};
use quip_core::{joke::Joke, store::JokeStore};
use quip_engine::{BatchStats, DailyOutcome, EngineError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

const DEFAULT_HISTORY_LIMIT: usize = 30;

fn engine_error<E>(error: EngineError<E>) -> ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  match error {
    EngineError::Timeout => {
      ApiError::Unavailable("daily joke lookup timed out".to_owned())
    }
    other => ApiError::Store(Box::new(other)),
  }
}

/// Body of `GET /users/:id/daily/today`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DailyResponse {
  #[serde(rename = "ok")]
  Ready { joke: Joke },
  Unavailable,
}

/// `GET /users/:id/daily/today`
pub async fn today<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<DailyResponse>, ApiError>
where
  S: JokeStore,
{
  let outcome = state.scheduler.today_for(id).await.map_err(engine_error)?;
  let response = match outcome {
    DailyOutcome::Joke(joke) => DailyResponse::Ready { joke },
    DailyOutcome::Unavailable => DailyResponse::Unavailable,
  };
  Ok(Json(response))
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryParams {
  pub limit: Option<usize>,
}

/// One row of `GET /users/:id/daily/history`.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
  pub date:            NaiveDate,
  pub joke:            Joke,
  pub first_viewed_at: Option<DateTime<Utc>>,
}

/// `GET /users/:id/daily/history[?limit=30]` — `(date, joke)` pairs,
/// newest first.
pub async fn history<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: JokeStore,
{
  let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
  let rows = state
    .store
    .history(id, limit)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  let entries = rows
    .into_iter()
    .map(|(delivery, joke)| HistoryEntry {
      date: delivery.date,
      joke,
      first_viewed_at: delivery.first_viewed_at,
    })
    .collect();
  Ok(Json(entries))
}

#[derive(Debug, Deserialize, Default)]
pub struct RunParams {
  /// Re-run the batch for a specific day (`YYYY-MM-DD`); defaults to today.
  pub date: Option<String>,
}

/// `POST /admin/daily-run[?date=YYYY-MM-DD]` — run the batch and report its
/// counters.
pub async fn run_batch<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<RunParams>,
) -> Result<Json<BatchStats>, ApiError>
where
  S: JokeStore + 'static,
{
  let date = match params.date {
    Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
      .map_err(|e| ApiError::BadRequest(format!("invalid date {raw:?}: {e}")))?,
    None => state.scheduler.today(),
  };
  let stats = state
    .scheduler
    .run_daily_batch(date)
    .await
    .map_err(engine_error)?;
  Ok(Json(stats))
}
