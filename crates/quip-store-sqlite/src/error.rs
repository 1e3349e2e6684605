//! Error type for `quip-store-sqlite`.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] quip_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("joke not found: {0}")]
  JokeNotFound(Uuid),

  #[error("no preference row for user {0}")]
  PreferenceNotFound(Uuid),

  /// Attempted to delete a required taxonomy term still referenced by jokes.
  #[error("term {0:?} is still referenced by jokes")]
  TermInUse(String),

  /// A delivery insert lost its uniqueness race but the winning row could
  /// not be re-read. Indicates storage corruption, not a caller mistake.
  #[error("delivery for user {0} on {1} vanished after conflict")]
  DeliveryVanished(Uuid, NaiveDate),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
