//! Delivery records — the audit trail of daily jokes.
//!
//! At most one record exists per (user, date) pair; that uniqueness is the
//! central invariant the scheduler preserves, and the storage layer enforces
//! it with a composite primary key. Records are never deleted and only ever
//! updated to stamp the first-view timestamp.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
  pub user_id:         Uuid,
  /// Calendar day in the reference timezone, not a timestamp.
  pub date:            NaiveDate,
  pub joke_id:         Uuid,
  /// Stamped once, on the user's first on-demand view of the record.
  pub first_viewed_at: Option<DateTime<Utc>>,
  pub created_at:      DateTime<Utc>,
}
