//! User preferences for personalised recommendations.
//!
//! One row per user, created by the account-created event handler the moment
//! the account exists, and mutated only by the owning user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::joke::Joke;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreference {
  pub user_id:              Uuid,
  pub preferred_tones:      Vec<String>,
  pub preferred_contexts:   Vec<String>,
  pub preferred_age_rating: Option<String>,
  pub preferred_language:   Option<String>,
  pub notification_enabled: bool,
  pub onboarding_complete:  bool,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

impl UserPreference {
  /// Whether any preference field is set at all. An all-empty preference is
  /// equivalent to having none.
  pub fn has_any(&self) -> bool {
    !self.preferred_tones.is_empty()
      || !self.preferred_contexts.is_empty()
      || self.preferred_age_rating.is_some()
      || self.preferred_language.is_some()
  }

  /// The conjunctive preference filter: every set field must match, where
  /// multi-valued fields match if the joke has any of the preferred values.
  pub fn matches(&self, joke: &Joke) -> bool {
    if !self.preferred_tones.is_empty()
      && !self.preferred_tones.iter().any(|t| joke.tones.contains(t))
    {
      return false;
    }
    if !self.preferred_contexts.is_empty()
      && !self
        .preferred_contexts
        .iter()
        .any(|c| joke.context_tags.contains(c))
    {
      return false;
    }
    if let Some(rating) = &self.preferred_age_rating
      && *rating != joke.age_rating
    {
      return false;
    }
    if let Some(language) = &self.preferred_language
      && *language != joke.language
    {
      return false;
    }
    true
  }
}

/// Input to [`crate::store::JokeStore::set_preference`]. Replaces every
/// mutable field of the row; timestamps are managed by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceUpdate {
  #[serde(default)]
  pub preferred_tones:      Vec<String>,
  #[serde(default)]
  pub preferred_contexts:   Vec<String>,
  #[serde(default)]
  pub preferred_age_rating: Option<String>,
  #[serde(default)]
  pub preferred_language:   Option<String>,
  #[serde(default)]
  pub notification_enabled: bool,
  #[serde(default)]
  pub onboarding_complete:  bool,
}
