//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar days as `%Y-%m-%d`.
//! Multi-valued slug lists on the preference row are stored as compact JSON.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use quip_core::{
  delivery::Delivery,
  joke::{Joke, TermKind},
  preference::UserPreference,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Timestamps and dates ────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Slug lists ──────────────────────────────────────────────────────────────

pub fn encode_slugs(slugs: &[String]) -> Result<String> {
  Ok(serde_json::to_string(slugs)?)
}

pub fn decode_slugs(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

/// Split a `group_concat` column into a sorted slug list. Sorting gives the
/// multi-valued fields a stable order regardless of join order.
pub fn decode_concat(s: Option<String>) -> Vec<String> {
  let mut slugs: Vec<String> = s
    .as_deref()
    .unwrap_or_default()
    .split(',')
    .filter(|v| !v.is_empty())
    .map(str::to_owned)
    .collect();
  slugs.sort();
  slugs
}

// ─── Taxonomy tables ─────────────────────────────────────────────────────────

/// The table a taxonomy kind lives in. Identifiers are static so they can be
/// interpolated into SQL safely.
pub fn term_table(kind: TermKind) -> &'static str {
  match kind {
    TermKind::Format => "formats",
    TermKind::AgeRating => "age_ratings",
    TermKind::Tone => "tones",
    TermKind::ContextTag => "context_tags",
    TermKind::CultureTag => "culture_tags",
    TermKind::Language => "languages",
    TermKind::Source => "sources",
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read from a `jokes` row with its tag `group_concat` columns.
pub struct RawJoke {
  pub joke_id:     String,
  pub text:        String,
  pub setup:       Option<String>,
  pub punchline:   Option<String>,
  pub search_text: String,
  pub format:      String,
  pub age_rating:  String,
  pub language:    String,
  pub source:      Option<String>,
  pub created_at:  String,
  pub tones:       Option<String>,
  pub contexts:    Option<String>,
  pub cultures:    Option<String>,
}

impl RawJoke {
  pub fn into_joke(self) -> Result<Joke> {
    Ok(Joke {
      joke_id:      decode_uuid(&self.joke_id)?,
      text:         self.text,
      setup:        self.setup,
      punchline:    self.punchline,
      format:       self.format,
      age_rating:   self.age_rating,
      language:     self.language,
      source:       self.source,
      tones:        decode_concat(self.tones),
      context_tags: decode_concat(self.contexts),
      culture_tags: decode_concat(self.cultures),
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `preferences` row.
pub struct RawPreference {
  pub user_id:              String,
  pub preferred_tones:      String,
  pub preferred_contexts:   String,
  pub preferred_age_rating: Option<String>,
  pub preferred_language:   Option<String>,
  pub notification_enabled: bool,
  pub onboarding_complete:  bool,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawPreference {
  pub fn into_preference(self) -> Result<UserPreference> {
    Ok(UserPreference {
      user_id:              decode_uuid(&self.user_id)?,
      preferred_tones:      decode_slugs(&self.preferred_tones)?,
      preferred_contexts:   decode_slugs(&self.preferred_contexts)?,
      preferred_age_rating: self.preferred_age_rating,
      preferred_language:   self.preferred_language,
      notification_enabled: self.notification_enabled,
      onboarding_complete:  self.onboarding_complete,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read from a `deliveries` row.
pub struct RawDelivery {
  pub user_id:         String,
  pub date:            String,
  pub joke_id:         String,
  pub first_viewed_at: Option<String>,
  pub created_at:      String,
}

impl RawDelivery {
  pub fn into_delivery(self) -> Result<Delivery> {
    Ok(Delivery {
      user_id:         decode_uuid(&self.user_id)?,
      date:            decode_date(&self.date)?,
      joke_id:         decode_uuid(&self.joke_id)?,
      first_viewed_at: self
        .first_viewed_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
