//! Joke and taxonomy types.
//!
//! A joke carries free text (primary text plus an optional two-part
//! setup/punchline) and a set of categorical attributes. The three required
//! single-valued attributes (format, age rating, language) are referenced by
//! slug and protected against deletion while in use; the optional source is
//! nulled out when its term is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Taxonomy ────────────────────────────────────────────────────────────────

/// The seven taxonomy families a slug can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermKind {
  /// Joke format: one-liner, setup-punchline, short-story.
  Format,
  /// Age rating: kid-safe, teen, adult, family-friendly.
  AgeRating,
  /// Humor tone: clean, dark, dad-jokes, puns, sarcasm.
  Tone,
  /// Context/situation: wedding, work, school, icebreaker.
  ContextTag,
  /// Cultural context: american, british, universal.
  CultureTag,
  /// Language, keyed by ISO 639-1 code.
  Language,
  /// Source attribution.
  Source,
}

impl TermKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Format => "format",
      Self::AgeRating => "age-rating",
      Self::Tone => "tone",
      Self::ContextTag => "context-tag",
      Self::CultureTag => "culture-tag",
      Self::Language => "language",
      Self::Source => "source",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "format" => Ok(Self::Format),
      "age-rating" => Ok(Self::AgeRating),
      "tone" => Ok(Self::Tone),
      "context-tag" => Ok(Self::ContextTag),
      "culture-tag" => Ok(Self::CultureTag),
      "language" => Ok(Self::Language),
      "source" => Ok(Self::Source),
      other => Err(Error::UnknownTermKind(other.to_owned())),
    }
  }
}

/// A single taxonomy term. Languages use their ISO 639-1 code as the slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
  pub slug:        String,
  pub name:        String,
  #[serde(default)]
  pub description: String,
}

// ─── Joke ────────────────────────────────────────────────────────────────────

/// A corpus item. Created and updated by content management; never deleted
/// while referenced by delivery or preference records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Joke {
  pub joke_id:      Uuid,
  /// Full joke text for one-liners, or the complete joke.
  pub text:         String,
  /// Setup for two-part jokes.
  pub setup:        Option<String>,
  /// Punchline for two-part jokes.
  pub punchline:    Option<String>,
  pub format:       String,
  pub age_rating:   String,
  pub language:     String,
  pub source:       Option<String>,
  pub tones:        Vec<String>,
  pub context_tags: Vec<String>,
  pub culture_tags: Vec<String>,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::JokeStore::add_joke`].
/// `joke_id` and `created_at` are always assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJoke {
  pub text:         String,
  #[serde(default)]
  pub setup:        Option<String>,
  #[serde(default)]
  pub punchline:    Option<String>,
  pub format:       String,
  pub age_rating:   String,
  pub language:     String,
  #[serde(default)]
  pub source:       Option<String>,
  #[serde(default)]
  pub tones:        Vec<String>,
  #[serde(default)]
  pub context_tags: Vec<String>,
  #[serde(default)]
  pub culture_tags: Vec<String>,
}
