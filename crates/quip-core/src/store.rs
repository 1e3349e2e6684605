//! The `JokeStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `quip-store-sqlite`).
//! Higher layers (`quip-engine`, `quip-api`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  delivery::Delivery,
  joke::{Joke, NewJoke, Term, TermKind},
  preference::{PreferenceUpdate, UserPreference},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Categorical constraints for [`JokeStore::search`]. Each present field is a
/// conjunctive constraint; multi-valued fields match if the joke has any of
/// the requested slugs. Unknown slugs match nothing rather than erroring.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
  pub format:       Option<String>,
  pub age_rating:   Option<String>,
  pub tones:        Vec<String>,
  pub context_tags: Vec<String>,
  pub culture_tags: Vec<String>,
  pub language:     Option<String>,
}

impl SearchFilters {
  pub fn is_empty(&self) -> bool {
    self.format.is_none()
      && self.age_rating.is_none()
      && self.tones.is_empty()
      && self.context_tags.is_empty()
      && self.culture_tags.is_empty()
      && self.language.is_none()
  }
}

/// Parameters for [`JokeStore::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
  /// Free-text query in web-search grammar; blank is treated as absent.
  pub text:    Option<String>,
  pub filters: SearchFilters,
  pub limit:   Option<usize>,
  pub offset:  Option<usize>,
}

/// A joke plus its popularity, as seen by the recommendation selector.
/// Popularity is the number of save relationships referencing the item.
#[derive(Debug, Clone)]
pub struct Candidate {
  pub joke:       Joke,
  pub save_count: u32,
}

/// Outcome of [`JokeStore::insert_delivery`]. On a `(user, date)` uniqueness
/// violation the store re-reads the winning row itself, so callers never see
/// the race.
#[derive(Debug, Clone)]
pub enum InsertDelivery {
  Inserted(Delivery),
  /// A concurrent insert won; this is the surviving record.
  Conflict(Delivery),
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Quip corpus and delivery store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait JokeStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Taxonomy ──────────────────────────────────────────────────────────

  /// Insert or update a taxonomy term.
  fn put_term(
    &self,
    kind: TermKind,
    term: Term,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_terms(
    &self,
    kind: TermKind,
  ) -> impl Future<Output = Result<Vec<Term>, Self::Error>> + Send + '_;

  /// Delete a taxonomy term. Deleting a format, age rating, or language
  /// still referenced by a joke fails; deleting a source nulls the jokes'
  /// source; deleting a tag drops its associations.
  fn delete_term<'a>(
    &'a self,
    kind: TermKind,
    slug: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Corpus ────────────────────────────────────────────────────────────

  /// Persist a new joke and its tag associations. The searchable text is
  /// derived from the text fields at insert time.
  fn add_joke(
    &self,
    input: NewJoke,
  ) -> impl Future<Output = Result<Joke, Self::Error>> + Send + '_;

  /// Replace the text fields of an existing joke, recomputing the derived
  /// searchable text.
  fn update_joke_text(
    &self,
    joke_id: Uuid,
    text: String,
    setup: Option<String>,
    punchline: Option<String>,
  ) -> impl Future<Output = Result<Joke, Self::Error>> + Send + '_;

  fn get_joke(
    &self,
    joke_id: Uuid,
  ) -> impl Future<Output = Result<Option<Joke>, Self::Error>> + Send + '_;

  /// Full-text search with categorical filters. Results are deduplicated;
  /// with query text they are ordered by descending relevance (ties broken
  /// by joke id), without it by descending creation time. Read-only.
  fn search<'a>(
    &'a self,
    request: &'a SearchRequest,
  ) -> impl Future<Output = Result<Vec<Joke>, Self::Error>> + Send + 'a;

  /// All corpus items minus `excluded`, each with its save count.
  fn candidates<'a>(
    &'a self,
    excluded: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<Candidate>, Self::Error>> + Send + 'a;

  /// Record a save relationship (idempotent per user/joke pair). Exposed for
  /// seeding and tests; collection bookkeeping lives elsewhere.
  fn record_save(
    &self,
    user_id: Uuid,
    joke_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Preferences ───────────────────────────────────────────────────────

  /// Handler for the AccountCreated event: idempotently create the default
  /// preference row for a new user and return it.
  fn account_created(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<UserPreference, Self::Error>> + Send + '_;

  fn preference(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<UserPreference>, Self::Error>> + Send + '_;

  /// Replace the user's preference fields. Fails if the row does not exist.
  fn set_preference(
    &self,
    user_id: Uuid,
    update: PreferenceUpdate,
  ) -> impl Future<Output = Result<UserPreference, Self::Error>> + Send + '_;

  /// Users eligible for the daily batch: onboarding complete.
  fn eligible_users(
    &self,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Deliveries ────────────────────────────────────────────────────────

  fn delivery(
    &self,
    user_id: Uuid,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<Delivery>, Self::Error>> + Send + '_;

  /// Insert a delivery record, guarded by the `(user, date)` uniqueness
  /// invariant. A concurrent duplicate resolves to
  /// [`InsertDelivery::Conflict`] carrying the surviving row.
  fn insert_delivery(
    &self,
    user_id: Uuid,
    date: NaiveDate,
    joke_id: Uuid,
  ) -> impl Future<Output = Result<InsertDelivery, Self::Error>> + Send + '_;

  /// Stamp the first-viewed timestamp, only if previously unset. Returns the
  /// record, or `None` when no delivery exists for the pair.
  fn mark_viewed(
    &self,
    user_id: Uuid,
    date: NaiveDate,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Delivery>, Self::Error>> + Send + '_;

  /// Joke ids delivered to the user on or after `since` — the exclusion
  /// window read.
  fn recently_shown(
    &self,
    user_id: Uuid,
    since: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// The user's delivery history joined with its joke items, newest first.
  fn history(
    &self,
    user_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<(Delivery, Joke)>, Self::Error>> + Send + '_;
}
