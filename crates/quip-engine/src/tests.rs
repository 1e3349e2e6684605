use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use quip_core::{
  delivery::Delivery,
  joke::{Joke, NewJoke, Term, TermKind},
  preference::{PreferenceUpdate, UserPreference},
  store::{Candidate, InsertDelivery, JokeStore, SearchRequest},
};
use quip_store_sqlite::SqliteStore;
use rand::{rngs::StdRng, SeedableRng as _};
use uuid::Uuid;

use crate::{
  recommend::select_next, DeliveryOutcome, EngineError, Scheduler,
  SchedulerConfig,
};

fn term(slug: &str) -> Term {
  Term {
    slug:        slug.to_owned(),
    name:        slug.to_owned(),
    description: String::new(),
  }
}

async fn seeded_store() -> SqliteStore {
  let store = SqliteStore::open_in_memory().await.unwrap();
  for (kind, slugs) in [
    (TermKind::Format, &["one-liner"][..]),
    (TermKind::AgeRating, &["kid-safe"][..]),
    (TermKind::Language, &["en"][..]),
    (TermKind::Tone, &["clean", "puns", "dark"][..]),
  ] {
    for slug in slugs {
      store.put_term(kind, term(slug)).await.unwrap();
    }
  }
  store
}

async fn add_joke(store: &SqliteStore, text: &str, tone: &str) -> Uuid {
  store
    .add_joke(NewJoke {
      text:         text.to_owned(),
      setup:        None,
      punchline:    None,
      format:       "one-liner".to_owned(),
      age_rating:   "kid-safe".to_owned(),
      language:     "en".to_owned(),
      source:       None,
      tones:        vec![tone.to_owned()],
      context_tags: vec![],
      culture_tags: vec![],
    })
    .await
    .unwrap()
    .joke_id
}

async fn onboarded_user(store: &SqliteStore, tones: &[&str]) -> Uuid {
  let user = Uuid::new_v4();
  store.account_created(user).await.unwrap();
  store
    .set_preference(user, PreferenceUpdate {
      preferred_tones: tones.iter().map(|s| (*s).to_owned()).collect(),
      onboarding_complete: true,
      ..Default::default()
    })
    .await
    .unwrap();
  user
}

fn scheduler(store: &SqliteStore) -> Scheduler<SqliteStore> {
  Scheduler::new(Arc::new(store.clone()), SchedulerConfig {
    rng_seed: Some(7),
    ..Default::default()
  })
}

fn day(s: &str) -> NaiveDate { NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap() }

// ─── select_next ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn preference_beats_popularity() {
  let store = seeded_store().await;
  let punny = add_joke(&store, "a pun", "puns").await;
  let popular = add_joke(&store, "a crowd pleaser", "clean").await;
  for _ in 0..5 {
    store.record_save(Uuid::new_v4(), popular).await.unwrap();
  }
  let user = onboarded_user(&store, &["puns"]).await;

  let mut rng = StdRng::seed_from_u64(7);
  let picked = select_next(&store, user, &[], &mut rng)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(picked.joke.joke_id, punny);
}

#[tokio::test]
async fn unmatched_preference_falls_back_to_full_pool() {
  let store = seeded_store().await;
  let only = add_joke(&store, "a clean joke", "clean").await;
  let user = onboarded_user(&store, &["dark"]).await;

  let mut rng = StdRng::seed_from_u64(7);
  let picked = select_next(&store, user, &[], &mut rng)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(picked.joke.joke_id, only);
}

#[tokio::test]
async fn most_saved_candidate_wins() {
  let store = seeded_store().await;
  let modest = add_joke(&store, "a", "clean").await;
  let favorite = add_joke(&store, "b", "clean").await;
  store.record_save(Uuid::new_v4(), modest).await.unwrap();
  for _ in 0..3 {
    store.record_save(Uuid::new_v4(), favorite).await.unwrap();
  }

  let mut rng = StdRng::seed_from_u64(7);
  let picked = select_next(&store, Uuid::new_v4(), &[], &mut rng)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(picked.joke.joke_id, favorite);
  assert_eq!(picked.save_count, 3);
}

#[tokio::test]
async fn exhausted_pool_yields_none() {
  let store = seeded_store().await;
  let a = add_joke(&store, "a", "clean").await;
  let b = add_joke(&store, "b", "clean").await;

  let mut rng = StdRng::seed_from_u64(7);
  let picked = select_next(&store, Uuid::new_v4(), &[a, b], &mut rng)
    .await
    .unwrap();
  assert!(picked.is_none());
}

// ─── ensure_delivered ────────────────────────────────────────────────────────

#[tokio::test]
async fn ensure_delivered_is_idempotent() {
  let store = seeded_store().await;
  add_joke(&store, "a", "clean").await;
  let user = onboarded_user(&store, &[]).await;
  let scheduler = scheduler(&store);
  let date = day("2026-08-24");

  let first = scheduler.ensure_delivered(user, date).await.unwrap();
  let DeliveryOutcome::Created(joke_id) = first else {
    panic!("expected a new delivery, got {first:?}");
  };

  let second = scheduler.ensure_delivered(user, date).await.unwrap();
  assert_eq!(second, DeliveryOutcome::Existing(joke_id));
  assert_eq!(store.history(user, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn window_excludes_recent_deliveries() {
  let store = seeded_store().await;
  let shown = add_joke(&store, "seen yesterday", "clean").await;
  let unseen = add_joke(&store, "still fresh", "clean").await;
  let user = onboarded_user(&store, &[]).await;
  store
    .insert_delivery(user, day("2026-08-23"), shown)
    .await
    .unwrap();

  let outcome = scheduler(&store)
    .ensure_delivered(user, day("2026-08-24"))
    .await
    .unwrap();
  assert_eq!(outcome, DeliveryOutcome::Created(unseen));
}

#[tokio::test]
async fn empty_window_pool_is_exhausted() {
  let store = seeded_store().await;
  let only = add_joke(&store, "the whole corpus", "clean").await;
  let user = onboarded_user(&store, &[]).await;
  store
    .insert_delivery(user, day("2026-08-23"), only)
    .await
    .unwrap();

  let outcome = scheduler(&store)
    .ensure_delivered(user, day("2026-08-24"))
    .await
    .unwrap();
  assert_eq!(outcome, DeliveryOutcome::Exhausted);
}

#[tokio::test]
async fn concurrent_requests_converge_on_one_delivery() {
  let store = seeded_store().await;
  add_joke(&store, "a", "clean").await;
  add_joke(&store, "b", "clean").await;
  let user = onboarded_user(&store, &[]).await;
  let date = day("2026-08-24");

  let s1 = scheduler(&store);
  let s2 = s1.clone();
  let (r1, r2) = tokio::join!(
    s1.ensure_delivered(user, date),
    s2.ensure_delivered(user, date),
  );
  let id_of = |outcome: DeliveryOutcome| match outcome {
    DeliveryOutcome::Created(id) | DeliveryOutcome::Existing(id) => id,
    DeliveryOutcome::Exhausted => panic!("pool was not empty"),
  };
  assert_eq!(id_of(r1.unwrap()), id_of(r2.unwrap()));
  assert_eq!(store.history(user, 10).await.unwrap().len(), 1);
}

// ─── run_daily_batch ─────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_delivers_once_per_user() {
  let store = seeded_store().await;
  add_joke(&store, "a", "clean").await;
  add_joke(&store, "b", "clean").await;
  for _ in 0..3 {
    onboarded_user(&store, &[]).await;
  }
  // not onboarded; must not be processed
  store.account_created(Uuid::new_v4()).await.unwrap();

  let scheduler = scheduler(&store);
  let date = day("2026-08-24");

  let first = scheduler.run_daily_batch(date).await.unwrap();
  assert_eq!(first.processed, 3);
  assert_eq!(first.created, 3);
  assert_eq!(first.skipped_existing, 0);
  assert_eq!(first.failed, 0);

  let second = scheduler.run_daily_batch(date).await.unwrap();
  assert_eq!(second.processed, 3);
  assert_eq!(second.created, 0);
  assert_eq!(second.skipped_existing, 3);
}

#[tokio::test]
async fn batch_counts_exhausted_users() {
  let store = seeded_store().await;
  onboarded_user(&store, &[]).await;

  let stats = scheduler(&store)
    .run_daily_batch(day("2026-08-24"))
    .await
    .unwrap();
  assert_eq!(stats.processed, 1);
  assert_eq!(stats.skipped_exhausted, 1);
  assert_eq!(stats.created, 0);
}

// ─── today_for ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn today_for_delivers_and_stamps_view() {
  let store = seeded_store().await;
  add_joke(&store, "a", "clean").await;
  let user = onboarded_user(&store, &[]).await;
  let scheduler = scheduler(&store);

  let outcome = scheduler.today_for(user).await.unwrap();
  let crate::DailyOutcome::Joke(joke) = outcome else {
    panic!("expected a joke");
  };

  let delivery = store
    .delivery(user, scheduler.today())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(delivery.joke_id, joke.joke_id);
  assert!(delivery.first_viewed_at.is_some());

  // same joke on a repeat visit, view timestamp untouched
  let again = scheduler.today_for(user).await.unwrap();
  let crate::DailyOutcome::Joke(same) = again else {
    panic!("expected a joke");
  };
  assert_eq!(same.joke_id, joke.joke_id);
  let after = store
    .delivery(user, scheduler.today())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(after.first_viewed_at, delivery.first_viewed_at);
}

#[tokio::test]
async fn today_for_reports_unavailable_when_exhausted() {
  let store = seeded_store().await;
  let user = onboarded_user(&store, &[]).await;

  let outcome = scheduler(&store).today_for(user).await.unwrap();
  assert!(matches!(outcome, crate::DailyOutcome::Unavailable));
}

/// Wraps a real store but lags on the delivery lookup, so the on-demand
/// deadline fires.
struct SlowStore {
  inner: SqliteStore,
  delay: Duration,
}

impl JokeStore for SlowStore {
  type Error = quip_store_sqlite::Error;

  async fn put_term(
    &self,
    kind: TermKind,
    term: Term,
  ) -> Result<(), Self::Error> {
    self.inner.put_term(kind, term).await
  }

  async fn list_terms(&self, kind: TermKind) -> Result<Vec<Term>, Self::Error> {
    self.inner.list_terms(kind).await
  }

  async fn delete_term(
    &self,
    kind: TermKind,
    slug: &str,
  ) -> Result<(), Self::Error> {
    self.inner.delete_term(kind, slug).await
  }

  async fn add_joke(&self, input: NewJoke) -> Result<Joke, Self::Error> {
    self.inner.add_joke(input).await
  }

  async fn update_joke_text(
    &self,
    joke_id: Uuid,
    text: String,
    setup: Option<String>,
    punchline: Option<String>,
  ) -> Result<Joke, Self::Error> {
    self.inner.update_joke_text(joke_id, text, setup, punchline).await
  }

  async fn get_joke(&self, joke_id: Uuid) -> Result<Option<Joke>, Self::Error> {
    self.inner.get_joke(joke_id).await
  }

  async fn search(
    &self,
    request: &SearchRequest,
  ) -> Result<Vec<Joke>, Self::Error> {
    self.inner.search(request).await
  }

  async fn candidates(
    &self,
    excluded: &[Uuid],
  ) -> Result<Vec<Candidate>, Self::Error> {
    self.inner.candidates(excluded).await
  }

  async fn record_save(
    &self,
    user_id: Uuid,
    joke_id: Uuid,
  ) -> Result<(), Self::Error> {
    self.inner.record_save(user_id, joke_id).await
  }

  async fn account_created(
    &self,
    user_id: Uuid,
  ) -> Result<UserPreference, Self::Error> {
    self.inner.account_created(user_id).await
  }

  async fn preference(
    &self,
    user_id: Uuid,
  ) -> Result<Option<UserPreference>, Self::Error> {
    self.inner.preference(user_id).await
  }

  async fn set_preference(
    &self,
    user_id: Uuid,
    update: PreferenceUpdate,
  ) -> Result<UserPreference, Self::Error> {
    self.inner.set_preference(user_id, update).await
  }

  async fn eligible_users(&self) -> Result<Vec<Uuid>, Self::Error> {
    self.inner.eligible_users().await
  }

  async fn delivery(
    &self,
    user_id: Uuid,
    date: NaiveDate,
  ) -> Result<Option<Delivery>, Self::Error> {
    tokio::time::sleep(self.delay).await;
    self.inner.delivery(user_id, date).await
  }

  async fn insert_delivery(
    &self,
    user_id: Uuid,
    date: NaiveDate,
    joke_id: Uuid,
  ) -> Result<InsertDelivery, Self::Error> {
    self.inner.insert_delivery(user_id, date, joke_id).await
  }

  async fn mark_viewed(
    &self,
    user_id: Uuid,
    date: NaiveDate,
    at: DateTime<Utc>,
  ) -> Result<Option<Delivery>, Self::Error> {
    self.inner.mark_viewed(user_id, date, at).await
  }

  async fn recently_shown(
    &self,
    user_id: Uuid,
    since: NaiveDate,
  ) -> Result<Vec<Uuid>, Self::Error> {
    self.inner.recently_shown(user_id, since).await
  }

  async fn history(
    &self,
    user_id: Uuid,
    limit: usize,
  ) -> Result<Vec<(Delivery, Joke)>, Self::Error> {
    self.inner.history(user_id, limit).await
  }
}

#[tokio::test]
async fn today_for_times_out_against_a_slow_store() {
  let store = seeded_store().await;
  add_joke(&store, "a", "clean").await;
  let user = onboarded_user(&store, &[]).await;

  let slow = SlowStore { inner: store, delay: Duration::from_millis(50) };
  let scheduler = Scheduler::new(Arc::new(slow), SchedulerConfig {
    on_demand_timeout_ms: 5,
    rng_seed: Some(7),
    ..Default::default()
  });

  let err = scheduler.today_for(user).await.unwrap_err();
  assert!(matches!(err, EngineError::Timeout));
}
