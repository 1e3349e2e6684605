//! JSON REST API for Quip.
//!
//! Exposes an axum [`Router`] backed by any [`quip_core::store::JokeStore`],
//! with the daily-delivery scheduler threaded through shared state. Auth,
//! TLS, and transport concerns are the caller's responsibility.

pub mod daily;
pub mod error;
pub mod jokes;
pub mod seed;
pub mod users;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use quip_core::store::JokeStore;
use quip_engine::{Scheduler, SchedulerConfig};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("quip.db") }

/// Runtime server configuration, deserialised from `config.toml` and the
/// `QUIP_` environment.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub scheduler:  SchedulerConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       default_host(),
      port:       default_port(),
      store_path: default_store_path(),
      scheduler:  SchedulerConfig::default(),
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S: JokeStore> {
  pub store:     Arc<S>,
  pub scheduler: Arc<Scheduler<S>>,
}

impl<S: JokeStore> AppState<S> {
  pub fn new(store: Arc<S>, config: SchedulerConfig) -> Self {
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&store), config));
    Self { store, scheduler }
  }
}

impl<S: JokeStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      scheduler: Arc::clone(&self.scheduler),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: JokeStore + 'static,
{
  Router::new()
    // Corpus
    .route("/search", get(jokes::search::<S>))
    .route("/jokes/{id}", get(jokes::get_one::<S>))
    // Users
    .route("/users/{id}", post(users::create::<S>))
    .route(
      "/users/{id}/preference",
      get(users::get_preference::<S>).put(users::put_preference::<S>),
    )
    // Daily joke
    .route("/users/{id}/daily/today", get(daily::today::<S>))
    .route("/users/{id}/daily/history", get(daily::history::<S>))
    .route("/admin/daily-run", post(daily::run_batch::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use quip_core::{
    joke::{NewJoke, Term, TermKind},
    store::JokeStore,
  };
  use quip_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    for (kind, slug) in [
      (TermKind::Format, "one-liner"),
      (TermKind::AgeRating, "kid-safe"),
      (TermKind::Language, "en"),
      (TermKind::Tone, "clean"),
    ] {
      store
        .put_term(kind, Term {
          slug:        slug.to_owned(),
          name:        slug.to_owned(),
          description: String::new(),
        })
        .await
        .unwrap();
    }
    AppState::new(Arc::new(store), SchedulerConfig {
      rng_seed: Some(7),
      ..Default::default()
    })
  }

  async fn add_joke(state: &AppState<SqliteStore>, text: &str) -> Uuid {
    state
      .store
      .add_joke(NewJoke {
        text:         text.to_owned(),
        setup:        None,
        punchline:    None,
        format:       "one-liner".to_owned(),
        age_rating:   "kid-safe".to_owned(),
        language:     "en".to_owned(),
        source:       None,
        tones:        vec!["clean".to_owned()],
        context_tags: vec![],
        culture_tags: vec![],
      })
      .await
      .unwrap()
      .joke_id
  }

  async fn oneshot(
    state: AppState<SqliteStore>,
    method: &str,
    uri: &str,
    body: &str,
  ) -> axum::response::Response {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  // ── Search ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn search_returns_ranked_hits() {
    let state = make_state().await;
    add_joke(&state, "why did the chicken cross the road").await;
    add_joke(&state, "a penguin walks into a bar").await;

    let resp = oneshot(state, "GET", "/search?q=chicken", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let hits = body.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0]["text"].as_str().unwrap().contains("chicken"));
  }

  #[tokio::test]
  async fn search_with_unknown_filter_is_empty_not_error() {
    let state = make_state().await;
    add_joke(&state, "a joke").await;

    let resp = oneshot(state, "GET", "/search?format=no-such", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 0);
  }

  // ── Jokes ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn get_joke_roundtrip_and_404() {
    let state = make_state().await;
    let id = add_joke(&state, "a joke").await;

    let resp =
      oneshot(state.clone(), "GET", &format!("/jokes/{id}"), "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["joke_id"], id.to_string());

    let missing = Uuid::new_v4();
    let resp = oneshot(state, "GET", &format!("/jokes/{missing}"), "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Users ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn account_created_is_idempotent_over_http() {
    let state = make_state().await;
    let user = Uuid::new_v4();

    let first =
      oneshot(state.clone(), "POST", &format!("/users/{user}"), "").await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second =
      oneshot(state.clone(), "POST", &format!("/users/{user}"), "").await;
    assert_eq!(second.status(), StatusCode::CREATED);

    let resp =
      oneshot(state, "GET", &format!("/users/{user}/preference"), "").await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn put_preference_requires_account() {
    let state = make_state().await;
    let user = Uuid::new_v4();
    let body = r#"{"preferred_tones":["clean"],"onboarding_complete":true}"#;

    let resp = oneshot(
      state.clone(),
      "PUT",
      &format!("/users/{user}/preference"),
      body,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    oneshot(state.clone(), "POST", &format!("/users/{user}"), "").await;
    let resp = oneshot(
      state,
      "PUT",
      &format!("/users/{user}/preference"),
      body,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["preferred_tones"][0], "clean");
    assert_eq!(json["onboarding_complete"], true);
  }

  // ── Daily ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn daily_today_is_stable_across_requests() {
    let state = make_state().await;
    add_joke(&state, "a").await;
    add_joke(&state, "b").await;
    let user = Uuid::new_v4();
    oneshot(state.clone(), "POST", &format!("/users/{user}"), "").await;

    let first = json_body(
      oneshot(
        state.clone(),
        "GET",
        &format!("/users/{user}/daily/today"),
        "",
      )
      .await,
    )
    .await;
    assert_eq!(first["status"], "ok");

    let second = json_body(
      oneshot(state, "GET", &format!("/users/{user}/daily/today"), "").await,
    )
    .await;
    assert_eq!(second["joke"]["joke_id"], first["joke"]["joke_id"]);
  }

  #[tokio::test]
  async fn daily_today_reports_unavailable_on_empty_corpus() {
    let state = make_state().await;
    let user = Uuid::new_v4();
    oneshot(state.clone(), "POST", &format!("/users/{user}"), "").await;

    let resp =
      oneshot(state, "GET", &format!("/users/{user}/daily/today"), "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "unavailable");
  }

  #[tokio::test]
  async fn history_rows_carry_date_and_joke_item() {
    let state = make_state().await;
    add_joke(&state, "a joke worth remembering").await;
    let user = Uuid::new_v4();
    oneshot(state.clone(), "POST", &format!("/users/{user}"), "").await;
    oneshot(state.clone(), "GET", &format!("/users/{user}/daily/today"), "")
      .await;

    let resp = oneshot(
      state,
      "GET",
      &format!("/users/{user}/daily/history?limit=5"),
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rows = json_body(resp).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert!(rows[0]["date"].is_string());
    assert_eq!(rows[0]["joke"]["text"], "a joke worth remembering");
    assert!(rows[0]["first_viewed_at"].is_string());
  }

  // ── Batch ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn daily_run_reports_batch_stats() {
    let state = make_state().await;
    add_joke(&state, "a").await;
    let user = Uuid::new_v4();
    oneshot(state.clone(), "POST", &format!("/users/{user}"), "").await;
    let body = r#"{"onboarding_complete":true}"#;
    oneshot(
      state.clone(),
      "PUT",
      &format!("/users/{user}/preference"),
      body,
    )
    .await;

    let resp = oneshot(state.clone(), "POST", "/admin/daily-run", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stats = json_body(resp).await;
    assert_eq!(stats["processed"], 1);
    assert_eq!(stats["created"], 1);

    let again = json_body(
      oneshot(state, "POST", "/admin/daily-run", "").await,
    )
    .await;
    assert_eq!(again["created"], 0);
    assert_eq!(again["skipped_existing"], 1);
  }

  #[tokio::test]
  async fn daily_run_accepts_explicit_date_and_rejects_garbage() {
    let state = make_state().await;
    add_joke(&state, "a").await;
    let user = Uuid::new_v4();
    oneshot(state.clone(), "POST", &format!("/users/{user}"), "").await;
    oneshot(
      state.clone(),
      "PUT",
      &format!("/users/{user}/preference"),
      r#"{"onboarding_complete":true}"#,
    )
    .await;

    let resp = oneshot(
      state.clone(),
      "POST",
      "/admin/daily-run?date=2026-01-02",
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["created"], 1);

    let bad =
      oneshot(state, "POST", "/admin/daily-run?date=not-a-day", "").await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
  }
}
