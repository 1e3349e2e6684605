//! Handlers for `/search` and `/jokes` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/search` | Free text plus categorical filters |
//! | `GET`  | `/jokes/:id` | 404 if not found |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use quip_core::{
  joke::Joke,
  store::{JokeStore, SearchFilters, SearchRequest},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  /// Free-text query in web-search grammar.
  pub q:            Option<String>,
  pub format:       Option<String>,
  pub age_rating:   Option<String>,
  /// Comma-separated tone slugs; a joke matches if it has any of them.
  pub tones:        Option<String>,
  /// Comma-separated context tag slugs.
  pub context_tags: Option<String>,
  /// Comma-separated culture tag slugs.
  pub culture_tags: Option<String>,
  pub language:     Option<String>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

fn csv(value: Option<String>) -> Vec<String> {
  value
    .map(|s| {
      s.split(',')
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .collect()
    })
    .unwrap_or_default()
}

/// `GET /search[?q=...][&format=...][&tones=...][&limit=...][&offset=...]`
pub async fn search<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Joke>>, ApiError>
where
  S: JokeStore,
{
  let request = SearchRequest {
    text:    params.q,
    filters: SearchFilters {
      format:       params.format,
      age_rating:   params.age_rating,
      tones:        csv(params.tones),
      context_tags: csv(params.context_tags),
      culture_tags: csv(params.culture_tags),
      language:     params.language,
    },
    limit:   params.limit,
    offset:  params.offset,
  };

  let jokes = state
    .store
    .search(&request)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(jokes))
}

/// `GET /jokes/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Joke>, ApiError>
where
  S: JokeStore,
{
  let joke = state
    .store
    .get_joke(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("joke {id} not found")))?;
  Ok(Json(joke))
}
