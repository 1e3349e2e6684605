//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users/:id` | AccountCreated event; idempotent |
//! | `GET`  | `/users/:id/preference` | 404 until the account exists |
//! | `PUT`  | `/users/:id/preference` | Full replacement of preference fields |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use quip_core::{
  preference::{PreferenceUpdate, UserPreference},
  store::JokeStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `POST /users/:id` — the account-created event. Creates the default
/// preference row if none exists; safe to deliver more than once.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: JokeStore,
{
  let preference = state
    .store
    .account_created(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(preference)))
}

/// `GET /users/:id/preference`
pub async fn get_preference<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<UserPreference>, ApiError>
where
  S: JokeStore,
{
  let preference = state
    .store
    .preference(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("no preference for user {id}")))?;
  Ok(Json(preference))
}

/// `PUT /users/:id/preference` — body: a full [`PreferenceUpdate`].
pub async fn put_preference<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<PreferenceUpdate>,
) -> Result<Json<UserPreference>, ApiError>
where
  S: JokeStore,
{
  let exists = state
    .store
    .preference(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .is_some();
  if !exists {
    return Err(ApiError::NotFound(format!("no preference for user {id}")));
  }

  let preference = state
    .store
    .set_preference(id, body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(preference))
}
