//! JSON seed loading for the `server --seed` flag.
//!
//! The file carries taxonomy terms, jokes, users (with optional preferences)
//! and save relationships. Saves reference jokes by their position in the
//! `jokes` array, since joke ids are assigned at insert time.

use std::path::Path;

use anyhow::Context as _;
use quip_core::{
  joke::{NewJoke, Term, TermKind},
  preference::PreferenceUpdate,
  store::JokeStore,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
  #[serde(default)]
  pub terms: Vec<SeedTerm>,
  #[serde(default)]
  pub jokes: Vec<NewJoke>,
  #[serde(default)]
  pub users: Vec<SeedUser>,
  #[serde(default)]
  pub saves: Vec<SeedSave>,
}

#[derive(Debug, Deserialize)]
pub struct SeedTerm {
  pub kind:        TermKind,
  pub slug:        String,
  pub name:        String,
  #[serde(default)]
  pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
  pub user_id:    Uuid,
  #[serde(default)]
  pub preference: Option<PreferenceUpdate>,
}

#[derive(Debug, Deserialize)]
pub struct SeedSave {
  pub user_id:    Uuid,
  /// Index into the seed file's `jokes` array.
  pub joke_index: usize,
}

/// Load a seed file into `store`. Terms land first so joke inserts can
/// reference them.
pub async fn load<S: JokeStore>(
  store: &S,
  path: &Path,
) -> anyhow::Result<()> {
  let raw = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read seed file {path:?}"))?;
  let file: SeedFile =
    serde_json::from_str(&raw).context("failed to parse seed file")?;

  let (terms, jokes, users, saves) = (
    file.terms.len(),
    file.jokes.len(),
    file.users.len(),
    file.saves.len(),
  );

  for t in file.terms {
    store
      .put_term(t.kind, Term {
        slug:        t.slug,
        name:        t.name,
        description: t.description,
      })
      .await?;
  }

  let mut joke_ids = Vec::with_capacity(file.jokes.len());
  for joke in file.jokes {
    joke_ids.push(store.add_joke(joke).await?.joke_id);
  }

  for user in file.users {
    store.account_created(user.user_id).await?;
    if let Some(preference) = user.preference {
      store.set_preference(user.user_id, preference).await?;
    }
  }

  for save in file.saves {
    let joke_id = *joke_ids
      .get(save.joke_index)
      .with_context(|| format!("joke_index {} out of range", save.joke_index))?;
    store.record_save(save.user_id, joke_id).await?;
  }

  tracing::info!(terms, jokes, users, saves, "seed data loaded");
  Ok(())
}
