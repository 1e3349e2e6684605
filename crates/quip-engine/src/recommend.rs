//! Candidate selection for a single user.

use quip_core::store::{Candidate, JokeStore};
use rand::Rng;
use uuid::Uuid;

/// Pick the next joke for `user_id` out of the corpus minus `excluded`.
///
/// The user's preferences narrow the pool when at least one candidate
/// satisfies them; a preference set nothing matches falls back to the
/// unfiltered pool rather than starving the user. Among the surviving
/// candidates the most-saved win, with ties broken uniformly at random.
///
/// Returns `None` only when the exclusion leaves nothing at all.
pub async fn select_next<S: JokeStore>(
  store: &S,
  user_id: Uuid,
  excluded: &[Uuid],
  rng: &mut impl Rng,
) -> Result<Option<Candidate>, S::Error> {
  let mut pool = store.candidates(excluded).await?;
  if pool.is_empty() {
    return Ok(None);
  }

  let preference = match store.preference(user_id).await {
    Ok(preference) => preference,
    Err(error) => {
      tracing::warn!(%user_id, %error, "preference lookup failed, using unfiltered pool");
      None
    }
  };

  if let Some(preference) = preference.filter(|p| p.has_any()) {
    let matching: Vec<Candidate> = pool
      .iter()
      .filter(|c| preference.matches(&c.joke))
      .cloned()
      .collect();
    if !matching.is_empty() {
      pool = matching;
    }
  }

  let top = pool.iter().map(|c| c.save_count).max().unwrap_or(0);
  let mut favorites: Vec<Candidate> =
    pool.into_iter().filter(|c| c.save_count == top).collect();
  let index = rng.gen_range(0..favorites.len());
  Ok(Some(favorites.swap_remove(index)))
}
