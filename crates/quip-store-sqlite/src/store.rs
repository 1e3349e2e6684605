//! [`SqliteStore`] — the SQLite implementation of [`JokeStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use quip_core::{
  delivery::Delivery,
  joke::{Joke, NewJoke, Term, TermKind},
  preference::{PreferenceUpdate, UserPreference},
  search::{searchable_text, Query},
  store::{Candidate, InsertDelivery, JokeStore, SearchFilters, SearchRequest},
};

use crate::{
  encode::{
    encode_date, encode_dt, encode_slugs, encode_uuid, term_table, RawDelivery,
    RawJoke, RawPreference,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Default page size when a search request carries no explicit limit.
const DEFAULT_LIMIT: usize = 100;

/// Shared SELECT for a joke row with its tag lists.
const JOKE_SELECT: &str = "
  SELECT
    j.joke_id, j.text, j.setup, j.punchline, j.search_text,
    j.format_slug, j.age_rating_slug, j.language_slug, j.source_slug,
    j.created_at,
    (SELECT group_concat(tone_slug)    FROM joke_tones    WHERE joke_id = j.joke_id),
    (SELECT group_concat(context_slug) FROM joke_contexts WHERE joke_id = j.joke_id),
    (SELECT group_concat(culture_slug) FROM joke_cultures WHERE joke_id = j.joke_id)
  FROM jokes j";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Quip store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch joke rows matching `where_clause`, with positional string params.
  async fn joke_rows(
    &self,
    where_clause: String,
    params: Vec<String>,
  ) -> Result<Vec<RawJoke>> {
    let raws: Vec<RawJoke> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "{JOKE_SELECT} {where_clause} ORDER BY j.created_at DESC, j.joke_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), read_raw_joke)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(raws)
  }
}

/// Map a row produced by [`JOKE_SELECT`] into a [`RawJoke`].
fn read_raw_joke(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawJoke> {
  Ok(RawJoke {
    joke_id:     row.get(0)?,
    text:        row.get(1)?,
    setup:       row.get(2)?,
    punchline:   row.get(3)?,
    search_text: row.get(4)?,
    format:      row.get(5)?,
    age_rating:  row.get(6)?,
    language:    row.get(7)?,
    source:      row.get(8)?,
    created_at:  row.get(9)?,
    tones:       row.get(10)?,
    contexts:    row.get(11)?,
    cultures:    row.get(12)?,
  })
}

fn read_raw_delivery(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDelivery> {
  Ok(RawDelivery {
    user_id:         row.get(0)?,
    date:            row.get(1)?,
    joke_id:         row.get(2)?,
    first_viewed_at: row.get(3)?,
    created_at:      row.get(4)?,
  })
}

/// Translate categorical filters into WHERE conditions and their params.
/// Multi-valued fields use EXISTS subqueries, so a joke matching several
/// requested slugs still yields a single row.
fn filter_conditions(filters: &SearchFilters) -> (Vec<String>, Vec<String>) {
  let mut conds = Vec::new();
  let mut params = Vec::new();

  if let Some(format) = &filters.format {
    conds.push("j.format_slug = ?".to_owned());
    params.push(format.clone());
  }
  if let Some(rating) = &filters.age_rating {
    conds.push("j.age_rating_slug = ?".to_owned());
    params.push(rating.clone());
  }
  if let Some(language) = &filters.language {
    conds.push("j.language_slug = ?".to_owned());
    params.push(language.clone());
  }
  for (table, column, slugs) in [
    ("joke_tones", "tone_slug", &filters.tones),
    ("joke_contexts", "context_slug", &filters.context_tags),
    ("joke_cultures", "culture_slug", &filters.culture_tags),
  ] {
    if slugs.is_empty() {
      continue;
    }
    let marks = vec!["?"; slugs.len()].join(", ");
    conds.push(format!(
      "EXISTS (SELECT 1 FROM {table} x \
       WHERE x.joke_id = j.joke_id AND x.{column} IN ({marks}))"
    ));
    params.extend(slugs.iter().cloned());
  }

  (conds, params)
}

fn where_clause(conds: &[String]) -> String {
  if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  }
}

fn is_constraint(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

/// Normalised copy of a tag list for storage: sorted, deduplicated.
fn normalize_slugs(slugs: &[String]) -> Vec<String> {
  let mut out = slugs.to_vec();
  out.sort();
  out.dedup();
  out
}

// ─── JokeStore impl ──────────────────────────────────────────────────────────

impl JokeStore for SqliteStore {
  type Error = Error;

  // ── Taxonomy ──────────────────────────────────────────────────────────────

  async fn put_term(&self, kind: TermKind, term: Term) -> Result<()> {
    let table = term_table(kind);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO {table} (slug, name, description) VALUES (?1, ?2, ?3)
             ON CONFLICT(slug) DO UPDATE
             SET name = excluded.name, description = excluded.description"
          ),
          rusqlite::params![term.slug, term.name, term.description],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_terms(&self, kind: TermKind) -> Result<Vec<Term>> {
    let table = term_table(kind);
    let terms = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT slug, name, description FROM {table} ORDER BY slug"
        ))?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Term {
              slug:        row.get(0)?,
              name:        row.get(1)?,
              description: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(terms)
  }

  async fn delete_term(&self, kind: TermKind, slug: &str) -> Result<()> {
    let table = term_table(kind);
    let slug_owned = slug.to_owned();
    let result = self
      .conn
      .call(move |conn| {
        match conn.execute(
          &format!("DELETE FROM {table} WHERE slug = ?1"),
          rusqlite::params![slug_owned],
        ) {
          Ok(_) => Ok(Ok(())),
          Err(e) if is_constraint(&e) => Ok(Err(())),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    result.map_err(|()| Error::TermInUse(slug.to_owned()))
  }

  // ── Corpus ────────────────────────────────────────────────────────────────

  async fn add_joke(&self, input: NewJoke) -> Result<Joke> {
    let joke = Joke {
      joke_id:      Uuid::new_v4(),
      text:         input.text,
      setup:        input.setup,
      punchline:    input.punchline,
      format:       input.format,
      age_rating:   input.age_rating,
      language:     input.language,
      source:       input.source,
      tones:        normalize_slugs(&input.tones),
      context_tags: normalize_slugs(&input.context_tags),
      culture_tags: normalize_slugs(&input.culture_tags),
      created_at:   Utc::now(),
    };

    let search_text = searchable_text(
      &joke.text,
      joke.setup.as_deref(),
      joke.punchline.as_deref(),
    );
    let id_str = encode_uuid(joke.joke_id);
    let at_str = encode_dt(joke.created_at);
    let row = joke.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO jokes
             (joke_id, text, setup, punchline, search_text,
              format_slug, age_rating_slug, language_slug, source_slug,
              created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str,
            row.text,
            row.setup,
            row.punchline,
            search_text,
            row.format,
            row.age_rating,
            row.language,
            row.source,
            at_str,
          ],
        )?;
        for (table, column, slugs) in [
          ("joke_tones", "tone_slug", &row.tones),
          ("joke_contexts", "context_slug", &row.context_tags),
          ("joke_cultures", "culture_slug", &row.culture_tags),
        ] {
          for slug in slugs {
            tx.execute(
              &format!(
                "INSERT INTO {table} (joke_id, {column}) VALUES (?1, ?2)"
              ),
              rusqlite::params![id_str, slug],
            )?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(joke)
  }

  async fn update_joke_text(
    &self,
    joke_id: Uuid,
    text: String,
    setup: Option<String>,
    punchline: Option<String>,
  ) -> Result<Joke> {
    let search_text =
      searchable_text(&text, setup.as_deref(), punchline.as_deref());
    let id_str = encode_uuid(joke_id);

    let changed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE jokes SET text = ?2, setup = ?3, punchline = ?4, search_text = ?5
           WHERE joke_id = ?1",
          rusqlite::params![id_str, text, setup, punchline, search_text],
        )?;
        Ok(n)
      })
      .await?;

    if changed == 0 {
      return Err(Error::JokeNotFound(joke_id));
    }
    self
      .get_joke(joke_id)
      .await?
      .ok_or(Error::JokeNotFound(joke_id))
  }

  async fn get_joke(&self, joke_id: Uuid) -> Result<Option<Joke>> {
    let id_str = encode_uuid(joke_id);
    let raw: Option<RawJoke> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{JOKE_SELECT} WHERE j.joke_id = ?1"),
              rusqlite::params![id_str],
              read_raw_joke,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawJoke::into_joke).transpose()
  }

  async fn search(&self, request: &SearchRequest) -> Result<Vec<Joke>> {
    let (conds, params) = filter_conditions(&request.filters);
    let raws = self.joke_rows(where_clause(&conds), params).await?;

    let text = request
      .text
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty());

    let jokes = match text {
      None => raws
        .into_iter()
        .map(RawJoke::into_joke)
        .collect::<Result<Vec<_>>>()?,
      Some(text) => {
        let query = Query::parse(text);
        let mut scored = Vec::new();
        for raw in raws {
          let tokens: Vec<String> =
            raw.search_text.split_whitespace().map(str::to_owned).collect();
          let score = query.score(&tokens);
          if score > 0.0 {
            scored.push((score, raw.into_joke()?));
          }
        }
        scored.sort_by(|a, b| {
          b.0
            .partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.joke_id.cmp(&b.1.joke_id))
        });
        scored.into_iter().map(|(_, joke)| joke).collect()
      }
    };

    let offset = request.offset.unwrap_or(0);
    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(jokes.into_iter().skip(offset).take(limit).collect())
  }

  async fn candidates(&self, excluded: &[Uuid]) -> Result<Vec<Candidate>> {
    let params: Vec<String> =
      excluded.iter().copied().map(encode_uuid).collect();
    let where_clause = if params.is_empty() {
      String::new()
    } else {
      let marks = vec!["?"; params.len()].join(", ");
      format!("WHERE j.joke_id NOT IN ({marks})")
    };

    let raws: Vec<(RawJoke, u32)> = self
      .conn
      .call(move |conn| {
        // Splice the save-count column in before the FROM clause.
        let select = JOKE_SELECT.replacen(
          "FROM jokes j",
          ", (SELECT COUNT(*) FROM saved_jokes sv WHERE sv.joke_id = j.joke_id)
           FROM jokes j",
          1,
        );
        let sql = format!("{select} {where_clause} ORDER BY j.joke_id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok((read_raw_joke(row)?, row.get::<_, u32>(13)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, save_count)| {
        Ok(Candidate { joke: raw.into_joke()?, save_count })
      })
      .collect()
  }

  async fn record_save(&self, user_id: Uuid, joke_id: Uuid) -> Result<()> {
    let user_str = encode_uuid(user_id);
    let joke_str = encode_uuid(joke_id);
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO saved_jokes (user_id, joke_id, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![user_str, joke_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Preferences ───────────────────────────────────────────────────────────

  async fn account_created(&self, user_id: Uuid) -> Result<UserPreference> {
    let user_str = encode_uuid(user_id);
    let now_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO preferences (user_id, created_at, updated_at)
           VALUES (?1, ?2, ?2)
           ON CONFLICT(user_id) DO NOTHING",
          rusqlite::params![user_str, now_str],
        )?;
        Ok(())
      })
      .await?;

    self
      .preference(user_id)
      .await?
      .ok_or(Error::PreferenceNotFound(user_id))
  }

  async fn preference(&self, user_id: Uuid) -> Result<Option<UserPreference>> {
    let user_str = encode_uuid(user_id);
    let raw: Option<RawPreference> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, preferred_tones, preferred_contexts,
                      preferred_age_rating, preferred_language,
                      notification_enabled, onboarding_complete,
                      created_at, updated_at
               FROM preferences WHERE user_id = ?1",
              rusqlite::params![user_str],
              |row| {
                Ok(RawPreference {
                  user_id:              row.get(0)?,
                  preferred_tones:      row.get(1)?,
                  preferred_contexts:   row.get(2)?,
                  preferred_age_rating: row.get(3)?,
                  preferred_language:   row.get(4)?,
                  notification_enabled: row.get(5)?,
                  onboarding_complete:  row.get(6)?,
                  created_at:           row.get(7)?,
                  updated_at:           row.get(8)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPreference::into_preference).transpose()
  }

  async fn set_preference(
    &self,
    user_id: Uuid,
    update: PreferenceUpdate,
  ) -> Result<UserPreference> {
    let user_str = encode_uuid(user_id);
    let tones_str = encode_slugs(&normalize_slugs(&update.preferred_tones))?;
    let contexts_str =
      encode_slugs(&normalize_slugs(&update.preferred_contexts))?;
    let now_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE preferences
           SET preferred_tones = ?2, preferred_contexts = ?3,
               preferred_age_rating = ?4, preferred_language = ?5,
               notification_enabled = ?6, onboarding_complete = ?7,
               updated_at = ?8
           WHERE user_id = ?1",
          rusqlite::params![
            user_str,
            tones_str,
            contexts_str,
            update.preferred_age_rating,
            update.preferred_language,
            update.notification_enabled,
            update.onboarding_complete,
            now_str,
          ],
        )?;
        Ok(n)
      })
      .await?;

    if changed == 0 {
      return Err(Error::PreferenceNotFound(user_id));
    }
    self
      .preference(user_id)
      .await?
      .ok_or(Error::PreferenceNotFound(user_id))
  }

  async fn eligible_users(&self) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id FROM preferences
           WHERE onboarding_complete = 1 ORDER BY user_id",
        )?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids
      .iter()
      .map(|s| crate::encode::decode_uuid(s))
      .collect()
  }

  // ── Deliveries ────────────────────────────────────────────────────────────

  async fn delivery(
    &self,
    user_id: Uuid,
    date: NaiveDate,
  ) -> Result<Option<Delivery>> {
    let user_str = encode_uuid(user_id);
    let date_str = encode_date(date);
    let raw: Option<RawDelivery> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, date, joke_id, first_viewed_at, created_at
               FROM deliveries WHERE user_id = ?1 AND date = ?2",
              rusqlite::params![user_str, date_str],
              read_raw_delivery,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDelivery::into_delivery).transpose()
  }

  async fn insert_delivery(
    &self,
    user_id: Uuid,
    date: NaiveDate,
    joke_id: Uuid,
  ) -> Result<InsertDelivery> {
    let delivery = Delivery {
      user_id,
      date,
      joke_id,
      first_viewed_at: None,
      created_at: Utc::now(),
    };

    let user_str = encode_uuid(user_id);
    let date_str = encode_date(date);
    let joke_str = encode_uuid(joke_id);
    let at_str = encode_dt(delivery.created_at);

    // `true` means the insert won; a primary-key violation means a
    // concurrent insert got there first.
    let inserted: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO deliveries (user_id, date, joke_id, first_viewed_at, created_at)
           VALUES (?1, ?2, ?3, NULL, ?4)",
          rusqlite::params![user_str, date_str, joke_str, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code
              == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
          {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if inserted {
      return Ok(InsertDelivery::Inserted(delivery));
    }
    match self.delivery(user_id, date).await? {
      Some(winner) => Ok(InsertDelivery::Conflict(winner)),
      None => Err(Error::DeliveryVanished(user_id, date)),
    }
  }

  async fn mark_viewed(
    &self,
    user_id: Uuid,
    date: NaiveDate,
    at: DateTime<Utc>,
  ) -> Result<Option<Delivery>> {
    let user_str = encode_uuid(user_id);
    let date_str = encode_date(date);
    let at_str = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE deliveries SET first_viewed_at = ?3
           WHERE user_id = ?1 AND date = ?2 AND first_viewed_at IS NULL",
          rusqlite::params![user_str, date_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    self.delivery(user_id, date).await
  }

  async fn recently_shown(
    &self,
    user_id: Uuid,
    since: NaiveDate,
  ) -> Result<Vec<Uuid>> {
    let user_str = encode_uuid(user_id);
    let since_str = encode_date(since);
    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT joke_id FROM deliveries WHERE user_id = ?1 AND date >= ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, since_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids
      .iter()
      .map(|s| crate::encode::decode_uuid(s))
      .collect()
  }

  async fn history(
    &self,
    user_id: Uuid,
    limit: usize,
  ) -> Result<Vec<(Delivery, Joke)>> {
    let user_str = encode_uuid(user_id);
    let limit_val = limit as i64;
    let raws: Vec<(RawDelivery, RawJoke)> = self
      .conn
      .call(move |conn| {
        // Splice the delivery columns in before the FROM clause and join.
        let select = JOKE_SELECT.replacen(
          "FROM jokes j",
          ", d.user_id, d.date, d.first_viewed_at, d.created_at
           FROM deliveries d JOIN jokes j ON j.joke_id = d.joke_id",
          1,
        );
        let sql = format!(
          "{select} WHERE d.user_id = ?1 ORDER BY d.date DESC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, limit_val], |row| {
            let joke = read_raw_joke(row)?;
            let delivery = RawDelivery {
              user_id:         row.get(13)?,
              date:            row.get(14)?,
              joke_id:         joke.joke_id.clone(),
              first_viewed_at: row.get(15)?,
              created_at:      row.get(16)?,
            };
            Ok((delivery, joke))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(delivery, joke)| {
        Ok((delivery.into_delivery()?, joke.into_joke()?))
      })
      .collect()
  }
}
