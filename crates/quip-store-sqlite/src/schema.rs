//! SQL schema for the Quip SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Taxonomy terms. Languages use their ISO 639-1 code as the slug.
CREATE TABLE IF NOT EXISTS formats (
    slug        TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS age_ratings (
    slug        TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS tones (
    slug        TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS context_tags (
    slug        TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS culture_tags (
    slug        TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS languages (
    slug        TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS sources (
    slug        TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);

-- The corpus. Required categorical links are protected against term
-- deletion; the optional source link is nulled instead. search_text is the
-- derived searchable representation, recomputed whenever text fields change.
CREATE TABLE IF NOT EXISTS jokes (
    joke_id         TEXT PRIMARY KEY,
    text            TEXT NOT NULL,
    setup           TEXT,
    punchline       TEXT,
    search_text     TEXT NOT NULL,
    format_slug     TEXT NOT NULL REFERENCES formats(slug)     ON DELETE RESTRICT,
    age_rating_slug TEXT NOT NULL REFERENCES age_ratings(slug) ON DELETE RESTRICT,
    language_slug   TEXT NOT NULL REFERENCES languages(slug)   ON DELETE RESTRICT,
    source_slug     TEXT          REFERENCES sources(slug)     ON DELETE SET NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS joke_tones (
    joke_id   TEXT NOT NULL REFERENCES jokes(joke_id) ON DELETE CASCADE,
    tone_slug TEXT NOT NULL REFERENCES tones(slug)    ON DELETE CASCADE,
    PRIMARY KEY (joke_id, tone_slug)
);
CREATE TABLE IF NOT EXISTS joke_contexts (
    joke_id      TEXT NOT NULL REFERENCES jokes(joke_id)      ON DELETE CASCADE,
    context_slug TEXT NOT NULL REFERENCES context_tags(slug)  ON DELETE CASCADE,
    PRIMARY KEY (joke_id, context_slug)
);
CREATE TABLE IF NOT EXISTS joke_cultures (
    joke_id      TEXT NOT NULL REFERENCES jokes(joke_id)      ON DELETE CASCADE,
    culture_slug TEXT NOT NULL REFERENCES culture_tags(slug)  ON DELETE CASCADE,
    PRIMARY KEY (joke_id, culture_slug)
);

-- Save relationships; popularity is the count per joke.
CREATE TABLE IF NOT EXISTS saved_jokes (
    user_id    TEXT NOT NULL,
    joke_id    TEXT NOT NULL REFERENCES jokes(joke_id),
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, joke_id)
);

-- One row per user, created by the account-created event handler.
CREATE TABLE IF NOT EXISTS preferences (
    user_id              TEXT PRIMARY KEY,
    preferred_tones      TEXT NOT NULL DEFAULT '[]',
    preferred_contexts   TEXT NOT NULL DEFAULT '[]',
    preferred_age_rating TEXT REFERENCES age_ratings(slug) ON DELETE SET NULL,
    preferred_language   TEXT REFERENCES languages(slug)   ON DELETE SET NULL,
    notification_enabled INTEGER NOT NULL DEFAULT 0,
    onboarding_complete  INTEGER NOT NULL DEFAULT 0,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

-- The daily-joke audit trail. The composite primary key is the central
-- (user, date) uniqueness invariant; rows are never deleted, and only
-- first_viewed_at is ever updated.
CREATE TABLE IF NOT EXISTS deliveries (
    user_id         TEXT NOT NULL,
    date            TEXT NOT NULL,
    joke_id         TEXT NOT NULL REFERENCES jokes(joke_id),
    first_viewed_at TEXT,
    created_at      TEXT NOT NULL,
    PRIMARY KEY (user_id, date)
);

CREATE INDEX IF NOT EXISTS jokes_created_idx       ON jokes(created_at);
CREATE INDEX IF NOT EXISTS saved_jokes_joke_idx    ON saved_jokes(joke_id);
CREATE INDEX IF NOT EXISTS preferences_onboard_idx ON preferences(onboarding_complete);

PRAGMA user_version = 1;
";
