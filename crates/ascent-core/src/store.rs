//! SQLite persistence for the program state.
//!
//! One `Store` wraps one `rusqlite::Connection`. Entity modules add their own
//! `impl Store` blocks next to the types they persist; this module owns the
//! schema, open/close, and the small shared row-mapping helpers.
//!
//! Relationships are plain foreign-key columns holding UUID strings, resolved
//! by explicit queries. Multi-step mutations (scoring, cascade invalidation,
//! practice replacement) run inside a single transaction.

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    email       TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS trait_norms (
    name        TEXT PRIMARY KEY,
    average     REAL NOT NULL,
    std_dev     REAL NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS trait_defs (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    name        TEXT NOT NULL,
    average     REAL NOT NULL,
    std_dev     REAL NOT NULL,
    raw_score   INTEGER,
    t_score     REAL,
    UNIQUE (user_id, name)
);

CREATE TABLE IF NOT EXISTS forms (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (user_id, name)
);

CREATE TABLE IF NOT EXISTS questions (
    id          TEXT PRIMARY KEY,
    form_id     TEXT NOT NULL,
    rank        INTEGER NOT NULL,
    text        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS question_options (
    id          TEXT PRIMARY KEY,
    question_id TEXT NOT NULL,
    text        TEXT NOT NULL,
    trait_name  TEXT
);

CREATE TABLE IF NOT EXISTS answers (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    form_id     TEXT NOT NULL,
    question_id TEXT NOT NULL,
    value       TEXT NOT NULL,
    UNIQUE (user_id, form_id, question_id)
);

CREATE TABLE IF NOT EXISTS plans (
    id                  TEXT PRIMARY KEY,
    user_id             TEXT NOT NULL,
    start_date          TEXT,
    end_date            TEXT,
    chosen_strength_id  TEXT,
    chosen_weakness_id  TEXT,
    finished            INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chosen_traits (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    plan_id     TEXT NOT NULL,
    kind        TEXT NOT NULL,
    name        TEXT NOT NULL,
    trait_id    TEXT NOT NULL,
    t_score     REAL,
    form_id     TEXT NOT NULL,
    practice_id TEXT,
    start_date  TEXT,
    end_date    TEXT,
    version     INTEGER NOT NULL DEFAULT 0,
    UNIQUE (user_id, plan_id, kind)
);

CREATE TABLE IF NOT EXISTS practices (
    id              TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    chosen_trait_id TEXT NOT NULL,
    name            TEXT NOT NULL,
    extent          INTEGER NOT NULL,
    rank            INTEGER NOT NULL,
    recommended     INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS chosen_practices (
    id              TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    chosen_trait_id TEXT NOT NULL,
    name            TEXT NOT NULL,
    practice_id     TEXT NOT NULL,
    form_id         TEXT,
    sprint_number   INTEGER NOT NULL,
    sprint_id       TEXT NOT NULL,
    plan_id         TEXT NOT NULL,
    UNIQUE (user_id, chosen_trait_id, sprint_number)
);

CREATE TABLE IF NOT EXISTS sprints (
    id                          TEXT PRIMARY KEY,
    user_id                     TEXT NOT NULL,
    plan_id                     TEXT NOT NULL,
    number                      INTEGER NOT NULL,
    start_date                  TEXT,
    end_date                    TEXT,
    finished                    INTEGER NOT NULL DEFAULT 0,
    strength_practice_form_id   TEXT,
    weakness_practice_form_id   TEXT,
    UNIQUE (plan_id, number)
);

CREATE TABLE IF NOT EXISTS personal_practice_categories (
    id      TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    plan_id TEXT NOT NULL,
    name    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chosen_personal_practices (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    category_id TEXT NOT NULL,
    name        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pending_actions (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    category    TEXT NOT NULL,
    action      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS counters (
    name    TEXT PRIMARY KEY,
    value   INTEGER NOT NULL
);
";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open or create the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Read-modify-write counter bump; returns the new value.
    pub fn bump_counter(&self, name: &str) -> Result<u64> {
        self.conn.execute(
            "INSERT INTO counters (name, value) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1",
            [name],
        )?;
        let value: i64 =
            self.conn
                .query_row("SELECT value FROM counters WHERE name = ?1", [name], |row| {
                    row.get(0)
                })?;
        Ok(value as u64)
    }
}

// ---------------------------------------------------------------------------
// Timestamp helpers (RFC 3339 in TEXT columns)
// ---------------------------------------------------------------------------

pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn opt_ts(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(ts)
}

pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

pub(crate) fn parse_opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_ts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
