//! Per-user trait registry: the 18 trait definitions seeded at registration
//! and the population norms used to standardize raw scores.

use crate::error::{AscentError, Result};
use crate::store::{parse_ts, ts, Store};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Norms seed
// ---------------------------------------------------------------------------

/// Population statistics for one trait: mean and standard deviation of raw
/// scores across the reference population.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Norm {
    pub average: f64,
    pub std_dev: f64,
}

static NORMS_JSON: &str = include_str!("../data/trait_norms.json");
static NORMS: OnceLock<BTreeMap<String, Norm>> = OnceLock::new();

/// The shipped seed table: 18 traits with their initial norms.
pub fn seed_norms() -> &'static BTreeMap<String, Norm> {
    NORMS.get_or_init(|| {
        serde_json::from_str(NORMS_JSON).expect("trait_norms.json ships with the crate")
    })
}

// ---------------------------------------------------------------------------
// T-score
// ---------------------------------------------------------------------------

/// Standardized trait score: population mean 50, 10 points per standard
/// deviation. A zero standard deviation means the sample carried no spread,
/// so the score is pinned at the neutral 50 rather than dividing by zero.
pub fn t_score(raw: i64, average: f64, std_dev: f64) -> f64 {
    if std_dev == 0.0 {
        return 50.0;
    }
    (raw as f64 - average) / std_dev * 10.0 + 50.0
}

// ---------------------------------------------------------------------------
// User / TraitDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitDefinition {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub average: f64,
    pub std_dev: f64,
    pub raw_score: Option<i64>,
    pub t_score: Option<f64>,
}

fn def_from_row(row: &Row<'_>) -> rusqlite::Result<TraitDefinition> {
    Ok(TraitDefinition {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        average: row.get(3)?,
        std_dev: row.get(4)?,
        raw_score: row.get(5)?,
        t_score: row.get(6)?,
    })
}

const DEF_COLS: &str = "id, user_id, name, average, std_dev, raw_score, t_score";

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Store {
    /// Register a user and seed their 18 trait definitions from the current
    /// norms table (itself seeded from the shipped file on first use).
    pub fn register_user(&self, email: &str) -> Result<User> {
        let existing: Option<String> = self
            .conn
            .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| {
                row.get(0)
            })
            .optional()?;
        if existing.is_some() {
            return Err(AscentError::UserExists(email.to_string()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
            params![user.id, user.email, ts(user.created_at)],
        )?;
        for (name, norm) in seed_norms() {
            tx.execute(
                "INSERT OR IGNORE INTO trait_norms (name, average, std_dev, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![name, norm.average, norm.std_dev, ts(user.created_at)],
            )?;
            let (average, std_dev): (f64, f64) = tx.query_row(
                "SELECT average, std_dev FROM trait_norms WHERE name = ?1",
                [name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            tx.execute(
                "INSERT INTO trait_defs (id, user_id, name, average, std_dev)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![Uuid::new_v4().to_string(), user.id, name, average, std_dev],
            )?;
        }
        tx.commit()?;
        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, email, created_at FROM users WHERE id = ?1",
                [user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        created_at: parse_ts(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?
            .ok_or_else(|| AscentError::UserNotFound(user_id.to_string()))
    }

    /// Most recently registered users, newest first. Used by the norms
    /// refresher to sample the current population.
    pub fn recent_users(&self, limit: u32) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, created_at FROM users ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                created_at: parse_ts(&row.get::<_, String>(2)?),
            })
        })?;
        let mut users = Vec::new();
        for u in rows {
            users.push(u?);
        }
        Ok(users)
    }

    pub fn trait_defs(&self, user_id: &str) -> Result<Vec<TraitDefinition>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEF_COLS} FROM trait_defs WHERE user_id = ?1 ORDER BY name"
        ))?;
        let rows = stmt.query_map([user_id], def_from_row)?;
        let mut defs = Vec::new();
        for d in rows {
            defs.push(d?);
        }
        Ok(defs)
    }

    pub fn trait_def_by_name(&self, user_id: &str, name: &str) -> Result<TraitDefinition> {
        self.conn
            .query_row(
                &format!("SELECT {DEF_COLS} FROM trait_defs WHERE user_id = ?1 AND name = ?2"),
                params![user_id, name],
                def_from_row,
            )
            .optional()?
            .ok_or_else(|| AscentError::UnknownTrait(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_norms_has_18_traits() {
        assert_eq!(seed_norms().len(), 18);
        assert!(seed_norms().contains_key("Communication"));
    }

    #[test]
    fn t_score_formula() {
        // (raw - avg) / std * 10 + 50
        assert_eq!(t_score(7, 5.0, 2.0), 60.0);
        assert_eq!(t_score(3, 5.0, 2.0), 40.0);
        assert_eq!(t_score(5, 5.0, 2.0), 50.0);
    }

    #[test]
    fn t_score_zero_std_is_neutral() {
        assert_eq!(t_score(9, 4.0, 0.0), 50.0);
        assert_eq!(t_score(0, 4.0, 0.0), 50.0);
    }

    #[test]
    fn register_seeds_definitions() {
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("lee@example.com").unwrap();
        let defs = store.trait_defs(&user.id).unwrap();
        assert_eq!(defs.len(), 18);
        assert!(defs.iter().all(|d| d.raw_score.is_none()));
        assert!(defs.iter().all(|d| d.t_score.is_none()));
    }

    #[test]
    fn register_duplicate_email_fails() {
        let store = Store::open_in_memory().unwrap();
        store.register_user("lee@example.com").unwrap();
        assert!(matches!(
            store.register_user("lee@example.com"),
            Err(AscentError::UserExists(_))
        ));
    }

    #[test]
    fn trait_def_by_name_unknown() {
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("a@example.com").unwrap();
        assert!(matches!(
            store.trait_def_by_name(&user.id, "Charisma"),
            Err(AscentError::UnknownTrait(_))
        ));
    }

    #[test]
    fn recent_users_orders_newest_first() {
        let store = Store::open_in_memory().unwrap();
        store.register_user("a@example.com").unwrap();
        store.register_user("b@example.com").unwrap();
        let recent = store.recent_users(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].created_at >= recent[1].created_at);
    }
}
