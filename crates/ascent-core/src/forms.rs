//! Question forms and answers.
//!
//! Forms are owned per user and named by a fixed scheme so route handlers and
//! the cascade can locate them without holding ids. Deleting a form always
//! removes its questions, options, and answers in the same transaction.

use crate::error::{AscentError, Result};
use crate::store::{parse_ts, ts, Store};
use crate::types::TraitKind;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// FormName
// ---------------------------------------------------------------------------

/// Generated names for the forms the program creates per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormName {
    /// The one-off initial questionnaire.
    InitialQuestions,
    /// Follow-up questions for the chosen strength/weakness trait.
    TraitQuestions(TraitKind),
    /// Progress questions for the chosen practice of one kind.
    PracticeQuestions(TraitKind),
    /// Mind-body habits questionnaire.
    MindBody,
    /// Weekly progress check within a sprint.
    Progress {
        sprint_number: u32,
        kind: TraitKind,
        week: u32,
    },
}

impl fmt::Display for FormName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormName::InitialQuestions => write!(f, "1_INITIAL_QUESTIONS"),
            FormName::TraitQuestions(kind) => write!(f, "TRAIT_QUESTIONS_{}", kind.form_tag()),
            FormName::PracticeQuestions(kind) => {
                write!(f, "PRACTICE_QUESTIONS_{}", kind.form_tag())
            }
            FormName::MindBody => write!(f, "MIND_BODY_QUESTIONS"),
            FormName::Progress {
                sprint_number,
                kind,
                week,
            } => write!(
                f,
                "{}_PROGRESS_{}_WEEK_{}",
                sprint_number,
                kind.form_tag(),
                week
            ),
        }
    }
}

/// Week number within a sprint for progress-check form naming:
/// `floor(days_since_start / 7) + 1`, clamped to 1..=6.
pub fn progress_week(today: DateTime<Utc>, sprint_start: DateTime<Utc>) -> u32 {
    let days = (today - sprint_start).num_days();
    let week = days.div_euclid(7) + 1;
    week.clamp(1, 6) as u32
}

// ---------------------------------------------------------------------------
// Question bank
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankQuestion {
    pub rank: i64,
    pub text: String,
}

static BANK_JSON: &str = include_str!("../data/question_bank.json");
static BANK: OnceLock<HashMap<String, Vec<BankQuestion>>> = OnceLock::new();

/// Static follow-up question bank keyed by trait name (plus the `MIND_BODY`
/// key). Not every trait has an entry; a missing entry yields a form with
/// zero questions, which is accepted.
pub fn question_bank() -> &'static HashMap<String, Vec<BankQuestion>> {
    BANK.get_or_init(|| {
        serde_json::from_str(BANK_JSON).expect("question_bank.json ships with the crate")
    })
}

// ---------------------------------------------------------------------------
// Form / Question / Answer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub form_id: String,
    pub rank: i64,
    pub text: String,
}

fn form_from_row(row: &Row<'_>) -> rusqlite::Result<Form> {
    Ok(Form {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_ts(&row.get::<_, String>(3)?),
    })
}

// ---------------------------------------------------------------------------
// Connection-level helpers (usable inside a larger transaction)
// ---------------------------------------------------------------------------

/// Create a form with questions from the bank entry for `bank_key` (zero
/// questions when the bank has no entry).
pub(crate) fn create_form_tx(
    conn: &Connection,
    user_id: &str,
    name: &FormName,
    bank_key: Option<&str>,
) -> Result<Form> {
    let form = Form {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        name: name.to_string(),
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO forms (id, user_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![form.id, form.user_id, form.name, ts(form.created_at)],
    )?;
    if let Some(key) = bank_key {
        if let Some(questions) = question_bank().get(key) {
            for q in questions {
                conn.execute(
                    "INSERT INTO questions (id, form_id, rank, text) VALUES (?1, ?2, ?3, ?4)",
                    params![Uuid::new_v4().to_string(), form.id, q.rank, q.text],
                )?;
            }
        }
    }
    Ok(form)
}

/// Delete a form together with its questions, options, and answers.
pub(crate) fn delete_form_tx(conn: &Connection, form_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM question_options WHERE question_id IN
         (SELECT id FROM questions WHERE form_id = ?1)",
        [form_id],
    )?;
    conn.execute("DELETE FROM questions WHERE form_id = ?1", [form_id])?;
    conn.execute("DELETE FROM answers WHERE form_id = ?1", [form_id])?;
    conn.execute("DELETE FROM forms WHERE id = ?1", [form_id])?;
    Ok(())
}

pub(crate) fn find_form_tx(
    conn: &Connection,
    user_id: &str,
    name: &FormName,
) -> Result<Option<Form>> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, name, created_at FROM forms WHERE user_id = ?1 AND name = ?2",
            params![user_id, name.to_string()],
            form_from_row,
        )
        .optional()?)
}

// ---------------------------------------------------------------------------
// Store API
// ---------------------------------------------------------------------------

impl Store {
    pub fn create_form(
        &self,
        user_id: &str,
        name: &FormName,
        bank_key: Option<&str>,
    ) -> Result<Form> {
        let tx = self.conn.unchecked_transaction()?;
        let form = create_form_tx(&tx, user_id, name, bank_key)?;
        tx.commit()?;
        Ok(form)
    }

    pub fn find_form(&self, user_id: &str, name: &FormName) -> Result<Option<Form>> {
        find_form_tx(&self.conn, user_id, name)
    }

    pub fn get_or_create_form(&self, user_id: &str, name: &FormName) -> Result<Form> {
        if let Some(form) = self.find_form(user_id, name)? {
            return Ok(form);
        }
        self.create_form(user_id, name, None)
    }

    pub fn get_form(&self, form_id: &str) -> Result<Form> {
        self.conn
            .query_row(
                "SELECT id, user_id, name, created_at FROM forms WHERE id = ?1",
                [form_id],
                form_from_row,
            )
            .optional()?
            .ok_or_else(|| AscentError::FormNotFound(form_id.to_string()))
    }

    pub fn delete_form(&self, form_id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        delete_form_tx(&tx, form_id)?;
        tx.commit()?;
        Ok(())
    }

    pub fn form_questions(&self, form_id: &str) -> Result<Vec<Question>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, form_id, rank, text FROM questions WHERE form_id = ?1 ORDER BY rank",
        )?;
        let rows = stmt.query_map([form_id], |row| {
            Ok(Question {
                id: row.get(0)?,
                form_id: row.get(1)?,
                rank: row.get(2)?,
                text: row.get(3)?,
            })
        })?;
        let mut questions = Vec::new();
        for q in rows {
            questions.push(q?);
        }
        Ok(questions)
    }

    /// Insert or update the answer for (user, form, question).
    pub fn upsert_answer(
        &self,
        user_id: &str,
        form_id: &str,
        question_id: &str,
        value: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO answers (id, user_id, form_id, question_id, value)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, form_id, question_id) DO UPDATE SET value = excluded.value",
            params![
                Uuid::new_v4().to_string(),
                user_id,
                form_id,
                question_id,
                value
            ],
        )?;
        Ok(())
    }

    /// Stored answers for a form as a question_id → value map.
    pub fn answer_map(&self, user_id: &str, form_id: &str) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT question_id, value FROM answers WHERE user_id = ?1 AND form_id = ?2")?;
        let rows = stmt.query_map(params![user_id, form_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut map = HashMap::new();
        for r in rows {
            let (q, v) = r?;
            map.insert(q, v);
        }
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn form_names() {
        assert_eq!(FormName::InitialQuestions.to_string(), "1_INITIAL_QUESTIONS");
        assert_eq!(
            FormName::TraitQuestions(TraitKind::Strength).to_string(),
            "TRAIT_QUESTIONS_STRENGTH"
        );
        assert_eq!(
            FormName::PracticeQuestions(TraitKind::Weakness).to_string(),
            "PRACTICE_QUESTIONS_WEAKNESS"
        );
        assert_eq!(FormName::MindBody.to_string(), "MIND_BODY_QUESTIONS");
        assert_eq!(
            FormName::Progress {
                sprint_number: 2,
                kind: TraitKind::Strength,
                week: 3
            }
            .to_string(),
            "2_PROGRESS_STRENGTH_WEEK_3"
        );
    }

    #[test]
    fn progress_week_math() {
        let start = Utc::now();
        assert_eq!(progress_week(start, start), 1);
        assert_eq!(progress_week(start + Duration::days(6), start), 1);
        assert_eq!(progress_week(start + Duration::days(7), start), 2);
        assert_eq!(progress_week(start + Duration::days(20), start), 3);
    }

    #[test]
    fn progress_week_clamps() {
        let start = Utc::now();
        // Far future clamps to 6, clock skew before start clamps to 1.
        assert_eq!(progress_week(start + Duration::days(365), start), 6);
        assert_eq!(progress_week(start - Duration::days(3), start), 1);
    }

    #[test]
    fn bank_has_known_traits() {
        let bank = question_bank();
        assert!(bank.contains_key("Communication"));
        assert!(bank.contains_key("MIND_BODY"));
        let qs = &bank["Communication"];
        assert!(qs.len() >= 5);
        assert_eq!(qs[0].rank, 1);
    }

    #[test]
    fn create_form_from_bank() {
        let store = Store::open_in_memory().unwrap();
        let form = store
            .create_form(
                "u1",
                &FormName::TraitQuestions(TraitKind::Weakness),
                Some("Delegation"),
            )
            .unwrap();
        let questions = store.form_questions(&form.id).unwrap();
        assert_eq!(questions.len(), 7);
        assert!(questions.windows(2).all(|w| w[0].rank <= w[1].rank));
    }

    #[test]
    fn unknown_bank_key_gives_empty_form() {
        let store = Store::open_in_memory().unwrap();
        let form = store
            .create_form(
                "u1",
                &FormName::TraitQuestions(TraitKind::Strength),
                Some("Charisma"),
            )
            .unwrap();
        assert!(store.form_questions(&form.id).unwrap().is_empty());
    }

    #[test]
    fn delete_form_removes_children() {
        let store = Store::open_in_memory().unwrap();
        let form = store
            .create_form(
                "u1",
                &FormName::TraitQuestions(TraitKind::Strength),
                Some("Listening"),
            )
            .unwrap();
        let q = &store.form_questions(&form.id).unwrap()[0];
        store.upsert_answer("u1", &form.id, &q.id, "To a Small Extent").unwrap();

        store.delete_form(&form.id).unwrap();
        assert!(store.find_form("u1", &FormName::TraitQuestions(TraitKind::Strength)).unwrap().is_none());
        assert!(store.answer_map("u1", &form.id).unwrap().is_empty());
    }

    #[test]
    fn answer_upsert_replaces_value() {
        let store = Store::open_in_memory().unwrap();
        let form = store
            .get_or_create_form("u1", &FormName::InitialQuestions)
            .unwrap();
        store.upsert_answer("u1", &form.id, "q1", "a").unwrap();
        store.upsert_answer("u1", &form.id, "q1", "b").unwrap();
        let map = store.answer_map("u1", &form.id).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["q1"], "b");
    }

    #[test]
    fn get_or_create_form_is_stable() {
        let store = Store::open_in_memory().unwrap();
        let a = store
            .get_or_create_form("u1", &FormName::InitialQuestions)
            .unwrap();
        let b = store
            .get_or_create_form("u1", &FormName::InitialQuestions)
            .unwrap();
        assert_eq!(a.id, b.id);
    }
}
