//! Client for the external action-plan service, and the pending actions it
//! produces.
//!
//! The service owns retrieval and text generation; this side only supplies
//! the user's context and persists the returned lines as pending actions
//! awaiting confirmation. Confirming an action records it as the user's
//! committed answer on the matching practice form.

use crate::error::{AscentError, Result};
use crate::forms::FormName;
use crate::store::{parse_ts, ts, Store};
use crate::types::TraitKind;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// PendingAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    pub user_id: String,
    pub category: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PlannerClient
// ---------------------------------------------------------------------------

/// Inputs the action-plan service needs to draft actions for one practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanContext {
    pub trait_name: String,
    pub practice: String,
    pub five_traits: Vec<String>,
    pub company: String,
    pub industry: String,
    pub role: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedActions {
    actions: Vec<String>,
}

pub struct PlannerClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl PlannerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Ask the service for draft actions. Nothing is persisted here; the
    /// caller stores the lines as pending actions on success.
    pub fn generate(&self, ctx: &PlanContext) -> Result<Vec<String>> {
        let url = format!(
            "{}/v1/action-plans",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .json(ctx)
            .send()
            .map_err(|e| AscentError::Planner(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AscentError::Planner(format!(
                "service returned {}",
                response.status()
            )));
        }
        let body: GeneratedActions = response
            .json()
            .map_err(|e| AscentError::Planner(e.to_string()))?;
        Ok(body.actions)
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Store {
    pub fn insert_pending_actions(
        &self,
        user_id: &str,
        category: &str,
        actions: &[String],
    ) -> Result<Vec<PendingAction>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::new();
        for action in actions {
            let pending = PendingAction {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                category: category.to_string(),
                action: action.clone(),
                created_at: Utc::now(),
            };
            tx.execute(
                "INSERT INTO pending_actions (id, user_id, category, action, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    pending.id,
                    pending.user_id,
                    pending.category,
                    pending.action,
                    ts(pending.created_at)
                ],
            )?;
            inserted.push(pending);
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn pending_actions(&self, user_id: &str) -> Result<Vec<PendingAction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, category, action, created_at FROM pending_actions
             WHERE user_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok(PendingAction {
                id: row.get(0)?,
                user_id: row.get(1)?,
                category: row.get(2)?,
                action: row.get(3)?,
                created_at: parse_ts(&row.get::<_, String>(4)?),
            })
        })?;
        let mut actions = Vec::new();
        for a in rows {
            actions.push(a?);
        }
        Ok(actions)
    }

    /// Confirm a pending action: when its category names a trait kind and
    /// that kind's practice form exists, the text is recorded there as the
    /// user's committed answer; the pending row is removed either way.
    pub fn confirm_pending_action(&self, user_id: &str, action_id: &str) -> Result<PendingAction> {
        let pending = self
            .conn
            .query_row(
                "SELECT id, user_id, category, action, created_at FROM pending_actions
                 WHERE id = ?1 AND user_id = ?2",
                params![action_id, user_id],
                |row| {
                    Ok(PendingAction {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        category: row.get(2)?,
                        action: row.get(3)?,
                        created_at: parse_ts(&row.get::<_, String>(4)?),
                    })
                },
            )
            .optional()?
            .ok_or_else(|| AscentError::PendingActionNotFound(action_id.to_string()))?;

        let tx = self.conn.unchecked_transaction()?;
        if let Ok(kind) = TraitKind::from_str(&pending.category) {
            if let Some(form) = self.find_form(user_id, &FormName::PracticeQuestions(kind))? {
                self.upsert_answer(user_id, &form.id, &pending.id, &pending.action)?;
            }
        }
        tx.execute(
            "DELETE FROM pending_actions WHERE id = ?1",
            [&pending.id],
        )?;
        tx.commit()?;
        Ok(pending)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
