//! Sprint lifecycle within a development plan.
//!
//! Per plan: no-sprint → sprint-1-active → sprint-1-finished →
//! sprint-2-active → sprint-2-finished. Finishing is an explicit call;
//! advancing is lazy — the next sprint is created the first time sprint data
//! is requested after the previous one finished.

use crate::error::{AscentError, Result};
use crate::store::{opt_ts, parse_opt_ts, Store};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_SPRINTS: u32 = 2;
pub const SPRINT_WEEKS: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub number: u32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub finished: bool,
    pub strength_practice_form_id: Option<String>,
    pub weakness_practice_form_id: Option<String>,
}

fn sprint_from_row(row: &Row<'_>) -> rusqlite::Result<Sprint> {
    Ok(Sprint {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plan_id: row.get(2)?,
        number: row.get::<_, i64>(3)? as u32,
        start_date: parse_opt_ts(row.get(4)?),
        end_date: parse_opt_ts(row.get(5)?),
        finished: row.get::<_, i64>(6)? != 0,
        strength_practice_form_id: row.get(7)?,
        weakness_practice_form_id: row.get(8)?,
    })
}

const SPRINT_COLS: &str = "id, user_id, plan_id, number, start_date, end_date, finished, \
                           strength_practice_form_id, weakness_practice_form_id";

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Store {
    /// Highest-numbered sprint for the plan, if any. `None` on a fresh plan
    /// is "nothing to report", not an error.
    pub fn latest_sprint(&self, plan_id: &str) -> Result<Option<Sprint>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {SPRINT_COLS} FROM sprints WHERE plan_id = ?1
                     ORDER BY number DESC LIMIT 1"
                ),
                [plan_id],
                sprint_from_row,
            )
            .optional()?)
    }

    pub fn find_sprint(&self, plan_id: &str, number: u32) -> Result<Option<Sprint>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {SPRINT_COLS} FROM sprints WHERE plan_id = ?1 AND number = ?2"),
                params![plan_id, number],
                sprint_from_row,
            )
            .optional()?)
    }

    /// The sprint the user is currently in, creating sprint 1 on first call
    /// and sprint N+1 lazily once sprint N has been finished. Once sprint 2
    /// is finished it keeps being returned as the terminal state.
    pub fn current_sprint(&self, plan_id: &str) -> Result<Sprint> {
        let plan = self.get_plan(plan_id)?;
        let (plan_start, plan_end) = plan
            .span()
            .ok_or_else(|| AscentError::PlanDatesMissing(plan.id.clone()))?;

        match self.latest_sprint(plan_id)? {
            None => self.insert_sprint(
                &plan.user_id,
                plan_id,
                1,
                plan_start,
                plan_start + Duration::weeks(SPRINT_WEEKS),
            ),
            Some(s) if s.finished && s.number < MAX_SPRINTS => {
                // Sprint N+1 picks up one second after N's scheduled end and
                // absorbs whatever remains of the plan.
                let prev_end = s.end_date.unwrap_or(plan_start);
                self.insert_sprint(
                    &plan.user_id,
                    plan_id,
                    s.number + 1,
                    prev_end + Duration::seconds(1),
                    plan_end,
                )
            }
            Some(s) => Ok(s),
        }
    }

    fn insert_sprint(
        &self,
        user_id: &str,
        plan_id: &str,
        number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Sprint> {
        let sprint = Sprint {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            plan_id: plan_id.to_string(),
            number,
            start_date: Some(start),
            end_date: Some(end),
            finished: false,
            strength_practice_form_id: None,
            weakness_practice_form_id: None,
        };
        self.conn.execute(
            "INSERT INTO sprints (id, user_id, plan_id, number, start_date, end_date, finished)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                sprint.id,
                sprint.user_id,
                sprint.plan_id,
                sprint.number,
                opt_ts(sprint.start_date),
                opt_ts(sprint.end_date)
            ],
        )?;
        Ok(sprint)
    }

    /// Explicitly finish sprint `number`. Finishing the final sprint also
    /// finishes the plan.
    pub fn finish_sprint(&self, plan_id: &str, number: u32) -> Result<Sprint> {
        let sprint = self
            .find_sprint(plan_id, number)?
            .ok_or(AscentError::SprintNotFound(number))?;
        if sprint.finished {
            return Err(AscentError::SprintAlreadyFinished(number));
        }
        self.conn.execute(
            "UPDATE sprints SET finished = 1 WHERE id = ?1",
            [&sprint.id],
        )?;
        if number >= MAX_SPRINTS {
            self.finish_plan(plan_id)?;
        }
        self.find_sprint(plan_id, number)?
            .ok_or(AscentError::SprintNotFound(number))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
