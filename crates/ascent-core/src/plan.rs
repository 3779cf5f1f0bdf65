//! Development plans: the four-week program container.
//!
//! One unfinished plan per user, created on demand. The colleague-message
//! schedule still divides the plan span into 12 slots — the layout the
//! stored week_5/week_9 fields were built around — but only slot 1 (initial
//! invite) and slot 12 (final survey) are acted on in the 4-week program.

use crate::error::{AscentError, Result};
use crate::store::{opt_ts, parse_opt_ts, parse_ts, ts, Store};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PROGRAM_WEEKS: i64 = 4;
pub const SCHEDULE_SLOTS: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevelopmentPlan {
    pub id: String,
    pub user_id: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub chosen_strength_id: Option<String>,
    pub chosen_weakness_id: Option<String>,
    pub finished: bool,
    pub created_at: DateTime<Utc>,
}

impl DevelopmentPlan {
    /// Plan span, when dates are set.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.start_date, self.end_date) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }
}

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<DevelopmentPlan> {
    Ok(DevelopmentPlan {
        id: row.get(0)?,
        user_id: row.get(1)?,
        start_date: parse_opt_ts(row.get(2)?),
        end_date: parse_opt_ts(row.get(3)?),
        chosen_strength_id: row.get(4)?,
        chosen_weakness_id: row.get(5)?,
        finished: row.get::<_, i64>(6)? != 0,
        created_at: parse_ts(&row.get::<_, String>(7)?),
    })
}

const PLAN_COLS: &str = "id, user_id, start_date, end_date, chosen_strength_id, \
                         chosen_weakness_id, finished, created_at";

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Divide [start, end) into the legacy 12 equal slots.
pub fn week_buckets(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let span_ms = (end - start).num_milliseconds().max(0);
    let slots = SCHEDULE_SLOTS as i64;
    (0..slots)
        .map(|i| {
            let a = start + Duration::milliseconds(span_ms * i / slots);
            let b = start + Duration::milliseconds(span_ms * (i + 1) / slots);
            (a, b)
        })
        .collect()
}

/// The two acted-on touchpoints: slot-1 start (colleague invite) and
/// slot-12 start (final survey).
pub fn colleague_touchpoints(plan: &DevelopmentPlan) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (start, end) = plan
        .span()
        .ok_or_else(|| AscentError::PlanDatesMissing(plan.id.clone()))?;
    let buckets = week_buckets(start, end);
    Ok((buckets[0].0, buckets[SCHEDULE_SLOTS - 1].0))
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Store {
    /// The user's unfinished plan, creating one (dated now → now + 4 weeks)
    /// when none exists.
    pub fn get_or_create_plan(&self, user_id: &str) -> Result<DevelopmentPlan> {
        self.get_user(user_id)?;
        if let Some(plan) = self.active_plan(user_id)? {
            return Ok(plan);
        }
        let now = Utc::now();
        let plan = DevelopmentPlan {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            start_date: Some(now),
            end_date: Some(now + Duration::weeks(PROGRAM_WEEKS)),
            chosen_strength_id: None,
            chosen_weakness_id: None,
            finished: false,
            created_at: now,
        };
        self.conn.execute(
            "INSERT INTO plans (id, user_id, start_date, end_date, finished, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                plan.id,
                plan.user_id,
                opt_ts(plan.start_date),
                opt_ts(plan.end_date),
                ts(plan.created_at)
            ],
        )?;
        Ok(plan)
    }

    pub fn active_plan(&self, user_id: &str) -> Result<Option<DevelopmentPlan>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {PLAN_COLS} FROM plans
                     WHERE user_id = ?1 AND finished = 0
                     ORDER BY created_at DESC LIMIT 1"
                ),
                [user_id],
                plan_from_row,
            )
            .optional()?)
    }

    pub fn get_plan(&self, plan_id: &str) -> Result<DevelopmentPlan> {
        self.conn
            .query_row(
                &format!("SELECT {PLAN_COLS} FROM plans WHERE id = ?1"),
                [plan_id],
                plan_from_row,
            )
            .optional()?
            .ok_or_else(|| AscentError::PlanNotFound(plan_id.to_string()))
    }

    pub fn finish_plan(&self, plan_id: &str) -> Result<()> {
        let hit = self
            .conn
            .execute("UPDATE plans SET finished = 1 WHERE id = ?1", [plan_id])?;
        if hit == 0 {
            return Err(AscentError::PlanNotFound(plan_id.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
