//! Scheduled out-of-band work: colleague-feedback e-mails and the periodic
//! population-norms refresh.
//!
//! A `Nudge` is a due timestamp paired with what to do when it arrives. The
//! server's poll loop queries `NudgeDb` for due nudges and dispatches each —
//! colleague kinds to the mailer, `StatsRefresh` to the norms refresher.
//! Nothing here runs on the request path.

pub mod db;

pub use db::NudgeDb;

use crate::error::{AscentError, Result};
use crate::plan::{colleague_touchpoints, DevelopmentPlan};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// NudgeKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NudgeKind {
    /// Program-start invitation asking a colleague to give feedback.
    ColleagueInvite { email: String },
    /// End-of-program survey for the same colleague.
    ColleagueSurvey { email: String },
    /// Recompute population norms from recent registrations.
    StatsRefresh,
}

// ---------------------------------------------------------------------------
// NudgeStatus
// ---------------------------------------------------------------------------

/// Lifecycle: `Pending → Sending → Sent | Failed`.
///
/// The poll loop writes `Sending` before dispatching. On restart, anything
/// stuck in `Sending` is recovered to `Failed` by `startup_recovery`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NudgeStatus {
    Pending,
    Sending,
    Sent,
    Failed { reason: String },
}

// ---------------------------------------------------------------------------
// Nudge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nudge {
    pub id: Uuid,
    pub user_id: String,
    pub kind: NudgeKind,
    pub due_at: DateTime<Utc>,
    pub status: NudgeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Nudge {
    pub fn new(user_id: impl Into<String>, kind: NudgeKind, due_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind,
            due_at,
            status: NudgeStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Colleague enrollment
// ---------------------------------------------------------------------------

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

pub fn validate_email(email: &str) -> Result<()> {
    if email_re().is_match(email) {
        Ok(())
    } else {
        Err(AscentError::InvalidEmail(email.to_string()))
    }
}

/// Enroll one colleague for a plan: an invite at slot-1 start and the final
/// survey at slot-12 start.
pub fn schedule_colleague(
    db: &NudgeDb,
    user_id: &str,
    email: &str,
    plan: &DevelopmentPlan,
) -> Result<(Nudge, Nudge)> {
    validate_email(email)?;
    let (invite_at, survey_at) = colleague_touchpoints(plan)?;
    let invite = Nudge::new(
        user_id,
        NudgeKind::ColleagueInvite {
            email: email.to_string(),
        },
        invite_at,
    );
    let survey = Nudge::new(
        user_id,
        NudgeKind::ColleagueSurvey {
            email: email.to_string(),
        },
        survey_at,
    );
    db.insert(&invite)?;
    db.insert(&survey)?;
    Ok((invite, survey))
}

/// Queue a norms refresh for immediate pickup by the poll loop.
pub fn schedule_stats_refresh(db: &NudgeDb, user_id: &str) -> Result<Nudge> {
    let nudge = Nudge::new(user_id, NudgeKind::StatsRefresh, Utc::now());
    db.insert(&nudge)?;
    Ok(nudge)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use tempfile::TempDir;

    #[test]
    fn email_validation() {
        assert!(validate_email("peer@example.com").is_ok());
        assert!(validate_email("peer+notes@team.example.co").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("two@at@signs.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn colleague_enrollment_schedules_both_touchpoints() {
        let dir = TempDir::new().unwrap();
        let db = NudgeDb::open(&dir.path().join("nudges.redb")).unwrap();
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("a@example.com").unwrap();
        let plan = store.get_or_create_plan(&user.id).unwrap();

        let (invite, survey) =
            schedule_colleague(&db, &user.id, "peer@example.com", &plan).unwrap();
        assert!(invite.due_at < survey.due_at);
        assert_eq!(invite.due_at, plan.start_date.unwrap());

        let all = db.list_all().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn bad_colleague_email_schedules_nothing() {
        let dir = TempDir::new().unwrap();
        let db = NudgeDb::open(&dir.path().join("nudges.redb")).unwrap();
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("a@example.com").unwrap();
        let plan = store.get_or_create_plan(&user.id).unwrap();

        assert!(schedule_colleague(&db, &user.id, "nope", &plan).is_err());
        assert!(db.list_all().unwrap().is_empty());
    }

    #[test]
    fn stats_refresh_is_immediately_due() {
        let dir = TempDir::new().unwrap();
        let db = NudgeDb::open(&dir.path().join("nudges.redb")).unwrap();
        schedule_stats_refresh(&db, "system").unwrap();
        let due = db.range_due(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].kind, NudgeKind::StatsRefresh);
    }
}
