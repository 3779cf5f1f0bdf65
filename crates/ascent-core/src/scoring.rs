//! Scoring engine for the initial questionnaire.
//!
//! Each submitted answer names the trait its selected option maps to. A
//! submission resets the user's accumulated raw scores, re-applies every
//! answer as a +1 on its trait, then recomputes T-scores for the whole
//! registry. Submitting the identical answer set is detected up front and
//! leaves everything untouched — this is the gate that keeps downstream
//! selection state from being invalidated by a no-op re-take.

use crate::error::{AscentError, Result};
use crate::forms::FormName;
use crate::registry::t_score;
use crate::store::Store;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counter name for submissions, shared with the stats-refresh cadence.
pub const SUBMISSION_COUNTER: &str = "initial_submissions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialAnswer {
    pub question_id: String,
    pub value: String,
    /// Trait the selected option maps to.
    pub trait_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScoringOutcome {
    /// Identical to the stored answer set; nothing recomputed.
    Unchanged,
    /// Scores recomputed. `submission_count` is the global submission
    /// counter after this submission, used for the stats-refresh cadence.
    Scored { submission_count: u64 },
}

/// Whether the Nth submission should enqueue a population-norms refresh.
pub fn due_for_stats_refresh(submission_count: u64, refresh_every: u64) -> bool {
    refresh_every > 0 && submission_count % refresh_every == 0
}

impl Store {
    /// Apply an initial-questionnaire submission for `user_id`.
    pub fn submit_initial_answers(
        &self,
        user_id: &str,
        answers: &[InitialAnswer],
    ) -> Result<ScoringOutcome> {
        if answers.is_empty() {
            return Err(AscentError::InvalidAnswers(
                "empty answer set".to_string(),
            ));
        }
        self.get_user(user_id)?;

        let form = self.get_or_create_form(user_id, &FormName::InitialQuestions)?;

        let stored = self.answer_map(user_id, &form.id)?;
        let incoming: HashMap<&str, &str> = answers
            .iter()
            .map(|a| (a.question_id.as_str(), a.value.as_str()))
            .collect();
        if incoming.len() != answers.len() {
            return Err(AscentError::InvalidAnswers(
                "duplicate question_id in answer set".to_string(),
            ));
        }
        if stored.len() == incoming.len()
            && incoming
                .iter()
                .all(|(q, v)| stored.get(*q).map(String::as_str) == Some(*v))
        {
            return Ok(ScoringOutcome::Unchanged);
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE trait_defs SET raw_score = NULL, t_score = NULL WHERE user_id = ?1",
            [user_id],
        )?;
        for answer in answers {
            self.upsert_answer(user_id, &form.id, &answer.question_id, &answer.value)?;
            let hit = tx.execute(
                "UPDATE trait_defs SET raw_score = COALESCE(raw_score, 0) + 1
                 WHERE user_id = ?1 AND name = ?2",
                params![user_id, answer.trait_name],
            )?;
            if hit == 0 {
                return Err(AscentError::UnknownTrait(answer.trait_name.clone()));
            }
        }
        let scored: Vec<(String, i64, f64, f64)> = {
            let mut stmt = tx.prepare(
                "SELECT id, raw_score, average, std_dev FROM trait_defs
                 WHERE user_id = ?1 AND raw_score IS NOT NULL",
            )?;
            let rows = stmt.query_map([user_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            let mut v = Vec::new();
            for r in rows {
                v.push(r?);
            }
            v
        };
        for (id, raw, average, std_dev) in scored {
            tx.execute(
                "UPDATE trait_defs SET t_score = ?1 WHERE id = ?2",
                params![t_score(raw, average, std_dev), id],
            )?;
        }
        tx.commit()?;

        let submission_count = self.bump_counter(SUBMISSION_COUNTER)?;
        Ok(ScoringOutcome::Scored { submission_count })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(q: &str, trait_name: &str) -> InitialAnswer {
        InitialAnswer {
            question_id: q.to_string(),
            value: format!("option for {trait_name}"),
            trait_name: trait_name.to_string(),
        }
    }

    #[test]
    fn scoring_accumulates_raw_counts() {
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("a@example.com").unwrap();
        let answers = vec![
            answer("q1", "Communication"),
            answer("q2", "Communication"),
            answer("q3", "Delegation"),
        ];
        let outcome = store.submit_initial_answers(&user.id, &answers).unwrap();
        assert!(matches!(outcome, ScoringOutcome::Scored { .. }));

        let comm = store.trait_def_by_name(&user.id, "Communication").unwrap();
        assert_eq!(comm.raw_score, Some(2));
        let del = store.trait_def_by_name(&user.id, "Delegation").unwrap();
        assert_eq!(del.raw_score, Some(1));
        // Untouched traits stay unscored.
        let vision = store.trait_def_by_name(&user.id, "Vision").unwrap();
        assert_eq!(vision.raw_score, None);
        assert_eq!(vision.t_score, None);
    }

    #[test]
    fn scoring_applies_t_formula() {
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("a@example.com").unwrap();
        store
            .submit_initial_answers(&user.id, &[answer("q1", "Delegation")])
            .unwrap();
        let def = store.trait_def_by_name(&user.id, "Delegation").unwrap();
        let expected = (1.0 - def.average) / def.std_dev * 10.0 + 50.0;
        assert!((def.t_score.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn identical_resubmission_is_unchanged() {
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("a@example.com").unwrap();
        let answers = vec![answer("q1", "Communication"), answer("q2", "Empathy")];
        store.submit_initial_answers(&user.id, &answers).unwrap();
        let outcome = store.submit_initial_answers(&user.id, &answers).unwrap();
        assert_eq!(outcome, ScoringOutcome::Unchanged);
        // Counter did not advance for the no-op.
        let outcome = store
            .submit_initial_answers(&user.id, &[answer("q1", "Communication"), answer("q2", "Vision")])
            .unwrap();
        assert_eq!(outcome, ScoringOutcome::Scored { submission_count: 2 });
    }

    #[test]
    fn resubmission_resets_prior_counts() {
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("a@example.com").unwrap();
        store
            .submit_initial_answers(&user.id, &[answer("q1", "Communication")])
            .unwrap();
        store
            .submit_initial_answers(&user.id, &[answer("q1", "Delegation")])
            .unwrap();

        let comm = store.trait_def_by_name(&user.id, "Communication").unwrap();
        assert_eq!(comm.raw_score, None);
        assert_eq!(comm.t_score, None);
        let del = store.trait_def_by_name(&user.id, "Delegation").unwrap();
        assert_eq!(del.raw_score, Some(1));
    }

    #[test]
    fn unknown_trait_rolls_back_everything() {
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("a@example.com").unwrap();
        store
            .submit_initial_answers(&user.id, &[answer("q1", "Communication")])
            .unwrap();

        let bad = vec![answer("q1", "Empathy"), answer("q2", "Charisma")];
        assert!(matches!(
            store.submit_initial_answers(&user.id, &bad),
            Err(AscentError::UnknownTrait(_))
        ));
        // Prior state survives the rollback.
        let comm = store.trait_def_by_name(&user.id, "Communication").unwrap();
        assert_eq!(comm.raw_score, Some(1));
    }

    #[test]
    fn empty_and_duplicate_sets_rejected() {
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("a@example.com").unwrap();
        assert!(matches!(
            store.submit_initial_answers(&user.id, &[]),
            Err(AscentError::InvalidAnswers(_))
        ));
        let dup = vec![answer("q1", "Empathy"), answer("q1", "Vision")];
        assert!(matches!(
            store.submit_initial_answers(&user.id, &dup),
            Err(AscentError::InvalidAnswers(_))
        ));
    }

    #[test]
    fn refresh_cadence() {
        assert!(!due_for_stats_refresh(24, 25));
        assert!(due_for_stats_refresh(25, 25));
        assert!(due_for_stats_refresh(50, 25));
        assert!(!due_for_stats_refresh(10, 0));
    }
}
