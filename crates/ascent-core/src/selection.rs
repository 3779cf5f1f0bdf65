//! Chosen strength/weakness selection and cascade invalidation.
//!
//! Changing either chosen trait invalidates everything built on the old
//! pair. The cascade is represented as a typed, ordered list of steps so the
//! dependency ordering is auditable and testable on its own; the executor
//! runs the whole list inside one transaction — a mid-cascade failure rolls
//! everything back and half-invalidated state is never observable.

use crate::error::{AscentError, Result};
use crate::forms::{create_form_tx, delete_form_tx, find_form_tx, FormName};
use crate::plan::DevelopmentPlan;
use crate::store::{opt_ts, parse_opt_ts, Store};
use crate::types::TraitKind;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ChosenTrait
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChosenTrait {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub kind: TraitKind,
    pub name: String,
    pub trait_id: String,
    pub t_score: Option<f64>,
    /// Follow-up question form for this trait.
    pub form_id: String,
    pub practice_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChosenPair {
    pub strength: ChosenTrait,
    pub weakness: ChosenTrait,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelectionOutcome {
    Created(ChosenPair),
    Unchanged(ChosenPair),
    Replaced(ChosenPair),
}

impl SelectionOutcome {
    pub fn pair(&self) -> &ChosenPair {
        match self {
            SelectionOutcome::Created(p)
            | SelectionOutcome::Unchanged(p)
            | SelectionOutcome::Replaced(p) => p,
        }
    }
}

fn chosen_from_row(row: &Row<'_>) -> rusqlite::Result<ChosenTrait> {
    let kind: String = row.get(3)?;
    Ok(ChosenTrait {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plan_id: row.get(2)?,
        kind: TraitKind::from_str(&kind).unwrap_or(TraitKind::Strength),
        name: row.get(4)?,
        trait_id: row.get(5)?,
        t_score: row.get(6)?,
        form_id: row.get(7)?,
        practice_id: row.get(8)?,
        start_date: parse_opt_ts(row.get(9)?),
        end_date: parse_opt_ts(row.get(10)?),
        version: row.get(11)?,
    })
}

const CHOSEN_COLS: &str = "id, user_id, plan_id, kind, name, trait_id, t_score, form_id, \
                           practice_id, start_date, end_date, version";

// ---------------------------------------------------------------------------
// Invalidation plan
// ---------------------------------------------------------------------------

/// One step of the cascade: a table plus the predicate to apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum InvalidationStep {
    ClearPlanPointers { plan_id: String },
    ClearSprintFormLinks { sprint_id: String },
    DeletePractices { chosen_trait_id: String },
    DeleteChosenPractices { chosen_trait_id: String },
    DeleteForm { form_id: String },
    DeleteChosenTrait { chosen_trait_id: String },
    DeletePersonalPracticeCategory { category_id: String },
    DeletePendingActions { user_id: String },
}

/// Snapshot of everything the cascade needs to reference by id.
#[derive(Debug, Clone, Default)]
pub struct InvalidationContext {
    pub user_id: String,
    pub plan_id: String,
    pub sprint_ids: Vec<String>,
    /// (chosen_trait_id, trait-question form_id) for each existing kind.
    pub chosen: Vec<(String, String)>,
    pub practice_form_ids: Vec<String>,
    pub mind_body_form_id: Option<String>,
    pub category_id: Option<String>,
}

/// Build the ordered cascade. Later steps depend on foreign keys resolved by
/// earlier ones, so the order here is load-bearing.
pub fn invalidation_plan(ctx: &InvalidationContext) -> Vec<InvalidationStep> {
    let mut steps = vec![InvalidationStep::ClearPlanPointers {
        plan_id: ctx.plan_id.clone(),
    }];
    for sprint_id in &ctx.sprint_ids {
        steps.push(InvalidationStep::ClearSprintFormLinks {
            sprint_id: sprint_id.clone(),
        });
    }
    for (chosen_trait_id, _) in &ctx.chosen {
        steps.push(InvalidationStep::DeletePractices {
            chosen_trait_id: chosen_trait_id.clone(),
        });
        steps.push(InvalidationStep::DeleteChosenPractices {
            chosen_trait_id: chosen_trait_id.clone(),
        });
    }
    for form_id in &ctx.practice_form_ids {
        steps.push(InvalidationStep::DeleteForm {
            form_id: form_id.clone(),
        });
    }
    for (chosen_trait_id, _) in &ctx.chosen {
        steps.push(InvalidationStep::DeleteChosenTrait {
            chosen_trait_id: chosen_trait_id.clone(),
        });
    }
    for (_, form_id) in &ctx.chosen {
        steps.push(InvalidationStep::DeleteForm {
            form_id: form_id.clone(),
        });
    }
    if let Some(category_id) = &ctx.category_id {
        steps.push(InvalidationStep::DeletePersonalPracticeCategory {
            category_id: category_id.clone(),
        });
    }
    if let Some(form_id) = &ctx.mind_body_form_id {
        steps.push(InvalidationStep::DeleteForm {
            form_id: form_id.clone(),
        });
    }
    steps.push(InvalidationStep::DeletePendingActions {
        user_id: ctx.user_id.clone(),
    });
    steps
}

fn apply_step(conn: &Connection, step: &InvalidationStep) -> Result<()> {
    match step {
        InvalidationStep::ClearPlanPointers { plan_id } => {
            conn.execute(
                "UPDATE plans SET chosen_strength_id = NULL, chosen_weakness_id = NULL
                 WHERE id = ?1",
                [plan_id],
            )?;
        }
        InvalidationStep::ClearSprintFormLinks { sprint_id } => {
            conn.execute(
                "UPDATE sprints SET strength_practice_form_id = NULL,
                                    weakness_practice_form_id = NULL
                 WHERE id = ?1",
                [sprint_id],
            )?;
        }
        InvalidationStep::DeletePractices { chosen_trait_id } => {
            conn.execute(
                "DELETE FROM practices WHERE chosen_trait_id = ?1",
                [chosen_trait_id],
            )?;
        }
        InvalidationStep::DeleteChosenPractices { chosen_trait_id } => {
            conn.execute(
                "DELETE FROM chosen_practices WHERE chosen_trait_id = ?1",
                [chosen_trait_id],
            )?;
        }
        InvalidationStep::DeleteForm { form_id } => {
            delete_form_tx(conn, form_id)?;
        }
        InvalidationStep::DeleteChosenTrait { chosen_trait_id } => {
            conn.execute("DELETE FROM chosen_traits WHERE id = ?1", [chosen_trait_id])?;
        }
        InvalidationStep::DeletePersonalPracticeCategory { category_id } => {
            conn.execute(
                "DELETE FROM chosen_personal_practices WHERE category_id = ?1",
                [category_id],
            )?;
            conn.execute(
                "DELETE FROM personal_practice_categories WHERE id = ?1",
                [category_id],
            )?;
        }
        InvalidationStep::DeletePendingActions { user_id } => {
            conn.execute("DELETE FROM pending_actions WHERE user_id = ?1", [user_id])?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Store {
    pub fn chosen_traits_for_plan(&self, plan_id: &str) -> Result<Vec<ChosenTrait>> {
        chosen_rows(&self.conn, plan_id)
    }

    pub fn chosen_trait(&self, plan_id: &str, kind: TraitKind) -> Result<Option<ChosenTrait>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {CHOSEN_COLS} FROM chosen_traits WHERE plan_id = ?1 AND kind = ?2"
                ),
                params![plan_id, kind.as_str()],
                chosen_from_row,
            )
            .optional()?)
    }

    /// The chosen trait of `kind` on the user's active plan, or a typed
    /// missing error naming what was asked for.
    pub fn require_chosen_trait(&self, user_id: &str, kind: TraitKind) -> Result<ChosenTrait> {
        let plan = self
            .active_plan(user_id)?
            .ok_or_else(|| AscentError::PlanNotFound(format!("no active plan for {user_id}")))?;
        self.chosen_trait(&plan.id, kind)?
            .ok_or_else(|| AscentError::ChosenTraitMissing {
                kind: kind.to_string(),
                plan_id: plan.id,
            })
    }

    /// Everything the cascade will touch, snapshotted by id.
    pub fn invalidation_context(
        &self,
        user_id: &str,
        plan_id: &str,
    ) -> Result<InvalidationContext> {
        let mut ctx = InvalidationContext {
            user_id: user_id.to_string(),
            plan_id: plan_id.to_string(),
            ..Default::default()
        };

        let mut stmt = self
            .conn
            .prepare("SELECT id FROM sprints WHERE plan_id = ?1 ORDER BY number")?;
        let rows = stmt.query_map([plan_id], |row| row.get::<_, String>(0))?;
        for r in rows {
            ctx.sprint_ids.push(r?);
        }

        for chosen in chosen_rows(&self.conn, plan_id)? {
            ctx.chosen.push((chosen.id, chosen.form_id));
        }

        // Practice-question and weekly progress forms, plus any form linked
        // from a sprint or a chosen practice. Collected as a set: the same
        // form is usually reachable from more than one place.
        let mut practice_forms: BTreeSet<String> = BTreeSet::new();
        let mut stmt = self.conn.prepare(
            "SELECT id FROM forms WHERE user_id = ?1
             AND (name LIKE 'PRACTICE_QUESTIONS_%' OR name LIKE '%\\_PROGRESS\\_%' ESCAPE '\\')",
        )?;
        let rows = stmt.query_map([user_id], |row| row.get::<_, String>(0))?;
        for r in rows {
            practice_forms.insert(r?);
        }
        let mut stmt = self.conn.prepare(
            "SELECT strength_practice_form_id, weakness_practice_form_id
             FROM sprints WHERE plan_id = ?1",
        )?;
        let rows = stmt.query_map([plan_id], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
            ))
        })?;
        for r in rows {
            let (a, b) = r?;
            practice_forms.extend(a);
            practice_forms.extend(b);
        }
        let mut stmt = self
            .conn
            .prepare("SELECT form_id FROM chosen_practices WHERE plan_id = ?1")?;
        let rows = stmt.query_map([plan_id], |row| row.get::<_, Option<String>>(0))?;
        for r in rows {
            practice_forms.extend(r?);
        }
        ctx.practice_form_ids = practice_forms.into_iter().collect();

        ctx.mind_body_form_id = find_form_tx(&self.conn, user_id, &FormName::MindBody)?
            .map(|f| f.id);

        ctx.category_id = self
            .conn
            .query_row(
                "SELECT id FROM personal_practice_categories WHERE plan_id = ?1",
                [plan_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(ctx)
    }

    /// Record the user's chosen strength and weakness for a plan.
    ///
    /// First selection creates the pair and its follow-up forms. An identical
    /// re-selection is a no-op. A changed selection runs the full cascade and
    /// rebuilds the pair, all in one transaction.
    pub fn select_traits(
        &self,
        user_id: &str,
        plan_id: &str,
        strength_name: &str,
        weakness_name: &str,
    ) -> Result<SelectionOutcome> {
        let plan = self.get_plan(plan_id)?;
        if plan.user_id != user_id {
            return Err(AscentError::PlanNotFound(plan_id.to_string()));
        }
        let strength_def = self.trait_def_by_name(user_id, strength_name)?;
        let weakness_def = self.trait_def_by_name(user_id, weakness_name)?;

        let before = chosen_rows(&self.conn, plan_id)?;
        if let (Some(s), Some(w)) = (
            before.iter().find(|c| c.kind == TraitKind::Strength),
            before.iter().find(|c| c.kind == TraitKind::Weakness),
        ) {
            if s.name == strength_name && w.name == weakness_name {
                return Ok(SelectionOutcome::Unchanged(ChosenPair {
                    strength: s.clone(),
                    weakness: w.clone(),
                }));
            }
        }
        let before_versions = fingerprint(&before);
        let next_version = before.iter().map(|c| c.version).max().unwrap_or(-1) + 1;
        let had_prior = !before.is_empty();

        let tx = self.conn.unchecked_transaction()?;

        // Optimistic concurrency: if another submission replaced the pair
        // between our read and this transaction, back off and let the caller
        // retry against the fresh state.
        if fingerprint(&chosen_rows(&tx, plan_id)?) != before_versions {
            return Err(AscentError::SelectionConflict(plan_id.to_string()));
        }

        if had_prior {
            let ctx = self.invalidation_context(user_id, plan_id)?;
            for step in invalidation_plan(&ctx) {
                apply_step(&tx, &step)?;
            }
        }

        let strength = insert_chosen(
            &tx,
            &plan,
            TraitKind::Strength,
            strength_name,
            &strength_def.id,
            strength_def.t_score,
            next_version,
        )?;
        let weakness = insert_chosen(
            &tx,
            &plan,
            TraitKind::Weakness,
            weakness_name,
            &weakness_def.id,
            weakness_def.t_score,
            next_version,
        )?;
        tx.execute(
            "UPDATE plans SET chosen_strength_id = ?1, chosen_weakness_id = ?2 WHERE id = ?3",
            params![strength.id, weakness.id, plan_id],
        )?;
        tx.commit()?;

        let pair = ChosenPair { strength, weakness };
        if had_prior {
            Ok(SelectionOutcome::Replaced(pair))
        } else {
            Ok(SelectionOutcome::Created(pair))
        }
    }
}

fn chosen_rows(conn: &Connection, plan_id: &str) -> Result<Vec<ChosenTrait>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHOSEN_COLS} FROM chosen_traits WHERE plan_id = ?1 ORDER BY kind"
    ))?;
    let rows = stmt.query_map([plan_id], chosen_from_row)?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

fn fingerprint(rows: &[ChosenTrait]) -> Vec<(String, i64)> {
    let mut f: Vec<(String, i64)> = rows.iter().map(|c| (c.id.clone(), c.version)).collect();
    f.sort();
    f
}

fn insert_chosen(
    conn: &Connection,
    plan: &DevelopmentPlan,
    kind: TraitKind,
    name: &str,
    trait_id: &str,
    t_score: Option<f64>,
    version: i64,
) -> Result<ChosenTrait> {
    // A prior plan may have left a form under the same generated name.
    if let Some(stale) = find_form_tx(conn, &plan.user_id, &FormName::TraitQuestions(kind))? {
        delete_form_tx(conn, &stale.id)?;
    }
    let form = create_form_tx(conn, &plan.user_id, &FormName::TraitQuestions(kind), Some(name))?;
    let chosen = ChosenTrait {
        id: Uuid::new_v4().to_string(),
        user_id: plan.user_id.clone(),
        plan_id: plan.id.clone(),
        kind,
        name: name.to_string(),
        trait_id: trait_id.to_string(),
        t_score,
        form_id: form.id,
        practice_id: None,
        start_date: plan.start_date,
        end_date: plan.end_date,
        version,
    };
    conn.execute(
        "INSERT INTO chosen_traits
         (id, user_id, plan_id, kind, name, trait_id, t_score, form_id,
          start_date, end_date, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            chosen.id,
            chosen.user_id,
            chosen.plan_id,
            chosen.kind.as_str(),
            chosen.name,
            chosen.trait_id,
            chosen.t_score,
            chosen.form_id,
            opt_ts(chosen.start_date),
            opt_ts(chosen.end_date),
            chosen.version
        ],
    )?;
    Ok(chosen)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practices::PracticeAnswer;
    use crate::scoring::InitialAnswer;
    use crate::types::Extent;

    fn scored_user(store: &Store) -> (String, String) {
        let user = store.register_user("a@example.com").unwrap();
        let names: Vec<&str> = crate::registry::seed_norms()
            .keys()
            .map(|s| s.as_str())
            .collect();
        let answers: Vec<InitialAnswer> = names
            .iter()
            .enumerate()
            .map(|(i, name)| InitialAnswer {
                question_id: format!("q{i}"),
                value: format!("v{i}"),
                trait_name: name.to_string(),
            })
            .collect();
        store.submit_initial_answers(&user.id, &answers).unwrap();
        let plan = store.get_or_create_plan(&user.id).unwrap();
        (user.id, plan.id)
    }

    fn extent_answers(form_questions: usize) -> Vec<PracticeAnswer> {
        (0..form_questions)
            .map(|i| PracticeAnswer {
                question_id: format!("fq{i}"),
                name: format!("practice {i}"),
                extent: Extent::SmallExtent,
                rank: i as i64 + 1,
            })
            .collect()
    }

    #[test]
    fn first_selection_creates_pair_and_forms() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, plan_id) = scored_user(&store);

        let outcome = store
            .select_traits(&user_id, &plan_id, "Communication", "Delegation")
            .unwrap();
        let pair = match &outcome {
            SelectionOutcome::Created(p) => p,
            other => panic!("expected Created, got {other:?}"),
        };
        assert_eq!(pair.strength.name, "Communication");
        assert_eq!(pair.weakness.name, "Delegation");
        assert_eq!(pair.strength.kind, TraitKind::Strength);
        // Dates copied from the plan.
        let plan = store.get_plan(&plan_id).unwrap();
        assert_eq!(pair.strength.start_date, plan.start_date);
        assert_eq!(pair.strength.end_date, plan.end_date);
        // Plan points at the new pair.
        assert_eq!(plan.chosen_strength_id.as_deref(), Some(pair.strength.id.as_str()));
        assert_eq!(plan.chosen_weakness_id.as_deref(), Some(pair.weakness.id.as_str()));
        // Both forms exist and carry bank questions.
        assert!(!store.form_questions(&pair.strength.form_id).unwrap().is_empty());
        assert!(!store.form_questions(&pair.weakness.form_id).unwrap().is_empty());
    }

    #[test]
    fn selection_without_bank_entry_gives_empty_form() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, plan_id) = scored_user(&store);
        // "Integrity" has no follow-up bank entry; accepted with zero questions.
        let outcome = store
            .select_traits(&user_id, &plan_id, "Integrity", "Delegation")
            .unwrap();
        let pair = outcome.pair();
        assert!(store.form_questions(&pair.strength.form_id).unwrap().is_empty());
    }

    #[test]
    fn identical_reselection_is_noop() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, plan_id) = scored_user(&store);
        let first = store
            .select_traits(&user_id, &plan_id, "Communication", "Delegation")
            .unwrap();
        let second = store
            .select_traits(&user_id, &plan_id, "Communication", "Delegation")
            .unwrap();
        match &second {
            SelectionOutcome::Unchanged(p) => {
                assert_eq!(p.strength.id, first.pair().strength.id);
                assert_eq!(p.strength.form_id, first.pair().strength.form_id);
            }
            other => panic!("expected Unchanged, got {other:?}"),
        }
    }

    #[test]
    fn unknown_trait_rejected() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, plan_id) = scored_user(&store);
        assert!(matches!(
            store.select_traits(&user_id, &plan_id, "Charisma", "Delegation"),
            Err(AscentError::UnknownTrait(_))
        ));
        // Nothing half-created.
        assert!(store.chosen_traits_for_plan(&plan_id).unwrap().is_empty());
    }

    #[test]
    fn invalidation_plan_ordering() {
        let ctx = InvalidationContext {
            user_id: "u".into(),
            plan_id: "p".into(),
            sprint_ids: vec!["s1".into()],
            chosen: vec![("c1".into(), "f1".into()), ("c2".into(), "f2".into())],
            practice_form_ids: vec!["pf1".into()],
            mind_body_form_id: Some("mb".into()),
            category_id: Some("cat".into()),
        };
        let steps = invalidation_plan(&ctx);
        let pos = |step: &InvalidationStep| steps.iter().position(|s| s == step).unwrap();

        let plan_ptr = pos(&InvalidationStep::ClearPlanPointers { plan_id: "p".into() });
        let sprint = pos(&InvalidationStep::ClearSprintFormLinks { sprint_id: "s1".into() });
        let practices = pos(&InvalidationStep::DeletePractices { chosen_trait_id: "c1".into() });
        let practice_form = pos(&InvalidationStep::DeleteForm { form_id: "pf1".into() });
        let chosen = pos(&InvalidationStep::DeleteChosenTrait { chosen_trait_id: "c1".into() });
        let trait_form = pos(&InvalidationStep::DeleteForm { form_id: "f1".into() });
        let category = pos(&InvalidationStep::DeletePersonalPracticeCategory {
            category_id: "cat".into(),
        });
        let mind_body = pos(&InvalidationStep::DeleteForm { form_id: "mb".into() });
        let pending = pos(&InvalidationStep::DeletePendingActions { user_id: "u".into() });

        assert!(plan_ptr < sprint);
        assert!(sprint < practices);
        assert!(practices < practice_form);
        assert!(practice_form < chosen);
        assert!(chosen < trait_form);
        assert!(trait_form < category);
        assert!(category < mind_body);
        assert!(mind_body < pending);
        assert_eq!(pending, steps.len() - 1);
    }

    #[test]
    fn changed_selection_cascades_everything() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, plan_id) = scored_user(&store);
        let first = store
            .select_traits(&user_id, &plan_id, "Communication", "Delegation")
            .unwrap();
        let old_strength = first.pair().strength.clone();
        let old_weakness = first.pair().weakness.clone();

        // Build the downstream world: practices, chosen practice + sprint
        // form links, personal practices, pending actions.
        store
            .submit_trait_answers(&user_id, TraitKind::Strength, &extent_answers(7))
            .unwrap();
        store
            .submit_trait_answers(&user_id, TraitKind::Weakness, &extent_answers(7))
            .unwrap();
        let practice = &store.practices_for(&old_strength.id).unwrap()[0];
        store
            .save_chosen_practice(&user_id, TraitKind::Strength, &practice.id)
            .unwrap();
        let category = store
            .create_personal_practice_category(&user_id, &plan_id, "Mind-Body Foundations")
            .unwrap();
        store
            .add_chosen_personal_practice(&user_id, &category.id, "Morning walk")
            .unwrap();
        store.create_form(&user_id, &FormName::MindBody, Some("MIND_BODY")).unwrap();
        store
            .insert_pending_actions(&user_id, "STRENGTH", &["Draft the plan".to_string()])
            .unwrap();

        // Change only the strength. The whole downstream world resets.
        let outcome = store
            .select_traits(&user_id, &plan_id, "Listening", "Delegation")
            .unwrap();
        let pair = match &outcome {
            SelectionOutcome::Replaced(p) => p,
            other => panic!("expected Replaced, got {other:?}"),
        };
        assert_eq!(pair.strength.name, "Listening");
        assert_eq!(pair.weakness.name, "Delegation");

        // No rows reference the old chosen traits.
        for old in [&old_strength, &old_weakness] {
            assert!(store.practices_for(&old.id).unwrap().is_empty());
            let n: i64 = store
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM chosen_practices WHERE chosen_trait_id = ?1",
                    [&old.id],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(n, 0);
            // Old follow-up forms are gone.
            assert!(store.get_form(&old.form_id).is_err());
        }
        // Sprint form links cleared.
        let sprint = store.latest_sprint(&plan_id).unwrap().unwrap();
        assert!(sprint.strength_practice_form_id.is_none());
        assert!(sprint.weakness_practice_form_id.is_none());
        // Personal practices, mind-body form, and pending actions cleared.
        assert!(store
            .personal_practice_category(&plan_id)
            .unwrap()
            .is_none());
        assert!(store.find_form(&user_id, &FormName::MindBody).unwrap().is_none());
        assert!(store.pending_actions(&user_id).unwrap().is_empty());
        // Exactly one chosen trait of each kind remains.
        let rows = store.chosen_traits_for_plan(&plan_id).unwrap();
        assert_eq!(rows.len(), 2);
        // Version advanced, so a stale writer would conflict.
        assert!(rows.iter().all(|c| c.version == 1));
    }

    #[test]
    fn reselection_after_cascade_keeps_single_pair() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, plan_id) = scored_user(&store);
        store
            .select_traits(&user_id, &plan_id, "Communication", "Delegation")
            .unwrap();
        store
            .select_traits(&user_id, &plan_id, "Listening", "Vision")
            .unwrap();
        store
            .select_traits(&user_id, &plan_id, "Empathy", "Vision")
            .unwrap();
        let rows = store.chosen_traits_for_plan(&plan_id).unwrap();
        assert_eq!(rows.len(), 2);
        let strength = rows.iter().find(|c| c.kind == TraitKind::Strength).unwrap();
        assert_eq!(strength.name, "Empathy");
    }
}
