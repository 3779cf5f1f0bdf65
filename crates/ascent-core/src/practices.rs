//! Practice recommendation from follow-up answers, plus the chosen-practice
//! and personal (mind-body) practice records.
//!
//! Recommendation prefers the lowest self-rated extents first: the gaps, not
//! the strengths, are the improvement targets. Within an extent bucket the
//! question rank decides.

use crate::error::{AscentError, Result};
use crate::forms::{create_form_tx, delete_form_tx, find_form_tx, progress_week, Form, FormName};
use crate::store::Store;
use crate::types::{Extent, TraitKind};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of practices a complete recommendation set carries.
pub const RECOMMENDED_SET: usize = 5;

/// Practices highlighted for the second sprint.
pub const SECOND_SPRINT_HIGHLIGHTS: usize = 2;

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeAnswer {
    pub question_id: String,
    /// The practice the question describes.
    pub name: String,
    pub extent: Extent,
    pub rank: i64,
}

/// Select up to five candidates, lowest extents first.
///
/// All NotAtAll + SmallExtent answers by ascending rank, topped up from
/// ModerateExtent, then from LargeExtent + FullestExtent combined.
pub fn recommend(answers: &[PracticeAnswer]) -> Vec<PracticeAnswer> {
    let mut low: Vec<&PracticeAnswer> = answers
        .iter()
        .filter(|a| a.extent <= Extent::SmallExtent)
        .collect();
    let mut mid: Vec<&PracticeAnswer> = answers
        .iter()
        .filter(|a| a.extent == Extent::ModerateExtent)
        .collect();
    let mut high: Vec<&PracticeAnswer> = answers
        .iter()
        .filter(|a| a.extent >= Extent::LargeExtent)
        .collect();
    low.sort_by_key(|a| a.rank);
    mid.sort_by_key(|a| a.rank);
    high.sort_by_key(|a| a.rank);

    low.into_iter()
        .chain(mid)
        .chain(high)
        .take(RECOMMENDED_SET)
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Practice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Practice {
    pub id: String,
    pub user_id: String,
    pub chosen_trait_id: String,
    pub name: String,
    pub extent: Extent,
    pub rank: i64,
    pub recommended: bool,
}

fn practice_from_row(row: &Row<'_>) -> rusqlite::Result<Practice> {
    Ok(Practice {
        id: row.get(0)?,
        user_id: row.get(1)?,
        chosen_trait_id: row.get(2)?,
        name: row.get(3)?,
        extent: Extent::from_ordinal(row.get::<_, i64>(4)? as u8).unwrap_or(Extent::NotAtAll),
        rank: row.get(5)?,
        recommended: row.get::<_, i64>(6)? != 0,
    })
}

const PRACTICE_COLS: &str = "id, user_id, chosen_trait_id, name, extent, rank, recommended";

// ---------------------------------------------------------------------------
// ChosenPractice / personal practices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChosenPractice {
    pub id: String,
    pub user_id: String,
    pub chosen_trait_id: String,
    pub name: String,
    pub practice_id: String,
    pub form_id: Option<String>,
    pub sprint_number: u32,
    pub sprint_id: String,
    pub plan_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalPracticeCategory {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChosenPersonalPractice {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Store {
    /// Record follow-up answers for the chosen trait of `kind` and rebuild
    /// its recommended practice set from them.
    pub fn submit_trait_answers(
        &self,
        user_id: &str,
        kind: TraitKind,
        answers: &[PracticeAnswer],
    ) -> Result<Vec<Practice>> {
        if answers.is_empty() {
            return Err(AscentError::InvalidAnswers("empty answer set".to_string()));
        }
        let chosen = self.require_chosen_trait(user_id, kind)?;
        let picks = recommend(answers);

        let tx = self.conn.unchecked_transaction()?;
        for answer in answers {
            self.upsert_answer(
                user_id,
                &chosen.form_id,
                &answer.question_id,
                answer.extent.as_str(),
            )?;
        }
        // Replace, never append: the previous set is cleared wholesale.
        tx.execute(
            "DELETE FROM practices WHERE chosen_trait_id = ?1",
            [&chosen.id],
        )?;
        let mut inserted = Vec::new();
        for pick in &picks {
            let practice = Practice {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                chosen_trait_id: chosen.id.clone(),
                name: pick.name.clone(),
                extent: pick.extent,
                rank: pick.rank,
                recommended: false,
            };
            tx.execute(
                "INSERT INTO practices (id, user_id, chosen_trait_id, name, extent, rank, recommended)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                params![
                    practice.id,
                    practice.user_id,
                    practice.chosen_trait_id,
                    practice.name,
                    practice.extent.ordinal(),
                    practice.rank
                ],
            )?;
            inserted.push(practice);
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn practices_for(&self, chosen_trait_id: &str) -> Result<Vec<Practice>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PRACTICE_COLS} FROM practices WHERE chosen_trait_id = ?1
             ORDER BY extent, rank"
        ))?;
        let rows = stmt.query_map([chosen_trait_id], practice_from_row)?;
        let mut practices = Vec::new();
        for p in rows {
            practices.push(p?);
        }
        Ok(practices)
    }

    /// Ensure exactly two practices are highlighted for the second sprint.
    /// Picks uniformly at random among unmarked ones when fewer than two are
    /// marked; a no-op once two are.
    pub fn highlight_for_second_sprint(&self, chosen_trait_id: &str) -> Result<Vec<Practice>> {
        let practices = self.practices_for(chosen_trait_id)?;
        let marked = practices.iter().filter(|p| p.recommended).count();
        if marked < SECOND_SPRINT_HIGHLIGHTS {
            let unmarked: Vec<&Practice> =
                practices.iter().filter(|p| !p.recommended).collect();
            let need = SECOND_SPRINT_HIGHLIGHTS - marked;
            let mut rng = rand::thread_rng();
            for pick in unmarked.choose_multiple(&mut rng, need) {
                self.conn.execute(
                    "UPDATE practices SET recommended = 1 WHERE id = ?1",
                    [&pick.id],
                )?;
            }
        }
        self.practices_for(chosen_trait_id)
    }

    /// Commit to one practice for the current sprint. Re-saving for the same
    /// sprint updates the existing row. Also (re)creates the practice
    /// progress form for this kind and links it on the sprint.
    pub fn save_chosen_practice(
        &self,
        user_id: &str,
        kind: TraitKind,
        practice_id: &str,
    ) -> Result<ChosenPractice> {
        let chosen = self.require_chosen_trait(user_id, kind)?;
        let practice = self
            .practices_for(&chosen.id)?
            .into_iter()
            .find(|p| p.id == practice_id)
            .ok_or_else(|| {
                AscentError::InvalidAnswers(format!(
                    "practice {practice_id} does not belong to the chosen {kind} trait"
                ))
            })?;
        let sprint = self.current_sprint(&chosen.plan_id)?;

        let tx = self.conn.unchecked_transaction()?;
        let form_name = FormName::PracticeQuestions(kind);
        if let Some(old) = find_form_tx(&tx, user_id, &form_name)? {
            delete_form_tx(&tx, &old.id)?;
        }
        let form = create_form_tx(&tx, user_id, &form_name, Some(&chosen.name))?;

        let record = ChosenPractice {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            chosen_trait_id: chosen.id.clone(),
            name: practice.name.clone(),
            practice_id: practice.id.clone(),
            form_id: Some(form.id.clone()),
            sprint_number: sprint.number,
            sprint_id: sprint.id.clone(),
            plan_id: chosen.plan_id.clone(),
        };
        tx.execute(
            "INSERT INTO chosen_practices
             (id, user_id, chosen_trait_id, name, practice_id, form_id,
              sprint_number, sprint_id, plan_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(user_id, chosen_trait_id, sprint_number) DO UPDATE SET
                name = excluded.name,
                practice_id = excluded.practice_id,
                form_id = excluded.form_id,
                sprint_id = excluded.sprint_id,
                plan_id = excluded.plan_id",
            params![
                record.id,
                record.user_id,
                record.chosen_trait_id,
                record.name,
                record.practice_id,
                record.form_id,
                record.sprint_number,
                record.sprint_id,
                record.plan_id
            ],
        )?;
        tx.execute(
            "UPDATE chosen_traits SET practice_id = ?1 WHERE id = ?2",
            params![record.practice_id, record.chosen_trait_id],
        )?;
        let column = match kind {
            TraitKind::Strength => "strength_practice_form_id",
            TraitKind::Weakness => "weakness_practice_form_id",
        };
        tx.execute(
            &format!("UPDATE sprints SET {column} = ?1 WHERE id = ?2"),
            params![form.id, sprint.id],
        )?;
        tx.commit()?;

        self.chosen_practice(&chosen.id, sprint.number)?
            .ok_or_else(|| AscentError::InvalidAnswers("chosen practice vanished".to_string()))
    }

    pub fn chosen_practice(
        &self,
        chosen_trait_id: &str,
        sprint_number: u32,
    ) -> Result<Option<ChosenPractice>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, user_id, chosen_trait_id, name, practice_id, form_id,
                        sprint_number, sprint_id, plan_id
                 FROM chosen_practices
                 WHERE chosen_trait_id = ?1 AND sprint_number = ?2",
                params![chosen_trait_id, sprint_number],
                |row| {
                    Ok(ChosenPractice {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        chosen_trait_id: row.get(2)?,
                        name: row.get(3)?,
                        practice_id: row.get(4)?,
                        form_id: row.get(5)?,
                        sprint_number: row.get::<_, i64>(6)? as u32,
                        sprint_id: row.get(7)?,
                        plan_id: row.get(8)?,
                    })
                },
            )
            .optional()?)
    }

    /// The weekly progress-check form for the chosen trait of `kind`, named
    /// for the current sprint and week.
    pub fn progress_form(
        &self,
        user_id: &str,
        kind: TraitKind,
        today: DateTime<Utc>,
    ) -> Result<Form> {
        let chosen = self.require_chosen_trait(user_id, kind)?;
        let sprint = self.current_sprint(&chosen.plan_id)?;
        let week = progress_week(today, sprint.start_date.unwrap_or(today));
        self.get_or_create_form(
            user_id,
            &FormName::Progress {
                sprint_number: sprint.number,
                kind,
                week,
            },
        )
    }

    // -----------------------------------------------------------------------
    // Personal (mind-body) practices
    // -----------------------------------------------------------------------

    pub fn create_personal_practice_category(
        &self,
        user_id: &str,
        plan_id: &str,
        name: &str,
    ) -> Result<PersonalPracticeCategory> {
        if let Some(mut existing) = self.personal_practice_category(plan_id)? {
            self.conn.execute(
                "UPDATE personal_practice_categories SET name = ?1 WHERE id = ?2",
                params![name, existing.id],
            )?;
            existing.name = name.to_string();
            return Ok(existing);
        }
        let category = PersonalPracticeCategory {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            plan_id: plan_id.to_string(),
            name: name.to_string(),
        };
        self.conn.execute(
            "INSERT INTO personal_practice_categories (id, user_id, plan_id, name)
             VALUES (?1, ?2, ?3, ?4)",
            params![category.id, category.user_id, category.plan_id, category.name],
        )?;
        Ok(category)
    }

    pub fn personal_practice_category(
        &self,
        plan_id: &str,
    ) -> Result<Option<PersonalPracticeCategory>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, user_id, plan_id, name FROM personal_practice_categories
                 WHERE plan_id = ?1",
                [plan_id],
                |row| {
                    Ok(PersonalPracticeCategory {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        plan_id: row.get(2)?,
                        name: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn add_chosen_personal_practice(
        &self,
        user_id: &str,
        category_id: &str,
        name: &str,
    ) -> Result<ChosenPersonalPractice> {
        let practice = ChosenPersonalPractice {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            category_id: category_id.to_string(),
            name: name.to_string(),
        };
        self.conn.execute(
            "INSERT INTO chosen_personal_practices (id, user_id, category_id, name)
             VALUES (?1, ?2, ?3, ?4)",
            params![practice.id, practice.user_id, practice.category_id, practice.name],
        )?;
        Ok(practice)
    }

    pub fn chosen_personal_practices(
        &self,
        category_id: &str,
    ) -> Result<Vec<ChosenPersonalPractice>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, category_id, name FROM chosen_personal_practices
             WHERE category_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map([category_id], |row| {
            Ok(ChosenPersonalPractice {
                id: row.get(0)?,
                user_id: row.get(1)?,
                category_id: row.get(2)?,
                name: row.get(3)?,
            })
        })?;
        let mut practices = Vec::new();
        for p in rows {
            practices.push(p?);
        }
        Ok(practices)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::InitialAnswer;

    fn ans(q: &str, extent: Extent, rank: i64) -> PracticeAnswer {
        PracticeAnswer {
            question_id: q.to_string(),
            name: format!("practice {q}"),
            extent,
            rank,
        }
    }

    fn selected_user(store: &Store) -> (String, String, crate::selection::ChosenPair) {
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
        let outcome = store
            .select_traits(&user.id, &plan.id, "Communication", "Delegation")
            .unwrap();
        (user.id, plan.id, outcome.pair().clone())
    }

    #[test]
    fn recommend_prefers_lowest_extent_then_rank() {
        // The documented ordering property: Q2 then Q1 before Q3 is ever
        // considered, then fill from the top bucket.
        let mut answers = vec![
            ans("Q1", Extent::NotAtAll, 3),
            ans("Q2", Extent::SmallExtent, 1),
            ans("Q3", Extent::ModerateExtent, 2),
        ];
        for (i, q) in ["Q4", "Q5", "Q6", "Q7", "Q8", "Q9", "Q10"].iter().enumerate() {
            answers.push(ans(q, Extent::FullestExtent, i as i64 + 4));
        }
        let picks = recommend(&answers);
        let ids: Vec<&str> = picks.iter().map(|p| p.question_id.as_str()).collect();
        assert_eq!(ids, vec!["Q2", "Q1", "Q3", "Q4", "Q5"]);
    }

    #[test]
    fn recommend_caps_at_five_low_answers() {
        let answers: Vec<PracticeAnswer> = (1..=8)
            .map(|i| ans(&format!("Q{i}"), Extent::NotAtAll, 9 - i as i64))
            .collect();
        let picks = recommend(&answers);
        assert_eq!(picks.len(), 5);
        // Ascending rank within the bucket.
        assert!(picks.windows(2).all(|w| w[0].rank <= w[1].rank));
        assert_eq!(picks[0].rank, 1);
    }

    #[test]
    fn recommend_returns_short_set_when_answers_are_scarce() {
        let answers = vec![
            ans("Q1", Extent::LargeExtent, 2),
            ans("Q2", Extent::FullestExtent, 1),
        ];
        let picks = recommend(&answers);
        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].question_id, "Q2");
    }

    #[test]
    fn submitting_answers_replaces_practice_set() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, _, pair) = selected_user(&store);
        let first: Vec<PracticeAnswer> = (1..=7)
            .map(|i| ans(&format!("Q{i}"), Extent::SmallExtent, i as i64))
            .collect();
        let practices = store
            .submit_trait_answers(&user_id, TraitKind::Strength, &first)
            .unwrap();
        assert_eq!(practices.len(), 5);

        // Resubmission replaces, never appends.
        let second: Vec<PracticeAnswer> = (1..=6)
            .map(|i| ans(&format!("R{i}"), Extent::ModerateExtent, i as i64))
            .collect();
        store
            .submit_trait_answers(&user_id, TraitKind::Strength, &second)
            .unwrap();
        let stored = store.practices_for(&pair.strength.id).unwrap();
        assert_eq!(stored.len(), 5);
        assert!(stored.iter().all(|p| p.name.starts_with("practice R")));
    }

    #[test]
    fn trait_answers_require_a_chosen_trait() {
        let store = Store::open_in_memory().unwrap();
        let user = store.register_user("b@example.com").unwrap();
        store.get_or_create_plan(&user.id).unwrap();
        let answers = vec![ans("Q1", Extent::NotAtAll, 1)];
        assert!(matches!(
            store.submit_trait_answers(&user.id, TraitKind::Strength, &answers),
            Err(AscentError::ChosenTraitMissing { .. })
        ));
    }

    #[test]
    fn second_sprint_highlight_marks_exactly_two() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, _, pair) = selected_user(&store);
        let answers: Vec<PracticeAnswer> = (1..=7)
            .map(|i| ans(&format!("Q{i}"), Extent::SmallExtent, i as i64))
            .collect();
        store
            .submit_trait_answers(&user_id, TraitKind::Strength, &answers)
            .unwrap();

        let highlighted = store
            .highlight_for_second_sprint(&pair.strength.id)
            .unwrap();
        assert_eq!(highlighted.iter().filter(|p| p.recommended).count(), 2);

        // Idempotent: the same two stay marked.
        let first_marks: Vec<String> = highlighted
            .iter()
            .filter(|p| p.recommended)
            .map(|p| p.id.clone())
            .collect();
        let again = store
            .highlight_for_second_sprint(&pair.strength.id)
            .unwrap();
        let second_marks: Vec<String> = again
            .iter()
            .filter(|p| p.recommended)
            .map(|p| p.id.clone())
            .collect();
        assert_eq!(first_marks, second_marks);
    }

    #[test]
    fn chosen_practice_upserts_per_sprint() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, _, pair) = selected_user(&store);
        let answers: Vec<PracticeAnswer> = (1..=7)
            .map(|i| ans(&format!("Q{i}"), Extent::SmallExtent, i as i64))
            .collect();
        let practices = store
            .submit_trait_answers(&user_id, TraitKind::Strength, &answers)
            .unwrap();

        let first = store
            .save_chosen_practice(&user_id, TraitKind::Strength, &practices[0].id)
            .unwrap();
        assert_eq!(first.sprint_number, 1);

        // Saving a different practice for the same sprint updates in place.
        let second = store
            .save_chosen_practice(&user_id, TraitKind::Strength, &practices[1].id)
            .unwrap();
        assert_eq!(second.practice_id, practices[1].id);
        let n: i64 = store
            .conn
            .query_row(
                "SELECT COUNT(*) FROM chosen_practices WHERE chosen_trait_id = ?1",
                [&pair.strength.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 1);

        // The sprint carries the practice form link for this kind.
        let sprint = store.latest_sprint(&pair.strength.plan_id).unwrap().unwrap();
        assert_eq!(sprint.strength_practice_form_id, second.form_id);
        // And the chosen trait points at the committed practice.
        let chosen = store
            .require_chosen_trait(&user_id, TraitKind::Strength)
            .unwrap();
        assert_eq!(chosen.practice_id.as_deref(), Some(practices[1].id.as_str()));
    }

    #[test]
    fn chosen_practice_rejects_foreign_practice() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, _, _) = selected_user(&store);
        assert!(matches!(
            store.save_chosen_practice(&user_id, TraitKind::Strength, "nope"),
            Err(AscentError::InvalidAnswers(_))
        ));
    }

    #[test]
    fn progress_form_named_for_sprint_and_week() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, _, _) = selected_user(&store);
        let form = store
            .progress_form(&user_id, TraitKind::Weakness, Utc::now())
            .unwrap();
        assert_eq!(form.name, "1_PROGRESS_WEAKNESS_WEEK_1");
        // Stable within the same week.
        let again = store
            .progress_form(&user_id, TraitKind::Weakness, Utc::now())
            .unwrap();
        assert_eq!(form.id, again.id);
    }

    #[test]
    fn personal_practice_category_is_one_per_plan() {
        let store = Store::open_in_memory().unwrap();
        let (user_id, plan_id, _) = selected_user(&store);
        let a = store
            .create_personal_practice_category(&user_id, &plan_id, "Mind-Body Foundations")
            .unwrap();
        let b = store
            .create_personal_practice_category(&user_id, &plan_id, "Recovery Basics")
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.name, "Recovery Basics");

        store
            .add_chosen_personal_practice(&user_id, &a.id, "Morning walk")
            .unwrap();
        store
            .add_chosen_personal_practice(&user_id, &a.id, "Breathing break")
            .unwrap();
        assert_eq!(store.chosen_personal_practices(&a.id).unwrap().len(), 2);
    }
}
