use axum::extract::{Path, State};
use axum::Json;

use ascent_core::practices::PracticeAnswer;
use ascent_core::scheduler;
use ascent_core::scoring::{due_for_stats_refresh, InitialAnswer, ScoringOutcome};
use ascent_core::selection::SelectionOutcome;
use ascent_core::types::TraitKind;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct InitialAnswersBody {
    pub answers: Vec<InitialAnswer>,
}

/// POST /api/users/{user_id}/initial-answers — score the initial
/// questionnaire. An identical resubmission reports `unchanged` and touches
/// nothing.
pub async fn save_initial_answers(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<InitialAnswersBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let refresh_every = app.config.stats.refresh_every;
    let nudges = app.nudges.clone();
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let outcome = store.submit_initial_answers(&user_id, &body.answers)?;
        if let ScoringOutcome::Scored { submission_count } = outcome {
            if due_for_stats_refresh(submission_count, refresh_every) {
                // Out-of-band: the poll loop picks this up; a scheduling
                // failure must not fail the submission itself.
                if let Err(e) = scheduler::schedule_stats_refresh(&nudges, &user_id) {
                    tracing::warn!("failed to schedule norms refresh: {e}");
                }
            }
        }
        let message = match outcome {
            ScoringOutcome::Unchanged => "answers unchanged; scores left as-is",
            ScoringOutcome::Scored { .. } => "answers scored",
        };
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "message": message,
            "outcome": outcome,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/users/{user_id}/traits/top-bottom — candidate strengths and
/// weaknesses by T-score.
pub async fn get_top_bottom(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        store.get_user(&user_id)?;
        let tb = store.top_bottom_five(&user_id)?;
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "strengths": tb.strengths,
            "weaknesses": tb.weaknesses,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(serde::Deserialize)]
pub struct SelectionBody {
    pub strength: String,
    pub weakness: String,
}

/// POST /api/users/{user_id}/traits/selection — commit to a strength and a
/// weakness for the active plan. A changed pair cascades.
pub async fn save_selection(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<SelectionBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let plan = store.get_or_create_plan(&user_id)?;
        let outcome = store.select_traits(&user_id, &plan.id, &body.strength, &body.weakness)?;
        let message = match &outcome {
            SelectionOutcome::Created(_) => "strength and weakness recorded",
            SelectionOutcome::Unchanged(_) => "selection unchanged",
            SelectionOutcome::Replaced(_) => "selection replaced; prior program state cleared",
        };
        let pair = outcome.pair();
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "message": message,
            "plan_id": plan.id,
            "strength": pair.strength,
            "weakness": pair.weakness,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(serde::Deserialize)]
pub struct TraitAnswersBody {
    pub answers: Vec<PracticeAnswer>,
}

/// POST /api/users/{user_id}/traits/{kind}/answers — follow-up answers for
/// the chosen trait; rebuilds its recommended practices.
pub async fn save_trait_answers(
    State(app): State<AppState>,
    Path((user_id, kind)): Path<(String, String)>,
    Json(body): Json<TraitAnswersBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let kind: TraitKind = kind.parse::<TraitKind>()?;
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let practices = store.submit_trait_answers(&user_id, kind, &body.answers)?;
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "message": "practices recommended",
            "practices": practices,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/users/{user_id}/traits/{kind}/practices — the recommended set.
/// During sprint 2 this also ensures two practices carry the highlight.
pub async fn get_trait_practices(
    State(app): State<AppState>,
    Path((user_id, kind)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let kind: TraitKind = kind.parse::<TraitKind>()?;
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let chosen = store.require_chosen_trait(&user_id, kind)?;
        let sprint = store.current_sprint(&chosen.plan_id)?;
        let practices = if sprint.number >= 2 {
            store.highlight_for_second_sprint(&chosen.id)?
        } else {
            store.practices_for(&chosen.id)?
        };
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "trait": chosen.name,
            "sprint_number": sprint.number,
            "practices": practices,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
