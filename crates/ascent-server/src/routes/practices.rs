use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;

use ascent_core::types::TraitKind;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct ChosenPracticeBody {
    pub kind: TraitKind,
    pub practice_id: String,
}

/// POST /api/users/{user_id}/practices/chosen — commit to one practice for
/// the current sprint (upsert per sprint/trait).
pub async fn save_chosen_practice(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<ChosenPracticeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let chosen = store.save_chosen_practice(&user_id, body.kind, &body.practice_id)?;
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "message": "practice saved",
            "chosen_practice": chosen,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/users/{user_id}/practices/{kind}/progress-form — the weekly
/// progress-check form for the current sprint and week.
pub async fn get_progress_form(
    State(app): State<AppState>,
    Path((user_id, kind)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let kind: TraitKind = kind.parse::<TraitKind>()?;
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let form = store.progress_form(&user_id, kind, Utc::now())?;
        let questions = store.form_questions(&form.id)?;
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "form": form,
            "questions": questions,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(serde::Deserialize)]
pub struct PersonalCategoryBody {
    pub name: String,
    #[serde(default)]
    pub practices: Vec<String>,
}

/// POST /api/users/{user_id}/practices/personal — record the mind-body
/// practice category and chosen items for the active plan.
pub async fn save_personal_practices(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<PersonalCategoryBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let plan = store.get_or_create_plan(&user_id)?;
        if store
            .find_form(&user_id, &ascent_core::forms::FormName::MindBody)?
            .is_none()
        {
            store.create_form(&user_id, &ascent_core::forms::FormName::MindBody, Some("MIND_BODY"))?;
        }
        let category = store.create_personal_practice_category(&user_id, &plan.id, &body.name)?;
        for name in &body.practices {
            store.add_chosen_personal_practice(&user_id, &category.id, name)?;
        }
        let chosen = store.chosen_personal_practices(&category.id)?;
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "message": "personal practices saved",
            "category": category,
            "chosen": chosen,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
