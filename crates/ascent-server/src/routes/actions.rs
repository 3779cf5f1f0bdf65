use axum::extract::{Path, State};
use axum::Json;

use ascent_core::planner::{PlanContext, PlannerClient};
use ascent_core::types::TraitKind;
use ascent_core::AscentError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct GenerateBody {
    pub kind: TraitKind,
    pub company: String,
    pub industry: String,
    pub role: String,
    #[serde(default)]
    pub context: Option<String>,
}

/// POST /api/users/{user_id}/actions/generate — ask the action-plan service
/// to draft actions for the committed practice; store them as pending.
pub async fn generate_actions(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Some(planner_url) = app.config.planner_url.clone() else {
        return Err(AppError(
            AscentError::Planner("no planner_url configured".to_string()).into(),
        ));
    };
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let chosen = store.require_chosen_trait(&user_id, body.kind)?;
        let practice_id = chosen.practice_id.clone().ok_or_else(|| {
            AscentError::InvalidAnswers(format!(
                "no practice chosen for the {} trait yet",
                body.kind
            ))
        })?;
        let practice = store
            .practices_for(&chosen.id)?
            .into_iter()
            .find(|p| p.id == practice_id)
            .map(|p| p.name)
            .unwrap_or_default();
        let five_traits = store
            .top_bottom_five(&user_id)?
            .strengths
            .into_iter()
            .map(|r| r.name)
            .collect();

        let client = PlannerClient::new(planner_url);
        let actions = client.generate(&PlanContext {
            trait_name: chosen.name.clone(),
            practice,
            five_traits,
            company: body.company,
            industry: body.industry,
            role: body.role,
            context: body.context,
        })?;
        let pending =
            store.insert_pending_actions(&user_id, body.kind.form_tag(), &actions)?;
        Ok::<_, AscentError>(serde_json::json!({
            "message": "actions drafted",
            "pending": pending,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/users/{user_id}/actions/pending — drafts awaiting confirmation.
pub async fn list_pending(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let pending = store.pending_actions(&user_id)?;
        Ok::<_, AscentError>(serde_json::json!(pending))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/users/{user_id}/actions/{id}/confirm — commit one draft.
pub async fn confirm_action(
    State(app): State<AppState>,
    Path((user_id, action_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let confirmed = store.confirm_pending_action(&user_id, &action_id)?;
        Ok::<_, AscentError>(serde_json::json!({
            "message": "action confirmed",
            "action": confirmed,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
