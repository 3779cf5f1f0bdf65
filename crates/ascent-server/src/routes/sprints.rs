use axum::extract::{Path, State};
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/users/{user_id}/plan — the active development plan
/// (get-or-create).
pub async fn get_plan(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let plan = store.get_or_create_plan(&user_id)?;
        Ok::<_, ascent_core::AscentError>(serde_json::json!(plan))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/users/{user_id}/sprints/current — the sprint the user is in.
/// Lazily opens sprint 1, or sprint N+1 once N is finished.
pub async fn get_current_sprint(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let plan = store.get_or_create_plan(&user_id)?;
        let sprint = store.current_sprint(&plan.id)?;
        Ok::<_, ascent_core::AscentError>(serde_json::json!(sprint))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/users/{user_id}/sprints/{number}/finish — explicitly finish a
/// sprint; finishing the last one finishes the plan.
pub async fn finish_sprint(
    State(app): State<AppState>,
    Path((user_id, number)): Path<(String, u32)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let plan = store
            .active_plan(&user_id)?
            .ok_or_else(|| ascent_core::AscentError::PlanNotFound(format!(
                "no active plan for {user_id}"
            )))?;
        let sprint = store.finish_sprint(&plan.id, number)?;
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "message": format!("sprint {number} finished"),
            "sprint": sprint,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
