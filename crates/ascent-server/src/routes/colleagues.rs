use axum::extract::{Path, State};
use axum::Json;

use ascent_core::scheduler;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct ColleagueBody {
    pub email: String,
}

/// POST /api/users/{user_id}/colleagues — enroll a colleague for feedback:
/// an invite at program start and the final survey near program end.
pub async fn enroll_colleague(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<ColleagueBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let nudges = app.nudges.clone();
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let plan = store.get_or_create_plan(&user_id)?;
        let (invite, survey) = scheduler::schedule_colleague(&nudges, &user_id, &body.email, &plan)?;
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "message": "colleague enrolled",
            "invite_due": invite.due_at,
            "survey_due": survey.due_at,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/users/{user_id}/nudges — scheduled nudges for the user, newest
/// first. Empty on a fresh account.
pub async fn list_nudges(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let nudges = app.nudges.clone();
    let result = tokio::task::spawn_blocking(move || {
        let all = nudges.list_all()?;
        let mine: Vec<_> = all.into_iter().filter(|n| n.user_id == user_id).collect();
        Ok::<_, ascent_core::AscentError>(serde_json::json!(mine))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
