use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct RegisterBody {
    pub email: String,
}

/// POST /api/users — register a user and seed their trait registry.
pub async fn register_user(
    State(app): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let store = app.open_store()?;
        let user = store.register_user(&body.email)?;
        Ok::<_, ascent_core::AscentError>(serde_json::json!({
            "message": "user registered",
            "id": user.id,
            "email": user.email,
            "created_at": user.created_at,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
