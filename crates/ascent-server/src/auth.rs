use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Gate requests behind the shared API token and pin user-scoped routes to
/// the caller's own user id.
///
/// Flow (evaluated in order):
/// 1. no `api_token` configured → passthrough (local development)
/// 2. `x-api-token` header missing or wrong → 401
/// 3. path carries a `/api/users/{user_id}/…` segment and `x-user-id` is
///    missing or different → 403 (a valid token never grants access to
///    another user's state)
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(ref token) = state.config.api_token else {
        return next.run(req).await;
    };

    let presented = req
        .headers()
        .get("x-api-token")
        .and_then(|v| v.to_str().ok());
    if presented != Some(token.as_str()) {
        return unauthorized(401, "unauthorized");
    }

    if let Some(path_user) = path_user_id(req.uri().path()) {
        let header_user = req.headers().get("x-user-id").and_then(|v| v.to_str().ok());
        if header_user != Some(path_user) {
            return unauthorized(403, "user id does not match credentials");
        }
    }

    next.run(req).await
}

fn unauthorized(status: u16, detail: &str) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(format!(r#"{{"detail":"{detail}"}}"#)))
        .expect("infallible: all header values are valid ASCII")
}

/// Extract the `{user_id}` segment from `/api/users/{user_id}/…` paths.
fn path_user_id(path: &str) -> Option<&str> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some("api"), Some("users"), Some(user_id)) if !user_id.is_empty() => Some(user_id),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
