pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod worker;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ascent_core::config::Config;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Users
        .route("/api/users", post(routes::users::register_user))
        // Scoring + ranking
        .route(
            "/api/users/{user_id}/initial-answers",
            post(routes::traits::save_initial_answers),
        )
        .route(
            "/api/users/{user_id}/traits/top-bottom",
            get(routes::traits::get_top_bottom),
        )
        // Trait selection + follow-ups
        .route(
            "/api/users/{user_id}/traits/selection",
            post(routes::traits::save_selection),
        )
        .route(
            "/api/users/{user_id}/traits/{kind}/answers",
            post(routes::traits::save_trait_answers),
        )
        .route(
            "/api/users/{user_id}/traits/{kind}/practices",
            get(routes::traits::get_trait_practices),
        )
        // Practices
        .route(
            "/api/users/{user_id}/practices/chosen",
            post(routes::practices::save_chosen_practice),
        )
        .route(
            "/api/users/{user_id}/practices/{kind}/progress-form",
            get(routes::practices::get_progress_form),
        )
        .route(
            "/api/users/{user_id}/practices/personal",
            post(routes::practices::save_personal_practices),
        )
        // Plan + sprints
        .route("/api/users/{user_id}/plan", get(routes::sprints::get_plan))
        .route(
            "/api/users/{user_id}/sprints/current",
            get(routes::sprints::get_current_sprint),
        )
        .route(
            "/api/users/{user_id}/sprints/{number}/finish",
            post(routes::sprints::finish_sprint),
        )
        // Colleague feedback
        .route(
            "/api/users/{user_id}/colleagues",
            post(routes::colleagues::enroll_colleague),
        )
        .route(
            "/api/users/{user_id}/nudges",
            get(routes::colleagues::list_nudges),
        )
        // Action plans
        .route(
            "/api/users/{user_id}/actions/generate",
            post(routes::actions::generate_actions),
        )
        .route(
            "/api/users/{user_id}/actions/pending",
            get(routes::actions::list_pending),
        )
        .route(
            "/api/users/{user_id}/actions/{id}/confirm",
            post(routes::actions::confirm_action),
        )
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the API server and the nudge poll loop.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let port = config.port;
    let app_state = state::AppState::new(config)?;

    worker::spawn(app_state.clone(), Arc::new(worker::LogMailer));

    let app = build_router(app_state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("ascent API listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
