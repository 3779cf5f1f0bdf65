use ascent_core::AscentError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Wraps `anyhow::Error` and downcasts
/// to `AscentError` for the status-code mapping; everything else is a 500.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(AscentError::InvalidAnswers(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if let Some(e) = self.0.downcast_ref::<AscentError>() {
            match e {
                AscentError::UserNotFound(_)
                | AscentError::PlanNotFound(_)
                | AscentError::ChosenTraitMissing { .. }
                | AscentError::SprintNotFound(_)
                | AscentError::FormNotFound(_)
                | AscentError::PendingActionNotFound(_) => StatusCode::NOT_FOUND,
                AscentError::UserExists(_) | AscentError::SelectionConflict(_) => {
                    StatusCode::CONFLICT
                }
                AscentError::UnknownTrait(_)
                | AscentError::InvalidAnswers(_)
                | AscentError::UnknownExtent(_)
                | AscentError::InvalidTraitKind(_)
                | AscentError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AscentError::SprintAlreadyFinished(_) | AscentError::PlanDatesMissing(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                AscentError::Planner(_) => StatusCode::BAD_GATEWAY,
                AscentError::NudgeDb(_)
                | AscentError::Db(_)
                | AscentError::Io(_)
                | AscentError::Yaml(_)
                | AscentError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "detail": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_not_found_maps_to_404() {
        let err = AppError(AscentError::UserNotFound("u1".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn chosen_trait_missing_maps_to_404() {
        let err = AppError(
            AscentError::ChosenTraitMissing {
                kind: "strength".into(),
                plan_id: "p1".into(),
            }
            .into(),
        );
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn user_exists_maps_to_409() {
        let err = AppError(AscentError::UserExists("a@example.com".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn selection_conflict_maps_to_409() {
        let err = AppError(AscentError::SelectionConflict("p1".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unknown_trait_maps_to_400() {
        let err = AppError(AscentError::UnknownTrait("Charisma".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_email_maps_to_400() {
        let err = AppError(AscentError::InvalidEmail("nope".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn sprint_already_finished_maps_to_422() {
        let err = AppError(AscentError::SprintAlreadyFinished(1).into());
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn planner_error_maps_to_502() {
        let err = AppError(AscentError::Planner("boom".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn io_error_maps_to_500() {
        let io_err = std::io::Error::other("disk full");
        let err = AppError(AscentError::Io(io_err).into());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn non_ascent_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_body_carries_detail_field() {
        let err = AppError(AscentError::UserNotFound("u1".into()).into());
        let response = err.into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
