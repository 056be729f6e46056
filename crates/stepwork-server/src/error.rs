use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use stepwork_core::error::StepworkError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit status codes
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 400 for request-shape problems that never reach
/// the core crate (missing fields, unparseable ids).
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

/// The caller is authenticated but the resource belongs to someone else.
#[derive(Debug)]
struct ForbiddenError(String);

impl std::fmt::Display for ForbiddenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ForbiddenError {}

#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self(ForbiddenError(msg.into()).into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }

    /// Wrap a `spawn_blocking` join failure.
    pub fn join(err: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {err}"))
    }

    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<BadRequestError>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if self.0.downcast_ref::<ForbiddenError>().is_some() {
            return StatusCode::FORBIDDEN;
        }
        if self.0.downcast_ref::<NotFoundError>().is_some() {
            return StatusCode::NOT_FOUND;
        }

        match self.0.downcast_ref::<StepworkError>() {
            Some(e) => match e {
                StepworkError::InvalidStep(_) | StepworkError::EmptyAnswer => {
                    StatusCode::BAD_REQUEST
                }
                StepworkError::SessionNotFound(_) | StepworkError::QuestionNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                StepworkError::StepAlreadyComplete | StepworkError::VersionConflict { .. } => {
                    StatusCode::CONFLICT
                }
                StepworkError::HistoryMismatch { .. }
                | StepworkError::EmptyStep(_)
                | StepworkError::ScriptInvalid(_)
                | StepworkError::InvalidPattern { .. }
                | StepworkError::Io(_)
                | StepworkError::Yaml(_)
                | StepworkError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
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
    use stepwork_core::types::Step;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn invalid_step_maps_to_400() {
        assert_eq!(
            status_of(StepworkError::InvalidStep("step9".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn empty_answer_maps_to_400() {
        assert_eq!(
            status_of(StepworkError::EmptyAnswer.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn session_not_found_maps_to_404() {
        assert_eq!(
            status_of(StepworkError::SessionNotFound("abc".into()).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn completed_step_maps_to_409() {
        assert_eq!(
            status_of(StepworkError::StepAlreadyComplete.into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn version_conflict_maps_to_409() {
        let err = StepworkError::VersionConflict {
            id: "s".into(),
            expected: 1,
            found: 2,
        };
        assert_eq!(status_of(err.into()), StatusCode::CONFLICT);
    }

    #[test]
    fn history_mismatch_maps_to_500() {
        let err = StepworkError::HistoryMismatch {
            turn: 0,
            expected: "a".into(),
            found: "b".into(),
        };
        assert_eq!(status_of(err.into()), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn empty_step_maps_to_500() {
        assert_eq!(
            status_of(StepworkError::EmptyStep(Step::Two).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn sentinels_map_to_their_status() {
        assert_eq!(status_of(AppError::bad_request("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::forbidden("x")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::not_found("x")), StatusCode::NOT_FOUND);
    }

    #[test]
    fn foreign_error_maps_to_500() {
        assert_eq!(
            status_of(AppError(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError::forbidden("not yours").into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
