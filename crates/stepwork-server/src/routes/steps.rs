use axum::extract::{Path, State};
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/steps/{step}/questions — active scripted questions in order.
pub async fn list_step_questions(
    State(app): State<AppState>,
    Path(step): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let step: stepwork_core::types::Step = step.parse()?;
    let questions: Vec<_> = app
        .script
        .questions_for_step(step)
        .into_iter()
        .map(stepwork_core::question::PresentedQuestion::scripted)
        .collect();
    Ok(Json(serde_json::json!({
        "step": step,
        "questions": questions,
    })))
}
