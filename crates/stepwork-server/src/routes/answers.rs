use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;
use stepwork_core::error::StepworkError;
use stepwork_core::walker::walk;

use super::load_owned;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerBody {
    pub session_id: Option<String>,
    pub answer: Option<String>,
    /// The session version the client last saw; a mismatch is a conflict.
    pub expected_version: Option<u64>,
}

/// POST /api/sessions/answer — record one answer and return what comes next.
pub async fn submit_answer(
    State(app): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<AnswerBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(body) = body.map_err(|e| AppError::bad_request(e.body_text()))?;
    let session_id = body
        .session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("sessionId is required"))?;
    let answer = body
        .answer
        .ok_or_else(|| AppError::bad_request("answer is required"))?;
    if answer.trim().is_empty() {
        return Err(StepworkError::EmptyAnswer.into());
    }

    let expected_version = body.expected_version;

    let result = tokio::task::spawn_blocking(move || {
        let lock = app.session_locks.for_session(&session_id);
        let _guard = lock
            .lock()
            .map_err(|_| AppError(anyhow::anyhow!("session lock poisoned")))?;

        let mut session = load_owned(&app.root, &session_id, &user.user_id)?;
        if let Some(expected) = expected_version {
            if expected != session.version {
                let e = StepworkError::VersionConflict {
                    id: session.id.clone(),
                    expected,
                    found: session.version,
                };
                tracing::warn!(session = %session.id, "{e}");
                return Err(e.into());
            }
        }
        if session.is_complete {
            return Err(StepworkError::StepAlreadyComplete.into());
        }

        let result = walk(
            &app.script,
            app.classifier.as_ref(),
            session.current_step,
            std::mem::take(&mut session.step_responses),
            &answer,
        )?;
        let outcome = result.outcome;
        session.record_answer(result.history, outcome.should_complete);
        if let Err(e) = session.save_versioned(&app.root) {
            if matches!(e, StepworkError::VersionConflict { .. }) {
                tracing::warn!(session = %session.id, "{e}");
            }
            return Err(e.into());
        }

        tracing::debug!(
            session = %session.id,
            vague = outcome.is_vague,
            breakthrough = outcome.is_breakthrough,
            turns = session.step_responses.len(),
            "answer recorded"
        );

        if outcome.safety_concern {
            tracing::warn!(session = %session.id, "safety concern flagged");
        }
        if outcome.should_complete {
            tracing::info!(session = %session.id, step = %session.current_step, "step complete");
        }

        Ok::<_, AppError>(serde_json::json!({
            "nextQuestion": outcome.next_question,
            "hasRedFlags": outcome.has_red_flags,
            "isVague": outcome.is_vague,
            "safetyConcern": outcome.safety_concern,
            "isBreakthrough": outcome.is_breakthrough,
            "shouldComplete": outcome.should_complete,
            "suggestedFollowUp": outcome.suggested_follow_up,
            "analytics": result.analytics,
            "version": session.version,
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}
