use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use stepwork_core::session::{StartDetails, StepSession};
use stepwork_core::walker::{Analytics, SessionWalker};

use super::{history_to_json, load_owned, parse_step};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionBody {
    pub step: Option<serde_json::Value>,
    pub mood: Option<String>,
    pub intention: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub resume: bool,
}

/// POST /api/sessions/start — begin a step, or resume the caller's open one.
pub async fn start_session(
    State(app): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<StartSessionBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(body) = body.map_err(|e| AppError::bad_request(e.body_text()))?;
    let step = parse_step(body.step.as_ref())?;
    let details = StartDetails {
        mood: body.mood,
        intention: body.intention,
        location: body.location,
    };
    let resume = body.resume;

    let result = tokio::task::spawn_blocking(move || {
        if resume {
            if let Some(session) =
                StepSession::find_incomplete(&app.root, &user.user_id, Some(step))?
            {
                let walker = SessionWalker::reconstruct(
                    &app.script,
                    app.classifier.as_ref(),
                    session.current_step,
                    session.step_responses.clone(),
                )?;
                tracing::info!(session = %session.id, step = %step, "resumed session");
                return Ok::<_, AppError>(serde_json::json!({
                    "sessionId": session.id,
                    "step": session.current_step,
                    "initialQuestion": walker.current_question(),
                    "conversationHistory": history_to_json(walker.history()),
                    "isResumed": true,
                    "version": session.version,
                }));
            }
        }

        // Fails with EmptyStep before anything is written.
        let walker = SessionWalker::new(&app.script, app.classifier.as_ref(), step)?;
        let session = StepSession::create(&app.root, user.user_id.clone(), step, details)?;
        tracing::info!(session = %session.id, step = %step, "started session");
        Ok(serde_json::json!({
            "sessionId": session.id,
            "step": step,
            "initialQuestion": walker.current_question(),
            "conversationHistory": [],
            "isResumed": false,
            "version": session.version,
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// GET /api/sessions/start — the caller's most recent incomplete session.
pub async fn incomplete_session(
    State(app): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let Some(session) = StepSession::find_incomplete(&app.root, &user.user_id, None)? else {
            return Ok::<_, AppError>(serde_json::json!({ "hasIncompleteSession": false }));
        };
        let walker = SessionWalker::reconstruct(
            &app.script,
            app.classifier.as_ref(),
            session.current_step,
            session.step_responses.clone(),
        )?;
        Ok(serde_json::json!({
            "hasIncompleteSession": true,
            "session": {
                "sessionId": session.id,
                "step": session.current_step,
                "currentQuestion": walker.current_question(),
                "conversationHistory": history_to_json(walker.history()),
                "analytics": walker.analytics(),
                "updatedAt": session.updated_at,
                "version": session.version,
            },
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// GET /api/sessions — the caller's sessions, most recently updated first.
pub async fn list_sessions(
    State(app): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let sessions = StepSession::list_for_user(&app.root, &user.user_id)?;
        let list: Vec<serde_json::Value> = sessions
            .iter()
            .map(|s| {
                serde_json::json!({
                    "sessionId": s.id,
                    "step": s.current_step,
                    "mood": s.mood,
                    "intention": s.intention,
                    "location": s.location,
                    "isComplete": s.is_complete,
                    "analytics": Analytics::from_history(&s.step_responses),
                    "createdAt": s.created_at,
                    "updatedAt": s.updated_at,
                    "completedAt": s.completed_at,
                })
            })
            .collect();
        Ok::<_, AppError>(serde_json::json!(list))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// GET /api/sessions/{id} — full detail for the owner.
pub async fn get_session(
    State(app): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let session = load_owned(&app.root, &id, &user.user_id)?;
        let walker = SessionWalker::reconstruct(
            &app.script,
            app.classifier.as_ref(),
            session.current_step,
            session.step_responses.clone(),
        )?;
        Ok::<_, AppError>(serde_json::json!({
            "sessionId": session.id,
            "step": session.current_step,
            "mood": session.mood,
            "intention": session.intention,
            "location": session.location,
            "isComplete": session.is_complete,
            "currentQuestion": walker.current_question(),
            "conversationHistory": history_to_json(walker.history()),
            "analytics": walker.analytics(),
            "createdAt": session.created_at,
            "updatedAt": session.updated_at,
            "completedAt": session.completed_at,
            "version": session.version,
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}
