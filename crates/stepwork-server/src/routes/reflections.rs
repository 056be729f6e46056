use axum::extract::{Path, State};
use axum::{Extension, Json};
use std::time::Duration;
use stepwork_core::session::StepSession;

use super::load_owned;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::llm::generate_or_fallback;
use crate::state::AppState;

const REFLECTION_SYSTEM: &str = "You are a warm, non-judgmental companion helping someone \
in recovery reflect on their step work. Respond in 2-4 sentences. Acknowledge what they \
shared, highlight one strength or insight, and offer one gentle encouragement. Do not \
diagnose, give medical advice, or quote the questions back verbatim.";

/// Longest answer excerpt included in the prompt.
const MAX_ANSWER_CHARS: usize = 600;

fn reflection_prompt(session: &StepSession) -> String {
    let mut prompt = format!(
        "Here is my Step {} work from today.\n",
        session.current_step.number()
    );
    if let Some(mood) = &session.mood {
        prompt.push_str(&format!("Mood going in: {mood}\n"));
    }
    if let Some(intention) = &session.intention {
        prompt.push_str(&format!("My intention: {intention}\n"));
    }
    for turn in &session.step_responses {
        let answer: String = turn.answer_text.chars().take(MAX_ANSWER_CHARS).collect();
        prompt.push_str(&format!("\nQ: {}\nA: {answer}\n", turn.question_text));
    }
    prompt
}

/// POST /api/sessions/{id}/reflection — a short generated reflection, or the
/// fixed fallback text when generation fails.
pub async fn create_reflection(
    State(app): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let session = tokio::task::spawn_blocking(move || load_owned(&root, &id, &user.user_id))
        .await
        .map_err(AppError::join)??;

    let prompt = reflection_prompt(&session);
    let timeout = Duration::from_secs(app.config.llm.timeout_secs);
    let (reflection, generated) =
        generate_or_fallback(app.generator.as_ref(), timeout, REFLECTION_SYSTEM, &prompt).await;

    tracing::debug!(session = %session.id, generated, "reflection produced");
    Ok(Json(serde_json::json!({
        "reflection": reflection,
        "generated": generated,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwork_core::session::StartDetails;
    use stepwork_core::types::Step;

    #[test]
    fn prompt_includes_context_and_answers() {
        let mut session = StepSession::new(
            "u",
            Step::Two,
            StartDetails {
                mood: Some("anxious".into()),
                intention: None,
                location: None,
            },
        );
        session.step_responses.push(stepwork_core::walker::ConversationTurn {
            question_id: "q".into(),
            question_text: "What gives you hope?".into(),
            answer_text: "My kids.".into(),
            timestamp: chrono::Utc::now(),
            classification: Default::default(),
            follow_up_of: None,
            branched_to: None,
        });
        let prompt = reflection_prompt(&session);
        assert!(prompt.contains("Step 2 work"));
        assert!(prompt.contains("Mood going in: anxious"));
        assert!(!prompt.contains("My intention"));
        assert!(prompt.contains("Q: What gives you hope?\nA: My kids."));
    }
}
