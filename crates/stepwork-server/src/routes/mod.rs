pub mod answers;
pub mod health;
pub mod reflections;
pub mod sessions;
pub mod steps;

use crate::error::AppError;
use stepwork_core::session::StepSession;
use stepwork_core::types::Step;
use stepwork_core::walker::ConversationTurn;

/// Accept `"step1"`, `"1"`, or a bare JSON number.
pub(crate) fn parse_step(value: Option<&serde_json::Value>) -> Result<Step, AppError> {
    match value {
        None | Some(serde_json::Value::Null) => Err(AppError::bad_request("step is required")),
        Some(serde_json::Value::String(s)) => Ok(s.parse::<Step>()?),
        Some(serde_json::Value::Number(n)) => {
            let n = n
                .as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| AppError::bad_request(format!("invalid step: {n}")))?;
            Ok(Step::from_number(n)?)
        }
        Some(other) => Err(AppError::bad_request(format!("invalid step: {other}"))),
    }
}

/// Load a session and check the caller owns it.
pub(crate) fn load_owned(
    root: &std::path::Path,
    id: &str,
    user_id: &str,
) -> Result<StepSession, AppError> {
    let session = StepSession::load(root, id)?;
    if !session.is_owned_by(user_id) {
        return Err(AppError::forbidden(format!(
            "session {id} belongs to another user"
        )));
    }
    Ok(session)
}

pub(crate) fn turn_to_json(turn: &ConversationTurn) -> serde_json::Value {
    serde_json::json!({
        "questionId": turn.question_id,
        "questionText": turn.question_text,
        "answerText": turn.answer_text,
        "timestamp": turn.timestamp,
        "isVague": turn.classification.red_flag,
        "isBreakthrough": turn.classification.breakthrough,
        "safetyConcern": turn.classification.safety_concern,
        "followUpOf": turn.follow_up_of,
    })
}

pub(crate) fn history_to_json(history: &[ConversationTurn]) -> serde_json::Value {
    serde_json::Value::Array(history.iter().map(turn_to_json).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_step_accepts_strings_and_numbers() {
        assert_eq!(parse_step(Some(&json!("step2"))).unwrap(), Step::Two);
        assert_eq!(parse_step(Some(&json!("3"))).unwrap(), Step::Three);
        assert_eq!(parse_step(Some(&json!(1))).unwrap(), Step::One);
    }

    #[test]
    fn parse_step_rejects_missing_and_out_of_range() {
        assert!(parse_step(None).is_err());
        assert!(parse_step(Some(&json!(null))).is_err());
        assert!(parse_step(Some(&json!(4))).is_err());
        assert!(parse_step(Some(&json!(-1))).is_err());
        assert!(parse_step(Some(&json!("step12"))).is_err());
        assert!(parse_step(Some(&json!(true))).is_err());
    }
}
