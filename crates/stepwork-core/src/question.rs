use crate::types::{FollowUpType, QuestionType, Step};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FollowUp
// ---------------------------------------------------------------------------

/// Soft prompt the client may show after a vague answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    #[serde(rename = "type", default)]
    pub follow_up_type: FollowUpType,
    pub text: String,
}

// ---------------------------------------------------------------------------
// ConditionalFollowUp
// ---------------------------------------------------------------------------

/// An ad hoc question presented instead of advancing when `trigger` matches
/// the answer. Not part of the step's ordered sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpQuestion {
    pub id: String,
    pub text: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalFollowUp {
    /// Case-insensitive regex matched against the trimmed answer.
    pub trigger: String,
    pub question: FollowUpQuestion,
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub step: Step,
    pub phase: String,
    pub phase_title: String,
    pub order: u32,
    pub text: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<FollowUp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditional_follow_ups: Vec<ConditionalFollowUp>,
    #[serde(default)]
    pub safety_flag: bool,
    #[serde(default)]
    pub completion_marker: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// PresentedQuestion
// ---------------------------------------------------------------------------

/// The client-facing view of whatever the walker asks next: either a
/// scripted question or an ad hoc conditional follow-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentedQuestion {
    pub id: String,
    pub step: Step,
    pub phase: String,
    pub phase_title: String,
    /// `None` for follow-ups, which do not count toward step order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<FollowUp>,
    pub is_follow_up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_of: Option<String>,
}

impl PresentedQuestion {
    pub fn scripted(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            step: q.step,
            phase: q.phase.clone(),
            phase_title: q.phase_title.clone(),
            order: Some(q.order),
            text: q.text.clone(),
            question_type: q.question_type,
            is_required: q.is_required,
            follow_up: q.follow_up.clone(),
            is_follow_up: false,
            follow_up_of: None,
        }
    }

    /// A follow-up inherits its parent's grouping so clients can keep it in
    /// the same phase.
    pub fn follow_up(parent: &Question, fq: &FollowUpQuestion) -> Self {
        Self {
            id: fq.id.clone(),
            step: parent.step,
            phase: parent.phase.clone(),
            phase_title: parent.phase_title.clone(),
            order: None,
            text: fq.text.clone(),
            question_type: fq.question_type,
            is_required: false,
            follow_up: None,
            is_follow_up: true,
            follow_up_of: Some(parent.id.clone()),
        }
    }
}
