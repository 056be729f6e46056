use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    #[serde(rename = "step1", alias = "1", alias = "step_1")]
    One,
    #[serde(rename = "step2", alias = "2", alias = "step_2")]
    Two,
    #[serde(rename = "step3", alias = "3", alias = "step_3")]
    Three,
}

impl Step {
    pub fn all() -> &'static [Step] {
        &[Step::One, Step::Two, Step::Three]
    }

    pub fn number(self) -> u8 {
        match self {
            Step::One => 1,
            Step::Two => 2,
            Step::Three => 3,
        }
    }

    pub fn from_number(n: u8) -> crate::Result<Step> {
        match n {
            1 => Ok(Step::One),
            2 => Ok(Step::Two),
            3 => Ok(Step::Three),
            other => Err(crate::error::StepworkError::InvalidStep(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::One => "step1",
            Step::Two => "step2",
            Step::Three => "step3",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Step {
    type Err = crate::error::StepworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "step1" | "step_1" | "1" => Ok(Step::One),
            "step2" | "step_2" | "2" => Ok(Step::Two),
            "step3" | "step_3" | "3" => Ok(Step::Three),
            _ => Err(crate::error::StepworkError::InvalidStep(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// QuestionType
// ---------------------------------------------------------------------------

/// Rendering hint for clients. Never consulted by the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    OpenEnded,
    Scale,
    YesNo,
    MultipleChoice,
    Reflection,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::OpenEnded => "open_ended",
            QuestionType::Scale => "scale",
            QuestionType::YesNo => "yes_no",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Reflection => "reflection",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FollowUpType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpType {
    #[default]
    Clarify,
    Encourage,
    Deepen,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
