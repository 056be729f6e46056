//! Question script store.
//!
//! An immutable, validated catalog of questions per step. The built-in
//! catalog ships in `script/builtin.yaml`; a project may override it with
//! `.stepwork/script.yaml`.

use crate::error::{Result, StepworkError};
use crate::paths;
use crate::question::{FollowUpQuestion, Question};
use crate::types::Step;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUILTIN_SCRIPT: &str = include_str!("../script/builtin.yaml");

// ---------------------------------------------------------------------------
// ScriptFile (on-disk layout)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptFile {
    pub questions: Vec<Question>,
}

// ---------------------------------------------------------------------------
// QuestionScript
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct QuestionScript {
    questions: Vec<Question>,
    /// Compiled triggers keyed by question id, parallel to
    /// `Question::conditional_follow_ups`.
    triggers: HashMap<String, Vec<Regex>>,
}

impl QuestionScript {
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_SCRIPT)
    }

    /// The raw built-in script, used to seed `.stepwork/script.yaml`.
    pub fn builtin_yaml() -> &'static str {
        BUILTIN_SCRIPT
    }

    /// Load the project override if present, otherwise the built-in catalog.
    pub fn load(root: &Path) -> Result<Self> {
        match crate::io::read_if_exists(&paths::script_path(root))? {
            Some(data) => Self::from_yaml(&data),
            None => Self::builtin(),
        }
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let file: ScriptFile = serde_yaml::from_str(data)?;
        Self::from_questions(file.questions)
    }

    pub fn from_questions(mut questions: Vec<Question>) -> Result<Self> {
        questions.sort_by_key(|q| (q.step, q.order));
        validate(&questions)?;

        let mut triggers = HashMap::new();
        for q in &questions {
            let compiled = q
                .conditional_follow_ups
                .iter()
                .map(|c| compile_trigger(&c.trigger))
                .collect::<Result<Vec<_>>>()?;
            triggers.insert(q.id.clone(), compiled);
        }

        Ok(Self {
            questions,
            triggers,
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        let file = ScriptFile {
            questions: self.questions.clone(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Active questions for `step`, ascending by `order`.
    pub fn questions_for_step(&self, step: Step) -> Vec<&Question> {
        // `questions` is kept sorted by (step, order).
        self.questions
            .iter()
            .filter(|q| q.step == step && q.is_active)
            .collect()
    }

    /// Same as [`questions_for_step`](Self::questions_for_step) for a raw
    /// step number, failing with `InvalidStep` outside the supported set.
    pub fn questions_for_step_number(&self, n: u8) -> Result<Vec<&Question>> {
        let step = Step::from_number(n)?;
        Ok(self.questions_for_step(step))
    }

    pub fn first_question(&self, step: Step) -> Result<&Question> {
        self.questions_for_step(step)
            .into_iter()
            .next()
            .ok_or(StepworkError::EmptyStep(step))
    }

    /// The next active question after `question_id`, or `None` when that
    /// question is the last one or ends the step.
    pub fn next_after(&self, step: Step, question_id: &str) -> Result<Option<&Question>> {
        let active = self.questions_for_step(step);
        let pos = active
            .iter()
            .position(|q| q.id == question_id)
            .ok_or_else(|| StepworkError::QuestionNotFound(question_id.to_string()))?;
        if active[pos].completion_marker {
            return Ok(None);
        }
        Ok(active.get(pos + 1).copied())
    }

    /// The first conditional follow-up of `question` whose trigger matches
    /// `answer`.
    pub fn matching_follow_up<'a>(
        &'a self,
        question: &'a Question,
        answer: &str,
    ) -> Option<&'a FollowUpQuestion> {
        let compiled = self.triggers.get(&question.id)?;
        let answer = answer.trim();
        compiled
            .iter()
            .zip(&question.conditional_follow_ups)
            .find(|(re, _)| re.is_match(answer))
            .map(|(_, c)| &c.question)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn compile_trigger(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| StepworkError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn validate(questions: &[Question]) -> Result<()> {
    let mut ids = HashSet::new();
    for q in questions {
        if q.id.trim().is_empty() {
            return Err(StepworkError::ScriptInvalid(format!(
                "{} question at order {} has an empty id",
                q.step, q.order
            )));
        }
        if !ids.insert(q.id.as_str()) {
            return Err(StepworkError::ScriptInvalid(format!(
                "duplicate question id '{}'",
                q.id
            )));
        }
        for c in &q.conditional_follow_ups {
            if !ids.insert(c.question.id.as_str()) {
                return Err(StepworkError::ScriptInvalid(format!(
                    "duplicate question id '{}'",
                    c.question.id
                )));
            }
        }
    }

    for &step in Step::all() {
        let in_step: Vec<&Question> = questions.iter().filter(|q| q.step == step).collect();

        let mut orders = HashSet::new();
        for q in &in_step {
            if !orders.insert(q.order) {
                return Err(StepworkError::ScriptInvalid(format!(
                    "{step} has more than one question with order {}",
                    q.order
                )));
            }
        }

        let markers: Vec<&&Question> = in_step.iter().filter(|q| q.completion_marker).collect();
        if markers.len() > 1 {
            return Err(StepworkError::ScriptInvalid(format!(
                "{step} has {} completion markers; at most one is allowed",
                markers.len()
            )));
        }

        if let Some(marker) = markers.first() {
            if let Some(stranded) = in_step
                .iter()
                .find(|q| q.is_active && q.is_required && q.order > marker.order)
            {
                return Err(StepworkError::ScriptInvalid(format!(
                    "required question '{}' comes after completion marker '{}'",
                    stranded.id, marker.id
                )));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
