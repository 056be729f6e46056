//! Session walker: drives one user through one step's question sequence.
//!
//! The walker is request-scoped. Its durable state is the ordered list of
//! [`ConversationTurn`]s; [`SessionWalker::reconstruct`] rebuilds the cursor
//! and counters from that list by replaying it through the same transition
//! used by [`SessionWalker::process_answer`], taking every classification
//! from the stored turns.
//!
//! ```text
//!   AwaitingAnswer(q) ──answer──▶ q.completion_marker ──▶ StepComplete
//!          │                      trigger matches    ──▶ Branching(q, f)
//!          │                      next_after(q)      ──▶ AwaitingAnswer(next) | StepComplete
//!   Branching(q, f)  ──answer──▶ next_after(q)      ──▶ AwaitingAnswer(next) | StepComplete
//! ```

use crate::classifier::{AnswerClassifier, Classification, ClassifyContext};
use crate::error::{Result, StepworkError};
use crate::question::{FollowUp, FollowUpQuestion, PresentedQuestion, Question};
use crate::script::QuestionScript;
use crate::types::Step;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ConversationTurn
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question_id: String,
    pub question_text: String,
    pub answer_text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub classification: Classification,
    /// Set when this turn answers a conditional follow-up; names the
    /// scripted question that triggered it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_of: Option<String>,
    /// Id of the conditional follow-up this answer triggered, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branched_to: Option<String>,
}

impl ConversationTurn {
    /// The scripted question this turn belongs to.
    pub fn scripted_question_id(&self) -> &str {
        self.follow_up_of.as_deref().unwrap_or(&self.question_id)
    }
}

// ---------------------------------------------------------------------------
// WalkerState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum WalkerState {
    AwaitingAnswer(Question),
    Branching {
        parent: Question,
        follow_up: FollowUpQuestion,
    },
    StepComplete,
}

// ---------------------------------------------------------------------------
// Analytics / AnswerOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub questions_completed: usize,
    pub breakthrough_moments: usize,
    pub red_flags_encountered: usize,
    pub safety_concerns: usize,
}

impl Analytics {
    /// Tally stored classifications. Needs no script, so it still works for
    /// sessions whose questions have since been edited.
    pub fn from_history(history: &[ConversationTurn]) -> Self {
        let mut analytics = Self::default();
        for turn in history {
            analytics.record(turn);
        }
        analytics
    }

    fn record(&mut self, turn: &ConversationTurn) {
        self.questions_completed += 1;
        if turn.classification.red_flag {
            self.red_flags_encountered += 1;
        }
        if turn.classification.breakthrough {
            self.breakthrough_moments += 1;
        }
        if turn.classification.safety_concern {
            self.safety_concerns += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub next_question: Option<PresentedQuestion>,
    /// Vague answer or safety concern.
    pub has_red_flags: bool,
    pub is_vague: bool,
    pub safety_concern: bool,
    pub is_breakthrough: bool,
    pub should_complete: bool,
    /// The question's soft follow-up prompt, offered after a vague answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_follow_up: Option<FollowUp>,
}

/// Result of the request-scoped [`walk`].
#[derive(Debug, Clone)]
pub struct WalkResult {
    pub history: Vec<ConversationTurn>,
    pub outcome: AnswerOutcome,
    pub analytics: Analytics,
}

// ---------------------------------------------------------------------------
// SessionWalker
// ---------------------------------------------------------------------------

pub struct SessionWalker<'a> {
    script: &'a QuestionScript,
    classifier: &'a dyn AnswerClassifier,
    step: Step,
    history: Vec<ConversationTurn>,
    state: WalkerState,
    analytics: Analytics,
}

impl<'a> SessionWalker<'a> {
    pub fn new(
        script: &'a QuestionScript,
        classifier: &'a dyn AnswerClassifier,
        step: Step,
    ) -> Result<Self> {
        let first = script.first_question(step)?.clone();
        Ok(Self {
            script,
            classifier,
            step,
            history: Vec::new(),
            state: WalkerState::AwaitingAnswer(first),
            analytics: Analytics::default(),
        })
    }

    /// Rebuild a walker from persisted history without re-classifying.
    pub fn reconstruct(
        script: &'a QuestionScript,
        classifier: &'a dyn AnswerClassifier,
        step: Step,
        history: Vec<ConversationTurn>,
    ) -> Result<Self> {
        let mut walker = Self::new(script, classifier, step)?;
        for turn in history {
            walker.advance(turn)?;
        }
        Ok(walker)
    }

    pub fn state(&self) -> &WalkerState {
        &self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == WalkerState::StepComplete
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn into_history(self) -> Vec<ConversationTurn> {
        self.history
    }

    pub fn analytics(&self) -> Analytics {
        self.analytics
    }

    pub fn current_question(&self) -> Option<PresentedQuestion> {
        match &self.state {
            WalkerState::AwaitingAnswer(q) => Some(PresentedQuestion::scripted(q)),
            WalkerState::Branching { parent, follow_up } => {
                Some(PresentedQuestion::follow_up(parent, follow_up))
            }
            WalkerState::StepComplete => None,
        }
    }

    pub fn process_answer(&mut self, answer: &str) -> Result<AnswerOutcome> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(StepworkError::EmptyAnswer);
        }

        let (context, asked_id, asked_text, follow_up_of) = match &self.state {
            WalkerState::StepComplete => return Err(StepworkError::StepAlreadyComplete),
            WalkerState::AwaitingAnswer(q) => (q.clone(), q.id.clone(), q.text.clone(), None),
            WalkerState::Branching { parent, follow_up } => (
                parent.clone(),
                follow_up.id.clone(),
                follow_up.text.clone(),
                Some(parent.id.clone()),
            ),
        };

        let classification = {
            let prior: Vec<&ConversationTurn> = self
                .history
                .iter()
                .filter(|t| t.scripted_question_id() == context.id)
                .collect();
            self.classifier.classify(
                answer,
                &ClassifyContext {
                    question: &context,
                    prior_turns: &prior,
                },
            )
        };

        // Follow-ups never branch again, and a completion marker ends the
        // step before any trigger is considered.
        let branched_to = if follow_up_of.is_none() && !context.completion_marker {
            self.script
                .matching_follow_up(&context, answer)
                .map(|f| f.id.clone())
        } else {
            None
        };

        let suggested_follow_up = if classification.red_flag
            && follow_up_of.is_none()
            && branched_to.is_none()
            && !context.completion_marker
        {
            context.follow_up.clone()
        } else {
            None
        };

        self.advance(ConversationTurn {
            question_id: asked_id,
            question_text: asked_text,
            answer_text: answer.to_string(),
            timestamp: Utc::now(),
            classification,
            follow_up_of,
            branched_to,
        })?;

        Ok(AnswerOutcome {
            next_question: self.current_question(),
            has_red_flags: classification.red_flag || classification.safety_concern,
            is_vague: classification.red_flag,
            safety_concern: classification.safety_concern,
            is_breakthrough: classification.breakthrough,
            should_complete: self.is_complete(),
            suggested_follow_up,
        })
    }

    /// The single transition, shared by live answers and replay. `turn` must
    /// answer whatever the walker is currently presenting.
    fn advance(&mut self, turn: ConversationTurn) -> Result<()> {
        let index = self.history.len();
        let next = match &self.state {
            WalkerState::StepComplete => {
                return Err(StepworkError::HistoryMismatch {
                    turn: index,
                    expected: "<end of step>".to_string(),
                    found: turn.question_id,
                });
            }
            WalkerState::AwaitingAnswer(q) => {
                if turn.question_id != q.id || turn.follow_up_of.is_some() {
                    return Err(StepworkError::HistoryMismatch {
                        turn: index,
                        expected: q.id.clone(),
                        found: turn.question_id,
                    });
                }
                if q.completion_marker {
                    WalkerState::StepComplete
                } else if let Some(target) = &turn.branched_to {
                    let follow_up = q
                        .conditional_follow_ups
                        .iter()
                        .find(|c| &c.question.id == target)
                        .map(|c| c.question.clone())
                        .ok_or_else(|| StepworkError::HistoryMismatch {
                            turn: index,
                            expected: format!("a follow-up of '{}'", q.id),
                            found: target.clone(),
                        })?;
                    WalkerState::Branching {
                        parent: q.clone(),
                        follow_up,
                    }
                } else {
                    self.after(&q.id)?
                }
            }
            WalkerState::Branching { parent, follow_up } => {
                if turn.question_id != follow_up.id
                    || turn.follow_up_of.as_deref() != Some(parent.id.as_str())
                {
                    return Err(StepworkError::HistoryMismatch {
                        turn: index,
                        expected: follow_up.id.clone(),
                        found: turn.question_id,
                    });
                }
                self.after(&parent.id)?
            }
        };

        self.analytics.record(&turn);
        self.history.push(turn);
        self.state = next;
        Ok(())
    }

    fn after(&self, question_id: &str) -> Result<WalkerState> {
        Ok(match self.script.next_after(self.step, question_id)? {
            Some(next) => WalkerState::AwaitingAnswer(next.clone()),
            None => WalkerState::StepComplete,
        })
    }
}

/// Request-scoped form: `(script, prior history, answer) -> (history, outcome)`.
pub fn walk(
    script: &QuestionScript,
    classifier: &dyn AnswerClassifier,
    step: Step,
    prior_history: Vec<ConversationTurn>,
    answer: &str,
) -> Result<WalkResult> {
    let mut walker = SessionWalker::reconstruct(script, classifier, step, prior_history)?;
    let outcome = walker.process_answer(answer)?;
    let analytics = walker.analytics();
    Ok(WalkResult {
        history: walker.into_history(),
        outcome,
        analytics,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KeywordClassifier;
    use crate::question::ConditionalFollowUp;
    use crate::script::tests::{question, three_question_script};
    use crate::types::QuestionType;

    const SUBSTANTIVE: &str = "I kept telling my family it was under control when it was not";

    fn branching_script() -> QuestionScript {
        let mut q2 = question(Step::One, "q2", 2);
        q2.conditional_follow_ups.push(ConditionalFollowUp {
            trigger: "\\bnever\\b".to_string(),
            question: FollowUpQuestion {
                id: "q2-never".to_string(),
                text: "What kept you from trying?".to_string(),
                question_type: QuestionType::OpenEnded,
            },
        });
        QuestionScript::from_questions(vec![
            question(Step::One, "q1", 1),
            q2,
            question(Step::One, "q3", 3),
        ])
        .unwrap()
    }

    #[test]
    fn linear_step_completes_on_last_answer() {
        let script = three_question_script();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::One).unwrap();

        for (i, expected_next) in [Some("q2"), Some("q3"), None].into_iter().enumerate() {
            let out = walker.process_answer(SUBSTANTIVE).unwrap();
            assert_eq!(
                out.next_question.as_ref().map(|q| q.id.as_str()),
                expected_next,
                "answer {}",
                i + 1
            );
            assert_eq!(out.should_complete, expected_next.is_none());
        }
        assert!(walker.is_complete());
        assert!(walker.current_question().is_none());
    }

    #[test]
    fn answering_past_completion_fails() {
        let script = three_question_script();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::One).unwrap();
        for _ in 0..3 {
            walker.process_answer(SUBSTANTIVE).unwrap();
        }
        assert!(matches!(
            walker.process_answer(SUBSTANTIVE),
            Err(StepworkError::StepAlreadyComplete)
        ));
        assert_eq!(walker.analytics().questions_completed, 3);
    }

    #[test]
    fn completion_marker_ends_step_immediately() {
        let mut marker = question(Step::One, "q2", 2);
        marker.completion_marker = true;
        let mut optional = question(Step::One, "q3", 3);
        optional.is_required = false;
        let script = QuestionScript::from_questions(vec![
            question(Step::One, "q1", 1),
            marker,
            optional,
        ])
        .unwrap();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::One).unwrap();

        assert!(!walker.process_answer(SUBSTANTIVE).unwrap().should_complete);
        let out = walker.process_answer(SUBSTANTIVE).unwrap();
        assert!(out.should_complete);
        assert!(out.next_question.is_none());
    }

    #[test]
    fn completion_marker_wins_over_trigger() {
        let mut only = question(Step::Two, "only", 1);
        only.completion_marker = true;
        only.conditional_follow_ups.push(ConditionalFollowUp {
            trigger: ".*".to_string(),
            question: FollowUpQuestion {
                id: "only-f".to_string(),
                text: "More?".to_string(),
                question_type: QuestionType::OpenEnded,
            },
        });
        let script = QuestionScript::from_questions(vec![only]).unwrap();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::Two).unwrap();
        assert!(walker.process_answer(SUBSTANTIVE).unwrap().should_complete);
    }

    #[test]
    fn questions_completed_tracks_calls() {
        let script = branching_script();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::One).unwrap();
        let answers = ["ok", "I never tried to stop on my own", SUBSTANTIVE, "fine"];
        for (i, a) in answers.iter().enumerate() {
            walker.process_answer(a).unwrap();
            assert_eq!(walker.analytics().questions_completed, i + 1);
        }
        assert!(walker.is_complete());
    }

    #[test]
    fn end_to_end_three_question_step() {
        let script = three_question_script();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::One).unwrap();
        assert_eq!(walker.current_question().unwrap().id, "q1");

        let out = walker.process_answer("ok").unwrap();
        assert_eq!(out.next_question.unwrap().id, "q2");
        assert!(out.has_red_flags);
        assert!(!out.is_breakthrough);
        assert!(!out.should_complete);

        let out = walker
            .process_answer("I realize now that I've been avoiding this for years")
            .unwrap();
        assert_eq!(out.next_question.unwrap().id, "q3");
        assert!(!out.has_red_flags);
        assert!(out.is_breakthrough);
        assert!(!out.should_complete);

        let out = walker.process_answer("Yes").unwrap();
        assert!(out.next_question.is_none());
        assert!(out.should_complete);

        let analytics = walker.analytics();
        assert_eq!(analytics.questions_completed, 3);
        assert_eq!(analytics.breakthrough_moments, 1);
        assert_eq!(analytics.red_flags_encountered, 2);
    }

    #[test]
    fn vague_answer_offers_soft_follow_up() {
        let mut q1 = question(Step::One, "q1", 1);
        q1.follow_up = Some(FollowUp {
            follow_up_type: Default::default(),
            text: "Can you say more?".to_string(),
        });
        let script =
            QuestionScript::from_questions(vec![q1, question(Step::One, "q2", 2)]).unwrap();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::One).unwrap();

        let out = walker.process_answer("not sure").unwrap();
        assert_eq!(out.suggested_follow_up.unwrap().text, "Can you say more?");
        // The soft prompt never holds the walker back.
        assert_eq!(out.next_question.unwrap().id, "q2");
    }

    #[test]
    fn trigger_branches_then_resumes_after_parent() {
        let script = branching_script();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::One).unwrap();

        walker.process_answer(SUBSTANTIVE).unwrap();
        let out = walker
            .process_answer("Honestly I never tried to quit before")
            .unwrap();
        let next = out.next_question.unwrap();
        assert_eq!(next.id, "q2-never");
        assert!(next.is_follow_up);
        assert_eq!(next.follow_up_of.as_deref(), Some("q2"));
        assert_eq!(next.order, None);
        assert!(matches!(walker.state(), WalkerState::Branching { .. }));

        // Matching text in the follow-up answer does not branch again.
        let out = walker.process_answer("I never wanted to feel it").unwrap();
        assert_eq!(out.next_question.unwrap().id, "q3");
        assert_eq!(walker.history()[2].follow_up_of.as_deref(), Some("q2"));
    }

    #[test]
    fn follow_up_answer_after_vague_parent_is_a_breakthrough() {
        let mut q1 = question(Step::One, "q1", 1);
        q1.conditional_follow_ups.push(ConditionalFollowUp {
            trigger: "^idk$".to_string(),
            question: FollowUpQuestion {
                id: "q1-f".to_string(),
                text: "Take a moment. What comes to mind?".to_string(),
                question_type: QuestionType::OpenEnded,
            },
        });
        let script =
            QuestionScript::from_questions(vec![q1, question(Step::One, "q2", 2)]).unwrap();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::One).unwrap();

        assert!(walker.process_answer("idk").unwrap().is_vague);
        let out = walker.process_answer(SUBSTANTIVE).unwrap();
        assert!(out.is_breakthrough);
    }

    #[test]
    fn reconstruction_matches_uninterrupted_walk() {
        let script = branching_script();
        let classifier = KeywordClassifier::default();
        let answers = ["ok", "I never tried", SUBSTANTIVE, "fine then, done"];

        let mut live = SessionWalker::new(&script, &classifier, Step::One).unwrap();
        let mut expected = Vec::new();
        for a in answers {
            expected.push(live.process_answer(a).unwrap().next_question);
        }

        for k in 0..answers.len() {
            let prior = live.history()[..k].to_vec();
            let mut resumed =
                SessionWalker::reconstruct(&script, &classifier, Step::One, prior).unwrap();
            let out = resumed.process_answer(answers[k]).unwrap();
            assert_eq!(out.next_question, expected[k], "resumed after {k} turns");
        }
    }

    #[test]
    fn reconstruction_uses_stored_classification() {
        let script = three_question_script();
        let classifier = KeywordClassifier::default();
        let history = vec![ConversationTurn {
            question_id: "q1".into(),
            question_text: "Question q1?".into(),
            // Would classify as vague if recomputed.
            answer_text: "ok".into(),
            timestamp: Utc::now(),
            classification: Classification {
                red_flag: false,
                breakthrough: true,
                safety_concern: false,
            },
            follow_up_of: None,
            branched_to: None,
        }];
        let from_history = Analytics::from_history(&history);
        let walker =
            SessionWalker::reconstruct(&script, &classifier, Step::One, history).unwrap();
        let a = walker.analytics();
        assert_eq!(a, from_history);
        assert_eq!(a.questions_completed, 1);
        assert_eq!(a.breakthrough_moments, 1);
        assert_eq!(a.red_flags_encountered, 0);
        assert_eq!(walker.current_question().unwrap().id, "q2");
    }

    #[test]
    fn tampered_history_is_rejected() {
        let script = three_question_script();
        let classifier = KeywordClassifier::default();
        let mut live = SessionWalker::new(&script, &classifier, Step::One).unwrap();
        live.process_answer(SUBSTANTIVE).unwrap();
        let mut history = live.into_history();
        history[0].question_id = "q3".into();

        let err = SessionWalker::reconstruct(&script, &classifier, Step::One, history)
            .err()
            .unwrap();
        assert!(matches!(err, StepworkError::HistoryMismatch { turn: 0, .. }));
    }

    #[test]
    fn history_past_completion_is_rejected() {
        let script = three_question_script();
        let classifier = KeywordClassifier::default();
        let mut live = SessionWalker::new(&script, &classifier, Step::One).unwrap();
        for _ in 0..3 {
            live.process_answer(SUBSTANTIVE).unwrap();
        }
        let mut history = live.into_history();
        history.push(history[2].clone());

        assert!(matches!(
            SessionWalker::reconstruct(&script, &classifier, Step::One, history),
            Err(StepworkError::HistoryMismatch { turn: 3, .. })
        ));
    }

    #[test]
    fn reconstructed_complete_walker_rejects_answers() {
        let script = three_question_script();
        let classifier = KeywordClassifier::default();
        let mut live = SessionWalker::new(&script, &classifier, Step::One).unwrap();
        for _ in 0..3 {
            live.process_answer(SUBSTANTIVE).unwrap();
        }
        let mut resumed =
            SessionWalker::reconstruct(&script, &classifier, Step::One, live.into_history())
                .unwrap();
        assert!(resumed.is_complete());
        assert!(matches!(
            resumed.process_answer(SUBSTANTIVE),
            Err(StepworkError::StepAlreadyComplete)
        ));
    }

    #[test]
    fn empty_answer_is_rejected_without_side_effects() {
        let script = three_question_script();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::One).unwrap();
        assert!(matches!(
            walker.process_answer("   "),
            Err(StepworkError::EmptyAnswer)
        ));
        assert!(walker.history().is_empty());
        assert_eq!(walker.current_question().unwrap().id, "q1");
    }

    #[test]
    fn walk_is_pure_over_history() {
        let script = three_question_script();
        let classifier = KeywordClassifier::default();
        let first = walk(&script, &classifier, Step::One, Vec::new(), SUBSTANTIVE).unwrap();
        assert_eq!(first.history.len(), 1);
        let second = walk(
            &script,
            &classifier,
            Step::One,
            first.history.clone(),
            SUBSTANTIVE,
        )
        .unwrap();
        assert_eq!(second.history.len(), 2);
        assert_eq!(second.analytics.questions_completed, 2);
        assert_eq!(second.outcome.next_question.unwrap().id, "q3");
        // The caller's copy is untouched.
        assert_eq!(first.history.len(), 1);
    }

    #[test]
    fn safety_concern_is_reported_separately() {
        let mut q1 = question(Step::One, "q1", 1);
        q1.safety_flag = true;
        let script =
            QuestionScript::from_questions(vec![q1, question(Step::One, "q2", 2)]).unwrap();
        let classifier = KeywordClassifier::default();
        let mut walker = SessionWalker::new(&script, &classifier, Step::One).unwrap();

        let out = walker
            .process_answer("Lately I keep thinking I want to die and nobody would notice")
            .unwrap();
        assert!(out.safety_concern);
        assert!(!out.is_vague);
        assert!(out.has_red_flags);
        assert_eq!(walker.analytics().safety_concerns, 1);
        assert_eq!(walker.analytics().red_flags_encountered, 0);
    }

    #[test]
    fn empty_step_cannot_start() {
        let script = three_question_script();
        let classifier = KeywordClassifier::default();
        assert!(matches!(
            SessionWalker::new(&script, &classifier, Step::Three),
            Err(StepworkError::EmptyStep(Step::Three))
        ));
    }
}
