use crate::config::ClassifierConfig;
use crate::question::Question;
use crate::walker::ConversationTurn;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Classification (output)
// ---------------------------------------------------------------------------

/// Signals derived from one answer. Stored on the turn and never recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// The answer looks like a non-answer and probably needs a nudge.
    #[serde(default)]
    pub red_flag: bool,
    #[serde(default)]
    pub breakthrough: bool,
    /// Crisis language on a safety-flagged question.
    #[serde(default)]
    pub safety_concern: bool,
}

// ---------------------------------------------------------------------------
// AnswerClassifier
// ---------------------------------------------------------------------------

pub struct ClassifyContext<'a> {
    pub question: &'a Question,
    /// Earlier turns in this session for the same scripted question,
    /// including answers to its follow-ups.
    pub prior_turns: &'a [&'a ConversationTurn],
}

pub trait AnswerClassifier {
    fn classify(&self, answer: &str, ctx: &ClassifyContext) -> Classification;
}

// ---------------------------------------------------------------------------
// KeywordClassifier
// ---------------------------------------------------------------------------

const VAGUE_ANSWERS: &[&str] = &[
    "i don't know",
    "i dont know",
    "don't know",
    "dont know",
    "idk",
    "not sure",
    "i'm not sure",
    "im not sure",
    "no idea",
    "fine",
    "i'm fine",
    "ok",
    "okay",
    "nothing",
    "whatever",
    "i guess",
    "dunno",
    "maybe",
    "n/a",
    "na",
    "none",
    "no comment",
    "same as always",
];

const INSIGHT_PHRASES: &[&str] = &[
    "realize",
    "realise",
    "understand now",
    "now i understand",
    "for the first time",
    "i see that",
    "i see now",
    "makes sense now",
    "i never noticed",
    "never noticed before",
    "now i know",
    "i have learned",
    "i've learned",
    "i've been avoiding",
    "i can admit",
    "the truth is",
];

const CRISIS_PHRASES: &[&str] = &[
    "kill myself",
    "killing myself",
    "end my life",
    "end it all",
    "suicide",
    "suicidal",
    "want to die",
    "wanna die",
    "hurt myself",
    "hurting myself",
    "self-harm",
    "self harm",
    "cut myself",
    "cutting myself",
    "overdose",
    "better off dead",
    "no reason to live",
    "not want to be here",
    "don't want to be here anymore",
];

/// Length and keyword heuristics. No semantic understanding is attempted.
pub struct KeywordClassifier {
    min_words: usize,
    breakthrough_min_words: usize,
    vague_answers: Vec<String>,
    insight_phrases: Vec<String>,
    crisis_phrases: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(cfg: &ClassifierConfig) -> Self {
        Self {
            min_words: cfg.min_words,
            breakthrough_min_words: cfg.breakthrough_min_words,
            vague_answers: merge(VAGUE_ANSWERS, &cfg.extra_vague_answers),
            insight_phrases: merge(INSIGHT_PHRASES, &cfg.extra_insight_phrases),
            crisis_phrases: merge(CRISIS_PHRASES, &cfg.extra_crisis_phrases),
        }
    }

    pub fn is_vague(&self, answer: &str) -> bool {
        let normalized = normalize(answer);
        if word_count(&normalized) < self.min_words {
            return true;
        }
        let bare = normalized.trim_end_matches(|c: char| c.is_ascii_punctuation() || c == '…');
        self.vague_answers.iter().any(|v| v == bare)
    }

    pub fn mentions_crisis(&self, answer: &str) -> bool {
        let normalized = normalize(answer);
        self.crisis_phrases
            .iter()
            .any(|p| normalized.contains(p.as_str()))
    }

    fn shows_insight(&self, normalized: &str) -> bool {
        self.insight_phrases
            .iter()
            .any(|p| normalized.contains(p.as_str()))
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl AnswerClassifier for KeywordClassifier {
    fn classify(&self, answer: &str, ctx: &ClassifyContext) -> Classification {
        let normalized = normalize(answer);
        let red_flag = self.is_vague(answer);
        let safety_concern = ctx.question.safety_flag && self.mentions_crisis(answer);

        let long_enough = word_count(&normalized) >= self.breakthrough_min_words;
        let improved = ctx.prior_turns.iter().any(|t| t.classification.red_flag);
        let breakthrough =
            !red_flag && long_enough && (self.shows_insight(&normalized) || improved);

        Classification {
            red_flag,
            breakthrough,
            safety_concern,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn merge(builtin: &[&str], extra: &[String]) -> Vec<String> {
    builtin
        .iter()
        .map(|s| s.to_string())
        .chain(extra.iter().map(|s| normalize(s)))
        .collect()
}

/// Lowercase, trim, fold typographic apostrophes, collapse whitespace.
fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .replace(['\u{2019}', '\u{2018}'], "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::tests::question;
    use crate::types::Step;

    fn classify(answer: &str) -> Classification {
        let q = question(Step::One, "q", 1);
        KeywordClassifier::default().classify(
            answer,
            &ClassifyContext {
                question: &q,
                prior_turns: &[],
            },
        )
    }

    #[test]
    fn short_answers_are_vague() {
        assert!(classify("fine").red_flag);
        assert!(classify("ok").red_flag);
        assert!(!classify("a bit tired").red_flag);
    }

    #[test]
    fn generic_non_answers_are_vague_regardless_of_case() {
        assert!(classify("  I Don’t Know.  ").red_flag);
        assert!(classify("I'm not sure").red_flag);
        assert!(classify("Same as always!").red_flag);
    }

    #[test]
    fn substantive_answer_is_not_vague() {
        let c = classify("I lost my job because I kept showing up late after drinking");
        assert!(!c.red_flag);
        assert!(!c.breakthrough);
    }

    #[test]
    fn insight_language_is_a_breakthrough() {
        let c = classify("I realize now that I've been avoiding this for years");
        assert!(c.breakthrough);
        assert!(!c.red_flag);
    }

    #[test]
    fn short_insight_is_not_a_breakthrough() {
        assert!(!classify("I realize it now").breakthrough);
    }

    #[test]
    fn improvement_after_vague_answer_is_a_breakthrough() {
        let q = question(Step::One, "q", 1);
        let earlier = ConversationTurn {
            question_id: "q".into(),
            question_text: q.text.clone(),
            answer_text: "idk".into(),
            timestamp: chrono::Utc::now(),
            classification: Classification {
                red_flag: true,
                ..Default::default()
            },
            follow_up_of: None,
            branched_to: None,
        };
        let prior = [&earlier];
        let c = KeywordClassifier::default().classify(
            "My sister stopped calling me and I pretended it did not matter",
            &ClassifyContext {
                question: &q,
                prior_turns: &prior,
            },
        );
        assert!(c.breakthrough);
    }

    #[test]
    fn crisis_language_only_flags_safety_questions() {
        let answer = "Some days I think everyone would be better off dead without me";
        assert!(!classify(answer).safety_concern);

        let mut q = question(Step::One, "q", 1);
        q.safety_flag = true;
        let c = KeywordClassifier::default().classify(
            answer,
            &ClassifyContext {
                question: &q,
                prior_turns: &[],
            },
        );
        assert!(c.safety_concern);
        assert!(!c.red_flag);
    }

    #[test]
    fn configured_extras_are_honoured() {
        let cfg = ClassifierConfig {
            extra_vague_answers: vec!["Pass".to_string()],
            min_words: 1,
            ..Default::default()
        };
        let classifier = KeywordClassifier::new(&cfg);
        assert!(classifier.is_vague("pass"));
        assert!(!classifier.is_vague("tired"));
    }
}
