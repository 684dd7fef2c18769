//! Quiz engine: configuration, generated-question validation, and the
//! execution state machine with its scoring rules.
//!
//! ## State machine
//!
//! ```text
//! Setup ──start──▶ Generating ──questions──▶ Active ──last advance──▶ Finished
//!   ▲                  │                       │
//!   └──── malformed/empty response ◀───────────┘ (per-question sub-state below)
//! ```
//!
//! Per-question sub-state in `Active`:
//! * **mcq**: `Unanswered → Answered` on the first option selection only;
//!   the score moves by exactly 1 iff the selected index is the correct
//!   one. Advancing is only permitted from `Answered`.
//! * **subjective**: `Unanswered → Revealed` on an explicit reveal; a
//!   self-rating from `Revealed` scores conditionally and advances in the
//!   same step — there is no locked intermediate state.
//!
//! An orthogonal question-bank view can be opened from `Setup`, `Active`,
//! or `Finished`; it is an overlay that never disturbs the main state, so
//! closing it lands exactly where the user left off.
//!
//! `Finished` is terminal: retaking the quiz means building a fresh engine.

use crate::error::CoachError;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Configuration ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizType {
    #[default]
    Mcq,
    Subjective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl QuizDifficulty {
    /// Uppercase label used in generation prompts.
    pub fn label(self) -> &'static str {
        match self {
            QuizDifficulty::Easy => "EASY",
            QuizDifficulty::Medium => "MEDIUM",
            QuizDifficulty::Hard => "HARD",
        }
    }
}

/// Quiz parameters, mutable in `Setup` and frozen once generation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuizConfig {
    pub quiz_type: QuizType,
    pub difficulty: QuizDifficulty,
}

// ── Questions ────────────────────────────────────────────────────────────

/// A generated question. The two variants differ in answer representation
/// and in what triggers scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub id: u32,
    pub question: String,
    /// Why the answer is correct, or the key concepts under review.
    pub explanation: String,
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    Mcq {
        /// Ordered answer options, at least two.
        options: Vec<String>,
        /// Index into `options`.
        correct_answer: usize,
    },
    Subjective {
        /// The ideal answer the learner compares themselves against.
        model_answer: String,
    },
}

// Wire shape of the model's structured output. Field names follow the
// generation schema, which uses camelCase.
#[derive(Deserialize)]
struct RawQuiz {
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Option<u32>,
    #[serde(rename = "type")]
    kind: String,
    question: String,
    explanation: String,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(rename = "correctAnswer", default)]
    correct_answer: Option<usize>,
    #[serde(rename = "modelAnswer", default)]
    model_answer: Option<String>,
}

/// Validate a structured generation payload into typed questions.
///
/// Anything off-shape — wrong question type, missing fields, an option
/// index out of range, an empty set — is a [`CoachError::MalformedGeneration`];
/// the caller surfaces it and returns the engine to `Setup`.
pub fn parse_generated(
    value: &serde_json::Value,
    expected: QuizType,
) -> Result<Vec<QuizQuestion>, CoachError> {
    let raw: RawQuiz =
        serde_json::from_value(value.clone()).map_err(|e| CoachError::MalformedGeneration {
            detail: format!("quiz payload does not match schema: {e}"),
        })?;

    if raw.questions.is_empty() {
        return Err(CoachError::MalformedGeneration {
            detail: "question set is empty".into(),
        });
    }

    let mut questions = Vec::with_capacity(raw.questions.len());
    for (i, q) in raw.questions.into_iter().enumerate() {
        let ordinal = i + 1;
        let kind = match (expected, q.kind.as_str()) {
            (QuizType::Mcq, "mcq") => {
                let options = q.options.ok_or_else(|| CoachError::MalformedGeneration {
                    detail: format!("question {ordinal}: mcq without options"),
                })?;
                if options.len() < 2 {
                    return Err(CoachError::MalformedGeneration {
                        detail: format!("question {ordinal}: fewer than 2 options"),
                    });
                }
                let correct_answer =
                    q.correct_answer
                        .ok_or_else(|| CoachError::MalformedGeneration {
                            detail: format!("question {ordinal}: missing correctAnswer"),
                        })?;
                if correct_answer >= options.len() {
                    return Err(CoachError::MalformedGeneration {
                        detail: format!(
                            "question {ordinal}: correctAnswer {correct_answer} out of range for {} options",
                            options.len()
                        ),
                    });
                }
                QuestionKind::Mcq {
                    options,
                    correct_answer,
                }
            }
            (QuizType::Subjective, "subjective") => {
                let model_answer =
                    q.model_answer
                        .ok_or_else(|| CoachError::MalformedGeneration {
                            detail: format!("question {ordinal}: missing modelAnswer"),
                        })?;
                QuestionKind::Subjective { model_answer }
            }
            (_, other) => {
                return Err(CoachError::MalformedGeneration {
                    detail: format!("question {ordinal}: unexpected type '{other}'"),
                })
            }
        };

        questions.push(QuizQuestion {
            id: q.id.unwrap_or(ordinal as u32),
            question: q.question,
            explanation: q.explanation,
            kind,
        });
    }

    Ok(questions)
}

// ── Execution state machine ──────────────────────────────────────────────

/// Sub-state of the question under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionPhase {
    Unanswered,
    /// An mcq option was selected; the question is locked.
    Answered { selected: usize },
    /// The subjective model answer is showing, awaiting self-rating.
    Revealed,
}

/// A quiz in progress. Runtime-only — never persisted.
#[derive(Debug)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    current_index: usize,
    score: usize,
    phase: QuestionPhase,
}

impl QuizSession {
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> &QuizQuestion {
        &self.questions[self.current_index]
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn phase(&self) -> QuestionPhase {
        self.phase
    }
}

#[derive(Debug)]
pub enum EngineState {
    Setup,
    Generating,
    Active(QuizSession),
    Finished { score: usize, total: usize },
}

/// Configuration → generation → execution → scoring.
#[derive(Debug)]
pub struct QuizEngine {
    config: QuizConfig,
    state: EngineState,
    bank_view: Option<String>,
}

impl Default for QuizEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizEngine {
    pub fn new() -> Self {
        Self {
            config: QuizConfig::default(),
            state: EngineState::Setup,
            bank_view: None,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn config(&self) -> QuizConfig {
        self.config
    }

    /// Update the configuration. Only permitted in `Setup`; the config is
    /// immutable once a quiz session has started.
    pub fn set_config(&mut self, config: QuizConfig) -> bool {
        if matches!(self.state, EngineState::Setup) {
            self.config = config;
            true
        } else {
            false
        }
    }

    /// `Setup → Generating`. Returns the frozen config for the
    /// sampled-subset generation request, or `None` when not in `Setup`.
    pub fn begin_generation(&mut self) -> Option<QuizConfig> {
        if matches!(self.state, EngineState::Setup) {
            self.state = EngineState::Generating;
            Some(self.config)
        } else {
            None
        }
    }

    /// `Generating → Active` with a validated, non-empty question set.
    ///
    /// Returns `false` (and falls back to `Setup`) if the set is empty or
    /// the engine was not generating.
    pub fn deliver_questions(&mut self, questions: Vec<QuizQuestion>) -> bool {
        if !matches!(self.state, EngineState::Generating) || questions.is_empty() {
            self.state = EngineState::Setup;
            return false;
        }
        debug!("Quiz active: {} questions", questions.len());
        self.state = EngineState::Active(QuizSession {
            questions,
            current_index: 0,
            score: 0,
            phase: QuestionPhase::Unanswered,
        });
        true
    }

    /// `Generating → Setup` after a failed or malformed generation.
    pub fn generation_failed(&mut self) {
        if matches!(self.state, EngineState::Generating) {
            self.state = EngineState::Setup;
        }
    }

    /// Select an mcq option. Only the first selection on a question
    /// counts; everything after it (and out-of-range indices) is ignored.
    pub fn select_option(&mut self, index: usize) -> bool {
        let EngineState::Active(session) = &mut self.state else {
            return false;
        };
        if session.phase != QuestionPhase::Unanswered {
            return false;
        }
        let (option_count, correct_answer) = match &session.current_question().kind {
            QuestionKind::Mcq {
                options,
                correct_answer,
            } => (options.len(), *correct_answer),
            QuestionKind::Subjective { .. } => return false,
        };
        if index >= option_count {
            return false;
        }

        let correct = index == correct_answer;
        session.phase = QuestionPhase::Answered { selected: index };
        if correct {
            session.score += 1;
        }
        true
    }

    /// Reveal the model answer of a subjective question.
    pub fn reveal_answer(&mut self) -> bool {
        let EngineState::Active(session) = &mut self.state else {
            return false;
        };
        if session.phase != QuestionPhase::Unanswered {
            return false;
        }
        if !matches!(session.current_question().kind, QuestionKind::Subjective { .. }) {
            return false;
        }
        session.phase = QuestionPhase::Revealed;
        true
    }

    /// Self-rate a revealed subjective answer; scores conditionally and
    /// advances in the same step.
    pub fn rate_self(&mut self, correct: bool) -> bool {
        let EngineState::Active(session) = &mut self.state else {
            return false;
        };
        if session.phase != QuestionPhase::Revealed {
            return false;
        }
        if correct {
            session.score += 1;
        }
        self.advance_or_finish();
        true
    }

    /// Advance past an answered mcq question.
    pub fn advance(&mut self) -> bool {
        let EngineState::Active(session) = &self.state else {
            return false;
        };
        if !matches!(session.phase, QuestionPhase::Answered { .. }) {
            return false;
        }
        self.advance_or_finish();
        true
    }

    /// Final result, once `Finished`: `(score, total)`.
    pub fn result(&self) -> Option<(usize, usize)> {
        match self.state {
            EngineState::Finished { score, total } => Some((score, total)),
            _ => None,
        }
    }

    // ── Question-bank overlay ────────────────────────────────────────────

    /// Show the question-bank view over the current state.
    pub fn open_question_bank(&mut self, bank: String) {
        self.bank_view = Some(bank);
    }

    /// Dismiss the bank view, landing back in the state it covered.
    pub fn close_question_bank(&mut self) {
        self.bank_view = None;
    }

    pub fn question_bank(&self) -> Option<&str> {
        self.bank_view.as_deref()
    }

    fn advance_or_finish(&mut self) {
        let EngineState::Active(session) = &mut self.state else {
            return;
        };
        if session.current_index + 1 < session.questions.len() {
            session.current_index += 1;
            session.phase = QuestionPhase::Unanswered;
        } else {
            let score = session.score;
            let total = session.questions.len();
            debug!("Quiz finished: {score}/{total}");
            self.state = EngineState::Finished { score, total };
        }
    }
}
