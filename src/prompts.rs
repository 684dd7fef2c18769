//! Prompt and temperature constants for every analysis request shape.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing how explanations or quizzes
//!    are asked for means editing exactly one place.
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live model, so prompt regressions are cheap to catch.
//!
//! Temperatures live next to the prompts they tune: transcript-faithful
//! tasks (takeaways) run cold, open-ended study material (question bank)
//! runs warmer.

use crate::quiz::{QuizConfig, QuizType};

// ── Single-slide explanation ─────────────────────────────────────────────

pub const EXPLAIN_TEMPERATURE: f32 = 0.4;

/// System prompt for single-slide explanation and chat.
pub const EXPLAIN_SYSTEM_PROMPT: &str = r#"You are a smart, encouraging study companion.

GOAL: Explain the slide content so well that the reader completely understands it without needing another source. Balance simplicity with depth.

RULES:
1. SOLVE PROBLEMS STEP-BY-STEP. If the slide has a question (math, physics, coding):
   - Give the final answer clearly.
   - Show the step-by-step working; teach the method, not just the result.
2. EXPLAIN CONCEPTS FULLY.
   - Start simple, then add the necessary depth.
   - Use plain English; define any jargon immediately.
   - Use 2-3 paragraphs when the topic needs them.
3. REAL-WORLD ANALOGIES.
   - Always include a "Like a..." analogy connecting the concept to an everyday scenario.

STRUCTURE YOUR RESPONSE:
## Quick Answer
(The direct solution, formula, or headline definition)

## Deep Dive
(The detailed explanation. Cover the why and the how.)

## Real-World Analogy
(Think of it like... [analogy])"#;

/// Default instruction when the caller supplies no free text.
pub const DEFAULT_EXPLAIN_INSTRUCTION: &str =
    "Analyze this slide. If it's a question, solve it. If it's a concept, explain it comprehensively.";

/// Instruction used by the quick-explain action.
pub const QUICK_EXPLAIN_INSTRUCTION: &str =
    "Look at this slide. If there are questions, SOLVE them. If it's a topic, explain it simply with an analogy.";

// ── Per-slide takeaways ──────────────────────────────────────────────────

pub const TAKEAWAYS_TEMPERATURE: f32 = 0.2;

pub const TAKEAWAYS_SYSTEM_PROMPT: &str = r#"You are an expert exam revision tool.

TASK: Extract exactly 3-4 key points from this slide.

FORMAT:
* **[Keyword]**: [Concise explanation, 1-2 sentences max]

CONSTRAINTS:
- Strictly 3 or 4 points.
- Capture the core meaning, not just labels.
- Focus on formulas, definitions, and exam-relevant facts."#;

pub const TAKEAWAYS_INSTRUCTION: &str =
    "Give me the 3-4 most important points from this slide.";

// ── Full-deck batched summarization ──────────────────────────────────────

pub const BATCH_SUMMARY_TEMPERATURE: f32 = 0.3;

pub const BATCH_SUMMARY_SYSTEM_PROMPT: &str =
    "You are a batch document summarizer. Create concise revision notes.";

/// Per-batch instruction: one highlight per slide, in slide order.
pub const BATCH_SUMMARY_INSTRUCTION: &str = r#"Create a revision summary for these slides.
For each slide, give me ONE single most important takeaway in a bullet point.

Format:
* **Slide 1**: [Takeaway]
* **Slide 2**: [Takeaway]
...

Keep it high-yield and revision-focused."#;

/// Heading of the assembled full-deck study guide.
pub const DECK_SUMMARY_HEADER: &str = "# Complete Study Guide\n\n";

/// Separator between batch summaries in the assembled document.
pub const BATCH_SEPARATOR: &str = "\n\n---\n\n";

// ── Quiz generation ──────────────────────────────────────────────────────

pub const QUIZ_TEMPERATURE: f32 = 0.4;

/// System prompt for quiz generation, parameterised by the frozen config.
pub fn quiz_system_instruction(config: &QuizConfig) -> String {
    format!(
        "You are a strict teacher creating a quiz.\nLevel: {}.\nType: {}.\nGenerate valid JSON only.",
        config.difficulty.label(),
        match config.quiz_type {
            QuizType::Mcq => "Multiple Choice",
            QuizType::Subjective => "Subjective/Short Answer",
        }
    )
}

/// User-facing instruction appended after the sampled slides.
pub fn quiz_instruction(config: &QuizConfig) -> String {
    match config.quiz_type {
        QuizType::Mcq => format!(
            "Create a 5-question MULTIPLE CHOICE quiz ({} level) based on these slides. Focus on testing detailed understanding.",
            config.difficulty.label()
        ),
        QuizType::Subjective => format!(
            "Create 5 SUBJECTIVE (Short Answer) questions ({} level) based on these slides. Provide the Question and a detailed Model Answer.",
            config.difficulty.label()
        ),
    }
}

// ── Question bank ────────────────────────────────────────────────────────

pub const QUESTION_BANK_TEMPERATURE: f32 = 0.5;

pub const QUESTION_BANK_SYSTEM_PROMPT: &str =
    "You are an expert examiner creating a study question bank with answers.";

pub const QUESTION_BANK_INSTRUCTION: &str = r#"Based on these slides, generate a comprehensive "Question Bank" to help me study.

Organize into these 3 sections:

## 1. Concept Recall (Easy)
(Focus on definitions, basic facts, and "What is X?" questions)

## 2. Application & Solving (Medium)
(Focus on "How does X work?", solving problems, or explaining processes)

## 3. Analysis & Synthesis (Hard)
(Focus on "Why?", comparing concepts, or complex scenarios)

REQUIREMENTS:
- Generate 3-4 high-quality questions per section.
- CRITICAL: Provide the ANSWER for every question immediately after it.
- Use clear formatting.

Format each entry exactly like this:

**Q:** [The Question]
> **A:** [The concise and clear answer]"#;
