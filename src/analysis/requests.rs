//! Pure request-shaping: batching, sampling, tagging, and output schemas.
//!
//! Everything here is a deterministic function of the slide sequence —
//! no I/O, no state — which is what makes the payload-limit algorithms
//! directly testable against the documented properties.
//!
//! ## Why batches of 4?
//!
//! A full-deck summarization request bundles several images plus text. At
//! 2×-scale JPEG pages, four images per request stays comfortably below
//! typical multimodal payload limits while amortising per-request
//! overhead. Order is preserved: batch `i` covers slides `4i..4i+4`.
//!
//! ## Why stride sampling?
//!
//! Quiz and question-bank generation want coverage of the *whole* deck,
//! not a prefix. For `N` slides and target `K`, `step = ceil(N / K)` and
//! indices `0, step, 2·step, …` give at most `K` slides spread evenly
//! across the deck regardless of `N`; when `N ≤ K` every slide is used.

use crate::analysis::service::RequestPart;
use crate::deck::Slide;
use crate::quiz::QuizType;
use serde_json::json;

/// Slides per full-deck summarization request.
pub const BATCH_SIZE: usize = 4;

/// Target sample size for quiz and question-bank generation.
pub const SAMPLE_TARGET: usize = 10;

/// Partition the deck into order-preserving batches of [`BATCH_SIZE`].
pub fn batches(slides: &[Slide]) -> impl Iterator<Item = &[Slide]> {
    slides.chunks(BATCH_SIZE)
}

/// Evenly-spread sample of at most `target` indices out of `total`.
///
/// `total` must be non-zero — callers reject empty decks before any
/// request is built.
pub fn sample_indices(total: usize, target: usize) -> Vec<usize> {
    debug_assert!(total > 0, "sampling an empty deck is rejected upstream");
    if total == 0 {
        return Vec::new();
    }
    let step = total.div_ceil(target);
    (0..total).step_by(step).collect()
}

/// Interleave a `[SLIDE n]` tag before each image so the model can refer
/// back to slides by number. `n` is the slide's 1-based deck position,
/// not its position within the batch or sample.
pub fn tagged_slide_parts<'a>(
    slides: impl IntoIterator<Item = (usize, &'a Slide)>,
) -> Vec<RequestPart> {
    let mut parts = Vec::new();
    for (index, slide) in slides {
        parts.push(RequestPart::Text(format!("[SLIDE {}]", index + 1)));
        parts.push(RequestPart::Image(slide.image.clone()));
    }
    parts
}

/// JSON schema the quiz generation response must satisfy.
///
/// The two question variants get different required fields; the service is
/// asked for exactly the variant the config selected, never a mix.
pub fn quiz_output_schema(quiz_type: QuizType) -> serde_json::Value {
    let (variant, extra_properties, required) = match quiz_type {
        QuizType::Mcq => (
            "mcq",
            json!({
                "options": { "type": "array", "items": { "type": "string" } },
                "correctAnswer": { "type": "integer", "description": "Index into options" }
            }),
            json!(["id", "type", "question", "options", "correctAnswer", "explanation"]),
        ),
        QuizType::Subjective => (
            "subjective",
            json!({
                "modelAnswer": {
                    "type": "string",
                    "description": "The ideal answer expected from the student"
                }
            }),
            json!(["id", "type", "question", "modelAnswer", "explanation"]),
        ),
    };

    let mut properties = json!({
        "id": { "type": "integer" },
        "type": { "type": "string", "enum": [variant] },
        "question": { "type": "string" },
        "explanation": { "type": "string", "description": "Detailed explanation or concept review" }
    });
    properties
        .as_object_mut()
        .expect("properties is an object")
        .extend(
            extra_properties
                .as_object()
                .expect("extra properties is an object")
                .clone(),
        );

    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": properties,
                    "required": required
                }
            }
        },
        "required": ["questions"]
    })
}
