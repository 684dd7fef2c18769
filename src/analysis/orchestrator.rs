//! The orchestrator: one method per user-facing analysis operation.
//!
//! A pure translation layer between slides and the analysis service — it
//! does not retry, cache, or rate-limit. The one scheduling rule it owns
//! is that full-deck summarization drives its batches **sequentially**:
//! one outbound request at a time, trading latency for predictable load on
//! the service. Callers wanting progress can use the streaming variant,
//! which yields each batch summary as it completes without changing that
//! rule.

use crate::analysis::requests::{
    batches, quiz_output_schema, sample_indices, tagged_slide_parts, BATCH_SIZE, SAMPLE_TARGET,
};
use crate::analysis::service::{
    AnalysisRequest, AnalysisResponse, AnalysisService, ModelTier, RequestPart,
};
use crate::deck::Slide;
use crate::error::CoachError;
use crate::prompts;
use crate::quiz::{self, QuizConfig, QuizQuestion};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio_stream::Stream;
use tracing::{debug, info};

/// A boxed stream of per-batch summary results.
pub type BatchSummaryStream = Pin<Box<dyn Stream<Item = Result<String, CoachError>> + Send>>;

pub struct AnalysisOrchestrator {
    service: Arc<dyn AnalysisService>,
    /// Process-wide tier preference, applied to every request until changed.
    tier: Mutex<ModelTier>,
}

impl AnalysisOrchestrator {
    pub fn new(service: Arc<dyn AnalysisService>) -> Self {
        Self {
            service,
            tier: Mutex::new(ModelTier::default()),
        }
    }

    pub fn set_tier(&self, tier: ModelTier) {
        *self.tier.lock().expect("tier lock poisoned") = tier;
    }

    pub fn tier(&self) -> ModelTier {
        *self.tier.lock().expect("tier lock poisoned")
    }

    // ── Single-slide requests ────────────────────────────────────────────

    /// Explain one slide (or answer a free-text question about it).
    ///
    /// `instruction = None` uses the default analyze-or-solve instruction;
    /// chat passes the user's message through verbatim.
    pub async fn explain_slide(
        &self,
        slide: &Slide,
        instruction: Option<&str>,
    ) -> Result<String, CoachError> {
        let instruction = instruction.unwrap_or(prompts::DEFAULT_EXPLAIN_INSTRUCTION);
        let request = AnalysisRequest {
            parts: vec![
                RequestPart::Image(slide.image.clone()),
                RequestPart::Text(instruction.to_string()),
            ],
            system_instruction: prompts::EXPLAIN_SYSTEM_PROMPT.to_string(),
            temperature: prompts::EXPLAIN_TEMPERATURE,
            tier: self.tier(),
            output_schema: None,
        };

        let response = self.service.generate(request).await?;
        Ok(response.text)
    }

    /// The 3-4 most important points of one slide.
    pub async fn slide_takeaways(&self, slide: &Slide) -> Result<String, CoachError> {
        let request = AnalysisRequest {
            parts: vec![
                RequestPart::Image(slide.image.clone()),
                RequestPart::Text(prompts::TAKEAWAYS_INSTRUCTION.to_string()),
            ],
            system_instruction: prompts::TAKEAWAYS_SYSTEM_PROMPT.to_string(),
            temperature: prompts::TAKEAWAYS_TEMPERATURE,
            tier: self.tier(),
            output_schema: None,
        };

        let response = self.service.generate(request).await?;
        Ok(response.text)
    }

    // ── Full-deck batched summarization ──────────────────────────────────

    /// Summarize the whole deck into one study guide.
    ///
    /// The deck is partitioned into batches of [`BATCH_SIZE`], each batch
    /// producing one highlight per slide; batch results are concatenated
    /// in order under a single heading.
    pub async fn summarize_deck(&self, slides: &[Slide]) -> Result<String, CoachError> {
        if slides.is_empty() {
            return Err(CoachError::EmptyDeck);
        }
        info!(
            "Summarizing deck: {} slides in {} batches",
            slides.len(),
            slides.len().div_ceil(BATCH_SIZE)
        );

        let mut document = String::from(prompts::DECK_SUMMARY_HEADER);
        for (batch_no, batch) in batches(slides).enumerate() {
            let offset = batch_no * BATCH_SIZE;
            let request = self.batch_request(offset, batch);
            debug!("Batch {}: {} slides", batch_no + 1, batch.len());

            let response = self.service.generate(request).await?;
            document.push_str(&response.text);
            document.push_str(prompts::BATCH_SEPARATOR);
        }

        Ok(document)
    }

    /// Streaming variant of [`summarize_deck`](Self::summarize_deck):
    /// yields each batch summary as it completes. Batches are still
    /// processed strictly one at a time, in deck order.
    pub fn summarize_deck_stream(
        &self,
        slides: &[Slide],
    ) -> Result<BatchSummaryStream, CoachError> {
        if slides.is_empty() {
            return Err(CoachError::EmptyDeck);
        }

        // Requests are built (and the tier captured) eagerly; only the
        // service calls are deferred to the stream.
        let requests: Vec<AnalysisRequest> = batches(slides)
            .enumerate()
            .map(|(batch_no, batch)| self.batch_request(batch_no * BATCH_SIZE, batch))
            .collect();

        let service = Arc::clone(&self.service);
        let s = stream::iter(requests).then(move |request| {
            let service = Arc::clone(&service);
            async move {
                let response = service.generate(request).await?;
                Ok(response.text)
            }
        });

        Ok(Box::pin(s))
    }

    fn batch_request(&self, offset: usize, batch: &[Slide]) -> AnalysisRequest {
        let mut parts = tagged_slide_parts(
            batch.iter().enumerate().map(|(i, s)| (offset + i, s)),
        );
        parts.push(RequestPart::Text(
            prompts::BATCH_SUMMARY_INSTRUCTION.to_string(),
        ));

        AnalysisRequest {
            parts,
            system_instruction: prompts::BATCH_SUMMARY_SYSTEM_PROMPT.to_string(),
            temperature: prompts::BATCH_SUMMARY_TEMPERATURE,
            tier: self.tier(),
            output_schema: None,
        }
    }

    // ── Sampled-subset requests ──────────────────────────────────────────

    /// Generate a quiz from an evenly-spread sample of the deck.
    pub async fn generate_quiz(
        &self,
        slides: &[Slide],
        config: &QuizConfig,
    ) -> Result<Vec<QuizQuestion>, CoachError> {
        if slides.is_empty() {
            return Err(CoachError::EmptyDeck);
        }

        let mut parts = self.sampled_parts(slides);
        parts.push(RequestPart::Text(prompts::quiz_instruction(config)));

        let request = AnalysisRequest {
            parts,
            system_instruction: prompts::quiz_system_instruction(config),
            temperature: prompts::QUIZ_TEMPERATURE,
            tier: self.tier(),
            output_schema: Some(quiz_output_schema(config.quiz_type)),
        };

        let response = self.service.generate(request).await?;
        let payload = structured_payload(&response)?;
        quiz::parse_generated(&payload, config.quiz_type)
    }

    /// Generate the three-section markdown question bank from the same
    /// evenly-spread sample.
    pub async fn generate_question_bank(&self, slides: &[Slide]) -> Result<String, CoachError> {
        if slides.is_empty() {
            return Err(CoachError::EmptyDeck);
        }

        let mut parts = self.sampled_parts(slides);
        parts.push(RequestPart::Text(
            prompts::QUESTION_BANK_INSTRUCTION.to_string(),
        ));

        let request = AnalysisRequest {
            parts,
            system_instruction: prompts::QUESTION_BANK_SYSTEM_PROMPT.to_string(),
            temperature: prompts::QUESTION_BANK_TEMPERATURE,
            tier: self.tier(),
            output_schema: None,
        };

        let response = self.service.generate(request).await?;
        Ok(response.text)
    }

    fn sampled_parts(&self, slides: &[Slide]) -> Vec<RequestPart> {
        let indices = sample_indices(slides.len(), SAMPLE_TARGET);
        debug!(
            "Sampled {} of {} slides for generation",
            indices.len(),
            slides.len()
        );
        tagged_slide_parts(indices.into_iter().map(|i| (i, &slides[i])))
    }
}

/// Structured payload of a schema-bearing response, falling back to
/// parsing the text body as JSON when the service inlines it there.
fn structured_payload(response: &AnalysisResponse) -> Result<serde_json::Value, CoachError> {
    if let Some(value) = &response.structured {
        return Ok(value.clone());
    }
    serde_json::from_str(&response.text).map_err(|e| CoachError::MalformedGeneration {
        detail: format!("response is not valid JSON: {e}"),
    })
}
