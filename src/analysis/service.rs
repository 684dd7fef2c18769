//! The analysis service contract.
//!
//! The generative model is an external collaborator; this crate only knows
//! the shape of a request and a response. Implementations adapt whatever
//! API they talk to (Gemini, OpenAI, a local model, a test double) and are
//! injected as `Arc<dyn AnalysisService>`.
//!
//! Requests are independent and stateless — no conversation state lives on
//! the service side, which is what makes the orchestrator a pure
//! translation layer.

use crate::deck::SlideImage;
use crate::error::CoachError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which model class serves the request.
///
/// Exactly two tiers are user-selectable; the choice is a process-wide
/// preference applied to every subsequent request until changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Fast analysis and standard explanations (default).
    #[default]
    Fast,
    /// Deep reasoning for complex math/science.
    Deep,
}

/// One element of a multi-part request body, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPart {
    Text(String),
    Image(SlideImage),
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Ordered body: interleaved text tags, images, and the instruction.
    pub parts: Vec<RequestPart>,
    pub system_instruction: String,
    pub temperature: f32,
    pub tier: ModelTier,
    /// When present, the service must return structured data matching
    /// this JSON schema instead of free text.
    pub output_schema: Option<serde_json::Value>,
}

/// What came back.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResponse {
    pub text: String,
    /// Populated when the request carried an `output_schema`.
    pub structured: Option<serde_json::Value>,
}

/// The external generative-model collaborator.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn generate(&self, request: AnalysisRequest) -> Result<AnalysisResponse, CoachError>;
}

impl AnalysisRequest {
    /// How many images the request carries (payload-limit bookkeeping).
    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, RequestPart::Image(_)))
            .count()
    }
}
