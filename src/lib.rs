//! # slidecoach
//!
//! Turn an uploaded document (images or a PDF) into a navigable slide
//! deck, ask a generative model about individual slides, request
//! whole-deck study guides, and take a generated self-test.
//!
//! This crate is the orchestration core only: the data model and its
//! persistence lifecycle, the batching/sampling algorithms that keep
//! requests within payload limits for arbitrarily large decks, and the
//! quiz state machine with its scoring rules. Rendering, markdown
//! styling, and the generative model itself live outside, behind two
//! small traits.
//!
//! ## Pipeline Overview
//!
//! ```text
//! uploads
//!  │
//!  ├─ 1. Ingest     images pass through; PDFs → Rasterizer → JPEG pages
//!  ├─ 2. Deck       ordered slide store + chat log (Workspace aggregate)
//!  ├─ 3. Analyze    single-slide / batched / sampled requests → AnalysisService
//!  ├─ 4. Quiz       config → generation → execution state machine → score
//!  └─ 5. Persist    debounced single-slot snapshot (resume / clear)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slidecoach::{FileSnapshotStore, SourceFile, StudySession};
//! use std::sync::Arc;
//!
//! # fn collaborators() -> (std::sync::Arc<dyn slidecoach::AnalysisService>, std::sync::Arc<dyn slidecoach::Rasterizer>) { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bring your own model client and page renderer.
//!     let (service, rasterizer) = collaborators();
//!     let store = Arc::new(FileSnapshotStore::new("workspace.json"));
//!     let session = StudySession::new(service, store);
//!
//!     if !session.resume().await {
//!         let pdf = std::fs::read("lecture.pdf")?;
//!         session
//!             .add_files(vec![SourceFile::pdf("lecture.pdf", pdf)], rasterizer.as_ref())
//!             .await?;
//!     }
//!
//!     let explanation = session.explain_current().await?;
//!     println!("{explanation}");
//!     Ok(())
//! }
//! ```
//!
//! ## Collaborators
//!
//! | Trait | Responsibility |
//! |-------|----------------|
//! | [`AnalysisService`] | one generation request in, text or structured data out |
//! | [`Rasterizer`] | one PDF in, ordered page images out at a given scale |
//! | [`SnapshotStore`] | the single persisted workspace slot |
//!
//! All three are object-safe and injected as `Arc<dyn …>`; the crate
//! ships [`FileSnapshotStore`] and [`MemorySnapshotStore`], the other two
//! are always yours.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod deck;
pub mod error;
pub mod ingest;
pub mod persist;
pub mod prompts;
pub mod quiz;
pub mod session;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::orchestrator::{AnalysisOrchestrator, BatchSummaryStream};
pub use analysis::requests::{BATCH_SIZE, SAMPLE_TARGET};
pub use analysis::service::{
    AnalysisRequest, AnalysisResponse, AnalysisService, ModelTier, RequestPart,
};
pub use deck::{Message, Role, Slide, SlideImage, SlideStore};
pub use error::CoachError;
pub use ingest::{Rasterizer, RasterizeError, SourceFile, JPEG_QUALITY, RENDER_SCALE};
pub use persist::{
    Autosaver, ChangeEvent, FileSnapshotStore, MemorySnapshotStore, SnapshotStore,
    WorkspaceSnapshot, AUTOSAVE_QUIET_PERIOD,
};
pub use quiz::{
    EngineState, QuestionKind, QuestionPhase, QuizConfig, QuizDifficulty, QuizEngine,
    QuizQuestion, QuizSession, QuizType,
};
pub use session::StudySession;
pub use workspace::Workspace;
