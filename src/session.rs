//! The study session facade: wiring, concurrency gates, and lifecycle.
//!
//! One [`StudySession`] owns the workspace aggregate, the analysis
//! orchestrator, the quiz engine, and the autosaver. Callers (a UI layer,
//! tests) drive everything through its command API.
//!
//! ## Concurrency gates
//!
//! Two independent gates instead of one global lock:
//!
//! 1. The **chat gate** covers every operation that talks to the service
//!    about the deck's content on the user's behalf — quick explain,
//!    takeaways, chat, and the full-deck summary. At most one is in
//!    flight; a second attempt is *rejected* with [`CoachError::Busy`],
//!    never queued.
//! 2. Quiz generation and question-bank generation each carry their own
//!    in-flight flag, so either can run while the other does.
//!
//! Gates are plain atomic flags released by a drop guard, so every exit
//! path — success, service failure, malformed output — reopens the gate.
//!
//! ## Stale responses
//!
//! There is no cancellation of in-flight requests. An explanation is
//! attached to the slide *captured when the request was issued* (by id,
//! so it can never land on a different slide), even if the user has
//! navigated away by the time the response arrives.

use crate::analysis::orchestrator::AnalysisOrchestrator;
use crate::analysis::service::{AnalysisService, ModelTier};
use crate::deck::{Message, Role, Slide};
use crate::error::CoachError;
use crate::ingest::{ingest_files, Rasterizer, SourceFile};
use crate::persist::{Autosaver, SnapshotStore};
use crate::prompts;
use crate::quiz::QuizEngine;
use crate::workspace::Workspace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::info;

/// Message posted into chat when full-deck analysis fails.
const SUMMARY_ERROR_BUBBLE: &str =
    "Error: Could not complete full document analysis. Please try again later.";

/// Message that triggers (and labels) a full-deck summary in chat.
const SUMMARY_REQUEST_MESSAGE: &str =
    "Generate a comprehensive study guide for the entire document.";

pub struct StudySession {
    workspace: Mutex<Workspace>,
    orchestrator: AnalysisOrchestrator,
    quiz: Mutex<QuizEngine>,
    snapshots: Arc<dyn SnapshotStore>,
    autosaver: Autosaver,
    chat_gate: AtomicBool,
    quiz_gate: AtomicBool,
    bank_gate: AtomicBool,
}

impl StudySession {
    /// Wire up a session over the given collaborators and start the
    /// autosaver.
    pub fn new(service: Arc<dyn AnalysisService>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let autosaver = Autosaver::spawn(Arc::clone(&snapshots), rx);

        Self {
            workspace: Mutex::new(Workspace::new(tx)),
            orchestrator: AnalysisOrchestrator::new(service),
            quiz: Mutex::new(QuizEngine::new()),
            snapshots,
            autosaver,
            chat_gate: AtomicBool::new(false),
            quiz_gate: AtomicBool::new(false),
            bank_gate: AtomicBool::new(false),
        }
    }

    // ── Deck ─────────────────────────────────────────────────────────────

    /// Ingest uploads and append the resulting slides.
    ///
    /// Returns how many slides were added. A failing file fails the whole
    /// batch; slides already in the deck are untouched.
    pub async fn add_files(
        &self,
        files: Vec<SourceFile>,
        rasterizer: &dyn Rasterizer,
    ) -> Result<usize, CoachError> {
        let slides = ingest_files(files, rasterizer).await?;
        let added = slides.len();
        self.workspace().append_slides(slides);
        info!("Added {added} slides");
        Ok(added)
    }

    /// Move the active-slide cursor; out-of-range moves are rejected.
    pub fn navigate(&self, index: usize) -> bool {
        self.workspace().navigate(index)
    }

    pub fn slide_count(&self) -> usize {
        self.workspace().store().len()
    }

    pub fn active_index(&self) -> usize {
        self.workspace().store().active_index()
    }

    /// The cached explanation of the slide at `index`, if any.
    pub fn explanation_at(&self, index: usize) -> Option<String> {
        self.workspace()
            .store()
            .slides()
            .get(index)
            .and_then(|s| s.explanation.clone())
    }

    /// The chat log, in insertion order.
    pub fn messages(&self) -> Vec<Message> {
        self.workspace().messages().to_vec()
    }

    // ── Model tier ───────────────────────────────────────────────────────

    pub fn set_model_tier(&self, tier: ModelTier) {
        self.orchestrator.set_tier(tier);
    }

    pub fn model_tier(&self) -> ModelTier {
        self.orchestrator.tier()
    }

    // ── Single-slide analysis (chat gate) ────────────────────────────────

    /// Quick-explain the active slide; the result is cached on the slide
    /// that was active when the request was issued.
    pub async fn explain_current(&self) -> Result<String, CoachError> {
        let _gate = Gate::acquire(&self.chat_gate)?;
        let slide = self.captured_active_slide()?;

        let explanation = self
            .orchestrator
            .explain_slide(&slide, Some(prompts::QUICK_EXPLAIN_INSTRUCTION))
            .await?;
        self.workspace()
            .attach_explanation(slide.id, explanation.clone());
        Ok(explanation)
    }

    /// Key-point takeaways for the active slide, cached the same way.
    pub async fn summarize_current(&self) -> Result<String, CoachError> {
        let _gate = Gate::acquire(&self.chat_gate)?;
        let slide = self.captured_active_slide()?;

        let summary = self.orchestrator.slide_takeaways(&slide).await?;
        self.workspace().attach_explanation(slide.id, summary.clone());
        Ok(summary)
    }

    /// Ask a free-text question about the active slide.
    ///
    /// The user message is appended before the request; the answer (or a
    /// System error bubble) is appended when it settles.
    pub async fn send_chat(&self, text: &str) -> Result<String, CoachError> {
        let _gate = Gate::acquire(&self.chat_gate)?;
        let slide = self.captured_active_slide()?;

        self.workspace().push_message(Role::User, text);

        match self.orchestrator.explain_slide(&slide, Some(text)).await {
            Ok(answer) => {
                self.workspace().push_message(Role::Model, answer.clone());
                Ok(answer)
            }
            Err(e) => {
                self.workspace()
                    .push_message(Role::System, e.to_string());
                Err(e)
            }
        }
    }

    // ── Full-deck summary (chat gate) ────────────────────────────────────

    /// Produce the whole-deck study guide and post it into chat.
    pub async fn summarize_deck(&self) -> Result<String, CoachError> {
        let _gate = Gate::acquire(&self.chat_gate)?;
        let slides = self.deck_slides();
        if slides.is_empty() {
            return Err(CoachError::EmptyDeck);
        }

        self.workspace()
            .push_message(Role::User, SUMMARY_REQUEST_MESSAGE);

        match self.orchestrator.summarize_deck(&slides).await {
            Ok(document) => {
                self.workspace()
                    .push_message(Role::Model, document.clone());
                Ok(document)
            }
            Err(e) => {
                self.workspace()
                    .push_message(Role::System, SUMMARY_ERROR_BUBBLE);
                Err(e)
            }
        }
    }

    // ── Quiz (own gates) ─────────────────────────────────────────────────

    /// Access the quiz engine for configuration and question-by-question
    /// interaction.
    pub fn quiz(&self) -> MutexGuard<'_, QuizEngine> {
        self.quiz.lock().expect("quiz lock poisoned")
    }

    /// Generate a quiz from the current deck using the engine's config.
    ///
    /// On success the engine is `Active` at question 0; on any failure it
    /// is back in `Setup` with the error returned for display.
    pub async fn start_quiz(&self) -> Result<(), CoachError> {
        let _gate = Gate::acquire(&self.quiz_gate)?;
        let slides = self.deck_slides();
        if slides.is_empty() {
            return Err(CoachError::EmptyDeck);
        }

        let config = self
            .quiz()
            .begin_generation()
            .ok_or_else(|| CoachError::Internal("quiz is not in setup".into()))?;

        match self.orchestrator.generate_quiz(&slides, &config).await {
            Ok(questions) => {
                self.quiz().deliver_questions(questions);
                Ok(())
            }
            Err(e) => {
                self.quiz().generation_failed();
                Err(e)
            }
        }
    }

    /// Generate the standalone question bank and open it as the quiz
    /// overlay. Independent of quiz generation — both may run at once.
    pub async fn generate_question_bank(&self) -> Result<String, CoachError> {
        let _gate = Gate::acquire(&self.bank_gate)?;
        let slides = self.deck_slides();
        if slides.is_empty() {
            return Err(CoachError::EmptyDeck);
        }

        let bank = self.orchestrator.generate_question_bank(&slides).await?;
        self.quiz().open_question_bank(bank.clone());
        Ok(bank)
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Restore the persisted snapshot, if a usable one exists.
    ///
    /// Absent, corrupt, and empty snapshots all mean "no session" — a
    /// normal outcome reported as `false`, never an error.
    pub async fn resume(&self) -> bool {
        match self.snapshots.load().await {
            Some(snapshot) if !snapshot.slides.is_empty() => {
                info!(
                    "Resuming session: {} slides, {} messages",
                    snapshot.slides.len(),
                    snapshot.messages.len()
                );
                self.workspace().restore(snapshot);
                true
            }
            _ => false,
        }
    }

    /// Erase the persisted snapshot and reset the in-memory session.
    ///
    /// Destructive; the confirmation dialog belongs to the UI layer.
    pub async fn clear(&self) -> Result<(), CoachError> {
        // Reset memory first: it discards any pending autosave, so the
        // cleared slot cannot be resurrected by an in-flight timer.
        self.workspace().reset();
        self.snapshots.clear().await?;
        info!("Workspace cleared");
        Ok(())
    }

    /// Drop the change channel and wait for the autosaver to flush.
    pub async fn shutdown(self) {
        drop(self.workspace);
        self.autosaver.join().await;
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn workspace(&self) -> MutexGuard<'_, Workspace> {
        self.workspace.lock().expect("workspace lock poisoned")
    }

    /// Clone of the active slide, captured at request-issue time.
    fn captured_active_slide(&self) -> Result<Slide, CoachError> {
        self.workspace()
            .store()
            .active_slide()
            .cloned()
            .ok_or(CoachError::EmptyDeck)
    }

    fn deck_slides(&self) -> Vec<Slide> {
        self.workspace().store().slides().to_vec()
    }
}

/// Holds an in-flight flag until dropped, reopening the gate on every
/// exit path.
struct Gate<'a>(&'a AtomicBool);

impl<'a> Gate<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, CoachError> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(Gate(flag))
        } else {
            Err(CoachError::Busy)
        }
    }
}

impl Drop for Gate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
