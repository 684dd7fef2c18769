//! Integration tests driving the full session facade with scripted
//! collaborators: a canned-response analysis service, a fixed-page
//! rasterizer, and the in-memory snapshot store.
//!
//! No network, no model, no disk — everything here is deterministic,
//! including the autosave timing tests, which run under tokio's paused
//! clock.

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use serde_json::json;
use slidecoach::{
    AnalysisRequest, AnalysisResponse, AnalysisService, CoachError, EngineState,
    MemorySnapshotStore, QuizConfig, QuizDifficulty, QuizType, RasterizeError, Rasterizer, Role,
    SourceFile, StudySession, AUTOSAVE_QUIET_PERIOD,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ── Collaborator doubles ─────────────────────────────────────────────────

/// Replays canned responses in order; can hold the first N calls open
/// until released, to create deliberate request overlap.
struct MockService {
    responses: Mutex<VecDeque<Result<AnalysisResponse, CoachError>>>,
    hold_next: AtomicUsize,
    started: Notify,
    release: Notify,
}

impl MockService {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            hold_next: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        })
    }

    fn push_text(&self, text: &str) {
        self.responses.lock().unwrap().push_back(Ok(AnalysisResponse {
            text: text.to_string(),
            structured: None,
        }));
    }

    fn push_structured(&self, value: serde_json::Value) {
        self.responses.lock().unwrap().push_back(Ok(AnalysisResponse {
            text: String::new(),
            structured: Some(value),
        }));
    }

    fn push_failure(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(CoachError::AnalysisFailed {
                message: message.to_string(),
            }));
    }

    /// Make the next call block until [`release`](Self::release) fires.
    fn hold_next_call(&self) {
        self.hold_next.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnalysisService for MockService {
    async fn generate(&self, _request: AnalysisRequest) -> Result<AnalysisResponse, CoachError> {
        self.started.notify_one();
        if self
            .hold_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            self.release.notified().await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(CoachError::AnalysisFailed {
                    message: "script exhausted".into(),
                })
            })
    }
}

/// Rasterizes any PDF into a fixed number of tiny pages.
struct FixedPages(usize);

#[async_trait]
impl Rasterizer for FixedPages {
    async fn rasterize(
        &self,
        _bytes: &[u8],
        _scale: f32,
    ) -> Result<Vec<DynamicImage>, RasterizeError> {
        Ok((0..self.0)
            .map(|_| DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]))))
            .collect())
    }
}

fn session_with(service: Arc<MockService>) -> (Arc<StudySession>, Arc<MemorySnapshotStore>) {
    let store = Arc::new(MemorySnapshotStore::new());
    let session = Arc::new(StudySession::new(service, store.clone()));
    (session, store)
}

async fn load_deck(session: &StudySession, images: usize, pdf_pages: usize) {
    let mut files: Vec<SourceFile> = (0..images)
        .map(|i| SourceFile::image(format!("img{i}.png"), "image/png", vec![i as u8]))
        .collect();
    if pdf_pages > 0 {
        files.push(SourceFile::pdf("deck.pdf", vec![0]));
    }
    session
        .add_files(files, &FixedPages(pdf_pages))
        .await
        .expect("ingestion should succeed");
}

fn five_mcq_payload() -> serde_json::Value {
    json!({
        "questions": (1..=5).map(|i| json!({
            "id": i,
            "type": "mcq",
            "question": format!("question {i}"),
            "explanation": format!("explanation {i}"),
            "options": ["a", "b", "c", "d"],
            "correctAnswer": (i - 1) % 4
        })).collect::<Vec<_>>()
    })
}

// ── Ingestion ────────────────────────────────────────────────────────────

#[tokio::test]
async fn deck_grows_by_images_plus_pdf_pages_in_order() {
    let service = MockService::new();
    let (session, _store) = session_with(service);

    load_deck(&session, 2, 3).await;
    assert_eq!(session.slide_count(), 5);

    // A second upload appends after the existing deck.
    load_deck(&session, 1, 0).await;
    assert_eq!(session.slide_count(), 6);
}

#[tokio::test]
async fn failed_batch_leaves_loaded_slides_untouched() {
    struct Broken;
    #[async_trait]
    impl Rasterizer for Broken {
        async fn rasterize(
            &self,
            _bytes: &[u8],
            _scale: f32,
        ) -> Result<Vec<DynamicImage>, RasterizeError> {
            Err(RasterizeError("encrypted".into()))
        }
    }

    let service = MockService::new();
    let (session, _store) = session_with(service);
    load_deck(&session, 2, 0).await;

    let err = session
        .add_files(vec![SourceFile::pdf("bad.pdf", vec![0])], &Broken)
        .await
        .unwrap_err();
    assert!(matches!(err, CoachError::Rasterization { .. }));
    assert_eq!(session.slide_count(), 2);
}

// ── Single-slide analysis & the chat gate ────────────────────────────────

#[tokio::test]
async fn explanation_is_cached_on_the_slide() {
    let service = MockService::new();
    service.push_text("it means X");
    let (session, _store) = session_with(service);
    load_deck(&session, 2, 0).await;
    session.navigate(1);

    let text = session.explain_current().await.unwrap();
    assert_eq!(text, "it means X");
    assert_eq!(session.explanation_at(1).as_deref(), Some("it means X"));
    assert_eq!(session.explanation_at(0), None);
}

#[tokio::test]
async fn late_response_attaches_to_the_slide_captured_at_issue_time() {
    let service = MockService::new();
    service.push_text("about slide zero");
    service.hold_next_call();
    let (session, _store) = session_with(service.clone());
    load_deck(&session, 3, 0).await;

    let worker = {
        let session = session.clone();
        tokio::spawn(async move { session.explain_current().await })
    };
    service.started.notified().await;

    // Navigate away while the request is still in flight.
    assert!(session.navigate(2));
    service.release.notify_one();
    worker.await.unwrap().unwrap();

    assert_eq!(
        session.explanation_at(0).as_deref(),
        Some("about slide zero"),
        "response lands on the slide that was current at issue time"
    );
    assert_eq!(session.explanation_at(2), None);
    assert_eq!(session.active_index(), 2);
}

#[tokio::test]
async fn second_chat_request_is_rejected_not_queued() {
    let service = MockService::new();
    service.push_text("slow answer");
    service.push_text("second answer");
    service.hold_next_call();
    let (session, _store) = session_with(service.clone());
    load_deck(&session, 1, 0).await;

    let worker = {
        let session = session.clone();
        tokio::spawn(async move { session.explain_current().await })
    };
    service.started.notified().await;

    assert!(matches!(
        session.send_chat("am I blocked?").await,
        Err(CoachError::Busy)
    ));
    assert!(matches!(
        session.summarize_deck().await,
        Err(CoachError::Busy)
    ));

    service.release.notify_one();
    worker.await.unwrap().unwrap();

    // The gate reopened once the in-flight request settled.
    assert!(session.send_chat("now?").await.is_ok());
}

#[tokio::test]
async fn chat_failure_posts_a_system_bubble_and_keeps_the_session_usable() {
    let service = MockService::new();
    service.push_failure("model unreachable");
    service.push_text("recovered");
    let (session, _store) = session_with(service);
    load_deck(&session, 1, 0).await;

    let err = session.send_chat("hello?").await.unwrap_err();
    assert!(matches!(err, CoachError::AnalysisFailed { .. }));

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::System);

    // Explicit re-trigger works; nothing was corrupted.
    let answer = session.send_chat("hello again").await.unwrap();
    assert_eq!(answer, "recovered");
    assert_eq!(session.messages().len(), 4);
}

// ── Full-deck summary ────────────────────────────────────────────────────

#[tokio::test]
async fn deck_summary_posts_request_and_result_into_chat() {
    let service = MockService::new();
    // 6 slides → batches of 4 and 2.
    service.push_text("* **Slide 1**: alpha");
    service.push_text("* **Slide 5**: beta");
    let (session, _store) = session_with(service);
    load_deck(&session, 6, 0).await;

    let document = session.summarize_deck().await.unwrap();
    assert!(document.contains("alpha"));
    assert!(document.contains("beta"));

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Model);
    assert_eq!(messages[1].content, document);
}

#[tokio::test]
async fn deck_summary_failure_posts_error_bubble() {
    let service = MockService::new();
    service.push_text("first batch ok");
    service.push_failure("quota exceeded");
    let (session, _store) = session_with(service);
    load_deck(&session, 8, 0).await;

    assert!(session.summarize_deck().await.is_err());

    let messages = session.messages();
    assert_eq!(messages[1].role, Role::System);
    assert!(messages[1].content.contains("Could not complete"));
}

// ── Quiz ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn quiz_runs_from_setup_to_finished_with_bounded_score() {
    let service = MockService::new();
    service.push_structured(five_mcq_payload());
    let (session, _store) = session_with(service);
    load_deck(&session, 23, 0).await;

    assert!(session.quiz().set_config(QuizConfig {
        quiz_type: QuizType::Mcq,
        difficulty: QuizDifficulty::Hard,
    }));
    session.start_quiz().await.unwrap();

    {
        let quiz = session.quiz();
        let EngineState::Active(active) = quiz.state() else {
            panic!("expected Active after delivery");
        };
        assert_eq!(active.questions().len(), 5);
        assert_eq!(active.current_index(), 0);
        assert_eq!(active.score(), 0);
    }

    // Correct answers are 0,1,2,3,0; answer the first three correctly,
    // the last two wrong. Finished arrives after exactly 5 advances.
    let picks = [0usize, 1, 2, 0, 3];
    for (i, pick) in picks.iter().enumerate() {
        let mut quiz = session.quiz();
        assert!(quiz.select_option(*pick));
        assert!(quiz.advance(), "advance {i} must be accepted");
    }

    let quiz = session.quiz();
    let (score, total) = quiz.result().expect("finished");
    assert_eq!(total, 5);
    assert_eq!(score, 3);
}

#[tokio::test]
async fn malformed_quiz_returns_to_setup_with_an_error() {
    let service = MockService::new();
    service.push_structured(json!({ "questions": [] }));
    let (session, _store) = session_with(service);
    load_deck(&session, 3, 0).await;

    let err = session.start_quiz().await.unwrap_err();
    assert!(matches!(err, CoachError::MalformedGeneration { .. }));
    assert!(matches!(*session.quiz().state(), EngineState::Setup));

    // Config is editable again — back in Setup for an explicit re-trigger.
    assert!(session.quiz().set_config(QuizConfig::default()));
}

#[tokio::test]
async fn quiz_and_question_bank_run_while_a_chat_request_is_in_flight() {
    let service = MockService::new();
    service.hold_next_call();
    let (session, _store) = session_with(service.clone());
    load_deck(&session, 4, 0).await;

    let worker = {
        let session = session.clone();
        tokio::spawn(async move { session.send_chat("slow question").await })
    };
    service.started.notified().await;

    // Independent gates: both generation paths proceed while chat holds
    // its own gate. Responses queue in completion order — the held chat
    // call pops only after release.
    service.push_structured(five_mcq_payload());
    session.start_quiz().await.unwrap();

    service.push_text("**Q:** what?\n> **A:** that.");
    let bank = session.generate_question_bank().await.unwrap();
    assert!(bank.contains("**Q:**"));
    assert_eq!(session.quiz().question_bank(), Some(bank.as_str()));

    service.push_text("held chat answer");
    service.release.notify_one();
    worker.await.unwrap().unwrap();
}

// ── Persistence lifecycle ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn burst_of_mutations_persists_exactly_once_after_quiet_period() {
    let service = MockService::new();
    let (session, store) = session_with(service);

    load_deck(&session, 3, 0).await;
    session.navigate(1);
    session.navigate(2);
    load_deck(&session, 1, 0).await;
    session.navigate(0);

    assert_eq!(store.save_count(), 0, "nothing persists inside the burst");

    tokio::time::advance(AUTOSAVE_QUIET_PERIOD).await;
    tokio::task::yield_now().await;

    assert_eq!(store.save_count(), 1, "one write for the whole burst");
    let snapshot = store.load().await.unwrap();
    assert_eq!(snapshot.slides.len(), 4);
    assert_eq!(snapshot.last_active_index, 0);
}

#[tokio::test(start_paused = true)]
async fn resume_restores_slides_messages_and_cursor() {
    let service = MockService::new();
    service.push_text("an answer");
    let (session, store) = session_with(service.clone());

    load_deck(&session, 3, 0).await;
    session.navigate(2);
    session.send_chat("a question").await.unwrap();

    tokio::time::advance(AUTOSAVE_QUIET_PERIOD).await;
    tokio::task::yield_now().await;
    assert_eq!(store.save_count(), 1);

    // A fresh session over the same store picks the session back up.
    let revived = StudySession::new(service, store);
    assert!(revived.resume().await);
    assert_eq!(revived.slide_count(), 3);
    assert_eq!(revived.active_index(), 2);
    assert_eq!(revived.messages().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn clear_then_resume_yields_no_session() {
    let service = MockService::new();
    let (session, store) = session_with(service);

    load_deck(&session, 2, 0).await;
    // Clear while a debounced save is still pending: the pending write
    // must not resurrect the cleared workspace.
    session.clear().await.unwrap();

    tokio::time::advance(AUTOSAVE_QUIET_PERIOD).await;
    tokio::task::yield_now().await;

    assert_eq!(store.save_count(), 0);
    assert_eq!(session.slide_count(), 0);
    assert!(session.messages().is_empty());
    assert!(!session.resume().await, "clear-then-resume is no session");
}

#[tokio::test]
async fn resume_with_empty_store_is_a_normal_no_session() {
    let service = MockService::new();
    let (session, _store) = session_with(service);
    assert!(!session.resume().await);
    assert_eq!(session.slide_count(), 0);
}
