//! Error types for the slidecoach library.
//!
//! One enum, four failure families, mirroring how each failure is surfaced:
//!
//! * **Ingestion** — a file could not be turned into slides. Reported
//!   immediately to the caller; slides already in the store are untouched.
//! * **Service** — the analysis collaborator failed, or an operation was
//!   rejected because another request holds its concurrency gate. Terminal
//!   for that one operation; the session itself stays usable.
//! * **Malformed generation** — the model answered, but the payload does
//!   not satisfy the expected shape (quiz JSON missing fields, bad option
//!   index). Treated exactly like a service failure.
//! * **Persistence** — snapshot I/O failed. These are logged and swallowed
//!   at the autosave boundary (the in-memory session stays authoritative);
//!   the variants exist for the explicit `resume`/`clear` paths.
//!
//! There are no automatic retries anywhere in the crate: every failure
//! requires the user to re-trigger the operation.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the slidecoach library.
#[derive(Debug, Error)]
pub enum CoachError {
    // ── Ingestion errors ──────────────────────────────────────────────────
    /// The uploaded file is neither an image nor a PDF.
    #[error("Unsupported file '{name}': expected an image or a PDF")]
    UnsupportedFile { name: String },

    /// The rasterization collaborator could not process a PDF.
    #[error("Failed to rasterize '{name}': {detail}\nThe file may be password protected or corrupted.")]
    Rasterization { name: String, detail: String },

    /// A rendered page could not be encoded for the analysis payload.
    #[error("Failed to encode page {page} of '{name}': {detail}")]
    PageEncoding {
        name: String,
        page: usize,
        detail: String,
    },

    // ── Service errors ────────────────────────────────────────────────────
    /// The analysis service returned an error or was unreachable.
    #[error("Analysis request failed: {message}")]
    AnalysisFailed { message: String },

    /// Another chat/explanation request is already in flight.
    ///
    /// Requests are rejected, never queued — re-trigger once the current
    /// one settles.
    #[error("An analysis request is already in flight for this operation")]
    Busy,

    /// The model produced output that does not match the requested shape.
    #[error("Model returned malformed output: {detail}")]
    MalformedGeneration { detail: String },

    /// An operation that samples the deck was invoked on an empty deck.
    #[error("The deck is empty — upload slides first")]
    EmptyDeck,

    // ── Persistence errors ────────────────────────────────────────────────
    /// Could not write the workspace snapshot.
    #[error("Failed to write snapshot '{path}': {source}")]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not remove the persisted snapshot on clear.
    #[error("Failed to clear snapshot '{path}': {source}")]
    SnapshotClear {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot serialisation failed.
    #[error("Failed to encode snapshot: {0}")]
    SnapshotEncode(#[from] serde_json::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
