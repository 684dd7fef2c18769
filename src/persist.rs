//! Workspace persistence: the snapshot store and the debounced autosaver.
//!
//! ## Persistence model
//!
//! There is exactly one persisted unit — the [`WorkspaceSnapshot`] — and
//! exactly one slot for it (one workspace per installation). Every save
//! overwrites the whole snapshot; every resume reads the whole snapshot;
//! clear removes it entirely. No incremental updates, no history.
//!
//! ## Debounce design
//!
//! Saving on every keystroke-grade mutation would hammer the disk with
//! full-deck writes (slides carry base64 image payloads). Instead the
//! [`Autosaver`] owns a single cancellable deadline: each change
//! notification re-arms it, so a burst of edits produces exactly one write,
//! fired [`AUTOSAVE_QUIET_PERIOD`] after the last edit. The autosaver is
//! the only component that touches the timer, and there is never more than
//! one pending deadline.
//!
//! Persistence failures during autosave are logged and swallowed — the
//! in-memory session remains authoritative and fully usable.

use crate::deck::{Message, Slide};
use crate::error::CoachError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, warn};

/// Quiet period between the last mutation and the snapshot write.
pub const AUTOSAVE_QUIET_PERIOD: Duration = Duration::from_secs(2);

/// The sole persisted unit: the entire session, overwritten wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub slides: Vec<Slide>,
    pub messages: Vec<Message>,
    pub last_active_index: usize,
    pub saved_at: DateTime<Utc>,
}

/// Single-slot snapshot persistence (overwrite semantics).
///
/// `load` returns `None` for absent or unreadable snapshots — "no session"
/// is a normal outcome, not a failure, so it is not an `Err`.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist the snapshot, replacing any previous one.
    async fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<(), CoachError>;

    /// Read the stored snapshot. Absent or corrupt slots yield `None`.
    async fn load(&self) -> Option<WorkspaceSnapshot>;

    /// Remove the stored snapshot. Removing an empty slot succeeds.
    async fn clear(&self) -> Result<(), CoachError>;
}

// ── File-backed store ────────────────────────────────────────────────────

/// JSON snapshot store at a fixed path.
///
/// Writes are atomic (temp file + rename) so a crash mid-write leaves the
/// previous snapshot intact rather than a truncated file.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<(), CoachError> {
        let bytes = serde_json::to_vec(snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| CoachError::SnapshotWrite {
                        path: self.path.clone(),
                        source: e,
                    })?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| CoachError::SnapshotWrite {
                path: self.path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CoachError::SnapshotWrite {
                path: self.path.clone(),
                source: e,
            })?;

        debug!("Snapshot written: {} bytes → {}", bytes.len(), self.path.display());
        Ok(())
    }

    async fn load(&self) -> Option<WorkspaceSnapshot> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Snapshot unreadable at {}: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Snapshot corrupt at {}: {e}", self.path.display());
                None
            }
        }
    }

    async fn clear(&self) -> Result<(), CoachError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoachError::SnapshotClear {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

// ── In-memory store ──────────────────────────────────────────────────────

#[derive(Default)]
struct MemorySlot {
    snapshot: Option<WorkspaceSnapshot>,
    saves: usize,
}

/// In-memory snapshot store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<MemorySlot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `save` has been called, for debounce assertions.
    pub fn save_count(&self) -> usize {
        self.slot.lock().expect("slot poisoned").saves
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<(), CoachError> {
        let mut slot = self.slot.lock().expect("slot poisoned");
        slot.snapshot = Some(snapshot.clone());
        slot.saves += 1;
        Ok(())
    }

    async fn load(&self) -> Option<WorkspaceSnapshot> {
        self.slot.lock().expect("slot poisoned").snapshot.clone()
    }

    async fn clear(&self) -> Result<(), CoachError> {
        self.slot.lock().expect("slot poisoned").snapshot = None;
        Ok(())
    }
}

// ── Autosaver ────────────────────────────────────────────────────────────

/// A change notification from the workspace.
#[derive(Debug)]
pub enum ChangeEvent {
    /// A fresh snapshot to persist once the quiet period elapses.
    Dirty(WorkspaceSnapshot),
    /// Drop any pending snapshot without writing it (session cleared).
    Discard,
}

/// Sender half of the change-notification channel.
///
/// Every mutating workspace operation pushes the resulting snapshot here;
/// the autosaver keeps only the most recent one.
pub type ChangeSender = mpsc::UnboundedSender<ChangeEvent>;

/// The debounce scheduler: one task, one cancellable deadline.
pub struct Autosaver {
    handle: JoinHandle<()>,
}

impl Autosaver {
    /// Spawn the autosave task reading change notifications from `rx`.
    ///
    /// The task runs until the channel closes; a snapshot still pending at
    /// that point is flushed before the task exits, so dropping the last
    /// sender is a clean shutdown, not a lost write.
    pub fn spawn(
        store: Arc<dyn SnapshotStore>,
        mut rx: mpsc::UnboundedReceiver<ChangeEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                // Idle until the first notification of a burst.
                let mut latest = match rx.recv().await {
                    Some(ChangeEvent::Dirty(snapshot)) => snapshot,
                    Some(ChangeEvent::Discard) => continue,
                    None => return,
                };
                let mut deadline = Instant::now() + AUTOSAVE_QUIET_PERIOD;

                // Absorb the burst: each notification replaces the pending
                // snapshot and re-arms the single deadline. `biased` drains
                // queued notifications before consulting the timer, so a
                // Discard enqueued before the deadline fires always wins.
                loop {
                    tokio::select! {
                        biased;

                        more = rx.recv() => match more {
                            Some(ChangeEvent::Dirty(snapshot)) => {
                                latest = snapshot;
                                deadline = Instant::now() + AUTOSAVE_QUIET_PERIOD;
                            }
                            Some(ChangeEvent::Discard) => break,
                            None => {
                                write_snapshot(store.as_ref(), &latest).await;
                                return;
                            }
                        },
                        _ = sleep_until(deadline) => {
                            write_snapshot(store.as_ref(), &latest).await;
                            break;
                        }
                    }
                }
            }
        });

        Self { handle }
    }

    /// Whether the autosave task has exited (channel closed and flushed).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to exit. Call after dropping every sender.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

async fn write_snapshot(store: &dyn SnapshotStore, snapshot: &WorkspaceSnapshot) {
    if let Err(e) = store.save(snapshot).await {
        // The in-memory session is still authoritative; nothing to unwind.
        warn!("Autosave failed: {e}");
    }
}
