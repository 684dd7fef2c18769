//! The workspace aggregate: single owner of all mutable session state.
//!
//! Slides, chat messages, and the active-slide cursor live here and are
//! mutated only through this command API — nothing else in the crate holds
//! a reference into the collections. Every mutating command emits the
//! resulting [`WorkspaceSnapshot`] on the change channel, which is what
//! drives the debounced autosave; callers never schedule saves themselves.
//!
//! Empty workspaces are not announced: a deck with zero slides is the
//! "no session" state and persisting it would turn every fresh launch into
//! a disk write.

use crate::deck::{Message, Role, Slide, SlideStore};
use crate::persist::{ChangeEvent, ChangeSender, WorkspaceSnapshot};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

pub struct Workspace {
    store: SlideStore,
    messages: Vec<Message>,
    changes: ChangeSender,
}

impl Workspace {
    pub fn new(changes: ChangeSender) -> Self {
        Self {
            store: SlideStore::new(),
            messages: Vec::new(),
            changes,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Append ingested slides in caller order.
    pub fn append_slides(&mut self, slides: Vec<Slide>) {
        if slides.is_empty() {
            return;
        }
        self.store.append(slides);
        self.announce();
    }

    /// Attach an explanation to the slide with the given id (no-op when
    /// the id is absent).
    pub fn attach_explanation(&mut self, id: Uuid, text: impl Into<String>) {
        self.store.attach_explanation(id, text);
        self.announce();
    }

    /// Move the active-slide cursor; out-of-range moves are rejected.
    pub fn navigate(&mut self, index: usize) -> bool {
        let moved = self.store.navigate(index);
        if moved {
            self.announce();
        }
        moved
    }

    /// Append a chat message and return its id.
    pub fn push_message(&mut self, role: Role, content: impl Into<String>) -> Uuid {
        let message = Message::new(role, content);
        let id = message.id;
        self.messages.push(message);
        self.announce();
        id
    }

    /// Reset slides and messages to empty (the persisted slot is handled
    /// separately by the caller).
    ///
    /// Any save still pending from earlier edits is discarded — clearing
    /// must not race a debounced write of the state being cleared.
    pub fn reset(&mut self) {
        debug!("Workspace reset: dropping {} slides, {} messages", self.store.len(), self.messages.len());
        self.store.reset();
        self.messages.clear();
        let _ = self.changes.send(ChangeEvent::Discard);
    }

    /// Replace the in-memory state with a persisted snapshot.
    ///
    /// Restoring is not an edit, so no change notification is emitted —
    /// otherwise every resume would immediately rewrite what it just read.
    pub fn restore(&mut self, snapshot: WorkspaceSnapshot) {
        self.store = SlideStore::from_parts(snapshot.slides, snapshot.last_active_index);
        self.messages = snapshot.messages;
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn store(&self) -> &SlideStore {
        &self.store
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Capture the full session state for persistence.
    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            slides: self.store.slides().to_vec(),
            messages: self.messages.clone(),
            last_active_index: self.store.active_index(),
            saved_at: Utc::now(),
        }
    }

    fn announce(&self) {
        if self.store.is_empty() {
            return;
        }
        // Send fails only when the autosaver is gone (shutdown); the
        // session keeps working from memory.
        let _ = self.changes.send(ChangeEvent::Dirty(self.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::SlideImage;
    use tokio::sync::mpsc;

    fn slide(name: &str) -> Slide {
        Slide::new(SlideImage::new("QUJD", "image/jpeg"), name)
    }

    fn workspace() -> (Workspace, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Workspace::new(tx), rx)
    }

    #[test]
    fn mutations_announce_snapshots() {
        let (mut ws, mut rx) = workspace();

        ws.append_slides(vec![slide("a"), slide("b")]);
        ws.navigate(1);
        ws.push_message(Role::User, "hi");

        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, ChangeEvent::Dirty(_)));
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn reset_discards_pending_saves() {
        let (mut ws, mut rx) = workspace();
        ws.append_slides(vec![slide("a")]);
        let _ = rx.try_recv();

        ws.reset();
        assert!(matches!(rx.try_recv(), Ok(ChangeEvent::Discard)));
    }

    #[test]
    fn empty_workspace_stays_silent() {
        let (mut ws, mut rx) = workspace();

        // A message with no slides is not a persistable session yet.
        ws.push_message(Role::User, "hello?");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn rejected_navigation_does_not_announce() {
        let (mut ws, mut rx) = workspace();
        ws.append_slides(vec![slide("a")]);
        let _ = rx.try_recv();

        assert!(!ws.navigate(5));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let (mut ws, _rx) = workspace();
        ws.append_slides(vec![slide("a"), slide("b"), slide("c")]);
        ws.navigate(2);
        ws.push_message(Role::User, "q");
        ws.push_message(Role::Model, "a");

        let snapshot = ws.snapshot();

        let (mut other, _rx2) = workspace();
        other.restore(snapshot);
        assert_eq!(other.store().len(), 3);
        assert_eq!(other.store().active_index(), 2);
        assert_eq!(other.messages().len(), 2);
        assert_eq!(other.messages()[1].role, Role::Model);
    }

    #[test]
    fn reset_empties_everything() {
        let (mut ws, _rx) = workspace();
        ws.append_slides(vec![slide("a")]);
        ws.push_message(Role::User, "q");

        ws.reset();
        assert!(ws.store().is_empty());
        assert!(ws.messages().is_empty());
        assert_eq!(ws.store().active_index(), 0);
    }
}
