//! The slide data model and the ordered slide store.
//!
//! A [`Slide`] is one page/image unit of the ingested document. Display
//! order is implicit — the slide's position in the store's sequence — and
//! only ever changes by append. Ids are v4 UUIDs assigned at creation and
//! never reused, so a response arriving long after it was requested can
//! still be attached to the exact slide it was issued for, regardless of
//! how many slides were appended in the meantime.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// An image payload ready for an analysis request: raw base64 plus mime.
///
/// Slides keep their pixels in this form for their whole lifetime — it is
/// the exact shape the analysis service consumes, so request building never
/// re-encodes anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideImage {
    /// Mime type, e.g. `image/jpeg`.
    pub mime: String,
    /// Base64 image bytes, without any `data:` URL prefix.
    pub data: String,
}

static RE_DATA_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:(image/[a-zA-Z+.-]+);base64,").unwrap());

impl SlideImage {
    /// Build a payload from raw base64 and a mime type.
    pub fn new(data: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            data: data.into(),
        }
    }

    /// Build a payload from a `data:image/...;base64,` URL.
    ///
    /// Inputs without a recognised prefix are taken verbatim and assumed
    /// to be JPEG, matching how upstream tooling labels unprefixed blobs.
    pub fn from_data_url(url: &str) -> Self {
        match RE_DATA_URL.captures(url) {
            Some(caps) => {
                let mime = caps[1].to_string();
                let data = url[caps[0].len()..].to_string();
                Self { mime, data }
            }
            None => Self {
                mime: "image/jpeg".to_string(),
                data: url.to_string(),
            },
        }
    }
}

/// One page/image unit of the ingested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slide {
    /// Stable, collision-resistant identifier, unique for the session.
    pub id: Uuid,
    /// The slide's pixels, as uploaded or as rendered from a PDF page.
    pub image: SlideImage,
    /// Display name, e.g. `Pg 3 - lecture.pdf`.
    pub name: String,
    /// Cached explanation from the last quick-explain/summarize, if any.
    pub explanation: Option<String>,
}

impl Slide {
    /// Create a slide with a fresh id and no cached explanation.
    pub fn new(image: SlideImage, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
            name: name.into(),
            explanation: None,
        }
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    /// Error bubbles and other session-originated notices.
    System,
}

/// One chat message, ordered by insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The ordered slide collection plus the active-slide cursor.
///
/// Mutations are append, in-place explanation attach, and cursor moves —
/// nothing else. There is deliberately no removal or reorder operation, so
/// a slide's position is stable for the lifetime of the session.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SlideStore {
    slides: Vec<Slide>,
    active_index: usize,
}

impl SlideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted parts, clamping a stale cursor.
    ///
    /// Snapshots written by older sessions are trusted for content but not
    /// for the cursor invariant.
    pub fn from_parts(slides: Vec<Slide>, active_index: usize) -> Self {
        let active_index = if slides.is_empty() {
            0
        } else {
            active_index.min(slides.len() - 1)
        };
        Self {
            slides,
            active_index,
        }
    }

    /// Append slides, preserving the caller-provided order.
    pub fn append(&mut self, new_slides: Vec<Slide>) {
        debug!("Appending {} slides (deck now {})", new_slides.len(), self.slides.len() + new_slides.len());
        self.slides.extend(new_slides);
    }

    /// Attach an explanation to the slide with the given id.
    ///
    /// No-op when the id is absent — responses for slides that no longer
    /// exist are dropped silently.
    pub fn attach_explanation(&mut self, id: Uuid, text: impl Into<String>) {
        if let Some(slide) = self.slides.iter_mut().find(|s| s.id == id) {
            slide.explanation = Some(text.into());
        }
    }

    /// Move the cursor. Out-of-range requests are rejected, not clamped.
    ///
    /// Returns whether the move was accepted.
    pub fn navigate(&mut self, index: usize) -> bool {
        if index < self.slides.len() {
            self.active_index = index;
            true
        } else {
            false
        }
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    /// The slide under the cursor, if the deck is non-empty.
    pub fn active_slide(&self) -> Option<&Slide> {
        self.slides.get(self.active_index)
    }

    pub fn get(&self, id: Uuid) -> Option<&Slide> {
        self.slides.iter().find(|s| s.id == id)
    }

    /// Drop every slide and reset the cursor.
    pub fn reset(&mut self) {
        self.slides.clear();
        self.active_index = 0;
    }
}
