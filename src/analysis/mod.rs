//! Analysis orchestration: the service boundary and the three request
//! shapes built on top of it.
//!
//! ## Data Flow
//!
//! ```text
//! slides ──▶ requests ──▶ service ──▶ orchestrator
//! (store)    (batch/      (external   (assemble text,
//!             sample/      model)      validate quiz JSON)
//!             tag)
//! ```
//!
//! 1. [`service`]      — the abstract request/response contract the external
//!    generative model is consumed through; the only place with network I/O,
//!    and it lives outside this crate
//! 2. [`requests`]     — pure request-shaping: fixed-size batching, stride
//!    sampling, slide tagging, output schemas
//! 3. [`orchestrator`] — one method per user-facing operation; sequential
//!    batch driving and response assembly

pub mod orchestrator;
pub mod requests;
pub mod service;
