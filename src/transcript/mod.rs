//! Transcript reconciliation
//!
//! With dynamic correction enabled the service streams partial results and
//! later revises them: a result marked `pgs = "rpl"` names a token range
//! `rg = [start, end)` of what it sent before, to be replaced by the words
//! it carries. Everything else is appended.

mod reconciler;

pub use reconciler::{Correction, TranscriptReconciler};
