//! Recognition session management
//!
//! This module provides the `RecognitionSession` abstraction that manages:
//! - Signing and opening the WebSocket connection
//! - Streaming audio frames on a paced background task
//! - Reconciling partial transcripts as results arrive
//! - Terminal conditions (final result, remote error, connection loss,
//!   cancellation, optional timeout) and connection cleanup

mod config;
mod session;
mod stats;

pub use config::{Credentials, SessionConfig};
pub use session::{recognize_blocking, CancelHandle, Recognition, RecognitionSession, SessionState};
pub use stats::SessionStats;
