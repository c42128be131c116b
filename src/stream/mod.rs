//! Paced audio frame streaming
//!
//! The PCM buffer is cut into fixed-size frames and written with a fixed
//! delay between them, so the service sees audio at roughly realtime speed
//! and its end-of-speech detection behaves as it would for live input.

pub mod frames;
pub mod streamer;

pub use frames::{plan_frames, FramePlan};
pub use streamer::{FrameSink, FrameStreamer, StreamReport, StreamerConfig};
