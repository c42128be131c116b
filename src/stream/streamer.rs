use super::frames::{plan_frames, FramePlan};
use crate::error::{RecognizeError, Result};
use crate::protocol::{Business, Common, FrameMessage, FrameStatus};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::{Sink, SinkExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

/// Write half the frames go to
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;
}

/// WebSocket write half shared with the session, which closes it once the
/// session ends
pub struct WsFrameSink<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> WsFrameSink<S> {
    pub fn new(inner: Arc<Mutex<S>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> FrameSink for WsFrameSink<S>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin + Send,
{
    async fn send_text(&mut self, text: String) -> Result<()> {
        let mut sink = self.inner.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| RecognizeError::ConnectionLost(format!("failed to send frame: {e}")))
    }
}

#[derive(Debug, Clone)]
pub struct StreamerConfig {
    pub frame_size: usize,
    pub frame_interval: Duration,
    pub common: Common,
    pub business: Business,
}

/// What was written before the stream ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub frames_sent: usize,
    pub bytes_sent: usize,
}

pub struct FrameStreamer {
    config: StreamerConfig,
    frames_sent: Arc<AtomicUsize>,
    bytes_sent: Arc<AtomicUsize>,
}

impl FrameStreamer {
    pub fn new(config: StreamerConfig) -> Self {
        Self {
            config,
            frames_sent: Arc::new(AtomicUsize::new(0)),
            bytes_sent: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Live frame counter, readable while [`run`](Self::run) is in progress
    pub fn frames_sent_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.frames_sent)
    }

    /// Live audio byte counter
    pub fn bytes_sent_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.bytes_sent)
    }

    /// Serialize one planned frame of `audio`
    pub fn encode_frame(&self, plan: &FramePlan, audio: &[u8]) -> Result<String> {
        let payload = BASE64.encode(&audio[plan.range.clone()]);

        let message = if plan.is_opening() {
            FrameMessage::opening(
                self.config.common.clone(),
                self.config.business.clone(),
                plan.status,
                payload,
            )
        } else {
            FrameMessage::continuation(plan.status, payload)
        };

        Ok(serde_json::to_string(&message)?)
    }

    /// Write every frame of `audio` to `sink`, sleeping the frame interval
    /// between frames. Stops right after the last frame, or on the first
    /// failed write.
    pub async fn run<K>(&self, sink: &mut K, audio: &[u8]) -> Result<StreamReport>
    where
        K: FrameSink + ?Sized,
    {
        let plan = plan_frames(audio.len(), self.config.frame_size);
        info!(
            "Streaming {} bytes as {} frames ({}ms apart)",
            audio.len(),
            plan.len(),
            self.config.frame_interval.as_millis()
        );

        for frame in &plan {
            let json = self.encode_frame(frame, audio)?;
            sink.send_text(json).await?;

            self.frames_sent.fetch_add(1, Ordering::SeqCst);
            self.bytes_sent.fetch_add(frame.len(), Ordering::SeqCst);
            debug!(
                "Sent frame {} (status={:?}, bytes={})",
                frame.index,
                frame.status,
                frame.len()
            );

            if frame.status == FrameStatus::Last {
                break;
            }

            if !self.config.frame_interval.is_zero() {
                tokio::time::sleep(self.config.frame_interval).await;
            }
        }

        let report = StreamReport {
            frames_sent: self.frames_sent.load(Ordering::SeqCst),
            bytes_sent: self.bytes_sent.load(Ordering::SeqCst),
        };
        info!(
            "Audio stream complete (frames={}, bytes={})",
            report.frames_sent, report.bytes_sent
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Instant;

    #[derive(Default)]
    struct CollectingSink {
        sent: Vec<String>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl FrameSink for CollectingSink {
        async fn send_text(&mut self, text: String) -> Result<()> {
            if self.fail_after == Some(self.sent.len()) {
                return Err(RecognizeError::ConnectionLost("closed".to_string()));
            }
            self.sent.push(text);
            Ok(())
        }
    }

    fn config(frame_interval: Duration) -> StreamerConfig {
        StreamerConfig {
            frame_size: 1280,
            frame_interval,
            common: Common {
                app_id: "app".to_string(),
            },
            business: Business {
                language: "zh_cn".to_string(),
                domain: "iat".to_string(),
                accent: "mandarin".to_string(),
                vad_eos: 5000,
                dwa: "wpgs".to_string(),
            },
        }
    }

    fn parse(sent: &[String]) -> Vec<Value> {
        sent.iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_streams_scenario_frames() {
        let audio: Vec<u8> = (0..3000).map(|i| (i % 251) as u8).collect();
        let streamer = FrameStreamer::new(config(Duration::ZERO));
        let mut sink = CollectingSink::default();

        let report = streamer.run(&mut sink, &audio).await.unwrap();
        assert_eq!(
            report,
            StreamReport {
                frames_sent: 3,
                bytes_sent: 3000
            }
        );

        let frames = parse(&sink.sent);
        let statuses: Vec<i64> = frames
            .iter()
            .map(|f| f["data"]["status"].as_i64().unwrap())
            .collect();
        assert_eq!(statuses, vec![0, 1, 2]);

        assert_eq!(frames[0]["common"]["app_id"], "app");
        assert_eq!(frames[0]["business"]["vad_eos"], 5000);
        assert!(frames[1].get("common").is_none());
        assert!(frames[2].get("business").is_none());

        // Payloads decode back to the original buffer
        let decoded: Vec<u8> = frames
            .iter()
            .flat_map(|f| BASE64.decode(f["data"]["audio"].as_str().unwrap()).unwrap())
            .collect();
        assert_eq!(decoded, audio);
    }

    #[tokio::test]
    async fn test_single_frame_carries_parameters_with_last_status() {
        let streamer = FrameStreamer::new(config(Duration::ZERO));
        let mut sink = CollectingSink::default();

        streamer.run(&mut sink, &[1u8; 100]).await.unwrap();

        let frames = parse(&sink.sent);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["data"]["status"], 2);
        assert_eq!(frames[0]["common"]["app_id"], "app");
    }

    #[tokio::test]
    async fn test_send_failure_stops_stream() {
        let streamer = FrameStreamer::new(config(Duration::ZERO));
        let counter = streamer.frames_sent_counter();
        let mut sink = CollectingSink {
            fail_after: Some(1),
            ..Default::default()
        };

        let err = streamer.run(&mut sink, &[0u8; 5000]).await.unwrap_err();
        assert!(matches!(err, RecognizeError::ConnectionLost(_)));
        assert_eq!(sink.sent.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_paces_frames_but_not_after_last() {
        let streamer = FrameStreamer::new(config(Duration::from_millis(20)));
        let mut sink = CollectingSink::default();

        let started = Instant::now();
        streamer.run(&mut sink, &[0u8; 1280 * 3]).await.unwrap();
        let elapsed = started.elapsed();

        // Two gaps for three frames
        assert!(elapsed >= Duration::from_millis(40), "elapsed {:?}", elapsed);
        assert_eq!(sink.sent.len(), 3);
    }

    #[test]
    fn test_encode_middle_frame() {
        let streamer = FrameStreamer::new(config(Duration::ZERO));
        let plan = FramePlan {
            index: 1,
            range: 2..4,
            status: FrameStatus::Continue,
        };

        let json = streamer.encode_frame(&plan, &[9, 9, 1, 2, 9]).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["data"]["status"], 1);
        assert_eq!(value["data"]["format"], "audio/L16;rate=16000");
        assert_eq!(value["data"]["encoding"], "raw");
        assert_eq!(value["data"]["audio"], BASE64.encode([1u8, 2]));
    }
}
