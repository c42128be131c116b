use super::config::SessionConfig;
use super::stats::SessionStats;
use crate::auth;
use crate::error::{RecognizeError, Result};
use crate::protocol::ResponseMessage;
use crate::stream::streamer::WsFrameSink;
use crate::stream::{FrameStreamer, StreamReport, StreamerConfig};
use crate::transcript::TranscriptReconciler;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, info_span, warn, Instrument};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Streaming,
    AwaitingFinal,
    Done,
}

/// Transcript plus what it took to get it
#[derive(Debug, Clone)]
pub struct Recognition {
    pub text: String,
    pub stats: SessionStats,
}

/// Cancels a running session from another task. Cancelling closes the
/// connection and the session fails with [`RecognizeError::Cancelled`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A single-use recognition session: one connection, one audio clip, one
/// transcript. Create one per request.
pub struct RecognitionSession {
    config: SessionConfig,
    cancel_tx: Arc<watch::Sender<bool>>,
    partial_tx: watch::Sender<String>,
    state_tx: watch::Sender<SessionState>,
}

impl RecognitionSession {
    pub fn new(config: SessionConfig) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        let (partial_tx, _) = watch::channel(String::new());
        let (state_tx, _) = watch::channel(SessionState::Idle);

        Self {
            config,
            cancel_tx: Arc::new(cancel_tx),
            partial_tx,
            state_tx,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Live transcript, updated after every result that changes it
    pub fn subscribe_partial(&self) -> watch::Receiver<String> {
        self.partial_tx.subscribe()
    }

    /// Current lifecycle state, updated on every transition
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Recognize `audio` (16kHz mono 16-bit little-endian PCM) and return
    /// the final transcript.
    pub async fn recognize(self, audio: Vec<u8>) -> Result<String> {
        self.recognize_detailed(audio).await.map(|r| r.text)
    }

    /// Like [`recognize`](Self::recognize), also returning session statistics.
    pub async fn recognize_detailed(self, audio: Vec<u8>) -> Result<Recognition> {
        let span = info_span!("recognize", session_id = %self.config.session_id);
        self.run(audio).instrument(span).await
    }

    async fn run(self, audio: Vec<u8>) -> Result<Recognition> {
        let RecognitionSession {
            config,
            cancel_tx,
            partial_tx,
            state_tx,
        } = self;

        let mut tracker = StateTracker::new(state_tx);
        let mut stats = SessionStats::new(config.session_id.clone());

        if audio.is_empty() {
            return Err(RecognizeError::EmptyAudio);
        }
        if config.credentials.app_id.is_empty() {
            return Err(RecognizeError::AuthBuild("app_id must be set".to_string()));
        }
        if config.frame_size == 0 {
            return Err(RecognizeError::InvalidConfig(
                "frame_size must be greater than 0".to_string(),
            ));
        }

        let mut cancel_rx = cancel_tx.subscribe();
        if *cancel_rx.borrow() {
            return Err(RecognizeError::Cancelled);
        }

        tracker.set(SessionState::Connecting);
        let signed = auth::build_signed_url(
            &config.credentials.endpoint,
            &config.credentials.api_key,
            &config.credentials.api_secret,
        )?;
        let ws_url = auth::to_websocket_url(&signed);

        info!(
            "Connecting to {}{} ({} bytes of audio)",
            signed.host_str().unwrap_or_default(),
            signed.path(),
            audio.len()
        );

        let started = Instant::now();

        let (ws, _response) = tokio::select! {
            connected = connect_async(ws_url.as_str()) => connected?,
            _ = wait_cancelled(&mut cancel_rx) => {
                warn!("Cancelled while connecting");
                return Err(RecognizeError::Cancelled);
            }
        };
        info!("WebSocket connection established");

        let (write, mut read) = ws.split();
        let write = Arc::new(Mutex::new(write));

        tracker.set(SessionState::Streaming);
        let streamer = FrameStreamer::new(StreamerConfig {
            frame_size: config.frame_size,
            frame_interval: config.frame_interval,
            common: config.common(),
            business: config.business_params(),
        });
        let frames_sent = streamer.frames_sent_counter();
        let bytes_sent = streamer.bytes_sent_counter();

        let mut sink = WsFrameSink::new(Arc::clone(&write));
        let mut send_task: JoinHandle<Result<StreamReport>> = tokio::spawn(
            async move { streamer.run(&mut sink, &audio).await }.in_current_span(),
        );

        let mut reconciler = TranscriptReconciler::new();
        let mut send_pending = true;
        let outcome = drive(
            &mut read,
            &mut send_task,
            &mut send_pending,
            &mut cancel_rx,
            config.timeout,
            &mut reconciler,
            &mut stats,
            &partial_tx,
            &mut tracker,
        )
        .await;

        // Release the connection on every exit path
        if send_pending {
            send_task.abort();
            let _ = send_task.await;
        }
        close_connection(&write).await;
        tracker.set(SessionState::Done);

        stats.duration_secs = started.elapsed().as_secs_f64();
        stats.frames_sent = frames_sent.load(Ordering::SeqCst);
        stats.audio_bytes_sent = bytes_sent.load(Ordering::SeqCst);
        stats.corrections_applied = reconciler.corrections_applied();
        stats.anomalies = reconciler.anomalies();

        match outcome {
            Ok(()) => {
                let text = reconciler.into_text();
                if text.trim().is_empty() {
                    warn!("Recognition finished with an empty transcript");
                }
                info!(
                    "Recognition complete in {:.2}s (frames={}, messages={}, corrections={}): {}",
                    stats.duration_secs,
                    stats.frames_sent,
                    stats.messages_received,
                    stats.corrections_applied,
                    text
                );
                Ok(Recognition { text, stats })
            }
            Err(e) => {
                error!(
                    "Recognition failed after {:.2}s (frames={}, messages={}): {}",
                    stats.duration_secs, stats.frames_sent, stats.messages_received, e
                );
                Err(e)
            }
        }
    }
}

/// Recognize `audio` from synchronous code. Runs the session on its own
/// current-thread runtime; called from inside a runtime it fails with
/// [`RecognizeError::InsideRuntime`].
pub fn recognize_blocking(config: SessionConfig, audio: Vec<u8>) -> Result<String> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(RecognizeError::InsideRuntime);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(RecognizeError::Runtime)?;

    runtime.block_on(RecognitionSession::new(config).recognize(audio))
}

struct StateTracker {
    tx: watch::Sender<SessionState>,
}

impl StateTracker {
    fn new(tx: watch::Sender<SessionState>) -> Self {
        Self { tx }
    }

    fn set(&mut self, next: SessionState) {
        self.tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!("Session state {:?} -> {:?}", state, next);
            *state = next;
            true
        });
    }
}

impl Drop for StateTracker {
    fn drop(&mut self) {
        self.set(SessionState::Done);
    }
}

/// Receive loop. Returns once a terminal condition fires; whichever comes
/// first wins.
#[allow(clippy::too_many_arguments)]
async fn drive(
    read: &mut WsSource,
    send_task: &mut JoinHandle<Result<StreamReport>>,
    send_pending: &mut bool,
    cancel_rx: &mut watch::Receiver<bool>,
    timeout: Option<Duration>,
    reconciler: &mut TranscriptReconciler,
    stats: &mut SessionStats,
    partial_tx: &watch::Sender<String>,
    tracker: &mut StateTracker,
) -> Result<()> {
    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    tracker.set(SessionState::AwaitingFinal);
                    if handle_message(&text, reconciler, stats, partial_tx)? {
                        return Ok(());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return Err(RecognizeError::ConnectionLost(format!(
                        "server closed the connection ({reason})"
                    )));
                }
                Some(Ok(other)) => {
                    debug!("Ignoring non-text message ({} bytes)", other.len());
                }
                Some(Err(e)) => {
                    return Err(RecognizeError::ConnectionLost(e.to_string()));
                }
                None => {
                    return Err(RecognizeError::ConnectionLost(
                        "connection ended without a final result".to_string(),
                    ));
                }
            },
            sent = &mut *send_task, if *send_pending => {
                *send_pending = false;
                match sent {
                    Ok(Ok(report)) => {
                        debug!(
                            "All {} frames written, waiting for final result",
                            report.frames_sent
                        );
                        tracker.set(SessionState::AwaitingFinal);
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(e) => {
                        return Err(RecognizeError::ConnectionLost(format!(
                            "frame task failed: {e}"
                        )));
                    }
                }
            },
            _ = wait_cancelled(cancel_rx) => {
                warn!("Recognition cancelled by caller");
                return Err(RecognizeError::Cancelled);
            },
            _ = &mut deadline => {
                // Only reachable when a timeout is configured
                let limit = timeout.unwrap_or_default();
                warn!("No final result within {:?}", limit);
                return Err(RecognizeError::Timeout(limit));
            },
        }
    }
}

/// Apply one inbound text message. Returns `true` on the final result.
fn handle_message(
    text: &str,
    reconciler: &mut TranscriptReconciler,
    stats: &mut SessionStats,
    partial_tx: &watch::Sender<String>,
) -> Result<bool> {
    stats.messages_received += 1;
    debug!("Received: {}", text);

    let message: ResponseMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Failed to parse recognition message: {}", e);
            return Ok(false);
        }
    };

    if stats.sid.is_none() {
        stats.sid = message.sid.clone();
    }

    if message.is_error() {
        error!(
            "Recognition service returned code={}, message={}, sid={:?}",
            message.code, message.message, message.sid
        );
        return Err(RecognizeError::RemoteApplication {
            code: message.code,
            message: message.message,
            sid: message.sid,
        });
    }

    if let Some(result) = message.result() {
        if reconciler.apply(result) {
            partial_tx.send_replace(reconciler.snapshot());
        }
    }

    Ok(message.is_final())
}

/// Resolves once cancellation is requested. Never resolves if it cannot be.
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn close_connection(write: &Arc<Mutex<WsSink>>) {
    let mut sink = write.lock().await;

    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!("Close frame not sent: {}", e);
    }
    if let Err(e) = sink.close().await {
        debug!("Connection close: {}", e);
    }
    info!("WebSocket connection closed");
}
