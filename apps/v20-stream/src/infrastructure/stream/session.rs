//! Stream Session
//!
//! One long-lived streaming response and the background task that reads it.
//!
//! ```text
//! Running ──close() / EOF / read error / ChunkTooBig──► Closing ──loop exit──► Closed
//! ```
//!
//! The read task exclusively owns the byte source, the [`FrameDecoder`] and
//! the router. `close()` only flips a close-once guard and cancels the
//! session token; the task notices, drops the source, then calls
//! `on_close()` on the router. Two signals are exposed:
//!
//! - [`StreamSession::done`] fires as soon as a close is requested
//! - [`StreamSession::wait`] fires once the read task has fully exited

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use uuid::Uuid;

use super::decoder::{DecoderConfig, FrameDecoder, FrameError};
use super::policy::{HandlerErrorPolicy, Verdict};
use crate::application::ports::FrameRouter;
use crate::domain::StreamKind;
use crate::infrastructure::metrics;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while opening a stream. Nothing is spawned when these occur.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Transport failure before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("stream request rejected with status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// `errorMessage` from the body, or the raw body.
        message: String,
    },

    /// The request could not be built from the given parameters.
    #[error("invalid stream request: {0}")]
    InvalidRequest(String),

    /// A header value is not valid HTTP.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_message: String,
}

fn error_message(body: String) -> String {
    serde_json::from_str::<ErrorBody>(&body).map_or(body, |b| b.error_message)
}

// =============================================================================
// Close Guard
// =============================================================================

/// Single-execution guard for the release sequence.
///
/// Exactly one caller of [`try_close`](Self::try_close) ever observes `true`.
#[derive(Debug, Default)]
pub struct CloseOnce(AtomicBool);

impl CloseOnce {
    /// Create an unclosed guard.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Claim the close. Returns `true` only for the first caller.
    pub fn try_close(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the close has been claimed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// =============================================================================
// Session
// =============================================================================

/// Per-session tuning.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Frame buffer sizing.
    pub decoder: DecoderConfig,
    /// What to do when routing a frame fails.
    pub on_handler_error: HandlerErrorPolicy,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The read loop is consuming the stream.
    Running,
    /// Close requested; the read loop has not exited yet.
    Closing,
    /// The byte source is released and the router notified.
    Closed,
}

impl SessionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum CloseReason {
    Requested,
    EndOfStream,
    ChunkTooBig,
    ReadError,
    HandlerError,
}

impl CloseReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::EndOfStream => "end_of_stream",
            Self::ChunkTooBig => "chunk_too_big",
            Self::ReadError => "read_error",
            Self::HandlerError => "handler_error",
        }
    }
}

#[derive(Debug)]
struct Shared {
    id: Uuid,
    started_at: DateTime<Utc>,
    kind: StreamKind,
    /// Done: cancelled by the first close.
    cancel: CancellationToken,
    /// Wait: cancelled when the read loop has exited.
    finished: CancellationToken,
    close_guard: CloseOnce,
}

impl Shared {
    fn close(&self) -> bool {
        if !self.close_guard.try_close() {
            return false;
        }
        tracing::debug!(session_id = %self.id, stream = %self.kind, "Closing stream session");
        self.cancel.cancel();
        true
    }
}

/// A running stream with its background read loop.
///
/// Dropping the session closes it. Share it behind an `Arc` to close from
/// several tasks.
#[derive(Debug)]
pub struct StreamSession {
    shared: Arc<Shared>,
}

impl StreamSession {
    /// Issue a streaming GET and start reading the response.
    ///
    /// # Errors
    ///
    /// - [`StreamError::Http`] if the request fails before a response arrives
    /// - [`StreamError::Status`] if the response status is not 2xx
    pub async fn open<F>(
        client: &reqwest::Client,
        url: &str,
        headers: HeaderMap,
        router: F,
        options: SessionOptions,
    ) -> Result<Self, StreamError>
    where
        F: FrameRouter,
    {
        tracing::info!(url = %url, stream = %router.kind(), "Opening stream");

        let response = client.get(url).headers(headers).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(body);
            tracing::warn!(status = status.as_u16(), message = %message, "Stream request rejected");
            return Err(StreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        Ok(Self::spawn(StreamReader::new(body), router, options))
    }

    /// Start a session over any byte source.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<R, F>(reader: R, router: F, options: SessionOptions) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        F: FrameRouter,
    {
        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            kind: router.kind(),
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            close_guard: CloseOnce::new(),
        });

        tracing::info!(session_id = %shared.id, stream = %shared.kind, "Stream session started");
        tokio::spawn(read_loop(Arc::clone(&shared), reader, router, options));

        Self { shared }
    }

    /// Request the session to close.
    ///
    /// Safe to call any number of times from any task. Returns `true` only
    /// for the call that performed the close.
    pub fn close(&self) -> bool {
        self.shared.close()
    }

    /// Future that resolves once the session is closed by any trigger.
    #[must_use]
    pub fn done(&self) -> WaitForCancellationFutureOwned {
        self.shared.cancel.clone().cancelled_owned()
    }

    /// Whether a close has been requested.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Wait until the read loop has exited and the router has been notified.
    pub async fn wait(&self) {
        self.shared.finished.cancelled().await;
    }

    /// Close and wait for the read loop to exit.
    pub async fn shutdown(&self) {
        self.close();
        self.wait().await;
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.shared.finished.is_cancelled() {
            SessionState::Closed
        } else if self.shared.cancel.is_cancelled() {
            SessionState::Closing
        } else {
            SessionState::Running
        }
    }

    /// Session identifier used in logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// When the stream was opened.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.shared.started_at
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.shared.close();
    }
}

// =============================================================================
// Read Loop
// =============================================================================

async fn read_loop<R, F>(shared: Arc<Shared>, mut reader: R, mut router: F, options: SessionOptions)
where
    R: AsyncRead + Unpin + Send + 'static,
    F: FrameRouter,
{
    // Wait must fire even if a handler panics.
    let finished = shared.finished.clone().drop_guard();
    let stream = shared.kind;
    metrics::record_session_opened(stream);

    let mut decoder = FrameDecoder::new(options.decoder);
    let mut frames_total: u64 = 0;

    let reason = 'read: loop {
        tokio::select! {
            biased;

            () = shared.cancel.cancelled() => break CloseReason::Requested,

            result = decoder.next(&mut reader) => match result {
                Ok(frames) => {
                    let count = frames.len() as u64;
                    frames_total += count;
                    metrics::record_frames(stream, count);

                    for frame in frames {
                        if let Err(error) = router.handle(frame) {
                            metrics::record_handler_error(stream);
                            if options.on_handler_error.apply(error) == Verdict::Stop {
                                break 'read CloseReason::HandlerError;
                            }
                        }
                    }
                }
                Err(FrameError::EndOfStream) => {
                    tracing::info!(session_id = %shared.id, "Stream ended by server");
                    break CloseReason::EndOfStream;
                }
                Err(e @ FrameError::ChunkTooBig { .. }) => {
                    tracing::error!(session_id = %shared.id, error = %e, "Frame too large, closing stream");
                    break CloseReason::ChunkTooBig;
                }
                Err(e @ FrameError::Io(_)) => {
                    tracing::warn!(session_id = %shared.id, error = %e, "Stream read failed");
                    break CloseReason::ReadError;
                }
            },
        }
    };

    shared.close();
    drop(reader);
    router.on_close();

    let lifetime = (Utc::now() - shared.started_at).to_std().unwrap_or_default();
    metrics::record_session_closed(stream, reason.as_str(), lifetime);
    tracing::info!(
        session_id = %shared.id,
        stream = %stream,
        reason = reason.as_str(),
        frames = frames_total,
        lifetime_ms = lifetime.as_millis(),
        "Stream session closed"
    );

    drop(finished);
}

// =============================================================================
// Tests
// =============================================================================
