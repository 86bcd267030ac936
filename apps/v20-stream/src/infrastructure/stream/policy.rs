//! Handler Error Policy
//!
//! What a session does when routing a single frame fails (malformed JSON or
//! a handler callback returning an error).

use tokio::sync::mpsc;

use crate::application::ports::RouteError;

/// Reaction to a per-frame routing failure.
#[derive(Debug, Clone, Default)]
pub enum HandlerErrorPolicy {
    /// Drop the frame and keep streaming.
    #[default]
    Continue,
    /// Close the session.
    Close,
    /// Forward the error on a channel and keep streaming.
    ///
    /// Sending never blocks the read loop; if the channel is full or closed
    /// the report is dropped.
    Report(mpsc::Sender<RouteError>),
}

impl HandlerErrorPolicy {
    /// Parse the environment form: `continue` or `close`.
    ///
    /// `Report` carries a channel and can only be built in code.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Some(Self::Continue),
            "close" => Some(Self::Close),
            _ => None,
        }
    }

    /// Policy name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Close => "close",
            Self::Report(_) => "report",
        }
    }
}

/// Outcome of applying a policy to one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    KeepReading,
    Stop,
}

impl HandlerErrorPolicy {
    pub(crate) fn apply(&self, error: RouteError) -> Verdict {
        match self {
            Self::Continue => {
                tracing::debug!(error = %error, "Dropping frame after routing failure");
                Verdict::KeepReading
            }
            Self::Close => {
                tracing::warn!(error = %error, "Closing stream after routing failure");
                Verdict::Stop
            }
            Self::Report(tx) => {
                if let Err(e) = tx.try_send(error) {
                    tracing::warn!(error = %e, "Routing failure report dropped");
                }
                Verdict::KeepReading
            }
        }
    }
}
