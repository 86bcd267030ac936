//! Port Interfaces
//!
//! Contracts between the streaming transport and the code that consumes
//! it, following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `PriceHandler`: receives price ticks and heartbeats from a pricing stream
//! - `TransactionHandler`: receives transactions and heartbeats from a
//!   transaction stream
//!
//! ## Driver Ports (Inbound)
//!
//! - `FrameRouter`: what a session pushes each decoded frame into
//!
//! All callbacks of one session run sequentially on that session's read
//! task, in network arrival order. A callback that blocks stalls the stream.

use crate::application::pool::Pooled;
use crate::domain::StreamKind;
use crate::domain::pricing::{Price, PricingHeartbeat};
use crate::domain::transaction::{Transaction, TransactionHeartbeat};

/// Failure to route a single frame.
///
/// Never fatal on its own; what the session does with it is decided by its
/// `HandlerErrorPolicy`.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The frame is not the JSON the router expected.
    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// The consumer's callback returned an error.
    #[error("handler failed: {0:#}")]
    Handler(anyhow::Error),
}

/// Protocol adapter a session dispatches frames to.
pub trait FrameRouter: Send + 'static {
    /// Handle one complete frame. The bytes are only valid for this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be decoded or the handler fails.
    fn handle(&mut self, frame: &[u8]) -> Result<(), RouteError>;

    /// Called exactly once, after the session has released its byte source.
    fn on_close(&mut self);

    /// Which stream this router speaks, for logs and metrics.
    fn kind(&self) -> StreamKind {
        StreamKind::Raw
    }
}

/// Consumer of a pricing stream.
#[cfg_attr(test, mockall::automock)]
pub trait PriceHandler: Send + 'static {
    /// A price tick. The record goes back to the router's pool when `price`
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Any error is reported to the session's handler error policy.
    fn on_price(&mut self, price: Pooled<Price>) -> anyhow::Result<()>;

    /// A keep-alive.
    ///
    /// # Errors
    ///
    /// Any error is reported to the session's handler error policy.
    fn on_heartbeat(&mut self, heartbeat: PricingHeartbeat) -> anyhow::Result<()>;

    /// The stream has closed.
    fn on_close(&mut self);
}

/// Consumer of a transaction stream.
#[cfg_attr(test, mockall::automock)]
pub trait TransactionHandler: Send + 'static {
    /// An account transaction.
    ///
    /// # Errors
    ///
    /// Any error is reported to the session's handler error policy.
    fn on_transaction(&mut self, transaction: Transaction) -> anyhow::Result<()>;

    /// A keep-alive carrying the last transaction ID.
    ///
    /// # Errors
    ///
    /// Any error is reported to the session's handler error policy.
    fn on_heartbeat(&mut self, heartbeat: TransactionHeartbeat) -> anyhow::Result<()>;

    /// The stream has closed.
    fn on_close(&mut self);
}
