//! Transaction Router
//!
//! Classifies each transaction frame by its `type` tag. Heartbeats go to
//! [`TransactionHandler::on_heartbeat`]; anything else is resolved to a
//! [`Transaction`](crate::domain::transaction::Transaction) variant, with
//! unknown kinds kept as raw JSON, and passed to
//! [`TransactionHandler::on_transaction`].

use crate::application::ports::{FrameRouter, RouteError, TransactionHandler};
use crate::domain::StreamKind;
use crate::domain::transaction::TransactionEvent;
use crate::infrastructure::metrics;

/// Router for `transactions/stream` responses.
#[derive(Debug)]
pub struct TransactionRouter<H> {
    handler: H,
}

impl<H: TransactionHandler> TransactionRouter<H> {
    /// Create a router delivering to `handler`.
    #[must_use]
    pub const fn new(handler: H) -> Self {
        Self { handler }
    }
}

impl<H: TransactionHandler> FrameRouter for TransactionRouter<H> {
    fn handle(&mut self, frame: &[u8]) -> Result<(), RouteError> {
        let result = match TransactionEvent::from_slice(frame)? {
            TransactionEvent::Heartbeat(heartbeat) => {
                metrics::record_heartbeat(StreamKind::Transactions);
                self.handler.on_heartbeat(heartbeat)
            }
            TransactionEvent::Transaction(transaction) => {
                metrics::record_message(StreamKind::Transactions);
                self.handler.on_transaction(*transaction)
            }
        };
        result.map_err(RouteError::Handler)
    }

    fn on_close(&mut self) {
        self.handler.on_close();
    }

    fn kind(&self) -> StreamKind {
        StreamKind::Transactions
    }
}
