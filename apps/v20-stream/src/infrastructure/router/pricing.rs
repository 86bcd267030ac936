//! Pricing Router
//!
//! Decodes each pricing frame into a pooled [`Price`] record. Heartbeats go
//! to [`PriceHandler::on_heartbeat`] and their record returns to the pool
//! immediately; every other frame hands its record to
//! [`PriceHandler::on_price`].

use std::sync::Arc;

use crate::application::pool::{DEFAULT_MAX_IDLE, RecordPool};
use crate::application::ports::{FrameRouter, PriceHandler, RouteError};
use crate::domain::StreamKind;
use crate::domain::pricing::{Price, PricingHeartbeat};
use crate::infrastructure::metrics;

/// Router for `pricing/stream` responses.
#[derive(Debug)]
pub struct PricingRouter<H> {
    handler: H,
    pool: Arc<RecordPool<Price>>,
}

impl<H: PriceHandler> PricingRouter<H> {
    /// Create a router with a private record pool.
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self::with_pool(handler, RecordPool::shared(DEFAULT_MAX_IDLE))
    }

    /// Create a router that lends records from `pool`.
    #[must_use]
    pub const fn with_pool(handler: H, pool: Arc<RecordPool<Price>>) -> Self {
        Self { handler, pool }
    }

    /// The pool records are lent from.
    #[must_use]
    pub const fn pool(&self) -> &Arc<RecordPool<Price>> {
        &self.pool
    }
}

impl<H: PriceHandler> FrameRouter for PricingRouter<H> {
    fn handle(&mut self, frame: &[u8]) -> Result<(), RouteError> {
        let mut record = self.pool.acquire();
        *record = serde_json::from_slice(frame)?;

        if record.is_heartbeat() {
            let heartbeat = PricingHeartbeat { time: record.time };
            record.release();
            metrics::record_heartbeat(StreamKind::Pricing);
            return self
                .handler
                .on_heartbeat(heartbeat)
                .map_err(RouteError::Handler);
        }

        metrics::record_message(StreamKind::Pricing);
        self.handler.on_price(record).map_err(RouteError::Handler)
    }

    fn on_close(&mut self) {
        self.handler.on_close();
    }

    fn kind(&self) -> StreamKind {
        StreamKind::Pricing
    }
}
