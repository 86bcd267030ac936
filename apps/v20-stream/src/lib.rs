#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::cast_possible_truncation
    )
)]

//! v20 Stream - Streaming transport for the v20 pricing and transaction APIs
//!
//! Opens the long-lived chunked HTTP responses served by
//! `/v3/accounts/{accountID}/pricing/stream` and
//! `/v3/accounts/{accountID}/transactions/stream`, reassembles JSON object
//! frames from the raw byte stream and delivers them, in arrival order, to
//! consumer callbacks.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Wire types with no I/O
//!   - `pricing`: price ticks and pricing heartbeats
//!   - `transaction`: account transactions (open set) and heartbeats
//!
//! - **Application**: Port definitions and shared building blocks
//!   - `ports`: `FrameRouter`, `PriceHandler`, `TransactionHandler`
//!   - `pool`: reusable price records lent to handlers
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `stream`: frame decoder, session lifecycle, handler error policy
//!   - `router`: pricing and transaction routers
//!   - `http`: `reqwest` client and endpoint builders
//!   - `config`: configuration from environment variables
//!   - `metrics`, `telemetry`: observability
//!
//! # Data Flow
//!
//! ```text
//! HTTP body ──► FrameDecoder ──► FrameRouter ──► PriceHandler / TransactionHandler
//!   (chunks)      (frames)       (classify)        on_price / on_transaction
//!                                                  on_heartbeat / on_close
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Wire types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions and shared building blocks.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::StreamKind;
pub use domain::pricing::{Price, PriceBucket, PricingHeartbeat};
pub use domain::transaction::{Transaction, TransactionEvent, TransactionHeartbeat};

// Ports
pub use application::pool::{Pooled, RecordPool};
pub use application::ports::{
    FrameRouter, PriceHandler, RouteError, TransactionHandler,
};

// Streaming transport
pub use infrastructure::stream::{
    CloseOnce, DecoderConfig, FrameDecoder, FrameError, HandlerErrorPolicy, SessionOptions,
    SessionState, StreamError, StreamSession, trim_object_boundaries,
};

// Routers
pub use infrastructure::router::{PricingRouter, TransactionRouter};

// HTTP client
pub use infrastructure::http::{StreamClient, pricing_stream_url, transaction_stream_url};

// Infrastructure config
pub use infrastructure::config::{ClientConfig, ConfigError, Credentials, Environment};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
