//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the streaming transport and the concrete
//! implementations of the port interfaces defined in the application layer.

/// Frame decoding and stream session lifecycle.
pub mod stream;

/// Pricing and transaction frame routers.
pub mod router;

/// HTTP client for the streaming endpoints.
pub mod http;

/// Configuration from environment variables.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
