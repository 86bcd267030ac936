//! Domain Layer - Wire types for the v20 streaming endpoints.
//!
//! This layer contains the payloads carried by the pricing and transaction
//! streams. All types here are plain data with serde support and no
//! knowledge of the transport that delivers them.

/// Pricing stream payloads (price ticks and heartbeats).
pub mod pricing;

/// Transaction stream payloads (transaction variants and heartbeats).
pub mod transaction;

/// Type tag the server uses for keep-alive frames on every stream.
pub const HEARTBEAT_TYPE: &str = "HEARTBEAT";

/// Which streaming endpoint a session is attached to.
///
/// Used as a label for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// `/v3/accounts/{id}/pricing/stream`.
    Pricing,
    /// `/v3/accounts/{id}/transactions/stream`.
    Transactions,
    /// A session whose router does not identify its protocol.
    Raw,
}

impl StreamKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pricing => "pricing",
            Self::Transactions => "transactions",
            Self::Raw => "raw",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
