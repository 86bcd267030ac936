//! Application Layer - Port definitions and shared building blocks.
//!
//! This layer defines how stream consumers plug into the transport.

/// Port interfaces for routers and stream handlers.
pub mod ports;

/// Reusable record pool lent to pricing handlers.
pub mod pool;
