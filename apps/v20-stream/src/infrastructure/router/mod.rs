//! Message Routers
//!
//! [`FrameRouter`](crate::application::ports::FrameRouter) adapters for the
//! two v20 streaming endpoints.

pub mod pricing;
pub mod transaction;

pub use pricing::PricingRouter;
pub use transaction::TransactionRouter;
