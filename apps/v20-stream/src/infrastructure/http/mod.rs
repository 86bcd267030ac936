//! HTTP transport for the v20 streaming endpoints.

mod client;

pub use client::{StreamClient, pricing_stream_url, stream_headers, transaction_stream_url};
