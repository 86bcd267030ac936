//! Configuration Module
//!
//! Configuration loading for the streaming client.

mod settings;

pub use settings::{
    ClientConfig, ConfigError, Credentials, Environment, HttpSettings, LIVE_STREAM_URL,
    PRACTICE_STREAM_URL, StreamSettings,
};
