//! Streaming Transport
//!
//! Byte stream to frames to router callbacks:
//!
//! - [`decoder`]: reassembles JSON object frames from arbitrary chunks
//! - [`session`]: owns the byte source and the background read loop
//! - [`policy`]: what the read loop does when a frame fails to route

pub mod decoder;
pub mod policy;
pub mod session;

pub use decoder::{DecoderConfig, FrameDecoder, FrameError, Frames, trim_object_boundaries};
pub use policy::HandlerErrorPolicy;
pub use session::{CloseOnce, SessionOptions, SessionState, StreamError, StreamSession};
