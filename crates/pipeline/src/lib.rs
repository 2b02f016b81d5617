//! Consume-normalize-persist-relay pipeline.
//!
//! [`Coordinator`] fans one normalized message out to the store and the push
//! channel; [`ConsumerSession`] drives the broker poll loop and its
//! reconnect state machine. The two external sinks fail independently and
//! neither can stop the consume loop.

pub mod coordinator;
pub mod error;
pub mod session;

pub use coordinator::Coordinator;
pub use error::PipelineError;
pub use session::{ConsumerSession, SessionState};
