//! Built-in consumers.
//!
//! - [`RecordingConsumer`]: records the operation string of every blocking call
//! - [`DenyBlocking`]: rejects blocking calls, surfacing an error at the call site

pub mod deny;
pub mod recording;

pub use deny::DenyBlocking;
pub use recording::RecordingConsumer;
