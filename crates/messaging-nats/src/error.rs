use std::time::Duration;

use thiserror::Error;
use ticketing_messaging::LogStoreError;

/// Errors that can occur when using the NATS log store.
///
/// JetStream error kinds differ per call, so each variant carries the
/// rendered error and classification is done on the message.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Acknowledging a message failed.
    #[error("NATS message ack error: {0}")]
    Ack(String),

    /// Connecting to the server failed.
    #[error("NATS connect error: {0}")]
    Connect(String),

    /// Creating a consumer failed.
    #[error("NATS JetStream consumer create error: {0}")]
    ConsumerCreate(String),

    /// Looking up a consumer failed.
    #[error("NATS JetStream consumer get error: {0}")]
    ConsumerGet(String),

    /// Fetching consumer info failed.
    #[error("NATS JetStream consumer info error: {0}")]
    ConsumerInfo(String),

    /// Listing consumers failed.
    #[error("NATS JetStream consumer list error: {0}")]
    ConsumerList(String),

    /// A delivered message carried no JetStream metadata.
    #[error("NATS JetStream message info error: {0}")]
    MessageInfo(String),

    /// Pulling messages failed.
    #[error("NATS JetStream pull error: {0}")]
    Pull(String),

    /// Publishing failed or was not acknowledged.
    #[error("NATS JetStream publish error: {0}")]
    Publish(String),

    /// Creating a stream failed.
    #[error("NATS JetStream stream create error: {0}")]
    StreamCreate(String),

    /// Looking up a stream failed.
    #[error("NATS JetStream stream get error: {0}")]
    StreamGet(String),

    /// Listing streams failed.
    #[error("NATS JetStream stream list error: {0}")]
    StreamList(String),

    /// Updating a stream failed.
    #[error("NATS JetStream stream update error: {0}")]
    StreamUpdate(String),

    /// The operation did not complete in time.
    #[error("NATS operation {operation} timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,

        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The server reported a policy this crate cannot represent.
    #[error("unsupported NATS consumer policy: {0}")]
    UnsupportedPolicy(String),
}

impl LogStoreError for Error {
    fn is_conflict(&self) -> bool {
        match self {
            Self::StreamCreate(e) | Self::ConsumerCreate(e) => {
                e.contains("already in use") || e.contains("already exists")
            }
            _ => false,
        }
    }

    fn is_retriable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Connect(e)
            | Self::ConsumerCreate(e)
            | Self::ConsumerGet(e)
            | Self::ConsumerInfo(e)
            | Self::ConsumerList(e)
            | Self::Pull(e)
            | Self::Publish(e)
            | Self::StreamGet(e)
            | Self::StreamList(e) => is_retriable_jetstream_error(e),
            _ => false,
        }
    }
}

fn is_retriable_jetstream_error(error_str: &str) -> bool {
    error_str.contains("timeout")
        || error_str.contains("timed out")
        || error_str.contains("connection")
        || error_str.contains("unavailable")
        || error_str.contains("temporary")
        || error_str.contains("no responders")
}
