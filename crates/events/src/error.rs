use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload did not match the schema of its subject.
    #[error("invalid payload for {subject}: {source}")]
    InvalidPayload {
        /// The subject the payload was decoded for.
        subject: crate::Subject,

        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Payload could not be encoded.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// The subject is not part of the catalog.
    #[error("unknown subject: {0}")]
    UnknownSubject(String),
}
