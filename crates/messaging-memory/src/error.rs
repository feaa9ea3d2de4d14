use thiserror::Error;
use ticketing_messaging::LogStoreError;

/// Error type for in-memory log store operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// A consumer with that durable name exists with other configuration.
    #[error("consumer name `{0}` already in use")]
    ConsumerNameInUse(String),

    /// No consumer with that durable name.
    #[error("consumer `{0}` not found")]
    ConsumerNotFound(String),

    /// The filter subject is not covered by the stream's subjects.
    #[error("filter subject `{filter}` is not a subset of stream `{stream}`")]
    FilterNotInStream {
        /// The requested filter.
        filter: String,

        /// The stream.
        stream: String,
    },

    /// Durable names must be non-empty and free of `.`, `*`, `>` and whitespace.
    #[error("invalid durable name `{0}`")]
    InvalidDurableName(String),

    /// Retention cannot change once a stream exists.
    #[error("retention of stream `{0}` cannot be changed")]
    ImmutableRetention(String),

    /// Stream names must be non-empty and free of `.`, `*`, `>` and whitespace.
    #[error("invalid stream name `{0}`")]
    InvalidStreamName(String),

    /// The subject is empty, has empty tokens, or misplaces a wildcard.
    #[error("invalid subject `{0}`")]
    InvalidSubject(String),

    /// No stream routes the subject.
    #[error("no stream routes subject `{0}`")]
    NoStreamForSubject(String),

    /// A stream with that name exists with other configuration.
    #[error("stream name `{0}` already in use")]
    StreamNameInUse(String),

    /// No stream with that name.
    #[error("stream `{0}` not found")]
    StreamNotFound(String),

    /// The subject overlaps the subjects of another stream.
    #[error("subject `{subject}` overlaps stream `{stream}`")]
    SubjectOverlap {
        /// The requested subject.
        subject: String,

        /// The stream already routing it.
        stream: String,
    },
}

impl LogStoreError for Error {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::ConsumerNameInUse(_) | Self::StreamNameInUse(_))
    }
}
