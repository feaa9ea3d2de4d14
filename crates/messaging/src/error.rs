use crate::store::LogStoreError;

use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error<E>
where
    E: LogStoreError,
{
    /// Subscriber already started.
    #[error("subscriber already started")]
    AlreadyStarted,

    /// A durable consumer exists with a different identity.
    #[error(
        "consumer `{durable}` on stream `{stream}` has {field} `{found}`, expected `{expected}`"
    )]
    ConsumerConflict {
        /// The stream holding the consumer.
        stream: String,

        /// The durable name.
        durable: String,

        /// The conflicting configuration field.
        field: &'static str,

        /// The requested value.
        expected: String,

        /// The stored value.
        found: String,
    },

    /// A stream needs at least one subject.
    #[error("stream `{0}` needs at least one subject")]
    EmptySubjects(String),

    /// Event catalog error.
    #[error(transparent)]
    Events(#[from] ticketing_events::Error),

    /// The store error.
    #[error(transparent)]
    Store(E),

    /// A stream vanished while it was being reconciled.
    #[error("stream `{0}` not found")]
    StreamNotFound(String),
}

impl<E> Error<E>
where
    E: LogStoreError,
{
    /// Whether the underlying store reported a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }
}
