//! Typed publish/subscribe over a replayable message log.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

/// Typed appends of events to their subjects.
pub mod publisher;

/// Primitive operations a replayable log must offer.
pub mod store;

/// Creating and reconciling the shared stream.
pub mod stream;

/// Durable consumers and the pull loop.
pub mod subscriber;

pub use error::Error;
pub use publisher::{Publisher, publish_event};
pub use store::{
    AckMessage, AckPolicy, ConsumerConfig, ConsumerInfo, DeliverPolicy, LogStore, LogStoreError,
    MessageStream, PublishAck, Retention, StreamConfig,
};
pub use stream::{EnsureOutcome, StreamHandle, ensure_catalog_stream, ensure_stream};
pub use subscriber::{
    MessageHandler, MessageHandlerError, Payload, Subscriber, SubscriberConfig, SubscriberOptions,
};

/// Stream name used when none is configured.
pub const DEFAULT_STREAM_NAME: &str = "ticketing";
