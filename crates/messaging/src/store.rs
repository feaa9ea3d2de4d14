use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{self, Debug};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Marker trait for log store errors.
pub trait LogStoreError: Debug + Error + Send + Sync + 'static {
    /// Whether the error reports that the resource already exists with other
    /// configuration (typically a concurrent create from another process).
    fn is_conflict(&self) -> bool {
        false
    }

    /// Whether the store may succeed if the call is repeated later, such as
    /// after a timeout or a dropped connection.
    fn is_retriable(&self) -> bool {
        false
    }
}

/// Messages of one pull, yielded as the store delivers them.
pub type MessageStream<M, E> = BoxStream<'static, Result<M, E>>;

/// When a stream may discard messages.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Retention {
    /// Keep a message until every interested consumer has acknowledged it.
    #[default]
    Interest,

    /// Keep messages until stream limits are reached.
    Limits,

    /// Keep a message until any consumer has acknowledged it.
    WorkQueue,
}

/// Configuration of a stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamConfig {
    /// The stream name.
    pub name: String,

    /// Subjects routed into the stream.
    pub subjects: BTreeSet<String>,

    /// Retention policy.
    pub retention: Retention,
}

impl StreamConfig {
    /// An interest-retention stream over the given subjects.
    pub fn interest<N, I, S>(name: N, subjects: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            subjects: subjects.into_iter().map(Into::into).collect(),
            retention: Retention::Interest,
        }
    }
}

/// How deliveries must be acknowledged.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AckPolicy {
    /// Every message is acknowledged individually.
    #[default]
    Explicit,

    /// Acknowledging a message acknowledges every earlier one.
    All,

    /// Deliveries need no acknowledgement.
    None,
}

impl fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => f.write_str("explicit"),
            Self::All => f.write_str("all"),
            Self::None => f.write_str("none"),
        }
    }
}

/// Where a new consumer starts reading.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DeliverPolicy {
    /// From the earliest retained message.
    #[default]
    All,

    /// From the most recent message.
    Last,

    /// Only messages appended after creation.
    New,

    /// From the given stream sequence.
    ByStartSequence(u64),

    /// From the last message of every subject.
    LastPerSubject,
}

impl fmt::Display for DeliverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Last => f.write_str("last"),
            Self::New => f.write_str("new"),
            Self::ByStartSequence(seq) => write!(f, "by_start_sequence({seq})"),
            Self::LastPerSubject => f.write_str("last_per_subject"),
        }
    }
}

/// Store-side configuration of a durable consumer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsumerConfig {
    /// Durable name, unique on the stream.
    pub durable_name: String,

    /// The one subject the consumer receives.
    pub filter_subject: String,

    /// Acknowledgement policy.
    pub ack_policy: AckPolicy,

    /// Start position for a new consumer.
    pub deliver_policy: DeliverPolicy,

    /// Time before an unacknowledged delivery is redelivered.
    pub ack_wait: Duration,
}

impl ConsumerConfig {
    /// A durable, explicitly-acked, deliver-all consumer on one subject.
    pub fn durable<N, S>(durable_name: N, filter_subject: S, ack_wait: Duration) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        Self {
            durable_name: durable_name.into(),
            filter_subject: filter_subject.into(),
            ack_policy: AckPolicy::Explicit,
            deliver_policy: DeliverPolicy::All,
            ack_wait,
        }
    }
}

/// Stored state of a consumer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsumerInfo {
    /// The stream the consumer reads.
    pub stream_name: String,

    /// Stored configuration.
    pub config: ConsumerConfig,

    /// Highest stream sequence below which everything is acknowledged.
    pub ack_floor: u64,

    /// Matching messages not yet delivered.
    pub num_pending: u64,

    /// Delivered messages awaiting acknowledgement.
    pub num_ack_pending: u64,
}

/// Store acknowledgement of an append.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublishAck {
    /// The stream that stored the message.
    pub stream: String,

    /// Sequence assigned to the message.
    pub sequence: u64,
}

/// A delivered message that the receiver settles.
#[async_trait]
pub trait AckMessage
where
    Self: Debug + Send + Sync + 'static,
{
    /// The error type for settling the message.
    type Error: LogStoreError;

    /// The subject the message was published under.
    fn subject(&self) -> &str;

    /// The raw payload.
    fn payload(&self) -> &Bytes;

    /// The stream sequence of the message.
    fn stream_sequence(&self) -> u64;

    /// How many times the message has been delivered, this delivery included.
    fn delivered(&self) -> u64;

    /// Acknowledges the message so it is not delivered again.
    async fn ack(&self) -> Result<(), Self::Error>;

    /// Asks for immediate redelivery.
    async fn nak(&self) -> Result<(), Self::Error>;

    /// Resets the ack-wait timer while processing continues.
    async fn in_progress(&self) -> Result<(), Self::Error>;
}

/// A persistent, replayable log holding streams and their durable consumers.
#[async_trait]
pub trait LogStore
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the store.
    type Error: LogStoreError;

    /// Handle bound to one durable consumer.
    type Consumer: Clone + Debug + Send + Sync + 'static;

    /// Message type handed out by pulls.
    type Message: AckMessage;

    /// Lists the configuration of every stream.
    async fn streams(&self) -> Result<Vec<StreamConfig>, Self::Error>;

    /// Creates a stream.
    async fn create_stream(&self, config: StreamConfig) -> Result<StreamConfig, Self::Error>;

    /// Replaces the configuration of an existing stream.
    async fn update_stream(&self, config: StreamConfig) -> Result<StreamConfig, Self::Error>;

    /// Lists every consumer on a stream.
    async fn consumers(&self, stream_name: &str) -> Result<Vec<ConsumerInfo>, Self::Error>;

    /// Binds to an existing durable consumer.
    async fn bind_consumer(
        &self,
        stream_name: &str,
        durable_name: &str,
    ) -> Result<Self::Consumer, Self::Error>;

    /// Creates a durable consumer.
    async fn create_consumer(
        &self,
        stream_name: &str,
        config: ConsumerConfig,
    ) -> Result<Self::Consumer, Self::Error>;

    /// Fetches the stored state of a bound consumer.
    async fn consumer_info(&self, consumer: &Self::Consumer) -> Result<ConsumerInfo, Self::Error>;

    /// Appends a payload under a subject and waits for the store to acknowledge it.
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishAck, Self::Error>;

    /// Requests up to `max_messages`, delivered over at most `expires`.
    ///
    /// Each message is yielded as soon as it arrives; the stream ends once
    /// the batch is complete or the request expires. A message's ack-wait
    /// runs from its delivery, so callers should handle it before awaiting
    /// the next.
    async fn pull(
        &self,
        consumer: &Self::Consumer,
        max_messages: usize,
        expires: Duration,
    ) -> Result<MessageStream<Self::Message, Self::Error>, Self::Error>;
}
