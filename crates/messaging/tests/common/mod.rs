//! Helpers shared by the messaging integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, future, stream};
use ticketing_events::Event;
use ticketing_messaging::{
    AckMessage, ConsumerConfig, ConsumerInfo, DEFAULT_STREAM_NAME, LogStore, LogStoreError,
    MessageHandler, MessageHandlerError, MessageStream, Payload, PublishAck, StreamConfig,
    Subscriber, SubscriberConfig, SubscriberOptions, ensure_catalog_stream,
};
use ticketing_messaging_memory::{self as memory, MemoryConsumer, MemoryLogStore, MemoryMessage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What the recording handler does after recording a message.
#[derive(Clone, Copy, Debug)]
pub enum Settle {
    Ack,
    Ignore,
    Fail,
}

/// A message as the handler saw it.
#[derive(Debug)]
pub struct Received<T> {
    pub payload: Payload<T>,
    pub sequence: u64,
    pub delivered: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("handler failed")]
pub struct HandlerFailed;

impl MessageHandlerError for HandlerFailed {}

/// Forwards every message to a channel, then settles it.
#[derive(Clone, Debug)]
pub struct Recorder<T> {
    sender: mpsc::UnboundedSender<Received<T>>,
    settle: Settle,
    cancel: Option<CancellationToken>,
}

impl<T> Recorder<T> {
    pub fn new(settle: Settle) -> (Self, mpsc::UnboundedReceiver<Received<T>>) {
        let (sender, receiver) = mpsc::unbounded_channel();

        (
            Self {
                sender,
                settle,
                cancel: None,
            },
            receiver,
        )
    }

    /// Cancels `token` once the first message is settled.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[async_trait]
impl<E> MessageHandler<E, MemoryMessage> for Recorder<E::Data>
where
    E: Event,
{
    type Error = HandlerFailed;

    async fn on_message(
        &self,
        data: Payload<E::Data>,
        message: MemoryMessage,
    ) -> Result<(), Self::Error> {
        let _ = self.sender.send(Received {
            payload: data,
            sequence: message.stream_sequence(),
            delivered: message.delivered(),
        });

        let settled = match self.settle {
            Settle::Ack => message.ack().await.map_err(|_| HandlerFailed),
            Settle::Ignore => Ok(()),
            Settle::Fail => Err(HandlerFailed),
        };

        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }

        settled
    }
}

pub async fn store_with_catalog() -> MemoryLogStore {
    let store = MemoryLogStore::new();
    ensure_catalog_stream(&store, DEFAULT_STREAM_NAME)
        .await
        .unwrap();
    store
}

pub async fn subscriber<E>(
    store: &MemoryLogStore,
    durable_name: &str,
    options: SubscriberOptions,
    handler: Recorder<E::Data>,
) -> Subscriber<MemoryLogStore, E, Recorder<E::Data>>
where
    E: Event,
{
    Subscriber::new(SubscriberConfig {
        store: store.clone(),
        stream_name: DEFAULT_STREAM_NAME.to_string(),
        durable_name: durable_name.to_string(),
        options,
        handler,
    })
    .await
}

pub fn drain<T>(receiver: &mut mpsc::UnboundedReceiver<Received<T>>) -> Vec<Received<T>> {
    let mut received = Vec::new();
    while let Ok(message) = receiver.try_recv() {
        received.push(message);
    }
    received
}

/// Failure injected by [`FlakyStore`].
#[derive(Debug, thiserror::Error)]
pub enum FlakyError {
    /// The store could not be reached.
    #[error("store unavailable")]
    Unavailable,

    /// A concurrent create got there first.
    #[error("already exists")]
    AlreadyExists,

    #[error(transparent)]
    Store(#[from] memory::Error),
}

impl LogStoreError for FlakyError {
    fn is_conflict(&self) -> bool {
        match self {
            Self::AlreadyExists => true,
            Self::Store(e) => e.is_conflict(),
            Self::Unavailable => false,
        }
    }

    fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

/// Memory store that fails or races a configurable number of calls.
#[derive(Clone, Debug)]
pub struct FlakyStore {
    inner: MemoryLogStore,
    failing_pulls: Arc<AtomicUsize>,
    failing_lists: Arc<AtomicUsize>,
    racing_creates: Arc<AtomicUsize>,
    held_open: bool,
}

impl FlakyStore {
    pub fn new(inner: MemoryLogStore) -> Self {
        Self {
            inner,
            failing_pulls: Arc::new(AtomicUsize::new(0)),
            failing_lists: Arc::new(AtomicUsize::new(0)),
            racing_creates: Arc::new(AtomicUsize::new(0)),
            held_open: false,
        }
    }

    /// Pulls deliver what is ready, then stay open until they expire, the
    /// way a JetStream batch that is not full does.
    pub fn holding_pulls_open(mut self) -> Self {
        self.held_open = true;
        self
    }

    /// The next `count` pulls fail with [`FlakyError::Unavailable`].
    pub fn fail_pulls(&self, count: usize) {
        self.failing_pulls.store(count, Ordering::SeqCst);
    }

    /// The next `count` consumer listings fail with [`FlakyError::Unavailable`].
    pub fn fail_consumer_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// The next `count` stream or consumer creates succeed, then report
    /// [`FlakyError::AlreadyExists`] as if another process won the race.
    pub fn race_creates(&self, count: usize) {
        self.racing_creates.store(count, Ordering::SeqCst);
    }

    pub const fn inner(&self) -> &MemoryLogStore {
        &self.inner
    }

    pub fn remaining_pull_failures(&self) -> usize {
        self.failing_pulls.load(Ordering::SeqCst)
    }

    pub fn remaining_list_failures(&self) -> usize {
        self.failing_lists.load(Ordering::SeqCst)
    }

    pub fn remaining_races(&self) -> usize {
        self.racing_creates.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl LogStore for FlakyStore {
    type Error = FlakyError;
    type Consumer = MemoryConsumer;
    type Message = MemoryMessage;

    async fn streams(&self) -> Result<Vec<StreamConfig>, Self::Error> {
        Ok(self.inner.streams().await?)
    }

    async fn create_stream(&self, config: StreamConfig) -> Result<StreamConfig, Self::Error> {
        let created = self.inner.create_stream(config).await?;

        if take_one(&self.racing_creates) {
            return Err(FlakyError::AlreadyExists);
        }

        Ok(created)
    }

    async fn update_stream(&self, config: StreamConfig) -> Result<StreamConfig, Self::Error> {
        Ok(self.inner.update_stream(config).await?)
    }

    async fn consumers(&self, stream_name: &str) -> Result<Vec<ConsumerInfo>, Self::Error> {
        if take_one(&self.failing_lists) {
            return Err(FlakyError::Unavailable);
        }

        Ok(self.inner.consumers(stream_name).await?)
    }

    async fn bind_consumer(
        &self,
        stream_name: &str,
        durable_name: &str,
    ) -> Result<Self::Consumer, Self::Error> {
        Ok(self.inner.bind_consumer(stream_name, durable_name).await?)
    }

    async fn create_consumer(
        &self,
        stream_name: &str,
        config: ConsumerConfig,
    ) -> Result<Self::Consumer, Self::Error> {
        let created = self.inner.create_consumer(stream_name, config).await?;

        if take_one(&self.racing_creates) {
            return Err(FlakyError::AlreadyExists);
        }

        Ok(created)
    }

    async fn consumer_info(&self, consumer: &Self::Consumer) -> Result<ConsumerInfo, Self::Error> {
        Ok(self.inner.consumer_info(consumer).await?)
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishAck, Self::Error> {
        Ok(self.inner.publish(subject, payload).await?)
    }

    async fn pull(
        &self,
        consumer: &Self::Consumer,
        max_messages: usize,
        expires: Duration,
    ) -> Result<MessageStream<Self::Message, Self::Error>, Self::Error> {
        if take_one(&self.failing_pulls) {
            return Err(FlakyError::Unavailable);
        }

        let delivered = self
            .inner
            .pull(consumer, max_messages, expires)
            .await?
            .map_err(FlakyError::Store);

        if !self.held_open {
            return Ok(delivered.boxed());
        }

        let open_until_expiry = stream::once(tokio::time::sleep(expires))
            .filter_map(|()| future::ready(None::<Result<MemoryMessage, FlakyError>>));

        Ok(delivered.chain(open_until_expiry).boxed())
    }
}

pub async fn flaky_subscriber<E>(
    store: &FlakyStore,
    durable_name: &str,
    options: SubscriberOptions,
    handler: Recorder<E::Data>,
) -> Subscriber<FlakyStore, E, Recorder<E::Data>>
where
    E: Event,
{
    Subscriber::new(SubscriberConfig {
        store: store.clone(),
        stream_name: DEFAULT_STREAM_NAME.to_string(),
        durable_name: durable_name.to_string(),
        options,
        handler,
    })
    .await
}
