//! In-memory implementation of the messaging log store.
//!
//! Mirrors the parts of JetStream the ticketing services rely on: interest
//! retention, explicit acknowledgement, ack-wait redelivery, filter subjects
//! and long-polling pulls.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod message;
mod state;
mod subject;

pub use error::Error;
pub use message::MemoryMessage;

use state::State;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use ticketing_messaging::{
    ConsumerConfig, ConsumerInfo, LogStore, MessageStream, PublishAck, StreamConfig,
};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

/// Handle bound to a durable consumer of a [`MemoryLogStore`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryConsumer {
    durable: String,
    stream: String,
}

impl MemoryConsumer {
    /// The durable name.
    #[must_use]
    pub fn durable_name(&self) -> &str {
        &self.durable
    }

    /// The stream the consumer reads.
    #[must_use]
    pub fn stream_name(&self) -> &str {
        &self.stream
    }
}

/// An in-process log store. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MemoryLogStore {
    notify: Arc<Notify>,
    state: Arc<Mutex<State>>,
}

impl MemoryLogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages the stream currently retains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamNotFound`] if the stream does not exist.
    pub async fn message_count(&self, stream_name: &str) -> Result<usize, Error> {
        self.state.lock().await.message_count(stream_name)
    }

    /// The last sequence assigned by the stream, counting dropped messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamNotFound`] if the stream does not exist.
    pub async fn last_sequence(&self, stream_name: &str) -> Result<u64, Error> {
        self.state.lock().await.last_sequence(stream_name)
    }

    /// Takes up to `max_messages` ready deliveries, waiting at most `expires`
    /// for the first one.
    ///
    /// Returns as soon as any delivery is ready; the messages are in flight
    /// from that moment.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream or the consumer does not exist.
    pub async fn fetch(
        &self,
        consumer: &MemoryConsumer,
        max_messages: usize,
        expires: Duration,
    ) -> Result<Vec<MemoryMessage>, Error> {
        let max_messages = max_messages.max(1);
        let expiry = Instant::now() + expires;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = Instant::now();
            let (batch, next_deadline) = {
                let mut state = self.state.lock().await;
                let batch =
                    state.take_ready(&consumer.stream, &consumer.durable, max_messages, now)?;
                let next_deadline = state.next_deadline(&consumer.stream, &consumer.durable)?;

                (batch, next_deadline)
            };

            if !batch.is_empty() {
                return Ok(batch
                    .into_iter()
                    .map(|delivery| MemoryMessage {
                        delivered: delivery.delivered,
                        durable: consumer.durable.clone(),
                        payload: delivery.payload,
                        sequence: delivery.sequence,
                        store: self.clone(),
                        stream: consumer.stream.clone(),
                        subject: delivery.subject,
                    })
                    .collect());
            }

            if now >= expiry {
                return Ok(Vec::new());
            }

            let wake_at = next_deadline.map_or(expiry, |deadline| deadline.min(expiry));

            tokio::select! {
                () = &mut notified => {}
                () = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    type Error = Error;
    type Consumer = MemoryConsumer;
    type Message = MemoryMessage;

    async fn streams(&self) -> Result<Vec<StreamConfig>, Self::Error> {
        Ok(self.state.lock().await.streams())
    }

    async fn create_stream(&self, config: StreamConfig) -> Result<StreamConfig, Self::Error> {
        self.state.lock().await.create_stream(config)
    }

    async fn update_stream(&self, config: StreamConfig) -> Result<StreamConfig, Self::Error> {
        self.state.lock().await.update_stream(config)
    }

    async fn consumers(&self, stream_name: &str) -> Result<Vec<ConsumerInfo>, Self::Error> {
        self.state.lock().await.consumers(stream_name)
    }

    async fn bind_consumer(
        &self,
        stream_name: &str,
        durable_name: &str,
    ) -> Result<Self::Consumer, Self::Error> {
        if self
            .state
            .lock()
            .await
            .has_consumer(stream_name, durable_name)?
        {
            Ok(MemoryConsumer {
                durable: durable_name.to_string(),
                stream: stream_name.to_string(),
            })
        } else {
            Err(Error::ConsumerNotFound(durable_name.to_string()))
        }
    }

    async fn create_consumer(
        &self,
        stream_name: &str,
        config: ConsumerConfig,
    ) -> Result<Self::Consumer, Self::Error> {
        let durable = config.durable_name.clone();
        self.state.lock().await.create_consumer(stream_name, config)?;

        self.notify.notify_waiters();

        Ok(MemoryConsumer {
            durable,
            stream: stream_name.to_string(),
        })
    }

    async fn consumer_info(&self, consumer: &Self::Consumer) -> Result<ConsumerInfo, Self::Error> {
        self.state
            .lock()
            .await
            .consumer_info(&consumer.stream, &consumer.durable)
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishAck, Self::Error> {
        let ack = self.state.lock().await.publish(subject, payload)?;

        debug!(stream = %ack.stream, subject = %subject, sequence = ack.sequence, "message appended");

        self.notify.notify_waiters();

        Ok(ack)
    }

    async fn pull(
        &self,
        consumer: &Self::Consumer,
        max_messages: usize,
        expires: Duration,
    ) -> Result<MessageStream<Self::Message, Self::Error>, Self::Error> {
        let messages = self.fetch(consumer, max_messages, expires).await?;

        Ok(stream::iter(messages.into_iter().map(Ok)).boxed())
    }
}
