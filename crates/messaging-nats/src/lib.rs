//! NATS JetStream implementation of the messaging log store.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod convert;
mod error;
mod message;

pub use error::Error;
pub use message::NatsMessage;

use std::fmt::{self, Debug};
use std::future::Future;
use std::time::Duration;

use async_nats::jetstream::consumer::{Consumer, pull};
use async_nats::jetstream::{self, Context as JetStreamContext};
use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, future};
use ticketing_messaging::{
    ConsumerConfig, ConsumerInfo, LogStore, MessageStream, PublishAck, StreamConfig,
};
use tracing::{debug, info};

/// Default timeout for JetStream administrative calls and publish acks.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the `NatsLogStore`.
#[derive(Clone, Debug)]
pub struct NatsLogStoreConfig {
    /// The NATS client to use.
    pub client: Client,

    /// Timeout for individual JetStream operations. Defaults to 10 seconds if not set.
    pub operation_timeout: Option<Duration>,
}

/// Handle bound to a durable JetStream pull consumer.
#[derive(Clone)]
pub struct NatsConsumer {
    durable: String,
    inner: Consumer<pull::Config>,
    stream: String,
}

impl NatsConsumer {
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

impl Debug for NatsConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsConsumer")
            .field("stream", &self.stream)
            .field("durable", &self.durable)
            .finish_non_exhaustive()
    }
}

/// A log store backed by NATS JetStream.
#[derive(Clone)]
pub struct NatsLogStore {
    client: Client,
    jetstream_context: JetStreamContext,
    operation_timeout: Duration,
}

impl Debug for NatsLogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsLogStore")
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl NatsLogStore {
    /// Creates a new instance of `NatsLogStore` over an existing client.
    #[must_use]
    pub fn new(
        NatsLogStoreConfig {
            client,
            operation_timeout,
        }: NatsLogStoreConfig,
    ) -> Self {
        let jetstream_context = jetstream::new(client.clone());

        Self {
            client,
            jetstream_context,
            operation_timeout: operation_timeout.unwrap_or(DEFAULT_OPERATION_TIMEOUT),
        }
    }

    /// Connects to `url` and creates a store over the new client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the server cannot be reached within `connect_timeout`.
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self, Error> {
        let client = ConnectOptions::default()
            .connection_timeout(connect_timeout)
            .connect(url)
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;

        info!(url = %url, "connected to NATS");

        Ok(Self::new(NatsLogStoreConfig {
            client,
            operation_timeout: None,
        }))
    }

    /// The underlying NATS client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    async fn timed<F, R>(&self, operation: &'static str, future: F) -> Result<R, Error>
    where
        F: Future<Output = Result<R, Error>> + Send,
    {
        tokio::time::timeout(self.operation_timeout, future)
            .await
            .map_err(|_| Error::Timeout {
                operation,
                timeout: self.operation_timeout,
            })?
    }

    async fn get_stream(&self, stream_name: &str) -> Result<jetstream::stream::Stream, Error> {
        self.jetstream_context
            .get_stream(stream_name)
            .await
            .map_err(|e| Error::StreamGet(e.to_string()))
    }
}

#[async_trait]
impl LogStore for NatsLogStore {
    type Error = Error;
    type Consumer = NatsConsumer;
    type Message = NatsMessage;

    async fn streams(&self) -> Result<Vec<StreamConfig>, Self::Error> {
        self.timed("list_streams", async {
            self.jetstream_context
                .streams()
                .map_ok(|info| convert::stream_config_from_nats(&info.config))
                .try_collect()
                .await
                .map_err(|e| Error::StreamList(e.to_string()))
        })
        .await
    }

    async fn create_stream(&self, config: StreamConfig) -> Result<StreamConfig, Self::Error> {
        self.timed("create_stream", async {
            let stream = self
                .jetstream_context
                .create_stream(convert::stream_config_to_nats(&config))
                .await
                .map_err(|e| Error::StreamCreate(e.to_string()))?;

            debug!(stream = %config.name, "JetStream stream created");

            Ok(convert::stream_config_from_nats(&stream.cached_info().config))
        })
        .await
    }

    async fn update_stream(&self, config: StreamConfig) -> Result<StreamConfig, Self::Error> {
        self.timed("update_stream", async {
            let mut stream = self.get_stream(&config.name).await?;
            let existing = stream
                .info()
                .await
                .map_err(|e| Error::StreamGet(e.to_string()))?
                .config
                .clone();

            let info = self
                .jetstream_context
                .update_stream(convert::merge_stream_config(existing, &config))
                .await
                .map_err(|e| Error::StreamUpdate(e.to_string()))?;

            debug!(stream = %config.name, "JetStream stream updated");

            Ok(convert::stream_config_from_nats(&info.config))
        })
        .await
    }

    async fn consumers(&self, stream_name: &str) -> Result<Vec<ConsumerInfo>, Self::Error> {
        self.timed("list_consumers", async {
            let stream = self.get_stream(stream_name).await?;
            let mut consumers = stream.consumers();
            let mut infos = Vec::new();

            while let Some(info) = consumers.next().await {
                let info = info.map_err(|e| Error::ConsumerList(e.to_string()))?;
                infos.push(convert::consumer_info_from_nats(&info)?);
            }

            Ok(infos)
        })
        .await
    }

    async fn bind_consumer(
        &self,
        stream_name: &str,
        durable_name: &str,
    ) -> Result<Self::Consumer, Self::Error> {
        self.timed("get_consumer", async {
            let inner = self
                .get_stream(stream_name)
                .await?
                .get_consumer::<pull::Config>(durable_name)
                .await
                .map_err(|e| Error::ConsumerGet(e.to_string()))?;

            Ok(NatsConsumer {
                durable: durable_name.to_string(),
                inner,
                stream: stream_name.to_string(),
            })
        })
        .await
    }

    async fn create_consumer(
        &self,
        stream_name: &str,
        config: ConsumerConfig,
    ) -> Result<Self::Consumer, Self::Error> {
        self.timed("create_consumer", async {
            let inner = self
                .get_stream(stream_name)
                .await?
                .create_consumer(convert::consumer_config_to_nats(&config))
                .await
                .map_err(|e| Error::ConsumerCreate(e.to_string()))?;

            debug!(stream = %stream_name, durable = %config.durable_name, "JetStream consumer created");

            Ok(NatsConsumer {
                durable: config.durable_name,
                inner,
                stream: stream_name.to_string(),
            })
        })
        .await
    }

    async fn consumer_info(&self, consumer: &Self::Consumer) -> Result<ConsumerInfo, Self::Error> {
        self.timed("consumer_info", async {
            let mut inner = consumer.inner.clone();
            let info = inner
                .info()
                .await
                .map_err(|e| Error::ConsumerInfo(e.to_string()))?;

            convert::consumer_info_from_nats(info)
        })
        .await
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishAck, Self::Error> {
        self.timed("publish", async {
            let ack = self
                .jetstream_context
                .publish(subject.to_string(), payload)
                .await
                .map_err(|e| Error::Publish(e.to_string()))?
                .await
                .map_err(|e| Error::Publish(e.to_string()))?;

            Ok(PublishAck {
                stream: ack.stream,
                sequence: ack.sequence,
            })
        })
        .await
    }

    async fn pull(
        &self,
        consumer: &Self::Consumer,
        max_messages: usize,
        expires: Duration,
    ) -> Result<MessageStream<Self::Message, Self::Error>, Self::Error> {
        let batch = consumer
            .inner
            .batch()
            .max_messages(max_messages.max(1))
            .expires(expires)
            .messages()
            .await
            .map_err(|e| Error::Pull(e.to_string()))?;

        Ok(batch
            .map_err(|e| Error::Pull(e.to_string()))
            .and_then(|message| future::ready(NatsMessage::try_from_jetstream(message)))
            .boxed())
    }
}
