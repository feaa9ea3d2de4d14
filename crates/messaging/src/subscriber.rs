use crate::error::Error;
use crate::store::{
    AckMessage, ConsumerConfig, ConsumerInfo, LogStore, LogStoreError, MessageStream,
};

use std::error::Error as StdError;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use ticketing_events::Event;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// A delivered payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload<T> {
    /// The payload matched the event schema.
    Parsed(T),

    /// The payload was not valid for the schema; its text, lossily decoded.
    Raw(String),
}

impl<T> Payload<T> {
    /// The parsed payload, if any.
    pub const fn parsed(&self) -> Option<&T> {
        match self {
            Self::Parsed(data) => Some(data),
            Self::Raw(_) => None,
        }
    }

    /// Consumes the payload, keeping only a parsed value.
    pub fn into_parsed(self) -> Option<T> {
        match self {
            Self::Parsed(data) => Some(data),
            Self::Raw(_) => None,
        }
    }
}

impl<T> Payload<T> {
    /// Parses `bytes` as the payload of `E`, falling back to raw text.
    pub fn decode<E>(bytes: &[u8]) -> Self
    where
        E: Event<Data = T>,
    {
        match E::decode(bytes) {
            Ok(data) => Self::Parsed(data),
            Err(e) => {
                warn!(subject = %E::SUBJECT, error = %e, "payload did not parse, delivering raw text");

                Self::Raw(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

/// Marker trait for message handler errors.
pub trait MessageHandlerError: StdError + Send + Sync + 'static {}

/// Application logic run for every delivered event.
///
/// The handler owns acknowledgement: a message it neither acks nor naks is
/// redelivered once the ack-wait elapses.
#[async_trait]
pub trait MessageHandler<E, M>
where
    Self: Clone + Send + Sync + 'static,
    E: Event,
    M: AckMessage,
{
    /// The error type for the handler.
    type Error: MessageHandlerError;

    /// Handles one delivered message.
    async fn on_message(&self, data: Payload<E::Data>, message: M) -> Result<(), Self::Error>;
}

/// Client-side tuning of a subscriber.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscriberOptions {
    /// Time before an unacknowledged delivery is redelivered.
    pub ack_wait: Duration,

    /// Maximum messages per pull.
    pub max_messages: usize,

    /// Maximum time a pull waits for messages.
    pub expires: Duration,

    /// Keep looping after a retriable store error instead of returning it.
    pub retry_on_pull_error: bool,

    /// Pause before binding and pulling again after a retriable error.
    pub pull_error_backoff: Duration,
}

impl SubscriberOptions {
    /// Options seeded from the consumer defaults of `E`.
    #[must_use]
    pub fn for_event<E>() -> Self
    where
        E: Event,
    {
        let defaults = E::consumer_defaults();

        Self {
            ack_wait: defaults.ack_wait,
            max_messages: defaults.max_messages,
            expires: defaults.expires,
            ..Self::default()
        }
    }
}

impl Default for SubscriberOptions {
    fn default() -> Self {
        Self {
            ack_wait: ticketing_events::DEFAULT_ACK_WAIT,
            max_messages: ticketing_events::DEFAULT_MAX_MESSAGES,
            expires: ticketing_events::DEFAULT_EXPIRES,
            retry_on_pull_error: true,
            pull_error_backoff: Duration::from_secs(1),
        }
    }
}

/// Configuration for a subscriber.
#[derive(Clone, Debug)]
pub struct SubscriberConfig<L, X> {
    /// The store to consume from.
    pub store: L,

    /// The stream holding the consumer.
    pub stream_name: String,

    /// The durable consumer name.
    pub durable_name: String,

    /// Pull tuning.
    pub options: SubscriberOptions,

    /// The handler run for every message.
    pub handler: X,
}

/// Durable consumer of one event type.
pub struct Subscriber<L, E, X>
where
    L: LogStore,
    E: Event,
    X: MessageHandler<E, L::Message>,
{
    consumer: Arc<Mutex<Option<L::Consumer>>>,
    durable_name: String,
    handler: X,
    options: SubscriberOptions,
    shutdown_token: CancellationToken,
    store: L,
    stream_name: String,
    task_tracker: TaskTracker,
    _marker: PhantomData<E>,
}

impl<L, E, X> Clone for Subscriber<L, E, X>
where
    L: LogStore,
    E: Event,
    X: MessageHandler<E, L::Message>,
{
    fn clone(&self) -> Self {
        Self {
            consumer: self.consumer.clone(),
            durable_name: self.durable_name.clone(),
            handler: self.handler.clone(),
            options: self.options.clone(),
            shutdown_token: self.shutdown_token.clone(),
            store: self.store.clone(),
            stream_name: self.stream_name.clone(),
            task_tracker: self.task_tracker.clone(),
            _marker: PhantomData,
        }
    }
}

impl<L, E, X> Debug for Subscriber<L, E, X>
where
    L: LogStore,
    E: Event,
    X: MessageHandler<E, L::Message>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("stream_name", &self.stream_name)
            .field("durable_name", &self.durable_name)
            .field("subject", &E::SUBJECT)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<L, E, X> Subscriber<L, E, X>
where
    L: LogStore,
    E: Event,
    X: MessageHandler<E, L::Message>,
{
    /// Creates a subscriber and attempts to bind its durable consumer.
    ///
    /// A failed bind is logged and retried when consuming starts; call
    /// [`Self::ensure_consumer`] to observe the error directly.
    pub async fn new(
        SubscriberConfig {
            store,
            stream_name,
            durable_name,
            options,
            handler,
        }: SubscriberConfig<L, X>,
    ) -> Self {
        let subscriber = Self {
            consumer: Arc::new(Mutex::new(None)),
            durable_name,
            handler,
            options,
            shutdown_token: CancellationToken::new(),
            store,
            stream_name,
            task_tracker: TaskTracker::new(),
            _marker: PhantomData,
        };

        if let Err(e) = subscriber.ensure_consumer().await {
            warn!(
                stream = %subscriber.stream_name,
                durable = %subscriber.durable_name,
                error = %e,
                "consumer setup failed, will retry on consume"
            );
        }

        subscriber
    }

    /// The durable consumer name.
    pub fn durable_name(&self) -> &str {
        &self.durable_name
    }

    /// The stream the consumer reads.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// The pull tuning in use.
    pub const fn options(&self) -> &SubscriberOptions {
        &self.options
    }

    /// The consumer configuration this subscriber requires on the store.
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig::durable(
            self.durable_name.clone(),
            E::SUBJECT.as_str(),
            self.options.ack_wait,
        )
    }

    /// Binds the durable consumer, creating it if it does not exist.
    ///
    /// An existing consumer is never modified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConsumerConflict`] if the stored consumer has a
    /// different filter subject, ack policy or deliver policy, or the store
    /// error if listing, binding or creating fails.
    pub async fn ensure_consumer(&self) -> Result<L::Consumer, Error<L::Error>> {
        let mut bound = self.consumer.lock().await;

        if let Some(consumer) = bound.as_ref() {
            return Ok(consumer.clone());
        }

        let consumer = self.get_or_create_consumer().await?;
        *bound = Some(consumer.clone());

        Ok(consumer)
    }

    /// Fetches the stored state of the consumer.
    ///
    /// # Errors
    ///
    /// Returns an error if the consumer cannot be bound or queried.
    pub async fn consumer_info(&self) -> Result<ConsumerInfo, Error<L::Error>> {
        let consumer = self.ensure_consumer().await?;

        self.store
            .consumer_info(&consumer)
            .await
            .map_err(Error::Store)
    }

    /// Pulls and handles messages until `cancel` fires.
    ///
    /// Each message is handled as soon as the store delivers it. Once
    /// `cancel` fires, messages the pull already received are still handled
    /// and the rest of the request is abandoned.
    ///
    /// # Errors
    ///
    /// Returns an error if the consumer cannot be bound or a pull fails,
    /// unless `retry_on_pull_error` is on and the store error is retriable.
    pub async fn consume(&self, cancel: CancellationToken) -> Result<(), Error<L::Error>> {
        info!(
            stream = %self.stream_name,
            durable = %self.durable_name,
            subject = %E::SUBJECT,
            "consuming"
        );

        while !cancel.is_cancelled() {
            let consumer = match self.ensure_consumer().await {
                Ok(consumer) => consumer,
                Err(e) => {
                    self.back_off(e, &cancel).await?;
                    continue;
                }
            };

            let pulled = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                pulled = self.store.pull(&consumer, self.options.max_messages, self.options.expires) => pulled,
            };

            let result = match pulled {
                Ok(messages) => self.drain(messages, &cancel).await.map(|_| ()),
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                self.back_off(Error::Store(e), &cancel).await?;
            }
        }

        info!(
            stream = %self.stream_name,
            durable = %self.durable_name,
            "consumer loop cancelled"
        );

        Ok(())
    }

    /// Performs one bounded pull and handles what it delivers.
    ///
    /// # Errors
    ///
    /// Returns an error if the consumer cannot be bound or the pull fails.
    pub async fn consume_batch(&self) -> Result<usize, Error<L::Error>> {
        let consumer = self.ensure_consumer().await?;
        let messages = self
            .store
            .pull(&consumer, self.options.max_messages, self.options.expires)
            .await
            .map_err(Error::Store)?;

        self.drain(messages, &CancellationToken::new())
            .await
            .map_err(Error::Store)
    }

    /// Runs [`Self::consume`] in the background until [`Self::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the subscriber was started before.
    pub fn start(&self) -> Result<JoinHandle<Result<(), Error<L::Error>>>, Error<L::Error>> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        let subscriber = self.clone();
        let shutdown_token = self.shutdown_token.clone();

        let handle = self.task_tracker.spawn(async move {
            let result = subscriber.consume(shutdown_token).await;

            if let Err(e) = &result {
                warn!(
                    stream = %subscriber.stream_name,
                    durable = %subscriber.durable_name,
                    error = %e,
                    "consumer loop ended with error"
                );
            }

            result
        });

        self.task_tracker.close();

        Ok(handle)
    }

    /// Stops the background loop, if any, and waits for it to finish.
    ///
    /// Also closes the subscriber to later [`Self::start`] calls.
    pub async fn shutdown(&self) {
        info!(durable = %self.durable_name, "subscriber shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!(durable = %self.durable_name, "subscriber shutdown");
    }

    /// Keeps the loop alive after a retriable store error, or returns `error`.
    async fn back_off(
        &self,
        error: Error<L::Error>,
        cancel: &CancellationToken,
    ) -> Result<(), Error<L::Error>> {
        let retriable = matches!(&error, Error::Store(e) if e.is_retriable());

        if !self.options.retry_on_pull_error || !retriable {
            return Err(error);
        }

        warn!(
            stream = %self.stream_name,
            durable = %self.durable_name,
            error = %error,
            backoff = ?self.options.pull_error_backoff,
            "store unavailable, backing off"
        );

        self.consumer.lock().await.take();

        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(self.options.pull_error_backoff) => {}
        }

        Ok(())
    }

    /// Handles the messages of one pull in delivery order.
    async fn drain(
        &self,
        mut messages: MessageStream<L::Message, L::Error>,
        cancel: &CancellationToken,
    ) -> Result<usize, L::Error> {
        let mut handled = 0;

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    while let Some(Some(message)) = messages.next().now_or_never() {
                        self.handle(message?).await;
                        handled += 1;
                    }

                    return Ok(handled);
                }
                next = messages.next() => next,
            };

            match next {
                Some(message) => {
                    self.handle(message?).await;
                    handled += 1;
                }
                None => return Ok(handled),
            }
        }
    }

    async fn handle(&self, message: L::Message) {
        let sequence = message.stream_sequence();
        let delivered = message.delivered();
        let data = Payload::decode::<E>(message.payload());

        debug!(
            subject = %E::SUBJECT,
            durable = %self.durable_name,
            sequence,
            delivered,
            "handling message"
        );

        if let Err(e) = self.handler.on_message(data, message).await {
            warn!(
                subject = %E::SUBJECT,
                durable = %self.durable_name,
                sequence,
                error = %e,
                "handler failed, message left for redelivery"
            );
        }
    }

    async fn get_or_create_consumer(&self) -> Result<L::Consumer, Error<L::Error>> {
        let requested = self.consumer_config();
        let mut retried = false;

        loop {
            let existing = self
                .store
                .consumers(&self.stream_name)
                .await
                .map_err(Error::Store)?
                .into_iter()
                .find(|info| info.config.durable_name == self.durable_name);

            if let Some(info) = existing {
                check_drift(&self.stream_name, &requested, &info.config)?;

                let consumer = self
                    .store
                    .bind_consumer(&self.stream_name, &self.durable_name)
                    .await
                    .map_err(Error::Store)?;

                debug!(stream = %self.stream_name, durable = %self.durable_name, "bound existing consumer");

                return Ok(consumer);
            }

            match self
                .store
                .create_consumer(&self.stream_name, requested.clone())
                .await
            {
                Ok(consumer) => {
                    info!(
                        stream = %self.stream_name,
                        durable = %self.durable_name,
                        subject = %requested.filter_subject,
                        "created consumer"
                    );

                    return Ok(consumer);
                }
                Err(e) if e.is_conflict() && !retried => {
                    debug!(stream = %self.stream_name, durable = %self.durable_name, "consumer created concurrently, binding");

                    retried = true;
                }
                Err(e) => return Err(Error::Store(e)),
            }
        }
    }
}

/// Compares a stored consumer to the requested one.
///
/// Filter subject, ack policy and deliver policy identify a consumer; a
/// different ack-wait is only logged.
fn check_drift<E>(
    stream: &str,
    requested: &ConsumerConfig,
    stored: &ConsumerConfig,
) -> Result<(), Error<E>>
where
    E: LogStoreError,
{
    let conflict = |field, expected: String, found: String| Error::ConsumerConflict {
        stream: stream.to_string(),
        durable: requested.durable_name.clone(),
        field,
        expected,
        found,
    };

    if stored.filter_subject != requested.filter_subject {
        return Err(conflict(
            "filter subject",
            requested.filter_subject.clone(),
            stored.filter_subject.clone(),
        ));
    }

    if stored.ack_policy != requested.ack_policy {
        return Err(conflict(
            "ack policy",
            requested.ack_policy.to_string(),
            stored.ack_policy.to_string(),
        ));
    }

    if stored.deliver_policy != requested.deliver_policy {
        return Err(conflict(
            "deliver policy",
            requested.deliver_policy.to_string(),
            stored.deliver_policy.to_string(),
        ));
    }

    if stored.ack_wait != requested.ack_wait {
        warn!(
            stream = %stream,
            durable = %requested.durable_name,
            stored = ?stored.ack_wait,
            requested = ?requested.ack_wait,
            "consumer ack wait differs, keeping stored value"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AckPolicy, DeliverPolicy};

    use assert_matches::assert_matches;
    use ticketing_events::{ExpirationComplete, ExpirationCompleteData, TicketCreated};
    use tracing_test::traced_test;

    #[derive(Debug, thiserror::Error)]
    #[error("test store error")]
    struct TestError;

    impl LogStoreError for TestError {}

    fn config(subject: &str) -> ConsumerConfig {
        ConsumerConfig::durable("orders-service", subject, Duration::from_secs(5))
    }

    #[test]
    fn test_identical_config_has_no_drift() {
        let requested = config("ticket.created");

        assert!(check_drift::<TestError>("ticketing", &requested, &requested.clone()).is_ok());
    }

    #[test]
    fn test_filter_subject_drift_is_conflict() {
        let requested = config("ticket.created");
        let stored = config("ticket.updated");

        assert_matches!(
            check_drift::<TestError>("ticketing", &requested, &stored),
            Err(Error::ConsumerConflict { field: "filter subject", expected, found, .. })
                if expected == "ticket.created" && found == "ticket.updated"
        );
    }

    #[test]
    fn test_ack_policy_drift_is_conflict() {
        let requested = config("ticket.created");
        let stored = ConsumerConfig {
            ack_policy: AckPolicy::None,
            ..requested.clone()
        };

        assert_matches!(
            check_drift::<TestError>("ticketing", &requested, &stored),
            Err(Error::ConsumerConflict { field: "ack policy", .. })
        );
    }

    #[test]
    fn test_deliver_policy_drift_is_conflict() {
        let requested = config("ticket.created");
        let stored = ConsumerConfig {
            deliver_policy: DeliverPolicy::New,
            ..requested.clone()
        };

        assert_matches!(
            check_drift::<TestError>("ticketing", &requested, &stored),
            Err(Error::ConsumerConflict { field: "deliver policy", .. })
        );
    }

    #[test]
    #[traced_test]
    fn test_ack_wait_drift_is_tolerated() {
        let requested = config("ticket.created");
        let stored = ConsumerConfig {
            ack_wait: Duration::from_secs(30),
            ..requested.clone()
        };

        assert!(check_drift::<TestError>("ticketing", &requested, &stored).is_ok());
        assert!(logs_contain("consumer ack wait differs"));
    }

    #[test]
    fn test_payload_parses_schema() {
        let payload = Payload::decode::<ExpirationComplete>(br#"{"orderId":"o1"}"#);

        assert_eq!(
            payload,
            Payload::Parsed(ExpirationCompleteData {
                order_id: "o1".to_string()
            })
        );
    }

    #[test]
    #[traced_test]
    fn test_payload_falls_back_to_raw_text() {
        let payload = Payload::decode::<TicketCreated>(b"not json");

        assert_eq!(payload, Payload::Raw("not json".to_string()));
        assert!(payload.parsed().is_none());
        assert!(logs_contain("payload did not parse"));
    }

    #[test]
    fn test_payload_wrong_shape_is_raw() {
        let payload = Payload::decode::<TicketCreated>(br#"{"id":"t1"}"#);

        assert_matches!(payload, Payload::Raw(text) if text == r#"{"id":"t1"}"#);
    }

    #[test]
    fn test_options_follow_event_defaults() {
        let options = SubscriberOptions::for_event::<TicketCreated>();

        assert_eq!(options.ack_wait, Duration::from_secs(5));
        assert_eq!(options.max_messages, 10);
        assert_eq!(options.expires, Duration::from_secs(10));
        assert!(options.retry_on_pull_error);
    }
}
