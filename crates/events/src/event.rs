use crate::expiration::{ExpirationComplete, ExpirationCompleteData};
use crate::order::{OrderCancelled, OrderCancelledData, OrderCreated, OrderCreatedData};
use crate::payment::{PaymentCreated, PaymentCreatedData};
use crate::ticket::{TicketCreated, TicketCreatedData, TicketUpdated, TicketUpdatedData};
use crate::{Error, Subject};

use std::fmt::Debug;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default time the store waits for an ack before redelivering.
pub const DEFAULT_ACK_WAIT: Duration = Duration::from_secs(5);

/// Default maximum number of messages handed out per pull.
pub const DEFAULT_MAX_MESSAGES: usize = 10;

/// Default time a pull waits for messages before returning empty.
pub const DEFAULT_EXPIRES: Duration = Duration::from_secs(10);

/// Consumer tuning an event type ships with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConsumerDefaults {
    /// Time before an unacknowledged delivery is redelivered.
    pub ack_wait: Duration,

    /// Maximum messages per pull.
    pub max_messages: usize,

    /// Maximum time a pull waits for messages.
    pub expires: Duration,
}

impl Default for ConsumerDefaults {
    fn default() -> Self {
        Self {
            ack_wait: DEFAULT_ACK_WAIT,
            max_messages: DEFAULT_MAX_MESSAGES,
            expires: DEFAULT_EXPIRES,
        }
    }
}

/// An event type: a subject bound to the schema of its payload.
///
/// Implemented by zero-sized markers, one per [`Subject`].
pub trait Event
where
    Self: Send + Sync + 'static,
{
    /// The subject events of this type are published under.
    const SUBJECT: Subject;

    /// The payload schema.
    type Data: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Consumer tuning used when subscribing to this event type.
    #[must_use]
    fn consumer_defaults() -> ConsumerDefaults {
        ConsumerDefaults::default()
    }

    /// Encodes a payload to its canonical JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    fn encode(data: &Self::Data) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(data)?)
    }

    /// Decodes a payload from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid payload for this subject.
    fn decode(bytes: &[u8]) -> Result<Self::Data, Error> {
        serde_json::from_slice(bytes).map_err(|source| Error::InvalidPayload {
            subject: Self::SUBJECT,
            source,
        })
    }
}

/// Any event in the catalog, tagged by subject.
///
/// Serializes as `{"subject": "...", "data": {...}}`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "subject", content = "data")]
pub enum AnyEvent {
    /// See [`TicketCreated`].
    #[serde(rename = "ticket.created")]
    TicketCreated(TicketCreatedData),

    /// See [`TicketUpdated`].
    #[serde(rename = "ticket.updated")]
    TicketUpdated(TicketUpdatedData),

    /// See [`OrderCreated`].
    #[serde(rename = "order.created")]
    OrderCreated(OrderCreatedData),

    /// See [`OrderCancelled`].
    #[serde(rename = "order.cancelled")]
    OrderCancelled(OrderCancelledData),

    /// See [`PaymentCreated`].
    #[serde(rename = "payment.created")]
    PaymentCreated(PaymentCreatedData),

    /// See [`ExpirationComplete`].
    #[serde(rename = "expiration.complete")]
    ExpirationComplete(ExpirationCompleteData),
}

impl AnyEvent {
    /// The subject of the event.
    #[must_use]
    pub const fn subject(&self) -> Subject {
        match self {
            Self::TicketCreated(_) => Subject::TicketCreated,
            Self::TicketUpdated(_) => Subject::TicketUpdated,
            Self::OrderCreated(_) => Subject::OrderCreated,
            Self::OrderCancelled(_) => Subject::OrderCancelled,
            Self::PaymentCreated(_) => Subject::PaymentCreated,
            Self::ExpirationComplete(_) => Subject::ExpirationComplete,
        }
    }

    /// Decodes the payload of a message received on `subject`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match the schema of `subject`.
    pub fn decode(subject: Subject, bytes: &[u8]) -> Result<Self, Error> {
        Ok(match subject {
            Subject::TicketCreated => Self::TicketCreated(TicketCreated::decode(bytes)?),
            Subject::TicketUpdated => Self::TicketUpdated(TicketUpdated::decode(bytes)?),
            Subject::OrderCreated => Self::OrderCreated(OrderCreated::decode(bytes)?),
            Subject::OrderCancelled => Self::OrderCancelled(OrderCancelled::decode(bytes)?),
            Subject::PaymentCreated => Self::PaymentCreated(PaymentCreated::decode(bytes)?),
            Subject::ExpirationComplete => {
                Self::ExpirationComplete(ExpirationComplete::decode(bytes)?)
            }
        })
    }

    /// Encodes only the payload (the subject travels as the routing key).
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn encode_data(&self) -> Result<Vec<u8>, Error> {
        match self {
            Self::TicketCreated(data) => TicketCreated::encode(data),
            Self::TicketUpdated(data) => TicketUpdated::encode(data),
            Self::OrderCreated(data) => OrderCreated::encode(data),
            Self::OrderCancelled(data) => OrderCancelled::encode(data),
            Self::PaymentCreated(data) => PaymentCreated::encode(data),
            Self::ExpirationComplete(data) => ExpirationComplete::encode(data),
        }
    }
}
