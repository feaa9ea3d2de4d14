use crate::error::Error;

use std::fmt::{self, Debug};

use async_nats::jetstream::{self, AckKind};
use async_trait::async_trait;
use bytes::Bytes;
use ticketing_messaging::AckMessage;

/// A message delivered by a JetStream pull consumer.
pub struct NatsMessage {
    delivered: u64,
    inner: jetstream::Message,
    sequence: u64,
    subject: String,
}

impl NatsMessage {
    pub(crate) fn try_from_jetstream(inner: jetstream::Message) -> Result<Self, Error> {
        let (sequence, delivered) = {
            let info = inner.info().map_err(|e| Error::MessageInfo(e.to_string()))?;

            (info.stream_sequence, u64::try_from(info.delivered).unwrap_or(1))
        };
        let subject = inner.subject.to_string();

        Ok(Self {
            delivered,
            inner,
            sequence,
            subject,
        })
    }
}

impl Debug for NatsMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsMessage")
            .field("subject", &self.subject)
            .field("sequence", &self.sequence)
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AckMessage for NatsMessage {
    type Error = Error;

    fn subject(&self) -> &str {
        &self.subject
    }

    fn payload(&self) -> &Bytes {
        &self.inner.payload
    }

    fn stream_sequence(&self) -> u64 {
        self.sequence
    }

    fn delivered(&self) -> u64 {
        self.delivered
    }

    async fn ack(&self) -> Result<(), Self::Error> {
        self.inner
            .ack()
            .await
            .map_err(|e| Error::Ack(e.to_string()))
    }

    async fn nak(&self) -> Result<(), Self::Error> {
        self.inner
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| Error::Ack(e.to_string()))
    }

    async fn in_progress(&self) -> Result<(), Self::Error> {
        self.inner
            .ack_with(AckKind::Progress)
            .await
            .map_err(|e| Error::Ack(e.to_string()))
    }
}
