use crate::MemoryLogStore;
use crate::error::Error;
use crate::state::Deadline;

use std::fmt::{self, Debug};

use async_trait::async_trait;
use bytes::Bytes;
use ticketing_messaging::AckMessage;
use tokio::time::Instant;

/// A message delivered by a [`MemoryLogStore`] pull.
#[derive(Clone)]
pub struct MemoryMessage {
    pub(crate) delivered: u64,
    pub(crate) durable: String,
    pub(crate) payload: Bytes,
    pub(crate) sequence: u64,
    pub(crate) store: MemoryLogStore,
    pub(crate) stream: String,
    pub(crate) subject: String,
}

impl Debug for MemoryMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMessage")
            .field("stream", &self.stream)
            .field("durable", &self.durable)
            .field("subject", &self.subject)
            .field("sequence", &self.sequence)
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AckMessage for MemoryMessage {
    type Error = Error;

    fn subject(&self) -> &str {
        &self.subject
    }

    fn payload(&self) -> &Bytes {
        &self.payload
    }

    fn stream_sequence(&self) -> u64 {
        self.sequence
    }

    fn delivered(&self) -> u64 {
        self.delivered
    }

    async fn ack(&self) -> Result<(), Self::Error> {
        self.store
            .state
            .lock()
            .await
            .ack(&self.stream, &self.durable, self.sequence)
    }

    async fn nak(&self) -> Result<(), Self::Error> {
        self.store.state.lock().await.reschedule(
            &self.stream,
            &self.durable,
            self.sequence,
            Deadline::Now,
            Instant::now(),
        )?;

        self.store.notify.notify_waiters();

        Ok(())
    }

    async fn in_progress(&self) -> Result<(), Self::Error> {
        self.store.state.lock().await.reschedule(
            &self.stream,
            &self.durable,
            self.sequence,
            Deadline::AckWait,
            Instant::now(),
        )
    }
}
