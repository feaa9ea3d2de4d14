use crate::error::Error;
use crate::store::{LogStore, PublishAck};

use std::fmt::{self, Debug};
use std::marker::PhantomData;

use bytes::Bytes;
use ticketing_events::{AnyEvent, Event};
use tracing::debug;

/// Appends events of one type to their subject.
pub struct Publisher<L, E>
where
    L: LogStore,
    E: Event,
{
    store: L,
    _marker: PhantomData<E>,
}

impl<L, E> Clone for Publisher<L, E>
where
    L: LogStore,
    E: Event,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<L, E> Debug for Publisher<L, E>
where
    L: LogStore,
    E: Event,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("store", &self.store)
            .field("subject", &E::SUBJECT)
            .finish()
    }
}

impl<L, E> Publisher<L, E>
where
    L: LogStore,
    E: Event,
{
    /// Creates a publisher bound to `E::SUBJECT`.
    pub const fn new(store: L) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Serializes `data` and appends it, resolving once the store has it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the store rejects the append.
    pub async fn publish(&self, data: &E::Data) -> Result<PublishAck, Error<L::Error>> {
        let payload = E::encode(data)?;
        let ack = self
            .store
            .publish(E::SUBJECT.as_str(), Bytes::from(payload))
            .await
            .map_err(Error::Store)?;

        debug!(subject = %E::SUBJECT, stream = %ack.stream, sequence = ack.sequence, "event published");

        Ok(ack)
    }
}

/// Appends a tagged event under its own subject.
///
/// # Errors
///
/// Returns an error if serialization fails or the store rejects the append.
pub async fn publish_event<L>(store: &L, event: &AnyEvent) -> Result<PublishAck, Error<L::Error>>
where
    L: LogStore,
{
    let subject = event.subject();
    let payload = event.encode_data()?;
    let ack = store
        .publish(subject.as_str(), Bytes::from(payload))
        .await
        .map_err(Error::Store)?;

    debug!(subject = %subject, stream = %ack.stream, sequence = ack.sequence, "event published");

    Ok(ack)
}
