use std::fmt::{self, Debug};
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use ticketing_events::Event;
use ticketing_messaging::{AckMessage, MessageHandler, MessageHandlerError, Payload};

/// Errors raised while printing a tailed message.
#[derive(Debug, Error)]
pub enum PrintError {
    /// The message could not be acknowledged.
    #[error("failed to ack message {sequence}: {message}")]
    Ack {
        /// Stream sequence of the message.
        sequence: u64,

        /// The rendered store error.
        message: String,
    },

    /// The payload could not be rendered as JSON.
    #[error("failed to render message: {0}")]
    Render(#[from] serde_json::Error),
}

impl MessageHandlerError for PrintError {}

/// One line of `tail` output.
#[derive(Debug, Serialize)]
pub struct TailLine<'a> {
    pub subject: &'a str,
    pub sequence: u64,
    pub delivered: u64,
    pub raw: bool,
    pub data: Value,
}

impl<'a> TailLine<'a> {
    pub fn new<T>(message: &'a impl AckMessage, payload: &Payload<T>) -> Result<Self, PrintError>
    where
        T: Serialize,
    {
        let (raw, data) = match payload {
            Payload::Parsed(data) => (false, serde_json::to_value(data)?),
            Payload::Raw(text) => (true, Value::String(text.clone())),
        };

        Ok(Self {
            subject: message.subject(),
            sequence: message.stream_sequence(),
            delivered: message.delivered(),
            raw,
            data,
        })
    }
}

/// Prints every delivered event as a JSON line on stdout and acks it.
pub struct PrintHandler<E> {
    _marker: PhantomData<fn() -> E>,
}

impl<E> PrintHandler<E> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E> Default for PrintHandler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for PrintHandler<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E> Debug for PrintHandler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrintHandler").finish()
    }
}

#[async_trait]
impl<E, M> MessageHandler<E, M> for PrintHandler<E>
where
    E: Event,
    M: AckMessage,
{
    type Error = PrintError;

    async fn on_message(&self, data: Payload<E::Data>, message: M) -> Result<(), Self::Error> {
        let line = serde_json::to_string(&TailLine::new(&message, &data)?)?;
        println!("{line}");

        message.ack().await.map_err(|e| PrintError::Ack {
            sequence: message.stream_sequence(),
            message: e.to_string(),
        })
    }
}
