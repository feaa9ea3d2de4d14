use crate::Error;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every subject events can be published under.
///
/// The set is closed: a stream is configured with all of these and every
/// publisher or subscriber is bound to exactly one.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Subject {
    /// A ticket was listed.
    #[serde(rename = "ticket.created")]
    TicketCreated,

    /// A ticket changed (price, title or reservation).
    #[serde(rename = "ticket.updated")]
    TicketUpdated,

    /// An order was placed against a ticket.
    #[serde(rename = "order.created")]
    OrderCreated,

    /// An order was cancelled and its ticket released.
    #[serde(rename = "order.cancelled")]
    OrderCancelled,

    /// A payment for an order was captured.
    #[serde(rename = "payment.created")]
    PaymentCreated,

    /// The reservation window of an order elapsed.
    #[serde(rename = "expiration.complete")]
    ExpirationComplete,
}

impl Subject {
    /// All subjects, in catalog order.
    pub const ALL: [Self; 6] = [
        Self::TicketCreated,
        Self::TicketUpdated,
        Self::OrderCreated,
        Self::OrderCancelled,
        Self::PaymentCreated,
        Self::ExpirationComplete,
    ];

    /// The wire name of the subject.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TicketCreated => "ticket.created",
            Self::TicketUpdated => "ticket.updated",
            Self::OrderCreated => "order.created",
            Self::OrderCancelled => "order.cancelled",
            Self::PaymentCreated => "payment.created",
            Self::ExpirationComplete => "expiration.complete",
        }
    }

    /// Wire names of every subject in the catalog.
    pub fn all_names() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(Self::as_str)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|subject| subject.as_str() == s)
            .ok_or_else(|| Error::UnknownSubject(s.to_string()))
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.as_str().to_string()
    }
}
