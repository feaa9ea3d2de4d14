//! Catalog of ticketing events: subjects and their payload schemas.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod event;
mod subject;

/// Expiration events.
pub mod expiration;

/// Order events.
pub mod order;

/// Payment events.
pub mod payment;

/// Ticket events.
pub mod ticket;

pub use error::Error;
pub use event::{
    AnyEvent, ConsumerDefaults, DEFAULT_ACK_WAIT, DEFAULT_EXPIRES, DEFAULT_MAX_MESSAGES, Event,
};
pub use subject::Subject;

pub use expiration::{ExpirationComplete, ExpirationCompleteData};
pub use order::{
    OrderCancelled, OrderCancelledData, OrderCreated, OrderCreatedData, OrderStatus, OrderTicket,
    OrderTicketRef,
};
pub use payment::{PaymentCreated, PaymentCreatedData};
pub use ticket::{TicketCreated, TicketCreatedData, TicketUpdated, TicketUpdatedData};
