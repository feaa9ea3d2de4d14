use crate::{Event, Subject};

use serde::{Deserialize, Serialize};

/// `ticket.created`
#[derive(Clone, Copy, Debug)]
pub struct TicketCreated;

/// Payload of `ticket.created`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketCreatedData {
    /// Ticket id.
    pub id: String,

    /// Optimistic concurrency version of the ticket.
    pub version: u64,

    /// Display title.
    pub title: String,

    /// Price in the listing currency.
    pub price: f64,

    /// Id of the user who listed the ticket.
    pub user_id: String,
}

impl Event for TicketCreated {
    const SUBJECT: Subject = Subject::TicketCreated;

    type Data = TicketCreatedData;
}

/// `ticket.updated`
#[derive(Clone, Copy, Debug)]
pub struct TicketUpdated;

/// Payload of `ticket.updated`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdatedData {
    /// Ticket id.
    pub id: String,

    /// Optimistic concurrency version of the ticket.
    pub version: u64,

    /// Display title.
    pub title: String,

    /// Price in the listing currency.
    pub price: f64,

    /// Id of the user who listed the ticket.
    pub user_id: String,

    /// Order currently reserving the ticket, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl Event for TicketUpdated {
    const SUBJECT: Subject = Subject::TicketUpdated;

    type Data = TicketUpdatedData;
}
