use crate::{Event, Subject};

use serde::{Deserialize, Serialize};

/// Lifecycle state of an order.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    /// Created, ticket not yet reserved.
    Created,

    /// Cancelled by the user or expired.
    Cancelled,

    /// Ticket reserved, waiting for payment.
    AwaitingPayment,

    /// Paid.
    Complete,
}

/// `order.created`
#[derive(Clone, Copy, Debug)]
pub struct OrderCreated;

/// Ticket summary carried by `order.created`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTicket {
    /// Ticket id.
    pub id: String,

    /// Price at the time the order was placed.
    pub price: f64,
}

/// Payload of `order.created`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedData {
    /// Order id.
    pub id: String,

    /// Optimistic concurrency version of the order.
    pub version: u64,

    /// Current status.
    pub status: OrderStatus,

    /// Id of the ordering user.
    pub user_id: String,

    /// When the reservation lapses, as an ISO-8601 timestamp string.
    pub expires_at: String,

    /// The ordered ticket.
    pub ticket: OrderTicket,
}

impl Event for OrderCreated {
    const SUBJECT: Subject = Subject::OrderCreated;

    type Data = OrderCreatedData;
}

/// `order.cancelled`
#[derive(Clone, Copy, Debug)]
pub struct OrderCancelled;

/// Ticket reference carried by `order.cancelled`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct OrderTicketRef {
    /// Ticket id.
    pub id: String,
}

/// Payload of `order.cancelled`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledData {
    /// Order id.
    pub id: String,

    /// Optimistic concurrency version of the order.
    pub version: u64,

    /// The released ticket.
    pub ticket: OrderTicketRef,
}

impl Event for OrderCancelled {
    const SUBJECT: Subject = Subject::OrderCancelled;

    type Data = OrderCancelledData;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let names: Vec<String> = [
            OrderStatus::Created,
            OrderStatus::Cancelled,
            OrderStatus::AwaitingPayment,
            OrderStatus::Complete,
        ]
        .iter()
        .map(|status| serde_json::to_string(status).unwrap())
        .collect();

        assert_eq!(
            names,
            [
                "\"created\"",
                "\"cancelled\"",
                "\"awaiting-payment\"",
                "\"complete\""
            ]
        );
    }

    #[test]
    fn test_cancelled_shape() {
        let data: OrderCancelledData =
            serde_json::from_str(r#"{"id":"o1","version":3,"ticket":{"id":"t1"}}"#).unwrap();

        assert_eq!(data.ticket.id, "t1");
        assert_eq!(data.version, 3);
    }
}
