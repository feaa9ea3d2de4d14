use crate::{Event, Subject};

use serde::{Deserialize, Serialize};

/// `payment.created`
#[derive(Clone, Copy, Debug)]
pub struct PaymentCreated;

/// Payload of `payment.created`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreatedData {
    /// Payment id.
    pub id: String,

    /// The paid order.
    pub order_id: String,

    /// Charge id at the payment provider.
    pub stripe_id: String,
}

impl Event for PaymentCreated {
    const SUBJECT: Subject = Subject::PaymentCreated;

    type Data = PaymentCreatedData;
}
