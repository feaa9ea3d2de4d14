use crate::{Event, Subject};

use serde::{Deserialize, Serialize};

/// `expiration.complete`
#[derive(Clone, Copy, Debug)]
pub struct ExpirationComplete;

/// Payload of `expiration.complete`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirationCompleteData {
    /// The order whose reservation expired.
    pub order_id: String,
}

impl Event for ExpirationComplete {
    const SUBJECT: Subject = Subject::ExpirationComplete;

    type Data = ExpirationCompleteData;
}
