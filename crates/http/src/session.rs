use serde::{Deserialize, Serialize};

/// The identity carried by a verified session token.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UserPayload {
    /// The user id.
    pub id: String,

    /// The user's email address.
    pub email: String,
}

/// Verifies session tokens issued by the auth service.
///
/// Verification is synchronous and must not fail loudly: an invalid,
/// expired or malformed token is simply `None`.
pub trait SessionVerifier: Clone + Send + Sync + 'static {
    /// Returns the user the token was issued for, if the token is valid.
    fn verify(&self, token: &str) -> Option<UserPayload>;
}
