//! Shared HTTP glue for ticketing services: typed error responses and session-based auth.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod middleware;
mod session;

pub use error::{FieldError, HttpError};
pub use middleware::{CurrentUser, RequireAuth, SESSION_COOKIE, current_user};
pub use session::{SessionVerifier, UserPayload};
