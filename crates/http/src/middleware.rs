use crate::error::HttpError;
use crate::session::{SessionVerifier, UserPayload};

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use headers::authorization::Bearer;
use headers::{Authorization, Cookie, HeaderMapExt};
use tracing::debug;

/// Name of the cookie holding the session token.
pub const SESSION_COOKIE: &str = "session";

/// The signed-in user, present in request extensions after [`current_user`]
/// verified the session token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CurrentUser(pub UserPayload);

/// Resolves the session token of the request and, when it verifies, inserts
/// [`CurrentUser`] into the request extensions.
///
/// A missing or invalid token leaves the request anonymous. Use with
/// `axum::middleware::from_fn_with_state`.
pub async fn current_user<V>(State(verifier): State<V>, mut request: Request, next: Next) -> Response
where
    V: SessionVerifier,
{
    let user = session_token(&request).and_then(|token| verifier.verify(&token));

    match user {
        Some(user) => {
            debug!(user_id = %user.id, "session verified");
            request.extensions_mut().insert(CurrentUser(user));
        }
        None => debug!("anonymous request"),
    }

    next.run(request).await
}

fn session_token(request: &Request) -> Option<String> {
    let headers = request.headers();

    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }

    headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(SESSION_COOKIE).map(ToString::to_string))
}

/// Extractor for handlers that need a signed-in user.
///
/// Rejects with [`HttpError::NotAuthorized`] unless [`current_user`] ran
/// first and verified the session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequireAuth(pub UserPayload);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|CurrentUser(user)| Self(user.clone()))
            .ok_or(HttpError::NotAuthorized)
    }
}
