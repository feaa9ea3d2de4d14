use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// One user-facing error message, optionally tied to a request field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldError {
    /// The message shown to the user.
    pub message: String,

    /// The request field the message is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl FieldError {
    /// A message not tied to any field.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// A message about `field`.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

/// Typed errors every service returns in the same `{"errors": [...]}` shape.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HttpError {
    /// The database could not be reached.
    #[error("Error connecting to database")]
    DatabaseConnection,

    /// The caller is not signed in.
    #[error("Not Authorized")]
    NotAuthorized,

    /// The route or resource does not exist.
    #[error("NotFoundError")]
    NotFound,

    /// The request failed validation.
    #[error("Invalid request parameters")]
    Validation(Vec<FieldError>),
}

impl HttpError {
    /// The HTTP status code of the error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseConnection => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotAuthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The user-facing messages of the error.
    #[must_use]
    pub fn serialize_errors(&self) -> Vec<FieldError> {
        match self {
            Self::Validation(errors) => errors.clone(),
            other => vec![FieldError::message(other.to_string())],
        }
    }
}

#[derive(Serialize)]
struct ErrorsBody {
    errors: Vec<FieldError>,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(status = %status, error = %self, "request failed");
        }

        let body = ErrorsBody {
            errors: self.serialize_errors(),
        };

        (status, Json(body)).into_response()
    }
}
