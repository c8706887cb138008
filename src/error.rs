//! Gateway error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Nothing here is fatal to the process: every failure is scoped to one
//! connection or one message, and only the authentication variants ever
//! cross the HTTP boundary (through the upgrade gate).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::auth::AuthError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4010,
///     "message": "authentication token required"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`RelayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Failure classes of the relay core.
///
/// # Error Code Ranges
///
/// | Range     | Category             | HTTP Status                |
/// |-----------|----------------------|----------------------------|
/// | 1000–1999 | Frame/Routing        | 400 Bad Request            |
/// | 3000–3999 | Transport/Saturation | 500 Internal Server Error  |
/// | 4010–4019 | Authentication       | 401 Unauthorized           |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Upgrade request carried no credential token.
    #[error("authentication token required")]
    AuthRequired,

    /// Credential token failed validation.
    #[error("invalid or expired token")]
    AuthRejected(#[source] AuthError),

    /// A single inbound frame could not be decoded; the connection
    /// survives it.
    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// Read/write failure or deadline expiry on a connection.
    #[error("websocket transport failure: {0}")]
    Transport(#[from] axum::Error),

    /// No handler is routed for the message type.
    #[error("no route for message type {0:?}")]
    Unroutable(String),

    /// A bounded queue hit capacity; the message was dropped or the
    /// client evicted, never blocked on.
    #[error("{queue} queue saturated")]
    Saturated {
        /// Which queue hit capacity.
        queue: &'static str,
    },
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Decode(_) => 1001,
            Self::Unroutable(_) => 1002,
            Self::Transport(_) => 3001,
            Self::Saturated { .. } => 3002,
            Self::AuthRequired => 4010,
            Self::AuthRejected(_) => 4011,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(_) | Self::Unroutable(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) | Self::Saturated { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AuthRequired | Self::AuthRejected(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
