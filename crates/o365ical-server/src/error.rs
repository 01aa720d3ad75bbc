//! Server error types.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use o365ical_providers::ProviderError;
use thiserror::Error;

use crate::store::StoreError;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (listener, attachment files, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Microsoft identity platform or Graph failure.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Session token is missing or unknown.
    #[error("Unknown or missing session")]
    Unauthenticated,

    /// Malformed request.
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Requested resource does not exist.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::TEMPORARY_REDIRECT,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Io(_) | Self::Store(_) | Self::Config { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            // Unknown sessions start the sign-in flow again.
            Self::Unauthenticated => Redirect::temporary("/").into_response(),
            other => (other.status(), other.to_string()).into_response(),
        }
    }
}
