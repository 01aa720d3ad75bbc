//! Error types for Microsoft Graph and OAuth operations.
//!
//! Every remote failure is reported as a [`ProviderError`] carrying a
//! [`ProviderErrorCode`]. Callers decide what to do with it: the refresher
//! logs and skips, the request path turns it into an HTTP error.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Token rejected, expired without refresh token, or code exchange refused.
    AuthenticationFailed,
    /// Signed in, but consent or permissions are missing.
    AuthorizationFailed,
    /// Connect failure or timeout.
    NetworkError,
    /// Graph throttling (429).
    RateLimited,
    /// 5xx or any status we do not classify.
    ServerError,
    /// Body does not match the expected schema.
    InvalidResponse,
    NotFound,
    BadRequest,
    ConfigurationError,
    /// Writing mirrored content to disk failed.
    IoError,
}

impl ProviderErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::IoError => "io_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote service an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Microsoft Graph.
    Graph,
    /// The Microsoft identity platform (login.microsoftonline.com).
    Identity,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Identity => "identity",
        }
    }
}

/// An error that occurred while talking to Microsoft Graph or the identity
/// platform.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    service: Option<Service>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

macro_rules! constructors {
    ($($(#[$doc:meta])* $name:ident => $code:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ProviderErrorCode::$code, message)
            }
        )*
    };
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            service: None,
            source: None,
        }
    }

    constructors! {
        authentication => AuthenticationFailed;
        authorization => AuthorizationFailed;
        network => NetworkError;
        rate_limited => RateLimited;
        server => ServerError;
        invalid_response => InvalidResponse;
        not_found => NotFound;
        bad_request => BadRequest;
        configuration => ConfigurationError;
        /// Local failure while mirroring remote content.
        io => IoError;
    }

    /// Classifies a transport failure from `reqwest`.
    pub fn from_transport(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            format!("request failed: {}", err)
        };
        Self::network(message).with_source(err)
    }

    /// Classifies a non-success HTTP status.
    ///
    /// Graph and the identity platform both describe failures in a JSON body;
    /// its message is used when present, the raw body otherwise.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        use reqwest::StatusCode;

        let detail = remote_message(body);
        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::rate_limited(format!("throttled: {}", detail)),
            StatusCode::UNAUTHORIZED => Self::authentication(format!("unauthorized: {}", detail)),
            StatusCode::FORBIDDEN => Self::authorization(format!("forbidden: {}", detail)),
            StatusCode::NOT_FOUND => Self::not_found(detail),
            StatusCode::BAD_REQUEST => Self::bad_request(detail),
            _ => Self::server(format!("HTTP {}: {}", status, detail)),
        }
    }

    /// Tags the error with the service that produced it.
    pub fn with_service(mut self, service: Service) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn service(&self) -> Option<Service> {
        self.service
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(service) = self.service {
            write!(f, "[{}] ", service.as_str())?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Graph: `{"error": {"code", "message"}}`.
/// Identity platform: `{"error": "...", "error_description": "..."}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RemoteError {
    Graph { error: GraphErrorBody },
    Identity {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
}

#[derive(Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Human summary of an error body from either service.
pub(crate) fn remote_message(body: &str) -> String {
    match serde_json::from_str::<RemoteError>(body) {
        Ok(RemoteError::Graph { error }) => format!("{} ({})", error.message, error.code),
        Ok(RemoteError::Identity {
            error,
            error_description: Some(description),
        }) => format!("{}: {}", error, description),
        Ok(RemoteError::Identity { error, .. }) => error,
        Err(_) => body.trim().to_string(),
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
