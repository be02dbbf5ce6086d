use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Shared, clonable underlying cause of an [`ApiError::Unexpected`].
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// The closed set of failures that may cross the gateway boundary.
///
/// `Display` renders the technical form for logs; use
/// [`ApiError::user_message`] for anything shown to an end user.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The requested resource does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// What was looked up (e.g. "card", "account").
        resource: String,
    },

    /// The credential is missing, expired, or rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but not allowed to perform this action.
    #[error("forbidden")]
    Forbidden,

    /// The backend rejected the request as malformed or not allowed by a business rule.
    #[error("bad request{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    BadRequest {
        /// Backend-provided reason, if any.
        detail: Option<String>,
    },

    /// The backend failed while processing the request.
    #[error("server error (HTTP {status})")]
    ServerError {
        /// HTTP status returned by the backend.
        status: u16,
    },

    /// The backend could not be reached.
    #[error("network error: {detail}")]
    NetworkError {
        /// Transport-level description.
        detail: String,
    },

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Anything else. The cause is kept for diagnostics only.
    #[error("unexpected error{}: {cause}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Unexpected {
        /// Raw HTTP status if the failure came from an unmapped response.
        status: Option<u16>,
        /// Underlying cause.
        #[source]
        cause: Cause,
    },
}

/// Plain-text cause used when there is no richer error value to keep.
#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

impl ApiError {
    /// Create a [`ApiError::NotFound`] for the given resource.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a [`ApiError::BadRequest`] with a detail message.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest {
            detail: Some(detail.into()),
        }
    }

    /// Wrap an arbitrary message as [`ApiError::Unexpected`].
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            status: None,
            cause: Arc::new(Message(message.into())),
        }
    }

    /// Wrap an arbitrary error value as [`ApiError::Unexpected`].
    pub fn wrap<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::rewrap(Box::new(err))
    }

    /// Turn any boxed error into a taxonomy member.
    ///
    /// An `ApiError` inside the box passes through unchanged, so repeated
    /// rewrapping never nests.
    pub fn rewrap(err: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api) => *api,
            Err(other) => Self::Unexpected {
                status: None,
                cause: Arc::from(other),
            },
        }
    }

    /// Map a non-success HTTP response to exactly one taxonomy member.
    ///
    /// `body` is inspected only for a JSON `message`/`detail` field used
    /// as the [`ApiError::BadRequest`] detail; it is never shown verbatim
    /// for other members.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            400 | 422 => Self::BadRequest {
                detail: extract_detail(body),
            },
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound {
                resource: "resource".into(),
            },
            408 | 504 => Self::Timeout,
            500 | 502 | 503 => Self::ServerError { status },
            _ => Self::Unexpected {
                status: Some(status),
                cause: Arc::new(Message(format!("unmapped HTTP status {status}"))),
            },
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::ServerError { .. } => "SERVER_ERROR",
            Self::NetworkError { .. } => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Unexpected { .. } => "UNEXPECTED",
        }
    }

    /// HTTP status associated with this failure, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::BadRequest { .. } => Some(400),
            Self::ServerError { status } => Some(*status),
            Self::Timeout => Some(408),
            Self::NetworkError { .. } => None,
            Self::Unexpected { status, .. } => *status,
        }
    }

    /// Pre-composed text safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource } => format!("The requested {resource} could not be found."),
            Self::Unauthorized => "Your session has expired. Please sign in again.".into(),
            Self::Forbidden => "You do not have permission to perform this action.".into(),
            Self::BadRequest { detail: Some(d) } => {
                format!("The request could not be completed: {d}.")
            }
            Self::BadRequest { detail: None } => {
                "The request could not be completed. Please review the information provided."
                    .into()
            }
            Self::ServerError { .. } => {
                "The service is temporarily unavailable. Please try again later.".into()
            }
            Self::NetworkError { .. } => {
                "Unable to reach the service. Check your connection and try again.".into()
            }
            Self::Timeout => "The service took too long to respond. Please try again.".into(),
            Self::Unexpected { .. } => "Something went wrong. Please try again.".into(),
        }
    }

    /// Diagnostic payload for "show details" disclosure, never for the headline.
    pub fn technical_detail(&self) -> Option<String> {
        match self {
            Self::NetworkError { detail } => Some(detail.clone()),
            Self::BadRequest { detail } => detail.clone(),
            Self::ServerError { status } => Some(format!("HTTP {status}")),
            Self::Unexpected { .. } => Some(self.to_string()),
            _ => None,
        }
    }

    /// Whether this is [`ApiError::Unauthorized`].
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl PartialEq for ApiError {
    /// Equality by member and payload; `Unexpected` causes compare by message.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound { resource: a }, Self::NotFound { resource: b }) => a == b,
            (Self::Unauthorized, Self::Unauthorized)
            | (Self::Forbidden, Self::Forbidden)
            | (Self::Timeout, Self::Timeout) => true,
            (Self::BadRequest { detail: a }, Self::BadRequest { detail: b }) => a == b,
            (Self::ServerError { status: a }, Self::ServerError { status: b }) => a == b,
            (Self::NetworkError { detail: a }, Self::NetworkError { detail: b }) => a == b,
            (
                Self::Unexpected {
                    status: sa,
                    cause: ca,
                },
                Self::Unexpected {
                    status: sb,
                    cause: cb,
                },
            ) => sa == sb && ca.to_string() == cb.to_string(),
            _ => false,
        }
    }
}

/// Pull a human-readable reason out of an error body like
/// `{"message": "..."}` or `{"detail": "..."}`.
fn extract_detail(body: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct Body {
        message: Option<String>,
        detail: Option<String>,
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = serde_json::from_str::<Body>(trimmed) {
        return parsed
            .message
            .or(parsed.detail)
            .filter(|s| !s.trim().is_empty());
    }
    None
}

/// Result type for gateway operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Rewrap any error at a repository-style call site.
pub trait ResultExt<T> {
    /// Convert the error side into an [`ApiError`] without double-wrapping.
    fn or_api(self) -> ApiResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<Box<dyn StdError + Send + Sync + 'static>>,
{
    fn or_api(self) -> ApiResult<T> {
        self.map_err(|e| ApiError::rewrap(e.into()))
    }
}
