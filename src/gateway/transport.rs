//! Transport seam between the gateway and the network.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::ApiError;
use crate::session::Credential;

/// HTTP verb of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        })
    }
}

/// A REST call, independent of any HTTP client.
///
/// Path segments are kept unencoded; the transport encodes each one when
/// joining it onto its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub bearer: Option<Credential>,
}

impl TransportRequest {
    /// Request for `method` on the given path segments.
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    /// `GET` on `segments`.
    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Get, segments)
    }

    /// `POST` on `segments`.
    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Post, segments)
    }

    /// `PUT` on `segments`.
    pub fn put<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Put, segments)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body. A body that fails to serialize fails the call
    /// before anything is sent.
    pub fn json<T: serde::Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| {
            tracing::error!(error = %e, "failed to serialize request body");
            ApiError::wrap(e)
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Credential for the `Authorization` header, if any.
    pub fn bearer(mut self, credential: Option<Credential>) -> Self {
        self.bearer = credential;
        self
    }

    /// Route for logs, e.g. `GET cards/c-1`.
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.segments.join("/"))
    }
}

/// Raw response as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    /// Response with `status` and a raw body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `2xx` status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below the HTTP status level.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => ApiError::Timeout,
            TransportError::Connect(detail) => ApiError::NetworkError { detail },
            other => ApiError::wrap(other),
        }
    }
}

/// Sends [`TransportRequest`]s. Implemented over `reqwest` by
/// `HttpTransport` and by scripted fakes in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
