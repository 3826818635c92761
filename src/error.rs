//! Error types for GraphQL calls.
//!
//! [`Error`] has one variant per way a call can fail, from building the wire
//! request through reading and classifying the response. The lower-level
//! [`EncodingError`], [`TransportError`] and [`DecodeError`] are kept as
//! sources so the underlying cause is never lost.

use crate::response::ErrorList;
use crate::Interrupted;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

/// The main error type for GraphQL calls.
///
/// Exactly one variant is produced per call. When the body could be read,
/// the decode-derived variants ([`Error::Http`], [`Error::BadResponse`],
/// [`Error::Graphql`]) take precedence over [`Error::CloseBody`].
///
/// # Examples
///
/// ```no_run
/// use gqlclient::{Client, Error, Request};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::new("https://api.example.com/graphql")?;
///
/// match client.run::<serde_json::Value>(&Request::new("{ viewer { login } }")).await {
///     Ok(response) => println!("Data: {:?}", response.data),
///     Err(Error::Graphql { errors, .. }) => {
///         for error in &errors {
///             eprintln!("{}", error);
///         }
///     }
///     Err(Error::Http { status, .. }) => eprintln!("Endpoint failed with {}", status),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request could not be turned into a wire request.
    #[error("encode request: {0}")]
    Encoding(#[from] EncodingError),

    /// The transport produced no response at all.
    #[error("do request: {0}")]
    Transport(#[source] TransportError),

    /// Releasing the response body failed after an otherwise successful call.
    #[error("close body: {0}")]
    CloseBody(#[source] TransportError),

    /// The endpoint answered with a non-200 status and a body that is not a
    /// GraphQL envelope, so the failure happened below the GraphQL layer.
    #[error("http error: {}", status_text(.status))]
    Http {
        /// The HTTP status code
        status: StatusCode,
        /// Why the body could not be decoded
        #[source]
        source: DecodeError,
    },

    /// The endpoint answered 200 with a body that is not a GraphQL envelope.
    #[error("response was not GraphQL compliant")]
    BadResponse {
        /// The HTTP status code
        status: StatusCode,
        /// Why the body could not be decoded
        #[source]
        source: DecodeError,
    },

    /// The envelope carried one or more GraphQL errors.
    ///
    /// `data` holds whatever payload the endpoint returned alongside them.
    #[error("{errors}")]
    Graphql {
        /// The errors in wire order, never empty
        errors: ErrorList,
        /// The partial payload, if the envelope had a non-null `data` member
        data: Option<Box<RawValue>>,
    },

    /// Invalid configuration was provided, such as a malformed header.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

fn status_text(status: &StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

impl Error {
    /// Returns `true` if repeating the call may succeed.
    ///
    /// Transport failures other than cancellation, and `Http` errors with a
    /// 5xx or 429 status, are retryable. The client never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_retryable(),
            Error::Http { status, .. } => status.is_server_error() || status.as_u16() == 429,
            Error::Encoding(_) => false,
            Error::CloseBody(_) => false,
            Error::BadResponse { .. } => false,
            Error::Graphql { .. } => false,
            Error::Configuration(_) => false,
        }
    }

    /// Returns the HTTP status code for errors classified from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::BadResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the GraphQL errors, if the endpoint reported any.
    pub fn graphql_errors(&self) -> Option<&ErrorList> {
        match self {
            Error::Graphql { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Decodes the partial payload that accompanied GraphQL errors.
    ///
    /// Returns `None` for other variants or when no payload was returned.
    pub fn partial_data<T>(&self) -> Option<serde_json::Result<T>>
    where
        T: DeserializeOwned,
    {
        match self {
            Error::Graphql {
                data: Some(data), ..
            } => Some(serde_json::from_str(data.get())),
            _ => None,
        }
    }
}

/// Failure to build a wire request from a [`Request`](crate::Request).
#[derive(thiserror::Error, Debug)]
pub enum EncodingError {
    /// The client address is not a well-formed absolute URL.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] url::ParseError),

    /// JSON encoding of the body or variables failed.
    #[error("encode json: {0}")]
    Json(#[from] serde_json::Error),

    /// A multipart field could not be written.
    #[error("write multipart field: {0}")]
    Multipart(String),

    /// The HTTP request could not be assembled.
    #[error("create http request: {0}")]
    Http(#[from] http::Error),

    /// Failure raised by a custom encoder.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

/// Failure reported by a [`Transport`](crate::Transport) or a response body.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The request's cancellation handle fired.
    #[error("request cancelled")]
    Cancelled,

    /// The request's deadline passed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// The underlying client timed out.
    #[error("Request timed out")]
    Timeout,

    /// A network-level error (connection refused, DNS failure, broken stream).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failure raised by a custom transport or body.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wraps an arbitrary error from a custom transport.
    pub fn other(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TransportError::Other(error.into())
    }

    /// Returns `true` unless the failure came from the caller's cancellation.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransportError::Cancelled | TransportError::DeadlineExceeded
        )
    }
}

impl From<Interrupted> for TransportError {
    fn from(reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => TransportError::Cancelled,
            Interrupted::DeadlineExceeded => TransportError::DeadlineExceeded,
        }
    }
}

/// Why a response body could not be decoded into an envelope.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The body could not be read.
    #[error("read body: {0}")]
    Read(#[source] TransportError),

    /// The body is not a valid envelope, or its payload does not fit the requested type.
    #[error("decode body: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for GraphQL calls.
///
/// This is a convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
