//! The HTTP executor seam.
//!
//! A [`Transport`] sends one wire request and hands back the status, headers
//! and an unread [`ResponseBody`]. [`ReqwestTransport`] is the default; tests
//! and custom stacks implement the trait directly.

use crate::{Cancellation, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::time::Duration;

/// Executes wire requests.
///
/// The request's [`Cancellation`] is stored in its extensions; implementations
/// should abort the call when it fires. Failing to obtain any response is an
/// `Err`; a response with a failing status is an `Ok`.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use bytes::Bytes;
/// use gqlclient::transport::{StaticBody, Transport, TransportResponse};
/// use gqlclient::TransportError;
/// use http::StatusCode;
///
/// struct Canned(&'static str);
///
/// #[async_trait]
/// impl Transport for Canned {
///     async fn execute(
///         &self,
///         _request: http::Request<Bytes>,
///     ) -> Result<TransportResponse, TransportError> {
///         Ok(TransportResponse::new(StatusCode::OK, StaticBody::new(self.0)))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the response head with an unread body.
    async fn execute(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<TransportResponse, TransportError>;
}

/// A response body that must be closed once by its reader.
#[async_trait]
pub trait ResponseBody: Send {
    /// Reads the remaining body.
    async fn read_to_end(&mut self) -> Result<Bytes, TransportError>;

    /// Releases the body, consuming it. Called after reading or after a failed read.
    async fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// A response as returned by a [`Transport`].
pub struct TransportResponse {
    /// The HTTP status code
    pub status: StatusCode,
    /// The response headers
    pub headers: HeaderMap,
    /// The unread body
    pub body: Box<dyn ResponseBody>,
}

impl TransportResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl ResponseBody + 'static) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Box::new(body),
        }
    }

    /// Replaces the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// An in-memory body.
#[derive(Debug, Clone, Default)]
pub struct StaticBody {
    data: Option<Bytes>,
}

impl StaticBody {
    /// Creates a body that yields `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

#[async_trait]
impl ResponseBody for StaticBody {
    async fn read_to_end(&mut self) -> Result<Bytes, TransportError> {
        Ok(self.data.take().unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        Ok(())
    }
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing `reqwest::Client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Builds a client with an optional overall request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(builder.build()?))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<TransportResponse, TransportError> {
        let cancellation = request
            .extensions()
            .get::<Cancellation>()
            .cloned()
            .unwrap_or_default();

        let request = reqwest::Request::try_from(request).map_err(network_error)?;
        let response = cancellation
            .run(self.client.execute(request))
            .await?
            .map_err(network_error)?;

        Ok(TransportResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: Box::new(ReqwestBody {
                response: Some(response),
            }),
        })
    }
}

struct ReqwestBody {
    response: Option<reqwest::Response>,
}

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn read_to_end(&mut self) -> Result<Bytes, TransportError> {
        match self.response.take() {
            Some(response) => response.bytes().await.map_err(network_error),
            None => Ok(Bytes::new()),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        // Dropping an unread response returns its connection to the pool.
        drop(self.response);
        Ok(())
    }
}

fn network_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_body_reads_once() {
        let mut body: Box<dyn ResponseBody> = Box::new(StaticBody::new("{}"));
        assert_eq!(body.read_to_end().await.unwrap(), Bytes::from_static(b"{}"));
        assert!(body.read_to_end().await.unwrap().is_empty());
        body.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_reqwest_transport_connection_refused() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let transport = ReqwestTransport::default();
        let request = http::Request::post("http://127.0.0.1:9/graphql")
            .body(Bytes::new())
            .unwrap();

        let result = transport.execute(request).await;
        assert!(matches!(result, Err(TransportError::Network(_))));
    }

    #[tokio::test]
    async fn test_reqwest_transport_honors_cancellation() {
        let (cancellation, handle) = Cancellation::new();
        handle.cancel();

        let mut request = http::Request::post("http://127.0.0.1:9/graphql")
            .body(Bytes::new())
            .unwrap();
        request.extensions_mut().insert(cancellation);

        let result = ReqwestTransport::default().execute(request).await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }
}
