//! GraphQL client with pluggable encoding and transport.
//!
//! The [`Client`] type is the main entry point for executing requests.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    encode::{JsonEncoder, RequestEncoder},
    response::{decode_data, decode_errors, DataEnvelope},
    transport::{ReqwestTransport, ResponseBody, Transport, TransportResponse},
    DecodeError, Error, Request, Response, Result, TransportError,
};
use bytes::Bytes;
use http::header::ACCEPT;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The default `Accept` header value.
pub const DEFAULT_ACCEPT: &str = "application/json; charset=utf-8";

/// A client for one GraphQL endpoint.
///
/// The client holds no per-call state: clone it or share it freely across
/// tasks. Each call encodes the request, executes it on the transport, decodes
/// the envelope and classifies the outcome. Nothing is retried.
///
/// # Examples
///
/// ```no_run
/// use gqlclient::{Client, MultipartEncoder, Request};
/// use serde::Deserialize;
///
/// #[derive(Default, Deserialize)]
/// struct Item {
///     field1: String,
/// }
///
/// #[derive(Default, Deserialize)]
/// struct Data {
///     item: Item,
/// }
///
/// # async fn example(token: &str) -> Result<(), gqlclient::Error> {
/// let client = Client::builder("https://localhost/graphql")
///     .default_header("Authorization", format!("Bearer {}", token))?
///     .encoder(MultipartEncoder::new())
///     .build()?;
///
/// let request = Request::new("query ($key: String!) { item(id: $key) { field1 } }")
///     .with_var("key", "value")
///     .with_header("Cache-Control", "no-cache")?;
///
/// let response = client.run::<Data>(&request).await?;
/// println!("field1: {}", response.data.item.field1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    address: String,
    transport: Arc<dyn Transport>,
    default_headers: HeaderMap,
    encoder: Arc<dyn RequestEncoder>,
}

impl Client {
    /// Creates a client with the default JSON encoder and reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Self::builder(address).build()
    }

    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder(address: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(address)
    }

    /// The endpoint address.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Headers applied to every request, before per-request headers.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.inner.default_headers
    }

    /// Executes the request and decodes the `data` member into `T`.
    ///
    /// A compliant envelope without errors whose `data` is missing or `null`
    /// succeeds with `T::default()`.
    ///
    /// # Errors
    ///
    /// - [`Error::Encoding`] / [`Error::Transport`] if no response was obtained
    /// - [`Error::Http`] if the status is not 200 and the body is not an envelope
    /// - [`Error::BadResponse`] if the status is 200 and the body is not an envelope
    ///   or the payload does not fit `T`
    /// - [`Error::Graphql`] if the envelope carries errors; the payload travels with it
    /// - [`Error::CloseBody`] if releasing the body failed after all of the above passed
    pub async fn run<T>(&self, request: &Request) -> Result<Response<T>>
    where
        T: DeserializeOwned + Default,
    {
        let exchange = self.exchange(request).await?;

        let classified = match exchange.body.and_then(|body| decode_payload::<T>(&body)) {
            Err(e) => Err(classify_decode_failure(exchange.status, e)),
            Ok((data, envelope)) if envelope.errors.is_empty() => Ok(data.unwrap_or_default()),
            Ok((_, envelope)) => Err(Error::Graphql {
                errors: envelope.errors,
                data: envelope.data,
            }),
        };

        finish(classified, exchange.status, exchange.headers, exchange.closed, exchange.latency)
    }

    /// Executes the request without decoding the `data` member.
    ///
    /// Only the `errors` member is extracted. Failures are classified as for
    /// [`Client::run`].
    pub async fn execute(&self, request: &Request) -> Result<Response<()>> {
        let exchange = self.exchange(request).await?;

        let decoded = exchange
            .body
            .and_then(|body| decode_errors(&body).map_err(DecodeError::Json));
        let classified = match decoded {
            Err(e) => Err(classify_decode_failure(exchange.status, e)),
            Ok(envelope) if envelope.errors.is_empty() => Ok(()),
            Ok(envelope) => Err(Error::Graphql {
                errors: envelope.errors,
                data: None,
            }),
        };

        finish(classified, exchange.status, exchange.headers, exchange.closed, exchange.latency)
    }

    /// Encodes and sends the request, then reads and closes the body.
    ///
    /// Returns `Err` only when no response was obtained.
    async fn exchange(&self, request: &Request) -> Result<Exchange> {
        let start_time = Instant::now();
        let wire = self.prepare(request)?;

        tracing::debug!(
            method = %wire.method(),
            url = %wire.uri(),
            "Executing GraphQL request"
        );

        let TransportResponse {
            status,
            headers,
            mut body,
        } = self.inner.transport.execute(wire).await.map_err(|e| {
            tracing::warn!(error = %e, "GraphQL request failed");
            Error::Transport(e)
        })?;

        let read = match request.cancellation().run(body.read_to_end()).await {
            Ok(read) => read,
            Err(reason) => Err(reason.into()),
        };
        let closed = body.close().await;
        let latency = start_time.elapsed();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            "Received GraphQL response"
        );

        Ok(Exchange {
            status,
            headers,
            body: read.map_err(DecodeError::Read),
            closed,
            latency,
        })
    }

    /// Builds the wire request: encoder output, then default headers, then
    /// per-request headers, with the cancellation token attached.
    fn prepare(&self, request: &Request) -> Result<http::Request<Bytes>> {
        let mut wire = self
            .inner
            .encoder
            .encode(&self.inner.address, request)?;

        let headers = wire.headers_mut();
        for (name, value) in &self.inner.default_headers {
            headers.insert(name, value.clone());
        }
        for (name, value) in request.headers() {
            headers.insert(name, value.clone());
        }

        wire.extensions_mut().insert(request.cancellation().clone());
        Ok(wire)
    }
}

/// One request/response exchange with the body already read and closed.
struct Exchange {
    status: StatusCode,
    headers: HeaderMap,
    body: std::result::Result<Bytes, DecodeError>,
    closed: std::result::Result<(), TransportError>,
    latency: Duration,
}

/// Decodes the envelope and its payload, if it has one.
fn decode_payload<T>(body: &[u8]) -> std::result::Result<(Option<T>, DataEnvelope), DecodeError>
where
    T: DeserializeOwned,
{
    let envelope = decode_data(body)?;
    let data = envelope.payload()?;
    Ok((data, envelope))
}

/// A compliant endpoint answers 200 and reports failures in the envelope, so
/// a non-200 status is only trusted when the body could not be decoded.
fn classify_decode_failure(status: StatusCode, source: DecodeError) -> Error {
    tracing::error!(
        error = %source,
        status = status.as_u16(),
        "Failed to decode GraphQL response"
    );

    if status != StatusCode::OK {
        Error::Http { status, source }
    } else {
        Error::BadResponse { status, source }
    }
}

/// Ranks the classified outcome above the close result.
fn finish<T>(
    classified: Result<T>,
    status: StatusCode,
    headers: HeaderMap,
    closed: std::result::Result<(), TransportError>,
    latency: Duration,
) -> Result<Response<T>> {
    match (classified, closed) {
        (Err(e), _) => {
            tracing::warn!(error = %e, status = status.as_u16(), "GraphQL request failed");
            Err(e)
        }
        (Ok(_), Err(e)) => {
            tracing::warn!(error = %e, "Failed to close response body");
            Err(Error::CloseBody(e))
        }
        (Ok(data), Ok(())) => Ok(Response::new(data, status, headers, latency)),
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```
/// use gqlclient::{ClientBuilder, MultipartEncoder};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), gqlclient::Error> {
/// let client = ClientBuilder::new("https://api.example.com/graphql")
///     .timeout(Duration::from_secs(30))
///     .encoder(MultipartEncoder::new())
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
///
/// assert_eq!(client.default_headers()["user-agent"], "my-app/1.0");
/// assert_eq!(client.default_headers()["accept"], "application/json; charset=utf-8");
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    address: String,
    transport: Option<Arc<dyn Transport>>,
    default_headers: HeaderMap,
    encoder: Arc<dyn RequestEncoder>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a builder with the JSON encoder and an `Accept` default header.
    pub fn new(address: impl Into<String>) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));

        Self {
            address: address.into(),
            transport: None,
            default_headers,
            encoder: Arc::new(JsonEncoder),
            timeout: None,
        }
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// A later call with the same name replaces the earlier value, including
    /// the built-in `Accept` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the transport that executes wire requests.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the encoding strategy.
    pub fn encoder(mut self, encoder: impl RequestEncoder + 'static) -> Self {
        self.encoder = Arc::new(encoder);
        self
    }

    /// Sets an overall timeout on the default reqwest transport.
    ///
    /// Ignored when a custom transport is set. Per-request deadlines are set
    /// with [`Request::with_timeout`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP client cannot be built.
    pub fn build(self) -> Result<Client> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let transport = ReqwestTransport::with_timeout(self.timeout).map_err(|e| {
                    Error::Configuration(format!("Failed to build HTTP client: {}", e))
                })?;
                Arc::new(transport)
            }
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                address: self.address,
                transport,
                default_headers: self.default_headers,
                encoder: self.encoder,
            }),
        })
    }
}
