//! Encoding strategies that turn a [`Request`] into a wire request.
//!
//! Two strategies are provided:
//!
//! - [`JsonEncoder`] - the whole request as one `application/json` body (default)
//! - [`MultipartEncoder`] - `query` and `variables` as `multipart/form-data` fields
//!
//! Any closure with the signature of [`RequestEncoder::encode`] is an encoder too,
//! so a client can be pointed at endpoints with other conventions.

use crate::{EncodingError, Request};
use bytes::{BufMut, Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use http::Method;
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

/// The media type of single-part JSON requests.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Turns a [`Request`] into a transport-level request for `address`.
///
/// Implementations must not depend on shared mutable state: one encoder is
/// used concurrently by every call on a [`Client`](crate::Client).
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use gqlclient::{Client, EncodingError, Request};
///
/// # fn main() -> Result<(), gqlclient::Error> {
/// // Send the query as plain text.
/// let encoder = |address: &str, request: &Request| -> Result<http::Request<Bytes>, EncodingError> {
///     Ok(http::Request::post(address)
///         .header("content-type", "application/graphql")
///         .body(Bytes::from(request.query().to_string()))?)
/// };
///
/// let client = Client::builder("https://api.example.com/graphql")
///     .encoder(encoder)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub trait RequestEncoder: Send + Sync {
    /// Builds the wire request.
    ///
    /// # Errors
    ///
    /// Returns an error if `address` is not a valid URL or the body cannot be encoded.
    fn encode(&self, address: &str, request: &Request)
        -> Result<http::Request<Bytes>, EncodingError>;
}

impl<F> RequestEncoder for F
where
    F: Fn(&str, &Request) -> Result<http::Request<Bytes>, EncodingError> + Send + Sync,
{
    fn encode(
        &self,
        address: &str,
        request: &Request,
    ) -> Result<http::Request<Bytes>, EncodingError> {
        self(address, request)
    }
}

/// Encodes `{"query": ..., "variables": ...}` as the request body.
///
/// `variables` is left out when there are none.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

#[derive(Serialize)]
struct JsonBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "no_variables")]
    variables: &'a Map<String, Value>,
}

fn no_variables(variables: &&Map<String, Value>) -> bool {
    variables.is_empty()
}

impl RequestEncoder for JsonEncoder {
    fn encode(
        &self,
        address: &str,
        request: &Request,
    ) -> Result<http::Request<Bytes>, EncodingError> {
        let body = JsonBody {
            query: request.query(),
            variables: request.variables(),
        };
        let mut buf = serde_json::to_vec(&body)?;
        buf.push(b'\n');

        post(address, JSON_CONTENT_TYPE, Bytes::from(buf))
    }
}

/// Encodes the request as `multipart/form-data`.
///
/// `query` is written as a plain field and `variables`, when present, as a
/// JSON field. Each encoding uses a fresh random boundary unless one is fixed
/// with [`MultipartEncoder::with_boundary`].
#[derive(Debug, Clone, Default)]
pub struct MultipartEncoder {
    boundary: Option<String>,
}

impl MultipartEncoder {
    /// Creates an encoder with random boundaries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder that always uses `boundary`.
    ///
    /// The boundary is validated when a request is encoded.
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: Some(boundary.into()),
        }
    }
}

impl RequestEncoder for MultipartEncoder {
    fn encode(
        &self,
        address: &str,
        request: &Request,
    ) -> Result<http::Request<Bytes>, EncodingError> {
        let boundary = match &self.boundary {
            Some(boundary) => boundary.clone(),
            None => random_boundary(),
        };
        let mut writer = FormWriter::new(boundary)?;

        writer.write_field("query", request.query().as_bytes())?;

        if !request.variables().is_empty() {
            let mut variables = serde_json::to_vec(request.variables())?;
            variables.push(b'\n');
            writer.write_field("variables", &variables)?;
        }

        let content_type = writer.content_type();
        let body = writer.close();

        post(address, &content_type, body)
    }
}

fn post(
    address: &str,
    content_type: &str,
    body: Bytes,
) -> Result<http::Request<Bytes>, EncodingError> {
    Url::parse(address)?;

    let request = http::Request::builder()
        .method(Method::POST)
        .uri(address)
        .header(CONTENT_TYPE, content_type)
        .body(body)?;

    Ok(request)
}

/// Writes `multipart/form-data` fields into an in-memory buffer.
struct FormWriter {
    boundary: String,
    buf: BytesMut,
}

impl FormWriter {
    fn new(boundary: String) -> Result<Self, EncodingError> {
        validate_boundary(&boundary)?;
        Ok(Self {
            boundary,
            buf: BytesMut::new(),
        })
    }

    fn write_field(&mut self, name: &str, value: &[u8]) -> Result<(), EncodingError> {
        if name.is_empty() || name.contains(['"', '\r', '\n']) {
            return Err(EncodingError::Multipart(format!(
                "invalid field name {:?}",
                name
            )));
        }

        self.buf.put_slice(b"--");
        self.buf.put_slice(self.boundary.as_bytes());
        self.buf.put_slice(b"\r\n");
        self.buf
            .put_slice(b"Content-Disposition: form-data; name=\"");
        self.buf.put_slice(name.as_bytes());
        self.buf.put_slice(b"\"\r\n\r\n");
        self.buf.put_slice(value);
        self.buf.put_slice(b"\r\n");
        Ok(())
    }

    /// The media type, with the boundary quoted when it is not a plain token.
    fn content_type(&self) -> String {
        if self.boundary.contains(TSPECIALS) {
            format!("multipart/form-data; boundary=\"{}\"", self.boundary)
        } else {
            format!("multipart/form-data; boundary={}", self.boundary)
        }
    }

    /// Writes the closing delimiter.
    fn close(mut self) -> Bytes {
        self.buf.put_slice(b"--");
        self.buf.put_slice(self.boundary.as_bytes());
        self.buf.put_slice(b"--\r\n");
        self.buf.freeze()
    }
}

// RFC 2045 tspecials plus space; any of these forces a quoted parameter value.
const TSPECIALS: &[char] = &[
    '(', ')', '<', '>', '@', ',', ';', ':', '\\', '"', '/', '[', ']', '?', '=', ' ',
];

fn random_boundary() -> String {
    let bytes: [u8; 30] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// RFC 2046: 1 to 70 characters from a restricted set, not ending in a space.
fn validate_boundary(boundary: &str) -> Result<(), EncodingError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c);

    if boundary.is_empty()
        || boundary.len() > 70
        || boundary.ends_with(' ')
        || !boundary.chars().all(allowed)
    {
        return Err(EncodingError::Multipart(format!(
            "invalid boundary {:?}",
            boundary
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Splits a multipart body into `(name, value)` pairs.
    fn form_fields(body: &[u8], boundary: &str) -> Vec<(String, String)> {
        let body = String::from_utf8(body.to_vec()).unwrap();
        let delimiter = format!("--{}", boundary);
        assert!(body.ends_with(&format!("{}--\r\n", delimiter)));

        body.split(&delimiter)
            .filter(|part| part.starts_with("\r\n"))
            .map(|part| {
                let (headers, value) = part[2..].split_once("\r\n\r\n").unwrap();
                let name = headers
                    .split("name=\"")
                    .nth(1)
                    .and_then(|rest| rest.split('"').next())
                    .unwrap()
                    .to_string();
                (name, value.strip_suffix("\r\n").unwrap().to_string())
            })
            .collect()
    }

    #[test]
    fn test_json_endpoint() {
        let request = JsonEncoder
            .encode("https://endpoint/query", &Request::new("query {}"))
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().scheme_str(), Some("https"));
        assert_eq!(request.uri().host(), Some("endpoint"));
        assert_eq!(request.uri().path(), "/query");
    }

    #[test]
    fn test_json_invalid_endpoint() {
        let result = JsonEncoder.encode("\r", &Request::new("query {}"));
        assert!(matches!(result, Err(EncodingError::InvalidAddress(_))));

        let result = JsonEncoder.encode("/relative/path", &Request::new("query {}"));
        assert!(matches!(result, Err(EncodingError::InvalidAddress(_))));
    }

    #[test]
    fn test_json_body() {
        let request = Request::new("query {}").with_var("key", "value");
        let request = JsonEncoder
            .encode("https://endpoint/query", &request)
            .unwrap();

        assert_eq!(
            request.body().as_ref(),
            b"{\"query\":\"query {}\",\"variables\":{\"key\":\"value\"}}\n"
        );
    }

    #[test]
    fn test_json_body_omits_empty_variables() {
        let request = JsonEncoder
            .encode("https://endpoint/query", &Request::new("query {}"))
            .unwrap();

        assert_eq!(request.body().as_ref(), b"{\"query\":\"query {}\"}\n");
    }

    #[test]
    fn test_json_content_type() {
        let request = JsonEncoder
            .encode("https://endpoint/query", &Request::new("query {}"))
            .unwrap();

        assert_eq!(
            request.headers()[CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
    }

    #[test]
    fn test_multipart_endpoint() {
        let request = MultipartEncoder::new()
            .encode("https://endpoint/query", &Request::new("query {}"))
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().host(), Some("endpoint"));
        assert_eq!(request.uri().path(), "/query");
    }

    #[test]
    fn test_multipart_invalid_endpoint() {
        let result = MultipartEncoder::new().encode("\r", &Request::new("query {}"));
        assert!(matches!(result, Err(EncodingError::InvalidAddress(_))));
    }

    #[test]
    fn test_multipart_body() {
        let request = Request::new("query {}")
            .with_var("key", "value")
            .with_var("ids", json!([1, 2, 3]));
        let request = MultipartEncoder::with_boundary("test-boundary")
            .encode("https://endpoint/query", &request)
            .unwrap();

        let fields = form_fields(request.body(), "test-boundary");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], ("query".to_string(), "query {}".to_string()));
        assert_eq!(fields[1].0, "variables");
        assert!(fields[1].1.ends_with('\n'));

        let variables: Value = serde_json::from_str(&fields[1].1).unwrap();
        assert_eq!(variables, json!({"key": "value", "ids": [1, 2, 3]}));
    }

    #[test]
    fn test_multipart_omits_empty_variables() {
        let request = MultipartEncoder::with_boundary("b")
            .encode("https://endpoint/query", &Request::new("query {}"))
            .unwrap();

        let fields = form_fields(request.body(), "b");
        assert_eq!(fields, vec![("query".to_string(), "query {}".to_string())]);
    }

    #[test]
    fn test_multipart_content_type() {
        let request = MultipartEncoder::new()
            .encode("https://endpoint/query", &Request::new("query {}"))
            .unwrap();

        let content_type = request.headers()[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));

        let boundary = content_type.rsplit('=').next().unwrap();
        assert_eq!(boundary.len(), 60);
        assert_eq!(form_fields(request.body(), boundary).len(), 1);
    }

    #[test]
    fn test_multipart_quotes_special_boundary() {
        let request = MultipartEncoder::with_boundary("a b:c")
            .encode("https://endpoint/query", &Request::new("query {}"))
            .unwrap();

        assert_eq!(
            request.headers()[CONTENT_TYPE],
            "multipart/form-data; boundary=\"a b:c\""
        );
        assert_eq!(form_fields(request.body(), "a b:c").len(), 1);

        let request = MultipartEncoder::with_boundary("plain-boundary")
            .encode("https://endpoint/query", &Request::new("query {}"))
            .unwrap();
        assert_eq!(
            request.headers()[CONTENT_TYPE],
            "multipart/form-data; boundary=plain-boundary"
        );
    }

    #[test]
    fn test_multipart_invalid_boundary() {
        let result = MultipartEncoder::with_boundary("bad\r\nboundary")
            .encode("https://endpoint/query", &Request::new("query {}"));
        assert!(matches!(result, Err(EncodingError::Multipart(_))));
    }

    #[test]
    fn test_closure_encoder() {
        let encoder = |address: &str,
                       _request: &Request|
         -> Result<http::Request<Bytes>, EncodingError> {
            Ok(http::Request::post(address).body(Bytes::from_static(b"custom"))?)
        };

        let request = encoder
            .encode("https://endpoint/query", &Request::new(""))
            .unwrap();
        assert_eq!(request.body().as_ref(), b"custom");
    }
}
