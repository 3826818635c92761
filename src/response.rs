//! GraphQL response envelopes, errors and the successful-call wrapper.
//!
//! The wire envelope is a JSON object with an optional `data` member and an
//! optional `errors` array. [`decode`] reads it in one of two shapes: with
//! the payload kept as raw JSON for later typed decoding, or with only the
//! errors extracted.

use http::{HeaderMap, StatusCode};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// A successful GraphQL call.
///
/// # Examples
///
/// ```no_run
/// use gqlclient::{Client, Request};
/// use serde::Deserialize;
///
/// #[derive(Default, Deserialize)]
/// struct Viewer {
///     login: String,
/// }
///
/// #[derive(Default, Deserialize)]
/// struct Data {
///     viewer: Viewer,
/// }
///
/// # async fn example() -> Result<(), gqlclient::Error> {
/// let client = Client::new("https://api.example.com/graphql")?;
///
/// let response = client.run::<Data>(&Request::new("{ viewer { login } }")).await?;
///
/// println!("Login: {}", response.data.viewer.login);
/// println!("Request took {:?}", response.latency);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded `data` member.
    pub data: T,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from dispatching the request until the body was decoded.
    pub latency: Duration,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(data: T, status: StatusCode, headers: HeaderMap, latency: Duration) -> Self {
        Self {
            data,
            status,
            headers,
            latency,
        }
    }

    /// Maps the payload to a different type, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use gqlclient::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(42, StatusCode::OK, HeaderMap::new(), Duration::from_millis(5));
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
            latency: self.latency,
        }
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// One segment of the path to the field an error refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A list index.
    Index(usize),
    /// A field name or alias.
    Name(String),
}

/// A position in the query document, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Line number
    pub line: u32,
    /// Column number
    pub column: u32,
}

/// A single error reported inside a GraphQL envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphError {
    /// Human-readable description
    pub message: String,

    /// Path to the field that failed, empty for request-level errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,

    /// Positions in the query document the error refers to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// Implementation-specific details
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl GraphError {
    /// Formats the path as `users[1].firstName`.
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.path.iter().enumerate() {
            match segment {
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
                PathSegment::Name(name) => {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(name);
                }
            }
        }
        out
    }
}

/// Formats as `graphql:<line>:<column>: <path>: <message>`, omitting the
/// location and path when absent.
impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("graphql:")?;
        if let Some(location) = self.locations.first() {
            write!(f, "{}:{}:", location.line, location.column)?;
        }
        if !self.path.is_empty() {
            write!(f, " {}:", self.path_string())?;
        }
        write!(f, " {}", self.message)
    }
}

impl std::error::Error for GraphError {}

/// The `errors` member of an envelope, in wire order.
///
/// An empty list means the call succeeded at the GraphQL layer. As an error
/// it displays its first entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorList(Vec<GraphError>);

impl ErrorList {
    /// Creates a list from errors in wire order.
    pub fn new(errors: Vec<GraphError>) -> Self {
        Self(errors)
    }

    /// Consumes the list, returning the errors.
    pub fn into_inner(self) -> Vec<GraphError> {
        self.0
    }
}

impl std::ops::Deref for ErrorList {
    type Target = [GraphError];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a GraphError;
    type IntoIter = std::slice::Iter<'a, GraphError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for ErrorList {
    type Item = GraphError;
    type IntoIter = std::vec::IntoIter<GraphError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// `"errors": null` is treated the same as a missing member.
impl<'de> Deserialize<'de> for ErrorList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let errors = Option::<Vec<GraphError>>::deserialize(deserializer)?;
        Ok(Self(errors.unwrap_or_default()))
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.first() {
            Some(first) => fmt::Display::fmt(first, f),
            None => Ok(()),
        }
    }
}

impl std::error::Error for ErrorList {}

/// An envelope decoded with its payload.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope {
    /// The `data` member as unparsed JSON, `None` when missing or `null`
    #[serde(default)]
    pub data: Option<Box<RawValue>>,

    /// The `errors` member
    #[serde(default)]
    pub errors: ErrorList,
}

impl DataEnvelope {
    /// Decodes the payload into `T`.
    ///
    /// Returns `Ok(None)` when the `data` member is missing or `null`.
    pub fn payload<T>(&self) -> serde_json::Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.data
            .as_ref()
            .map(|raw| serde_json::from_str(raw.get()))
            .transpose()
    }
}

/// An envelope decoded for its errors only. The `data` member is skipped.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorsEnvelope {
    /// The `errors` member
    #[serde(default)]
    pub errors: ErrorList,
}

/// A decoded response body.
#[derive(Debug)]
pub enum Envelope {
    /// Payload and errors
    Data(DataEnvelope),
    /// Errors only
    ErrorsOnly(ErrorsEnvelope),
}

impl Envelope {
    /// The errors carried by either shape.
    pub fn errors(&self) -> &ErrorList {
        match self {
            Envelope::Data(envelope) => &envelope.errors,
            Envelope::ErrorsOnly(envelope) => &envelope.errors,
        }
    }
}

/// Decodes a response body into an envelope.
///
/// With `wants_payload` the `data` member is kept; otherwise it is skipped and
/// only `errors` is extracted. Either way the body must be a well-formed JSON object.
///
/// # Examples
///
/// ```
/// use gqlclient::response::{decode, Envelope};
///
/// let envelope = decode(br#"{"data": {"value": 1}}"#, false).unwrap();
/// assert!(matches!(envelope, Envelope::ErrorsOnly(_)));
/// assert!(envelope.errors().is_empty());
///
/// assert!(decode(b"", false).is_err());
/// ```
pub fn decode(body: &[u8], wants_payload: bool) -> serde_json::Result<Envelope> {
    if wants_payload {
        decode_data(body).map(Envelope::Data)
    } else {
        decode_errors(body).map(Envelope::ErrorsOnly)
    }
}

/// Decodes a response body, keeping the payload as raw JSON.
pub fn decode_data(body: &[u8]) -> serde_json::Result<DataEnvelope> {
    serde_json::from_slice(body)
}

/// Decodes only the `errors` member of a response body.
pub fn decode_errors(body: &[u8]) -> serde_json::Result<ErrorsEnvelope> {
    serde_json::from_slice(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(path: Vec<PathSegment>, locations: Vec<Location>) -> GraphError {
        GraphError {
            message: "message".to_string(),
            path,
            locations,
            extensions: Map::new(),
        }
    }

    fn users_path() -> Vec<PathSegment> {
        vec![
            PathSegment::Name("users".to_string()),
            PathSegment::Index(1),
            PathSegment::Name("firstName".to_string()),
        ]
    }

    #[test]
    fn test_error_message_only() {
        assert_eq!(error(vec![], vec![]).to_string(), "graphql: message");
    }

    #[test]
    fn test_error_with_path() {
        assert_eq!(
            error(users_path(), vec![]).to_string(),
            "graphql: users[1].firstName: message"
        );
    }

    #[test]
    fn test_error_with_location() {
        let location = Location { line: 1, column: 2 };
        assert_eq!(
            error(vec![], vec![location]).to_string(),
            "graphql:1:2: message"
        );
    }

    #[test]
    fn test_error_with_path_and_location() {
        let location = Location { line: 1, column: 2 };
        assert_eq!(
            error(users_path(), vec![location]).to_string(),
            "graphql:1:2: users[1].firstName: message"
        );
    }

    #[test]
    fn test_path_starting_with_index() {
        let err = error(
            vec![PathSegment::Index(0), PathSegment::Name("id".to_string())],
            vec![],
        );
        assert_eq!(err.path_string(), "[0].id");
    }

    #[test]
    fn test_decode_errors_in_wire_order() {
        let body = br#"{
            "errors": [
                {"message": "first", "path": ["someList", 1, "someField"], "locations": [{"line": 1, "column": 2}]},
                {"message": "second", "extensions": {"code": "INTERNAL"}}
            ]
        }"#;

        let envelope = decode(body, false).unwrap();
        let errors = envelope.errors();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "first");
        assert_eq!(
            errors[0].path,
            vec![
                PathSegment::Name("someList".to_string()),
                PathSegment::Index(1),
                PathSegment::Name("someField".to_string()),
            ]
        );
        assert_eq!(errors[1].extensions["code"], "INTERNAL");
        assert_eq!(
            errors.to_string(),
            "graphql:1:2: someList[1].someField: first"
        );
    }

    #[test]
    fn test_decode_null_errors() {
        let envelope = decode(br#"{"data": null, "errors": null}"#, true).unwrap();
        assert!(envelope.errors().is_empty());
        match envelope {
            Envelope::Data(data) => assert!(data.data.is_none()),
            Envelope::ErrorsOnly(_) => panic!("Expected data envelope"),
        }
    }

    #[test]
    fn test_errors_only_skips_payload() {
        // A payload that does not match any type is still skipped.
        let envelope = decode(br#"{"data": [1, "two", {"three": 3}]}"#, false).unwrap();
        assert!(matches!(envelope, Envelope::ErrorsOnly(_)));
    }

    #[test]
    fn test_payload_decoding() {
        #[derive(Deserialize)]
        struct Data {
            value: String,
        }

        let envelope = decode(br#"{"data": {"value": "some data"}}"#, true).unwrap();
        let Envelope::Data(envelope) = envelope else {
            panic!("Expected data envelope");
        };
        let data: Data = envelope.payload().unwrap().unwrap();
        assert_eq!(data.value, "some data");
    }

    #[test]
    fn test_missing_payload() {
        for body in [&br#"{}"#[..], br#"{"data": null}"#, br#"{"errors": []}"#] {
            let envelope = decode_data(body).unwrap();
            assert!(envelope.errors.is_empty());
            assert_eq!(envelope.payload::<String>().unwrap(), None);
        }

        let envelope = decode_data(br#"{"data": {"value": 1}}"#).unwrap();
        assert!(envelope.payload::<String>().is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_body() {
        assert!(decode(b"", true).is_err());
        assert!(decode(b"not json", false).is_err());
        assert!(decode(br#"{"errors": [{"path": []}]}"#, false).is_err());
    }

    #[test]
    fn test_empty_list_displays_nothing() {
        assert_eq!(ErrorList::default().to_string(), "");
    }
}
