//! The logical GraphQL request: query text, variables, headers and cancellation.

use crate::{Cancellation, Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// One GraphQL call.
///
/// The query text is carried as-is; it is never parsed or validated.
/// Options are applied in the order they are called, and a later variable
/// or header with the same name replaces an earlier one.
///
/// # Examples
///
/// ```
/// use gqlclient::Request;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), gqlclient::Error> {
/// let request = Request::new("query ($key: String!) { item(id: $key) { name } }")
///     .with_var("key", "value")
///     .with_header("Cache-Control", "no-cache")?
///     .with_timeout(Duration::from_secs(10));
///
/// assert_eq!(request.variables()["key"], "value");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    query: String,
    variables: Map<String, Value>,
    headers: HeaderMap,
    cancellation: Cancellation,
}

impl Request {
    /// Creates a request with no variables, no headers and a token that never fires.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
            headers: HeaderMap::new(),
            cancellation: Cancellation::never(),
        }
    }

    /// Sets a variable.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Sets a variable from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the value cannot be represented as JSON.
    pub fn try_with_var<T>(self, name: impl Into<String>, value: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(crate::EncodingError::Json)?;
        Ok(self.with_var(name, value))
    }

    /// Sets a header sent with this request only.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Replaces the cancellation token.
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Sets a deadline `timeout` from now on the current token.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.cancellation = self.cancellation.with_timeout(timeout);
        self
    }

    /// The query text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The variables, empty when none were set.
    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// Headers set on this request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The cancellation token attached to this request.
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let request = Request::new("query {}");
        assert_eq!(request.query(), "query {}");
        assert!(request.variables().is_empty());
        assert!(request.headers().is_empty());
        assert!(request.cancellation().deadline().is_none());
        assert!(!request.cancellation().is_cancelled());
    }

    #[test]
    fn test_last_variable_wins() {
        let request = Request::new("")
            .with_var("key", "first")
            .with_var("other", 1)
            .with_var("key", "second");

        assert_eq!(request.variables().len(), 2);
        assert_eq!(request.variables()["key"], json!("second"));
    }

    #[test]
    fn test_last_header_wins() {
        let request = Request::new("")
            .with_header("x-test", "a")
            .unwrap()
            .with_header("X-Test", "b")
            .unwrap();

        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.headers()["x-test"], "b");
    }

    #[test]
    fn test_invalid_header() {
        let result = Request::new("").with_header("bad header", "value");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_try_with_var_serializes() {
        #[derive(Serialize)]
        struct Filter {
            name: String,
            limit: u32,
        }

        let request = Request::new("")
            .try_with_var(
                "filter",
                &Filter {
                    name: "a".to_string(),
                    limit: 3,
                },
            )
            .unwrap();

        assert_eq!(
            request.variables()["filter"],
            json!({"name": "a", "limit": 3})
        );
    }

    #[test]
    fn test_with_timeout_sets_deadline() {
        let request = Request::new("").with_timeout(Duration::from_secs(30));
        assert!(request.cancellation().deadline().is_some());
    }
}
