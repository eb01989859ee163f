//! HTTP request type.
//!
//! [`HttpRequest`] is the request context handed to checkpoints and providers.
//! It is passed explicitly through dispatch; nothing stores the in-flight
//! request globally.

use std::collections::HashMap;

use http::{HeaderMap, Method};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;

use hypr_rs_core::{HyprError, HyprResult};

/// An incoming HTTP request.
///
/// # Examples
///
/// ```
/// use hypr_rs_http::HttpRequest;
///
/// let request = HttpRequest::builder()
///     .method(http::Method::GET)
///     .path("/users/42")
///     .query_string("fields=name&fields=email")
///     .header("accept", "application/json")
///     .build();
///
/// assert_eq!(request.method(), &http::Method::GET);
/// assert_eq!(request.path(), "/users/42");
/// assert_eq!(request.query_values("fields"), ["name", "email"]);
/// assert_eq!(request.accept_or("*/*"), "application/json");
/// ```
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    query_string: String,
    query: HashMap<String, Vec<String>>,
    headers: HeaderMap,
    body: Vec<u8>,
    scheme: String,
}

fn parse_query(query_string: &str) -> HashMap<String, Vec<String>> {
    let mut query: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
        query.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    query
}

impl HttpRequest {
    /// Creates a new [`HttpRequestBuilder`].
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// Creates an `HttpRequest` from axum request parts and the body bytes.
    ///
    /// The path is percent-decoded before routing.
    pub fn from_axum(parts: http::request::Parts, body: Vec<u8>) -> Self {
        let uri = parts.uri;
        let path = percent_decode_str(uri.path()).decode_utf8_lossy().into_owned();
        let query_string = uri.query().unwrap_or("").to_string();
        let query = parse_query(&query_string);

        let scheme = if parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "https")
        {
            "https".to_string()
        } else {
            "http".to_string()
        };

        Self {
            method: parts.method,
            path,
            query_string,
            query,
            headers: parts.headers,
            body,
            scheme,
        }
    }

    /// Returns the HTTP method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the decoded request path (without query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query string (without the leading `?`).
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// Returns the first value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value of a query parameter.
    pub fn query_values(&self, name: &str) -> &[String] {
        self.query.get(name).map_or(&[], Vec::as_slice)
    }

    /// Returns the request headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as text, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the `Accept` header, or `default` when the request has none.
    pub fn accept_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.header("accept").unwrap_or(default)
    }

    /// Returns the raw request body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HyprError::BadRequest`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> HyprResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HyprError::BadRequest(format!("invalid JSON body: {e}")))
    }

    /// Returns the URL scheme (`"http"` or `"https"`).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns `true` if the request uses HTTPS.
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// Returns the full path including the query string.
    pub fn get_full_path(&self) -> String {
        if self.query_string.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string)
        }
    }
}

/// Builder for constructing [`HttpRequest`] instances, mostly in tests.
#[derive(Debug)]
pub struct HttpRequestBuilder {
    method: Method,
    path: String,
    query_string: String,
    headers: HeaderMap,
    body: Vec<u8>,
    scheme: String,
}

impl Default for HttpRequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_string(),
            query_string: String::new(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            scheme: "http".to_string(),
        }
    }
}

impl HttpRequestBuilder {
    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the request path.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Sets the query string (without leading `?`).
    #[must_use]
    pub fn query_string(mut self, qs: &str) -> Self {
        self.query_string = qs.to_string();
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Sets a JSON body and the matching content type.
    #[must_use]
    pub fn json(self, value: &serde_json::Value) -> Self {
        self.header("content-type", "application/json")
            .body(value.to_string().into_bytes())
    }

    /// Sets the scheme (http or https).
    #[must_use]
    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Builds the [`HttpRequest`].
    pub fn build(self) -> HttpRequest {
        let query = parse_query(&self.query_string);
        HttpRequest {
            method: self.method,
            path: self.path,
            query_string: self.query_string,
            query,
            headers: self.headers,
            body: self.body,
            scheme: self.scheme,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let request = HttpRequest::builder().build();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.path(), "/");
        assert_eq!(request.query_string(), "");
        assert_eq!(request.accept_or("text/plain"), "text/plain");
        assert!(request.body().is_empty());
        assert!(!request.is_secure());
    }

    #[test]
    fn test_query_params() {
        let request = HttpRequest::builder()
            .query_string("page=2&tag=a&tag=b&q=hello+world")
            .build();
        assert_eq!(request.query_param("page"), Some("2"));
        assert_eq!(request.query_values("tag"), ["a", "b"]);
        assert_eq!(request.query_param("q"), Some("hello world"));
        assert_eq!(request.query_param("missing"), None);
        assert!(request.query_values("missing").is_empty());
    }

    #[test]
    fn test_get_full_path() {
        let request = HttpRequest::builder().path("/a").build();
        assert_eq!(request.get_full_path(), "/a");
        let request = HttpRequest::builder().path("/a").query_string("x=1").build();
        assert_eq!(request.get_full_path(), "/a?x=1");
    }

    #[test]
    fn test_json_body() {
        let request = HttpRequest::builder()
            .method(Method::POST)
            .json(&serde_json::json!({"name": "bob"}))
            .build();
        assert_eq!(request.header("content-type"), Some("application/json"));
        let value: serde_json::Value = request.json().unwrap();
        assert_eq!(value["name"], "bob");

        let bad = HttpRequest::builder().body(b"{".to_vec()).build();
        let err = bad.json::<serde_json::Value>().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_from_axum_decodes_path() {
        let req = http::Request::builder()
            .method(Method::PUT)
            .uri("/files/a%20b?x=1")
            .header("x-forwarded-proto", "https")
            .body(())
            .unwrap();
        let (parts, ()) = req.into_parts();
        let request = HttpRequest::from_axum(parts, b"data".to_vec());
        assert_eq!(request.method(), &Method::PUT);
        assert_eq!(request.path(), "/files/a b");
        assert_eq!(request.query_param("x"), Some("1"));
        assert_eq!(request.body(), b"data");
        assert!(request.is_secure());
    }
}
