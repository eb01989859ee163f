//! HTTP response type.
//!
//! [`HttpResponse`] is what checkpoints return to abort a dispatch early, what
//! providers may return instead of data, and what the application turns every
//! [`HyprError`] into via [`HttpResponse::from_error`].

use axum::response::IntoResponse;
use http::{HeaderMap, HeaderValue, StatusCode};

use hypr_rs_core::HyprError;

/// An HTTP response with a buffered body.
///
/// # Examples
///
/// ```
/// use hypr_rs_http::HttpResponse;
///
/// let response = HttpResponse::ok("Hello, World!");
/// assert_eq!(response.status(), http::StatusCode::OK);
/// assert_eq!(response.text(), "Hello, World!");
/// ```
#[derive(Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    content: Vec<u8>,
    content_type: String,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content.len())
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    /// Creates a `text/plain` response with the given status code and body.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            content: body.into().into_bytes(),
            content_type: "text/plain".to_string(),
        }
    }

    /// Creates a response with a raw byte body.
    pub fn with_bytes(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            content: body,
            content_type: "application/octet-stream".to_string(),
        }
    }

    /// Creates a response with an already serialized body and its mimetype.
    pub fn with_content_type(
        status: StatusCode,
        body: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        let mut response = Self::new(status, body);
        response.content_type = content_type.into();
        response
    }

    /// Creates an `application/json` response from any serializable value.
    pub fn json<T: serde::Serialize>(status: StatusCode, data: &T) -> Self {
        match serde_json::to_string(data) {
            Ok(json) => Self::with_content_type(status, json, "application/json"),
            Err(e) => Self::server_error(format!("JSON serialization error: {e}")),
        }
    }

    /// Creates a 200 OK response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// Creates a 404 Not Found response.
    pub fn not_found(body: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, body)
    }

    /// Creates a 403 Forbidden response.
    pub fn forbidden(body: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, body)
    }

    /// Creates a 400 Bad Request response.
    pub fn bad_request(body: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, body)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn server_error(body: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, body)
    }

    /// Creates a 405 Method Not Allowed response with an `Allow` header.
    pub fn not_allowed(permitted_methods: &[&str]) -> Self {
        let allow = permitted_methods.join(", ");
        let mut response = Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("Method Not Allowed. Permitted: {allow}"),
        );
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers.insert(http::header::ALLOW, value);
        }
        response
    }

    /// Creates a 307 Temporary Redirect response to `location`.
    pub fn temporary_redirect(location: &str) -> Self {
        let mut response = Self::new(StatusCode::TEMPORARY_REDIRECT, "");
        if let Ok(value) = HeaderValue::from_str(location) {
            response.headers.insert(http::header::LOCATION, value);
        }
        response
    }

    /// Translates an error into the response the client should see.
    ///
    /// Redirects carry a `Location` header and method errors an `Allow`
    /// header. Every other error uses [`HyprError::status_code`] with the
    /// error message as body.
    pub fn from_error(error: &HyprError) -> Self {
        match error {
            HyprError::TemporaryRedirect(location) => Self::temporary_redirect(location),
            HyprError::MethodNotAllowed { allowed, .. } => {
                let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
                Self::not_allowed(&allowed)
            }
            other => {
                let status = StatusCode::from_u16(other.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                Self::new(status, other.to_string())
            }
        }
    }

    /// Returns the status code.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns a reference to the headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a mutable reference to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Adds a header to the response.
    #[must_use]
    pub fn set_header(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the content type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Sets the content type.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    /// Returns the body bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    fn full_content_type(&self) -> String {
        if self.content_type.starts_with("text/") || self.content_type.contains("json") {
            format!("{}; charset=utf-8", self.content_type)
        } else {
            self.content_type.clone()
        }
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> axum::response::Response {
        let content_type = self.full_content_type();
        let mut response = (self.status, self.content).into_response();
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            response
                .headers_mut()
                .insert(http::header::CONTENT_TYPE, value);
        }
        for (key, value) in &self.headers {
            response.headers_mut().insert(key, value.clone());
        }
        response
    }
}
