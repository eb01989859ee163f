//! The [`Provider`] trait and the [`Reply`] providers return.
//!
//! A provider is the handler bound to an endpoint. One instance is shared by
//! every request routed to it, so its methods take `&self` and any mutable
//! state must be synchronized by the provider itself.

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, StatusCode};

use hypr_rs_core::{HyprError, HyprResult};
use hypr_rs_http::{HttpRequest, HttpResponse, PathArgs};

use crate::checkpoint::CheckpointTable;

/// What a provider method produces.
#[derive(Debug)]
pub enum Reply {
    /// Data serialized with the negotiated mimetype.
    Data {
        /// The payload.
        value: serde_json::Value,
        /// The response status.
        status: StatusCode,
        /// Extra response headers.
        headers: HeaderMap,
    },
    /// A complete response, sent as is.
    Response(HttpResponse),
}

impl Reply {
    /// Creates a 200 OK data reply.
    pub fn data(value: impl Into<serde_json::Value>) -> Self {
        Self::Data {
            value: value.into(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    /// Sets the status of a data reply. A full response is left untouched.
    #[must_use]
    pub fn with_status(mut self, new_status: StatusCode) -> Self {
        if let Self::Data { status, .. } = &mut self {
            *status = new_status;
        }
        self
    }

    /// Adds a header to the reply. Invalid values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: http::header::HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            match &mut self {
                Self::Data { headers, .. } => {
                    headers.insert(name, value);
                }
                Self::Response(response) => {
                    response.headers_mut().insert(name, value);
                }
            }
        }
        self
    }
}

impl From<HttpResponse> for Reply {
    fn from(response: HttpResponse) -> Self {
        Self::Response(response)
    }
}

impl From<serde_json::Value> for Reply {
    fn from(value: serde_json::Value) -> Self {
        Self::data(value)
    }
}

fn method_not_allowed<P: Provider + ?Sized>(provider: &P, request: &HttpRequest) -> HyprError {
    HyprError::MethodNotAllowed {
        method: request.method().to_string(),
        allowed: provider
            .methods()
            .map(|m| m.iter().map(|s| (*s).to_string()).collect())
            .unwrap_or_default(),
    }
}

/// A handler bound to an endpoint.
///
/// Override the methods named after the HTTP verbs you serve; the others
/// fail with [`HyprError::MethodNotAllowed`]. `head` falls back to `get`.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use hypr_rs_core::HyprResult;
/// use hypr_rs_http::{HttpRequest, PathArgs};
/// use hypr_rs_providers::provider::{Provider, Reply};
///
/// struct Users;
///
/// #[async_trait]
/// impl Provider for Users {
///     fn methods(&self) -> Option<&'static [&'static str]> {
///         Some(&["GET"])
///     }
///
///     async fn get(&self, _request: &HttpRequest, args: &PathArgs) -> HyprResult<Reply> {
///         Ok(Reply::data(serde_json::json!({ "id": args.get("id").map(ToString::to_string) })))
///     }
/// }
///
/// assert_eq!(Users.name(), "Users");
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// The default endpoint name: the type name without its module path.
    fn name(&self) -> String {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base).to_string()
    }

    /// The methods this provider serves when registered without explicit
    /// methods. `None` accepts any method.
    fn methods(&self) -> Option<&'static [&'static str]> {
        None
    }

    /// The checkpoints of this provider, read once when the application is built.
    fn checkpoints(&self) -> CheckpointTable {
        CheckpointTable::new()
    }

    /// Handles GET requests.
    async fn get(&self, request: &HttpRequest, _args: &PathArgs) -> HyprResult<Reply> {
        Err(method_not_allowed(self, request))
    }

    /// Handles POST requests.
    async fn post(&self, request: &HttpRequest, _args: &PathArgs) -> HyprResult<Reply> {
        Err(method_not_allowed(self, request))
    }

    /// Handles PUT requests.
    async fn put(&self, request: &HttpRequest, _args: &PathArgs) -> HyprResult<Reply> {
        Err(method_not_allowed(self, request))
    }

    /// Handles PATCH requests.
    async fn patch(&self, request: &HttpRequest, _args: &PathArgs) -> HyprResult<Reply> {
        Err(method_not_allowed(self, request))
    }

    /// Handles DELETE requests.
    async fn delete(&self, request: &HttpRequest, _args: &PathArgs) -> HyprResult<Reply> {
        Err(method_not_allowed(self, request))
    }

    /// Handles HEAD requests. Delegates to `get` by default.
    async fn head(&self, request: &HttpRequest, args: &PathArgs) -> HyprResult<Reply> {
        self.get(request, args).await
    }

    /// Handles OPTIONS requests.
    async fn options(&self, request: &HttpRequest, _args: &PathArgs) -> HyprResult<Reply> {
        Err(method_not_allowed(self, request))
    }

    /// Calls the method named after the request's HTTP verb.
    async fn dispatch(&self, request: &HttpRequest, args: &PathArgs) -> HyprResult<Reply> {
        match *request.method() {
            http::Method::GET => self.get(request, args).await,
            http::Method::POST => self.post(request, args).await,
            http::Method::PUT => self.put(request, args).await,
            http::Method::PATCH => self.patch(request, args).await,
            http::Method::DELETE => self.delete(request, args).await,
            http::Method::HEAD => self.head(request, args).await,
            http::Method::OPTIONS => self.options(request, args).await,
            _ => Err(method_not_allowed(self, request)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypr_rs_http::PathValue;

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        fn methods(&self) -> Option<&'static [&'static str]> {
            Some(&["GET", "POST"])
        }

        async fn get(&self, _request: &HttpRequest, args: &PathArgs) -> HyprResult<Reply> {
            Ok(Reply::data(serde_json::to_value(args).unwrap_or_default()))
        }

        async fn post(&self, _request: &HttpRequest, _args: &PathArgs) -> HyprResult<Reply> {
            Ok(HttpResponse::ok("created").into())
        }
    }

    fn request(method: http::Method) -> HttpRequest {
        HttpRequest::builder().method(method).build()
    }

    #[tokio::test]
    async fn test_dispatch_by_method() {
        let mut args = PathArgs::new();
        args.insert("id".into(), PathValue::Int(3));

        match Echo.dispatch(&request(http::Method::GET), &args).await.unwrap() {
            Reply::Data { value, status, .. } => {
                assert_eq!(value, serde_json::json!({"id": 3}));
                assert_eq!(status, StatusCode::OK);
            }
            Reply::Response(_) => panic!("expected data"),
        }

        let reply = Echo.dispatch(&request(http::Method::POST), &args).await.unwrap();
        assert!(matches!(reply, Reply::Response(r) if r.text() == "created"));
    }

    #[tokio::test]
    async fn test_head_falls_back_to_get() {
        let reply = Echo
            .dispatch(&request(http::Method::HEAD), &PathArgs::new())
            .await
            .unwrap();
        assert!(matches!(reply, Reply::Data { .. }));
    }

    #[tokio::test]
    async fn test_unimplemented_method_is_not_allowed() {
        let err = Echo
            .dispatch(&request(http::Method::DELETE), &PathArgs::new())
            .await
            .unwrap_err();
        match err {
            HyprError::MethodNotAllowed { method, allowed } => {
                assert_eq!(method, "DELETE");
                assert_eq!(allowed, vec!["GET".to_string(), "POST".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_name_strips_module_path() {
        assert_eq!(Echo.name(), "Echo");
    }

    #[test]
    fn test_reply_builders() {
        let reply = Reply::data(serde_json::json!([1]))
            .with_status(StatusCode::CREATED)
            .with_header(http::header::LOCATION, "/items/1");
        match reply {
            Reply::Data { status, headers, .. } => {
                assert_eq!(status, StatusCode::CREATED);
                assert_eq!(headers.get(http::header::LOCATION).unwrap(), "/items/1");
            }
            Reply::Response(_) => panic!("expected data"),
        }

        let reply = Reply::from(HttpResponse::ok("x")).with_status(StatusCode::ACCEPTED);
        assert!(matches!(reply, Reply::Response(r) if r.status() == StatusCode::OK));
    }
}
