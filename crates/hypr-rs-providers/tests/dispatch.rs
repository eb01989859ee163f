//! Integration tests for the dispatch protocol and the application.
//!
//! Tests cover:
//! 1. Single provider dispatch
//! 2. Propagation chains and merged variables
//! 3. Checkpoint order, positions and subjects
//! 4. Checkpoint aborts
//! 5. Binding restrictions and depth limit
//! 6. Redirects inside a chain
//! 7. Content negotiation
//! 8. Axum integration

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use http::{Request, StatusCode};
use tower::ServiceExt;

use hypr_rs_core::{HyprError, HyprResult, Settings};
use hypr_rs_http::{HttpRequest, HttpResponse, PathArgs};
use hypr_rs_providers::{
    CheckpointContext, CheckpointDescriptor, CheckpointTable, HyprApp, PropagationBinding,
    Provider, ProviderOptions, Reply, Scope,
};

type Log = Arc<Mutex<Vec<String>>>;

fn tracer(
    log: &Log,
) -> impl Fn(&CheckpointContext<'_>) -> HyprResult<Option<HttpResponse>> + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |ctx: &CheckpointContext<'_>| {
        log.lock().unwrap().push(format!(
            "{}:{}:{}",
            ctx.endpoint,
            ctx.position,
            ctx.subject.unwrap_or("-")
        ));
        Ok(None)
    }
}

struct Users {
    log: Log,
}

#[async_trait]
impl Provider for Users {
    fn methods(&self) -> Option<&'static [&'static str]> {
        Some(&["GET", "POST"])
    }

    fn checkpoints(&self) -> CheckpointTable {
        CheckpointTable::new()
            .with(
                CheckpointDescriptor::from_fn("auth", Scope::IS_ENTRY, |ctx| {
                    if ctx.request.header("x-token").is_some() {
                        Ok(None)
                    } else {
                        Err(HyprError::abort(401, "missing token"))
                    }
                })
                .with_priority(-10),
            )
            .with(
                CheckpointDescriptor::from_fn("read_only", Scope::ALWAYS, |_| {
                    Ok(Some(HttpResponse::forbidden("read only")))
                })
                .with_methods(&["POST"]),
            )
            .checkpoint("trace", Scope::ALWAYS, tracer(&self.log))
    }

    async fn get(&self, _request: &HttpRequest, args: &PathArgs) -> HyprResult<Reply> {
        Ok(Reply::data(serde_json::json!({ "provider": "users", "args": args })))
    }

    async fn post(&self, _request: &HttpRequest, _args: &PathArgs) -> HyprResult<Reply> {
        self.log.lock().unwrap().push("users:post".into());
        Ok(Reply::data(serde_json::Value::Null))
    }
}

struct Posts {
    log: Log,
}

#[async_trait]
impl Provider for Posts {
    fn checkpoints(&self) -> CheckpointTable {
        CheckpointTable::new().checkpoint("trace", Scope::ALWAYS, tracer(&self.log))
    }

    async fn get(&self, _request: &HttpRequest, args: &PathArgs) -> HyprResult<Reply> {
        Ok(Reply::data(serde_json::json!({ "provider": "posts", "args": args })))
    }
}

struct Comments {
    log: Log,
}

#[async_trait]
impl Provider for Comments {
    fn checkpoints(&self) -> CheckpointTable {
        let log = Arc::clone(&self.log);
        CheckpointTable::new()
            .with(
                CheckpointDescriptor::from_fn("from_posts", Scope::DESTINATION, move |_| {
                    log.lock().unwrap().push("Comments<-Posts".into());
                    Ok(None)
                })
                .with_subject("Posts"),
            )
            .checkpoint("trace", Scope::ALWAYS, tracer(&self.log))
    }

    async fn get(&self, _request: &HttpRequest, args: &PathArgs) -> HyprResult<Reply> {
        Ok(Reply::data(serde_json::json!({ "provider": "comments", "args": args }))
            .with_header(http::header::HeaderName::from_static("x-provider"), "comments"))
    }

    async fn post(&self, _request: &HttpRequest, _args: &PathArgs) -> HyprResult<Reply> {
        Ok(Reply::data(serde_json::Value::Null).with_status(StatusCode::CREATED))
    }
}

fn app_with(settings: Settings, log: &Log) -> HyprApp {
    HyprApp::builder()
        .settings(settings)
        .add_provider_with(
            Users {
                log: Arc::clone(log),
            },
            &["/users/<int:user_id>"],
            ProviderOptions::propagating(),
        )
        .unwrap()
        .add_provider_with(
            Posts {
                log: Arc::clone(log),
            },
            &["/posts/<int:id>"],
            ProviderOptions::propagating(),
        )
        .unwrap()
        .add_provider(
            Comments {
                log: Arc::clone(log),
            },
            &["/comments/", "/comments/<int:id>"],
        )
        .unwrap()
        .propagate(PropagationBinding::new("Users", "Posts", "posts"))
        .propagate(PropagationBinding::new("Posts", "Comments", "comments").with_methods(&["GET"]))
        .build()
        .unwrap()
}

fn app(log: &Log) -> HyprApp {
    app_with(Settings::default(), log)
}

fn get(path: &str) -> HttpRequest {
    HttpRequest::builder().path(path).header("x-token", "t").build()
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn json_body(response: &HttpResponse) -> serde_json::Value {
    serde_json::from_slice(response.content()).unwrap()
}

// ============================================================================
// 1. Single provider dispatch
// ============================================================================

#[tokio::test]
async fn test_single_provider() {
    let log = Log::default();
    let response = app(&log).handle(get("/users/1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(&response);
    assert_eq!(body["provider"], "users");
    assert_eq!(body["args"], serde_json::json!({ "user_id": 1 }));
    assert_eq!(entries(&log), ["Users:single:-"]);
}

#[tokio::test]
async fn test_propagation_target_is_reachable_directly() {
    let log = Log::default();
    let response = app(&log).handle(get("/comments/3")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-provider").unwrap(), "comments");
    assert_eq!(entries(&log), ["Comments:single:-"]);
}

// ============================================================================
// 2. Propagation chains
// ============================================================================

#[tokio::test]
async fn test_two_hop_chain() {
    let log = Log::default();
    let response = app(&log).handle(get("/users/1/posts/2")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(&response);
    assert_eq!(body["provider"], "posts");
    assert_eq!(body["args"], serde_json::json!({ "user_id": 1, "id": 2 }));
}

#[tokio::test]
async fn test_three_hop_chain_inner_variables_win() {
    let log = Log::default();
    let response = app(&log).handle(get("/users/1/posts/2/comments/3")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(&response);
    assert_eq!(body["provider"], "comments");
    assert_eq!(body["args"], serde_json::json!({ "user_id": 1, "id": 3 }));
}

#[tokio::test]
async fn test_unbound_target_is_not_found() {
    let log = Log::default();
    let response = app(&log).handle(get("/users/1/comments/3")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_binding_sub_path_must_match() {
    let log = Log::default();
    let app = HyprApp::builder()
        .add_provider_with(
            Users {
                log: Arc::clone(&log),
            },
            &["/users/<int:user_id>"],
            ProviderOptions::propagating(),
        )
        .unwrap()
        .add_provider(
            Posts {
                log: Arc::clone(&log),
            },
            &["/posts/<int:id>"],
        )
        .unwrap()
        .propagate(PropagationBinding::new("Users", "Posts", "articles"))
        .build()
        .unwrap();

    let response = app.handle(get("/users/1/posts/2")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// 3. Checkpoint order, positions and subjects
// ============================================================================

#[tokio::test]
async fn test_checkpoints_fire_in_chain_order() {
    let log = Log::default();
    app(&log).handle(get("/users/1/posts/2/comments/3")).await;

    assert_eq!(
        entries(&log),
        [
            "Users:source:Posts",
            "Posts:link:Comments",
            "Comments<-Posts",
            "Comments:destination:Posts",
        ]
    );
}

#[tokio::test]
async fn test_destination_subject_is_previous_hop() {
    let log = Log::default();
    app(&log).handle(get("/users/1/posts/2")).await;

    assert_eq!(entries(&log), ["Users:source:Posts", "Posts:destination:Users"]);
}

// ============================================================================
// 4. Checkpoint aborts
// ============================================================================

#[tokio::test]
async fn test_checkpoint_error_aborts_chain() {
    let log = Log::default();
    let request = HttpRequest::builder().path("/users/1/posts/2").build();
    let response = app(&log).handle(request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.text().contains("missing token"));
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_checkpoint_response_skips_handler() {
    let log = Log::default();
    let request = HttpRequest::builder()
        .method(http::Method::POST)
        .path("/users/1")
        .header("x-token", "t")
        .build();
    let response = app(&log).handle(request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.text(), "read only");
    assert!(!entries(&log).contains(&"users:post".to_string()));
}

// ============================================================================
// 5. Binding restrictions and depth limit
// ============================================================================

#[tokio::test]
async fn test_binding_methods_restrict_hop() {
    let log = Log::default();
    let request = HttpRequest::builder()
        .method(http::Method::POST)
        .path("/users/1/posts/2/comments/3")
        .header("x-token", "t")
        .build();
    let response = app(&log).handle(request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get(http::header::ALLOW).unwrap(), "GET");
}

#[tokio::test]
async fn test_depth_limit() {
    let log = Log::default();
    let settings = Settings {
        max_propagation_depth: 2,
        ..Settings::default()
    };
    let app = app_with(settings, &log);

    assert_eq!(app.handle(get("/users/1/posts/2")).await.status(), StatusCode::OK);
    assert_eq!(
        app.handle(get("/users/1/posts/2/comments/3")).await.status(),
        StatusCode::BAD_REQUEST
    );
}

// ============================================================================
// 6. Redirects
// ============================================================================

#[tokio::test]
async fn test_top_level_redirect() {
    let log = Log::default();
    let response = app(&log).handle(get("/comments")).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(http::header::LOCATION).unwrap(),
        "/comments/"
    );
}

#[tokio::test]
async fn test_redirect_inside_chain_keeps_full_path() {
    let log = Log::default();
    let response = app(&log).handle(get("/users/1/posts/2/comments")).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(http::header::LOCATION).unwrap(),
        "/users/1/posts/2/comments/"
    );
}

// ============================================================================
// 7. Content negotiation
// ============================================================================

#[tokio::test]
async fn test_not_acceptable() {
    let log = Log::default();
    let request = HttpRequest::builder()
        .path("/users/1")
        .header("x-token", "t")
        .header("accept", "image/png")
        .build();
    let response = app(&log).handle(request).await;

    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_custom_serializer() {
    let app = HyprApp::builder()
        .serializer(
            "text/csv",
            Arc::new(|data: &serde_json::Value, _: &HttpRequest| {
                let row: Vec<String> = data
                    .as_object()
                    .map(|o| o.values().map(ToString::to_string).collect())
                    .unwrap_or_default();
                Ok::<_, HyprError>(row.join(","))
            }),
        )
        .add_provider(
            Posts {
                log: Log::default(),
            },
            &["/posts/<int:id>"],
        )
        .unwrap()
        .build()
        .unwrap();

    let request = HttpRequest::builder()
        .path("/posts/5")
        .header("accept", "text/csv, application/json;q=0.5")
        .build();
    let response = app.handle(request).await;

    assert_eq!(response.content_type(), "text/csv");
    assert_eq!(response.text(), r#"{"id":5},"posts""#);
}

#[tokio::test]
async fn test_default_mimetype_without_accept_header() {
    let log = Log::default();
    let settings = Settings {
        default_mimetype: "text/plain".to_string(),
        ..Settings::default()
    };
    let response = app_with(settings, &log).handle(get("/comments/3")).await;

    assert_eq!(response.content_type(), "text/plain");
}

#[tokio::test]
async fn test_reply_status_is_kept() {
    let log = Log::default();
    let request = HttpRequest::builder()
        .method(http::Method::POST)
        .path("/comments/3")
        .build();
    let response = app(&log).handle(request).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.text(), "null");
}

// ============================================================================
// 8. Axum integration
// ============================================================================

#[tokio::test]
async fn test_axum_router() {
    let log = Log::default();
    let router = app(&log).into_axum_router();

    let request = Request::builder()
        .uri("/users/7/posts/8")
        .header("x-token", "t")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "application/json; charset=utf-8"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["args"], serde_json::json!({ "user_id": 7, "id": 8 }));

    let request = Request::builder()
        .method("DELETE")
        .uri("/users/7")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.headers().get(http::header::ALLOW).unwrap(),
        "GET, POST"
    );
}
