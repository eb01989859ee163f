//! # hypr-rs
//!
//! A URL rule compiler and request router with checkpoint-based propagation.
//!
//! This is the meta-crate that re-exports all sub-crates for convenient access.
//! You can depend on `hypr-rs` to get everything, or depend on individual
//! crates for finer-grained control.
//!
//! # Examples
//!
//! ```
//! use hypr_rs::prelude::*;
//!
//! struct Users;
//!
//! #[async_trait]
//! impl Provider for Users {
//!     fn methods(&self) -> Option<&'static [&'static str]> {
//!         Some(&["GET"])
//!     }
//!
//!     async fn get(&self, _request: &HttpRequest, args: &PathArgs) -> HyprResult<Reply> {
//!         Ok(Reply::data(hypr_rs::serde_json::json!({ "id": args.get("id") })))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> HyprResult<()> {
//! let app = HyprApp::builder()
//!     .add_provider(Users, &["/users/<int:id>"])?
//!     .build()?;
//!
//! let response = app
//!     .handle(HttpRequest::builder().path("/users/42").build())
//!     .await;
//! assert_eq!(response.text(), r#"{"id":42}"#);
//! # Ok(())
//! # }
//! ```

/// Errors, settings, settings loading and logging.
pub use hypr_rs_core as core;

/// Requests, responses, content negotiation and the rule router.
#[cfg(feature = "http")]
pub use hypr_rs_http as http;

/// Providers, checkpoints, propagation and the application server.
#[cfg(feature = "providers")]
pub use hypr_rs_providers as providers;

/// Third-party crates the public API is built on.
pub use async_trait::async_trait;
pub use axum;
pub use serde_json;
pub use tokio;
pub use tracing;

/// The types most applications need.
pub mod prelude {
    pub use async_trait::async_trait;
    pub use hypr_rs_core::{HyprError, HyprResult, Settings};

    #[cfg(feature = "http")]
    pub use hypr_rs_http::{HttpRequest, HttpResponse, PathArgs, PathValue};

    #[cfg(feature = "providers")]
    pub use hypr_rs_providers::{
        CheckpointDescriptor, CheckpointTable, HyprApp, PropagationBinding, Provider,
        ProviderOptions, Reply, Scope,
    };
}
