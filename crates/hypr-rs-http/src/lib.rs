//! # hypr-rs-http
//!
//! HTTP layer for hypr-rs. Provides the Request and Response types, content
//! negotiation, and the URL rule compiler and router under [`urls`].

pub mod negotiation;
pub mod request;
pub mod response;
pub mod urls;

pub use negotiation::{choose_media_type, SerializerRegistry};
pub use request::{HttpRequest, HttpRequestBuilder};
pub use response::HttpResponse;
pub use urls::router::{MatchResult, Router};
pub use urls::{PathArgs, PathValue};
