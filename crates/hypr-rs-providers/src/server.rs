//! The application and its HTTP server integration.
//!
//! [`HyprAppBuilder`] collects providers, propagation bindings, serializers and
//! settings. [`HyprApp`] answers requests: it negotiates the response
//! mimetype, runs the dispatch protocol and serializes the reply. It can be
//! turned into an Axum router or served directly.
//!
//! # Examples
//!
//! ```no_run
//! use async_trait::async_trait;
//! use hypr_rs_core::HyprResult;
//! use hypr_rs_http::{HttpRequest, PathArgs};
//! use hypr_rs_providers::provider::{Provider, Reply};
//! use hypr_rs_providers::server::HyprApp;
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Provider for Hello {
//!     async fn get(&self, _request: &HttpRequest, _args: &PathArgs) -> HyprResult<Reply> {
//!         Ok(Reply::data("Hello!"))
//!     }
//! }
//!
//! # async fn example() -> HyprResult<()> {
//! let app = HyprApp::builder().add_provider(Hello, &["/"])?.build()?;
//! app.run("127.0.0.1:5000").await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::response::IntoResponse;
use axum::routing::any;
use tracing::Instrument;

use hypr_rs_core::logging::request_span;
use hypr_rs_core::{HyprError, HyprResult, Settings};
use hypr_rs_http::negotiation::{Serializer, SerializerRegistry};
use hypr_rs_http::urls::converters::ConverterRegistry;
use hypr_rs_http::urls::router::{Router, PROPAGATION_PREFIX};
use hypr_rs_http::{HttpRequest, HttpResponse, PathArgs};

use crate::checkpoint::CheckpointTable;
use crate::dispatch::Dispatcher;
use crate::propagation::{PropagationBinding, PropagationTable};
use crate::provider::{Provider, Reply};

/// How a provider is registered by [`HyprAppBuilder::add_provider_with`].
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    /// The endpoint name. Defaults to [`Provider::name`].
    pub endpoint: Option<String>,
    /// The accepted methods. Defaults to [`Provider::methods`].
    pub methods: Option<Vec<String>>,
    /// Whether the provider may forward requests to other providers.
    pub propagation: bool,
}

impl ProviderOptions {
    /// Options for a propagating provider with default endpoint and methods.
    pub fn propagating() -> Self {
        Self {
            propagation: true,
            ..Self::default()
        }
    }
}

/// Collects the configuration of a [`HyprApp`].
pub struct HyprAppBuilder {
    settings: Settings,
    router: Router<dyn Provider>,
    propagation: PropagationTable,
    checkpoints: HashMap<String, CheckpointTable>,
    serializers: SerializerRegistry,
}

impl HyprAppBuilder {
    /// Creates a builder with default settings, the built-in converters and
    /// the built-in serializers.
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            router: Router::new(),
            propagation: PropagationTable::new(),
            checkpoints: HashMap::new(),
            serializers: SerializerRegistry::new(),
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the converter registry.
    ///
    /// # Errors
    ///
    /// Returns [`HyprError::ImproperlyConfigured`] once a provider has been
    /// registered, since its rules were compiled with the previous converters.
    pub fn converters(mut self, converters: ConverterRegistry) -> HyprResult<Self> {
        if !self.router.is_empty() {
            return Err(HyprError::ImproperlyConfigured(
                "converters must be set before any provider is added".to_string(),
            ));
        }
        self.router = Router::with_converters(converters);
        Ok(self)
    }

    /// Registers a serializer for `mimetype`.
    #[must_use]
    pub fn serializer(mut self, mimetype: impl Into<String>, serializer: Serializer) -> Self {
        self.serializers.register(mimetype, serializer);
        self
    }

    /// Registers `provider` under its default endpoint and methods.
    ///
    /// # Errors
    ///
    /// Any registration error of [`Router::add_provider`].
    pub fn add_provider(self, provider: impl Provider + 'static, urls: &[&str]) -> HyprResult<Self> {
        self.add_provider_with(provider, urls, ProviderOptions::default())
    }

    /// Registers `provider` with explicit options.
    ///
    /// # Errors
    ///
    /// Any registration error of [`Router::add_provider`].
    pub fn add_provider_with(
        mut self,
        provider: impl Provider + 'static,
        urls: &[&str],
        options: ProviderOptions,
    ) -> HyprResult<Self> {
        let endpoint = options.endpoint.unwrap_or_else(|| provider.name());
        let explicit: Option<Vec<&str>> = options
            .methods
            .as_ref()
            .map(|m| m.iter().map(String::as_str).collect());
        let methods: Option<&[&str]> = explicit.as_deref().or_else(|| provider.methods());
        let checkpoints = provider.checkpoints();

        self.router.add_provider(
            Arc::new(provider),
            urls,
            methods,
            &endpoint,
            options.propagation,
        )?;
        if !checkpoints.is_empty() {
            self.checkpoints.insert(endpoint, checkpoints);
        }
        Ok(self)
    }

    /// Lets a propagating provider forward requests to another provider.
    #[must_use]
    pub fn propagate(mut self, binding: PropagationBinding) -> Self {
        self.propagation.add(binding);
        self
    }

    /// Validates the propagation bindings and builds the application.
    ///
    /// # Errors
    ///
    /// Returns [`HyprError::UnresolvedPropagation`] if a binding names an
    /// unknown endpoint or a source registered without propagation.
    pub fn build(self) -> HyprResult<HyprApp> {
        for binding in self.propagation.iter() {
            let unresolved = || HyprError::UnresolvedPropagation {
                source_endpoint: binding.source().to_string(),
                target: binding.target().to_string(),
            };
            let propagating = format!("{PROPAGATION_PREFIX}{}", binding.source());
            if self.router.get_provider(binding.source()).is_none()
                || self.router.get_provider(&propagating).is_none()
                || self.router.get_provider(binding.target()).is_none()
            {
                return Err(unresolved());
            }
        }

        tracing::debug!(
            rules = self.router.len(),
            bindings = self.propagation.iter().count(),
            "application built"
        );
        Ok(HyprApp {
            settings: self.settings,
            router: self.router,
            propagation: self.propagation,
            checkpoints: self.checkpoints,
            serializers: self.serializers,
        })
    }
}

impl Default for HyprAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HyprAppBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyprAppBuilder")
            .field("router", &self.router)
            .field("propagation", &self.propagation)
            .field("serializers", &self.serializers)
            .finish_non_exhaustive()
    }
}

/// A built application. Immutable and shareable across requests.
pub struct HyprApp {
    settings: Settings,
    router: Router<dyn Provider>,
    propagation: PropagationTable,
    checkpoints: HashMap<String, CheckpointTable>,
    serializers: SerializerRegistry,
}

impl HyprApp {
    /// Creates a builder.
    pub fn builder() -> HyprAppBuilder {
        HyprAppBuilder::new()
    }

    /// Returns the settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the router.
    pub const fn router(&self) -> &Router<dyn Provider> {
        &self.router
    }

    /// Builds the URL of `endpoint`.
    ///
    /// # Errors
    ///
    /// See [`Router::url_for`].
    pub fn url_for(&self, endpoint: &str, args: &PathArgs) -> HyprResult<String> {
        self.router.url_for(endpoint, args)
    }

    fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(
            &self.router,
            &self.propagation,
            &self.checkpoints,
            self.settings.max_propagation_depth,
        )
    }

    /// Answers one request. Errors are turned into responses.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let span = request_span(request.method().as_str(), request.path());
        async {
            match self.respond(&request).await {
                Ok(response) => response,
                Err(e) => {
                    if e.is_routing_failure() {
                        tracing::debug!(error = %e, "routing failed");
                    } else if matches!(e, HyprError::DispatchAbort { .. }) {
                        tracing::info!(error = %e, "dispatch aborted");
                    } else {
                        tracing::warn!(error = %e, "request failed");
                    }
                    HttpResponse::from_error(&e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn respond(&self, request: &HttpRequest) -> HyprResult<HttpResponse> {
        let dispatcher = self.dispatcher();
        let chain = dispatcher.resolve_chain(request.path(), request.method().as_str())?;

        let accept = request.accept_or(&self.settings.default_mimetype);
        let (mimetype, serializer) = self
            .serializers
            .negotiate(accept)
            .ok_or_else(|| HyprError::NotAcceptable(accept.to_string()))?;

        match dispatcher.run(&chain, request).await? {
            Reply::Response(response) => Ok(response),
            Reply::Data {
                value,
                status,
                headers,
            } => {
                let body = serializer(&value, request)?;
                let mut response = HttpResponse::with_content_type(status, body, mimetype);
                response.headers_mut().extend(headers);
                Ok(response)
            }
        }
    }

    /// Converts the application into an Axum router handling every path.
    pub fn into_axum_router(self) -> axum::Router {
        let app = Arc::new(self);

        let handler = move |req: Request<Body>| {
            let app = Arc::clone(&app);
            async move {
                let (parts, body) = req.into_parts();
                let body_bytes = axum::body::to_bytes(body, usize::MAX)
                    .await
                    .unwrap_or_default()
                    .to_vec();
                let request = HttpRequest::from_axum(parts, body_bytes);
                app.handle(request).await.into_response()
            }
        };

        axum::Router::new()
            .route("/{*path}", any(handler.clone()))
            .route("/", any(handler))
    }

    /// Serves the application on `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the server fails.
    pub async fn run(self, addr: &str) -> HyprResult<()> {
        let debug = self.settings.debug;
        let router = self.into_axum_router();
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            HyprError::ImproperlyConfigured(format!("Failed to bind to {addr}: {e}"))
        })?;

        if debug {
            tracing::info!("Starting development server at http://{addr}/");
        }

        axum::serve(listener, router)
            .await
            .map_err(|e| HyprError::InternalServerError(format!("Server error: {e}")))?;

        Ok(())
    }

    /// Serves the application on the configured bind address.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn serve(self) -> HyprResult<()> {
        let addr = self.settings.bind_address.clone();
        self.run(&addr).await
    }
}

impl std::fmt::Debug for HyprApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyprApp")
            .field("rules", &self.router.len())
            .field("endpoints", &self.router.endpoints())
            .field("serializers", &self.serializers)
            .field("debug", &self.settings.debug)
            .finish_non_exhaustive()
    }
}
