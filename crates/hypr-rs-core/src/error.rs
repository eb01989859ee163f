//! Core error types for hypr-rs.
//!
//! [`HyprError`] covers the four failure families of the router:
//!
//! - configuration errors, raised while rules and providers are registered,
//! - routing failures, raised per request by the router,
//! - conversion failures, absorbed by rule matching,
//! - dispatch aborts, raised by checkpoints.

use thiserror::Error;

/// The primary error type for hypr-rs.
///
/// Each variant maps to an HTTP status code via [`HyprError::status_code`].
#[derive(Error, Debug)]
pub enum HyprError {
    // ── Configuration ────────────────────────────────────────────────

    /// An endpoint name was registered twice on the same router.
    #[error("endpoint {0} is already in use")]
    DuplicateEndpoint(String),

    /// A rule references a converter that is not registered.
    #[error("the converter {0} does not exist")]
    UnknownConverter(String),

    /// A variable name appears more than once in a single rule.
    #[error("variable name {variable:?} used twice in rule {rule:?}")]
    DuplicateVariable {
        /// The offending rule string.
        rule: String,
        /// The repeated variable name.
        variable: String,
    },

    /// A rule contains a stray `<` or `>`.
    #[error("malformed url rule: {0:?}")]
    MalformedRule(String),

    /// A rule is syntactically valid but cannot be registered.
    #[error("invalid url rule: {0}")]
    InvalidRule(String),

    /// A converter rejected its arguments.
    #[error("invalid arguments for converter {converter}: {reason}")]
    InvalidConverterArgs {
        /// The converter name.
        converter: String,
        /// Why the arguments were rejected.
        reason: String,
    },

    /// A propagation binding names an endpoint that is not registered.
    #[error("cannot propagate from {source_endpoint} to unknown endpoint {target}")]
    UnresolvedPropagation {
        /// The forwarding endpoint.
        source_endpoint: String,
        /// The endpoint that could not be found.
        target: String,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The application is improperly configured.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Routing ──────────────────────────────────────────────────────

    /// HTTP 404: no rule matched the path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP 405: some rule matched the path, none matched the method.
    #[error("Method {method} not allowed, allowed: {}", allowed.join(", "))]
    MethodNotAllowed {
        /// The request method.
        method: String,
        /// Union of the methods of every rule that matched the path, sorted.
        allowed: Vec<String>,
    },

    /// HTTP 307: a non-leaf rule matched a path missing its trailing slash.
    #[error("Temporary redirect to {0}")]
    TemporaryRedirect(String),

    /// HTTP 406: no serializer is available for the requested media types.
    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    // ── Conversion ───────────────────────────────────────────────────

    /// A converter could not turn a captured segment into a native value.
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    // ── Dispatch ─────────────────────────────────────────────────────

    /// A checkpoint stopped the dispatch chain.
    #[error("Dispatch aborted ({status}): {reason}")]
    DispatchAbort {
        /// The HTTP status to answer with.
        status: u16,
        /// A human-readable reason.
        reason: String,
    },

    /// HTTP 400 Bad Request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP 500 Internal Server Error.
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    /// An error occurred during serialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl HyprError {
    /// Creates a [`HyprError::DispatchAbort`] with the given status and reason.
    pub fn abort(status: u16, reason: impl Into<String>) -> Self {
        Self::DispatchAbort {
            status,
            reason: reason.into(),
        }
    }

    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest`, `ConversionFailed` -> 400
    /// - `NotFound` -> 404
    /// - `MethodNotAllowed` -> 405
    /// - `NotAcceptable` -> 406
    /// - `TemporaryRedirect` -> 307
    /// - `DispatchAbort` -> its own status
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::ConversionFailed(_) => 400,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed { .. } => 405,
            Self::NotAcceptable(_) => 406,
            Self::TemporaryRedirect(_) => 307,
            Self::DispatchAbort { status, .. } => *status,
            Self::DuplicateEndpoint(_)
            | Self::UnknownConverter(_)
            | Self::DuplicateVariable { .. }
            | Self::MalformedRule(_)
            | Self::InvalidRule(_)
            | Self::InvalidConverterArgs { .. }
            | Self::UnresolvedPropagation { .. }
            | Self::ConfigurationError(_)
            | Self::ImproperlyConfigured(_)
            | Self::InternalServerError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }

    /// Returns `true` for errors that can only happen while the router is set up.
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateEndpoint(_)
                | Self::UnknownConverter(_)
                | Self::DuplicateVariable { .. }
                | Self::MalformedRule(_)
                | Self::InvalidRule(_)
                | Self::InvalidConverterArgs { .. }
                | Self::UnresolvedPropagation { .. }
                | Self::ConfigurationError(_)
                | Self::ImproperlyConfigured(_)
        )
    }

    /// Returns `true` for the per-request failures produced by route resolution.
    pub const fn is_routing_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::MethodNotAllowed { .. }
                | Self::TemporaryRedirect(_)
                | Self::NotAcceptable(_)
        )
    }
}

/// A convenience type alias for `Result<T, HyprError>`.
pub type HyprResult<T> = Result<T, HyprError>;
