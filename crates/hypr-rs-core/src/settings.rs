//! Settings for hypr-rs applications.
//!
//! [`Settings`] holds the handful of knobs the router and its application
//! layer read at startup. Settings are passed explicitly to the application
//! builder; there is no global settings instance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The complete set of application settings.
///
/// # Examples
///
/// ```
/// use hypr_rs_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.default_mimetype, "application/json");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled.
    pub debug: bool,
    /// The address the HTTP server binds to.
    pub bind_address: String,

    // ── Routing ──────────────────────────────────────────────────────

    /// The mimetype used when a request carries no `Accept` header.
    pub default_mimetype: String,
    /// The maximum number of providers a single request may traverse.
    pub max_propagation_depth: usize,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log filter (e.g. "info", "debug", "hypr_rs_http=trace").
    pub log_level: String,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            bind_address: "127.0.0.1:5000".to_string(),
            default_mimetype: "application/json".to_string(),
            max_propagation_depth: 16,
            log_level: "info".to_string(),
            extra: HashMap::new(),
        }
    }
}
