//! Content negotiation and response serializers.
//!
//! [`choose_media_type`] picks the response mimetype from an `Accept` header;
//! [`SerializerRegistry`] maps mimetypes to the functions that turn provider
//! data into a response body.

use std::fmt;
use std::sync::Arc;

use hypr_rs_core::{HyprError, HyprResult};

use crate::request::HttpRequest;

/// One media range of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
struct MediaRange<'a> {
    main: &'a str,
    sub: &'a str,
    quality: f32,
}

impl MediaRange<'_> {
    /// Returns how specifically this range matches `mimetype`, if at all.
    fn specificity(&self, main: &str, sub: &str) -> Option<u8> {
        match (self.main, self.sub) {
            ("*", "*") => Some(0),
            (m, "*") if m.eq_ignore_ascii_case(main) => Some(1),
            (m, s) if m.eq_ignore_ascii_case(main) && s.eq_ignore_ascii_case(sub) => Some(2),
            _ => None,
        }
    }
}

fn parse_accept(accept: &str) -> Vec<MediaRange<'_>> {
    accept
        .split(',')
        .filter_map(|item| {
            let mut params = item.split(';');
            let range = params.next()?.trim();
            let (main, sub) = range.split_once('/')?;
            let quality = params
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some(MediaRange {
                main: main.trim(),
                sub: sub.trim(),
                quality,
            })
        })
        .collect()
}

/// Chooses the best of `available` for an `Accept` header.
///
/// Each available mimetype takes the quality of the most specific media range
/// matching it. The highest quality wins; ties go to the earlier entry of
/// `available`. Returns `None` when nothing acceptable is available.
///
/// # Examples
///
/// ```
/// use hypr_rs_http::choose_media_type;
///
/// let available = ["application/json", "text/plain"];
/// assert_eq!(
///     choose_media_type("text/*;q=0.9, application/json;q=0.5", &available).as_deref(),
///     Some("text/plain")
/// );
/// assert_eq!(choose_media_type("*/*", &available).as_deref(), Some("application/json"));
/// assert_eq!(choose_media_type("image/png", &available), None);
/// ```
pub fn choose_media_type(accept: &str, available: &[&str]) -> Option<String> {
    let ranges = parse_accept(accept);
    let mut best: Option<(&str, f32)> = None;

    for mimetype in available {
        let Some((main, sub)) = mimetype.split_once('/') else {
            continue;
        };
        let quality = ranges
            .iter()
            .filter_map(|range| range.specificity(main, sub).map(|s| (s, range.quality)))
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, q)| q);

        if let Some(quality) = quality.filter(|q| *q > 0.0) {
            if best.map_or(true, |(_, q)| quality > q) {
                best = Some((*mimetype, quality));
            }
        }
    }

    best.map(|(mimetype, _)| mimetype.to_string())
}

/// Serializes provider data for one mimetype.
pub type Serializer =
    Arc<dyn Fn(&serde_json::Value, &HttpRequest) -> HyprResult<String> + Send + Sync>;

/// An ordered mapping from mimetype to [`Serializer`].
///
/// Registration order is the preference order used when the client accepts
/// several mimetypes equally.
#[derive(Clone)]
pub struct SerializerRegistry {
    serializers: Vec<(String, Serializer)>,
}

fn json_serializer(data: &serde_json::Value, _request: &HttpRequest) -> HyprResult<String> {
    serde_json::to_string(data).map_err(|e| HyprError::SerializationError(e.to_string()))
}

fn text_serializer(data: &serde_json::Value, _request: &HttpRequest) -> HyprResult<String> {
    Ok(match data {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl SerializerRegistry {
    /// Creates a registry with `application/json` and `text/plain`.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("application/json", Arc::new(json_serializer));
        registry.register("text/plain", Arc::new(text_serializer));
        registry
    }

    /// Creates a registry without any serializer.
    pub const fn empty() -> Self {
        Self {
            serializers: Vec::new(),
        }
    }

    /// Registers a serializer, replacing any previous one for `mimetype`.
    pub fn register(&mut self, mimetype: impl Into<String>, serializer: Serializer) {
        let mimetype = mimetype.into();
        if let Some(entry) = self.serializers.iter_mut().find(|(m, _)| *m == mimetype) {
            entry.1 = serializer;
        } else {
            self.serializers.push((mimetype, serializer));
        }
    }

    /// Returns the serializer for `mimetype`.
    pub fn get(&self, mimetype: &str) -> Option<&Serializer> {
        self.serializers
            .iter()
            .find(|(m, _)| m == mimetype)
            .map(|(_, s)| s)
    }

    /// Returns the available mimetypes in preference order.
    pub fn mimetypes(&self) -> Vec<&str> {
        self.serializers.iter().map(|(m, _)| m.as_str()).collect()
    }

    /// Negotiates a mimetype for `accept` and returns it with its serializer.
    pub fn negotiate(&self, accept: &str) -> Option<(String, Serializer)> {
        let mimetype = choose_media_type(accept, &self.mimetypes())?;
        let serializer = Arc::clone(self.get(&mimetype)?);
        Some((mimetype, serializer))
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("mimetypes", &self.mimetypes())
            .finish()
    }
}
