//! Path converters for URL rule matching.
//!
//! This module provides the [`PathConverter`] trait, the built-in converters,
//! and the [`ConverterRegistry`] that maps converter names used in rules
//! (`<int:id>`, `<string(length=2):code>`) to converter factories.
//!
//! # Built-in converters
//!
//! | Name                | Arguments                              | Regex          | Weight | Value   |
//! |---------------------|----------------------------------------|----------------|--------|---------|
//! | `default`, `string` | `minlength=1`, `maxlength`, `length`   | `[^/]{1,}`     | 100    | `Str`   |
//! | `any`               | `*items`                               | `(?:a\|b)`     | 100    | `Str`   |
//! | `path`              |                                        | `[^/].*?`      | 200    | `Path`  |
//! | `int`               | `fixed_digits=0`, `min`, `max`         | `[0-9]+`       | 50     | `Int`   |
//! | `float`             | `min`, `max`                           | `[0-9]+\.[0-9]+` | 50  | `Float` |
//! | `uuid`              |                                        | 8-4-4-4-12 hex | 100    | `Uuid`  |
//!
//! The weight orders rules with the same structure: lighter converters are
//! tried first.
//!
//! Numeric converters accept ASCII digits only; other Unicode digits leave the
//! segment to later rules.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use hypr_rs_core::{HyprError, HyprResult};

use super::args::{ArgValue, ConverterArgs};

/// Characters escaped when a value is written back into a single path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Same as [`SEGMENT`] but slashes are kept.
const PATH: &AsciiSet = &SEGMENT.remove(b'/');

/// A typed value extracted from a URL path segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PathValue {
    /// An integer value, produced by [`IntConverter`].
    Int(i64),
    /// A float value, produced by [`FloatConverter`].
    Float(f64),
    /// A single-segment string, produced by [`StringConverter`] and [`AnyConverter`].
    Str(String),
    /// A value that may contain slashes, produced by [`PathSegmentConverter`].
    Path(String),
    /// A UUID value, produced by [`UuidConverter`].
    Uuid(uuid::Uuid),
}

impl PathValue {
    /// Returns the integer, if this is an `Int`.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text, if this is a `Str` or a `Path`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) | Self::Path(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) | Self::Path(v) => write!(f, "{v}"),
            Self::Uuid(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for PathValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PathValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PathValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PathValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<uuid::Uuid> for PathValue {
    fn from(value: uuid::Uuid) -> Self {
        Self::Uuid(value)
    }
}

/// Variables captured by a rule, keyed by variable name.
pub type PathArgs = BTreeMap<String, PathValue>;

/// Trait for converting URL path segments to typed values and back.
///
/// Implementations provide the regex fragment used inside the compiled rule,
/// a weight used to order rules, and the conversions in both directions.
/// A failing [`to_native`](PathConverter::to_native) does not produce an
/// error for the request: it only makes the rule not match.
pub trait PathConverter: Send + Sync + fmt::Debug {
    /// Returns the regex fragment that matches valid values for this converter.
    fn regex(&self) -> &str;

    /// Returns the match weight. Lower weights are tried first.
    fn weight(&self) -> i64 {
        100
    }

    /// Converts a matched string segment into a typed [`PathValue`].
    fn to_native(&self, value: &str) -> HyprResult<PathValue>;

    /// Converts a [`PathValue`] back into a URL-safe string.
    fn to_url(&self, value: &PathValue) -> HyprResult<String>;
}

fn conversion_error(converter: &str, value: &impl fmt::Display) -> HyprError {
    HyprError::ConversionFailed(format!("{converter} cannot convert {value}"))
}

fn invalid_args(converter: &str, reason: impl Into<String>) -> HyprError {
    HyprError::InvalidConverterArgs {
        converter: converter.to_string(),
        reason: reason.into(),
    }
}

/// Rejects keyword arguments outside `allowed` and surplus positional arguments.
fn check_signature(
    converter: &str,
    args: &ConverterArgs,
    allowed: &[&str],
) -> HyprResult<()> {
    if args.positional.len() > allowed.len() {
        return Err(invalid_args(
            converter,
            format!(
                "takes at most {} positional arguments, {} given",
                allowed.len(),
                args.positional.len()
            ),
        ));
    }
    if let Some(name) = args.keyword.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(invalid_args(converter, format!("unexpected argument {name:?}")));
    }
    Ok(())
}

fn usize_arg(
    converter: &str,
    args: &ConverterArgs,
    name: &str,
    position: usize,
) -> HyprResult<Option<usize>> {
    match args.get(name, position) {
        None | Some(ArgValue::Null) => Ok(None),
        Some(ArgValue::Int(v)) => usize::try_from(*v)
            .map(Some)
            .map_err(|_| invalid_args(converter, format!("{name} must not be negative"))),
        Some(other) => Err(invalid_args(
            converter,
            format!("{name} must be an integer, got {other}"),
        )),
    }
}

fn i64_arg(
    converter: &str,
    args: &ConverterArgs,
    name: &str,
    position: usize,
) -> HyprResult<Option<i64>> {
    match args.get(name, position) {
        None | Some(ArgValue::Null) => Ok(None),
        Some(ArgValue::Int(v)) => Ok(Some(*v)),
        Some(other) => Err(invalid_args(
            converter,
            format!("{name} must be an integer, got {other}"),
        )),
    }
}

fn f64_arg(
    converter: &str,
    args: &ConverterArgs,
    name: &str,
    position: usize,
) -> HyprResult<Option<f64>> {
    match args.get(name, position) {
        None | Some(ArgValue::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            invalid_args(converter, format!("{name} must be a number, got {value}"))
        }),
    }
}

/// Converter for single path segments (no slashes).
///
/// Accepts `minlength` (default 1), `maxlength`, and `length`. When `length`
/// is given it overrides the other two.
#[derive(Debug, Clone)]
pub struct StringConverter {
    regex: String,
}

impl StringConverter {
    /// Creates a string converter with explicit bounds.
    pub fn new(minlength: usize, maxlength: Option<usize>, length: Option<usize>) -> Self {
        let regex = match (length, maxlength) {
            (Some(n), _) => format!("[^/]{{{n}}}"),
            (None, Some(max)) => format!("[^/]{{{minlength},{max}}}"),
            (None, None) => format!("[^/]{{{minlength},}}"),
        };
        Self { regex }
    }

    /// Builds the converter from rule arguments.
    pub fn from_args(args: &ConverterArgs) -> HyprResult<Self> {
        const NAME: &str = "string";
        check_signature(NAME, args, &["minlength", "maxlength", "length"])?;
        let minlength = usize_arg(NAME, args, "minlength", 0)?.unwrap_or(1);
        let maxlength = usize_arg(NAME, args, "maxlength", 1)?;
        let length = usize_arg(NAME, args, "length", 2)?;
        if maxlength.is_some_and(|max| max < minlength) {
            return Err(invalid_args(NAME, "maxlength is smaller than minlength"));
        }
        Ok(Self::new(minlength, maxlength, length))
    }
}

impl Default for StringConverter {
    fn default() -> Self {
        Self::new(1, None, None)
    }
}

impl PathConverter for StringConverter {
    fn regex(&self) -> &str {
        &self.regex
    }

    fn to_native(&self, value: &str) -> HyprResult<PathValue> {
        Ok(PathValue::Str(value.to_string()))
    }

    fn to_url(&self, value: &PathValue) -> HyprResult<String> {
        match value {
            PathValue::Str(_) | PathValue::Int(_) | PathValue::Float(_) | PathValue::Uuid(_) => {
                Ok(utf8_percent_encode(&value.to_string(), SEGMENT).to_string())
            }
            PathValue::Path(_) => Err(conversion_error("string", value)),
        }
    }
}

/// Converter matching one of a fixed set of words: `<any(about, help):page>`.
#[derive(Debug, Clone)]
pub struct AnyConverter {
    items: Vec<String>,
    regex: String,
}

impl AnyConverter {
    /// Creates the converter for the given items.
    pub fn new(items: Vec<String>) -> Self {
        let alternatives: Vec<String> = items.iter().map(|item| regex::escape(item)).collect();
        let regex = format!("(?:{})", alternatives.join("|"));
        Self { items, regex }
    }

    /// Builds the converter from rule arguments.
    pub fn from_args(args: &ConverterArgs) -> HyprResult<Self> {
        if !args.keyword.is_empty() {
            return Err(invalid_args("any", "takes positional arguments only"));
        }
        if args.positional.is_empty() {
            return Err(invalid_args("any", "needs at least one item"));
        }
        Ok(Self::new(
            args.positional.iter().map(ToString::to_string).collect(),
        ))
    }

    /// Returns the accepted words.
    pub fn items(&self) -> &[String] {
        &self.items
    }
}

impl PathConverter for AnyConverter {
    fn regex(&self) -> &str {
        &self.regex
    }

    fn to_native(&self, value: &str) -> HyprResult<PathValue> {
        Ok(PathValue::Str(value.to_string()))
    }

    fn to_url(&self, value: &PathValue) -> HyprResult<String> {
        match value.as_str() {
            Some(word) if self.items.iter().any(|item| item == word) => {
                Ok(utf8_percent_encode(word, SEGMENT).to_string())
            }
            _ => Err(conversion_error("any", value)),
        }
    }
}

/// Converter for the rest of a path, slashes included.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathSegmentConverter;

impl PathConverter for PathSegmentConverter {
    fn regex(&self) -> &str {
        "[^/].*?"
    }

    fn weight(&self) -> i64 {
        200
    }

    fn to_native(&self, value: &str) -> HyprResult<PathValue> {
        Ok(PathValue::Path(value.to_string()))
    }

    fn to_url(&self, value: &PathValue) -> HyprResult<String> {
        match value {
            PathValue::Path(v) | PathValue::Str(v) => Ok(utf8_percent_encode(v, PATH).to_string()),
            _ => Ok(value.to_string()),
        }
    }
}

/// Converter for non-negative integers.
///
/// `fixed_digits` forces an exact number of digits (zero padded on output),
/// `min` and `max` bound the value. Values outside those constraints make
/// the rule not match.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntConverter {
    fixed_digits: usize,
    min: Option<i64>,
    max: Option<i64>,
}

impl IntConverter {
    /// Creates an integer converter with explicit constraints.
    pub const fn new(fixed_digits: usize, min: Option<i64>, max: Option<i64>) -> Self {
        Self {
            fixed_digits,
            min,
            max,
        }
    }

    /// Builds the converter from rule arguments.
    pub fn from_args(args: &ConverterArgs) -> HyprResult<Self> {
        const NAME: &str = "int";
        check_signature(NAME, args, &["fixed_digits", "min", "max"])?;
        Ok(Self::new(
            usize_arg(NAME, args, "fixed_digits", 0)?.unwrap_or(0),
            i64_arg(NAME, args, "min", 1)?,
            i64_arg(NAME, args, "max", 2)?,
        ))
    }

    fn check(&self, value: i64) -> HyprResult<i64> {
        if self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max) {
            return Err(conversion_error("int", &value));
        }
        Ok(value)
    }
}

impl PathConverter for IntConverter {
    fn regex(&self) -> &str {
        "[0-9]+"
    }

    fn weight(&self) -> i64 {
        50
    }

    fn to_native(&self, value: &str) -> HyprResult<PathValue> {
        if self.fixed_digits > 0 && value.len() != self.fixed_digits {
            return Err(conversion_error("int", &value));
        }
        let parsed = value
            .parse::<i64>()
            .map_err(|_| conversion_error("int", &value))?;
        self.check(parsed).map(PathValue::Int)
    }

    fn to_url(&self, value: &PathValue) -> HyprResult<String> {
        let v = value
            .as_i64()
            .ok_or_else(|| conversion_error("int", value))?;
        let v = self.check(v)?;
        Ok(format!("{v:0width$}", width = self.fixed_digits))
    }
}

/// Converter for non-negative decimal numbers written with a dot.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatConverter {
    min: Option<f64>,
    max: Option<f64>,
}

impl FloatConverter {
    /// Creates a float converter with optional bounds.
    pub const fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Builds the converter from rule arguments.
    pub fn from_args(args: &ConverterArgs) -> HyprResult<Self> {
        const NAME: &str = "float";
        check_signature(NAME, args, &["min", "max"])?;
        Ok(Self::new(
            f64_arg(NAME, args, "min", 0)?,
            f64_arg(NAME, args, "max", 1)?,
        ))
    }

    fn check(&self, value: f64) -> HyprResult<f64> {
        if self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max) {
            return Err(conversion_error("float", &value));
        }
        Ok(value)
    }
}

impl PathConverter for FloatConverter {
    fn regex(&self) -> &str {
        r"[0-9]+\.[0-9]+"
    }

    fn weight(&self) -> i64 {
        50
    }

    fn to_native(&self, value: &str) -> HyprResult<PathValue> {
        let parsed = value
            .parse::<f64>()
            .map_err(|_| conversion_error("float", &value))?;
        self.check(parsed).map(PathValue::Float)
    }

    fn to_url(&self, value: &PathValue) -> HyprResult<String> {
        let v = match value {
            PathValue::Float(v) => *v,
            _ => return Err(conversion_error("float", value)),
        };
        let v = self.check(v)?;
        // Keep the dot so the URL still matches `[0-9]+\.[0-9]+`.
        if v.fract() == 0.0 {
            Ok(format!("{v:.1}"))
        } else {
            Ok(v.to_string())
        }
    }
}

/// Converter for UUIDs in the canonical `8-4-4-4-12` hex form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidConverter;

impl PathConverter for UuidConverter {
    fn regex(&self) -> &str {
        "[A-Fa-f0-9]{8}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{12}"
    }

    fn to_native(&self, value: &str) -> HyprResult<PathValue> {
        value
            .parse::<uuid::Uuid>()
            .map(PathValue::Uuid)
            .map_err(|_| conversion_error("uuid", &value))
    }

    fn to_url(&self, value: &PathValue) -> HyprResult<String> {
        match value {
            PathValue::Uuid(v) => Ok(v.to_string()),
            _ => Err(conversion_error("uuid", value)),
        }
    }
}

/// Builds a converter instance from the arguments written in a rule.
pub type ConverterFactory =
    Arc<dyn Fn(&ConverterArgs) -> HyprResult<Box<dyn PathConverter>> + Send + Sync>;

fn no_args<C: PathConverter + Default + 'static>(name: &'static str) -> ConverterFactory {
    Arc::new(move |args: &ConverterArgs| {
        check_signature(name, args, &[])?;
        Ok(Box::new(C::default()) as Box<dyn PathConverter>)
    })
}

/// Maps converter names to factories.
///
/// [`ConverterRegistry::new`] contains the built-in converters, including
/// `default`, which bare `<variable>` placeholders use. Custom converters are
/// registered before any rule referencing them is compiled; the router treats
/// its registry as read-only once rules exist.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use hypr_rs_http::urls::converters::{ConverterRegistry, StringConverter, PathConverter};
/// use hypr_rs_http::urls::args::ConverterArgs;
///
/// let mut registry = ConverterRegistry::new();
/// registry.register("code", Arc::new(|_args: &ConverterArgs| {
///     Ok(Box::new(StringConverter::new(1, None, Some(3))) as Box<dyn PathConverter>)
/// }));
/// let converter = registry.build("code", &ConverterArgs::default()).unwrap();
/// assert_eq!(converter.regex(), "[^/]{3}");
/// assert!(registry.lookup("missing").is_err());
/// ```
#[derive(Clone)]
pub struct ConverterRegistry {
    factories: HashMap<String, ConverterFactory>,
}

impl ConverterRegistry {
    /// Creates a registry holding the built-in converters.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        let string: ConverterFactory = Arc::new(|args: &ConverterArgs| {
            Ok(Box::new(StringConverter::from_args(args)?) as Box<dyn PathConverter>)
        });
        registry.register("default", string.clone());
        registry.register("string", string);
        registry.register(
            "any",
            Arc::new(|args: &ConverterArgs| {
                Ok(Box::new(AnyConverter::from_args(args)?) as Box<dyn PathConverter>)
            }),
        );
        registry.register("path", no_args::<PathSegmentConverter>("path"));
        registry.register(
            "int",
            Arc::new(|args: &ConverterArgs| {
                Ok(Box::new(IntConverter::from_args(args)?) as Box<dyn PathConverter>)
            }),
        );
        registry.register(
            "float",
            Arc::new(|args: &ConverterArgs| {
                Ok(Box::new(FloatConverter::from_args(args)?) as Box<dyn PathConverter>)
            }),
        );
        registry.register("uuid", no_args::<UuidConverter>("uuid"));
        registry
    }

    /// Registers (or replaces) a converter under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: ConverterFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Looks up the factory registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HyprError::UnknownConverter`] if nothing is registered under `name`.
    pub fn lookup(&self, name: &str) -> HyprResult<&ConverterFactory> {
        self.factories
            .get(name)
            .ok_or_else(|| HyprError::UnknownConverter(name.to_string()))
    }

    /// Instantiates the converter `name` with the given arguments.
    pub fn build(&self, name: &str, args: &ConverterArgs) -> HyprResult<Box<dyn PathConverter>> {
        let factory = self.lookup(name)?;
        factory(args)
    }

    /// Returns `true` if a converter is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns the registered converter names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("names", &self.names())
            .finish()
    }
}
