//! Converter argument parsing.
//!
//! The text between the parentheses of `<int(min=1, max=10):page>` is parsed
//! with a deliberately small literal grammar:
//!
//! ```text
//! args  := arg (',' arg)*
//! arg   := [name '='] value
//! value := 'True' | 'False' | 'None' | integer | float | quoted-string | bare-word
//! ```
//!
//! Parsing is lenient: anything that is not a typed literal becomes a bare word.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static CONVERTER_ARGS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        (?:(?P<name>\w+)\s*=\s*)?
        (?P<value>
            True|False|
            -?(?:\d+.)?\d+(?:e[-+]\d+)?|
            -?\d+.|
            \w+|
            [urUR]?(?P<stringval>"[^"]*?"|'[^']*')|
        )\s*,
        "#,
    )
    .expect("converter argument regex is valid")
});

/// A literal converter argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// `None`
    Null,
    /// `True` or `False`
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A float literal.
    Float(f64),
    /// A quoted string (quotes removed) or a bare word.
    Str(String),
}

impl ArgValue {
    /// Returns the value as an integer, if it is one.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a float. Integers are widened.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `true` for [`ArgValue::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "None"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Parsed converter arguments: positional values in order plus keyword values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConverterArgs {
    /// Arguments without a `name=` prefix, in declaration order.
    pub positional: Vec<ArgValue>,
    /// Arguments with a `name=` prefix.
    pub keyword: HashMap<String, ArgValue>,
}

impl ConverterArgs {
    /// Returns `true` when no argument was given.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Looks up an argument by keyword, falling back to its positional index.
    pub fn get(&self, name: &str, position: usize) -> Option<&ArgValue> {
        self.keyword
            .get(name)
            .or_else(|| self.positional.get(position))
    }
}

/// Turns the text of one literal into a typed value.
fn literal(value: &str) -> ArgValue {
    match value {
        "None" => return ArgValue::Null,
        "True" => return ArgValue::Bool(true),
        "False" => return ArgValue::Bool(false),
        _ => {}
    }
    if let Ok(v) = value.parse::<i64>() {
        return ArgValue::Int(v);
    }
    if let Ok(v) = value.parse::<f64>() {
        return ArgValue::Float(v);
    }

    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && bytes[0] == bytes[bytes.len() - 1]
        && matches!(bytes[0], b'"' | b'\'')
    {
        return ArgValue::Str(value[1..value.len() - 1].to_string());
    }
    ArgValue::Str(value.to_string())
}

/// Parses the argument string of a converter.
///
/// # Examples
///
/// ```
/// use hypr_rs_http::urls::args::{parse_converter_args, ArgValue};
///
/// let args = parse_converter_args("3, max=10, label='x'");
/// assert_eq!(args.positional, vec![ArgValue::Int(3)]);
/// assert_eq!(args.keyword["max"], ArgValue::Int(10));
/// assert_eq!(args.keyword["label"], ArgValue::Str("x".into()));
/// ```
pub fn parse_converter_args(argstr: &str) -> ConverterArgs {
    let mut args = ConverterArgs::default();
    if argstr.trim().is_empty() {
        return args;
    }

    let input = format!("{argstr},");

    for caps in CONVERTER_ARGS_RE.captures_iter(&input) {
        let raw = caps
            .name("stringval")
            .or_else(|| caps.name("value"))
            .map_or("", |m| m.as_str());
        let value = literal(raw);

        match caps.name("name") {
            Some(name) => {
                args.keyword.insert(name.as_str().to_string(), value);
            }
            None => args.positional.push(value),
        }
    }

    args
}
