//! URL rules: parsing, compilation, matching and building.
//!
//! A rule string mixes static text and placeholders:
//!
//! ```text
//! /users/<int:id>/posts/<string(length=8):slug>
//! ```
//!
//! [`parse_rule`] splits it into [`RuleSegment`]s, [`CompiledPattern::compile`]
//! turns those into an anchored regex, and [`Rule`] ties a compiled pattern to
//! an endpoint and its allowed methods.
//!
//! Rules ending in `/` are non-leaf rules: they also match the path without
//! the trailing slash, reporting [`RuleMatch::Redirect`] so the caller can
//! send the client to the canonical form.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Write};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use hypr_rs_core::{HyprError, HyprResult};

use super::args::{parse_converter_args, ConverterArgs};
use super::converters::{ConverterRegistry, PathArgs, PathConverter};

/// Name of the internal group capturing the optional trailing slash of non-leaf rules.
const SUFFIX_GROUP: &str = "__suffix__";

static RULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^
        (?P<static>[^<]*)                           # static rule data
        <
        (?:
            (?P<converter>[a-zA-Z_][a-zA-Z0-9_]*)   # converter name
            (?:\((?P<args>.*?)\))?                  # converter arguments
            :                                       # variable delimiter
        )?
        (?P<variable>[a-zA-Z_][a-zA-Z0-9_]*)        # variable name
        >
        ",
    )
    .expect("rule regex is valid")
});

/// One piece of a parsed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSegment {
    /// Literal text, matched verbatim.
    Static(String),
    /// A `<converter(args):variable>` placeholder.
    Dynamic {
        /// The converter name (`default` for a bare `<variable>`).
        converter: String,
        /// The raw text between the converter's parentheses, if any.
        args: Option<String>,
        /// The variable the matched value is stored under.
        variable: String,
    },
}

/// Parses a rule string into its segments.
///
/// # Errors
///
/// Returns [`HyprError::DuplicateVariable`] if a variable appears twice and
/// [`HyprError::MalformedRule`] if text after the last placeholder still
/// contains `<` or `>`.
///
/// # Examples
///
/// ```
/// use hypr_rs_http::urls::rule::{parse_rule, RuleSegment};
///
/// let segments = parse_rule("/users/<int:id>").unwrap();
/// assert_eq!(segments[0], RuleSegment::Static("/users/".into()));
/// assert_eq!(
///     segments[1],
///     RuleSegment::Dynamic {
///         converter: "int".into(),
///         args: None,
///         variable: "id".into(),
///     }
/// );
/// ```
pub fn parse_rule(rule: &str) -> HyprResult<Vec<RuleSegment>> {
    let mut segments = Vec::new();
    let mut used_names = BTreeSet::new();
    let mut pos = 0;

    while pos < rule.len() {
        let Some(caps) = RULE_RE.captures(&rule[pos..]) else {
            break;
        };

        let static_part = caps.name("static").map_or("", |m| m.as_str());
        if !static_part.is_empty() {
            segments.push(RuleSegment::Static(static_part.to_string()));
        }

        let variable = caps.name("variable").map_or("", |m| m.as_str());
        if !used_names.insert(variable.to_string()) {
            return Err(HyprError::DuplicateVariable {
                rule: rule.to_string(),
                variable: variable.to_string(),
            });
        }
        segments.push(RuleSegment::Dynamic {
            converter: caps
                .name("converter")
                .map_or("default", |m| m.as_str())
                .to_string(),
            args: caps
                .name("args")
                .map(|m| m.as_str())
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            variable: variable.to_string(),
        });

        pos += caps.get(0).map_or(0, |m| m.end());
    }

    if pos < rule.len() {
        let remaining = &rule[pos..];
        if remaining.contains('<') || remaining.contains('>') {
            return Err(HyprError::MalformedRule(rule.to_string()));
        }
        segments.push(RuleSegment::Static(remaining.to_string()));
    }

    Ok(segments)
}

/// A `(kind, weight)` pair: `(0, -len)` for a static path part, `(1, weight)`
/// for a placeholder.
pub type Weight = (u8, i64);

/// The ordering key of a rule: rules without arguments first, then the most
/// complex rules, then by weights.
pub type SortKey = (bool, Reverse<usize>, Vec<Weight>);

/// The compiled form of one rule string.
#[derive(Debug)]
pub struct CompiledPattern {
    regex: Regex,
    segments: Vec<RuleSegment>,
    converters: BTreeMap<String, Box<dyn PathConverter>>,
    weights: Vec<Weight>,
    arguments: BTreeSet<String>,
    is_leaf: bool,
}

impl CompiledPattern {
    /// Compiles a rule string using converters from `registry`.
    ///
    /// # Errors
    ///
    /// Propagates rule parsing errors, [`HyprError::UnknownConverter`],
    /// [`HyprError::InvalidConverterArgs`], and returns
    /// [`HyprError::InvalidRule`] if the resulting regex does not compile.
    pub fn compile(url: &str, registry: &ConverterRegistry) -> HyprResult<Self> {
        let is_leaf = !url.ends_with('/');
        let source = if is_leaf {
            url
        } else {
            url.trim_end_matches('/')
        };
        let segments = parse_rule(source)?;

        let mut regex = String::from("^");
        let mut converters = BTreeMap::new();
        let mut weights = Vec::new();
        let mut arguments = BTreeSet::new();

        for segment in &segments {
            match segment {
                RuleSegment::Static(text) => {
                    regex.push_str(&regex::escape(text));
                    weights.extend(
                        text.split('/')
                            .filter(|part| !part.is_empty())
                            .map(|part| {
                                let len = i64::try_from(part.chars().count()).unwrap_or(i64::MAX);
                                (0, -len)
                            }),
                    );
                }
                RuleSegment::Dynamic {
                    converter,
                    args,
                    variable,
                } => {
                    let converter_args = args
                        .as_deref()
                        .map(parse_converter_args)
                        .unwrap_or_else(ConverterArgs::default);
                    let converter = registry.build(converter, &converter_args)?;
                    let _ = write!(regex, "(?P<{variable}>{})", converter.regex());
                    weights.push((1, converter.weight()));
                    converters.insert(variable.clone(), converter);
                    arguments.insert(variable.clone());
                }
            }
        }

        if !is_leaf {
            let _ = write!(regex, "(?P<{SUFFIX_GROUP}>/?)");
        }
        regex.push('$');

        let regex = Regex::new(&regex)
            .map_err(|e| HyprError::InvalidRule(format!("{url}: {e}")))?;

        Ok(Self {
            regex,
            segments,
            converters,
            weights,
            arguments,
            is_leaf,
        })
    }

    /// Returns the compiled regex.
    pub const fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Returns the parsed segments (of the rule without its trailing slash).
    pub fn segments(&self) -> &[RuleSegment] {
        &self.segments
    }

    /// Returns the per-part weights used for ordering.
    pub fn weights(&self) -> &[Weight] {
        &self.weights
    }

    /// Returns the variable names of the rule.
    pub const fn arguments(&self) -> &BTreeSet<String> {
        &self.arguments
    }
}

/// Compiled patterns keyed by rule string, so equal rules share one regex.
#[derive(Debug, Default)]
pub struct CompileCache {
    patterns: HashMap<String, Arc<CompiledPattern>>,
}

impl CompileCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached pattern for `url`, compiling it on first use.
    pub fn get_or_compile(
        &mut self,
        url: &str,
        registry: &ConverterRegistry,
    ) -> HyprResult<Arc<CompiledPattern>> {
        if let Some(pattern) = self.patterns.get(url) {
            return Ok(Arc::clone(pattern));
        }
        let pattern = Arc::new(CompiledPattern::compile(url, registry)?);
        self.patterns.insert(url.to_string(), Arc::clone(&pattern));
        Ok(pattern)
    }

    /// Returns the number of distinct compiled rule strings.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` if nothing has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// The outcome of matching a path against one rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleMatch {
    /// The path matched; converted variables are attached.
    Match(PathArgs),
    /// The path matched a non-leaf rule without its trailing slash.
    Redirect(String),
    /// The path does not match, or a converter rejected a captured value.
    NoMatch,
}

/// A URL rule bound to an endpoint.
#[derive(Debug, Clone)]
pub struct Rule {
    url: String,
    endpoint: String,
    methods: Option<BTreeSet<String>>,
    is_leaf: bool,
    pattern: Option<Arc<CompiledPattern>>,
}

static NO_ARGUMENTS: BTreeSet<String> = BTreeSet::new();

impl Rule {
    /// Creates an uncompiled rule. `None` methods accept any method.
    pub fn new(url: impl Into<String>, endpoint: impl Into<String>, methods: Option<&[&str]>) -> Self {
        let url = url.into();
        let is_leaf = !url.ends_with('/');
        Self {
            url,
            endpoint: endpoint.into(),
            methods: methods.map(|m| m.iter().map(|s| s.to_ascii_uppercase()).collect()),
            is_leaf,
            pattern: None,
        }
    }

    /// Compiles the rule, reusing a cached pattern for an identical rule string.
    pub fn compile(
        &mut self,
        cache: &mut CompileCache,
        registry: &ConverterRegistry,
    ) -> HyprResult<()> {
        self.pattern = Some(cache.get_or_compile(&self.url, registry)?);
        Ok(())
    }

    /// Creates and compiles a rule in one step, without a shared cache.
    pub fn compiled(
        url: impl Into<String>,
        endpoint: impl Into<String>,
        methods: Option<&[&str]>,
        registry: &ConverterRegistry,
    ) -> HyprResult<Self> {
        let mut rule = Self::new(url, endpoint, methods);
        rule.compile(&mut CompileCache::new(), registry)?;
        Ok(rule)
    }

    /// Returns the rule string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the endpoint name.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the allowed methods, upper-cased. `None` means any method.
    pub const fn methods(&self) -> Option<&BTreeSet<String>> {
        self.methods.as_ref()
    }

    /// Returns `true` if the rule does not end in `/`.
    pub const fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Returns the compiled pattern, if the rule has been compiled.
    pub fn pattern(&self) -> Option<&CompiledPattern> {
        self.pattern.as_deref()
    }

    /// Returns the variable names of the rule.
    pub fn arguments(&self) -> &BTreeSet<String> {
        self.pattern.as_ref().map_or(&NO_ARGUMENTS, |p| &p.arguments)
    }

    /// Returns `true` if the rule accepts `method`.
    pub fn allows(&self, method: &str) -> bool {
        self.methods
            .as_ref()
            .map_or(true, |methods| methods.iter().any(|m| m.eq_ignore_ascii_case(method)))
    }

    /// Returns the ordering key of the rule.
    pub fn sort_key(&self) -> SortKey {
        let weights = self
            .pattern
            .as_ref()
            .map(|p| p.weights.clone())
            .unwrap_or_default();
        (!self.arguments().is_empty(), Reverse(weights.len()), weights)
    }

    /// Matches `path` against the rule.
    ///
    /// An uncompiled rule never matches.
    pub fn match_path(&self, path: &str) -> RuleMatch {
        let Some(pattern) = &self.pattern else {
            return RuleMatch::NoMatch;
        };
        let Some(caps) = pattern.regex.captures(path) else {
            return RuleMatch::NoMatch;
        };

        if !pattern.is_leaf {
            let Some(suffix) = caps.name(SUFFIX_GROUP) else {
                return RuleMatch::NoMatch;
            };
            // The slash before the optional suffix must belong to the suffix.
            if path[..suffix.start()].ends_with('/') {
                return RuleMatch::NoMatch;
            }
            if suffix.as_str().is_empty() {
                return RuleMatch::Redirect(format!("{path}/"));
            }
        }

        let mut args = PathArgs::new();
        for (name, converter) in &pattern.converters {
            let Some(raw) = caps.name(name) else {
                return RuleMatch::NoMatch;
            };
            match converter.to_native(raw.as_str()) {
                Ok(value) => {
                    args.insert(name.clone(), value);
                }
                Err(_) => return RuleMatch::NoMatch,
            }
        }
        RuleMatch::Match(args)
    }

    /// Builds a URL from variable values, the inverse of [`Rule::match_path`].
    ///
    /// # Errors
    ///
    /// Returns [`HyprError::ConversionFailed`] if a variable is missing, unknown
    /// to the rule, or rejected by its converter, and [`HyprError::InvalidRule`]
    /// if the rule is not compiled.
    pub fn build(&self, args: &PathArgs) -> HyprResult<String> {
        let pattern = self
            .pattern
            .as_ref()
            .ok_or_else(|| HyprError::InvalidRule(format!("rule {} is not compiled", self.url)))?;

        if let Some(extra) = args.keys().find(|k| !pattern.arguments.contains(*k)) {
            return Err(HyprError::ConversionFailed(format!(
                "rule {} has no variable {extra}",
                self.url
            )));
        }

        let mut url = String::new();
        for segment in &pattern.segments {
            match segment {
                RuleSegment::Static(text) => url.push_str(text),
                RuleSegment::Dynamic { variable, .. } => {
                    let value = args.get(variable).ok_or_else(|| {
                        HyprError::ConversionFailed(format!("missing value for {variable}"))
                    })?;
                    let converter = pattern.converters.get(variable).ok_or_else(|| {
                        HyprError::ConversionFailed(format!("no converter for {variable}"))
                    })?;
                    url.push_str(&converter.to_url(value)?);
                }
            }
        }
        if !self.is_leaf {
            url.push('/');
        }
        Ok(url)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.url, self.endpoint)?;
        if let Some(methods) = &self.methods {
            let methods: Vec<&str> = methods.iter().map(String::as_str).collect();
            write!(f, " [{}]", methods.join(", "))?;
        }
        Ok(())
    }
}
