//! The rule table and the resolve algorithm.
//!
//! A [`Router`] owns the compiled rules, kept sorted by
//! [`Rule::sort_key`](super::rule::Rule::sort_key) after every insertion, and one
//! shared handler per endpoint. It is filled during setup and only read
//! afterwards, so it can be shared across requests behind an `Arc` without
//! locking.
//!
//! Resolution is a single pass over the sorted rules:
//!
//! 1. A non-leaf rule hit without its trailing slash fails immediately with
//!    [`HyprError::TemporaryRedirect`].
//! 2. The first matching rule that allows the method wins.
//! 3. Matching rules that do not allow the method add their methods to an
//!    accumulator and scanning continues.
//! 4. When the rules are exhausted, a non-empty accumulator gives
//!    [`HyprError::MethodNotAllowed`], otherwise [`HyprError::NotFound`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use hypr_rs_core::{HyprError, HyprResult};

use super::converters::{ConverterRegistry, PathArgs, PathValue};
use super::rule::{CompileCache, Rule, RuleMatch};

/// Variable capturing the rest of the path after a propagating provider's mount.
pub const REMNANT: &str = "__remnant";

/// Prefix of the endpoints registered for propagation rules.
pub const PROPAGATION_PREFIX: &str = "__pps_";

/// Returns the endpoint a propagation endpoint was derived from.
///
/// ```
/// use hypr_rs_http::urls::router::base_endpoint;
///
/// assert_eq!(base_endpoint("__pps_users"), "users");
/// assert_eq!(base_endpoint("users"), "users");
/// ```
pub fn base_endpoint(endpoint: &str) -> &str {
    endpoint.strip_prefix(PROPAGATION_PREFIX).unwrap_or(endpoint)
}

/// A successful resolution: the matched rule, its handler and the variables.
pub struct MatchResult<'a, H: ?Sized> {
    /// Converted variables captured by the rule.
    pub variables: PathArgs,
    /// The rule that matched.
    pub rule: &'a Rule,
    /// The handler bound to the rule's endpoint.
    pub handler: Arc<H>,
}

impl<H: ?Sized> MatchResult<'_, H> {
    /// Returns the endpoint of the matched rule.
    pub fn endpoint(&self) -> &str {
        self.rule.endpoint()
    }

    /// Returns the remaining path captured by a propagation rule, if any.
    pub fn remnant(&self) -> Option<&str> {
        self.variables.get(REMNANT).and_then(PathValue::as_str)
    }
}

impl<H: ?Sized> fmt::Debug for MatchResult<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchResult")
            .field("variables", &self.variables)
            .field("rule", &self.rule.url())
            .field("endpoint", &self.rule.endpoint())
            .finish_non_exhaustive()
    }
}

/// An ordered set of rules bound to shared handlers.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use hypr_rs_http::urls::router::Router;
/// use hypr_rs_http::urls::PathValue;
///
/// let mut router: Router<str> = Router::new();
/// router
///     .add_provider(Arc::from("user"), &["/users/<int:id>"], Some(&["GET"]), "user", false)
///     .unwrap();
///
/// let m = router.resolve("/users/42", "GET").unwrap();
/// assert_eq!(m.endpoint(), "user");
/// assert_eq!(m.variables["id"], PathValue::Int(42));
/// ```
pub struct Router<H: ?Sized> {
    rules: Vec<Rule>,
    providers: HashMap<String, Arc<H>>,
    converters: ConverterRegistry,
    cache: CompileCache,
}

impl<H: ?Sized> Router<H> {
    /// Creates an empty router with the built-in converters.
    pub fn new() -> Self {
        Self::with_converters(ConverterRegistry::new())
    }

    /// Creates an empty router using `converters` to compile its rules.
    pub fn with_converters(converters: ConverterRegistry) -> Self {
        Self {
            rules: Vec::new(),
            providers: HashMap::new(),
            converters,
            cache: CompileCache::new(),
        }
    }

    /// Returns the converter registry rules are compiled with.
    pub const fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Registers `handler` under `endpoint` for each rule in `urls`.
    ///
    /// With `propagation`, every url without a `<path:` placeholder is also
    /// registered as `url/<path:__remnant>` under `__pps_<endpoint>`, bound to
    /// the same handler.
    ///
    /// Nothing is inserted if any rule, propagation rules included, fails to
    /// compile or if either endpoint is already taken.
    ///
    /// # Errors
    ///
    /// Returns [`HyprError::DuplicateEndpoint`] if `endpoint` (or, with
    /// `propagation`, `__pps_<endpoint>`) is taken,
    /// [`HyprError::InvalidRule`] if no url is given or one does not start
    /// with `/`, and any rule compilation error.
    pub fn add_provider(
        &mut self,
        handler: Arc<H>,
        urls: &[&str],
        methods: Option<&[&str]>,
        endpoint: &str,
        propagation: bool,
    ) -> HyprResult<()> {
        let mut legs = vec![(endpoint.to_string(), self.compile_rules(urls, methods, endpoint)?)];

        if propagation {
            let remnant_urls: Vec<String> = urls
                .iter()
                .filter(|url| !url.contains("<path:"))
                .map(|url| {
                    let sep = if url.ends_with('/') { "" } else { "/" };
                    format!("{url}{sep}<path:{REMNANT}>")
                })
                .collect();
            if !remnant_urls.is_empty() {
                let refs: Vec<&str> = remnant_urls.iter().map(String::as_str).collect();
                let pps_endpoint = format!("{PROPAGATION_PREFIX}{endpoint}");
                let rules = self.compile_rules(&refs, methods, &pps_endpoint)?;
                legs.push((pps_endpoint, rules));
            }
        }

        for (name, rules) in legs {
            for rule in rules {
                tracing::debug!(rule = %rule, "registered rule");
                self.rules.push(rule);
            }
            self.providers.insert(name, Arc::clone(&handler));
        }
        self.rules.sort_by_key(Rule::sort_key);

        Ok(())
    }

    /// Compiles the rules of one endpoint without inserting them.
    fn compile_rules(
        &mut self,
        urls: &[&str],
        methods: Option<&[&str]>,
        endpoint: &str,
    ) -> HyprResult<Vec<Rule>> {
        if self.providers.contains_key(endpoint) {
            return Err(HyprError::DuplicateEndpoint(endpoint.to_string()));
        }
        if urls.is_empty() {
            return Err(HyprError::InvalidRule(format!(
                "endpoint {endpoint} has no url"
            )));
        }

        let mut compiled = Vec::with_capacity(urls.len());
        for url in urls {
            if !url.starts_with('/') {
                return Err(HyprError::InvalidRule(format!(
                    "url '{url}' should start with a leading '/'"
                )));
            }
            let mut rule = Rule::new(*url, endpoint, methods);
            rule.compile(&mut self.cache, &self.converters)?;
            compiled.push(rule);
        }
        Ok(compiled)
    }

    /// Resolves `path` for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`HyprError::TemporaryRedirect`], [`HyprError::MethodNotAllowed`]
    /// or [`HyprError::NotFound`] as described in the module documentation.
    pub fn resolve(&self, path: &str, method: &str) -> HyprResult<MatchResult<'_, H>> {
        let mut allowed_methods: BTreeSet<&str> = BTreeSet::new();

        for rule in &self.rules {
            let variables = match rule.match_path(path) {
                RuleMatch::NoMatch => continue,
                RuleMatch::Redirect(target) => {
                    tracing::debug!(path, target = %target, "redirecting to slash-terminated path");
                    return Err(HyprError::TemporaryRedirect(target));
                }
                RuleMatch::Match(variables) => variables,
            };

            if rule.allows(method) {
                let Some(handler) = self.providers.get(rule.endpoint()) else {
                    continue;
                };
                return Ok(MatchResult {
                    variables,
                    rule,
                    handler: Arc::clone(handler),
                });
            }

            if let Some(methods) = rule.methods() {
                allowed_methods.extend(methods.iter().map(String::as_str));
            }
        }

        if allowed_methods.is_empty() {
            tracing::debug!(path, method, "no rule matched");
            Err(HyprError::NotFound(path.to_string()))
        } else {
            tracing::debug!(path, method, "method not allowed");
            Err(HyprError::MethodNotAllowed {
                method: method.to_string(),
                allowed: allowed_methods.into_iter().map(str::to_string).collect(),
            })
        }
    }

    /// Returns the handler bound to `endpoint`.
    pub fn get_provider(&self, endpoint: &str) -> Option<&Arc<H>> {
        self.providers.get(endpoint)
    }

    /// Iterates over the rule strings in match order, optionally for one endpoint.
    pub fn iter_rules<'a>(&'a self, endpoint: Option<&'a str>) -> impl Iterator<Item = &'a str> + 'a {
        self.rules
            .iter()
            .filter(move |rule| endpoint.map_or(true, |e| rule.endpoint() == e))
            .map(Rule::url)
    }

    /// Returns the compiled rules in match order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Builds the URL of `endpoint` from variable values.
    ///
    /// The first rule of the endpoint, in match order, whose variables are
    /// exactly the keys of `args` is used.
    ///
    /// # Errors
    ///
    /// Returns [`HyprError::NotFound`] if no rule of the endpoint takes these
    /// variables, and any conversion error from building the URL.
    pub fn url_for(&self, endpoint: &str, args: &PathArgs) -> HyprResult<String> {
        let rule = self
            .rules
            .iter()
            .filter(|rule| rule.endpoint() == endpoint)
            .find(|rule| rule.arguments().iter().eq(args.keys()))
            .ok_or_else(|| {
                let keys: Vec<&str> = args.keys().map(String::as_str).collect();
                HyprError::NotFound(format!(
                    "no rule of {endpoint} takes [{}]",
                    keys.join(", ")
                ))
            })?;
        rule.build(args)
    }

    /// Returns the registered endpoint names, sorted.
    pub fn endpoints(&self) -> Vec<&str> {
        let mut endpoints: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        endpoints.sort_unstable();
        endpoints
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rule is registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<H: ?Sized> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self.rules.iter().map(ToString::to_string).collect();
        f.debug_struct("Router")
            .field("rules", &rules)
            .field("endpoints", &self.endpoints())
            .finish_non_exhaustive()
    }
}
