//! Checkpoints: guards fired at well-defined positions of a dispatch chain.
//!
//! A request routed through propagation visits a chain of providers. Each
//! provider in the chain has a [`Position`]:
//!
//! | Chain             | Positions                                   |
//! |-------------------|---------------------------------------------|
//! | `a`               | `a`: `Single`                               |
//! | `a -> b`          | `a`: `Source`, `b`: `Destination`           |
//! | `a -> b -> c`     | `a`: `Source`, `b`: `Link`, `c`: `Destination` |
//!
//! A [`CheckpointDescriptor`] declares in which positions ([`Scope`]) its
//! checkpoint fires, with which priority, optionally only for one neighbour
//! (the *subject*) and only for some methods. Providers return their
//! descriptors from [`Provider::checkpoints`](crate::provider::Provider::checkpoints).

use std::collections::BTreeSet;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use async_trait::async_trait;

use hypr_rs_core::HyprResult;
use hypr_rs_http::{HttpRequest, HttpResponse, PathArgs};

/// Where a provider sits in a dispatch chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// The only provider of the chain.
    Single,
    /// The first provider, forwarding to the next one.
    Source,
    /// A provider in the middle, receiving and forwarding.
    Link,
    /// The last provider of a chain of two or more.
    Destination,
}

impl Position {
    /// Returns the position of hop `index` in a chain of `len` hops.
    pub const fn of(index: usize, len: usize) -> Self {
        if len <= 1 {
            Self::Single
        } else if index == 0 {
            Self::Source
        } else if index + 1 == len {
            Self::Destination
        } else {
            Self::Link
        }
    }

    /// Returns the single-position scope.
    pub const fn scope(self) -> Scope {
        match self {
            Self::Single => Scope::SINGLE,
            Self::Source => Scope::SOURCE,
            Self::Link => Scope::LINK,
            Self::Destination => Scope::DESTINATION,
        }
    }

    /// Returns `true` for the first hop of a chain.
    pub const fn is_entry(self) -> bool {
        matches!(self, Self::Single | Self::Source)
    }

    /// Returns `true` if the request continues to another provider.
    pub const fn forwards(self) -> bool {
        matches!(self, Self::Source | Self::Link)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::Source => "source",
            Self::Link => "link",
            Self::Destination => "destination",
        };
        f.write_str(name)
    }
}

/// A set of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(u8);

impl Scope {
    /// No position.
    pub const NONE: Self = Self(0);
    /// Only provider of the chain.
    pub const SINGLE: Self = Self(0b0001);
    /// First provider, forwarding.
    pub const SOURCE: Self = Self(0b0010);
    /// Middle provider.
    pub const LINK: Self = Self(0b0100);
    /// Last provider of a longer chain.
    pub const DESTINATION: Self = Self(0b1000);
    /// First hop, forwarding or not.
    pub const IS_ENTRY: Self = Self(Self::SINGLE.0 | Self::SOURCE.0);
    /// Any hop but the first.
    pub const IS_NOT_ENTRY: Self = Self(Self::LINK.0 | Self::DESTINATION.0);
    /// Hops that forward the request.
    pub const FORWARDING: Self = Self(Self::SOURCE.0 | Self::LINK.0);
    /// Every position.
    pub const ALWAYS: Self = Self(0b1111);

    /// Returns `true` if `position` belongs to the scope.
    pub const fn contains(self, position: Position) -> bool {
        self.0 & position.scope().0 != 0
    }

    /// Returns the union of two scopes.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for Scope {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// What a checkpoint sees of the request and of its place in the chain.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointContext<'a> {
    /// The request being dispatched.
    pub request: &'a HttpRequest,
    /// The base endpoint of the provider running the checkpoint.
    pub endpoint: &'a str,
    /// The provider's position in the chain.
    pub position: Position,
    /// The next hop's endpoint when forwarding, the previous hop's endpoint at
    /// the destination, `None` for a single hop.
    pub subject: Option<&'a str>,
    /// The variables captured by this hop's rule.
    pub args: &'a PathArgs,
    /// The index of this hop in the chain.
    pub depth: usize,
}

/// A guard run before the terminal handler.
///
/// Return `Ok(None)` to let dispatch continue, `Ok(Some(response))` to stop
/// and answer with `response`, or an error to stop with that error.
///
/// Plain functions and closures with the matching signature are checkpoints.
#[async_trait]
pub trait Checkpoint: Send + Sync {
    /// Runs the checkpoint.
    async fn check(&self, ctx: &CheckpointContext<'_>) -> HyprResult<Option<HttpResponse>>;
}

#[async_trait]
impl<F> Checkpoint for F
where
    F: Fn(&CheckpointContext<'_>) -> HyprResult<Option<HttpResponse>> + Send + Sync,
{
    async fn check(&self, ctx: &CheckpointContext<'_>) -> HyprResult<Option<HttpResponse>> {
        self(ctx)
    }
}

/// A checkpoint with the conditions under which it fires.
#[derive(Clone)]
pub struct CheckpointDescriptor {
    name: String,
    scope: Scope,
    priority: i32,
    subject: Option<String>,
    methods: Option<BTreeSet<String>>,
    checkpoint: Arc<dyn Checkpoint>,
}

impl CheckpointDescriptor {
    /// Creates a descriptor firing in `scope` with priority 0, for any
    /// subject and any method.
    pub fn new(name: impl Into<String>, scope: Scope, checkpoint: impl Checkpoint + 'static) -> Self {
        Self {
            name: name.into(),
            scope,
            priority: 0,
            subject: None,
            methods: None,
            checkpoint: Arc::new(checkpoint),
        }
    }

    /// Creates a descriptor from a plain function or closure.
    pub fn from_fn<F>(name: impl Into<String>, scope: Scope, f: F) -> Self
    where
        F: Fn(&CheckpointContext<'_>) -> HyprResult<Option<HttpResponse>> + Send + Sync + 'static,
    {
        Self::new(name, scope, f)
    }

    /// Sets the priority. Lower priorities run first.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Restricts the checkpoint to one neighbouring endpoint.
    #[must_use]
    pub fn with_subject(mut self, endpoint: impl Into<String>) -> Self {
        self.subject = Some(endpoint.into());
        self
    }

    /// Restricts the checkpoint to some methods.
    #[must_use]
    pub fn with_methods(mut self, methods: &[&str]) -> Self {
        self.methods = Some(methods.iter().map(|m| m.to_ascii_uppercase()).collect());
        self
    }

    /// Returns the checkpoint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the scope.
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns the priority.
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns `true` if the checkpoint fires for this position, subject and method.
    pub fn applies(&self, position: Position, subject: Option<&str>, method: &str) -> bool {
        self.scope.contains(position)
            && self
                .subject
                .as_deref()
                .map_or(true, |s| subject == Some(s))
            && self
                .methods
                .as_ref()
                .map_or(true, |m| m.iter().any(|x| x.eq_ignore_ascii_case(method)))
    }

    /// Runs the checkpoint.
    pub async fn run(&self, ctx: &CheckpointContext<'_>) -> HyprResult<Option<HttpResponse>> {
        self.checkpoint.check(ctx).await
    }
}

impl fmt::Debug for CheckpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointDescriptor")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("priority", &self.priority)
            .field("subject", &self.subject)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// The checkpoints of one provider, ordered by `(priority, declaration order)`.
///
/// # Examples
///
/// ```
/// use hypr_rs_providers::checkpoint::{CheckpointTable, Position, Scope};
///
/// let table = CheckpointTable::new()
///     .checkpoint("audit", Scope::ALWAYS, |_| Ok(None))
///     .checkpoint("auth", Scope::IS_ENTRY, |_| Ok(None));
///
/// let names: Vec<&str> = table
///     .select(Position::Link, None, "GET")
///     .map(|c| c.name())
///     .collect();
/// assert_eq!(names, ["audit"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CheckpointTable {
    entries: Vec<CheckpointDescriptor>,
}

impl CheckpointTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor, keeping the table ordered.
    pub fn add(&mut self, descriptor: CheckpointDescriptor) {
        self.entries.push(descriptor);
        self.entries.sort_by_key(|d| d.priority);
    }

    /// Adds a descriptor and returns the table.
    #[must_use]
    pub fn with(mut self, descriptor: CheckpointDescriptor) -> Self {
        self.add(descriptor);
        self
    }

    /// Adds a function checkpoint with default priority, subject and methods.
    #[must_use]
    pub fn checkpoint<F>(self, name: impl Into<String>, scope: Scope, f: F) -> Self
    where
        F: Fn(&CheckpointContext<'_>) -> HyprResult<Option<HttpResponse>> + Send + Sync + 'static,
    {
        self.with(CheckpointDescriptor::from_fn(name, scope, f))
    }

    /// Returns the checkpoints that fire for this position, subject and method,
    /// in run order.
    pub fn select<'a>(
        &'a self,
        position: Position,
        subject: Option<&'a str>,
        method: &'a str,
    ) -> impl Iterator<Item = &'a CheckpointDescriptor> + 'a {
        self.entries
            .iter()
            .filter(move |d| d.applies(position, subject, method))
    }

    /// Returns every descriptor in run order.
    pub fn iter(&self) -> impl Iterator<Item = &CheckpointDescriptor> {
        self.entries.iter()
    }

    /// Returns the number of checkpoints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(_: &CheckpointContext<'_>) -> HyprResult<Option<HttpResponse>> {
        Ok(None)
    }

    #[test]
    fn test_positions() {
        assert_eq!(Position::of(0, 1), Position::Single);
        assert_eq!(Position::of(0, 3), Position::Source);
        assert_eq!(Position::of(1, 3), Position::Link);
        assert_eq!(Position::of(2, 3), Position::Destination);
        assert!(Position::Source.is_entry());
        assert!(!Position::Destination.forwards());
        assert_eq!(Position::Link.to_string(), "link");
    }

    #[test]
    fn test_scope_contains() {
        assert!(Scope::ALWAYS.contains(Position::Link));
        assert!(Scope::IS_ENTRY.contains(Position::Single));
        assert!(Scope::IS_ENTRY.contains(Position::Source));
        assert!(!Scope::IS_ENTRY.contains(Position::Destination));
        assert!(Scope::IS_NOT_ENTRY.contains(Position::Destination));
        assert!(Scope::FORWARDING.contains(Position::Link));
        assert!(!Scope::FORWARDING.contains(Position::Single));
        assert_eq!(Scope::SINGLE | Scope::SOURCE, Scope::IS_ENTRY);
        assert!(!Scope::NONE.contains(Position::Single));
    }

    #[test]
    fn test_descriptor_applies() {
        let d = CheckpointDescriptor::new("d", Scope::FORWARDING, pass)
            .with_subject("posts")
            .with_methods(&["post"]);
        assert!(d.applies(Position::Source, Some("posts"), "POST"));
        assert!(!d.applies(Position::Source, Some("comments"), "POST"));
        assert!(!d.applies(Position::Source, Some("posts"), "GET"));
        assert!(!d.applies(Position::Destination, Some("posts"), "POST"));
        assert!(!d.applies(Position::Single, None, "POST"));
    }

    #[test]
    fn test_table_orders_by_priority_then_declaration() {
        let table = CheckpointTable::new()
            .with(CheckpointDescriptor::new("late", Scope::ALWAYS, pass).with_priority(10))
            .with(CheckpointDescriptor::new("first", Scope::ALWAYS, pass).with_priority(-1))
            .with(CheckpointDescriptor::new("a", Scope::ALWAYS, pass))
            .with(CheckpointDescriptor::new("b", Scope::ALWAYS, pass));
        let names: Vec<&str> = table.iter().map(CheckpointDescriptor::name).collect();
        assert_eq!(names, ["first", "a", "b", "late"]);
        assert_eq!(table.len(), 4);
    }

    #[tokio::test]
    async fn test_closure_checkpoint_runs() {
        let request = HttpRequest::builder().build();
        let args = PathArgs::new();
        let ctx = CheckpointContext {
            request: &request,
            endpoint: "users",
            position: Position::Single,
            subject: None,
            args: &args,
            depth: 0,
        };
        let d = CheckpointDescriptor::from_fn("deny", Scope::ALWAYS, |ctx| {
            Ok(Some(HttpResponse::forbidden(format!("no access to {}", ctx.endpoint))))
        });
        let response = d.run(&ctx).await.unwrap().unwrap();
        assert_eq!(response.status(), http::StatusCode::FORBIDDEN);
        assert_eq!(response.text(), "no access to users");
    }
}
