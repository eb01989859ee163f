//! The dispatch protocol.
//!
//! Dispatch happens in two steps. [`Dispatcher::resolve_chain`] turns a path
//! into the chain of providers it traverses, following propagation rules and
//! their bindings. [`Dispatcher::run`] then fires the checkpoints of every hop
//! in chain order and, unless one of them aborts, calls the last provider.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use hypr_rs_core::{HyprError, HyprResult};
use hypr_rs_http::urls::router::{base_endpoint, Router, REMNANT};
use hypr_rs_http::{HttpRequest, PathArgs};

use crate::checkpoint::{CheckpointContext, CheckpointTable, Position};
use crate::propagation::PropagationTable;
use crate::provider::{Provider, Reply};

/// One provider of a dispatch chain.
pub struct Hop {
    /// The endpoint the provider was registered under.
    pub endpoint: String,
    /// The provider instance.
    pub provider: Arc<dyn Provider>,
    /// The variables captured by this hop, without the remnant.
    pub variables: PathArgs,
    /// The place of the hop in the chain.
    pub position: Position,
}

impl fmt::Debug for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hop")
            .field("endpoint", &self.endpoint)
            .field("variables", &self.variables)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// Borrowed view of the routing state needed to dispatch a request.
#[derive(Clone, Copy)]
pub struct Dispatcher<'a> {
    router: &'a Router<dyn Provider>,
    propagation: &'a PropagationTable,
    checkpoints: &'a HashMap<String, CheckpointTable>,
    max_depth: usize,
}

impl<'a> Dispatcher<'a> {
    /// Creates a dispatcher. `max_depth` bounds the number of hops.
    pub const fn new(
        router: &'a Router<dyn Provider>,
        propagation: &'a PropagationTable,
        checkpoints: &'a HashMap<String, CheckpointTable>,
        max_depth: usize,
    ) -> Self {
        Self {
            router,
            propagation,
            checkpoints,
            max_depth,
        }
    }

    /// Resolves `path` into the chain of providers it traverses.
    ///
    /// # Errors
    ///
    /// Any routing error of the top-level path. For forwarded paths:
    /// [`HyprError::NotFound`] when no binding covers the resolved target,
    /// [`HyprError::MethodNotAllowed`] when the binding excludes the method,
    /// [`HyprError::TemporaryRedirect`] to `path/` when the target wants a
    /// trailing slash, and [`HyprError::BadRequest`] beyond the depth limit.
    pub fn resolve_chain(&self, path: &str, method: &str) -> HyprResult<Vec<Hop>> {
        let mut hops = Vec::new();
        let mut current = self.router.resolve(path, method)?;

        loop {
            let endpoint = base_endpoint(current.endpoint()).to_string();
            let mut variables = current.variables;
            let remnant = variables
                .remove(REMNANT)
                .and_then(|v| v.as_str().map(str::to_string));
            hops.push(Hop {
                endpoint,
                provider: current.handler,
                variables,
                position: Position::Single,
            });

            let Some(remnant) = remnant else {
                break;
            };
            if hops.len() >= self.max_depth {
                return Err(HyprError::BadRequest(format!(
                    "propagation deeper than {} providers",
                    self.max_depth
                )));
            }

            let next_path = format!("/{remnant}");
            let next = match self.router.resolve(&next_path, method) {
                Ok(next) => next,
                Err(HyprError::TemporaryRedirect(_)) => {
                    return Err(HyprError::TemporaryRedirect(format!("{path}/")));
                }
                Err(HyprError::NotFound(_)) => return Err(HyprError::NotFound(path.to_string())),
                Err(e) => return Err(e),
            };

            let source = hops.last().map_or("", |h| h.endpoint.as_str());
            let target = base_endpoint(next.endpoint());
            let Some(binding) = self.propagation.find(source, target, &next_path) else {
                tracing::debug!(source, target, next_path = %next_path, "no propagation binding");
                return Err(HyprError::NotFound(path.to_string()));
            };
            if !binding.allows(method) {
                return Err(HyprError::MethodNotAllowed {
                    method: method.to_string(),
                    allowed: binding
                        .methods()
                        .map(|m| m.iter().cloned().collect())
                        .unwrap_or_default(),
                });
            }
            current = next;
        }

        let len = hops.len();
        for (index, hop) in hops.iter_mut().enumerate() {
            hop.position = Position::of(index, len);
        }
        Ok(hops)
    }

    /// Fires the checkpoints of `chain` and calls its last provider.
    ///
    /// A checkpoint returning a response ends dispatch with that response; a
    /// checkpoint error ends it with the error. The terminal provider receives
    /// the variables of every hop, inner hops winning on name clashes.
    ///
    /// # Errors
    ///
    /// Returns the first checkpoint error or the provider's error.
    pub async fn run(&self, chain: &[Hop], request: &HttpRequest) -> HyprResult<Reply> {
        let method = request.method().as_str();

        for (index, hop) in chain.iter().enumerate() {
            let Some(table) = self.checkpoints.get(&hop.endpoint) else {
                continue;
            };
            let subject = match hop.position {
                Position::Single => None,
                Position::Source | Position::Link => chain.get(index + 1),
                Position::Destination => index.checked_sub(1).and_then(|i| chain.get(i)),
            }
            .map(|h| h.endpoint.as_str());

            let ctx = CheckpointContext {
                request,
                endpoint: &hop.endpoint,
                position: hop.position,
                subject,
                args: &hop.variables,
                depth: index,
            };
            for descriptor in table.select(hop.position, subject, method) {
                match descriptor.run(&ctx).await {
                    Ok(None) => {}
                    Ok(Some(response)) => {
                        tracing::info!(
                            endpoint = %hop.endpoint,
                            checkpoint = descriptor.name(),
                            status = %response.status(),
                            "checkpoint answered early"
                        );
                        return Ok(Reply::Response(response));
                    }
                    Err(e) => {
                        tracing::info!(
                            endpoint = %hop.endpoint,
                            checkpoint = descriptor.name(),
                            error = %e,
                            "checkpoint aborted dispatch"
                        );
                        return Err(e);
                    }
                }
            }
        }

        let Some(last) = chain.last() else {
            return Err(HyprError::NotFound(request.path().to_string()));
        };
        let mut args = PathArgs::new();
        for hop in chain {
            args.extend(hop.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        last.provider.dispatch(request, &args).await
    }

    /// Resolves the request path and runs the resulting chain.
    ///
    /// # Errors
    ///
    /// See [`resolve_chain`](Self::resolve_chain) and [`run`](Self::run).
    pub async fn dispatch(&self, request: &HttpRequest) -> HyprResult<Reply> {
        let chain = self.resolve_chain(request.path(), request.method().as_str())?;
        self.run(&chain, request).await
    }
}
