//! # hypr-rs-providers
//!
//! Providers, checkpoints and propagation on top of the hypr-rs router, and
//! the application that serves them over HTTP.
//!
//! ## Modules
//!
//! - [`provider`] - The `Provider` trait and the replies providers return
//! - [`checkpoint`] - Positions, scopes and checkpoint tables
//! - [`propagation`] - Bindings allowing one provider to forward to another
//! - [`dispatch`] - Chain resolution and checkpoint firing
//! - [`server`] - `HyprApp`, its builder and the Axum integration

pub mod checkpoint;
pub mod dispatch;
pub mod propagation;
pub mod provider;
pub mod server;

pub use checkpoint::{
    Checkpoint, CheckpointContext, CheckpointDescriptor, CheckpointTable, Position, Scope,
};
pub use dispatch::{Dispatcher, Hop};
pub use propagation::{PropagationBinding, PropagationTable};
pub use provider::{Provider, Reply};
pub use server::{HyprApp, HyprAppBuilder, ProviderOptions};
