//! URL rule compilation and routing.
//!
//! A rule string such as `/users/<int:id>/` is parsed into [`rule::RuleSegment`]s,
//! compiled into an anchored regex with one named group per variable, and
//! stored in a [`router::Router`] that keeps its rules ordered by specificity.
//!
//! ## Modules
//!
//! - [`args`] - Converter argument parsing (`<int(min=1):page>`)
//! - [`converters`] - Path converters and the converter registry
//! - [`rule`] - Rule parsing, compilation, matching and URL building
//! - [`router`] - The rule table and the resolve algorithm

pub mod args;
pub mod converters;
pub mod router;
pub mod rule;

pub use converters::{PathArgs, PathValue};
