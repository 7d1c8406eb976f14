//! Dependency resolution engine for Accord: conflict-driven version
//! solving over a provider boundary, with explainable failures.
//!
//! The entry point is [`solver::resolve`]: give it a root package, a
//! [`provider::Provider`], and [`solver::ResolveOptions`], and it returns a
//! [`resolution::Resolution`] (an ordered, lockable package set plus the
//! dependency graph) or a structured [`error::ResolveError`].

pub mod error;
pub mod graph;
pub mod incompatibility;
pub mod partial_solution;
pub mod pool;
pub mod provider;
pub mod report;
pub mod resolution;
pub mod solver;
pub mod term;

pub use error::{MultipleDefaultSources, ResolveError};
pub use provider::{MemoryProvider, Provider, ProviderError};
pub use resolution::{DependencyRef, Resolution, ResolvedPackage};
pub use solver::{resolve, CancelToken, ResolveOptions};
