//! Core data types for the Accord dependency resolver.
//!
//! This crate defines the value types resolution is built from: versions and
//! version constraints, environment markers and environment snapshots,
//! requirements with their source descriptors, and concrete packages.
//!
//! This crate is intentionally free of network I/O and of the resolution
//! algorithm itself; both live behind the provider boundary in
//! `accord-resolver`.

pub mod constraint;
pub mod environment;
pub mod error;
pub mod marker;
pub mod package;
pub mod requirement;
pub mod version;

pub use constraint::VersionConstraint;
pub use environment::Environment;
pub use error::{InvalidSource, ParseError};
pub use marker::{Marker, MarkerKey, MarkerOp};
pub use package::Package;
pub use requirement::{Category, Requirement, Source, VcsKind, VcsReference};
pub use version::Version;
