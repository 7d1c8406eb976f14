//! The provider boundary: where candidate versions and package metadata
//! come from.
//!
//! The engine treats provider results as pure, memoizable functions of the
//! query. It never retries a failed call; a provider error surfaces as a
//! resolution failure naming the package.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use miette::Diagnostic;
use thiserror::Error;

use accord_core::{Package, Requirement, Source, VersionConstraint};

/// What went wrong inside a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The package is not known to any configured source.
    NotFound,
    /// Candidate versions were found but metadata could not be produced.
    Metadata,
    /// An underlying I/O or transport failure.
    Io,
}

/// A failed candidate or metadata query, naming the offending package.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("Failed to fetch {package}: {message}")]
#[diagnostic(help("Provider failures are not retried; check the package name and source"))]
pub struct ProviderError {
    pub package: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn not_found(package: impl Into<String>) -> Self {
        let package = package.into();
        Self {
            message: format!("no candidates for {package}"),
            package,
            kind: ProviderErrorKind::NotFound,
        }
    }

    pub fn metadata(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            kind: ProviderErrorKind::Metadata,
            message: message.into(),
        }
    }

    pub fn io(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            kind: ProviderErrorKind::Io,
            message: message.into(),
        }
    }
}

/// The capability the engine consumes: candidate enumeration and per-package
/// dependency metadata.
///
/// Results must be stable within one resolution run. `candidates` returns
/// newest-first; for non-registry sources it returns the single
/// source-pinned package and must not enumerate the registry.
pub trait Provider {
    fn candidates(
        &self,
        name: &str,
        source: &Source,
        constraint: &VersionConstraint,
        include_prereleases: bool,
    ) -> Result<Vec<Package>, ProviderError>;

    /// The package's own dependency list. Implementations memoize; repeated
    /// queries are expected to be cheap.
    fn metadata(&self, package: &Package) -> Result<Vec<Requirement>, ProviderError>;
}

/// Deterministic in-memory provider backed by pre-registered packages.
///
/// Useful for tests and for callers that pre-fetch all metadata. Registry
/// packages are keyed by name; source-pinned packages by source identity.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    registry: BTreeMap<String, Vec<Package>>,
    pinned: BTreeMap<String, Package>,
    /// Names queried against the registry, for assertions on lookup behavior.
    registry_queries: RefCell<HashSet<String>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a registry candidate.
    pub fn add_package(&mut self, package: Package) {
        self.registry
            .entry(package.name().to_string())
            .or_default()
            .push(package);
    }

    /// Register a package resolved from a non-registry source.
    pub fn add_pinned(&mut self, package: Package) {
        let identity = package
            .source_identity()
            .expect("pinned packages must carry a non-registry source");
        self.pinned.insert(identity, package);
    }

    /// Whether a registry enumeration was ever performed for `name`.
    pub fn queried_registry(&self, name: &str) -> bool {
        self.registry_queries.borrow().contains(name)
    }
}

impl Provider for MemoryProvider {
    fn candidates(
        &self,
        name: &str,
        source: &Source,
        constraint: &VersionConstraint,
        include_prereleases: bool,
    ) -> Result<Vec<Package>, ProviderError> {
        if let Some(identity) = source.identity() {
            let package = self
                .pinned
                .get(&identity)
                .ok_or_else(|| ProviderError::not_found(name))?;
            return Ok(vec![package.clone()]);
        }

        self.registry_queries.borrow_mut().insert(name.to_string());
        let mut matching: Vec<Package> = self
            .registry
            .get(name)
            .ok_or_else(|| ProviderError::not_found(name))?
            .iter()
            .filter(|p| {
                if include_prereleases {
                    constraint.allows_unrestricted(p.version())
                } else {
                    constraint.allows(p.version())
                }
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.version().cmp(a.version()));
        Ok(matching)
    }

    fn metadata(&self, package: &Package) -> Result<Vec<Requirement>, ProviderError> {
        // Packages carry their own requirement lists, so metadata is a
        // field access; nothing to memoize.
        Ok(package.requirements().to_vec())
    }
}
