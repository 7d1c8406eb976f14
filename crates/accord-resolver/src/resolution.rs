//! The resolved set: the payload a lock file persists.

use std::collections::BTreeSet;

use serde::Serialize;

use accord_core::{Category, Marker, Source, Version, VersionConstraint};

use crate::graph::DependencyGraph;

/// A dependency edge of a resolved package, by name and constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyRef {
    pub name: String,
    pub constraint: VersionConstraint,
}

/// One selected package with everything needed to reinstall it exactly.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: Version,
    pub source: Source,
    /// The marker scope under which this selection applies.
    pub marker: Marker,
    pub category: Category,
    /// Extras activated on this package by its dependers.
    pub extras: BTreeSet<String>,
    /// Content hash supplied by the provider, when available.
    pub hash: Option<String>,
    pub dependencies: Vec<DependencyRef>,
}

impl ResolvedPackage {
    /// The pin string for non-registry sources.
    pub fn source_identity(&self) -> Option<String> {
        self.source.identity()
    }
}

/// The output of a successful resolution: an ordered, reproducible package
/// set plus the dependency graph over it.
#[derive(Debug, Serialize)]
pub struct Resolution {
    /// Selected packages, ordered by name (then marker partition).
    pub packages: Vec<ResolvedPackage>,
    #[serde(skip)]
    pub graph: DependencyGraph,
    /// Modeling problems noticed on the way: overlapping multi-constraint
    /// markers, marker coverage gaps, conflicting source pins.
    pub warnings: Vec<String>,
}

impl Resolution {
    /// The first resolved entry for a package name.
    pub fn package(&self, name: &str) -> Option<&ResolvedPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// All resolved entries for a name (one per marker partition).
    pub fn packages_named(&self, name: &str) -> Vec<&ResolvedPackage> {
        self.packages.iter().filter(|p| p.name == name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.package(name).is_some()
    }
}
