//! Incompatibilities: sets of terms that cannot all hold at once.
//!
//! The unit of conflict-driven solving. External incompatibilities come from
//! root requirements, dependency edges, and empty candidate sets; derived
//! ones are produced by resolving two incompatibilities against each other
//! during conflict resolution.

use std::collections::BTreeMap;
use std::fmt;

use crate::term::Term;

/// Identity of a package inside one resolution run.
///
/// `partition` separates marker-scoped variants of the same name: variants
/// with pairwise-disjoint markers occupy distinct partitions, never interact,
/// and may coexist in a solution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackageKey {
    /// The synthetic package standing for the project being resolved.
    Root,
    Named { name: String, partition: u32 },
}

impl PackageKey {
    pub fn named(name: impl Into<String>, partition: u32) -> Self {
        PackageKey::Named {
            name: name.into(),
            partition,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PackageKey::Root => "root",
            PackageKey::Named { name, .. } => name,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, PackageKey::Root)
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why an incompatibility holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    /// The root requirements must all be satisfied.
    Root,
    /// A package at a version requires another package.
    Dependency {
        depender: PackageKey,
        dependency: PackageKey,
    },
    /// No candidate matched the constraint.
    NoVersions,
    /// Derived by resolving two prior incompatibilities; indices into the
    /// solver's incompatibility store.
    Conflict { left: usize, right: usize },
}

/// A minimal set of terms that cannot all be satisfied simultaneously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incompatibility {
    terms: BTreeMap<PackageKey, Term>,
    pub cause: Cause,
}

impl Incompatibility {
    pub fn new(terms: BTreeMap<PackageKey, Term>, cause: Cause) -> Self {
        Self { terms, cause }
    }

    /// The incompatibility `{depender at version, not dependency}`.
    pub fn dependency(
        depender: PackageKey,
        depender_term: Term,
        dependency: PackageKey,
        dependency_constraint: accord_core::VersionConstraint,
    ) -> Self {
        let mut terms = BTreeMap::new();
        let cause = Cause::Dependency {
            depender: depender.clone(),
            dependency: dependency.clone(),
        };
        terms.insert(depender, depender_term);
        terms.insert(dependency, Term::Negative(dependency_constraint));
        Self { terms, cause }
    }

    /// No candidate of `package` matches `constraint`.
    pub fn no_versions(package: PackageKey, constraint: accord_core::VersionConstraint) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(package, Term::Positive(constraint));
        Self {
            terms,
            cause: Cause::NoVersions,
        }
    }

    pub fn terms(&self) -> &BTreeMap<PackageKey, Term> {
        &self.terms
    }

    pub fn term_for(&self, key: &PackageKey) -> Option<&Term> {
        self.terms.get(key)
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.cause, Cause::Conflict { .. })
    }

    /// An incompatibility that can never be escaped: either unconditionally
    /// false, or a positive statement about the root alone.
    pub fn is_failure(&self) -> bool {
        match self.terms.len() {
            0 => true,
            1 => {
                let (key, term) = self.terms.iter().next().unwrap();
                key.is_root() && term.is_positive()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Cause::Root => f.write_str("the root requirements must be satisfied"),
            Cause::Dependency {
                depender,
                dependency,
            } => {
                let depender_term = self.terms.get(depender);
                let dependency_term = self.terms.get(dependency);
                match (depender_term, dependency_term) {
                    (Some(dt), Some(Term::Negative(needed))) => {
                        if depender.is_root() {
                            write!(f, "root depends on {dependency} ({needed})")
                        } else {
                            write!(
                                f,
                                "{depender} {} depends on {dependency} ({needed})",
                                dt.constraint()
                            )
                        }
                    }
                    _ => write!(f, "{depender} depends on {dependency}"),
                }
            }
            Cause::NoVersions => {
                let (key, term) = self.terms.iter().next().expect("no-versions term");
                write!(f, "no versions of {key} match {}", term.constraint())
            }
            Cause::Conflict { .. } => {
                if self.terms.is_empty() {
                    return f.write_str("version solving failed");
                }
                let positives: Vec<String> = self
                    .terms
                    .iter()
                    .filter(|(_, t)| t.is_positive())
                    .map(|(k, t)| format_positive(k, t))
                    .collect();
                let negatives: Vec<String> = self
                    .terms
                    .iter()
                    .filter(|(_, t)| !t.is_positive())
                    .map(|(k, t)| format!("{k} ({})", t.constraint()))
                    .collect();
                match (positives.is_empty(), negatives.is_empty()) {
                    (false, false) => write!(
                        f,
                        "{} requires {}",
                        positives.join(" and "),
                        negatives.join(" and ")
                    ),
                    (false, true) => {
                        write!(f, "{} cannot be used", positives.join(" and "))
                    }
                    (true, false) => {
                        write!(f, "{} is required", negatives.join(" and "))
                    }
                    (true, true) => f.write_str("version solving failed"),
                }
            }
        }
    }
}

fn format_positive(key: &PackageKey, term: &Term) -> String {
    if key.is_root() {
        "root".to_string()
    } else if term.constraint().is_any() {
        format!("{key} (any version)")
    } else {
        format!("{key} ({})", term.constraint())
    }
}
