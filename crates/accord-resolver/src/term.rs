//! Terms: positive or negative statements about a package's selection.
//!
//! A positive term asserts the package is selected at a version inside its
//! constraint; a negative term asserts it is not (either unselected, or
//! selected outside the constraint). Incompatibilities and assignments are
//! both built from terms.

use std::fmt;

use accord_core::VersionConstraint;

/// How one term's solution set relates to another's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetRelation {
    /// Every selection satisfying `self` also satisfies `other`.
    Subset,
    /// No selection satisfies both.
    Disjoint,
    /// Some selections satisfy both, some only one.
    Overlapping,
}

/// A statement about a single package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Positive(VersionConstraint),
    Negative(VersionConstraint),
}

impl Term {
    pub fn exactly(version: accord_core::Version) -> Term {
        Term::Positive(VersionConstraint::exact(version))
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Term::Positive(_))
    }

    pub fn constraint(&self) -> &VersionConstraint {
        match self {
            Term::Positive(c) | Term::Negative(c) => c,
        }
    }

    pub fn negate(&self) -> Term {
        match self {
            Term::Positive(c) => Term::Negative(c.clone()),
            Term::Negative(c) => Term::Positive(c.clone()),
        }
    }

    /// The strongest statement implied by both terms together.
    pub fn intersect(&self, other: &Term) -> Term {
        match (self, other) {
            (Term::Positive(a), Term::Positive(b)) => Term::Positive(a.intersect(b)),
            (Term::Positive(a), Term::Negative(b)) => Term::Positive(a.difference(b)),
            (Term::Negative(a), Term::Positive(b)) => Term::Positive(b.difference(a)),
            (Term::Negative(a), Term::Negative(b)) => Term::Negative(a.union(b)),
        }
    }

    /// The part of `self` not covered by `other`.
    pub fn difference(&self, other: &Term) -> Term {
        self.intersect(&other.negate())
    }

    /// Relation of `self`'s solution set to `other`'s.
    pub fn relation(&self, other: &Term) -> SetRelation {
        match (self, other) {
            (Term::Positive(s), Term::Positive(o)) => {
                if o.allows_all(s) {
                    SetRelation::Subset
                } else if !s.allows_any(o) {
                    SetRelation::Disjoint
                } else {
                    SetRelation::Overlapping
                }
            }
            (Term::Negative(s), Term::Positive(o)) => {
                if s.allows_all(o) {
                    SetRelation::Disjoint
                } else {
                    SetRelation::Overlapping
                }
            }
            (Term::Positive(s), Term::Negative(o)) => {
                if !o.allows_any(s) {
                    SetRelation::Subset
                } else if o.allows_all(s) {
                    SetRelation::Disjoint
                } else {
                    SetRelation::Overlapping
                }
            }
            (Term::Negative(s), Term::Negative(o)) => {
                if s.allows_all(o) {
                    SetRelation::Subset
                } else {
                    SetRelation::Overlapping
                }
            }
        }
    }

    /// Whether every selection satisfying `self` satisfies `other`.
    pub fn satisfies(&self, other: &Term) -> bool {
        self.relation(other) == SetRelation::Subset
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Positive(c) => write!(f, "{c}"),
            Term::Negative(c) => write!(f, "not {c}"),
        }
    }
}
