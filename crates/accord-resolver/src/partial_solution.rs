//! The partial solution: the ordered assignment sequence built during
//! solving.
//!
//! Assignments are either decisions (the solver chose a version) or
//! derivations (unit propagation forced a term). The sequence, its decision
//! levels, and the per-package cumulative intersections drive propagation,
//! satisfier search, and backtracking.

use std::collections::{BTreeMap, HashMap};

use accord_core::{Version, VersionConstraint};

use crate::incompatibility::{Incompatibility, PackageKey};
use crate::term::{SetRelation, Term};

/// How the partial solution relates to an incompatibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// Every term is satisfied: the incompatibility is violated.
    Satisfied,
    /// Every term but one is satisfied; the remainder can be derived.
    AlmostSatisfied(PackageKey),
    /// Some term is contradicted; the incompatibility cannot apply.
    Contradicted(PackageKey),
    Inconclusive,
}

#[derive(Debug, Clone)]
pub enum AssignmentKind {
    Decision(Version),
    Derivation {
        term: Term,
        /// Index of the incompatibility that forced this derivation.
        cause: usize,
    },
}

/// One entry in the assignment sequence.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub key: PackageKey,
    pub kind: AssignmentKind,
    pub decision_level: u32,
    pub index: usize,
}

impl Assignment {
    pub fn term(&self) -> Term {
        match &self.kind {
            AssignmentKind::Decision(version) => Term::exactly(version.clone()),
            AssignmentKind::Derivation { term, .. } => term.clone(),
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self.kind, AssignmentKind::Decision(_))
    }

    pub fn cause(&self) -> Option<usize> {
        match &self.kind {
            AssignmentKind::Decision(_) => None,
            AssignmentKind::Derivation { cause, .. } => Some(*cause),
        }
    }
}

/// The engine's working state for one resolution run. Never shared across
/// runs.
#[derive(Debug, Default)]
pub struct PartialSolution {
    assignments: Vec<Assignment>,
    decisions: BTreeMap<PackageKey, Version>,
    /// Per-package intersection of all assigned terms.
    cumulative: HashMap<PackageKey, Term>,
    decision_level: u32,
}

impl PartialSolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decision_level(&self) -> u32 {
        self.decision_level
    }

    pub fn decisions(&self) -> &BTreeMap<PackageKey, Version> {
        &self.decisions
    }

    pub fn decision_for(&self, key: &PackageKey) -> Option<&Version> {
        self.decisions.get(key)
    }

    pub fn assignment(&self, index: usize) -> &Assignment {
        &self.assignments[index]
    }

    pub fn decide(&mut self, key: PackageKey, version: Version) {
        self.decision_level += 1;
        self.push(Assignment {
            key: key.clone(),
            kind: AssignmentKind::Decision(version.clone()),
            decision_level: self.decision_level,
            index: self.assignments.len(),
        });
        self.decisions.insert(key, version);
    }

    pub fn derive(&mut self, key: PackageKey, term: Term, cause: usize) {
        self.push(Assignment {
            key,
            kind: AssignmentKind::Derivation { term, cause },
            decision_level: self.decision_level,
            index: self.assignments.len(),
        });
    }

    fn push(&mut self, assignment: Assignment) {
        let term = assignment.term();
        self.cumulative
            .entry(assignment.key.clone())
            .and_modify(|cum| *cum = cum.intersect(&term))
            .or_insert(term);
        self.assignments.push(assignment);
    }

    /// Relation of one term to the current cumulative assignment for its
    /// package. Unassigned packages are overlapping (unknown).
    pub fn term_relation(&self, key: &PackageKey, term: &Term) -> SetRelation {
        match self.cumulative.get(key) {
            Some(cumulative) => cumulative.relation(term),
            None => SetRelation::Overlapping,
        }
    }

    /// Relation of the whole incompatibility to the current state.
    pub fn relation(&self, incompatibility: &Incompatibility) -> Relation {
        let mut unsatisfied: Option<&PackageKey> = None;
        for (key, term) in incompatibility.terms() {
            match self.term_relation(key, term) {
                SetRelation::Disjoint => return Relation::Contradicted(key.clone()),
                SetRelation::Overlapping => {
                    if unsatisfied.is_some() {
                        return Relation::Inconclusive;
                    }
                    unsatisfied = Some(key);
                }
                SetRelation::Subset => {}
            }
        }
        match unsatisfied {
            Some(key) => Relation::AlmostSatisfied(key.clone()),
            None => Relation::Satisfied,
        }
    }

    pub fn satisfies(&self, incompatibility: &Incompatibility) -> bool {
        self.relation(incompatibility) == Relation::Satisfied
    }

    /// The earliest assignment index at which the cumulative terms for
    /// `key` first satisfy `term`.
    ///
    /// Callers must only ask for terms the current solution satisfies.
    pub fn satisfier(&self, key: &PackageKey, term: &Term) -> usize {
        let mut accumulated: Option<Term> = None;
        for assignment in &self.assignments {
            if assignment.key != *key {
                continue;
            }
            let acc = match accumulated {
                None => assignment.term(),
                Some(prev) => prev.intersect(&assignment.term()),
            };
            if acc.satisfies(term) {
                return assignment.index;
            }
            accumulated = Some(acc);
        }
        unreachable!("satisfier requested for an unsatisfied term: {key} {term}")
    }

    /// Discard all assignments above `level` and rebuild derived state.
    pub fn backtrack(&mut self, level: u32) {
        self.assignments.retain(|a| a.decision_level <= level);
        self.decision_level = level;

        self.decisions.clear();
        self.cumulative.clear();
        for assignment in &self.assignments {
            if let AssignmentKind::Decision(version) = &assignment.kind {
                self.decisions
                    .insert(assignment.key.clone(), version.clone());
            }
            let term = assignment.term();
            self.cumulative
                .entry(assignment.key.clone())
                .and_modify(|cum| *cum = cum.intersect(&term))
                .or_insert(term);
        }
    }

    /// Packages with a positive cumulative term but no decision yet, with
    /// their current constraints, in deterministic key order.
    pub fn undecided_positive(&self) -> Vec<(PackageKey, VersionConstraint)> {
        let mut out: Vec<(PackageKey, VersionConstraint)> = self
            .cumulative
            .iter()
            .filter(|(key, term)| term.is_positive() && !self.decisions.contains_key(key))
            .map(|(key, term)| (key.clone(), term.constraint().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Number of derivations recorded for a package: the outstanding
    /// requirement count used by the decision heuristic.
    pub fn derivation_count(&self, key: &PackageKey) -> usize {
        self.assignments
            .iter()
            .filter(|a| a.key == *key && !a.is_decision())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(text: &str) -> VersionConstraint {
        VersionConstraint::parse(text).unwrap()
    }

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    fn key(name: &str) -> PackageKey {
        PackageKey::named(name, 0)
    }

    #[test]
    fn cumulative_intersection_tracks_terms() {
        let mut solution = PartialSolution::new();
        solution.derive(key("a"), Term::Positive(c("^1.0")), 0);
        solution.derive(key("a"), Term::Positive(c(">=1.2")), 1);

        let narrow = Term::Positive(c(">=1.2,<2.0"));
        assert_eq!(solution.term_relation(&key("a"), &narrow), SetRelation::Subset);

        let low = Term::Positive(c("<1.2"));
        assert_eq!(solution.term_relation(&key("a"), &low), SetRelation::Disjoint);
    }

    #[test]
    fn satisfier_finds_earliest_covering_assignment() {
        let mut solution = PartialSolution::new();
        solution.derive(key("a"), Term::Positive(c("^1.0")), 0);
        solution.derive(key("a"), Term::Positive(c(">=1.2")), 1);
        solution.decide(key("a"), v("1.3.0"));

        // The broad term is satisfied by the very first derivation.
        assert_eq!(solution.satisfier(&key("a"), &Term::Positive(c(">=1.0,<2.0"))), 0);
        // The narrow one only once both derivations are in place.
        assert_eq!(solution.satisfier(&key("a"), &Term::Positive(c(">=1.2,<2.0"))), 1);
        // The exact pin needs the decision itself.
        assert_eq!(solution.satisfier(&key("a"), &Term::Positive(c("==1.3.0"))), 2);
    }

    #[test]
    fn backtrack_rewinds_decisions_and_state() {
        let mut solution = PartialSolution::new();
        solution.decide(PackageKey::Root, v("1.0.0"));
        solution.derive(key("a"), Term::Positive(c("^1.0")), 0);
        solution.decide(key("a"), v("1.5.0"));
        solution.derive(key("b"), Term::Positive(c("^2.0")), 1);
        assert_eq!(solution.decision_level(), 2);

        solution.backtrack(1);
        assert_eq!(solution.decision_level(), 1);
        assert!(solution.decision_for(&key("a")).is_none());
        assert!(solution.decision_for(&PackageKey::Root).is_some());
        // The derivation for `a` made at level 1 survives.
        assert_eq!(solution.derivation_count(&key("a")), 1);
        // The derivation for `b` made at level 2 is gone.
        assert_eq!(solution.derivation_count(&key("b")), 0);
    }

    #[test]
    fn undecided_positive_is_sorted() {
        let mut solution = PartialSolution::new();
        solution.derive(key("zlib"), Term::Positive(c("^1.0")), 0);
        solution.derive(key("attrs"), Term::Positive(c("^20.0")), 1);
        solution.derive(key("gone"), Term::Negative(c("^1.0")), 2);

        let undecided = solution.undecided_positive();
        let names: Vec<&str> = undecided.iter().map(|(k, _)| k.name()).collect();
        assert_eq!(names, vec!["attrs", "zlib"]);
    }
}
