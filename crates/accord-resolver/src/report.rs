//! Failure explanation: derivation trees and their human-readable rendering.
//!
//! When solving terminates in an unrecoverable incompatibility, the chain of
//! incompatibilities that produced it is materialized into a tree of
//! external facts (dependency edges, missing versions, root requirements)
//! combined by derived conclusions, then rendered as an ordered
//! "because X and Y, Z" trail.

use std::fmt;

use crate::incompatibility::{Cause, Incompatibility};

/// The reasoning that led to a contradiction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivationTree {
    /// A fact independent of the solver's deductions.
    External { description: String },
    /// A conclusion obtained by resolving two prior incompatibilities.
    Derived {
        /// The conclusion, rendered from the derived incompatibility.
        statement: String,
        left: Box<DerivationTree>,
        right: Box<DerivationTree>,
    },
}

impl DerivationTree {
    /// Materialize the tree rooted at `index` from the incompatibility store.
    pub fn from_store(store: &[Incompatibility], index: usize) -> DerivationTree {
        let incompatibility = &store[index];
        match incompatibility.cause {
            Cause::Conflict { left, right } => DerivationTree::Derived {
                statement: incompatibility.to_string(),
                left: Box::new(DerivationTree::from_store(store, left)),
                right: Box::new(DerivationTree::from_store(store, right)),
            },
            _ => DerivationTree::External {
                description: incompatibility.to_string(),
            },
        }
    }

    /// The number of external facts in the tree.
    pub fn external_count(&self) -> usize {
        match self {
            DerivationTree::External { .. } => 1,
            DerivationTree::Derived { left, right, .. } => {
                left.external_count() + right.external_count()
            }
        }
    }

    /// Render the ordered derivation trail.
    pub fn report(&self) -> String {
        let mut reporter = Reporter::default();
        match self {
            DerivationTree::External { description } => {
                format!("Because {description}, version solving failed.")
            }
            DerivationTree::Derived { .. } => {
                reporter.explain(self, true);
                reporter.lines.join("\n")
            }
        }
    }
}

impl fmt::Display for DerivationTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

#[derive(Default)]
struct Reporter {
    lines: Vec<String>,
}

impl Reporter {
    /// Emit explanation lines for `tree`, returning the phrase later steps
    /// use to refer to its conclusion.
    fn explain(&mut self, tree: &DerivationTree, is_final: bool) -> String {
        match tree {
            DerivationTree::External { description } => description.clone(),
            DerivationTree::Derived {
                statement,
                left,
                right,
            } => {
                let left_phrase = self.explain(left, false);
                let right_phrase = self.explain(right, false);
                let conclusion = if is_final {
                    "version solving failed".to_string()
                } else {
                    statement.clone()
                };
                let connective = if self.lines.is_empty() {
                    "Because"
                } else {
                    "And because"
                };
                self.lines.push(format!(
                    "{connective} {left_phrase} and {right_phrase}, {conclusion}."
                ));
                let line = self.lines.len();
                format!("{statement} ({line})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn external(description: &str) -> DerivationTree {
        DerivationTree::External {
            description: description.to_string(),
        }
    }

    #[test]
    fn single_external_failure() {
        let tree = external("root depends on cleo (>=0.7,<0.8)");
        assert_eq!(
            tree.report(),
            "Because root depends on cleo (>=0.7,<0.8), version solving failed."
        );
    }

    #[test]
    fn two_step_chain() {
        let tree = DerivationTree::Derived {
            statement: "root cannot be used".to_string(),
            left: Box::new(external("root depends on demo (>=1.2,<2.0)")),
            right: Box::new(external("root depends on demo (>=2.0,<3.0)")),
        };
        assert_eq!(
            tree.report(),
            "Because root depends on demo (>=1.2,<2.0) and root depends on demo (>=2.0,<3.0), version solving failed."
        );
        assert_eq!(tree.external_count(), 2);
    }

    #[test]
    fn nested_chain_references_earlier_lines() {
        let inner = DerivationTree::Derived {
            statement: "demo (any version) requires shared (>=2.0)".to_string(),
            left: Box::new(external("root depends on demo (any version)")),
            right: Box::new(external("demo ==1.0.0 depends on shared (>=2.0)")),
        };
        let tree = DerivationTree::Derived {
            statement: "root cannot be used".to_string(),
            left: Box::new(inner),
            right: Box::new(external("no versions of shared match >=2.0")),
        };
        let report = tree.report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Because root depends on demo"));
        assert!(lines[1].contains("demo (any version) requires shared (>=2.0) (1)"));
        assert!(lines[1].ends_with("version solving failed."));
    }
}
