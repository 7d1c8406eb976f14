//! Resolution failure taxonomy.
//!
//! Every error carries enough structured context to render a precise
//! diagnostic without re-deriving it.

use miette::Diagnostic;
use thiserror::Error;

use accord_core::{InvalidSource, ParseError};

use crate::provider::ProviderError;
use crate::report::DerivationTree;

/// More than one configured repository is marked as the default.
///
/// A configuration-time error, surfaced before any resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("Only one repository can be the default, found: {}", .names.join(", "))]
#[diagnostic(help("Unmark the extra default repositories in the project configuration"))]
pub struct MultipleDefaultSources {
    pub names: Vec<String>,
}

/// Why a resolution run failed.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    /// No assignment satisfies the root requirements. Carries the full
    /// derivation chain from the root incompatibilities to the
    /// contradiction.
    #[error("No solution found:\n{}", .derivation.report())]
    #[diagnostic(help("The derivation chain shows which requirements conflict"))]
    Unsatisfiable { derivation: DerivationTree },

    /// The step or wall-clock budget ran out before an answer was reached.
    /// Distinct from `Unsatisfiable`: a solution may still exist.
    #[error("Resolution aborted after {steps} steps ({elapsed_ms} ms); the budget was exhausted")]
    #[diagnostic(help("Raise the step or time budget, or relax the constraints"))]
    Timeout { steps: u64, elapsed_ms: u128 },

    /// The caller cancelled the run via its cancellation token.
    #[error("Resolution cancelled")]
    Cancelled,

    /// A candidate or metadata query failed; never retried by the engine.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Provider(#[from] ProviderError),

    /// A requirement asked for an extra the resolved package does not define.
    #[error("Package {package} has no extra named `{extra}`")]
    #[diagnostic(help("Check the extras offered by the package's metadata"))]
    UnknownExtra { package: String, extra: String },

    /// Invalid repository configuration, detected before solving.
    #[error(transparent)]
    #[diagnostic(transparent)]
    MultipleDefaultSources(#[from] MultipleDefaultSources),

    /// Malformed version or marker text encountered while translating
    /// requirements.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    /// A requirement source that could not be constructed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidSource(#[from] InvalidSource),
}

impl ResolveError {
    /// The derivation chain, when this failure is an unsatisfiability.
    pub fn derivation(&self) -> Option<&DerivationTree> {
        match self {
            ResolveError::Unsatisfiable { derivation } => Some(derivation),
            _ => None,
        }
    }
}
