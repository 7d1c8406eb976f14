//! Repository pool configuration.
//!
//! Validated before any resolution attempt: a project may declare at most
//! one default repository among its configured sources.

use serde::Serialize;

use crate::error::MultipleDefaultSources;

/// One configured package repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub url: String,
    /// Whether this repository is consulted first for registry requirements.
    pub default: bool,
}

impl RepositoryConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// The validated set of configured repositories.
#[derive(Debug, Clone, Default)]
pub struct RepositoryPool {
    repositories: Vec<RepositoryConfig>,
}

impl RepositoryPool {
    /// Validate and build a pool. More than one default repository is a
    /// configuration error, surfaced here rather than during resolution.
    pub fn new(repositories: Vec<RepositoryConfig>) -> Result<Self, MultipleDefaultSources> {
        let defaults: Vec<String> = repositories
            .iter()
            .filter(|r| r.default)
            .map(|r| r.name.clone())
            .collect();
        if defaults.len() > 1 {
            return Err(MultipleDefaultSources { names: defaults });
        }
        Ok(Self { repositories })
    }

    pub fn repositories(&self) -> &[RepositoryConfig] {
        &self.repositories
    }

    pub fn default_repository(&self) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.default)
    }

    pub fn lookup(&self, name: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.name == name)
    }
}
