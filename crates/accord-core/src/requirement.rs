//! Requirements: a named reference to a package plus everything that scopes
//! how it may be satisfied.
//!
//! A requirement carries a version constraint, an environment marker, a
//! requested extras set, and a source descriptor. Non-registry sources pin
//! by source identity instead of by version and therefore carry the `any`
//! constraint.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use url::Url;

use crate::constraint::VersionConstraint;
use crate::error::{InvalidSource, ParseError};
use crate::marker::Marker;

/// Dependency category: regular or development-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Main,
    Dev,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Main => f.write_str("main"),
            Category::Dev => f.write_str("dev"),
        }
    }
}

/// Version control system kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcsKind::Git => f.write_str("git"),
        }
    }
}

/// The checkout reference of a VCS source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsReference {
    Branch(String),
    Tag(String),
    Rev(String),
}

impl VcsReference {
    pub fn kind(&self) -> &'static str {
        match self {
            VcsReference::Branch(_) => "branch",
            VcsReference::Tag(_) => "tag",
            VcsReference::Rev(_) => "rev",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            VcsReference::Branch(v) | VcsReference::Tag(v) | VcsReference::Rev(v) => v,
        }
    }
}

/// Where a requirement may be satisfied from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    /// The configured package registry; candidates are enumerated by version.
    Registry,
    /// A version-control checkout pinned to a branch, tag, or revision.
    Vcs {
        kind: VcsKind,
        url: String,
        reference: VcsReference,
    },
    /// A direct artifact URL.
    Url { url: String },
    /// A local project directory, optionally installed in develop mode.
    Directory { path: PathBuf, develop: bool },
    /// A local artifact file.
    File { path: PathBuf },
}

impl Source {
    /// The pin string identifying a non-registry source. Registry sources
    /// are identified by name and version instead.
    pub fn identity(&self) -> Option<String> {
        match self {
            Source::Registry => None,
            Source::Vcs {
                kind,
                url,
                reference,
            } => Some(format!("{kind}+{url}@{}", reference.value())),
            Source::Url { url } => Some(url.clone()),
            Source::Directory { path, .. } => Some(path.display().to_string()),
            Source::File { path } => Some(path.display().to_string()),
        }
    }
}

/// A single declared dependency edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Requirement {
    /// Normalized package name (lowercase, `_` and `.` folded to `-`).
    pub name: String,
    pub constraint: VersionConstraint,
    /// The constraint as the user wrote it, for display.
    pub pretty_constraint: String,
    pub marker: Marker,
    pub extras: BTreeSet<String>,
    pub optional: bool,
    pub category: Category,
    pub source: Source,
    /// Whether pre-release candidates may satisfy this requirement.
    pub allows_prereleases: bool,
}

/// Canonical package name form used for all lookups.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .replace(['_', '.'], "-")
}

impl Requirement {
    /// A registry requirement from constraint text such as `^1.2` or `*`.
    pub fn registry(name: &str, constraint: &str) -> Result<Self, ParseError> {
        Ok(Self {
            name: normalize_name(name),
            constraint: VersionConstraint::parse(constraint)?,
            pretty_constraint: constraint.trim().to_string(),
            marker: Marker::True,
            extras: BTreeSet::new(),
            optional: false,
            category: Category::Main,
            source: Source::Registry,
            allows_prereleases: false,
        })
    }

    /// A registry requirement from an already-built constraint.
    pub fn new(name: &str, constraint: VersionConstraint) -> Self {
        let pretty_constraint = constraint.to_string();
        Self {
            name: normalize_name(name),
            constraint,
            pretty_constraint,
            marker: Marker::True,
            extras: BTreeSet::new(),
            optional: false,
            category: Category::Main,
            source: Source::Registry,
            allows_prereleases: false,
        }
    }

    /// A VCS-pinned requirement. The constraint is `any`; the checkout
    /// reference is the pin.
    pub fn vcs(name: &str, kind: VcsKind, url: &str, reference: VcsReference) -> Self {
        let pretty_constraint = format!("{} {}", reference.kind(), reference.value());
        Self {
            name: normalize_name(name),
            constraint: VersionConstraint::any(),
            pretty_constraint,
            marker: Marker::True,
            extras: BTreeSet::new(),
            optional: false,
            category: Category::Main,
            source: Source::Vcs {
                kind,
                url: url.to_string(),
                reference,
            },
            allows_prereleases: true,
        }
    }

    /// A requirement satisfied by a direct artifact URL.
    ///
    /// The URL must be absolute, with a scheme and a host.
    pub fn url(name: &str, url: &str) -> Result<Self, InvalidSource> {
        let parsed = Url::parse(url)
            .map_err(|e| InvalidSource::new(url, format!("not a valid URL: {e}")))?;
        if parsed.host_str().is_none() {
            return Err(InvalidSource::new(url, "URL has no host"));
        }
        Ok(Self {
            name: normalize_name(name),
            constraint: VersionConstraint::any(),
            pretty_constraint: "*".to_string(),
            marker: Marker::True,
            extras: BTreeSet::new(),
            optional: false,
            category: Category::Main,
            source: Source::Url {
                url: url.to_string(),
            },
            allows_prereleases: true,
        })
    }

    /// A requirement satisfied by a local project directory.
    ///
    /// Relative paths resolve against `project_root`; the directory must
    /// exist when the requirement is constructed.
    pub fn directory(
        name: &str,
        path: &Path,
        project_root: &Path,
        develop: bool,
    ) -> Result<Self, InvalidSource> {
        let resolved = resolve_path(path, project_root);
        if !resolved.is_dir() {
            return Err(InvalidSource::new(
                resolved.display().to_string(),
                "directory does not exist",
            ));
        }
        Ok(Self {
            name: normalize_name(name),
            constraint: VersionConstraint::any(),
            pretty_constraint: "*".to_string(),
            marker: Marker::True,
            extras: BTreeSet::new(),
            optional: false,
            category: Category::Main,
            source: Source::Directory {
                path: resolved,
                develop,
            },
            allows_prereleases: true,
        })
    }

    /// A requirement satisfied by a local artifact file.
    pub fn file(name: &str, path: &Path, project_root: &Path) -> Result<Self, InvalidSource> {
        let resolved = resolve_path(path, project_root);
        if !resolved.is_file() {
            return Err(InvalidSource::new(
                resolved.display().to_string(),
                "file does not exist",
            ));
        }
        Ok(Self {
            name: normalize_name(name),
            constraint: VersionConstraint::any(),
            pretty_constraint: "*".to_string(),
            marker: Marker::True,
            extras: BTreeSet::new(),
            optional: false,
            category: Category::Main,
            source: Source::File { path: resolved },
            allows_prereleases: true,
        })
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_extras<I, S>(mut self, extras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extras = extras.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_prereleases(mut self, allow: bool) -> Self {
        self.allows_prereleases = allow;
        self
    }

    pub fn is_registry(&self) -> bool {
        matches!(self.source, Source::Registry)
    }

    pub fn is_vcs(&self) -> bool {
        matches!(self.source, Source::Vcs { .. })
    }

    pub fn is_url(&self) -> bool {
        matches!(self.source, Source::Url { .. })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.source, Source::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.source, Source::File { .. })
    }

    pub fn source_identity(&self) -> Option<String> {
        self.source.identity()
    }

    /// Whether this requirement applies in the given environment.
    pub fn applies_to(&self, env: &crate::environment::Environment) -> bool {
        self.marker.evaluate(env)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.pretty_constraint)?;
        if !matches!(self.marker, Marker::True) {
            write!(f, " ; {}", self.marker)?;
        }
        Ok(())
    }
}

fn resolve_path(path: &Path, project_root: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

/// Whether a set of same-name variants has pairwise-disjoint markers.
///
/// A multi-constraint dependency is only well-formed when at most one
/// variant can apply in any environment.
pub fn variants_are_disjoint(variants: &[Requirement]) -> bool {
    for (i, a) in variants.iter().enumerate() {
        for b in &variants[i + 1..] {
            if !a.marker.is_disjoint(&b.marker) {
                return false;
            }
        }
    }
    true
}

/// The union of the variants' markers, for coverage checks: environments
/// outside the union get no variant at all.
pub fn variants_marker_union(variants: &[Requirement]) -> Marker {
    variants
        .iter()
        .fold(Marker::False, |acc, r| acc.or(&r.marker))
}
