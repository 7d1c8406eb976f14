//! Concrete, resolvable packages.
//!
//! A `Package` is one node the resolver may select: a name at a version (or
//! at a source identity for non-registry sources), its own dependency list,
//! and the extras map. Descriptive metadata (description, classifiers) is
//! inert and never influences resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::marker::Marker;
use crate::requirement::{normalize_name, Requirement, Source};
use crate::version::Version;

/// An immutable description of one concrete resolvable unit.
#[derive(Debug, Clone, Serialize)]
pub struct Package {
    name: String,
    version: Version,
    source: Source,
    requirements: Vec<Requirement>,
    /// Extra name to the names of the requirements it activates.
    extras: BTreeMap<String, Vec<String>>,
    /// Content hash supplied by the provider, carried into the lock payload.
    hash: Option<String>,
    description: Option<String>,
    classifiers: Vec<String>,
}

impl Package {
    pub fn new(name: &str, version: Version) -> Self {
        Self {
            name: normalize_name(name),
            version,
            source: Source::Registry,
            requirements: Vec::new(),
            extras: BTreeMap::new(),
            hash: None,
            description: None,
            classifiers: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn with_requirements<I>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = Requirement>,
    {
        self.requirements.extend(requirements);
        self
    }

    /// Register an extra activating the named requirements.
    pub fn with_extra<I, S>(mut self, extra: &str, requirement_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extras.insert(
            extra.to_string(),
            requirement_names
                .into_iter()
                .map(|n| normalize_name(n.as_ref()))
                .collect(),
        );
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_classifiers<I, S>(mut self, classifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classifiers = classifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn extras(&self) -> &BTreeMap<String, Vec<String>> {
        &self.extras
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn classifiers(&self) -> &[String] {
        &self.classifiers
    }

    pub fn is_registry(&self) -> bool {
        matches!(self.source, Source::Registry)
    }

    /// The pin string for non-registry sources.
    pub fn source_identity(&self) -> Option<String> {
        self.source.identity()
    }

    /// The dependency list active under the given requested extras.
    ///
    /// Optional requirements are included only when an extra activates them;
    /// `extra == "..."` marker predicates are partially evaluated against the
    /// request. Requesting an extra this package does not define returns the
    /// unknown extra's name as the error.
    pub fn active_requirements(
        &self,
        extras: &BTreeSet<String>,
    ) -> Result<Vec<Requirement>, String> {
        self.select_requirements(&self.requirements, extras)
    }

    /// Like [`active_requirements`](Self::active_requirements), but over an
    /// externally-supplied requirement list (e.g. provider metadata), using
    /// this package's extras map for activation.
    pub fn select_requirements(
        &self,
        requirements: &[Requirement],
        extras: &BTreeSet<String>,
    ) -> Result<Vec<Requirement>, String> {
        let mut activated: BTreeSet<&str> = BTreeSet::new();
        for extra in extras {
            match self.extras.get(extra) {
                Some(names) => activated.extend(names.iter().map(String::as_str)),
                None => return Err(extra.clone()),
            }
        }

        let mut active = Vec::new();
        for requirement in requirements {
            if requirement.optional && !activated.contains(requirement.name.as_str()) {
                continue;
            }
            let marker = requirement.marker.resolve_extras(extras);
            if matches!(marker, Marker::False) {
                continue;
            }
            let mut requirement = requirement.clone();
            requirement.marker = marker;
            active.push(requirement);
        }
        Ok(active)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.source_identity() == other.source_identity()
    }
}

impl Eq for Package {}

impl Hash for Package {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
        self.source_identity().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn extras_pull_exactly_their_subset() {
        let package = Package::new("requests", v("2.18.4"))
            .with_requirement(Requirement::registry("idna", ">=2.5,<2.7").unwrap())
            .with_requirement(
                Requirement::registry("cryptography", ">=1.3.4")
                    .unwrap()
                    .with_optional(true),
            )
            .with_requirement(
                Requirement::registry("pyopenssl", ">=0.14")
                    .unwrap()
                    .with_optional(true),
            )
            .with_extra("security", ["cryptography", "pyopenssl"]);

        let plain = package.active_requirements(&BTreeSet::new()).unwrap();
        let names: Vec<&str> = plain.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["idna"]);

        let secured = package
            .active_requirements(&["security".to_string()].into())
            .unwrap();
        let names: Vec<&str> = secured.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["idna", "cryptography", "pyopenssl"]);
    }

    #[test]
    fn unknown_extra_is_reported() {
        let package = Package::new("demo", v("1.0.0"));
        let err = package
            .active_requirements(&["bogus".to_string()].into())
            .unwrap_err();
        assert_eq!(err, "bogus");
    }

    #[test]
    fn extra_markers_partially_evaluate() {
        let gated = Requirement::registry("win-helper", "^1.0")
            .unwrap()
            .with_optional(true)
            .with_marker(
                Marker::parse("extra == \"windows\" and sys_platform == \"win32\"").unwrap(),
            );
        let package = Package::new("demo", v("1.0.0"))
            .with_requirement(gated)
            .with_extra("windows", ["win-helper"]);

        let without = package.active_requirements(&BTreeSet::new()).unwrap();
        assert!(without.is_empty());

        let with = package
            .active_requirements(&["windows".to_string()].into())
            .unwrap();
        assert_eq!(with.len(), 1);
        // The extra predicate is resolved away; the platform condition stays.
        assert_eq!(with[0].marker.to_string(), "sys_platform == \"win32\"");
    }

    #[test]
    fn identity_includes_source() {
        use crate::requirement::{VcsKind, VcsReference};

        let registry = Package::new("pendulum", v("2.0.0"));
        let vcs = Package::new("pendulum", v("2.0.0")).with_source(Source::Vcs {
            kind: VcsKind::Git,
            url: "https://github.com/sdispater/pendulum.git".to_string(),
            reference: VcsReference::Branch("2.0".to_string()),
        });
        assert_ne!(registry, vcs);
        assert_eq!(
            vcs.source_identity().unwrap(),
            "git+https://github.com/sdispater/pendulum.git@2.0"
        );
    }

    #[test]
    fn classifiers_are_inert_metadata() {
        let package = Package::new("demo", v("1.0.0"))
            .with_description("Some description.")
            .with_classifiers(["Topic :: Software Development :: Build Tools"]);
        assert_eq!(package.description(), Some("Some description."));
        assert_eq!(package.classifiers().len(), 1);
        assert!(package.active_requirements(&BTreeSet::new()).unwrap().is_empty());
    }
}
