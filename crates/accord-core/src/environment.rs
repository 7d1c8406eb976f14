//! Environment snapshots used for marker evaluation.
//!
//! A snapshot is plain data passed explicitly to every evaluation call.
//! Nothing here reads the ambient process state; callers that want the
//! current interpreter's view build the snapshot themselves, and tests build
//! synthetic ones.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A concrete set of marker attribute values plus the active extras.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub implementation_name: String,
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub platform_machine: String,
    #[serde(default)]
    pub platform_release: String,
    #[serde(default)]
    pub platform_system: String,
    #[serde(default)]
    pub platform_version: String,
    #[serde(default)]
    pub python_full_version: String,
    #[serde(default)]
    pub python_version: String,
    #[serde(default)]
    pub sys_platform: String,
    /// Extras considered active while evaluating `extra == "..."` predicates.
    #[serde(default)]
    pub extras: BTreeSet<String>,
}

impl Environment {
    /// The raw value of a marker attribute. Unknown attributes are empty.
    pub fn value_of(&self, key: &str) -> &str {
        match key {
            "implementation_name" => &self.implementation_name,
            "os_name" => &self.os_name,
            "platform_machine" => &self.platform_machine,
            "platform_release" => &self.platform_release,
            "platform_system" => &self.platform_system,
            "platform_version" => &self.platform_version,
            "python_full_version" => &self.python_full_version,
            "python_version" => &self.python_version,
            "sys_platform" => &self.sys_platform,
            _ => "",
        }
    }

    /// A copy of this snapshot with one more active extra.
    pub fn with_extra(&self, extra: impl Into<String>) -> Environment {
        let mut env = self.clone();
        env.extras.insert(extra.into());
        env
    }

    /// A copy of this snapshot with the given extras active.
    pub fn with_extras<I, S>(&self, extras: I) -> Environment
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut env = self.clone();
        env.extras.extend(extras.into_iter().map(Into::into));
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_lookup() {
        let env = Environment {
            python_version: "3.6".to_string(),
            sys_platform: "linux".to_string(),
            ..Environment::default()
        };
        assert_eq!(env.value_of("python_version"), "3.6");
        assert_eq!(env.value_of("sys_platform"), "linux");
        assert_eq!(env.value_of("no_such_attribute"), "");
    }

    #[test]
    fn with_extra_does_not_mutate() {
        let env = Environment::default();
        let with = env.with_extra("security");
        assert!(env.extras.is_empty());
        assert!(with.extras.contains("security"));
    }
}
