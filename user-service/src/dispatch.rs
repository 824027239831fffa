//! Version-aware handler resolution.
//!
//! Handlers are registered per `(version, operation)` at startup. A request
//! for version `n` runs the handler registered for the newest version `<= n`
//! and falls back to the unversioned default for that operation.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Version {0} is not in the accepted version list")]
    UnknownVersion(String),

    #[error("No handler for {operation} at version {version}")]
    MissingHandler {
        version: String,
        operation: &'static str,
    },
}

/// `v1.2` and `V1_2` name the same version.
pub fn normalize_version(label: &str) -> String {
    label.trim().replace('.', "_").to_uppercase()
}

/// Accepted version labels, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedVersions {
    labels: Vec<String>,
}

impl AcceptedVersions {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|label| normalize_version(label.as_ref()))
                .filter(|label| !label.is_empty())
                .collect(),
        }
    }

    /// Index of the requested version, if accepted.
    pub fn resolve(&self, requested: &str) -> Option<usize> {
        let requested = normalize_version(requested);
        self.labels.iter().position(|label| *label == requested)
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub struct Registry<H> {
    versions: AcceptedVersions,
    handlers: HashMap<(Option<usize>, &'static str), H>,
}

impl<H> Registry<H> {
    pub fn new(versions: AcceptedVersions) -> Self {
        Self {
            versions,
            handlers: HashMap::new(),
        }
    }

    pub fn versions(&self) -> &AcceptedVersions {
        &self.versions
    }

    /// Override `operation` from `version` onwards.
    pub fn register(
        &mut self,
        version: &str,
        operation: &'static str,
        handler: H,
    ) -> Result<&mut Self, RegistryError> {
        let index = self
            .versions
            .resolve(version)
            .ok_or_else(|| RegistryError::UnknownVersion(version.to_string()))?;
        self.handlers.insert((Some(index), operation), handler);
        Ok(self)
    }

    /// Behaviour of `operation` for versions without an override.
    pub fn register_default(&mut self, operation: &'static str, handler: H) -> &mut Self {
        self.handlers.insert((None, operation), handler);
        self
    }

    /// Walk from `index` back to the oldest version, then to the default.
    pub fn resolve(&self, index: usize, operation: &'static str) -> Option<&H> {
        let newest = index.min(self.versions.len().saturating_sub(1));
        (0..=newest)
            .rev()
            .find_map(|i| self.handlers.get(&(Some(i), operation)))
            .or_else(|| self.handlers.get(&(None, operation)))
    }

    /// Name of the handler `resolve` picks, in `<VERSION>_<Operation>` form.
    pub fn resolved_name(&self, index: usize, operation: &'static str) -> Option<String> {
        let newest = index.min(self.versions.len().saturating_sub(1));
        (0..=newest)
            .rev()
            .find(|i| self.handlers.contains_key(&(Some(*i), operation)))
            .and_then(|i| self.versions.label(i))
            .map(|label| format!("{}_{}", label, operation))
            .or_else(|| {
                self.handlers
                    .contains_key(&(None, operation))
                    .then(|| operation.to_string())
            })
    }

    /// Every accepted version must resolve every operation.
    pub fn ensure_complete(&self, operations: &[&'static str]) -> Result<(), RegistryError> {
        for &operation in operations {
            for index in 0..self.versions.len() {
                if self.resolve(index, operation).is_none() {
                    return Err(RegistryError::MissingHandler {
                        version: self.versions.label(index).unwrap_or_default().to_string(),
                        operation,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions() -> AcceptedVersions {
        AcceptedVersions::new(["v1", "v2", "v3"])
    }

    #[test]
    fn labels_are_normalized() {
        let versions = AcceptedVersions::new(["v1.0", "v2"]);
        assert_eq!(versions.resolve("V1_0"), Some(0));
        assert_eq!(versions.resolve("v1.0"), Some(0));
        assert_eq!(versions.resolve("v2"), Some(1));
        assert_eq!(versions.resolve("v3"), None);
        assert_eq!(versions.label(0), Some("V1_0"));
    }

    #[test]
    fn walks_back_to_older_version_before_default() {
        let mut registry = Registry::new(versions());
        registry.register("v1", "Signup", "v1_signup").unwrap();
        registry.register_default("Signup", "signup");

        assert_eq!(registry.resolve(2, "Signup"), Some(&"v1_signup"));
        assert_eq!(registry.resolved_name(2, "Signup").as_deref(), Some("V1_Signup"));
    }

    #[test]
    fn falls_back_to_default() {
        let mut registry = Registry::new(versions());
        registry.register_default("Signup", "signup");

        assert_eq!(registry.resolve(2, "Signup"), Some(&"signup"));
        assert_eq!(registry.resolved_name(0, "Signup").as_deref(), Some("Signup"));
    }

    #[test]
    fn never_picks_a_newer_version() {
        let mut registry = Registry::new(versions());
        registry.register("v3", "Signin", "v3_signin").unwrap();
        registry.register_default("Signin", "signin");

        assert_eq!(registry.resolve(1, "Signin"), Some(&"signin"));
        assert_eq!(registry.resolve(2, "Signin"), Some(&"v3_signin"));
    }

    #[test]
    fn unknown_operation_resolves_nothing() {
        let registry: Registry<&str> = Registry::new(versions());
        assert_eq!(registry.resolve(2, "Signup"), None);
        assert_eq!(registry.resolved_name(2, "Signup"), None);
    }

    #[test]
    fn registering_unknown_version_fails() {
        let mut registry = Registry::new(versions());
        assert_eq!(
            registry.register("v9", "Signup", "x").err(),
            Some(RegistryError::UnknownVersion("v9".to_string()))
        );
    }

    #[test]
    fn completeness_requires_every_version() {
        let mut registry = Registry::new(versions());
        registry.register("v2", "Signup", "v2_signup").unwrap();
        assert_eq!(
            registry.ensure_complete(&["Signup"]),
            Err(RegistryError::MissingHandler {
                version: "V1".to_string(),
                operation: "Signup",
            })
        );

        registry.register_default("Signup", "signup");
        assert!(registry.ensure_complete(&["Signup"]).is_ok());
    }
}
