//! Mesh-wide RBAC switch and scope resolution.
//!
//! [`RbacConfig`] decides whether roles and bindings are consulted at all
//! for a `(service, namespace)` pair:
//!
//! | Mode                | Active for                                        |
//! |---------------------|---------------------------------------------------|
//! | `OFF`               | nothing                                           |
//! | `ON`                | everything                                        |
//! | `ON_WITH_INCLUSION` | services or namespaces listed in `inclusion`      |
//! | `ON_WITH_EXCLUSION` | everything not listed in `exclusion`              |
//!
//! Target membership is exact string equality. Wildcard patterns do not
//! apply here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// RBAC activation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RbacMode {
    #[default]
    Off,
    On,
    OnWithInclusion,
    OnWithExclusion,
}

/// A set of services and namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub services: BTreeSet<String>,
    pub namespaces: BTreeSet<String>,
}

impl Target {
    /// Creates an empty target.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.services.insert(service.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.insert(namespace.into());
        self
    }

    /// Returns whether the service or the namespace is listed.
    pub fn contains(&self, service: &str, namespace: &str) -> bool {
        self.services.contains(service) || self.namespaces.contains(namespace)
    }

    /// Returns whether the target lists nothing.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.namespaces.is_empty()
    }
}

/// Mesh-wide RBAC configuration. At most one exists per mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RbacConfig {
    pub mode: RbacMode,

    /// Consulted only under [`RbacMode::OnWithInclusion`].
    pub inclusion: Target,

    /// Consulted only under [`RbacMode::OnWithExclusion`].
    pub exclusion: Target,
}

impl RbacConfig {
    /// Creates a config with the given mode and empty targets.
    pub fn new(mode: RbacMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// RBAC enabled for every service.
    pub fn on() -> Self {
        Self::new(RbacMode::On)
    }

    /// RBAC enabled only for the listed services and namespaces.
    pub fn including(inclusion: Target) -> Self {
        Self {
            mode: RbacMode::OnWithInclusion,
            inclusion,
            ..Self::default()
        }
    }

    /// RBAC enabled for everything except the listed services and namespaces.
    pub fn excluding(exclusion: Target) -> Self {
        Self {
            mode: RbacMode::OnWithExclusion,
            exclusion,
            ..Self::default()
        }
    }

    /// Returns whether RBAC applies to `service` in `namespace`.
    pub fn is_active(&self, service: &str, namespace: &str) -> bool {
        match self.mode {
            RbacMode::Off => false,
            RbacMode::On => true,
            RbacMode::OnWithInclusion => self.inclusion.contains(service, namespace),
            RbacMode::OnWithExclusion => !self.exclusion.contains(service, namespace),
        }
    }
}
