//! Service role bindings: who holds which role.
//!
//! A binding applies to a caller if ANY of its subjects matches. Within one
//! subject every populated field must match; a subject with no fields set
//! matches every caller.

use crate::pattern::matches;
use crate::request::Caller;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The only role kind a binding may reference.
pub const SERVICE_ROLE_KIND: &str = "ServiceRole";

/// Identity descriptor bound to a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subject {
    /// User pattern (e.g. `alice@example.com`, `*@example.com`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Group pattern. Deprecated in favour of properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Caller property patterns keyed by property name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Subject {
    /// Creates a subject that matches every caller.
    pub fn any() -> Self {
        Self::default()
    }

    /// Creates a subject matching a user pattern.
    pub fn user(pattern: impl Into<String>) -> Self {
        Self {
            user: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// Creates a subject matching a group pattern.
    pub fn group(pattern: impl Into<String>) -> Self {
        Self {
            group: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// Adds a property pattern.
    pub fn with_property(mut self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.properties.insert(key.into(), pattern.into());
        self
    }

    /// Returns whether the caller satisfies every populated field.
    pub fn matches(&self, caller: &Caller) -> bool {
        field_matches(self.user.as_deref(), caller.user.as_deref())
            && field_matches(self.group.as_deref(), caller.group.as_deref())
            && self.properties.iter().all(|(key, pattern)| {
                caller
                    .properties
                    .get(key)
                    .is_some_and(|value| matches(pattern, value))
            })
    }
}

/// An unset pattern is vacuously satisfied; a set pattern needs a value.
fn field_matches(pattern: Option<&str>, value: Option<&str>) -> bool {
    match (pattern, value) {
        (None, _) => true,
        (Some(p), Some(v)) => matches(p, v),
        (Some(_), None) => false,
    }
}

/// Reference to the role granted by a binding.
///
/// Resolved within the binding's own namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    /// Must be [`SERVICE_ROLE_KIND`].
    pub kind: String,
    pub name: String,
}

impl RoleRef {
    /// Creates a reference to a `ServiceRole`.
    pub fn service_role(name: impl Into<String>) -> Self {
        Self {
            kind: SERVICE_ROLE_KIND.to_string(),
            name: name.into(),
        }
    }

    /// Returns whether the kind is one the engine can resolve.
    pub fn is_service_role(&self) -> bool {
        self.kind == SERVICE_ROLE_KIND
    }
}

/// Whether a binding's match affects the verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnforcementMode {
    /// A match allows the request.
    #[default]
    Enforced,

    /// A match is recorded as "would allow" but never changes the verdict.
    Permissive,
}

/// Assignment of subjects to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRoleBinding {
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,
    #[serde(default)]
    pub mode: EnforcementMode,
}

impl ServiceRoleBinding {
    /// Creates an enforced binding to the named `ServiceRole` with no subjects.
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            subjects: Vec::new(),
            role_ref: RoleRef::service_role(role),
            mode: EnforcementMode::Enforced,
        }
    }

    /// Adds a subject (builder pattern).
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subjects.push(subject);
        self
    }

    /// Sets the enforcement mode.
    pub fn with_mode(mut self, mode: EnforcementMode) -> Self {
        self.mode = mode;
        self
    }

    /// Switches the binding to permissive (audit-only) mode.
    pub fn permissive(self) -> Self {
        self.with_mode(EnforcementMode::Permissive)
    }

    /// Returns whether any subject matches the caller.
    pub fn applies_to(&self, caller: &Caller) -> bool {
        self.subjects.iter().any(|s| s.matches(caller))
    }
}
