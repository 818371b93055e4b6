//! Admission validation for configuration objects.
//!
//! Malformed objects are rejected before they become part of a
//! [`PolicySnapshot`](crate::snapshot::PolicySnapshot); the decision engine
//! never sees them.

use crate::binding::{ServiceRoleBinding, Subject};
use crate::role::ServiceRole;
use crate::rule::AccessRule;
use crate::scope::{RbacConfig, Target};
use thiserror::Error;

/// A configuration object failed admission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Object name or namespace is empty.
    #[error("{kind} has an empty {field}")]
    EmptyName {
        kind: &'static str,
        field: &'static str,
    },

    /// An access rule lists no services.
    #[error("Rule {rule} of role '{role}' has no services")]
    EmptyServices { role: String, rule: usize },

    /// A pattern string is empty.
    #[error("Rule {rule} of role '{role}' has an empty {field} pattern")]
    EmptyPattern {
        role: String,
        rule: usize,
        field: &'static str,
    },

    /// A constraint has an empty key.
    #[error("Rule {rule} of role '{role}' has a constraint with an empty key")]
    EmptyConstraintKey { role: String, rule: usize },

    /// A constraint lists no acceptable values.
    #[error("Constraint '{key}' in rule {rule} of role '{role}' has no values")]
    EmptyConstraintValues {
        role: String,
        rule: usize,
        key: String,
    },

    /// A subject carries an empty user, group, or property pattern.
    #[error("Subject {subject} of binding '{binding}' has an empty {field} pattern")]
    EmptySubjectPattern {
        binding: String,
        subject: usize,
        field: String,
    },

    /// Binding references something other than a `ServiceRole`.
    #[error("Binding '{binding}' references kind '{kind}', expected 'ServiceRole'")]
    InvalidRoleRefKind { binding: String, kind: String },

    /// Binding references a role with an empty name.
    #[error("Binding '{binding}' references a role with an empty name")]
    EmptyRoleRefName { binding: String },

    /// A second `RbacConfig` was submitted.
    #[error("An RbacConfig already exists; only one is allowed per mesh")]
    DuplicateRbacConfig,

    /// An object with the same name already exists in the namespace.
    #[error("{kind} '{name}' already exists in namespace '{namespace}'")]
    DuplicateObject {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// An `RbacConfig` target lists an empty service or namespace.
    #[error("RbacConfig {target} lists an empty {field}")]
    InvalidTarget {
        target: &'static str,
        field: &'static str,
    },
}

/// Result type for admission validation.
pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// Validates object metadata.
pub fn validate_meta(kind: &'static str, namespace: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConfigurationError::EmptyName { kind, field: "name" });
    }
    if namespace.is_empty() {
        return Err(ConfigurationError::EmptyName {
            kind,
            field: "namespace",
        });
    }
    Ok(())
}

/// Validates a role and each of its rules.
pub fn validate_role(name: &str, role: &ServiceRole) -> Result<()> {
    for (index, rule) in role.rules.iter().enumerate() {
        validate_rule(name, index, rule)?;
    }
    Ok(())
}

fn validate_rule(role: &str, index: usize, rule: &AccessRule) -> Result<()> {
    if rule.services.is_empty() {
        return Err(ConfigurationError::EmptyServices {
            role: role.to_string(),
            rule: index,
        });
    }

    let pattern_fields: [(&'static str, &[String]); 5] = [
        ("services", &rule.services),
        ("paths", &rule.paths),
        ("not_paths", &rule.not_paths),
        ("methods", &rule.methods),
        ("not_methods", &rule.not_methods),
    ];
    for (field, patterns) in pattern_fields {
        if patterns.iter().any(String::is_empty) {
            return Err(ConfigurationError::EmptyPattern {
                role: role.to_string(),
                rule: index,
                field,
            });
        }
    }

    for constraint in &rule.constraints {
        if constraint.key.is_empty() {
            return Err(ConfigurationError::EmptyConstraintKey {
                role: role.to_string(),
                rule: index,
            });
        }
        if constraint.values.is_empty() {
            return Err(ConfigurationError::EmptyConstraintValues {
                role: role.to_string(),
                rule: index,
                key: constraint.key.clone(),
            });
        }
        if constraint.values.iter().any(String::is_empty) {
            return Err(ConfigurationError::EmptyPattern {
                role: role.to_string(),
                rule: index,
                field: "constraint values",
            });
        }
    }

    Ok(())
}

/// Validates a binding's subjects and role reference.
///
/// Whether the referenced role exists is NOT checked here: a dangling
/// reference is legal and makes the binding inert at decision time.
pub fn validate_binding(name: &str, binding: &ServiceRoleBinding) -> Result<()> {
    for (index, subject) in binding.subjects.iter().enumerate() {
        validate_subject(name, index, subject)?;
    }
    if !binding.role_ref.is_service_role() {
        return Err(ConfigurationError::InvalidRoleRefKind {
            binding: name.to_string(),
            kind: binding.role_ref.kind.clone(),
        });
    }
    if binding.role_ref.name.is_empty() {
        return Err(ConfigurationError::EmptyRoleRefName {
            binding: name.to_string(),
        });
    }
    Ok(())
}

fn validate_subject(binding: &str, index: usize, subject: &Subject) -> Result<()> {
    let empty_field = if subject.user.as_deref() == Some("") {
        Some("user".to_string())
    } else if subject.group.as_deref() == Some("") {
        Some("group".to_string())
    } else {
        subject
            .properties
            .iter()
            .find(|(key, pattern)| key.is_empty() || pattern.is_empty())
            .map(|(key, _)| format!("property '{key}'"))
    };

    match empty_field {
        Some(field) => Err(ConfigurationError::EmptySubjectPattern {
            binding: binding.to_string(),
            subject: index,
            field,
        }),
        None => Ok(()),
    }
}

/// Validates an `RbacConfig`'s targets.
pub fn validate_rbac_config(config: &RbacConfig) -> Result<()> {
    validate_target("inclusion", &config.inclusion)?;
    validate_target("exclusion", &config.exclusion)
}

fn validate_target(target: &'static str, t: &Target) -> Result<()> {
    if t.services.iter().any(String::is_empty) {
        return Err(ConfigurationError::InvalidTarget {
            target,
            field: "service",
        });
    }
    if t.namespaces.iter().any(String::is_empty) {
        return Err(ConfigurationError::InvalidTarget {
            target,
            field: "namespace",
        });
    }
    Ok(())
}
