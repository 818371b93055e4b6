//! Declarative policy documents.
//!
//! A [`PolicyDocument`] is the on-disk form of a configuration bundle. It is
//! parsed from TOML or JSON and admitted into a [`PolicySnapshot`].
//!
//! ```toml
//! [rbac_config]
//! mode = "ON_WITH_INCLUSION"
//! inclusion = { namespaces = ["default"] }
//!
//! [[roles]]
//! name = "product-viewer"
//! [[roles.rules]]
//! services = ["products.svc.cluster.local"]
//! methods = ["GET", "HEAD"]
//!
//! [[bindings]]
//! name = "bind-alice"
//! subjects = [{ user = "alice@yahoo.com" }]
//! role_ref = { kind = "ServiceRole", name = "product-viewer" }
//! ```

use crate::binding::{EnforcementMode, RoleRef, ServiceRoleBinding, Subject};
use crate::role::ServiceRole;
use crate::rule::AccessRule;
use crate::scope::RbacConfig;
use crate::snapshot::PolicySnapshot;
use crate::validation::ConfigurationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error loading a policy document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to parse JSON policy document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML policy document: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Policy document rejected: {0}")]
    Rejected(#[from] ConfigurationError),
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// A named `ServiceRole` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub name: String,
    /// Falls back to the loader's default namespace when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub rules: Vec<AccessRule>,
}

/// A named `ServiceRoleBinding` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,
    #[serde(default)]
    pub mode: EnforcementMode,
}

/// A bundle of configuration objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rbac_config: Option<RbacConfig>,
    pub roles: Vec<RoleEntry>,
    pub bindings: Vec<BindingEntry>,
}

impl PolicyDocument {
    /// Parses a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parses a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Admits every object and builds a snapshot.
    ///
    /// Entries without a namespace land in `default_namespace`.
    pub fn into_snapshot(self, default_namespace: &str, revision: u64) -> Result<PolicySnapshot> {
        let mut builder = PolicySnapshot::builder().revision(revision);

        if let Some(config) = self.rbac_config {
            builder = builder.rbac_config(config)?;
        }

        for entry in self.roles {
            let namespace = entry
                .namespace
                .unwrap_or_else(|| default_namespace.to_string());
            builder = builder.role(namespace, entry.name, ServiceRole { rules: entry.rules })?;
        }

        for entry in self.bindings {
            let namespace = entry
                .namespace
                .unwrap_or_else(|| default_namespace.to_string());
            let binding = ServiceRoleBinding {
                subjects: entry.subjects,
                role_ref: entry.role_ref,
                mode: entry.mode,
            };
            builder = builder.binding(namespace, entry.name, binding)?;
        }

        Ok(builder.build())
    }
}
