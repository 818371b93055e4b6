//! Immutable policy snapshots and the handle that publishes them.
//!
//! A [`PolicySnapshot`] holds every admitted role, binding and the optional
//! mesh-wide [`RbacConfig`]. Snapshots are never mutated after
//! [`SnapshotBuilder::build`]; refreshing configuration means building a new
//! snapshot and swapping it into a [`SnapshotHandle`]. Decisions already in
//! flight keep the `Arc` they loaded.

use crate::binding::ServiceRoleBinding;
use crate::role::ServiceRole;
use crate::scope::RbacConfig;
use crate::validation::{self, ConfigurationError};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A binding together with its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBinding {
    pub name: String,
    pub binding: ServiceRoleBinding,
}

/// Roles and bindings of one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespacePolicies {
    roles: BTreeMap<String, ServiceRole>,
    /// Kept in admission order; the engine evaluates bindings in this order.
    bindings: Vec<NamedBinding>,
}

impl NamespacePolicies {
    pub fn role(&self, name: &str) -> Option<&ServiceRole> {
        self.roles.get(name)
    }

    pub fn bindings(&self) -> &[NamedBinding] {
        &self.bindings
    }
}

/// A consistent, read-only view of the mesh's RBAC configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    revision: u64,
    rbac_config: Option<RbacConfig>,
    namespaces: BTreeMap<String, NamespacePolicies>,
}

impl PolicySnapshot {
    /// Returns a snapshot with no configuration. RBAC is off.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts building a snapshot.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Monotonic revision assigned by the publisher.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The mesh-wide RBAC config, if one was admitted.
    pub fn rbac_config(&self) -> Option<&RbacConfig> {
        self.rbac_config.as_ref()
    }

    /// Returns whether RBAC applies to `service` in `namespace`.
    ///
    /// Without an `RbacConfig`, RBAC is off.
    pub fn is_active(&self, service: &str, namespace: &str) -> bool {
        self.rbac_config
            .as_ref()
            .is_some_and(|c| c.is_active(service, namespace))
    }

    pub fn namespace(&self, namespace: &str) -> Option<&NamespacePolicies> {
        self.namespaces.get(namespace)
    }

    /// Looks up a role by name within a namespace.
    pub fn role(&self, namespace: &str, name: &str) -> Option<&ServiceRole> {
        self.namespace(namespace)?.role(name)
    }

    /// Bindings of a namespace, in admission order.
    pub fn bindings(&self, namespace: &str) -> &[NamedBinding] {
        match self.namespace(namespace) {
            Some(ns) => ns.bindings(),
            None => &[],
        }
    }

    /// Total number of admitted roles.
    pub fn role_count(&self) -> usize {
        self.namespaces.values().map(|ns| ns.roles.len()).sum()
    }

    /// Total number of admitted bindings.
    pub fn binding_count(&self) -> usize {
        self.namespaces.values().map(|ns| ns.bindings.len()).sum()
    }
}

/// Admits configuration objects into a new [`PolicySnapshot`].
///
/// Every object is validated on the way in; the first rejection aborts the
/// build.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: PolicySnapshot,
}

impl SnapshotBuilder {
    /// Sets the snapshot revision.
    pub fn revision(mut self, revision: u64) -> Self {
        self.snapshot.revision = revision;
        self
    }

    /// Admits the mesh-wide `RbacConfig`.
    ///
    /// Rejects a second config with [`ConfigurationError::DuplicateRbacConfig`].
    pub fn rbac_config(mut self, config: RbacConfig) -> Result<Self, ConfigurationError> {
        if self.snapshot.rbac_config.is_some() {
            return Err(ConfigurationError::DuplicateRbacConfig);
        }
        validation::validate_rbac_config(&config)?;
        self.snapshot.rbac_config = Some(config);
        Ok(self)
    }

    /// Admits a role.
    pub fn role(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        role: ServiceRole,
    ) -> Result<Self, ConfigurationError> {
        let namespace = namespace.into();
        let name = name.into();
        validation::validate_meta("ServiceRole", &namespace, &name)?;
        validation::validate_role(&name, &role)?;

        let ns = self.snapshot.namespaces.entry(namespace.clone()).or_default();
        if ns.roles.contains_key(&name) {
            return Err(ConfigurationError::DuplicateObject {
                kind: "ServiceRole",
                namespace,
                name,
            });
        }
        ns.roles.insert(name, role);
        Ok(self)
    }

    /// Admits a binding. The referenced role does not need to exist.
    pub fn binding(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        binding: ServiceRoleBinding,
    ) -> Result<Self, ConfigurationError> {
        let namespace = namespace.into();
        let name = name.into();
        validation::validate_meta("ServiceRoleBinding", &namespace, &name)?;
        validation::validate_binding(&name, &binding)?;

        let ns = self.snapshot.namespaces.entry(namespace.clone()).or_default();
        if ns.bindings.iter().any(|b| b.name == name) {
            return Err(ConfigurationError::DuplicateObject {
                kind: "ServiceRoleBinding",
                namespace,
                name,
            });
        }
        ns.bindings.push(NamedBinding { name, binding });
        Ok(self)
    }

    /// Adds a binding without admission checks.
    #[cfg(test)]
    pub(crate) fn binding_unchecked(
        mut self,
        namespace: &str,
        name: &str,
        binding: ServiceRoleBinding,
    ) -> Self {
        self.snapshot
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .bindings
            .push(NamedBinding {
                name: name.to_string(),
                binding,
            });
        self
    }

    /// Finishes the snapshot.
    pub fn build(self) -> PolicySnapshot {
        self.snapshot
    }
}

/// Error accessing a [`SnapshotHandle`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    /// A writer panicked while holding the lock.
    #[error("Snapshot lock poisoned")]
    LockPoisoned,

    /// The offered snapshot is older than the one already published.
    #[error("Snapshot revision {offered} is older than published revision {current}")]
    StaleRevision { current: u64, offered: u64 },
}

/// Shared, swappable reference to the current snapshot.
///
/// Cloning the handle shares the same slot. [`load`](Self::load) is cheap:
/// it clones an `Arc` under a read lock.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    current: Arc<RwLock<Arc<PolicySnapshot>>>,
}

impl SnapshotHandle {
    /// Creates a handle publishing `snapshot`.
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Returns the current snapshot.
    pub fn load(&self) -> Result<Arc<PolicySnapshot>, SnapshotError> {
        let guard = self
            .current
            .read()
            .map_err(|_| SnapshotError::LockPoisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Publishes `snapshot` and returns the one it replaced.
    ///
    /// Revisions never go backwards: a snapshot older than the published one
    /// is rejected with [`SnapshotError::StaleRevision`]. An equal revision
    /// replaces the current snapshot.
    pub fn store(&self, snapshot: PolicySnapshot) -> Result<Arc<PolicySnapshot>, SnapshotError> {
        let next = Arc::new(snapshot);
        let mut guard = self
            .current
            .write()
            .map_err(|_| SnapshotError::LockPoisoned)?;
        if next.revision() < guard.revision() {
            return Err(SnapshotError::StaleRevision {
                current: guard.revision(),
                offered: next.revision(),
            });
        }
        Ok(std::mem::replace(&mut *guard, next))
    }
}

impl Default for SnapshotHandle {
    fn default() -> Self {
        Self::new(PolicySnapshot::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::AccessRule;
    use crate::scope::{RbacMode, Target};

    fn viewer() -> ServiceRole {
        ServiceRole::new().with_rule(AccessRule::for_services(["*"]).with_method("GET"))
    }

    #[test]
    fn test_build_and_lookup() {
        let snapshot = PolicySnapshot::builder()
            .revision(7)
            .rbac_config(RbacConfig::on())
            .unwrap()
            .role("default", "viewer", viewer())
            .unwrap()
            .binding("default", "bind-viewer", ServiceRoleBinding::new("viewer"))
            .unwrap()
            .build();

        assert_eq!(snapshot.revision(), 7);
        assert!(snapshot.role("default", "viewer").is_some());
        assert!(snapshot.role("other", "viewer").is_none());
        assert_eq!(snapshot.bindings("default").len(), 1);
        assert!(snapshot.bindings("other").is_empty());
        assert_eq!(snapshot.role_count(), 1);
        assert_eq!(snapshot.binding_count(), 1);
    }

    #[test]
    fn test_second_rbac_config_rejected() {
        let result = PolicySnapshot::builder()
            .rbac_config(RbacConfig::on())
            .unwrap()
            .rbac_config(RbacConfig::new(RbacMode::Off));

        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateRbacConfig)
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = PolicySnapshot::builder()
            .role("default", "viewer", viewer())
            .unwrap()
            .role("default", "viewer", viewer());
        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateObject { kind: "ServiceRole", .. })
        ));

        // Same name in a different namespace is fine.
        let result = PolicySnapshot::builder()
            .role("default", "viewer", viewer())
            .unwrap()
            .role("staging", "viewer", viewer());
        assert!(result.is_ok());

        let result = PolicySnapshot::builder()
            .binding("default", "b", ServiceRoleBinding::new("viewer"))
            .unwrap()
            .binding("default", "b", ServiceRoleBinding::new("editor"));
        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateObject { kind: "ServiceRoleBinding", .. })
        ));
    }

    #[test]
    fn test_dangling_role_ref_admitted() {
        let snapshot = PolicySnapshot::builder()
            .binding("default", "b", ServiceRoleBinding::new("missing"))
            .unwrap()
            .build();

        assert_eq!(snapshot.bindings("default").len(), 1);
        assert!(snapshot.role("default", "missing").is_none());
    }

    #[test]
    fn test_scope_without_rbac_config_is_off() {
        assert!(!PolicySnapshot::empty().is_active("svc", "default"));

        let snapshot = PolicySnapshot::builder()
            .rbac_config(RbacConfig::including(Target::new().with_namespace("default")))
            .unwrap()
            .build();
        assert!(snapshot.is_active("svc", "default"));
        assert!(!snapshot.is_active("svc", "other"));
    }

    #[test]
    fn test_handle_swap_keeps_old_snapshot_alive() {
        let handle = SnapshotHandle::new(PolicySnapshot::builder().revision(1).build());
        let before = handle.load().unwrap();

        let replaced = handle
            .store(PolicySnapshot::builder().revision(2).build())
            .unwrap();

        assert_eq!(before.revision(), 1);
        assert_eq!(replaced.revision(), 1);
        assert_eq!(handle.load().unwrap().revision(), 2);
    }

    #[test]
    fn test_handle_rejects_older_revision() {
        let handle = SnapshotHandle::new(PolicySnapshot::builder().revision(5).build());

        let result = handle.store(PolicySnapshot::builder().revision(4).build());
        assert_eq!(
            result.unwrap_err(),
            SnapshotError::StaleRevision {
                current: 5,
                offered: 4
            }
        );
        assert_eq!(handle.load().unwrap().revision(), 5);

        // Same revision replaces.
        assert!(handle.store(PolicySnapshot::builder().revision(5).build()).is_ok());
    }

    #[test]
    fn test_racing_stores_keep_newest() {
        let handle = SnapshotHandle::default();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let writers: Vec<_> = (1..=8u64)
            .map(|revision| {
                let handle = handle.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    // Losers of the race are refused, never installed.
                    let _ = handle.store(PolicySnapshot::builder().revision(revision).build());
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(handle.load().unwrap().revision(), 8);
    }

    #[test]
    fn test_handle_clones_share_slot() {
        let handle = SnapshotHandle::default();
        let other = handle.clone();

        other
            .store(PolicySnapshot::builder().revision(3).build())
            .unwrap();
        assert_eq!(handle.load().unwrap().revision(), 3);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let handle = SnapshotHandle::new(PolicySnapshot::builder().revision(0).build());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let snapshot = handle.load().unwrap();
                        assert!(snapshot.revision() <= 50);
                    }
                })
            })
            .collect();

        for revision in 1..=50 {
            handle
                .store(PolicySnapshot::builder().revision(revision).build())
                .unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(handle.load().unwrap().revision(), 50);
    }
}
