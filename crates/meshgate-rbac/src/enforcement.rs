//! Decision engine.
//!
//! Evaluates a request against a [`PolicySnapshot`]:
//!
//! 1. If RBAC is not active for the destination, the request is allowed by
//!    bypass.
//! 2. Otherwise the bindings of the destination namespace are walked in
//!    admission order. A binding contributes when one of its subjects matches
//!    the caller AND its role resolves AND the role grants the request.
//!    - The first contributing `ENFORCED` binding allows the request and stops
//!      the walk.
//!    - Contributing `PERMISSIVE` bindings are recorded as "would allow" and
//!      the walk continues.
//! 3. Without an enforced match the request is denied.
//!
//! Bindings only ever grant; there is no explicit deny, so matches cannot
//! conflict. Evaluation is pure: the same snapshot and request always yield
//! the same [`Decision`].

use crate::binding::EnforcementMode;
use crate::request::RequestContext;
use crate::snapshot::{NamedBinding, PolicySnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error returned by [`DecisionEngine::enforce`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnforcementError {
    /// Access denied by RBAC.
    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },
}

/// Result type for enforcement operations.
pub type Result<T> = std::result::Result<T, EnforcementError>;

/// Final outcome of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Allow,
    Deny,
}

/// Why the engine reached its verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// RBAC does not apply to the destination; the request bypasses it.
    ScopeInactive,

    /// An enforced binding granted the request.
    EnforcedBinding,

    /// No enforced binding granted the request.
    NoEnforcedBinding,
}

/// Identifies a binding in the audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingId {
    pub namespace: String,
    pub name: String,
    pub role: String,
}

impl BindingId {
    fn of(namespace: &str, named: &NamedBinding) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: named.name.clone(),
            role: named.binding.role_ref.name.clone(),
        }
    }
}

/// Why a binding's role could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ResolutionFailure {
    /// No role with the referenced name exists in the binding's namespace.
    RoleNotFound,

    /// The reference names a kind other than `ServiceRole`.
    UnsupportedKind { kind: String },
}

/// A binding matched the caller but its role did not resolve.
///
/// Not fatal: the binding is treated as a non-match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolutionMiss {
    pub binding: BindingId,
    pub failure: ResolutionFailure,
}

/// Structured trail of one decision, for the observability collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Revision of the snapshot the decision was made against.
    pub revision: u64,

    /// The enforced binding that allowed the request, if any.
    pub enforced: Option<BindingId>,

    /// Permissive bindings that would have allowed the request.
    pub permissive: Vec<BindingId>,

    pub resolution_misses: Vec<ResolutionMiss>,
}

/// Verdict plus audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason: DecisionReason,
    pub audit: AuditRecord,
}

impl Decision {
    /// Returns whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }

    /// Returns whether RBAC was bypassed for this request.
    pub fn is_bypass(&self) -> bool {
        self.reason == DecisionReason::ScopeInactive
    }
}

/// RBAC decision engine.
///
/// Holds no policy state of its own; every call reads the snapshot it is
/// given, so one engine can serve any number of threads and snapshots.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    /// Whether to log decisions.
    audit_enabled: bool,
}

impl DecisionEngine {
    /// Creates a new engine with decision logging enabled.
    pub fn new() -> Self {
        Self {
            audit_enabled: true,
        }
    }

    /// Disables decision logging (for testing).
    ///
    /// The [`AuditRecord`] is still produced.
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    /// Sets whether decisions are logged.
    pub fn with_audit(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    /// Decides whether `req` is allowed under `snapshot`.
    pub fn decide(&self, snapshot: &PolicySnapshot, req: &RequestContext) -> Decision {
        let mut audit = AuditRecord {
            revision: snapshot.revision(),
            ..AuditRecord::default()
        };

        if !snapshot.is_active(&req.service, &req.namespace) {
            if self.audit_enabled {
                debug!(
                    service = %req.service,
                    namespace = %req.namespace,
                    "RBAC not active for destination, bypassing"
                );
            }
            return Decision {
                verdict: Verdict::Allow,
                reason: DecisionReason::ScopeInactive,
                audit,
            };
        }

        for named in snapshot.bindings(&req.namespace) {
            let binding = &named.binding;
            if !binding.applies_to(&req.caller) {
                continue;
            }

            let role = if binding.role_ref.is_service_role() {
                snapshot.role(&req.namespace, &binding.role_ref.name)
            } else {
                None
            };

            let Some(role) = role else {
                let miss = ResolutionMiss {
                    binding: BindingId::of(&req.namespace, named),
                    failure: if binding.role_ref.is_service_role() {
                        ResolutionFailure::RoleNotFound
                    } else {
                        ResolutionFailure::UnsupportedKind {
                            kind: binding.role_ref.kind.clone(),
                        }
                    },
                };
                if self.audit_enabled {
                    warn!(
                        namespace = %req.namespace,
                        binding = %named.name,
                        role = %binding.role_ref.name,
                        failure = ?miss.failure,
                        "Binding role unresolved, skipping"
                    );
                }
                audit.resolution_misses.push(miss);
                continue;
            };

            if !role.matches(req) {
                continue;
            }

            let id = BindingId::of(&req.namespace, named);
            match binding.mode {
                EnforcementMode::Enforced => {
                    if self.audit_enabled {
                        info!(
                            service = %req.service,
                            namespace = %req.namespace,
                            path = %req.path,
                            binding = %id.name,
                            role = %id.role,
                            "Request allowed by RBAC"
                        );
                    }
                    audit.enforced = Some(id);
                    return Decision {
                        verdict: Verdict::Allow,
                        reason: DecisionReason::EnforcedBinding,
                        audit,
                    };
                }
                EnforcementMode::Permissive => {
                    if self.audit_enabled {
                        debug!(
                            service = %req.service,
                            namespace = %req.namespace,
                            binding = %id.name,
                            role = %id.role,
                            "Permissive binding would allow request"
                        );
                    }
                    audit.permissive.push(id);
                }
            }
        }

        if self.audit_enabled {
            warn!(
                service = %req.service,
                namespace = %req.namespace,
                path = %req.path,
                method = %req.method,
                user = ?req.caller.user,
                would_allow = audit.permissive.len(),
                "Request denied by RBAC"
            );
        }

        Decision {
            verdict: Verdict::Deny,
            reason: DecisionReason::NoEnforcedBinding,
            audit,
        }
    }

    /// Decides and converts a deny into an error.
    ///
    /// Returns the decision on allow so callers can still forward the audit
    /// record.
    pub fn enforce(&self, snapshot: &PolicySnapshot, req: &RequestContext) -> Result<Decision> {
        let decision = self.decide(snapshot, req);
        if decision.is_allowed() {
            Ok(decision)
        } else {
            Err(EnforcementError::AccessDenied {
                reason: format!(
                    "No enforced binding in namespace '{}' grants {} {} on '{}'",
                    req.namespace, req.method, req.path, req.service
                ),
            })
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{RoleRef, ServiceRoleBinding, Subject};
    use crate::request::Caller;
    use crate::role::ServiceRole;
    use crate::rule::{AccessRule, Constraint};
    use crate::scope::{RbacConfig, Target};
    use proptest::prelude::*;

    const PRODUCTS: &str = "products.svc.cluster.local";

    fn product_viewer() -> ServiceRole {
        ServiceRole::new().with_rule(
            AccessRule::for_services([PRODUCTS])
                .with_method("GET")
                .with_method("HEAD")
                .with_constraint(Constraint::new("destination.labels[version]", ["v1", "v2"])),
        )
    }

    fn alice_request(version: &str) -> RequestContext {
        RequestContext::new(PRODUCTS, "default")
            .with_path("/products/1")
            .with_method("GET")
            .with_label("version", version)
            .with_caller(Caller::new().with_user("alice@yahoo.com"))
    }

    fn snapshot_with(bindings: Vec<(&str, ServiceRoleBinding)>) -> PolicySnapshot {
        let mut builder = PolicySnapshot::builder()
            .rbac_config(RbacConfig::on())
            .unwrap()
            .role("default", "product-viewer", product_viewer())
            .unwrap();
        for (name, binding) in bindings {
            builder = builder.binding("default", name, binding).unwrap();
        }
        builder.build()
    }

    fn alice_binding() -> ServiceRoleBinding {
        ServiceRoleBinding::new("product-viewer").with_subject(Subject::user("alice@yahoo.com"))
    }

    #[test]
    fn test_end_to_end_label_constraint() {
        let snapshot = snapshot_with(vec![("bind-alice", alice_binding())]);
        let engine = DecisionEngine::new().without_audit();

        let allowed = engine.decide(&snapshot, &alice_request("v1"));
        assert_eq!(allowed.verdict, Verdict::Allow);
        assert_eq!(allowed.reason, DecisionReason::EnforcedBinding);
        assert_eq!(
            allowed.audit.enforced.as_ref().map(|b| b.name.as_str()),
            Some("bind-alice")
        );

        let denied = engine.decide(&snapshot, &alice_request("v3"));
        assert_eq!(denied.verdict, Verdict::Deny);
        assert_eq!(denied.reason, DecisionReason::NoEnforcedBinding);
        assert!(denied.audit.enforced.is_none());
    }

    #[test]
    fn test_other_caller_denied() {
        let snapshot = snapshot_with(vec![("bind-alice", alice_binding())]);
        let engine = DecisionEngine::new().without_audit();

        let req = alice_request("v1").with_caller(Caller::new().with_user("bob@yahoo.com"));
        assert!(!engine.decide(&snapshot, &req).is_allowed());
    }

    #[test]
    fn test_enforced_wins_over_permissive() {
        let snapshot = snapshot_with(vec![
            ("shadow", alice_binding().permissive()),
            ("bind-alice", alice_binding()),
            ("after", alice_binding().permissive()),
        ]);
        let engine = DecisionEngine::new().without_audit();

        let decision = engine.decide(&snapshot, &alice_request("v1"));
        assert_eq!(decision.verdict, Verdict::Allow);
        assert_eq!(
            decision.audit.enforced.as_ref().map(|b| b.name.as_str()),
            Some("bind-alice")
        );
        // Walk stops at the first enforced match.
        let permissive: Vec<_> = decision.audit.permissive.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(permissive, vec!["shadow"]);
    }

    #[test]
    fn test_permissive_only_denies_with_would_allow() {
        let snapshot = snapshot_with(vec![
            ("shadow-a", alice_binding().permissive()),
            ("shadow-b", alice_binding().permissive()),
        ]);
        let engine = DecisionEngine::new().without_audit();

        let decision = engine.decide(&snapshot, &alice_request("v1"));
        assert_eq!(decision.verdict, Verdict::Deny);
        assert!(decision.audit.enforced.is_none());
        assert_eq!(decision.audit.permissive.len(), 2);
        assert_eq!(decision.audit.permissive[0].role, "product-viewer");
    }

    #[test]
    fn test_no_bindings_is_plain_deny() {
        let snapshot = snapshot_with(Vec::new());
        let decision = DecisionEngine::new()
            .without_audit()
            .decide(&snapshot, &alice_request("v1"));

        assert_eq!(decision.verdict, Verdict::Deny);
        assert_eq!(decision.audit, AuditRecord::default());
    }

    #[test]
    fn test_unresolved_role_skipped() {
        let snapshot = snapshot_with(vec![
            (
                "dangling",
                ServiceRoleBinding::new("does-not-exist")
                    .with_subject(Subject::user("alice@yahoo.com")),
            ),
            ("bind-alice", alice_binding()),
        ]);
        let engine = DecisionEngine::new().without_audit();

        let decision = engine.decide(&snapshot, &alice_request("v1"));
        assert!(decision.is_allowed());
        assert_eq!(decision.audit.resolution_misses.len(), 1);
        assert_eq!(
            decision.audit.resolution_misses[0].failure,
            ResolutionFailure::RoleNotFound
        );
        assert_eq!(decision.audit.resolution_misses[0].binding.name, "dangling");
    }

    #[test]
    fn test_unsupported_kind_skipped() {
        let mut binding = alice_binding();
        binding.role_ref = RoleRef {
            kind: "ClusterRole".to_string(),
            name: "product-viewer".to_string(),
        };
        let snapshot = PolicySnapshot::builder()
            .rbac_config(RbacConfig::on())
            .unwrap()
            .role("default", "product-viewer", product_viewer())
            .unwrap()
            .binding_unchecked("default", "cluster", binding)
            .build();

        let decision = DecisionEngine::new()
            .without_audit()
            .decide(&snapshot, &alice_request("v1"));
        assert_eq!(decision.verdict, Verdict::Deny);
        assert_eq!(
            decision.audit.resolution_misses[0].failure,
            ResolutionFailure::UnsupportedKind {
                kind: "ClusterRole".to_string()
            }
        );
    }

    #[test]
    fn test_role_from_other_namespace_not_resolved() {
        let snapshot = PolicySnapshot::builder()
            .rbac_config(RbacConfig::on())
            .unwrap()
            .role("staging", "product-viewer", product_viewer())
            .unwrap()
            .binding("default", "bind-alice", alice_binding())
            .unwrap()
            .build();

        let decision = DecisionEngine::new()
            .without_audit()
            .decide(&snapshot, &alice_request("v1"));
        assert_eq!(decision.verdict, Verdict::Deny);
        assert_eq!(decision.audit.resolution_misses.len(), 1);
    }

    #[test]
    fn test_scope_bypass() {
        let snapshot = PolicySnapshot::builder()
            .rbac_config(RbacConfig::including(Target::new().with_namespace("ns1")))
            .unwrap()
            .build();
        let engine = DecisionEngine::new().without_audit();

        let inside = RequestContext::new("svc", "ns1");
        let decision = engine.decide(&snapshot, &inside);
        assert_eq!(decision.verdict, Verdict::Deny, "active scope, no bindings");

        let outside = RequestContext::new("svc", "ns2");
        let decision = engine.decide(&snapshot, &outside);
        assert_eq!(decision.verdict, Verdict::Allow);
        assert!(decision.is_bypass());
    }

    #[test]
    fn test_empty_snapshot_bypasses() {
        let decision = DecisionEngine::new()
            .without_audit()
            .decide(&PolicySnapshot::empty(), &alice_request("v3"));
        assert!(decision.is_allowed());
        assert!(decision.is_bypass());
    }

    #[test]
    fn test_enforce_maps_deny_to_error() {
        let snapshot = snapshot_with(vec![("bind-alice", alice_binding())]);
        let engine = DecisionEngine::new().without_audit();

        assert!(engine.enforce(&snapshot, &alice_request("v1")).is_ok());

        match engine.enforce(&snapshot, &alice_request("v3")) {
            Err(EnforcementError::AccessDenied { reason }) => {
                assert!(reason.contains(PRODUCTS));
                assert!(reason.contains("default"));
            }
            other => panic!("Expected AccessDenied, got {other:?}"),
        }
    }

    #[test]
    fn test_decision_serializes_for_audit() {
        let snapshot = snapshot_with(vec![("bind-alice", alice_binding())]);
        let decision = DecisionEngine::new()
            .without_audit()
            .decide(&snapshot, &alice_request("v1"));

        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["verdict"], "ALLOW");
        assert_eq!(json["reason"], "enforced_binding");
        assert_eq!(json["audit"]["enforced"]["name"], "bind-alice");
    }

    #[test]
    fn test_logging_enabled_does_not_change_outcome() {
        let snapshot = snapshot_with(vec![
            ("shadow", alice_binding().permissive()),
            ("bind-alice", alice_binding()),
        ]);

        let quiet = DecisionEngine::new().without_audit();
        let loud = DecisionEngine::new().with_audit(true);

        for version in ["v1", "v3"] {
            let req = alice_request(version);
            assert_eq!(quiet.decide(&snapshot, &req), loud.decide(&snapshot, &req));
        }
    }

    proptest! {
        #[test]
        fn decide_is_idempotent(
            version in "v[0-9]",
            user in prop::sample::select(vec!["alice@yahoo.com", "bob@yahoo.com", ""]),
            method in prop::sample::select(vec!["GET", "HEAD", "POST"]),
        ) {
            let snapshot = snapshot_with(vec![
                ("shadow", alice_binding().permissive()),
                ("bind-alice", alice_binding()),
            ]);
            let engine = DecisionEngine::new().without_audit();
            let req = alice_request(&version)
                .with_method(method)
                .with_caller(Caller::new().with_user(user));

            let first = engine.decide(&snapshot, &req);
            let second = engine.decide(&snapshot, &req);
            prop_assert_eq!(first, second);
        }
    }
}
