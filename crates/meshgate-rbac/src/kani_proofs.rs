//! Kani bounded model checking proofs for RBAC decisions.
//!
//! - Proof #1: Wildcard completeness - `"*"` matches every value
//! - Proof #2: Scope exclusivity - inclusion and exclusion targets never leak across modes
//! - Proof #3: Permissive isolation - permissive bindings never allow a request
//! - Proof #4: Default deny - an active scope with no bindings always denies

use crate::{
    binding::{ServiceRoleBinding, Subject},
    enforcement::{DecisionEngine, Verdict},
    pattern::matches,
    request::{Caller, RequestContext},
    role::ServiceRole,
    rule::AccessRule,
    scope::{RbacConfig, RbacMode, Target},
    snapshot::PolicySnapshot,
};

//=============================================================================
// Proof #1: Wildcard Completeness
//=============================================================================

/// Verifies that the universal pattern matches any short value.
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(5)]
fn verify_wildcard_completeness() {
    let bytes: [u8; 3] = kani::any();
    if let Ok(value) = std::str::from_utf8(&bytes) {
        assert!(matches("*", value));
    }
}

//=============================================================================
// Proof #2: Scope Exclusivity
//=============================================================================

/// Verifies that each mode only consults its own target.
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(5)]
fn verify_scope_exclusivity() {
    let listed = Target::new().with_namespace("ns");

    let mut inclusion = RbacConfig::new(RbacMode::OnWithInclusion);
    inclusion.exclusion = listed.clone();
    // Exclusion list ignored: nothing included.
    assert!(!inclusion.is_active("svc", "ns"));

    let mut exclusion = RbacConfig::new(RbacMode::OnWithExclusion);
    exclusion.inclusion = listed;
    // Inclusion list ignored: nothing excluded.
    assert!(exclusion.is_active("svc", "ns"));

    assert!(!RbacConfig::new(RbacMode::Off).is_active("svc", "ns"));
    assert!(RbacConfig::new(RbacMode::On).is_active("svc", "ns"));
}

//=============================================================================
// Proof #3: Permissive Isolation
//=============================================================================

/// Verifies that a matching permissive binding never turns into an allow.
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(5)]
fn verify_permissive_isolation() {
    let snapshot = PolicySnapshot::builder()
        .rbac_config(RbacConfig::on())
        .and_then(|b| {
            b.role(
                "ns",
                "all",
                ServiceRole::new().with_rule(AccessRule::for_services(["*"])),
            )
        })
        .and_then(|b| {
            b.binding(
                "ns",
                "shadow",
                ServiceRoleBinding::new("all")
                    .with_subject(Subject::any())
                    .permissive(),
            )
        });
    let Ok(builder) = snapshot else {
        return;
    };
    let snapshot = builder.build();

    let req = RequestContext::new("svc", "ns").with_caller(Caller::new());
    let decision = DecisionEngine::new().without_audit().decide(&snapshot, &req);

    assert_eq!(decision.verdict, Verdict::Deny);
    assert_eq!(decision.audit.permissive.len(), 1);
}

//=============================================================================
// Proof #4: Default Deny
//=============================================================================

/// Verifies that an active scope without bindings denies.
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(5)]
fn verify_default_deny() {
    let Ok(builder) = PolicySnapshot::builder().rbac_config(RbacConfig::on()) else {
        return;
    };
    let snapshot = builder.build();

    let req = RequestContext::new("svc", "ns");
    let decision = DecisionEngine::new().without_audit().decide(&snapshot, &req);

    assert_eq!(decision.verdict, Verdict::Deny);
    assert!(decision.audit.enforced.is_none());
}
