#![no_main]

// Decision invariant fuzzer
//
// Builds snapshots from arbitrary rules and subjects, then checks:
// 1. Permissive bindings never produce an ALLOW on their own
// 2. An ALLOW names an enforced binding that exists in the snapshot
// 3. That binding is reported as a would-allow once everything is permissive

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use meshgate_rbac::{
    AccessRule, Caller, Constraint, DecisionEngine, DecisionReason, EnforcementMode,
    PolicySnapshot, RbacConfig, RequestContext, ServiceRole, ServiceRoleBinding, Subject, Verdict,
};

#[derive(Debug, Arbitrary)]
struct FuzzRule {
    services: Vec<String>,
    paths: Vec<String>,
    methods: Vec<String>,
    constraint: Option<(String, Vec<String>)>,
}

#[derive(Debug, Arbitrary)]
struct FuzzBinding {
    user: Option<String>,
    role: u8,
    permissive: bool,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    roles: Vec<Vec<FuzzRule>>,
    bindings: Vec<FuzzBinding>,
    service: String,
    path: String,
    method: String,
    user: String,
    grpc: bool,
}

/// Returns `None` when admission rejects the generated objects.
fn build(input: &FuzzInput, force_permissive: bool) -> Option<PolicySnapshot> {
    let mut builder = PolicySnapshot::builder().rbac_config(RbacConfig::on()).ok()?;

    for (index, rules) in input.roles.iter().enumerate().take(8) {
        let mut role = ServiceRole::new();
        for rule in rules.iter().take(4) {
            let mut access = AccessRule::for_services(rule.services.iter().cloned());
            access.paths.clone_from(&rule.paths);
            access.methods.clone_from(&rule.methods);
            if let Some((key, values)) = &rule.constraint {
                access = access.with_constraint(Constraint::new(key.clone(), values.clone()));
            }
            role = role.with_rule(access);
        }
        builder = builder.role("default", format!("role-{index}"), role).ok()?;
    }

    for (index, b) in input.bindings.iter().enumerate().take(8) {
        let subject = match &b.user {
            Some(user) => Subject::user(user.clone()),
            None => Subject::any(),
        };
        let mode = if force_permissive || b.permissive {
            EnforcementMode::Permissive
        } else {
            EnforcementMode::Enforced
        };
        // Role indexes past the admitted roles exercise dangling references.
        let binding = ServiceRoleBinding::new(format!("role-{}", b.role % 10))
            .with_subject(subject)
            .with_mode(mode);
        builder = builder
            .binding("default", format!("binding-{index}"), binding)
            .ok()?;
    }

    Some(builder.build())
}

fuzz_target!(|input: FuzzInput| {
    let (Some(snapshot), Some(shadow)) = (build(&input, false), build(&input, true)) else {
        return;
    };

    let mut req = RequestContext::new(input.service.clone(), "default")
        .with_path(input.path.clone())
        .with_method(input.method.clone())
        .with_caller(Caller::new().with_user(input.user.clone()));
    if input.grpc {
        req = req.grpc();
    }

    let engine = DecisionEngine::new().without_audit();
    let decision = engine.decide(&snapshot, &req);
    let shadow_decision = engine.decide(&shadow, &req);

    // 1. Permissive-only snapshots never allow.
    assert_eq!(shadow_decision.verdict, Verdict::Deny);
    assert!(shadow_decision.audit.enforced.is_none());

    if decision.verdict == Verdict::Allow {
        // 2. Allows name a real binding.
        assert_eq!(decision.reason, DecisionReason::EnforcedBinding);
        let id = decision.audit.enforced.as_ref().expect("allow names a binding");
        assert!(snapshot.bindings("default").iter().any(|b| b.name == id.name));

        // 3. The same binding would have allowed in permissive mode.
        assert!(shadow_decision.audit.permissive.iter().any(|b| b.name == id.name));
    }
});
