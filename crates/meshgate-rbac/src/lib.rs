//! # meshgate-rbac: Role-Based Access Control for service meshes
//!
//! Decides whether a request between services may proceed, given:
//! - **ServiceRoles**: sets of access rules (services, paths, methods, ports, constraints)
//! - **ServiceRoleBindings**: subjects assigned to a role, enforced or permissive
//! - **RbacConfig**: the mesh-wide switch scoping where RBAC applies
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  RequestContext                             │
//! │  (service, namespace, path, method, caller) │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  DecisionEngine                             │
//! │  ├─ Scope resolution (RbacConfig)           │
//! │  ├─ Subject matching (bindings, OR)         │
//! │  ├─ Role resolution (same namespace)        │
//! │  └─ Rule matching (rules OR, fields AND)    │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision                                   │
//! │  - Verdict (ALLOW/DENY)                     │
//! │  - Reason (bypass / enforced / no match)    │
//! │  - Audit (enforced, would-allow, misses)    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Patterns
//!
//! Every service, path, method, subject and constraint value is a pattern:
//! `"*"`, `"prefix*"`, `"*suffix"` or an exact, case-sensitive literal.
//!
//! ## Example
//!
//! ```
//! use meshgate_rbac::{
//!     AccessRule, Caller, Constraint, DecisionEngine, PolicySnapshot, RbacConfig,
//!     RequestContext, ServiceRole, ServiceRoleBinding, Subject, Verdict,
//! };
//!
//! let viewer = ServiceRole::new().with_rule(
//!     AccessRule::for_services(["products.svc.cluster.local"])
//!         .with_method("GET")
//!         .with_method("HEAD")
//!         .with_constraint(Constraint::new("destination.labels[version]", ["v1", "v2"])),
//! );
//!
//! let snapshot = PolicySnapshot::builder()
//!     .rbac_config(RbacConfig::on())?
//!     .role("default", "product-viewer", viewer)?
//!     .binding(
//!         "default",
//!         "bind-alice",
//!         ServiceRoleBinding::new("product-viewer")
//!             .with_subject(Subject::user("alice@yahoo.com")),
//!     )?
//!     .build();
//!
//! let request = RequestContext::new("products.svc.cluster.local", "default")
//!     .with_method("GET")
//!     .with_label("version", "v1")
//!     .with_caller(Caller::new().with_user("alice@yahoo.com"));
//!
//! let engine = DecisionEngine::new();
//! assert_eq!(engine.decide(&snapshot, &request).verdict, Verdict::Allow);
//!
//! let request = request.with_label("version", "v3");
//! assert_eq!(engine.decide(&snapshot, &request).verdict, Verdict::Deny);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Concurrency
//!
//! [`PolicySnapshot`] is immutable. Publish new configuration through a
//! [`SnapshotHandle`]; in-flight decisions keep the snapshot they loaded.

pub mod binding;
pub mod document;
pub mod enforcement;
pub mod pattern;
pub mod request;
pub mod role;
pub mod rule;
pub mod scope;
pub mod snapshot;
pub mod validation;

// Re-export commonly used types
pub use binding::{EnforcementMode, RoleRef, SERVICE_ROLE_KIND, ServiceRoleBinding, Subject};
pub use document::{BindingEntry, DocumentError, PolicyDocument, RoleEntry};
pub use enforcement::{
    AuditRecord, BindingId, Decision, DecisionEngine, DecisionReason, EnforcementError,
    ResolutionFailure, ResolutionMiss, Verdict,
};
pub use request::{Caller, Protocol, RequestContext};
pub use role::ServiceRole;
pub use rule::{AccessRule, Constraint};
pub use scope::{RbacConfig, RbacMode, Target};
pub use snapshot::{
    NamedBinding, NamespacePolicies, PolicySnapshot, SnapshotBuilder, SnapshotError,
    SnapshotHandle,
};
pub use validation::ConfigurationError;

// Kani proofs for bounded model checking
#[cfg(kani)]
mod kani_proofs;
