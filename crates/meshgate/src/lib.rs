//! # meshgate
//!
//! Role-based access control decisions for service-to-service traffic.
//!
//! meshgate reads a declarative policy document (roles, bindings, and the
//! mesh-wide RBAC switch), admits it into an immutable snapshot, and answers
//! "may this caller make this request?" for an enforcement proxy.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌────────────────┐
//! │ meshgate.toml│ → │ PolicyDocument│ → │ PolicySnapshot │
//! │ policy.toml  │   │  (admission)  │   │ (atomic swap)  │
//! └──────────────┘   └───────────────┘   └───────┬────────┘
//!                                                │
//!                    RequestContext ──→ DecisionEngine ──→ Decision
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use meshgate::{Caller, Meshgate, RequestContext};
//!
//! let gate = Meshgate::load_from_dir("/etc/meshgate")?;
//!
//! let request = RequestContext::new("products.svc.cluster.local", "default")
//!     .with_path("/products/1")
//!     .with_method("GET")
//!     .with_caller(Caller::new().with_user("alice@yahoo.com"));
//!
//! if gate.decide(&request)?.is_allowed() {
//!     // forward
//! }
//!
//! // After the policy file changes:
//! gate.reload()?;
//! ```

mod error;
mod meshgate;

pub use error::{MeshgateError, Result};
pub use meshgate::Meshgate;

// Re-export settings
pub use meshgate_config::{ConfigLoader, EngineConfig, MeshgateConfig, PolicyConfig, PolicyFormat};

// Re-export the RBAC model and engine
pub use meshgate_rbac::{
    AccessRule, AuditRecord, BindingEntry, BindingId, Caller, ConfigurationError, Constraint,
    Decision, DecisionEngine, DecisionReason, DocumentError, EnforcementError, EnforcementMode,
    PolicyDocument, PolicySnapshot, Protocol, RbacConfig, RbacMode, RequestContext,
    ResolutionFailure, ResolutionMiss, RoleEntry, RoleRef, ServiceRole, ServiceRoleBinding,
    SnapshotBuilder, SnapshotError, SnapshotHandle, Subject, Target, Verdict,
};
