//! The `Meshgate` handle: settings, current policy, and the decision engine.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use meshgate_config::{ConfigLoader, MeshgateConfig, PolicyFormat};
use meshgate_rbac::{
    Decision, DecisionEngine, PolicyDocument, PolicySnapshot, RequestContext, SnapshotError,
    SnapshotHandle,
};
use tracing::{info, warn};

use crate::error::{MeshgateError, Result};

/// Serves RBAC decisions against the most recently published policy.
///
/// `Meshgate` is cheap to share behind an `Arc`; decisions take no write
/// locks and never touch the filesystem. [`reload`](Self::reload) and
/// [`publish`](Self::publish) swap the snapshot atomically: in-flight
/// decisions finish against the snapshot they started with. Publishes are
/// serialized, so the live snapshot always carries the highest revision
/// handed out.
#[derive(Debug)]
pub struct Meshgate {
    config: MeshgateConfig,
    engine: DecisionEngine,
    snapshots: SnapshotHandle,
    /// Next revision to publish. Held across admission and store.
    next_revision: Mutex<u64>,
}

impl Meshgate {
    /// Loads layered settings from `project_dir` and then the policy document.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        let config = ConfigLoader::new().with_project_dir(project_dir).load()?;
        Self::open(config)
    }

    /// Opens with explicit settings and loads the policy document they name.
    pub fn open(config: MeshgateConfig) -> Result<Self> {
        config.validate()?;
        let meshgate = Self::with_snapshot(config, PolicySnapshot::empty());
        meshgate.reload()?;
        Ok(meshgate)
    }

    /// Creates an instance publishing `snapshot`, without reading any file.
    pub fn with_snapshot(config: MeshgateConfig, snapshot: PolicySnapshot) -> Self {
        let engine = DecisionEngine::new().with_audit(config.engine.audit_log);
        let next_revision = snapshot.revision() + 1;
        Self {
            config,
            engine,
            snapshots: SnapshotHandle::new(snapshot),
            next_revision: Mutex::new(next_revision),
        }
    }

    /// Re-reads the policy document and publishes it.
    ///
    /// On failure the current snapshot stays in place.
    pub fn reload(&self) -> Result<u64> {
        let path = &self.config.policy.path;
        let input = fs::read_to_string(path).map_err(|source| MeshgateError::PolicyRead {
            path: path.clone(),
            source,
        })?;

        let parsed = match self.config.policy.effective_format() {
            PolicyFormat::Json => PolicyDocument::from_json_str(&input),
            PolicyFormat::Toml | PolicyFormat::Auto => PolicyDocument::from_toml_str(&input),
        };
        let document = parsed.map_err(|source| {
            warn!(path = %path.display(), error = %source, "Policy document rejected");
            MeshgateError::PolicyInvalid {
                path: path.clone(),
                source,
            }
        })?;

        self.publish(document).map_err(|e| match e {
            MeshgateError::Document(source) => {
                warn!(path = %path.display(), error = %source, "Policy document rejected");
                MeshgateError::PolicyInvalid {
                    path: path.clone(),
                    source,
                }
            }
            other => other,
        })
    }

    /// Admits `document` and publishes it as the next snapshot.
    ///
    /// Returns the new revision. A rejected document does not consume a
    /// revision.
    pub fn publish(&self, document: PolicyDocument) -> Result<u64> {
        let mut next_revision = self
            .next_revision
            .lock()
            .map_err(|_| SnapshotError::LockPoisoned)?;
        // Stay ahead of snapshots stored directly through `snapshot_handle`.
        let revision = (*next_revision).max(self.snapshots.load()?.revision() + 1);
        let snapshot = document.into_snapshot(&self.config.engine.default_namespace, revision)?;

        let roles = snapshot.role_count();
        let bindings = snapshot.binding_count();
        let previous = self.snapshots.store(snapshot)?;
        *next_revision = revision + 1;
        drop(next_revision);

        info!(
            revision,
            previous = previous.revision(),
            roles,
            bindings,
            "Published policy snapshot"
        );
        Ok(revision)
    }

    /// Decides `req` against the current snapshot.
    pub fn decide(&self, req: &RequestContext) -> Result<Decision> {
        let snapshot = self.snapshots.load()?;
        Ok(self.engine.decide(&snapshot, req))
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Result<Arc<PolicySnapshot>> {
        Ok(self.snapshots.load()?)
    }

    /// Returns a handle to the snapshot slot for an external distributor.
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.snapshots.clone()
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn config(&self) -> &MeshgateConfig {
        &self.config
    }
}
