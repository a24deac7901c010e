//! Worker directory (spec.md §3: "read-only to this core"; §1 out of scope:
//! "identity of workers").
//!
//! This core never authenticates or manages workers — it only needs to
//! render `INITIALS(ID)` on audit rows and check active/role flags. The
//! daemon resolves that lookup against a static roster loaded once at boot
//! from config, the same shape `spool-testkit::StaticWorkerDirectory` uses
//! for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use spool_schemas::{Role, Worker, WorkerId};
use spool_workflow::WorkerDirectory;

#[derive(Debug, Deserialize)]
struct WorkerEntry {
    id: String,
    initials: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    roles: Vec<Role>,
}

fn default_active() -> bool {
    true
}

/// Read-only roster resolved once at boot from the `/workers` config
/// section. No network calls, no caching discipline needed — this is
/// exactly the shape `StaticWorkerDirectory` uses in tests.
pub struct ConfigWorkerDirectory {
    workers: HashMap<WorkerId, Worker>,
}

impl ConfigWorkerDirectory {
    /// Parse the `/workers` array out of the loaded config JSON. Missing or
    /// empty is valid (an empty roster; every occupation call will then
    /// fail `NotAuthorized`, which is the correct fail-closed behavior).
    pub fn from_config(config_json: &serde_json::Value) -> anyhow::Result<Self> {
        let entries: Vec<WorkerEntry> = match config_json.pointer("/workers") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => Vec::new(),
        };
        let workers = entries
            .into_iter()
            .map(|e| {
                (
                    e.id.clone(),
                    Worker { id: e.id, initials: e.initials, active: e.active, roles: e.roles },
                )
            })
            .collect();
        Ok(Self { workers })
    }
}

#[async_trait]
impl WorkerDirectory for ConfigWorkerDirectory {
    async fn get(&self, worker_id: &str) -> Option<Worker> {
        self.workers.get(worker_id).filter(|w| w.active).cloned()
    }
}
