//! Shared runtime state for spool-daemon.
//!
//! All types here are `Clone`-able (via `Arc`). Handlers receive
//! `State<Arc<AppState<B>>>` from Axum; this module owns nothing async
//! itself besides the heartbeat task it spawns.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spool_audit::AuditLog;
use spool_locks::LockService;
use spool_repo::{SpoolRepository, UnionRepository};
use spool_schemas::{TagSpool, WorkerId};
use spool_store::{SheetsBackend, SheetsGateway};
use spool_workflow::{EventSink, OccupationEvent, OccupationEventKind, OccupationWorkflow};
use tokio::sync::broadcast;

/// Live Event Bus (spec.md §4.10) payload fanned out over SSE. Occupation
/// events carry the workflow's own event kind; `Heartbeat` keeps
/// intermediaries from closing an idle stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Occupation {
        kind: &'static str,
        tag_spool: TagSpool,
        worker: Option<WorkerId>,
        estado_detalle: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

fn kind_name(kind: OccupationEventKind) -> &'static str {
    match kind {
        OccupationEventKind::Tomar => "TOMAR",
        OccupationEventKind::Pausar => "PAUSAR",
        OccupationEventKind::Completar => "COMPLETAR",
        OccupationEventKind::Iniciar => "INICIAR",
        OccupationEventKind::Finalizar => "FINALIZAR",
        OccupationEventKind::Cancelado => "CANCELADO",
        OccupationEventKind::StateChange => "STATE_CHANGE",
        OccupationEventKind::MetrologiaAutoTriggered => "METROLOGIA_AUTO_TRIGGERED",
    }
}

/// Publisher half of the bus, handed to [`OccupationWorkflow`] as its
/// [`EventSink`]. Fan-out to subscribers is `tokio::sync::broadcast`'s own
/// non-blocking send — a slow subscriber lags and reconciles on
/// reconnect rather than ever blocking this publish call (spec.md §4.10,
/// §5).
pub struct BroadcastEventSink {
    bus: broadcast::Sender<BusMsg>,
}

impl BroadcastEventSink {
    pub fn new(bus: broadcast::Sender<BusMsg>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn publish(&self, event: OccupationEvent) {
        let _ = self.bus.send(BusMsg::Occupation {
            kind: kind_name(event.kind),
            tag_spool: event.tag_spool,
            worker: event.worker,
            estado_detalle: event.estado_detalle,
            timestamp: event.timestamp,
        });
    }
}

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
pub struct AppState<B: SheetsBackend> {
    pub workflow: OccupationWorkflow<B>,
    pub spools: SpoolRepository<B>,
    pub unions: UnionRepository<B>,
    pub audit: Arc<AuditLog<B>>,
    pub locks: Arc<LockService>,
    pub gateway: Arc<SheetsGateway<B>>,
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    started_at: Instant,
}

impl<B: SheetsBackend> AppState<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workflow: OccupationWorkflow<B>,
        spools: SpoolRepository<B>,
        unions: UnionRepository<B>,
        audit: Arc<AuditLog<B>>,
        locks: Arc<LockService>,
        gateway: Arc<SheetsGateway<B>>,
        bus: broadcast::Sender<BusMsg>,
    ) -> Self {
        Self {
            workflow,
            spools,
            unions,
            audit,
            locks,
            gateway,
            bus,
            build: BuildInfo { service: "spool-daemon", version: env!("CARGO_PKG_VERSION") },
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// `(writes observed in the trailing 60s, burst flag)` — spec.md §4.1/§9
    /// rate-monitor snapshot surfaced on `/v4/health`.
    pub fn write_rate(&self) -> (usize, bool) {
        let rm = self.gateway.rate_monitor();
        (rm.rpm(), rm.burst())
    }
}

/// Spawn a background task that emits a heartbeat SSE every `interval`
/// (spec.md §4.10: "Heartbeat every 15 s").
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: Utc::now().timestamp_millis() });
        }
    });
}
