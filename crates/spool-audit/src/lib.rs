//! Audit Log (spec.md §4.4, C4).
//!
//! Append-only event log over the `Metadata` worksheet. Batches auto-chunk
//! at [`CHUNK_SIZE`] rows per append call; events within one logical batch
//! stay contiguous and ordered even when split across chunks. A failed
//! append is demoted to a recorded degradation rather than rolled back —
//! the preceding row writes the workflow already made are not undone
//! (spec.md §4.4, §7: availability over strict atomicity of the audit step).

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use spool_schemas::AuditEvent;
use spool_store::{CellUpdate, Row, SheetsBackend, SheetsGateway, StoreError};
use thiserror::Error;

mod row;

/// Maximum rows per append call (spec.md §4.4).
pub const CHUNK_SIZE: usize = 900;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tracks the last audit append failure for the health endpoint
/// (spec.md §4.4: "surfaces audit degradation in a health endpoint").
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HealthSnapshot {
    pub last_degraded_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub degraded_batches: u64,
}

impl HealthSnapshot {
    pub fn is_degraded(&self) -> bool {
        self.last_degraded_at.is_some()
    }
}

pub struct AuditLog<B: SheetsBackend> {
    gateway: Arc<SheetsGateway<B>>,
    health: Mutex<HealthSnapshot>,
}

impl<B: SheetsBackend> AuditLog<B> {
    /// Takes the same `Arc<SheetsGateway<B>>` the Spool/Union repositories
    /// hold, so the column-map cache and rate monitor (spec.md §4.1, §9) are
    /// shared process-wide rather than duplicated per component.
    pub fn new(gateway: Arc<SheetsGateway<B>>) -> Self {
        Self {
            gateway,
            health: Mutex::new(HealthSnapshot::default()),
        }
    }

    pub fn health(&self) -> HealthSnapshot {
        self.health.lock().expect("audit health mutex poisoned").clone()
    }

    /// Append a single event.
    pub async fn log_event(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.batch_log(std::slice::from_ref(event)).await
    }

    /// Append events in submission order, auto-chunked at [`CHUNK_SIZE`].
    /// Chunk boundaries never reorder events — only split a long batch into
    /// contiguous, order-preserving pieces.
    ///
    /// On failure: logs full diagnostics, records [`HealthSnapshot`]
    /// degradation, and returns `Err` — the caller (Occupation Workflow)
    /// decides whether to demote this to `audit_degraded: true` rather than
    /// fail the whole user-visible operation (spec.md §4.7 failure semantics).
    pub async fn batch_log(&self, events: &[AuditEvent]) -> Result<(), AuditError> {
        if events.is_empty() {
            return Ok(());
        }

        for chunk in events.chunks(CHUNK_SIZE) {
            if let Err(e) = self.append_chunk(chunk).await {
                tracing::error!(
                    error = %e,
                    chunk_len = chunk.len(),
                    audit_degraded = true,
                    "audit log append failed; preceding row writes are NOT rolled back"
                );
                let mut health = self.health.lock().expect("audit health mutex poisoned");
                health.last_degraded_at = Some(Utc::now());
                health.last_error = Some(e.to_string());
                health.degraded_batches += 1;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn append_chunk(&self, events: &[AuditEvent]) -> Result<(), AuditError> {
        let mut rows: Vec<Row> = Vec::with_capacity(events.len());
        for evt in events {
            rows.push(row::event_to_row(&self.gateway, evt).await?);
        }
        self.gateway
            .append_rows(spool_store::worksheets::METADATA, &rows)
            .await?;
        Ok(())
    }
}

/// Re-exported for callers building raw updates against the Metadata sheet
/// directly (none currently do; kept for symmetry with the other repos).
pub type MetadataCellUpdate = CellUpdate;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use spool_schemas::{Accion, EventoTipo, Operacion};
    use spool_store::backend::{CellUpdate as SCellUpdate, Row as SRow};
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    struct FakeBackend {
        header: Vec<String>,
        appended: std::sync::Arc<StdMutex<Vec<SRow>>>,
        fail: bool,
    }

    #[async_trait]
    impl SheetsBackend for FakeBackend {
        async fn header_row(&self, _w: &str) -> Result<Vec<String>, StoreError> {
            Ok(self.header.clone())
        }
        async fn read_worksheet(&self, _w: &str) -> Result<Vec<SRow>, StoreError> {
            Ok(vec![])
        }
        async fn batch_update(&self, _w: &str, _u: &[SCellUpdate]) -> Result<(), StoreError> {
            Ok(())
        }
        async fn append_rows(&self, _w: &str, rows: &[SRow]) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Transport("boom".into()));
            }
            self.appended.lock().unwrap().extend_from_slice(rows);
            Ok(())
        }
    }

    fn sample_event(n: u8) -> AuditEvent {
        AuditEvent {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            evento_tipo: EventoTipo::UnionArmRegistrada,
            tag_spool: "OT-001".into(),
            n_union: Some(n),
            worker_id: "93".into(),
            worker_name: "MR(93)".into(),
            operacion: Operacion::Arm,
            accion: Accion::Finalizar,
            fecha_operacion: Utc::now().date_naive(),
            metadata_json: json!({}),
        }
    }

    #[tokio::test]
    async fn batch_retains_order_across_chunk_boundary() {
        let appended = std::sync::Arc::new(StdMutex::new(vec![]));
        let backend = FakeBackend {
            header: spool_store::columns::METADATA.iter().map(|s| s.to_string()).collect(),
            appended: appended.clone(),
            fail: false,
        };
        let log = AuditLog::new(std::sync::Arc::new(SheetsGateway::new(backend)));

        let events: Vec<_> = (0..1500u16).map(|i| sample_event((i % 20) as u8 + 1)).collect();
        log.batch_log(&events).await.unwrap();

        assert_eq!(appended.lock().unwrap().len(), 1500);
    }

    #[tokio::test]
    async fn failed_append_records_degradation_but_does_not_panic() {
        let backend = FakeBackend {
            header: spool_store::columns::METADATA.iter().map(|s| s.to_string()).collect(),
            appended: std::sync::Arc::new(StdMutex::new(vec![])),
            fail: true,
        };
        let log = AuditLog::new(std::sync::Arc::new(SheetsGateway::new(backend)));
        let err = log.log_event(&sample_event(1)).await;
        assert!(err.is_err());
        assert!(log.health().is_degraded());
    }
}
