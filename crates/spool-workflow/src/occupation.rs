//! Occupation Workflow (spec.md §4.7, C7) — the heart of the system.
//!
//! Wires the Lock Service, Spool/Union Repositories, Version/Conflict
//! Service, Audit Log, and Live Event Bus into the INICIAR/FINALIZAR and
//! legacy TOMAR/PAUSAR/COMPLETAR/CANCELAR endpoints. Depends on the tabular
//! store only through `spool-repo`'s repositories (generic over
//! `SheetsBackend`) and on the worker directory / event bus through the
//! two async traits below, so `spool-testkit` fakes and `spool-daemon`'s
//! real implementations share one contract.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use spool_audit::AuditLog;
use spool_locks::LockService;
use spool_repo::{retry_on_conflict, RepoError, SpoolMetricsUpdate, SpoolRepository, UnionRepository};
use spool_schemas::{Accion, EventoTipo, Operacion, TagSpool, Worker, WorkerId};
use spool_store::SheetsBackend;
use uuid::Uuid;

use crate::error::DomainError;
use crate::selection::{plan_finalizar, FinalizarAction, SelectionPlan};

/// Read-only lookup of worker identity (spec.md §3: "read-only to this
/// core"). `spool-daemon` backs this by the same tabular store's worker
/// sheet (out of scope for this core per spec.md §1); `spool-testkit`
/// backs it with a static map.
#[async_trait]
pub trait WorkerDirectory: Send + Sync {
    async fn get(&self, worker_id: &str) -> Option<Worker>;
}

/// Live Event Bus event kinds (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupationEventKind {
    Tomar,
    Pausar,
    Completar,
    Iniciar,
    Finalizar,
    Cancelado,
    StateChange,
    MetrologiaAutoTriggered,
}

#[derive(Debug, Clone)]
pub struct OccupationEvent {
    pub kind: OccupationEventKind,
    pub tag_spool: TagSpool,
    pub worker: Option<WorkerId>,
    pub estado_detalle: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Publisher half of the Live Event Bus (spec.md §4.10). Delivery is
/// best-effort at-most-once; a slow or gone subscriber never surfaces back
/// here as an error — `publish` cannot fail from this workflow's
/// perspective.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: OccupationEvent);
}

#[derive(Debug, Clone)]
pub struct IniciarOutcome {
    pub tag_spool: TagSpool,
    pub ocupado_por: WorkerId,
    pub fecha_ocupacion: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FinalizarOutcome {
    pub tag_spool: TagSpool,
    pub action: FinalizarAction,
    pub unions_processed: u32,
    pub pulgadas: spool_schemas::Inches,
    pub metrologia_triggered: bool,
    pub audit_degraded: bool,
    /// Ids the client requested that had already raced away by the last
    /// fresh read (spec.md §4.7 step 2, S4).
    pub unavailable_unions: Vec<u8>,
}

/// Legacy v3 TOMAR/PAUSAR/COMPLETAR outcome — spool-level only, no union
/// rows involved (spec.md §4.7 table row 3).
#[derive(Debug, Clone)]
pub struct LegacyOutcome {
    pub tag_spool: TagSpool,
    pub audit_degraded: bool,
}

pub struct OccupationWorkflow<B: SheetsBackend> {
    spools: SpoolRepository<B>,
    unions: UnionRepository<B>,
    audit: Arc<AuditLog<B>>,
    locks: Arc<LockService>,
    workers: Arc<dyn WorkerDirectory>,
    events: Arc<dyn EventSink>,
}

impl<B: SheetsBackend + 'static> OccupationWorkflow<B> {
    pub fn new(
        spools: SpoolRepository<B>,
        unions: UnionRepository<B>,
        audit: Arc<AuditLog<B>>,
        locks: Arc<LockService>,
        workers: Arc<dyn WorkerDirectory>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self { spools, unions, audit, locks, workers, events }
    }

    /// `true` if the append failed (and was demoted to a logged
    /// degradation rather than raised — spec.md §4.4, §4.7 failure
    /// semantics).
    async fn append_audit(&self, events: &[spool_schemas::AuditEvent]) -> bool {
        match self.audit.batch_log(events).await {
            Ok(()) => false,
            Err(e) => {
                tracing::warn!(error = %e, "audit append degraded; preceding writes stand");
                true
            }
        }
    }

    // -----------------------------------------------------------------
    // INICIAR (spec.md §4.7 table row 1)
    // -----------------------------------------------------------------

    #[tracing::instrument(skip(self), fields(tag_spool = %tag, worker_id = %worker_id, operacion = ?op))]
    pub async fn iniciar(
        &self,
        tag: &TagSpool,
        worker_id: &WorkerId,
        op: Operacion,
    ) -> Result<IniciarOutcome, DomainError> {
        let worker = self.workers.get(worker_id).await.ok_or(DomainError::NotAuthorized)?;
        let spool = self
            .spools
            .get(tag)
            .await?
            .ok_or_else(|| DomainError::SpoolNotFound(tag.clone()))?;

        if !spool.is_v4() {
            return Err(DomainError::WrongVersion { correct_endpoint: "/v3/occupation/tomar" });
        }
        if spool.fecha_materiales.is_none() {
            return Err(DomainError::MissingMaterials);
        }
        if op == Operacion::Sold {
            let unions = self.unions.by_spool(tag).await?;
            if !unions.iter().any(|u| u.arm_fecha_fin.is_some()) {
                return Err(DomainError::ArmPrerequisite);
            }
        }

        let now = Utc::now();
        self.locks.reconcile(tag, spool.ocupado_por.is_none(), now);
        self.locks.try_acquire(tag, worker_id)?;

        let write_result: Result<Uuid, RepoError> = retry_on_conflict(|_attempt| {
            let spools = self.spools.clone();
            let tag = tag.clone();
            let worker_id = worker_id.clone();
            async move {
                let current = spools
                    .get(&tag)
                    .await?
                    .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
                spools.set_occupation(&tag, &worker_id, now, current.version).await
            }
        })
        .await;

        if let Err(e) = write_result {
            let _ = self.locks.release_by_owner(tag, worker_id);
            return Err(e.into());
        }

        let event = spool_schemas::AuditEvent {
            event_id: Uuid::new_v4(),
            timestamp: now,
            evento_tipo: EventoTipo::IniciarSpool,
            tag_spool: tag.clone(),
            n_union: None,
            worker_id: worker_id.clone(),
            worker_name: worker.rendered(),
            operacion: op,
            accion: Accion::Iniciar,
            fecha_operacion: now.date_naive(),
            metadata_json: json!({}),
        };
        let audit_degraded = self.append_audit(std::slice::from_ref(&event)).await;
        if audit_degraded {
            tracing::warn!(tag_spool = %tag, "INICIAR audit_degraded");
        }

        self.events
            .publish(OccupationEvent {
                kind: OccupationEventKind::Iniciar,
                tag_spool: tag.clone(),
                worker: Some(worker_id.clone()),
                estado_detalle: None,
                timestamp: now,
            })
            .await;

        Ok(IniciarOutcome {
            tag_spool: tag.clone(),
            ocupado_por: worker_id.clone(),
            fecha_ocupacion: now,
        })
    }

    // -----------------------------------------------------------------
    // FINALIZAR (spec.md §4.7 steps 1-10) — the normative algorithm
    // -----------------------------------------------------------------

    #[tracing::instrument(skip(self, selected_ids), fields(tag_spool = %tag, worker_id = %worker_id, operacion = ?op))]
    pub async fn finalizar(
        &self,
        tag: &TagSpool,
        worker_id: &WorkerId,
        op: Operacion,
        selected_ids: &[u8],
    ) -> Result<FinalizarOutcome, DomainError> {
        if !matches!(op, Operacion::Arm | Operacion::Sold) {
            return Err(DomainError::InvalidStateTransition(format!(
                "FINALIZAR is only defined for ARM|SOLD, got {op}"
            )));
        }

        // Step 1: ownership gate.
        if !self.locks.is_owned_by(tag, worker_id) {
            return Err(DomainError::NotAuthorized);
        }
        let worker = self.workers.get(worker_id).await.ok_or(DomainError::NotAuthorized)?;
        let worker_rendered = worker.rendered();

        let spool = self
            .spools
            .get(tag)
            .await?
            .ok_or_else(|| DomainError::SpoolNotFound(tag.clone()))?;
        if !spool.is_v4() {
            return Err(DomainError::WrongVersion { correct_endpoint: "/v3/occupation/completar" });
        }

        // Steps 2-4, retried from step 2 whenever the batch write discovers
        // a union raced to completion after the intersection was taken
        // (spec.md §4.7 step 4, step 6).
        let last_plan: Arc<std::sync::Mutex<Option<SelectionPlan>>> = Arc::new(std::sync::Mutex::new(None));
        let plan_result: Result<SelectionPlan, RepoError> = retry_on_conflict(|_attempt| {
            let unions = self.unions.clone();
            let tag = tag.clone();
            let worker_rendered = worker_rendered.clone();
            let last_plan = Arc::clone(&last_plan);
            async move {
                let available = unions.available_for(&tag, op).await?;
                let now = Utc::now();
                let plan = plan_finalizar(selected_ids, &available, &worker_rendered, now);

                if plan.is_cancelado() {
                    return Ok(plan);
                }

                match unions.batch_set(&tag, op, &plan.completions).await {
                    Ok(()) => Ok(plan),
                    Err(RepoError::UnionAlreadyComplete { .. }) => {
                        *last_plan.lock().expect("last_plan mutex poisoned") = Some(plan);
                        Err(RepoError::VersionConflict(tag.clone()))
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .await;

        let plan = match plan_result {
            Ok(plan) => plan,
            Err(RepoError::VersionConflict(_)) => {
                let raced = last_plan.lock().expect("last_plan mutex poisoned").take();
                return match raced {
                    Some(plan) => Err(DomainError::RaceCondition {
                        unavailable_unions: plan.unavailable,
                        available_count: plan.n,
                        requested_count: selected_ids.len() as u32,
                    }),
                    None => Err(DomainError::VersionConflict),
                };
            }
            // sheets_unavailable during steps 4-5: bubble up, lock retained (spec.md §4.7 failure semantics).
            Err(e) => return Err(e.into()),
        };

        if plan.is_cancelado() {
            return self.cancel_occupation(tag, worker_id, &worker, op, Utc::now()).await;
        }

        // Step 5: metric recompute, under the spool's current version.
        struct MetricsWrite {
            pulgadas: spool_schemas::Inches,
        }
        let metrics: MetricsWrite = retry_on_conflict(|_attempt| {
            let spools = self.spools.clone();
            let unions = self.unions.clone();
            let tag = tag.clone();
            async move {
                let current = spools
                    .get(&tag)
                    .await?
                    .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
                let completadas = unions.count_completed(&tag, op).await?;
                let pulgadas = unions.sum_pulgadas(&tag, op).await?;
                spools
                    .set_metrics(&tag, SpoolMetricsUpdate { op, completadas, pulgadas }, current.version)
                    .await?;
                Ok(MetricsWrite { pulgadas })
            }
        })
        .await?;

        // Step 6: action was already auto-determined in the plan (k==n => COMPLETAR).
        let action = plan.action;
        let now = Utc::now();

        // Step 7: one spool-scope event, then k union-scope events, one batched call.
        let spool_event_kind = match (op, action) {
            (Operacion::Arm, FinalizarAction::Completar) => EventoTipo::SpoolArmCompletado,
            (Operacion::Arm, FinalizarAction::Pausar) => EventoTipo::SpoolArmPausado,
            (Operacion::Sold, FinalizarAction::Completar) => EventoTipo::SpoolSoldCompletado,
            (Operacion::Sold, FinalizarAction::Pausar) => EventoTipo::SpoolSoldPausado,
            _ => unreachable!("cancelado is handled before this point; op is ARM|SOLD only"),
        };
        let union_event_kind = match op {
            Operacion::Arm => EventoTipo::UnionArmRegistrada,
            Operacion::Sold => EventoTipo::UnionSoldRegistrada,
            _ => unreachable!("finalizar only handles ARM|SOLD"),
        };

        let mut events = Vec::with_capacity(1 + plan.selected.len());
        events.push(spool_schemas::AuditEvent {
            event_id: Uuid::new_v4(),
            timestamp: now,
            evento_tipo: spool_event_kind,
            tag_spool: tag.clone(),
            n_union: None,
            worker_id: worker_id.clone(),
            worker_name: worker_rendered.clone(),
            operacion: op,
            accion: Accion::Finalizar,
            fecha_operacion: now.date_naive(),
            metadata_json: json!({
                "total_available": plan.n,
                "selected": plan.k,
                "pulgadas": metrics.pulgadas.as_f64(),
            }),
        });
        for n_union in &plan.selected {
            events.push(spool_schemas::AuditEvent {
                event_id: Uuid::new_v4(),
                timestamp: now,
                evento_tipo: union_event_kind,
                tag_spool: tag.clone(),
                n_union: Some(*n_union),
                worker_id: worker_id.clone(),
                worker_name: worker_rendered.clone(),
                operacion: op,
                accion: Accion::Finalizar,
                fecha_operacion: now.date_naive(),
                metadata_json: json!({}),
            });
        }
        let mut audit_degraded = self.append_audit(&events).await;

        // Step 8: clear occupation, release lock.
        retry_on_conflict(|_attempt| {
            let spools = self.spools.clone();
            let tag = tag.clone();
            async move {
                let current = spools
                    .get(&tag)
                    .await?
                    .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
                spools.clear_occupation(&tag, current.version).await
            }
        })
        .await?;
        let _ = self.locks.release_by_owner(tag, worker_id);

        let live_kind = match action {
            FinalizarAction::Completar => OccupationEventKind::Completar,
            FinalizarAction::Pausar => OccupationEventKind::Pausar,
            FinalizarAction::Cancelado => unreachable!("cancelado is handled before this point"),
        };
        self.events
            .publish(OccupationEvent {
                kind: live_kind,
                tag_spool: tag.clone(),
                worker: Some(worker_id.clone()),
                estado_detalle: None,
                timestamp: now,
            })
            .await;

        // Step 9: metrology auto-trigger, only on COMPLETAR.
        let mut metrologia_triggered = false;
        if action == FinalizarAction::Completar {
            let unions = self.unions.by_spool(tag).await?;
            if crate::state_machine::should_trigger_metrology(&unions) {
                retry_on_conflict(|_attempt| {
                    let spools = self.spools.clone();
                    let tag = tag.clone();
                    async move {
                        let current = spools
                            .get(&tag)
                            .await?
                            .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
                        spools
                            .set_estado_detalle(&tag, "PENDIENTE_METROLOGIA", current.version)
                            .await
                    }
                })
                .await?;

                let trigger_event = spool_schemas::AuditEvent {
                    event_id: Uuid::new_v4(),
                    timestamp: now,
                    evento_tipo: EventoTipo::MetrologiaAutoTriggered,
                    tag_spool: tag.clone(),
                    n_union: None,
                    worker_id: worker_id.clone(),
                    worker_name: worker_rendered.clone(),
                    operacion: Operacion::Metrologia,
                    accion: Accion::AutoTrigger,
                    fecha_operacion: now.date_naive(),
                    metadata_json: json!({}),
                };
                if self.append_audit(std::slice::from_ref(&trigger_event)).await {
                    audit_degraded = true;
                }

                self.events
                    .publish(OccupationEvent {
                        kind: OccupationEventKind::MetrologiaAutoTriggered,
                        tag_spool: tag.clone(),
                        worker: None,
                        estado_detalle: Some("PENDIENTE_METROLOGIA".to_string()),
                        timestamp: now,
                    })
                    .await;

                metrologia_triggered = true;
            }
        }

        Ok(FinalizarOutcome {
            tag_spool: tag.clone(),
            action,
            unions_processed: plan.k,
            pulgadas: metrics.pulgadas,
            metrologia_triggered,
            audit_degraded,
            unavailable_unions: plan.unavailable,
        })
    }

    /// Spec.md §4.7 step 3 (zero-selection) and the CANCELAR endpoint
    /// (table row 4) share this body: clear occupation, release lock,
    /// `SPOOL_CANCELADO` event — note the live event kind is `PAUSAR`, not
    /// `CANCELADO`, exactly as spec.md step 3 specifies.
    async fn cancel_occupation(
        &self,
        tag: &TagSpool,
        worker_id: &WorkerId,
        worker: &Worker,
        op: Operacion,
        now: DateTime<Utc>,
    ) -> Result<FinalizarOutcome, DomainError> {
        retry_on_conflict(|_attempt| {
            let spools = self.spools.clone();
            let tag = tag.clone();
            async move {
                let current = spools
                    .get(&tag)
                    .await?
                    .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
                spools.clear_occupation(&tag, current.version).await
            }
        })
        .await?;
        let _ = self.locks.release_by_owner(tag, worker_id);

        let event = spool_schemas::AuditEvent {
            event_id: Uuid::new_v4(),
            timestamp: now,
            evento_tipo: EventoTipo::SpoolCancelado,
            tag_spool: tag.clone(),
            n_union: None,
            worker_id: worker_id.clone(),
            worker_name: worker.rendered(),
            operacion: op,
            accion: Accion::Finalizar,
            fecha_operacion: now.date_naive(),
            metadata_json: json!({"motivo": "sin uniones"}),
        };
        let audit_degraded = self.append_audit(std::slice::from_ref(&event)).await;

        self.events
            .publish(OccupationEvent {
                kind: OccupationEventKind::Pausar,
                tag_spool: tag.clone(),
                worker: Some(worker_id.clone()),
                estado_detalle: None,
                timestamp: now,
            })
            .await;

        Ok(FinalizarOutcome {
            tag_spool: tag.clone(),
            action: FinalizarAction::Cancelado,
            unions_processed: 0,
            pulgadas: spool_schemas::Inches::ZERO,
            metrologia_triggered: false,
            audit_degraded,
            unavailable_unions: vec![],
        })
    }

    /// CANCELAR endpoint (spec.md §4.7 table row 4): caller owns the lock,
    /// no union selected, applicable to v3 and v4 spools alike.
    pub async fn cancelar(&self, tag: &TagSpool, worker_id: &WorkerId, op: Operacion) -> Result<FinalizarOutcome, DomainError> {
        if !self.locks.is_owned_by(tag, worker_id) {
            return Err(DomainError::NotAuthorized);
        }
        let worker = self.workers.get(worker_id).await.ok_or(DomainError::NotAuthorized)?;
        self.cancel_occupation(tag, worker_id, &worker, op, Utc::now()).await
    }

    // -----------------------------------------------------------------
    // METROLOGIA inspection result (spec.md §4.9, glossary: "repair cycle")
    // -----------------------------------------------------------------

    /// Apply an NDT inspection verdict. Not gated by the Occupation Lock —
    /// metrology is a distinct worker role (spec.md §3 Worker.roles) acting
    /// on a spool no one need be occupying — but it is gated by state: a
    /// spool not currently `PENDIENTE_METROLOGIA`/`PENDIENTE_REPARACION`
    /// has nothing to inspect, and `BLOQUEADO` is terminal (spec.md §4.9,
    /// §2 glossary "Repair cycle").
    pub async fn metrologia_completar(
        &self,
        tag: &TagSpool,
        worker_id: &WorkerId,
        result: crate::state_machine::MetrologyResult,
    ) -> Result<LegacyOutcome, DomainError> {
        let worker = self.workers.get(worker_id).await.ok_or(DomainError::NotAuthorized)?;
        let spool = self
            .spools
            .get(tag)
            .await?
            .ok_or_else(|| DomainError::SpoolNotFound(tag.clone()))?;

        let current = crate::state_machine::MetrologiaState::hydrate(&spool.estado_detalle, spool.repair_cycle);
        if !matches!(
            current,
            crate::state_machine::MetrologiaState::Pendiente
                | crate::state_machine::MetrologiaState::PendienteReparacion
        ) {
            return Err(DomainError::InvalidStateTransition(format!(
                "spool '{tag}' is not awaiting metrology (current: {current})"
            )));
        }

        let (next_estado, next_cycle) = crate::state_machine::apply_metrology_result(result, spool.repair_cycle);
        let now = Utc::now();

        retry_on_conflict(|_attempt| {
            let spools = self.spools.clone();
            let tag = tag.clone();
            async move {
                let current = spools
                    .get(&tag)
                    .await?
                    .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
                spools
                    .set_metrologia_result(&tag, next_estado, next_cycle, current.version)
                    .await
            }
        })
        .await?;

        let (evento_tipo, accion) = match result {
            crate::state_machine::MetrologyResult::Aprobado => (EventoTipo::MetrologiaCompletada, Accion::Completar),
            crate::state_machine::MetrologyResult::Rechazado if next_estado == "BLOQUEADO" => {
                (EventoTipo::MetrologiaCompletada, Accion::Completar)
            }
            crate::state_machine::MetrologyResult::Rechazado => (EventoTipo::ReparacionTomar, Accion::Tomar),
        };
        let event = spool_schemas::AuditEvent {
            event_id: Uuid::new_v4(),
            timestamp: now,
            evento_tipo,
            tag_spool: tag.clone(),
            n_union: None,
            worker_id: worker_id.clone(),
            worker_name: worker.rendered(),
            operacion: Operacion::Metrologia,
            accion,
            fecha_operacion: now.date_naive(),
            metadata_json: json!({"repair_cycle": next_cycle, "estado_detalle": next_estado}),
        };
        let audit_degraded = self.append_audit(std::slice::from_ref(&event)).await;

        self.events
            .publish(OccupationEvent {
                kind: OccupationEventKind::StateChange,
                tag_spool: tag.clone(),
                worker: Some(worker_id.clone()),
                estado_detalle: Some(next_estado.to_string()),
                timestamp: now,
            })
            .await;

        Ok(LegacyOutcome { tag_spool: tag.clone(), audit_degraded })
    }

    // -----------------------------------------------------------------
    // Legacy v3 TOMAR / PAUSAR / COMPLETAR (spec.md §4.7 table row 3)
    // -----------------------------------------------------------------

    /// TOMAR: occupy a legacy (`¬is_v4`) spool — parallels INICIAR at
    /// spool granularity.
    pub async fn tomar(&self, tag: &TagSpool, worker_id: &WorkerId, op: Operacion) -> Result<IniciarOutcome, DomainError> {
        let worker = self.workers.get(worker_id).await.ok_or(DomainError::NotAuthorized)?;
        let spool = self
            .spools
            .get(tag)
            .await?
            .ok_or_else(|| DomainError::SpoolNotFound(tag.clone()))?;
        if spool.is_v4() {
            return Err(DomainError::WrongVersion { correct_endpoint: "/v4/occupation/iniciar" });
        }
        if spool.fecha_materiales.is_none() {
            return Err(DomainError::MissingMaterials);
        }

        let now = Utc::now();
        self.locks.reconcile(tag, spool.ocupado_por.is_none(), now);
        self.locks.try_acquire(tag, worker_id)?;

        let write_result: Result<Uuid, RepoError> = retry_on_conflict(|_attempt| {
            let spools = self.spools.clone();
            let tag = tag.clone();
            let worker_id = worker_id.clone();
            async move {
                let current = spools
                    .get(&tag)
                    .await?
                    .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
                spools.set_occupation(&tag, &worker_id, now, current.version).await
            }
        })
        .await;
        if let Err(e) = write_result {
            let _ = self.locks.release_by_owner(tag, worker_id);
            return Err(e.into());
        }

        let event = spool_schemas::AuditEvent {
            event_id: Uuid::new_v4(),
            timestamp: now,
            evento_tipo: EventoTipo::TomarSpool,
            tag_spool: tag.clone(),
            n_union: None,
            worker_id: worker_id.clone(),
            worker_name: worker.rendered(),
            operacion: op,
            accion: Accion::Tomar,
            fecha_operacion: now.date_naive(),
            metadata_json: json!({}),
        };
        self.append_audit(std::slice::from_ref(&event)).await;

        self.events
            .publish(OccupationEvent {
                kind: OccupationEventKind::Tomar,
                tag_spool: tag.clone(),
                worker: Some(worker_id.clone()),
                estado_detalle: None,
                timestamp: now,
            })
            .await;

        Ok(IniciarOutcome {
            tag_spool: tag.clone(),
            ocupado_por: worker_id.clone(),
            fecha_ocupacion: now,
        })
    }

    /// PAUSAR: release occupation without writing the legacy completion
    /// columns — partial session, no state advance.
    pub async fn pausar(&self, tag: &TagSpool, worker_id: &WorkerId, op: Operacion) -> Result<LegacyOutcome, DomainError> {
        if !self.locks.is_owned_by(tag, worker_id) {
            return Err(DomainError::NotAuthorized);
        }
        let worker = self.workers.get(worker_id).await.ok_or(DomainError::NotAuthorized)?;
        let now = Utc::now();

        retry_on_conflict(|_attempt| {
            let spools = self.spools.clone();
            let tag = tag.clone();
            async move {
                let current = spools
                    .get(&tag)
                    .await?
                    .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
                spools.clear_occupation(&tag, current.version).await
            }
        })
        .await?;
        let _ = self.locks.release_by_owner(tag, worker_id);

        let event = spool_schemas::AuditEvent {
            event_id: Uuid::new_v4(),
            timestamp: now,
            evento_tipo: EventoTipo::PausarSpool,
            tag_spool: tag.clone(),
            n_union: None,
            worker_id: worker_id.clone(),
            worker_name: worker.rendered(),
            operacion: op,
            accion: Accion::Pausar,
            fecha_operacion: now.date_naive(),
            metadata_json: json!({}),
        };
        let audit_degraded = self.append_audit(std::slice::from_ref(&event)).await;

        self.events
            .publish(OccupationEvent {
                kind: OccupationEventKind::Pausar,
                tag_spool: tag.clone(),
                worker: Some(worker_id.clone()),
                estado_detalle: None,
                timestamp: now,
            })
            .await;

        Ok(LegacyOutcome { tag_spool: tag.clone(), audit_degraded })
    }

    /// COMPLETAR: write the legacy spool-level `{Armador,Fecha_Armado}` or
    /// `{Soldador,Fecha_Soldadura}` pair directly, then release.
    pub async fn completar(&self, tag: &TagSpool, worker_id: &WorkerId, op: Operacion) -> Result<LegacyOutcome, DomainError> {
        if !self.locks.is_owned_by(tag, worker_id) {
            return Err(DomainError::NotAuthorized);
        }
        let worker = self.workers.get(worker_id).await.ok_or(DomainError::NotAuthorized)?;
        let now = Utc::now();

        retry_on_conflict(|_attempt| {
            let spools = self.spools.clone();
            let tag = tag.clone();
            let worker_id = worker_id.clone();
            async move {
                let current = spools
                    .get(&tag)
                    .await?
                    .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
                spools
                    .set_legacy_operation(&tag, op, &worker_id, now, current.version)
                    .await
            }
        })
        .await?;
        retry_on_conflict(|_attempt| {
            let spools = self.spools.clone();
            let tag = tag.clone();
            async move {
                let current = spools
                    .get(&tag)
                    .await?
                    .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
                spools.clear_occupation(&tag, current.version).await
            }
        })
        .await?;
        let _ = self.locks.release_by_owner(tag, worker_id);

        let event = spool_schemas::AuditEvent {
            event_id: Uuid::new_v4(),
            timestamp: now,
            evento_tipo: EventoTipo::CompletarSpool,
            tag_spool: tag.clone(),
            n_union: None,
            worker_id: worker_id.clone(),
            worker_name: worker.rendered(),
            operacion: op,
            accion: Accion::Completar,
            fecha_operacion: now.date_naive(),
            metadata_json: json!({}),
        };
        let audit_degraded = self.append_audit(std::slice::from_ref(&event)).await;

        self.events
            .publish(OccupationEvent {
                kind: OccupationEventKind::Completar,
                tag_spool: tag.clone(),
                worker: Some(worker_id.clone()),
                estado_detalle: None,
                timestamp: now,
            })
            .await;

        Ok(LegacyOutcome { tag_spool: tag.clone(), audit_degraded })
    }
}
