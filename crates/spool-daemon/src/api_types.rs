//! Request and response shapes for every spool-daemon HTTP endpoint
//! (spec.md §4.11, §6). No business logic lives here — only
//! (de)serialization and the domain-error-to-HTTP mapping.

use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use spool_schemas::{Operacion, TagSpool, WorkerId};
use spool_workflow::{DomainError, FinalizarAction};

// ---------------------------------------------------------------------------
// /v4/health, /v4/audit/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub writes_per_min: usize,
    pub write_burst: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditHealthResponse {
    pub degraded: bool,
    pub last_degraded_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub degraded_batches: u64,
}

// ---------------------------------------------------------------------------
// v4 occupation requests (spec.md §9: "operacion is required on every
// occupation mutation")
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct IniciarRequest {
    pub worker_id: WorkerId,
    pub operacion: Operacion,
}

#[derive(Debug, Clone, Serialize)]
pub struct IniciarResponse {
    pub tag_spool: TagSpool,
    pub ocupado_por: WorkerId,
    pub fecha_ocupacion: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinalizarRequest {
    pub worker_id: WorkerId,
    pub operacion: Operacion,
    #[serde(default)]
    pub selected_ids: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionDto {
    Completar,
    Pausar,
    Cancelado,
}

impl From<FinalizarAction> for ActionDto {
    fn from(a: FinalizarAction) -> Self {
        match a {
            FinalizarAction::Completar => ActionDto::Completar,
            FinalizarAction::Pausar => ActionDto::Pausar,
            FinalizarAction::Cancelado => ActionDto::Cancelado,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalizarResponse {
    pub tag_spool: TagSpool,
    pub action: ActionDto,
    pub unions_processed: u32,
    pub pulgadas: f64,
    pub metrologia_triggered: bool,
    pub audit_degraded: bool,
    pub unavailable_unions: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelarRequest {
    pub worker_id: WorkerId,
    pub operacion: Operacion,
}

// ---------------------------------------------------------------------------
// POST /v4/metrologia/completar/{tag} (spec.md §4.9, §2 glossary: "repair cycle")
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetrologyResultDto {
    Aprobado,
    Rechazado,
}

impl From<MetrologyResultDto> for spool_workflow::MetrologyResult {
    fn from(d: MetrologyResultDto) -> Self {
        match d {
            MetrologyResultDto::Aprobado => spool_workflow::MetrologyResult::Aprobado,
            MetrologyResultDto::Rechazado => spool_workflow::MetrologyResult::Rechazado,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetrologiaCompletarRequest {
    pub worker_id: WorkerId,
    pub resultado: MetrologyResultDto,
}

// ---------------------------------------------------------------------------
// v3 legacy requests (spool-level, no union rows)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyOccupationRequest {
    pub worker_id: WorkerId,
    pub operacion: Operacion,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegacyOccupationResponse {
    pub tag_spool: TagSpool,
    pub audit_degraded: bool,
}

// ---------------------------------------------------------------------------
// GET /v4/locks/{tag} (operator probe)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LockProbeResponse {
    pub tag_spool: TagSpool,
    pub locked: bool,
    pub owner: Option<WorkerId>,
}

// ---------------------------------------------------------------------------
// GET /v4/uniones/{tag}/disponibles, /metricas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DisponiblesQuery {
    pub operacion: Operacion,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnionSummary {
    pub n_union: u8,
    pub dn_union: f64,
    pub tipo_union: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisponiblesResponse {
    pub tag_spool: TagSpool,
    pub operacion: Operacion,
    pub unions: Vec<UnionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricasResponse {
    pub tag_spool: TagSpool,
    pub total_uniones: u32,
    pub uniones_arm_completadas: u32,
    pub uniones_sold_completadas: u32,
    pub pulgadas_arm: f64,
    pub pulgadas_sold: f64,
    pub estado_detalle: String,
}

// ---------------------------------------------------------------------------
// Error mapping (spec.md §6, §7)
// ---------------------------------------------------------------------------

/// Structured error body every non-2xx response carries (spec.md §7:
/// "`{error_kind, message, details}`").
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error_kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// A response carrying `{error: WRONG_VERSION, correct_endpoint}` — the
/// one error body spec.md §4.11 names a shape for distinct from the
/// general `ErrorBody`.
#[derive(Debug, Clone, Serialize)]
pub struct WrongVersionBody {
    pub error: &'static str,
    pub correct_endpoint: &'static str,
}

pub fn domain_error_response(err: DomainError) -> (StatusCode, Json<serde_json::Value>) {
    let (status, kind, details): (StatusCode, &'static str, Option<serde_json::Value>) = match &err {
        DomainError::SpoolNotFound(_) => (StatusCode::NOT_FOUND, "SPOOL_NOT_FOUND", None),
        DomainError::NotAuthorized => (StatusCode::FORBIDDEN, "NOT_AUTHORIZED", None),
        DomainError::ArmPrerequisite => (StatusCode::FORBIDDEN, "ARM_PREREQUISITE", None),
        DomainError::MissingMaterials => (StatusCode::BAD_REQUEST, "MISSING_MATERIALS", None),
        DomainError::SpoolOccupied { owner } => {
            (StatusCode::CONFLICT, "SPOOL_OCCUPIED", Some(json!({ "owner": owner })))
        }
        DomainError::VersionConflict => (StatusCode::CONFLICT, "VERSION_CONFLICT", None),
        DomainError::RaceCondition { unavailable_unions, available_count, requested_count } => (
            StatusCode::CONFLICT,
            "RACE_CONDITION",
            Some(json!({
                "unavailable_unions": unavailable_unions,
                "available_count": available_count,
                "requested_count": requested_count,
            })),
        ),
        DomainError::InvalidStateTransition(msg) => {
            (StatusCode::BAD_REQUEST, "INVALID_STATE", Some(json!({ "detail": msg })))
        }
        DomainError::WrongVersion { correct_endpoint } => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "WRONG_VERSION", "correct_endpoint": correct_endpoint })),
            );
        }
        DomainError::StoreUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", None),
        DomainError::SchemaInvalid => (StatusCode::SERVICE_UNAVAILABLE, "SCHEMA_INVALID", None),
        DomainError::LockExpired => (StatusCode::CONFLICT, "LOCK_EXPIRED", None),
    };
    let body = ErrorBody { error_kind: kind, message: err.to_string(), details };
    (status, Json(serde_json::to_value(body).expect("ErrorBody always serializes")))
}
