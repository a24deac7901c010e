//! Axum router and all HTTP handlers for spool-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so integration tests can
//! compose the router directly.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{async_trait, Json, Router};
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use spool_schemas::TagSpool;
use spool_store::SheetsBackend;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::api_types::{
    domain_error_response, ActionDto, AuditHealthResponse, CancelarRequest, DisponiblesQuery,
    DisponiblesResponse, FinalizarRequest, FinalizarResponse, HealthResponse, IniciarRequest,
    IniciarResponse, LegacyOccupationRequest, LegacyOccupationResponse, LockProbeResponse,
    MetricasResponse, UnionSummary,
};
use crate::state::{AppState, BusMsg};

// ---------------------------------------------------------------------------
// 422 validation (spec.md §7: malformed request bodies are 422, not 400)
// ---------------------------------------------------------------------------

/// `Json<T>` extractor that rejects with `422 Unprocessable Entity` instead
/// of axum's default `400 Bad Request`, matching the validation contract
/// spec.md §7 names.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(v)) => Ok(ValidatedJson(v)),
            Err(rejection) => {
                let message = rejection.body_text();
                Err((
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(serde_json::json!({
                        "error_kind": "VALIDATION_ERROR",
                        "message": message,
                        "details": null,
                    })),
                )
                    .into_response())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router<B: SheetsBackend + 'static>(state: Arc<AppState<B>>) -> Router {
    Router::new()
        .route("/v4/health", get(health::<B>))
        .route("/v4/audit/health", get(audit_health::<B>))
        .route("/v4/stream", get(stream::<B>))
        .route("/v4/occupation/iniciar/:tag", post(iniciar::<B>))
        .route("/v4/occupation/finalizar/:tag", post(finalizar::<B>))
        .route("/v4/occupation/cancelar/:tag", post(cancelar::<B>))
        .route("/v4/uniones/:tag/disponibles", get(disponibles::<B>))
        .route("/v4/uniones/:tag/metricas", get(metricas::<B>))
        .route("/v4/locks/:tag", get(lock_probe::<B>))
        .route("/v4/metrologia/completar/:tag", post(metrologia_completar::<B>))
        .route("/v3/occupation/tomar/:tag", post(tomar::<B>))
        .route("/v3/occupation/pausar/:tag", post(pausar::<B>))
        .route("/v3/occupation/completar/:tag", post(completar::<B>))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v4/health, /v4/audit/health
// ---------------------------------------------------------------------------

async fn health<B: SheetsBackend + 'static>(State(st): State<Arc<AppState<B>>>) -> impl IntoResponse {
    let (writes_per_min, write_burst) = st.write_rate();
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            writes_per_min,
            write_burst,
        }),
    )
}

async fn audit_health<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
) -> impl IntoResponse {
    let snap = st.audit.health();
    (
        StatusCode::OK,
        Json(AuditHealthResponse {
            degraded: snap.is_degraded(),
            last_degraded_at: snap.last_degraded_at,
            last_error: snap.last_error,
            degraded_batches: snap.degraded_batches,
        }),
    )
}

// ---------------------------------------------------------------------------
// v4 occupation endpoints
// ---------------------------------------------------------------------------

#[tracing::instrument(skip(st, body), fields(tag_spool = %tag, worker_id = %body.worker_id, operacion = ?body.operacion))]
async fn iniciar<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(tag): Path<TagSpool>,
    ValidatedJson(body): ValidatedJson<IniciarRequest>,
) -> Response {
    match st.workflow.iniciar(&tag, &body.worker_id, body.operacion).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(IniciarResponse {
                tag_spool: outcome.tag_spool,
                ocupado_por: outcome.ocupado_por,
                fecha_ocupacion: outcome.fecha_ocupacion,
            }),
        )
            .into_response(),
        Err(e) => domain_error_response(e).into_response(),
    }
}

#[tracing::instrument(skip(st, body), fields(tag_spool = %tag, worker_id = %body.worker_id, operacion = ?body.operacion))]
async fn finalizar<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(tag): Path<TagSpool>,
    ValidatedJson(body): ValidatedJson<FinalizarRequest>,
) -> Response {
    match st
        .workflow
        .finalizar(&tag, &body.worker_id, body.operacion, &body.selected_ids)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(FinalizarResponse {
                tag_spool: outcome.tag_spool,
                action: ActionDto::from(outcome.action),
                unions_processed: outcome.unions_processed,
                pulgadas: outcome.pulgadas.as_f64(),
                metrologia_triggered: outcome.metrologia_triggered,
                audit_degraded: outcome.audit_degraded,
                unavailable_unions: outcome.unavailable_unions,
            }),
        )
            .into_response(),
        Err(e) => domain_error_response(e).into_response(),
    }
}

async fn cancelar<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(tag): Path<TagSpool>,
    ValidatedJson(body): ValidatedJson<CancelarRequest>,
) -> Response {
    match st.workflow.cancelar(&tag, &body.worker_id, body.operacion).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(FinalizarResponse {
                tag_spool: outcome.tag_spool,
                action: ActionDto::from(outcome.action),
                unions_processed: outcome.unions_processed,
                pulgadas: outcome.pulgadas.as_f64(),
                metrologia_triggered: outcome.metrologia_triggered,
                audit_degraded: outcome.audit_degraded,
                unavailable_unions: outcome.unavailable_unions,
            }),
        )
            .into_response(),
        Err(e) => domain_error_response(e).into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /v4/uniones/:tag/disponibles, /metricas
// ---------------------------------------------------------------------------

async fn disponibles<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(tag): Path<TagSpool>,
    Query(q): Query<DisponiblesQuery>,
) -> Response {
    match st.unions.available_for(&tag, q.operacion).await {
        Ok(unions) => (
            StatusCode::OK,
            Json(DisponiblesResponse {
                tag_spool: tag,
                operacion: q.operacion,
                unions: unions
                    .into_iter()
                    .map(|u| UnionSummary {
                        n_union: u.n_union,
                        dn_union: u.dn_union.as_f64(),
                        tipo_union: u.tipo_union,
                    })
                    .collect(),
            }),
        )
            .into_response(),
        Err(e) => domain_error_response(e.into()).into_response(),
    }
}

async fn metricas<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(tag): Path<TagSpool>,
) -> Response {
    let spool = match st.spools.get(&tag).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            return domain_error_response(spool_workflow::DomainError::SpoolNotFound(tag)).into_response()
        }
        Err(e) => return domain_error_response(e.into()).into_response(),
    };
    (
        StatusCode::OK,
        Json(MetricasResponse {
            tag_spool: spool.tag_spool,
            total_uniones: spool.total_uniones,
            uniones_arm_completadas: spool.uniones_arm_completadas,
            uniones_sold_completadas: spool.uniones_sold_completadas,
            pulgadas_arm: spool.pulgadas_arm.as_f64(),
            pulgadas_sold: spool.pulgadas_sold.as_f64(),
            estado_detalle: spool.estado_detalle,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// v3 legacy endpoints (spool-level, no union rows — Operacion is still
// required on every mutation, spec.md §9)
// ---------------------------------------------------------------------------

async fn tomar<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(tag): Path<TagSpool>,
    ValidatedJson(body): ValidatedJson<LegacyOccupationRequest>,
) -> Response {
    match st.workflow.tomar(&tag, &body.worker_id, body.operacion).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(IniciarResponse {
                tag_spool: outcome.tag_spool,
                ocupado_por: outcome.ocupado_por,
                fecha_ocupacion: outcome.fecha_ocupacion,
            }),
        )
            .into_response(),
        Err(e) => domain_error_response(e).into_response(),
    }
}

async fn pausar<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(tag): Path<TagSpool>,
    ValidatedJson(body): ValidatedJson<LegacyOccupationRequest>,
) -> Response {
    match st.workflow.pausar(&tag, &body.worker_id, body.operacion).await {
        Ok(outcome) => legacy_response(outcome).into_response(),
        Err(e) => domain_error_response(e).into_response(),
    }
}

async fn completar<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(tag): Path<TagSpool>,
    ValidatedJson(body): ValidatedJson<LegacyOccupationRequest>,
) -> Response {
    match st.workflow.completar(&tag, &body.worker_id, body.operacion).await {
        Ok(outcome) => legacy_response(outcome).into_response(),
        Err(e) => domain_error_response(e).into_response(),
    }
}

fn legacy_response(outcome: spool_workflow::LegacyOutcome) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(LegacyOccupationResponse {
            tag_spool: outcome.tag_spool,
            audit_degraded: outcome.audit_degraded,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v4/metrologia/completar/:tag (spec.md §4.9 repair-cycle transition)
// ---------------------------------------------------------------------------

async fn metrologia_completar<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(tag): Path<TagSpool>,
    ValidatedJson(body): ValidatedJson<crate::api_types::MetrologiaCompletarRequest>,
) -> Response {
    match st
        .workflow
        .metrologia_completar(&tag, &body.worker_id, body.resultado.into())
        .await
    {
        Ok(outcome) => legacy_response(outcome).into_response(),
        Err(e) => domain_error_response(e).into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /v4/locks/:tag (operator probe, spec.md §4.2: "Probe: owner(tag)")
// ---------------------------------------------------------------------------

async fn lock_probe<B: SheetsBackend + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(tag): Path<TagSpool>,
) -> Response {
    let owner = st.locks.owner(&tag);
    (
        StatusCode::OK,
        Json(LockProbeResponse { tag_spool: tag, locked: owner.is_some(), owner }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v4/stream (SSE, spec.md §4.10)
// ---------------------------------------------------------------------------

async fn stream<B: SheetsBackend + 'static>(State(st): State<Arc<AppState<B>>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(rx: broadcast::Receiver<BusMsg>) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Occupation { .. } => "occupation",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            // lagged subscriber: drop the gap, keep the connection open.
            Err(_) => None,
        }
    })
}
