//! Router-level tests for the HTTP Boundary (C11), driven through
//! `routes::build_router` with `tower::ServiceExt::oneshot()` against an
//! in-memory `AppState<FakeSheetsBackend>` — no daemon process, no network.
//!
//! Mirrors the teacher's in-process Axum testing style; the fixtures come
//! from `spool-testkit`, the same ones `spool-workflow`'s own scenario
//! tests use, so these assert on the HTTP mapping layer only.

use std::sync::Arc;

use http_body_util::BodyExt;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use serde_json::Value;
use spool_audit::AuditLog;
use spool_daemon::routes::build_router;
use spool_daemon::state::{AppState, BroadcastEventSink};
use spool_locks::LockService;
use spool_repo::{SpoolRepository, UnionRepository};
use spool_schemas::Role;
use spool_store::SheetsGateway;
use spool_testkit::{seed_spool, seed_union, FakeSheetsBackend, SpoolFixture, StaticWorkerDirectory};
use spool_workflow::OccupationWorkflow;
use tokio::sync::broadcast;
use tower::ServiceExt;

/// Seed first, then hand the backend to the gateway by value — all test
/// assertions below go through the router's HTTP responses, so nothing
/// needs to read the backend again afterwards.
fn build_state_seeded(seed: impl FnOnce(&FakeSheetsBackend)) -> Arc<AppState<FakeSheetsBackend>> {
    let backend = FakeSheetsBackend::new();
    seed(&backend);
    let gateway = Arc::new(SheetsGateway::new(backend));
    let spools = SpoolRepository::new(Arc::clone(&gateway));
    let unions = UnionRepository::new(Arc::clone(&gateway));
    let audit = Arc::new(AuditLog::new(Arc::clone(&gateway)));
    let locks = Arc::new(LockService::new());
    let workers = Arc::new(
        StaticWorkerDirectory::new()
            .with_worker("93", "MR", vec![Role::Arm, Role::Sold])
            .with_worker("7", "JD", vec![Role::Arm, Role::Sold]),
    );
    let (bus, _rx) = broadcast::channel(64);
    let events = Arc::new(BroadcastEventSink::new(bus.clone()));
    let workflow = OccupationWorkflow::new(
        spools.clone(),
        unions.clone(),
        Arc::clone(&audit),
        Arc::clone(&locks),
        workers,
        events,
    );
    Arc::new(AppState::new(workflow, spools, unions, audit, locks, gateway, bus))
}

fn seed_basic_spool(backend: &FakeSheetsBackend) {
    seed_spool(
        backend,
        SpoolFixture {
            tag_spool: "OT-100".to_string(),
            ot: "OT-100".to_string(),
            fecha_materiales: NaiveDate::from_ymd_opt(2026, 1, 1),
            total_uniones: 2,
        },
    );
    seed_union(backend, "OT-100", 1, 6.0, "BW");
    seed_union(backend, "OT-100", 2, 4.0, "BW");
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn iniciar_then_finalizar_completes_both_unions() {
    let state = build_state_seeded(seed_basic_spool);
    let app = build_router(state);

    let iniciar_req = Request::builder()
        .method("POST")
        .uri("/v4/occupation/iniciar/OT-100")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"worker_id":"93","operacion":"ARM"}"#))
        .unwrap();
    let resp = app.clone().oneshot(iniciar_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ocupado_por"], "93");

    let finalizar_req = Request::builder()
        .method("POST")
        .uri("/v4/occupation/finalizar/OT-100")
        .header("content-type", "application/json")
        .body(Body::from(
            r#"{"worker_id":"93","operacion":"ARM","selected_ids":[1,2]}"#,
        ))
        .unwrap();
    let resp = app.clone().oneshot(finalizar_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["action"], "COMPLETAR");
    assert_eq!(body["unions_processed"], 2);
    assert_eq!(body["unavailable_unions"].as_array().unwrap().len(), 0);

    let lock_req = Request::builder()
        .method("GET")
        .uri("/v4/locks/OT-100")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(lock_req).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["locked"], false);
}

#[tokio::test]
async fn iniciar_on_already_occupied_spool_is_409_spool_occupied() {
    let state = build_state_seeded(seed_basic_spool);
    let app = build_router(state);

    let first = Request::builder()
        .method("POST")
        .uri("/v4/occupation/iniciar/OT-100")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"worker_id":"93","operacion":"ARM"}"#))
        .unwrap();
    assert_eq!(app.clone().oneshot(first).await.unwrap().status(), StatusCode::OK);

    let second = Request::builder()
        .method("POST")
        .uri("/v4/occupation/iniciar/OT-100")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"worker_id":"7","operacion":"ARM"}"#))
        .unwrap();
    let resp = app.oneshot(second).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = body_json(resp).await;
    assert_eq!(body["error_kind"], "SPOOL_OCCUPIED");
    assert_eq!(body["details"]["owner"], "93");
}

#[tokio::test]
async fn iniciar_on_unknown_spool_is_404() {
    let state = build_state_seeded(|_| {});
    let app = build_router(state);

    let req = Request::builder()
        .method("POST")
        .uri("/v4/occupation/iniciar/OT-NOPE")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"worker_id":"93","operacion":"ARM"}"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error_kind"], "SPOOL_NOT_FOUND");
}

#[tokio::test]
async fn malformed_json_body_is_422_not_400() {
    let state = build_state_seeded(seed_basic_spool);
    let app = build_router(state);

    let req = Request::builder()
        .method("POST")
        .uri("/v4/occupation/iniciar/OT-100")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"worker_id": 93"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert_eq!(body["error_kind"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn health_and_disponibles_reflect_seeded_fixture() {
    let state = build_state_seeded(seed_basic_spool);
    let app = build_router(state);

    let health_req = Request::builder().uri("/v4/health").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(health_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], true);

    let disp_req = Request::builder()
        .uri("/v4/uniones/OT-100/disponibles?operacion=ARM")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(disp_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["unions"].as_array().unwrap().len(), 2);
}
