//! spool-daemon entry point.
//!
//! This file is intentionally thin: it loads config, resolves secrets,
//! wires the tabular-store gateway and every repository/service on top of
//! it, then starts the HTTP server. All route handlers live in `routes.rs`;
//! all shared state types live in `state.rs`. Boot is fail-closed: a missing
//! config key, an unresolvable secret, or a schema validation failure exits
//! non-zero before the listener ever binds (spec.md §6).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use spool_audit::AuditLog;
use spool_config::secrets::resolve_boot_config_strict;
use spool_config::{load_layered_yaml, warn_unused_keys};
use spool_daemon::workers::ConfigWorkerDirectory;
use spool_daemon::{routes, state};
use spool_locks::LockService;
use spool_repo::{SpoolRepository, UnionRepository};
use spool_store::{columns, worksheets, GoogleSheetsBackend, SheetsGateway};
use spool_workflow::OccupationWorkflow;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing —
    // production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config_paths = config_paths_from_env();
    let path_refs: Vec<&str> = config_paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs).context("loading daemon config")?;
    info!(config_hash = %loaded.config_hash, paths = ?config_paths, "config loaded");
    warn_unused_keys(&loaded.config_json);

    let boot = resolve_boot_config_strict(&loaded.config_json).context("resolving boot config")?;
    info!(?boot, "boot config resolved");

    let base_url = loaded
        .config_json
        .pointer("/store/base_url")
        .and_then(|v| v.as_str())
        .unwrap_or("https://sheets.googleapis.com")
        .to_string();

    let backend = GoogleSheetsBackend::new(base_url, boot.store_id.clone(), boot.store_credential.clone());
    let gateway = Arc::new(SheetsGateway::new(backend));

    // Fail closed: every required column must resolve before we accept traffic.
    gateway
        .validate_schema(worksheets::OPERACIONES, columns::OPERACIONES)
        .await
        .context("validating Operaciones schema")?;
    gateway
        .validate_schema(worksheets::UNIONES, columns::UNIONES)
        .await
        .context("validating Uniones schema")?;
    gateway
        .validate_schema(worksheets::METADATA, columns::METADATA)
        .await
        .context("validating Metadata schema")?;

    let spools = SpoolRepository::new(Arc::clone(&gateway));
    let unions = UnionRepository::new(Arc::clone(&gateway));
    let audit = Arc::new(AuditLog::new(Arc::clone(&gateway)));
    let locks = Arc::new(LockService::new());

    let workers = Arc::new(
        ConfigWorkerDirectory::from_config(&loaded.config_json).context("parsing worker roster")?,
    );

    let (bus, _rx) = tokio::sync::broadcast::channel(1024);
    let events = Arc::new(state::BroadcastEventSink::new(bus.clone()));

    let workflow = OccupationWorkflow::new(
        spools.clone(),
        unions.clone(),
        Arc::clone(&audit),
        Arc::clone(&locks),
        workers,
        events,
    );

    let shared = Arc::new(state::AppState::new(
        workflow,
        spools,
        unions,
        audit,
        locks,
        Arc::clone(&gateway),
        bus.clone(),
    ));

    state::spawn_heartbeat(bus, Duration::from_secs(15));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("spool-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `SPOOL_CONFIG_PATHS` is a colon-separated list of YAML layers, applied in
/// order (later overrides earlier). Defaults to a single `config/base.yaml`.
fn config_paths_from_env() -> Vec<String> {
    match std::env::var("SPOOL_CONFIG_PATHS") {
        Ok(v) => v.split(':').map(str::to_string).collect(),
        Err(_) => vec!["config/base.yaml".to_string()],
    }
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("SPOOL_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins — this daemon serves a local shop-floor
/// client, never a public one.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
