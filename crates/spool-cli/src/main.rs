use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spool_config::secrets::resolve_boot_config;
use spool_config::load_layered_yaml;
use spool_store::{columns, worksheets, GoogleSheetsBackend, SheetsGateway};

#[derive(Parser)]
#[command(name = "spool")]
#[command(about = "spool-daemon operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tabular-store commands
    Store {
        #[command(subcommand)]
        cmd: StoreCmd,
    },

    /// Occupation-lock commands (queries the running daemon)
    Lock {
        #[command(subcommand)]
        cmd: LockCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> site -> ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum StoreCmd {
    /// Connect to the configured tabular store and validate all three
    /// required worksheets, the same check the daemon runs at boot.
    Status {
        /// Layered config paths in merge order
        #[arg(long = "config", default_value = "config/base.yaml")]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum LockCmd {
    /// Probe whether a spool's occupation lock is currently held.
    ///
    /// The lock table lives in the daemon process (spool-locks), not the
    /// tabular store, so this talks to the running daemon's admin endpoint
    /// rather than connecting to anything directly.
    Probe {
        tag_spool: String,

        #[arg(long = "daemon-url", default_value = "http://127.0.0.1:8899")]
        daemon_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Store { cmd } => match cmd {
            StoreCmd::Status { config_paths } => store_status(&config_paths).await?,
        },

        Commands::Lock { cmd } => match cmd {
            LockCmd::Probe { tag_spool, daemon_url } => lock_probe(&daemon_url, &tag_spool).await?,
        },

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

/// Connect to the store named in config and re-run the same three
/// `validate_schema` calls the daemon runs before it binds its listener
/// (main.rs), without requiring a live daemon.
async fn store_status(config_paths: &[String]) -> Result<()> {
    let path_refs: Vec<&str> = config_paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs).context("loading config")?;
    let boot = resolve_boot_config(&loaded.config_json).context("resolving store config")?;

    let base_url = loaded
        .config_json
        .pointer("/store/base_url")
        .and_then(|v| v.as_str())
        .unwrap_or("https://sheets.googleapis.com")
        .to_string();

    let backend = GoogleSheetsBackend::new(base_url, boot.store_id.clone(), boot.store_credential.clone());
    let gateway = SheetsGateway::new(backend);

    println!("store_id={}", boot.store_id);
    println!("credential_present={}", boot.store_credential.is_some());

    for (name, cols) in [
        (worksheets::OPERACIONES, columns::OPERACIONES),
        (worksheets::UNIONES, columns::UNIONES),
        (worksheets::METADATA, columns::METADATA),
    ] {
        match gateway.validate_schema(name, cols).await {
            Ok(()) => println!("worksheet={name} ok=true"),
            Err(e) => println!("worksheet={name} ok=false error={e}"),
        }
    }

    Ok(())
}

async fn lock_probe(daemon_url: &str, tag_spool: &str) -> Result<()> {
    let url = format!("{}/v4/locks/{}", daemon_url.trim_end_matches('/'), tag_spool);
    let resp = reqwest::get(&url).await.context("GET /v4/locks/:tag failed")?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().await.context("decoding lock-probe response")?;

    if !status.is_success() {
        anyhow::bail!("daemon returned {status}: {body}");
    }

    println!("tag_spool={}", body["tag_spool"].as_str().unwrap_or(tag_spool));
    println!("locked={}", body["locked"].as_bool().unwrap_or(false));
    println!("owner={}", body["owner"].as_str().unwrap_or("-"));
    Ok(())
}
