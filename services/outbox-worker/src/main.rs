use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::watch;
use tracing::{error, info, warn};

use soba_core::config::Config;
use soba_core::tracing::init_tracing;
use soba_outbox_worker::config::WorkerConfig;
use soba_outbox_worker::domain::repository::OutboxStore;
use soba_outbox_worker::infra::db::{
    DbFormRepository, DbFormVersionRepository, DbOutboxStore, DbSubmissionRepository,
};
use soba_outbox_worker::infra::plugin_config::ProcessEnv;
use soba_outbox_worker::infra::registry::{BUILTIN_ENGINES, EngineRegistry};
use soba_outbox_worker::router::build_router;
use soba_outbox_worker::state::AppState;
use soba_outbox_worker::usecase::sync::SyncEngine;
use soba_outbox_worker::usecase::worker::OutboxWorker;

#[derive(Parser)]
#[command(name = "soba-outbox-worker", about = "Delivers form-engine outbox records")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, Default)]
enum Command {
    /// Poll the outbox until interrupted (default).
    #[default]
    Run,
    /// Process a single batch and print the report.
    Once,
    /// Print backlog statistics as JSON.
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match WorkerConfig::try_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid worker configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid worker configuration");
        return ExitCode::FAILURE;
    }

    let db = match Database::connect(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "failed to connect to database");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command.unwrap_or_default() {
        Command::Run => run(config, db).await,
        Command::Once => once(config, db).await,
        Command::Stats => stats(config, db).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "outbox worker exited with error");
            ExitCode::FAILURE
        }
    }
}

/// How long in-flight ops requests get after the worker stops.
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

type Worker = OutboxWorker<
    DbOutboxStore,
    SyncEngine<DbFormRepository, DbFormVersionRepository, DbSubmissionRepository, EngineRegistry>,
>;

fn build_worker(config: &WorkerConfig, db: &DatabaseConnection) -> anyhow::Result<Worker> {
    let engines = EngineRegistry::from_definitions(BUILTIN_ENGINES, Arc::new(ProcessEnv))?;
    let actor_id = config.system_actor_id;
    Ok(OutboxWorker {
        store: DbOutboxStore {
            db: db.clone(),
            actor_id,
        },
        processor: SyncEngine {
            forms: DbFormRepository { db: db.clone() },
            form_versions: DbFormVersionRepository {
                db: db.clone(),
                actor_id,
            },
            submissions: DbSubmissionRepository {
                db: db.clone(),
                actor_id,
            },
            engines,
            adapter_timeout: config.adapter_timeout(),
        },
        settings: config.settings(),
    })
}

async fn run(config: WorkerConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let worker = build_worker(&config, &db)?;

    let state = AppState {
        db,
        attempt_warn_threshold: config.outbox_attempt_warn_threshold,
        actor_id: config.system_actor_id,
        engines: worker.processor.engines.catalog(),
    };
    let addr = format!("0.0.0.0:{}", config.worker_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("outbox worker ops listening on {addr}");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            })
            .await
    });
    let signal_tx = Arc::clone(&shutdown_tx);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested, finishing current batch");
        let _ = signal_tx.send(true);
    });

    let outcome = worker.run(shutdown_rx).await;

    // The worker may also stop on its own (store gone); the ops server
    // follows either way.
    shutdown_tx.send_replace(true);
    match tokio::time::timeout(SERVER_DRAIN_TIMEOUT, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!(error = %e, "ops server failed"),
        Ok(Err(e)) => error!(error = %e, "ops server task panicked"),
        Err(_) => warn!(
            timeout = ?SERVER_DRAIN_TIMEOUT,
            "ops server did not drain in time"
        ),
    }
    outcome?;
    Ok(())
}

async fn once(config: WorkerConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let worker = build_worker(&config, &db)?;
    let report = worker.run_once().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn stats(config: WorkerConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let store = DbOutboxStore {
        db,
        actor_id: config.system_actor_id,
    };
    let stats = store.stats(config.outbox_attempt_warn_threshold).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
