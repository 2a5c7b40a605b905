//! Taskgate Server - Main entry point

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use taskgate_core::{
    api::{self, AppState},
    config::Config,
    db::{seed, Database, MemoryStore},
    middleware::Authenticator,
    observability,
    rbac::{Identity, UserId},
};

#[derive(Debug, Parser)]
#[command(name = "taskgate-server", version, about = "Taskgate API server")]
struct ServerArgs {
    /// Configuration file, merged under TASKGATE__* environment variables
    #[arg(short, long, env = "TASKGATE_CONFIG")]
    config: Option<String>,

    /// Serve from a seeded in-process store instead of PostgreSQL
    #[arg(long, env = "TASKGATE_IN_MEMORY")]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = ServerArgs::parse();

    let config = match args.config.as_deref() {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    observability::init("taskgate-server", &config.observability)?;
    let prometheus = observability::install_prometheus()?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Taskgate Server");

    let authenticator = Arc::new(Authenticator::new(&config.auth)?);

    let state = if args.in_memory {
        let store = Arc::new(MemoryStore::new());
        let summary = seed::seed_demo_data(&store).await?;

        for user in &summary.users {
            let identity = Identity::with_role(UserId(user.id), user.role, user.organization_id)
                .with_email(user.email.clone());
            let token = authenticator.generate_token(&identity)?;
            tracing::info!(
                email = %user.email,
                role = %user.role,
                token = %token,
                "Development token"
            );
        }

        tracing::warn!("Running with the in-memory store; data is lost on shutdown");
        AppState::new(store)
    } else {
        let db_config = config
            .database
            .as_ref()
            .context("database settings are required unless --in-memory is set")?;
        let db = Database::new(db_config).await?;
        db.migrate().await?;
        tracing::info!("Connected to database, migrations applied");
        AppState::new(Arc::new(db))
    };

    let app = api::build_router(state.with_prometheus(prometheus), authenticator);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    observability::shutdown();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
