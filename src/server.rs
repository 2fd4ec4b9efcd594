//!
//! cohortdb HTTP server
//! --------------------
//! Axum router and shared state for the student records API.
//!
//! Responsibilities:
//! - Account registration, login (stateless session tokens) and static key issue.
//! - Per-cohort student routes authorised by static API key, either as a path
//!   segment (legacy list/create routes) or via the `x-api-key` header.
//! - Startup logging, snapshot folder setup and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tracing::{info, warn};

use crate::cohort::Cohort;
use crate::config::ServerConfig;
use crate::identity::{AccountService, KeyAuthenticator, SessionManager};
use crate::repository::RecordRepository;
use crate::storage::{AccountStore, MemoryAccountStore, PartitionRegistry};

pub mod accounts;
pub mod extract;
pub mod students;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub keys: KeyAuthenticator,
    /// One collection per cohort, opened lazily.
    pub registry: Arc<PartitionRegistry>,
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
}

impl AppState {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: SessionManager,
        registry: PartitionRegistry,
        store_timeout: Duration,
    ) -> Self {
        Self {
            accounts: AccountService::new(accounts.clone(), Arc::new(sessions), store_timeout),
            keys: KeyAuthenticator::new(accounts, store_timeout),
            registry: Arc::new(registry),
            store_timeout,
        }
    }

    /// Everything in memory, signed with `secret`.
    pub fn in_memory(secret: &[u8]) -> Self {
        Self::new(
            Arc::new(MemoryAccountStore::new()),
            SessionManager::new(secret),
            PartitionRegistry::in_memory(),
            crate::repository::DEFAULT_STORE_TIMEOUT,
        )
    }

    pub fn repository(&self, cohort: Cohort) -> RecordRepository {
        RecordRepository::for_cohort(&self.registry, cohort, self.store_timeout)
    }
}

/// Open stores and signing key according to `config`.
pub fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let sessions = match &config.session_secret {
        Some(secret) => SessionManager::new(secret.as_bytes()),
        None => {
            warn!("no session secret configured; using a random key, sessions will not survive a restart");
            SessionManager::with_random_key()?
        }
    };
    let (accounts, registry): (Arc<dyn AccountStore>, PartitionRegistry) = match &config.db_root {
        Some(root) => {
            std::fs::create_dir_all(root)
                .with_context(|| format!("Failed to create or access data folder: {}", root.display()))?;
            let accounts = MemoryAccountStore::open(root)
                .with_context(|| format!("While opening credential store under {}", root.display()))?;
            info!(target: "startup", accounts = accounts.len(), "credential store loaded");
            (Arc::new(accounts), PartitionRegistry::persistent(root))
        }
        None => (Arc::new(MemoryAccountStore::new()), PartitionRegistry::in_memory()),
    };
    Ok(AppState::new(accounts, sessions, registry, config.store_timeout))
}

pub fn router(state: AppState) -> Router {
    let app = Router::new()
        .route("/", get(|| async { "cohortdb ok" }))
        .route("/register", post(accounts::register))
        .route("/login", post(accounts::login))
        .route("/get-api-key", get(accounts::get_api_key))
        .route("/generate-api-key", post(accounts::generate_api_key))
        .route("/{key}/allstudents", get(students::list_all));
    students::cohort_routes(app).with_state(state)
}

fn log_startup(config: &ServerConfig) {
    let cwd = std::env::current_dir().ok();
    let db_exists = config.db_root.as_ref().map(|p| p.exists());
    info!(
        target: "startup",
        "cohortdb starting: cwd={:?}, db_root={:?}, db_root_exists={:?}, store_timeout_ms={}",
        cwd,
        config.db_root,
        db_exists,
        config.store_timeout.as_millis()
    );
}

/// Start the HTTP server and serve until Ctrl-C or SIGTERM.
pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    log_startup(&config);
    let addr = config.bind_addr()?;
    let state = build_state(&config)?;
    let app = router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("cohortdb shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received terminate signal, initiating graceful shutdown"),
    }
}
