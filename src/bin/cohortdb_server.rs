//!
//! cohortdb server binary
//! ----------------------
//! Command-line entry point for the cohortdb HTTP server. Supports configuration
//! via CLI flags and environment variables; run with `--help` for the list.

use anyhow::Result;
use cohortdb::config::{has_flag, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", ServerConfig::usage());
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = ServerConfig::from_env();
    let db_root = config.db_root.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<in-memory>".into());
    println!("cohortdb starting: http={}:{}, db_root={}", config.host, config.http_port, db_root);
    tracing::info!(
        "Using http={}:{}, db_root={}, session_secret_set={}",
        config.host,
        config.http_port,
        db_root,
        config.session_secret.is_some()
    );

    cohortdb::server::run_with_config(config).await
}
