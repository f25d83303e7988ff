mod auth;
mod config;
mod error;
mod metrics;
mod rate_limit;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use snipsync_core::{SyncLimits, SyncService};

use config::{AppConfig, ConfigError};
use routes::{app_router, AppState};

/// Sync server for snippet collections
#[derive(Debug, Parser)]
#[command(name = "snipsync-api", version, about)]
struct Cli {
    /// Address to listen on (overrides SNIPSYNC_BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// Database file (overrides SNIPSYNC_DATABASE_PATH)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Maximum items per push (overrides SNIPSYNC_MAX_PUSH_ITEMS)
    #[arg(long)]
    max_push_items: Option<usize>,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(database) = self.database {
            config.database_path = database;
        }
        if let Some(max_push_items) = self.max_push_items {
            config.set_max_push_items(max_push_items)?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("snipsync_api=info".parse().expect("valid directive")),
        )
        .init();

    let mut config = AppConfig::from_env()?;
    cli.apply(&mut config)?;
    let config = Arc::new(config);
    tracing::info!("Starting snipsync-api with config: {:?}", config);

    let sync = SyncService::open_path(
        &config.database_path,
        SyncLimits {
            max_push_items: config.max_push_items,
        },
    )
    .await?;

    let state = AppState::new(config, sync)?;
    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("snipsync-api listening on {}", bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("snipsync-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!("Failed to listen for SIGTERM: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:8080".to_string(),
            database_path: PathBuf::from("snipsync.db"),
            api_keys: vec!["key".to_string()],
            max_push_items: 5_000,
            max_body_bytes: 1_024,
            rate_limit_window: Duration::from_secs(60),
            push_rate_limit_per_window: 1,
            pull_rate_limit_per_window: 1,
        }
    }

    #[test]
    fn cli_flags_override_environment() {
        let cli = Cli::try_parse_from([
            "snipsync-api",
            "--bind",
            "0.0.0.0:9000",
            "--database",
            "/var/lib/snipsync/store.db",
        ])
        .unwrap();
        let mut config = base_config();
        cli.apply(&mut config).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(
            config.database_path,
            PathBuf::from("/var/lib/snipsync/store.db")
        );
        assert_eq!(config.max_push_items, 5_000);
    }

    #[test]
    fn cli_without_flags_keeps_environment() {
        let cli = Cli::try_parse_from(["snipsync-api"]).unwrap();
        let mut config = base_config();
        cli.apply(&mut config).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn cli_push_limit_uses_environment_bounds() {
        for bad in ["0", "100001"] {
            let cli = Cli::try_parse_from(["snipsync-api", "--max-push-items", bad]).unwrap();
            let mut config = base_config();
            let err = cli.apply(&mut config).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "accepted {bad}");
            assert_eq!(config.max_push_items, 5_000);
        }

        let cli = Cli::try_parse_from(["snipsync-api", "--max-push-items", "250"]).unwrap();
        let mut config = base_config();
        cli.apply(&mut config).unwrap();
        assert_eq!(config.max_push_items, 250);
    }
}
