//! fieldnet-api - field sensor data service
//!
//! Settings resolve per field: command line, then environment, then the
//! TOML config file, then compiled defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fieldnet_common::auth::Authenticator;
use fieldnet_common::config::{Config, ConfigLayer};
use fieldnet_common::db::init_database;
use fieldnet_api::geo::GeoLookup;
use fieldnet_api::{build_router, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for fieldnet-api
#[derive(Parser, Debug)]
#[command(name = "fieldnet-api")]
#[command(about = "Field sensor data service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "FIELDNET_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (created when missing)
    #[arg(short, long, env = "FIELDNET_DATABASE")]
    database: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8000
    #[arg(short, long, env = "FIELDNET_BIND")]
    bind: Option<String>,

    /// Token signing secret
    #[arg(long, env = "FIELDNET_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Access token lifetime in minutes
    #[arg(long, env = "FIELDNET_ACCESS_TOKEN_MINUTES")]
    access_token_minutes: Option<i64>,

    /// Refresh token lifetime in days
    #[arg(long, env = "FIELDNET_REFRESH_TOKEN_DAYS")]
    refresh_token_days: Option<i64>,

    /// ipinfo.io token for visitor geolocation
    #[arg(long, env = "FIELDNET_IPINFO_TOKEN", hide_env_values = true)]
    ipinfo_token: Option<String>,

    /// Default page size of paginated lists
    #[arg(long, env = "FIELDNET_PAGE_SIZE")]
    page_size: Option<i64>,

    /// Allowed CORS origin (repeatable); any origin when none given
    #[arg(long = "cors-origin", env = "FIELDNET_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,
}

impl Args {
    fn into_layer(self) -> (ConfigLayer, Option<PathBuf>) {
        let layer = ConfigLayer {
            database: self.database,
            bind: self.bind,
            jwt_secret: self.jwt_secret,
            access_token_minutes: self.access_token_minutes,
            refresh_token_days: self.refresh_token_days,
            ipinfo_token: self.ipinfo_token,
            page_size: self.page_size,
            cors_origins: (!self.cors_origins.is_empty()).then_some(self.cors_origins),
        };
        (layer, self.config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldnet_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fieldnet-api v{}", env!("CARGO_PKG_VERSION"));

    let (overrides, config_file) = Args::parse().into_layer();
    let config = Config::resolve(overrides, config_file.as_deref())
        .context("Failed to load configuration")?;

    if config.jwt_secret_generated {
        warn!("No JWT secret configured; using a random secret, tokens will not survive a restart");
    }

    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let auth = Authenticator::new(
        &config.jwt_secret,
        config.access_token_minutes,
        config.refresh_token_days,
    );
    let mut state =
        AppState::new(pool, auth, config.page_size).with_cors_origins(config.cors_origins.clone());

    match config.ipinfo_token.as_deref() {
        Some(token) => match GeoLookup::new(token) {
            Ok(geo) => {
                info!("Visitor geolocation enabled");
                state = state.with_geo(geo);
            }
            Err(e) => error!("Visitor geolocation disabled: {}", e),
        },
        None => info!("No ipinfo token configured; visitor geolocation disabled"),
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("fieldnet-api listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
