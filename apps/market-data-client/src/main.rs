//! Market Data Client Binary
//!
//! Connects a live data client to the data service and logs ticks for the
//! configured symbols until shutdown.
//!
//! # Usage
//!
//! ```bash
//! MARKET_DATA_SYMBOLS=EUR/USD.FXCM,GBP/USD.FXCM cargo run --bin market-data-client
//! ```
//!
//! # Environment Variables
//!
//! - `MARKET_DATA_SYMBOLS`: comma-separated symbols to subscribe (default: none)
//! - `MARKET_DATA_SERVICE_NAME`: service path segment (default: `MarketData`)
//! - `MARKET_DATA_ADDRESS`: data service host (default: localhost)
//! - `MARKET_DATA_{TICK,BAR,INSTRUMENT}_{REQUEST,SUBSCRIBE}_PORT`: endpoint
//!   ports (default: 55501-55506)
//! - `MARKET_DATA_TLS`: use `wss` (default: false)
//! - `MARKET_DATA_CODEC`: `msgpack` | `json` (default: msgpack)
//! - `MARKET_DATA_REQUEST_TIMEOUT_MS`: request/reply timeout (default: 10000)
//! - `MARKET_DATA_QUEUE_CAPACITY`: dispatch queue capacity (default: 10000)
//! - `MARKET_DATA_HEALTH_PORT`: health and metrics HTTP port (default: 8082)
//! - `OTEL_ENABLED`: enable OpenTelemetry export (default: false)
//! - `RUST_LOG`: log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use market_data_client::infrastructure::config::validate_port;
use market_data_client::infrastructure::health::{HealthServer, HealthServerState};
use market_data_client::infrastructure::telemetry;
use market_data_client::{
    DataClient, HandlerRef, LiveClientConfig, LiveDataClient, Symbol, Tick, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Default health server port.
const DEFAULT_HEALTH_PORT: i64 = 8082;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting market data client");

    let _metrics_handle = init_metrics().context("failed to install metrics recorder")?;

    let config = LiveClientConfig::from_env().context("invalid market data configuration")?;
    log_config(&config);
    let symbols = symbols_from_env()?;
    let health_port = health_port_from_env()?;

    let shutdown_token = CancellationToken::new();
    let client = Arc::new(LiveDataClient::from_config(config)?);

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&client) as Arc<dyn DataClient>,
    ));
    let health_server = HealthServer::new(health_port, health_state, shutdown_token.clone());
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    client.connect().await.context("failed to connect")?;

    let handler = HandlerRef::new(|tick: &Tick| {
        tracing::info!(
            symbol = %tick.symbol,
            bid = %tick.bid,
            ask = %tick.ask,
            timestamp = %tick.timestamp,
            "Tick"
        );
    });
    for symbol in &symbols {
        client.subscribe_ticks(symbol, handler.clone()).await?;
    }

    tracing::info!(symbols = symbols.len(), "Market data client ready");

    await_shutdown(shutdown_token).await;

    for symbol in &symbols {
        if let Err(e) = client.unsubscribe_ticks(symbol, &handler).await {
            tracing::warn!(%symbol, error = %e, "Unsubscribe failed");
        }
    }
    client.disconnect().await;
    client.dispose().await;

    tracing::info!("Market data client stopped");
    Ok(())
}

/// Parse `MARKET_DATA_SYMBOLS`.
fn symbols_from_env() -> anyhow::Result<Vec<Symbol>> {
    let Ok(value) = std::env::var("MARKET_DATA_SYMBOLS") else {
        return Ok(Vec::new());
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Symbol>().with_context(|| format!("invalid symbol {s:?}")))
        .collect()
}

/// Parse `MARKET_DATA_HEALTH_PORT`.
fn health_port_from_env() -> anyhow::Result<u16> {
    let port = match std::env::var("MARKET_DATA_HEALTH_PORT") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid MARKET_DATA_HEALTH_PORT {value:?}"))?,
        Err(_) => DEFAULT_HEALTH_PORT,
    };
    Ok(validate_port("MARKET_DATA_HEALTH_PORT", port)?)
}

/// Load .env file from the current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &LiveClientConfig) {
    tracing::info!(
        service = %config.service_name,
        address = %config.address,
        encryption = config.encryption.scheme(),
        codec = config.codec.as_str(),
        request_timeout = ?config.request_timeout,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }

    shutdown_token.cancel();
}
