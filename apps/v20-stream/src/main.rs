//! v20 Stream Binary
//!
//! Opens a pricing or transaction stream and logs every message until
//! interrupted or the server ends the stream.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin v20-stream -- pricing
//! cargo run --bin v20-stream -- transactions
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `V20_TOKEN`: API bearer token
//! - `V20_ACCOUNT_ID`: Account to stream
//!
//! ## Optional
//! - `V20_ENV`: practice | live (default: practice)
//! - `V20_STREAM_URL`: Stream host override
//! - `V20_INSTRUMENTS`: Comma separated instruments (default: `EUR_USD`)
//! - `V20_STREAM_SNAPSHOT`: Start pricing with a snapshot (default: true)
//! - `V20_STREAM_BUFFER_INITIAL_BYTES`, `V20_STREAM_BUFFER_GROW_BYTES`,
//!   `V20_STREAM_BUFFER_MAX_BYTES`: Frame buffer sizing
//! - `V20_STREAM_ON_HANDLER_ERROR`: continue | close (default: continue)
//! - `V20_HTTP_CONNECT_TIMEOUT_SECS`: Connect timeout (default: 10)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::time::Duration;

use tokio::signal;
use v20_stream::infrastructure::metrics::get_metrics_handle;
use v20_stream::infrastructure::telemetry;
use v20_stream::{
    ClientConfig, PriceHandler, Pooled, Price, PricingHeartbeat, StreamClient, StreamSession,
    Transaction, TransactionHandler, TransactionHeartbeat, init_metrics,
};

/// How long to wait for the read loop after closing.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Which stream to open.
#[derive(Debug, Clone, Copy)]
enum Command {
    Pricing,
    Transactions,
}

impl Command {
    fn from_args() -> Result<Self, String> {
        match std::env::args().nth(1).as_deref() {
            Some("pricing") | None => Ok(Self::Pricing),
            Some("transactions") => Ok(Self::Transactions),
            Some(other) => Err(format!(
                "unknown command {other:?}, expected `pricing` or `transactions`"
            )),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    let _telemetry_guard = telemetry::init();
    let _metrics_handle = init_metrics();

    let command = Command::from_args()?;
    let config = ClientConfig::from_env()?;
    log_config(&config, command);

    let client = StreamClient::new(&config)?;
    let session = match command {
        Command::Pricing => {
            client
                .stream_pricing(config.instruments.as_slice(), config.snapshot, PriceLogger)
                .await?
        }
        Command::Transactions => client.stream_transactions(TransactionLogger).await?,
    };

    tracing::info!(session_id = %session.id(), "Streaming");

    tokio::select! {
        () = session.done() => {
            tracing::warn!("Stream closed by server");
        }
        () = await_shutdown() => {}
    }

    stop(&session).await;

    if let Some(handle) = get_metrics_handle() {
        tracing::debug!(metrics = %handle.render(), "Final metrics");
    }

    tracing::info!("v20 stream stopped");
    Ok(())
}

async fn stop(session: &StreamSession) {
    session.close();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, session.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Read loop did not exit in time"
        );
    }
}

// =============================================================================
// Handlers
// =============================================================================

struct PriceLogger;

impl PriceHandler for PriceLogger {
    fn on_price(&mut self, price: Pooled<Price>) -> anyhow::Result<()> {
        tracing::info!(
            instrument = %price.instrument,
            time = %price.time,
            bid = ?price.best_bid(),
            ask = ?price.best_ask(),
            tradeable = price.tradeable,
            "Price"
        );
        Ok(())
    }

    fn on_heartbeat(&mut self, heartbeat: PricingHeartbeat) -> anyhow::Result<()> {
        tracing::debug!(time = %heartbeat.time, "Pricing heartbeat");
        Ok(())
    }

    fn on_close(&mut self) {
        tracing::info!("Pricing stream closed");
    }
}

struct TransactionLogger;

impl TransactionHandler for TransactionLogger {
    fn on_transaction(&mut self, transaction: Transaction) -> anyhow::Result<()> {
        tracing::info!(
            kind = transaction.kind(),
            id = transaction.id().unwrap_or_default(),
            "Transaction"
        );
        Ok(())
    }

    fn on_heartbeat(&mut self, heartbeat: TransactionHeartbeat) -> anyhow::Result<()> {
        tracing::debug!(
            last_transaction_id = %heartbeat.last_transaction_id,
            time = %heartbeat.time,
            "Transaction heartbeat"
        );
        Ok(())
    }

    fn on_close(&mut self) {
        tracing::info!("Transaction stream closed");
    }
}

// =============================================================================
// Startup Helpers
// =============================================================================

/// Load .env file from current directory or any ancestor directory.
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
fn log_config(config: &ClientConfig, command: Command) {
    tracing::info!(
        command = ?command,
        environment = config.environment.as_str(),
        account_id = config.credentials.account_id(),
        stream_url = config.stream_base_url(),
        on_handler_error = config.stream.on_handler_error.as_str(),
        "Configuration loaded"
    );
    tracing::debug!(
        instruments = ?config.instruments,
        snapshot = config.snapshot,
        buffer_max_bytes = config.stream.buffer_max_bytes,
        connect_timeout_secs = config.http.connect_timeout.as_secs(),
        "Stream settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
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
            tracing::info!("Received Ctrl+C, closing stream");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, closing stream");
        }
    }
}
