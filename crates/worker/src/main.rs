use anyhow::Result;
use cart_worker::{interrupt_channel, run_worker, ExponentialBackoff, TemporalConnector, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the process environment still applies
    dotenvy::dotenv().ok();

    // Log filter comes from RUST_LOG (default: "cart_worker=debug,cart_core=debug")
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cart_worker=debug,cart_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("cart-worker starting...");

    let config = WorkerConfig::from_env();
    let connector = TemporalConnector::new(&config);

    tracing::info!(
        address = %config.temporal_address(),
        namespace = %config.temporal_namespace(),
        identity = %connector.identity(),
        "Starting cart worker"
    );

    // Blocks until interrupted; any startup failure exits non-zero
    run_worker(
        &connector,
        &config,
        &ExponentialBackoff::default(),
        interrupt_channel,
    )
    .await?;

    tracing::info!("Worker shutdown complete");
    Ok(())
}
