use std::sync::Arc;

use analytics_consumer::{ConsumerConfig, EventSubscriber};
use anyhow::{Context, Result};
use broker_transport::{BrokerConfig, BrokerConnector};
use db_pool::{connect_with_retry, DbConfig};
use event_store::{EventStore, PgEventStore};
use resilience::{with_retry, RetryError};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SERVICE_NAME: &str = "analytics-consumer";

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler, waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = ConsumerConfig::from_env();
    init_tracing(config.json_logs);

    info!("Starting {}", SERVICE_NAME);

    let db_config = DbConfig::from_env(SERVICE_NAME);
    db_config.log_config();

    let pool = connect_with_retry(&db_config, config.startup_retry())
        .await
        .context("Could not connect to database after retries")?;

    let store = PgEventStore::new(pool);
    store
        .ensure_schema()
        .await
        .context("Failed to create analytics_events table")?;

    let broker_config = BrokerConfig::from_env(SERVICE_NAME);
    broker_config.log_config();
    let connector = BrokerConnector::new(broker_config);

    let cursor = with_retry(config.startup_retry(), || connector.connect_consumer())
        .await
        .map_err(RetryError::into_inner)
        .context("Could not connect to Kafka after retries")?;

    let subscriber = EventSubscriber::new(cursor, Arc::new(store))
        .with_insert_retry(config.insert_retry(), config.insert_timeout);

    let stats = subscriber.run(shutdown_signal()).await;

    info!(
        persisted = stats.persisted,
        skipped = stats.skipped,
        failed = stats.failed,
        "{} exited cleanly",
        SERVICE_NAME
    );
    Ok(())
}
