use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use analytics_service::config::ServiceConfig;
use analytics_service::{configure, AppState};
use anyhow::{Context, Result};
use broker_transport::{BrokerConfig, BrokerConnector};
use db_pool::{connect_with_retry, DbConfig};
use event_store::{EventStore, PgEventStore};
use resilience::{with_retry, RetryError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SERVICE_NAME: &str = "analytics-service";

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = ServiceConfig::from_env();
    init_tracing(config.json_logs);

    tracing::info!("Starting {}", SERVICE_NAME);

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

    let publisher = with_retry(config.startup_retry(), || connector.connect_producer())
        .await
        .map_err(RetryError::into_inner)
        .context("Could not connect to Kafka after retries")?;

    let state = AppState::new(Arc::new(publisher), Arc::new(store));

    tracing::info!("Starting HTTP server on 0.0.0.0:{}", config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(configure)
    })
    .bind(("0.0.0.0", config.port))
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")
}
