//! Portfolio analytics publisher.
//!
//! Accepts client events over HTTP and appends them to the analytics topic.
//! Reads (`/api/stats`, `/api/health`) go straight to the event store.

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use actix_web::http::Method;
use actix_web::middleware::DefaultHeaders;
use actix_web::web;
use broker_transport::EventPublisher;
use event_store::EventStore;
use handlers::{EVENT_METHODS, STATS_METHODS};

/// Shared handles, built once in `main`
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<dyn EventPublisher>,
    pub store: Arc<dyn EventStore>,
}

impl AppState {
    pub fn new(publisher: Arc<dyn EventPublisher>, store: Arc<dyn EventStore>) -> Self {
        Self { publisher, store }
    }
}

fn cors_headers(methods: &'static str) -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", methods))
        .add(("Access-Control-Allow-Headers", "Content-Type"))
}

/// Register all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/api/health", web::get().to(handlers::health))
        .service(
            web::resource("/api/analytics")
                .wrap(cors_headers(EVENT_METHODS))
                .route(web::post().to(handlers::track_event))
                .route(web::method(Method::OPTIONS).to(handlers::preflight))
                .default_service(web::to(|| handlers::method_not_allowed(EVENT_METHODS))),
        )
        .service(
            web::resource("/api/stats")
                .wrap(cors_headers(STATS_METHODS))
                .route(web::get().to(handlers::stats))
                .route(web::method(Method::OPTIONS).to(handlers::preflight))
                .default_service(web::to(|| handlers::method_not_allowed(STATS_METHODS))),
        );
}
