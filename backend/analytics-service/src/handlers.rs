//! HTTP handlers for the publisher API

use std::collections::BTreeMap;

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use event_schema::AnalyticsEvent;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{PublisherError, Result};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_events: i64,
    pub events_by_type: BTreeMap<String, i64>,
}

/// `POST /api/analytics`
///
/// Decodes the body, fills a missing user agent from the request header and
/// appends the event to the topic. Exactly one publish attempt per accepted
/// request; rejected bodies never reach the broker.
pub async fn track_event(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let event = AnalyticsEvent::from_json(&body).map_err(|e| {
        warn!(error = %e, "Rejected analytics event");
        PublisherError::InvalidPayload(e.to_string())
    })?;

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let event = event.with_default_user_agent(user_agent);

    let payload = event.to_wire().map_err(|e| {
        error!(error = %e, "Failed to encode event");
        PublisherError::Serialization(e.to_string())
    })?;

    let placement = state.publisher.publish(&payload).await.map_err(|e| {
        error!(
            error = %e,
            event_type = %event.event_type,
            "Failed to publish event"
        );
        PublisherError::PublishFailed(e)
    })?;

    info!(
        partition = placement.partition,
        offset = placement.offset,
        event_type = %event.event_type,
        page = %event.page,
        "Event queued"
    );

    Ok(HttpResponse::Created().json(TrackResponse {
        status: "success",
        message: "Event queued",
        partition: placement.partition,
        offset: placement.offset,
    }))
}

/// CORS preflight; the headers come from the resource middleware
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// Methods accepted on `/api/analytics`
pub const EVENT_METHODS: &str = "POST, OPTIONS";
/// Methods accepted on `/api/stats`
pub const STATS_METHODS: &str = "GET, OPTIONS";

pub async fn method_not_allowed(allow: &'static str) -> Result<HttpResponse> {
    Err(PublisherError::MethodNotAllowed { allow })
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.store.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "database": "connected",
        })),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unhealthy",
                "error": "database connection failed",
            }))
        }
    }
}

/// `GET /api/stats`
pub async fn stats(state: web::Data<AppState>) -> Result<HttpResponse> {
    let total_events = state.store.count_events().await.map_err(|e| {
        error!(error = %e, "Failed to count events");
        e
    })?;
    let events_by_type = state.store.count_by_type().await.map_err(|e| {
        error!(error = %e, "Failed to count events by type");
        e
    })?;

    Ok(HttpResponse::Ok().json(StatsResponse {
        total_events,
        events_by_type,
    }))
}

/// `GET /`
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Portfolio Analytics API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}
