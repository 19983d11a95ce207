//! HTTP contract tests for the publisher, backed by the in-memory log and store.

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use analytics_consumer::EventSubscriber;
use analytics_service::{configure, AppState};
use broker_transport::MemoryEventLog;
use chrono::{TimeZone, Utc};
use event_schema::AnalyticsEvent;
use event_store::{EventStore, MemoryEventStore};
use serde_json::{json, Value};

fn state(log: &MemoryEventLog, store: &MemoryEventStore) -> AppState {
    AppState::new(Arc::new(log.clone()), Arc::new(store.clone()))
}

fn valid_body(session_id: &str) -> Value {
    json!({
        "event_type": "page_view",
        "page": "/projects/rust",
        "timestamp": "2024-04-12T09:30:00Z",
        "session_id": session_id,
        "screen_width": 1920,
        "screen_height": 1080
    })
}

macro_rules! init_app {
    ($log:expr, $store:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(state($log, $store)))
                .configure(configure),
        )
        .await
    };
}

#[actix_web::test]
async fn test_malformed_json_is_rejected_without_publishing() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    let app = init_app!(&log, &store);

    let req = test::TestRequest::post()
        .uri("/api/analytics")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"event_type\": \"page_view\",")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);
    assert_eq!(log.send_count(), 0);
}

#[actix_web::test]
async fn test_invalid_fields_are_rejected_without_publishing() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    let app = init_app!(&log, &store);

    let mut missing_timestamp = valid_body("s1");
    missing_timestamp
        .as_object_mut()
        .unwrap()
        .remove("timestamp");

    let mut empty_type = valid_body("s1");
    empty_type["event_type"] = json!("");

    let mut negative_width = valid_body("s1");
    negative_width["screen_width"] = json!(-1);

    for body in [missing_timestamp, empty_type, negative_width] {
        let req = test::TestRequest::post()
            .uri("/api/analytics")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }

    assert_eq!(log.send_count(), 0);
}

#[actix_web::test]
async fn test_accepted_event_returns_placement_and_fills_user_agent() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    let app = init_app!(&log, &store);

    let req = test::TestRequest::post()
        .uri("/api/analytics")
        .insert_header((header::USER_AGENT, "Mozilla/5.0 (X11; Linux x86_64)"))
        .set_json(valid_body("sess-1"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Event queued");
    assert_eq!(body["partition"], 0);
    assert_eq!(body["offset"], 0);

    let records = log.records();
    assert_eq!(records.len(), 1);
    let published = AnalyticsEvent::from_json(records[0].payload.as_deref().unwrap()).unwrap();
    assert_eq!(
        published.user_agent.as_deref(),
        Some("Mozilla/5.0 (X11; Linux x86_64)")
    );
    assert_eq!(
        published.timestamp,
        Utc.with_ymd_and_hms(2024, 4, 12, 9, 30, 0).unwrap()
    );
    assert_eq!(published.screen_width, Some(1920));
}

#[actix_web::test]
async fn test_client_user_agent_is_not_overwritten() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    let app = init_app!(&log, &store);

    let mut body = valid_body("sess-2");
    body["user_agent"] = json!("PortfolioApp/2.1");

    let req = test::TestRequest::post()
        .uri("/api/analytics")
        .insert_header((header::USER_AGENT, "curl/8.4.0"))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let published = AnalyticsEvent::from_json(log.records()[0].payload.as_deref().unwrap()).unwrap();
    assert_eq!(published.user_agent.as_deref(), Some("PortfolioApp/2.1"));
}

#[actix_web::test]
async fn test_broker_failure_is_a_server_error() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    log.fail_publishes(true);
    let app = init_app!(&log, &store);

    let req = test::TestRequest::post()
        .uri("/api/analytics")
        .set_json(valid_body("sess-3"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // Exactly one attempt, no retry at this layer
    assert_eq!(log.send_count(), 1);
    assert!(log.records().is_empty());
}

#[actix_web::test]
async fn test_other_methods_are_not_allowed() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    let app = init_app!(&log, &store);

    for req in [
        test::TestRequest::get().uri("/api/analytics").to_request(),
        test::TestRequest::put().uri("/api/analytics").to_request(),
        test::TestRequest::delete().uri("/api/analytics").to_request(),
    ] {
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers().get(header::ALLOW).unwrap(), "POST, OPTIONS");
    }

    assert_eq!(log.send_count(), 0);
}

#[actix_web::test]
async fn test_preflight_returns_cors_headers_and_empty_body() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    let app = init_app!(&log, &store);

    let req = test::TestRequest::default()
        .method(actix_web::http::Method::OPTIONS)
        .uri("/api/analytics")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers().clone();
    assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(
        headers.get("access-control-allow-methods").unwrap(),
        "POST, OPTIONS"
    );
    assert_eq!(
        headers.get("access-control-allow-headers").unwrap(),
        "Content-Type"
    );

    let body = test::read_body(resp).await;
    assert!(body.is_empty());
    assert_eq!(log.send_count(), 0);
}

#[actix_web::test]
async fn test_stats_advertises_only_its_own_methods() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    let app = init_app!(&log, &store);

    let req = test::TestRequest::default()
        .method(actix_web::http::Method::OPTIONS)
        .uri("/api/stats")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("access-control-allow-methods").unwrap(),
        "GET, OPTIONS"
    );

    let req = test::TestRequest::post().uri("/api/stats").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.headers().get(header::ALLOW).unwrap(), "GET, OPTIONS");
    assert_eq!(log.send_count(), 0);
}

#[actix_web::test]
async fn test_concurrent_submissions_get_distinct_offsets_and_are_stored() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    let app = init_app!(&log, &store);

    let requests = (0..100).map(|i| {
        let req = test::TestRequest::post()
            .uri("/api/analytics")
            .set_json(valid_body(&format!("sess-{}", i)))
            .to_request();
        test::call_service(&app, req)
    });
    let responses = futures::future::join_all(requests).await;

    let mut offsets = Vec::with_capacity(100);
    for resp in responses {
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        offsets.push(body["offset"].as_i64().unwrap());
    }
    offsets.sort_unstable();
    offsets.dedup();
    assert_eq!(offsets, (0..100).collect::<Vec<i64>>());

    // Relay everything committed so far into the store
    let subscriber = EventSubscriber::new(log.cursor_at_start(), Arc::new(store.clone()));
    let watched = store.clone();
    let stats = tokio::time::timeout(
        Duration::from_secs(10),
        subscriber.run(async move {
            while watched.events().len() < 100 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }),
    )
    .await
    .unwrap();

    assert_eq!(stats.persisted, 100);
    assert_eq!(store.count_events().await.unwrap(), 100);

    let mut sessions: Vec<String> = store.events().into_iter().map(|e| e.session_id).collect();
    sessions.sort();
    sessions.dedup();
    assert_eq!(sessions.len(), 100);
}

#[actix_web::test]
async fn test_health_follows_database_availability() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    let app = init_app!(&log, &store);

    store.sever();
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "unhealthy");
    assert!(body["error"].is_string());

    store.restore();
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"status": "healthy", "database": "connected"}));
}

#[actix_web::test]
async fn test_stats_reports_counts_by_type() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();

    for (event_type, session) in [("page_view", "a"), ("page_view", "b"), ("click", "a")] {
        let event = AnalyticsEvent {
            event_type: event_type.to_string(),
            page: "/".to_string(),
            timestamp: Utc::now(),
            session_id: session.to_string(),
            user_agent: None,
            screen_width: None,
            screen_height: None,
        };
        store.insert(&event).await.unwrap();
    }

    let app = init_app!(&log, &store);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/stats").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total_events"], 3);
    assert_eq!(body["events_by_type"], json!({"click": 1, "page_view": 2}));

    store.sever();
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/stats").to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn test_index_banner() {
    let log = MemoryEventLog::new();
    let store = MemoryEventStore::new();
    let app = init_app!(&log, &store);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Portfolio Analytics API");
    assert_eq!(body["status"], "running");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
