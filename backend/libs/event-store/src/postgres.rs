use std::collections::BTreeMap;

use async_trait::async_trait;
use event_schema::AnalyticsEvent;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::{screen_dimension, EventStore, StoreResult};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS analytics_events (
        id BIGSERIAL PRIMARY KEY,
        event_type VARCHAR(50) NOT NULL,
        page VARCHAR(255) NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        session_id VARCHAR(100) NOT NULL,
        user_agent TEXT,
        screen_width INTEGER,
        screen_height INTEGER,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

/// PostgreSQL-backed event store
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert(&self, event: &AnalyticsEvent) -> StoreResult<i64> {
        let screen_width = screen_dimension("screen_width", event.screen_width)?;
        let screen_height = screen_dimension("screen_height", event.screen_height)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO analytics_events (
                event_type, page, timestamp, session_id,
                user_agent, screen_width, screen_height
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&event.event_type)
        .bind(&event.page)
        .bind(event.timestamp)
        .bind(&event.session_id)
        .bind(&event.user_agent)
        .bind(screen_width)
        .bind(screen_height)
        .fetch_one(&self.pool)
        .await?;

        debug!(id, event_type = %event.event_type, "Event row inserted");
        Ok(id)
    }

    async fn count_events(&self) -> StoreResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analytics_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn count_by_type(&self) -> StoreResult<BTreeMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT event_type, COUNT(*)
            FROM analytics_events
            GROUP BY event_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        info!("analytics_events table ready");
        Ok(())
    }
}
