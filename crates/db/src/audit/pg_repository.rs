use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::audit::models::AuditRecord;
use crate::audit::repositories::AuditSource;
use trailsync_common::error::{TrailsyncError, TrailsyncResult};

#[derive(Clone)]
pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> TrailsyncResult<AuditRecord> {
        Ok(AuditRecord {
            id: row.get("id"),
            workspace_id: row.get("workspace_id"),
            occurred_at: row.get("occurred_at"),
            artifact_id: row.get("artifact_id"),
            action_id: row.get("action_id"),
            action_name: row.get("action_name"),
            user_id: row.get("user_id"),
            user_name: row.get("user_name"),
            execution_time_ms: row.get("execution_time_ms"),
            details: row.get("details"),
            request_origin: row.get("request_origin"),
            record_origin: row.get("record_origin"),
        })
    }
}

#[async_trait]
impl AuditSource for PgAuditRepository {
    async fn fetch_page(
        &self,
        workspace_id: i64,
        after_id: i64,
        limit: i64,
    ) -> TrailsyncResult<Vec<AuditRecord>> {
        let rows = sqlx::query(
            "select id, workspace_id, occurred_at, artifact_id, action_id, action_name,
                    user_id, user_name, execution_time_ms, details, request_origin, record_origin
             from audit_records
             where workspace_id = $1 and id > $2
             order by id asc
             limit $3",
        )
        .bind(workspace_id)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TrailsyncError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }
}
