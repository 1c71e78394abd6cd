use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::management::models::{ClaimedWorkspace, WorkspaceStatus};
use crate::management::repositories::ManagementStore;
use trailsync_common::error::{TrailsyncError, TrailsyncResult};

/// Postgres-backed management store.
///
/// One row per workspace in `audit_search_state`; `locked_by` is the
/// advisory lock column. The lock carries no lease: a worker that dies
/// without releasing leaves its row locked until an operator clears it.
#[derive(Clone)]
pub struct PgManagementRepository {
    pool: PgPool,
}

impl PgManagementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn store_exists(&self) -> TrailsyncResult<bool> {
        sqlx::query_scalar::<_, bool>("select to_regclass('audit_search_state') is not null")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TrailsyncError::Database(e.to_string()))
    }
}

#[async_trait]
impl ManagementStore for PgManagementRepository {
    async fn ensure_store(&self) -> TrailsyncResult<()> {
        sqlx::query(
            "create table if not exists audit_search_state (
               workspace_id  bigint primary key,
               checkpoint    bigint not null default 0,
               status        smallint not null default 1,
               last_updated  timestamptz not null default now(),
               locked_by     text
             )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| TrailsyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn register_workspace(&self, workspace_id: i64) -> TrailsyncResult<()> {
        sqlx::query(
            "insert into audit_search_state (workspace_id, checkpoint, status, last_updated)
             values ($1, 0, $2, now())
             on conflict (workspace_id) do nothing",
        )
        .bind(workspace_id)
        .bind(WorkspaceStatus::Active.as_i16())
        .execute(&self.pool)
        .await
        .map_err(|e| TrailsyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn disable_workspace(&self, workspace_id: i64) -> TrailsyncResult<()> {
        let result = sqlx::query(
            "update audit_search_state
             set status = $2, last_updated = now()
             where workspace_id = $1",
        )
        .bind(workspace_id)
        .bind(WorkspaceStatus::Disabled.as_i16())
        .execute(&self.pool)
        .await
        .map_err(|e| TrailsyncError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(TrailsyncError::NotFound(format!(
                "workspace not registered: {workspace_id}"
            )));
        }

        Ok(())
    }

    async fn claim_next(&self, worker_id: &str) -> TrailsyncResult<Option<ClaimedWorkspace>> {
        // Absent store means nothing is managed (normal after self-cleanup,
        // or before the install hook ever ran): a quiet no-op tick.
        if !self.store_exists().await? {
            return Ok(None);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TrailsyncError::Database(e.to_string()))?;

        // Single-statement claim: Disabled rows first, then the workspace
        // unserviced the longest. SKIP LOCKED keeps concurrent claimants off
        // the same row.
        let row = sqlx::query(
            "update audit_search_state
             set locked_by = $1
             where workspace_id = (
                   select workspace_id from audit_search_state
                   where locked_by is null
                   order by status asc, last_updated asc
                   limit 1
                   for update skip locked)
             returning workspace_id, checkpoint, status",
        )
        .bind(worker_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| TrailsyncError::Database(e.to_string()))?;

        let claimed = match row {
            Some(r) => {
                let status = WorkspaceStatus::from_i16(r.get("status"))?;
                let claimed = ClaimedWorkspace {
                    workspace_id: r.get("workspace_id"),
                    checkpoint: r.get("checkpoint"),
                    status,
                };
                tracing::debug!(
                    workspace_id = claimed.workspace_id,
                    checkpoint = claimed.checkpoint,
                    worker = worker_id,
                    "claimed workspace"
                );
                Some(claimed)
            }
            None => {
                // Self-cleanup: once the store manages nothing, drop it.
                let count: i64 =
                    sqlx::query_scalar("select count(*) from audit_search_state")
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(|e| TrailsyncError::Database(e.to_string()))?;

                if count == 0 {
                    sqlx::query("drop table audit_search_state")
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| TrailsyncError::Database(e.to_string()))?;
                    tracing::info!("management store empty, dropped");
                }
                None
            }
        };

        tx.commit()
            .await
            .map_err(|e| TrailsyncError::Database(e.to_string()))?;

        Ok(claimed)
    }

    async fn release(&self, workspace_id: i64, checkpoint: i64) -> TrailsyncResult<()> {
        let result = sqlx::query(
            "update audit_search_state
             set locked_by = null, checkpoint = $2, last_updated = now()
             where workspace_id = $1",
        )
        .bind(workspace_id)
        .bind(checkpoint)
        .execute(&self.pool)
        .await
        .map_err(|e| TrailsyncError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(TrailsyncError::NotFound(format!(
                "workspace not registered: {workspace_id}"
            )));
        }

        Ok(())
    }

    async fn remove(&self, workspace_id: i64) -> TrailsyncResult<()> {
        let result = sqlx::query("delete from audit_search_state where workspace_id = $1")
            .bind(workspace_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TrailsyncError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(TrailsyncError::NotFound(format!(
                "workspace not registered: {workspace_id}"
            )));
        }

        Ok(())
    }
}
