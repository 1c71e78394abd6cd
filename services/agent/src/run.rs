//! One agent invocation: claim at most one workspace, service it according
//! to its status, and hand the claim back no matter how the run went.

use crate::elastic::client::{ElasticClient, ElasticError};
use crate::lifecycle;
use crate::sync::{SyncEngine, SyncError, MIN_SYNC_BUDGET};
use trailsync_common::error::TrailsyncError;
use trailsync_db::audit::repositories::AuditSource;
use trailsync_db::management::models::WorkspaceStatus;
use trailsync_db::management::repositories::ManagementStore;

const DEFAULT_SYNC_BUDGET: i64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] TrailsyncError),

    #[error(transparent)]
    Search(#[from] ElasticError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Lock-owner identifier written into claimed rows.
    pub worker_id: String,
    /// Max source rows one run may index.
    pub sync_budget: i64,
}

impl RunSettings {
    pub fn from_env() -> Result<Self, AgentError> {
        let worker_id = match std::env::var("WORKER_ID").ok().filter(|v| !v.trim().is_empty()) {
            Some(value) => value,
            None => default_worker_id(),
        };

        let sync_budget = match std::env::var("SYNC_BUDGET") {
            Ok(raw) => raw.trim().parse::<i64>().map_err(|_| {
                AgentError::Config(format!("SYNC_BUDGET must be an integer, got {raw:?}"))
            })?,
            Err(_) => DEFAULT_SYNC_BUDGET,
        };
        let sync_budget = if sync_budget < MIN_SYNC_BUDGET {
            tracing::warn!(
                sync_budget,
                floor = MIN_SYNC_BUDGET,
                "sync budget below floor, clamping up"
            );
            MIN_SYNC_BUDGET
        } else {
            sync_budget
        };

        Ok(Self {
            worker_id,
            sync_budget,
        })
    }
}

fn default_worker_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "agent".to_string());
    format!("{host}-{}", std::process::id())
}

#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing claimable this tick.
    Idle,
    /// A workspace was synchronized, possibly with zero new rows.
    Synced {
        workspace_id: i64,
        indexed: u64,
        checkpoint: i64,
    },
    /// A disabled workspace's index and management row are gone.
    Decommissioned { workspace_id: i64 },
}

pub struct AgentRunner<M, A> {
    management: M,
    engine: SyncEngine<A>,
    elastic: ElasticClient,
    settings: RunSettings,
}

impl<M, A> AgentRunner<M, A>
where
    M: ManagementStore,
    A: AuditSource,
{
    pub fn new(management: M, source: A, elastic: ElasticClient, settings: RunSettings) -> Self {
        Self {
            management,
            engine: SyncEngine::new(source, elastic.clone()),
            elastic,
            settings,
        }
    }

    pub async fn tick(&self) -> Result<TickOutcome, AgentError> {
        let claimed = match self.management.claim_next(&self.settings.worker_id).await? {
            Some(claimed) => claimed,
            None => {
                tracing::debug!("no workspace to service");
                return Ok(TickOutcome::Idle);
            }
        };

        let index = self.elastic.index_name(claimed.workspace_id);
        tracing::info!(
            workspace_id = claimed.workspace_id,
            checkpoint = claimed.checkpoint,
            status = ?claimed.status,
            index,
            "servicing workspace"
        );

        match claimed.status {
            WorkspaceStatus::Disabled => {
                self.decommission(claimed.workspace_id, claimed.checkpoint, &index)
                    .await
            }
            WorkspaceStatus::Active => {
                self.synchronize(claimed.workspace_id, claimed.checkpoint, &index)
                    .await
            }
        }
    }

    async fn synchronize(
        &self,
        workspace_id: i64,
        checkpoint: i64,
        index: &str,
    ) -> Result<TickOutcome, AgentError> {
        // Checkpoint 0 marks a never-synchronized workspace; only then does
        // provisioning run.
        if checkpoint == 0 {
            if let Err(e) = lifecycle::ensure_index(&self.elastic, index).await {
                tracing::error!(workspace_id, index, error = %e, "index provisioning failed");
                self.release_after_error(workspace_id, checkpoint).await;
                return Err(e.into());
            }
        }

        let report = self
            .engine
            .run(workspace_id, index, checkpoint, self.settings.sync_budget)
            .await;

        match report.error {
            None => {
                self.management
                    .release(workspace_id, report.checkpoint)
                    .await?;
                tracing::info!(
                    workspace_id,
                    indexed = report.indexed,
                    checkpoint = report.checkpoint,
                    "workspace synchronized"
                );
                Ok(TickOutcome::Synced {
                    workspace_id,
                    indexed: report.indexed,
                    checkpoint: report.checkpoint,
                })
            }
            Some(e) => {
                tracing::error!(
                    workspace_id,
                    checkpoint = report.checkpoint,
                    error = %e,
                    "sync run failed"
                );
                self.release_after_error(workspace_id, report.checkpoint).await;
                Err(e.into())
            }
        }
    }

    async fn decommission(
        &self,
        workspace_id: i64,
        checkpoint: i64,
        index: &str,
    ) -> Result<TickOutcome, AgentError> {
        if let Err(e) = lifecycle::delete_index(&self.elastic, index).await {
            tracing::error!(workspace_id, index, error = %e, "index deletion failed");
            self.release_after_error(workspace_id, checkpoint).await;
            return Err(e.into());
        }

        if let Err(e) = self.management.remove(workspace_id).await {
            tracing::error!(workspace_id, error = %e, "row removal failed after index deletion");
            self.release_after_error(workspace_id, checkpoint).await;
            return Err(e.into());
        }

        tracing::info!(workspace_id, index, "workspace decommissioned");
        Ok(TickOutcome::Decommissioned { workspace_id })
    }

    /// Best-effort release once the run has already failed; the primary
    /// error is what the caller surfaces.
    async fn release_after_error(&self, workspace_id: i64, checkpoint: i64) {
        if let Err(e) = self.management.release(workspace_id, checkpoint).await {
            tracing::error!(workspace_id, error = %e, "release failed after run error");
        }
    }
}
