use async_trait::async_trait;

use crate::management::models::ClaimedWorkspace;
use trailsync_common::error::TrailsyncResult;

#[async_trait]
pub trait ManagementStore: Send + Sync {
    /// Create the management table if absent. Called by the install hook.
    async fn ensure_store(&self) -> TrailsyncResult<()>;

    /// Insert a workspace row with checkpoint 0 and status Active. Idempotent:
    /// re-registering an existing workspace leaves its row untouched.
    /// Called by the install and workspace-create hooks.
    async fn register_workspace(&self, workspace_id: i64) -> TrailsyncResult<()>;

    /// Soft-delete signal: mark a workspace Disabled so the next claiming run
    /// deletes its index. Called by the uninstall and workspace-delete hooks.
    async fn disable_workspace(&self, workspace_id: i64) -> TrailsyncResult<()>;

    /// Atomically claim the single most overdue unclaimed workspace
    /// (Disabled before Active, then oldest `last_updated` first) by setting
    /// its lock owner, and return its prior state.
    ///
    /// Returns `None` when no unclaimed row exists or the store is absent.
    /// If the store exists but holds zero rows, it is dropped (self-cleanup).
    async fn claim_next(&self, worker_id: &str) -> TrailsyncResult<Option<ClaimedWorkspace>>;

    /// Clear the lock owner, persist the checkpoint, and touch
    /// `last_updated`. Must run on every exit path of a claimed run.
    async fn release(&self, workspace_id: i64, checkpoint: i64) -> TrailsyncResult<()>;

    /// Remove a workspace row entirely (after its index deletion was
    /// acknowledged).
    async fn remove(&self, workspace_id: i64) -> TrailsyncResult<()>;
}
