use async_trait::async_trait;

use crate::audit::models::AuditRecord;
use trailsync_common::error::TrailsyncResult;

#[async_trait]
pub trait AuditSource: Send + Sync {
    /// Fetch up to `limit` records for a workspace with `id > after_id`,
    /// ascending. Strictly after: the cursor row itself is never re-read.
    async fn fetch_page(
        &self,
        workspace_id: i64,
        after_id: i64,
        limit: i64,
    ) -> TrailsyncResult<Vec<AuditRecord>>;
}
