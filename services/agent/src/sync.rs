//! Incremental catch-up of one workspace index from its audit source.
//!
//! The run reads pages strictly after the checkpoint, pushes them in bulk
//! sub-batches, and advances the checkpoint only past sub-batches the search
//! engine acknowledged without a single item error. Whatever happens, the
//! reported checkpoint is safe to persist: everything at or below it is in
//! the index.

use crate::elastic::client::{ElasticClient, ElasticError};
use crate::elastic::document::AuditDocument;
use trailsync_common::error::TrailsyncError;
use trailsync_db::audit::repositories::AuditSource;

/// Rows fetched from the source per query.
pub const PAGE_SIZE: i64 = 1000;
/// Documents per `_bulk` request; a failing request forfeits at most this
/// much progress.
pub const BULK_SIZE: usize = 250;
/// Floor for the per-run budget; anything lower is clamped up.
pub const MIN_SYNC_BUDGET: i64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] TrailsyncError),

    #[error(transparent)]
    Search(#[from] ElasticError),
}

/// End state of one sync run. `checkpoint` is always the release value,
/// whether or not `error` is set.
#[derive(Debug)]
pub struct SyncReport {
    pub checkpoint: i64,
    pub indexed: u64,
    pub error: Option<SyncError>,
}

pub struct SyncEngine<A> {
    source: A,
    elastic: ElasticClient,
}

impl<A> SyncEngine<A>
where
    A: AuditSource,
{
    pub fn new(source: A, elastic: ElasticClient) -> Self {
        Self { source, elastic }
    }

    pub async fn run(
        &self,
        workspace_id: i64,
        index: &str,
        start_checkpoint: i64,
        budget: i64,
    ) -> SyncReport {
        let mut checkpoint = start_checkpoint;
        let mut indexed: u64 = 0;

        if let Err(e) = self.elastic.ping().await {
            tracing::warn!(workspace_id, error = %e, "search engine unreachable");
            return SyncReport {
                checkpoint,
                indexed,
                error: Some(e.into()),
            };
        }

        let mut remaining = budget;
        while remaining > 0 {
            let limit = PAGE_SIZE.min(remaining);
            let page = match self.source.fetch_page(workspace_id, checkpoint, limit).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(workspace_id, checkpoint, error = %e, "audit page fetch failed");
                    return SyncReport {
                        checkpoint,
                        indexed,
                        error: Some(e.into()),
                    };
                }
            };
            if page.is_empty() {
                break;
            }
            let fetched = page.len() as i64;

            for batch in page.chunks(BULK_SIZE) {
                let docs: Vec<AuditDocument> =
                    batch.iter().cloned().map(AuditDocument::from).collect();
                if let Err(e) = self.elastic.bulk_index(index, &docs).await {
                    tracing::warn!(
                        workspace_id,
                        checkpoint,
                        batch_len = batch.len(),
                        error = %e,
                        "bulk request failed, stopping at last acknowledged checkpoint"
                    );
                    return SyncReport {
                        checkpoint,
                        indexed,
                        error: Some(e.into()),
                    };
                }
                // Rows are id-ascending, so the sub-batch tail is its max id.
                if let Some(last) = batch.last() {
                    checkpoint = last.id;
                }
                indexed += batch.len() as u64;
            }

            tracing::debug!(workspace_id, fetched, checkpoint, "page indexed");

            remaining -= fetched;
            if fetched < limit {
                break;
            }
        }

        SyncReport {
            checkpoint,
            indexed,
            error: None,
        }
    }
}
