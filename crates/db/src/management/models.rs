use trailsync_common::error::{TrailsyncError, TrailsyncResult};

/// Synchronization lifecycle of a workspace row.
///
/// Stored as SMALLINT; `Disabled = 0` sorts before `Active = 1`, so
/// `ORDER BY status ASC` serves delete-pending workspaces first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceStatus {
    /// The workspace index should be removed; the row follows once the
    /// deletion is acknowledged.
    Disabled = 0,
    /// Keep synchronizing.
    Active = 1,
}

impl WorkspaceStatus {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_i16(value: i16) -> TrailsyncResult<Self> {
        match value {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::Active),
            other => Err(TrailsyncError::Internal(format!(
                "unknown workspace status: {other}"
            ))),
        }
    }
}

/// What a successful claim hands the orchestrator: the workspace plus the
/// state its run starts from.
#[derive(Debug, Clone)]
pub struct ClaimedWorkspace {
    pub workspace_id: i64,
    /// Highest audit record id fully synchronized; 0 = never synchronized.
    pub checkpoint: i64,
    pub status: WorkspaceStatus,
}
