use chrono::{DateTime, Utc};

/// One audit trail row as written by the source system. Immutable; `id` is
/// strictly increasing within a workspace, which is what makes the checkpoint
/// a resume cursor.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: i64,
    pub workspace_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub artifact_id: i32,
    pub action_id: i32,
    pub action_name: String,
    pub user_id: i32,
    pub user_name: String,
    pub execution_time_ms: Option<i32>,
    pub details: Option<String>,
    pub request_origin: Option<String>,
    pub record_origin: Option<String>,
}
