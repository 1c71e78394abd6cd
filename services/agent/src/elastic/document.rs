use chrono::{DateTime, Utc};
use serde::Serialize;

use trailsync_db::audit::models::AuditRecord;

/// Search-side projection of an audit record. Field names here are the wire
/// names in the index, so the struct serializes without renames.
#[derive(Debug, Clone, Serialize)]
pub struct AuditDocument {
    pub audit_record_id: i64,
    pub timestamp: DateTime<Utc>,
    pub artifact_id: i32,
    pub action_id: i32,
    pub action: String,
    pub user_id: i32,
    pub user: String,
    pub execution_time: Option<i32>,
    pub details: Option<String>,
    pub request_origination: Option<String>,
    pub record_origination: Option<String>,
}

impl From<AuditRecord> for AuditDocument {
    fn from(record: AuditRecord) -> Self {
        Self {
            audit_record_id: record.id,
            timestamp: record.occurred_at,
            artifact_id: record.artifact_id,
            action_id: record.action_id,
            action: record.action_name,
            user_id: record.user_id,
            user: record.user_name,
            execution_time: record.execution_time_ms,
            details: record.details,
            request_origination: record.request_origin,
            record_origination: record.record_origin,
        }
    }
}

/// The fixed field mapping every workspace index is created with.
pub fn mapping() -> serde_json::Value {
    serde_json::json!({
        "audit_record_id":     { "type": "long" },
        "timestamp":           { "type": "date" },
        "artifact_id":         { "type": "integer" },
        "action_id":           { "type": "integer" },
        "action":              { "type": "keyword" },
        "user_id":             { "type": "integer" },
        "user":                { "type": "keyword" },
        "execution_time":      { "type": "integer" },
        "details":             { "type": "text" },
        "request_origination": { "type": "text" },
        "record_origination":  { "type": "text" }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> AuditRecord {
        AuditRecord {
            id: 42,
            workspace_id: 7,
            occurred_at: "2026-03-01T10:15:00Z".parse().expect("timestamp"),
            artifact_id: 1042,
            action_id: 2,
            action_name: "Update".to_string(),
            user_id: 9,
            user_name: "adminuser".to_string(),
            execution_time_ms: Some(13),
            details: Some("field changed".to_string()),
            request_origin: Some("10.0.0.1".to_string()),
            record_origin: Some("primary".to_string()),
        }
    }

    #[test]
    fn document_uses_index_field_names() {
        let doc = AuditDocument::from(sample_record());
        let value = serde_json::to_value(&doc).expect("serialize");

        assert_eq!(value["audit_record_id"], 42);
        assert_eq!(value["action"], "Update");
        assert_eq!(value["user"], "adminuser");
        assert_eq!(value["execution_time"], 13);
        assert_eq!(value["request_origination"], "10.0.0.1");
        assert_eq!(value["record_origination"], "primary");
        // Source-only columns must not leak into the document.
        assert!(value.get("workspace_id").is_none());
        assert!(value.get("occurred_at").is_none());
    }

    #[test]
    fn absent_optionals_serialize_as_null() {
        let mut record = sample_record();
        record.execution_time_ms = None;
        record.details = None;

        let value = serde_json::to_value(AuditDocument::from(record)).expect("serialize");
        assert!(value["execution_time"].is_null());
        assert!(value["details"].is_null());
    }

    #[test]
    fn mapping_matches_document_fields() {
        let doc_value = serde_json::to_value(AuditDocument::from(sample_record())).expect("serialize");
        let doc_fields = doc_value.as_object().expect("document is an object");
        let mapped = mapping();
        let mapped_fields = mapped.as_object().expect("mapping is an object");

        for field in doc_fields.keys() {
            assert!(mapped_fields.contains_key(field), "unmapped field: {field}");
        }
        assert_eq!(doc_fields.len(), mapped_fields.len());
    }

    #[test]
    fn timestamp_serializes_as_iso8601() {
        let value = serde_json::to_value(AuditDocument::from(sample_record())).expect("serialize");
        let ts = value["timestamp"].as_str().expect("timestamp is a string");
        assert!(ts.starts_with("2026-03-01T10:15:00"));
    }
}
