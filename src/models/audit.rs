use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::enums::{AuditAction, AuditOutcome, AuditResource, UserRole};

/// One access to a sensitive resource. Rows are appended by the services
/// and never mutated or deleted by the application.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub actor_id: Uuid,
    pub actor_role: UserRole,
    pub action: AuditAction,
    pub resource: AuditResource,
    pub resource_id: String,
    pub outcome: AuditOutcome,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Client metadata captured from the request, carried into audit rows.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
