//! Audit sink for development. Logs audit events to tracing output.

use async_trait::async_trait;
use coursewright_application::{AuditEvent, AuditRepository};
use coursewright_core::AppResult;
use tracing::info;

/// Development audit repository that writes events to the log.
#[derive(Clone, Default)]
pub struct TracingAuditRepository;

impl TracingAuditRepository {
    /// Creates a new tracing audit repository.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditRepository for TracingAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        info!(
            target: "coursewright::audit",
            course = %event.course,
            subject = %event.subject,
            action = event.action.as_str(),
            resource_type = %event.resource_type,
            resource_id = %event.resource_id,
            detail = event.detail.as_deref().unwrap_or_default(),
            "audit event"
        );

        Ok(())
    }
}
