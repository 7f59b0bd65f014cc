// src/notify.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PortalError;
use crate::models::MessageThread;

/// Cross-module side channel: a committed mutation in one module asks another
/// module to post a system-generated message. Billing holds an
/// `Arc<dyn Notify>` backed by Engagement.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn notify(
        &self,
        patient_id: uuid::Uuid,
        subject: &str,
        category: &str,
        body: &str,
    ) -> Result<MessageThread, PortalError>;
}

/// Fires a notification after the primary mutation has committed. Errors are
/// logged and swallowed: the primary transaction is never undone by a failed
/// notification, and the warn line is the only audit trail.
pub async fn notify_best_effort(
    notifier: &Arc<dyn Notify>,
    patient_id: uuid::Uuid,
    subject: &str,
    category: &str,
    body: &str,
) {
    if let Err(e) = notifier.notify(patient_id, subject, category, body).await {
        tracing::warn!(code = e.code(), subject, "notification failed: {e}");
    }
}

/// Drops every notification. Default wiring for modules under test.
pub struct NullNotifier;

#[async_trait]
impl Notify for NullNotifier {
    async fn notify(
        &self,
        patient_id: uuid::Uuid,
        subject: &str,
        _category: &str,
        _body: &str,
    ) -> Result<MessageThread, PortalError> {
        Ok(MessageThread {
            id: uuid::Uuid::new_v4(),
            patient_id,
            subject: subject.to_string(),
            category: "system".to_string(),
            status: crate::models::ThreadStatus::PendingStaff,
            patient_has_read: true,
            staff_has_read: false,
            last_message: String::new(),
            updated_at: chrono::Utc::now(),
        })
    }
}
