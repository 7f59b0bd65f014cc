// src/modules/engagement.rs

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::PortalError,
    executor::CommandExecutor,
    models::{MessagePost, MessageThread, PostAuthor, ThreadStatus},
    notify::Notify,
};

/// Length of the `last_message` snippet kept on the thread row.
const SNIPPET_LEN: usize = 50;

/// Secure-messaging threads and their append-only posts.
#[derive(Clone)]
pub struct EngagementModule {
    state: Arc<Mutex<EngagementState>>,
    executor: CommandExecutor,
}

#[derive(Default)]
struct EngagementState {
    threads: Vec<MessageThread>,
    posts: Vec<MessagePost>,
}

fn snippet(body: &str) -> String {
    let chars: Vec<char> = body.chars().collect();
    if chars.len() > SNIPPET_LEN {
        let head: String = chars[..SNIPPET_LEN].iter().collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}

impl EngagementModule {
    pub fn new(latency: std::time::Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngagementState::default())),
            executor: CommandExecutor::new(latency),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngagementState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /* ============================================================
       Snapshots / module flags
       ============================================================ */

    pub fn threads(&self) -> Vec<MessageThread> {
        self.lock().threads.clone()
    }

    pub fn posts_for(&self, thread_id: Uuid) -> Vec<MessagePost> {
        self.lock()
            .posts
            .iter()
            .filter(|p| p.thread_id == thread_id)
            .cloned()
            .collect()
    }

    pub fn is_loading(&self) -> bool {
        self.executor.is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.executor.last_error()
    }

    pub fn seed(&self, threads: Vec<MessageThread>, posts: Vec<MessagePost>) {
        let mut state = self.lock();
        state.threads = threads;
        state.posts = posts;
    }

    /* ============================================================
       create_new_thread
       ============================================================ */

    pub async fn create_new_thread(
        &self,
        patient_id: Uuid,
        subject: &str,
        category: &str,
        body: &str,
        attachment_ids: Vec<Uuid>,
    ) -> Result<MessageThread, PortalError> {
        self.create_thread_as(PostAuthor::Patient, patient_id, subject, category, body, attachment_ids)
            .await
    }

    async fn create_thread_as(
        &self,
        author: PostAuthor,
        patient_id: Uuid,
        subject: &str,
        category: &str,
        body: &str,
        attachment_ids: Vec<Uuid>,
    ) -> Result<MessageThread, PortalError> {
        let state = Arc::clone(&self.state);
        let (subject, category, body) = (subject.to_string(), category.to_string(), body.to_string());
        self.executor
            .run(move || {
                if subject.trim().is_empty() {
                    return Err(PortalError::validation("subject is required"));
                }
                if body.trim().is_empty() {
                    return Err(PortalError::validation("message body is required"));
                }

                let now = Utc::now();
                let thread = MessageThread {
                    id: Uuid::new_v4(),
                    patient_id,
                    subject,
                    category,
                    status: ThreadStatus::PendingStaff,
                    // System-generated threads arrive unread by the patient.
                    patient_has_read: author == PostAuthor::Patient,
                    staff_has_read: false,
                    last_message: snippet(&body),
                    updated_at: now,
                };
                let post = MessagePost {
                    id: Uuid::new_v4(),
                    thread_id: thread.id,
                    author,
                    body,
                    attachment_ids,
                    created_at: now,
                };

                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                state.threads.push(thread.clone());
                state.posts.push(post);
                Ok(thread)
            })
            .await
    }

    /* ============================================================
       send_message
       ============================================================ */

    pub async fn send_message(
        &self,
        thread_id: Uuid,
        body: &str,
        attachment_ids: Vec<Uuid>,
    ) -> Result<MessagePost, PortalError> {
        let state = Arc::clone(&self.state);
        let body = body.to_string();
        self.executor
            .run(move || {
                if body.trim().is_empty() {
                    return Err(PortalError::validation("message body is required"));
                }

                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let thread = state
                    .threads
                    .iter_mut()
                    .find(|t| t.id == thread_id)
                    .ok_or_else(|| PortalError::not_found("thread"))?;
                if thread.status == ThreadStatus::Closed {
                    return Err(PortalError::validation("Thread is closed"));
                }

                // A patient reply reopens the thread for staff attention.
                thread.last_message = snippet(&body);
                thread.patient_has_read = true;
                thread.staff_has_read = false;
                thread.status = ThreadStatus::PendingStaff;
                thread.updated_at = Utc::now();

                let post = MessagePost {
                    id: Uuid::new_v4(),
                    thread_id,
                    author: PostAuthor::Patient,
                    body,
                    attachment_ids,
                    created_at: thread.updated_at,
                };
                state.posts.push(post.clone());
                Ok(post)
            })
            .await
    }

    /* ============================================================
       mark_thread_read
       ============================================================ */

    pub async fn mark_thread_read(&self, thread_id: Uuid) -> Result<MessageThread, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let thread = state
                    .threads
                    .iter_mut()
                    .find(|t| t.id == thread_id)
                    .ok_or_else(|| PortalError::not_found("thread"))?;
                thread.patient_has_read = true;
                Ok(thread.clone())
            })
            .await
    }
}

/// System-generated notifications from other modules land here as new
/// threads authored by `System`.
#[async_trait]
impl Notify for EngagementModule {
    async fn notify(
        &self,
        patient_id: Uuid,
        subject: &str,
        category: &str,
        body: &str,
    ) -> Result<MessageThread, PortalError> {
        self.create_thread_as(PostAuthor::System, patient_id, subject, category, body, vec![])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn module() -> EngagementModule {
        EngagementModule::new(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_create_thread_with_first_post() {
        let engagement = module();
        let patient_id = Uuid::new_v4();
        let thread = engagement
            .create_new_thread(patient_id, "Billing question", "billing", "What is this charge?", vec![])
            .await
            .unwrap();

        assert_eq!(thread.status, ThreadStatus::PendingStaff);
        assert!(thread.patient_has_read);
        assert!(!thread.staff_has_read);
        assert_eq!(thread.last_message, "What is this charge?");

        let posts = engagement.posts_for(thread.id);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].author, PostAuthor::Patient);
    }

    #[tokio::test]
    async fn test_snippet_truncates_at_fifty_chars() {
        let engagement = module();
        let long_body = "a".repeat(80);
        let thread = engagement
            .create_new_thread(Uuid::new_v4(), "Subject", "general", &long_body, vec![])
            .await
            .unwrap();

        assert_eq!(thread.last_message.chars().count(), 53); // 50 + "..."
        assert!(thread.last_message.ends_with("..."));

        // Exactly 50 chars is left untouched.
        let exact = "b".repeat(50);
        let thread = engagement
            .create_new_thread(Uuid::new_v4(), "Subject", "general", &exact, vec![])
            .await
            .unwrap();
        assert_eq!(thread.last_message, exact);
    }

    #[tokio::test]
    async fn test_send_message_reopens_thread() {
        let engagement = module();
        let thread = engagement
            .create_new_thread(Uuid::new_v4(), "Subject", "general", "first", vec![])
            .await
            .unwrap();

        // Simulate staff having replied and the thread waiting on the patient.
        {
            let mut state = engagement.lock();
            let t = state.threads.iter_mut().find(|t| t.id == thread.id).unwrap();
            t.status = ThreadStatus::PendingPatient;
            t.staff_has_read = true;
        }

        let post = engagement.send_message(thread.id, "a follow-up", vec![]).await.unwrap();
        assert_eq!(post.author, PostAuthor::Patient);

        let t = &engagement.threads()[0];
        assert_eq!(t.status, ThreadStatus::PendingStaff);
        assert!(!t.staff_has_read);
        assert_eq!(t.last_message, "a follow-up");
        assert_eq!(engagement.posts_for(thread.id).len(), 2);
    }

    #[tokio::test]
    async fn test_send_message_closed_thread_fails() {
        let engagement = module();
        let thread = engagement
            .create_new_thread(Uuid::new_v4(), "Subject", "general", "first", vec![])
            .await
            .unwrap();
        {
            let mut state = engagement.lock();
            state.threads[0].status = ThreadStatus::Closed;
        }

        let err = engagement.send_message(thread.id, "anyone there?", vec![]).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(engagement.posts_for(thread.id).len(), 1); // nothing appended
    }

    #[tokio::test]
    async fn test_send_message_unknown_thread_fails() {
        let engagement = module();
        let err = engagement.send_message(Uuid::new_v4(), "hello", vec![]).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_notify_creates_unread_system_thread() {
        let engagement = module();
        let patient_id = Uuid::new_v4();
        let thread = engagement
            .notify(patient_id, "Payment received", "billing", "We received your payment.")
            .await
            .unwrap();

        assert!(!thread.patient_has_read);
        let posts = engagement.posts_for(thread.id);
        assert_eq!(posts[0].author, PostAuthor::System);
        assert_eq!(crate::views::unread_thread_count(&engagement.threads()), 1);
    }

    #[tokio::test]
    async fn test_mark_thread_read() {
        let engagement = module();
        let thread = engagement
            .notify(Uuid::new_v4(), "Payment received", "billing", "body")
            .await
            .unwrap();

        engagement.mark_thread_read(thread.id).await.unwrap();
        assert_eq!(crate::views::unread_thread_count(&engagement.threads()), 0);
    }
}
