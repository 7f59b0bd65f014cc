// src/modules/records.rs

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::PortalError,
    executor::CommandExecutor,
    models::{
        Document, DocumentStatus, DocumentUpload, FormDefinition, HistoryItem, LinkContext,
        PatientProfile, ProfileChanges,
    },
    storage::FileStorage,
};

/// Documents, required-form definitions, medical history, and the patient
/// profile. The Core module of the portal.
#[derive(Clone)]
pub struct RecordsModule {
    state: Arc<Mutex<RecordsState>>,
    executor: CommandExecutor,
    storage: FileStorage,
}

#[derive(Default)]
struct RecordsState {
    documents: Vec<Document>,
    forms: Vec<FormDefinition>,
    history: Vec<HistoryItem>,
    profile: Option<PatientProfile>,
}

impl RecordsModule {
    pub fn new(latency: std::time::Duration, storage: FileStorage) -> Self {
        Self {
            state: Arc::new(Mutex::new(RecordsState::default())),
            executor: CommandExecutor::new(latency),
            storage,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecordsState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /* ============================================================
       Snapshots / module flags
       ============================================================ */

    pub fn documents(&self) -> Vec<Document> {
        self.lock().documents.clone()
    }

    pub fn forms(&self) -> Vec<FormDefinition> {
        self.lock().forms.clone()
    }

    pub fn history(&self) -> Vec<HistoryItem> {
        self.lock().history.clone()
    }

    pub fn profile(&self) -> Option<PatientProfile> {
        self.lock().profile.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.executor.is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.executor.last_error()
    }

    pub fn seed(
        &self,
        documents: Vec<Document>,
        forms: Vec<FormDefinition>,
        history: Vec<HistoryItem>,
        profile: PatientProfile,
    ) {
        let mut state = self.lock();
        state.documents = documents;
        state.forms = forms;
        state.history = history;
        state.profile = Some(profile);
    }

    /* ============================================================
       upload_document
       ============================================================ */

    /// Stores the file in the mock object store and prepends the record, so
    /// the newest upload is first in every listing. Returns the created
    /// record so callers (message composition, form submission) can reference
    /// its id immediately.
    pub async fn upload_document(
        &self,
        upload: DocumentUpload,
        category: &str,
        link: Option<LinkContext>,
    ) -> Result<Document, PortalError> {
        let state = Arc::clone(&self.state);
        let storage = self.storage.clone();
        let category = category.to_string();
        self.executor
            .run(move || {
                if upload.file_name.trim().is_empty() {
                    return Err(PortalError::validation("file name is required"));
                }
                if category.trim().is_empty() {
                    return Err(PortalError::validation("category is required"));
                }

                let stored = storage.upload(&upload.file_name, "documents");
                let document = Document {
                    id: Uuid::new_v4(),
                    patient_id: upload.patient_id,
                    file_name: upload.file_name,
                    url: stored.url,
                    content_type: upload.content_type,
                    size_bytes: upload.size_bytes,
                    storage_key: stored.key,
                    tags: vec!["patient-upload".to_string(), category.to_lowercase()],
                    category,
                    link,
                    status: DocumentStatus::Active,
                    verification: None,
                    created_at: Utc::now(),
                };

                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                state.documents.insert(0, document.clone());
                Ok(document)
            })
            .await
    }

    /* ============================================================
       archive_document / restore_document
       ============================================================ */

    pub async fn archive_document(&self, id: Uuid) -> Result<Document, PortalError> {
        self.set_document_status(id, DocumentStatus::Archived).await
    }

    pub async fn restore_document(&self, id: Uuid) -> Result<Document, PortalError> {
        self.set_document_status(id, DocumentStatus::Active).await
    }

    async fn set_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
    ) -> Result<Document, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let document = state
                    .documents
                    .iter_mut()
                    .find(|d| d.id == id)
                    .ok_or_else(|| PortalError::not_found("document"))?;
                document.status = status;
                Ok(document.clone())
            })
            .await
    }

    /* ============================================================
       update_profile
       ============================================================ */

    pub async fn update_profile(&self, changes: ProfileChanges) -> Result<PatientProfile, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let profile = state
                    .profile
                    .as_mut()
                    .ok_or_else(|| PortalError::not_found("profile"))?;

                if let Some(email) = changes.email {
                    if !email.contains('@') {
                        return Err(PortalError::validation("email address is invalid"));
                    }
                    profile.email = email;
                }
                if let Some(phone) = changes.phone {
                    profile.phone = phone;
                }
                if let Some(preferred) = changes.preferred_contact {
                    profile.preferred_contact = preferred;
                }
                if let Some(address) = changes.address {
                    profile.address = address;
                }
                Ok(profile.clone())
            })
            .await
    }

    /* ============================================================
       add_history_item
       ============================================================ */

    pub async fn add_history_item(&self, item: HistoryItem) -> Result<HistoryItem, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                state.history.push(item.clone());
                Ok(item)
            })
            .await
    }
}
