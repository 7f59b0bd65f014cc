// src/views.rs
//
// Pure projections over entity collections. Recomputed on every call, never
// mutate their inputs, never cached.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    Appointment, Document, DocumentStatus, FormDefinition, FormStatus, Invoice, MessageThread,
    VerificationState,
};

/* ============================================================
   Appointment bucketing
   ============================================================ */

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentBuckets {
    /// Nearest future appointment first.
    pub upcoming: Vec<Appointment>,
    /// Most recent past appointment first.
    pub past: Vec<Appointment>,
}

pub fn bucket_appointments(appointments: &[Appointment], now: DateTime<Utc>) -> AppointmentBuckets {
    let mut upcoming: Vec<Appointment> = appointments
        .iter()
        .filter(|a| a.start_at >= now)
        .cloned()
        .collect();
    let mut past: Vec<Appointment> = appointments
        .iter()
        .filter(|a| a.start_at < now)
        .cloned()
        .collect();

    upcoming.sort_by_key(|a| a.start_at);
    past.sort_by_key(|a| std::cmp::Reverse(a.start_at));

    AppointmentBuckets { upcoming, past }
}

/* ============================================================
   Document categorization
   ============================================================ */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSort {
    DateAsc,
    DateDesc,
    NameAsc,
    NameDesc,
}

/// Groups documents by category. `include_archived` toggles which status is
/// shown; within a group, ordering is stable for equal sort keys.
pub fn categorize_documents(
    documents: &[Document],
    include_archived: bool,
    sort: DocumentSort,
) -> BTreeMap<String, Vec<Document>> {
    let wanted = if include_archived {
        DocumentStatus::Archived
    } else {
        DocumentStatus::Active
    };

    let mut groups: BTreeMap<String, Vec<Document>> = BTreeMap::new();
    for doc in documents.iter().filter(|d| d.status == wanted) {
        groups.entry(doc.category.clone()).or_default().push(doc.clone());
    }

    for docs in groups.values_mut() {
        match sort {
            DocumentSort::DateAsc => docs.sort_by_key(|d| d.created_at),
            DocumentSort::DateDesc => docs.sort_by_key(|d| std::cmp::Reverse(d.created_at)),
            DocumentSort::NameAsc => docs.sort_by(|a, b| a.file_name.cmp(&b.file_name)),
            DocumentSort::NameDesc => docs.sort_by(|a, b| b.file_name.cmp(&a.file_name)),
        }
    }

    groups
}

/* ============================================================
   Outstanding invoices
   ============================================================ */

pub fn outstanding_invoices(invoices: &[Invoice]) -> Vec<Invoice> {
    invoices
        .iter()
        .filter(|i| i.amount_due.amount > 0.0)
        .cloned()
        .collect()
}

/* ============================================================
   Required-form status tracking
   ============================================================ */

#[derive(Debug, Clone, Serialize)]
pub struct FormStatusView {
    pub form_id: Uuid,
    pub form_name: String,
    pub status: FormStatus,
    pub document_id: Option<Uuid>,
}

/// Classifies each form by its most recently created linked Active document.
/// Annually-recurring forms expire once the verification timestamp is more
/// than a year before `today`. Pure in its inputs, so repeated calls over
/// unchanged data yield identical classifications.
pub fn form_statuses(
    forms: &[FormDefinition],
    documents: &[Document],
    today: DateTime<Utc>,
) -> Vec<FormStatusView> {
    forms
        .iter()
        .map(|form| {
            let latest = documents
                .iter()
                .filter(|d| {
                    d.status == DocumentStatus::Active
                        && d.link
                            .as_ref()
                            .is_some_and(|l| l.kind == "form" && l.id == form.id)
                })
                .max_by_key(|d| d.created_at);

            let status = match latest {
                None if form.required => FormStatus::Missing,
                None => FormStatus::Optional,
                Some(doc) => classify_document(form, doc, today),
            };

            FormStatusView {
                form_id: form.id,
                form_name: form.name.clone(),
                status,
                document_id: latest.map(|d| d.id),
            }
        })
        .collect()
}

fn classify_document(form: &FormDefinition, doc: &Document, today: DateTime<Utc>) -> FormStatus {
    let Some(verification) = &doc.verification else {
        return FormStatus::Pending;
    };
    match verification.state {
        VerificationState::Pending => FormStatus::Pending,
        VerificationState::Rejected => FormStatus::Rejected,
        VerificationState::Verified => {
            let expired = form.recurs_annually
                && verification
                    .verified_at
                    .is_some_and(|at| today - at > Duration::days(365));
            if expired {
                FormStatus::Expired
            } else {
                FormStatus::Complete
            }
        }
    }
}

/* ============================================================
   Messaging
   ============================================================ */

pub fn unread_thread_count(threads: &[MessageThread]) -> usize {
    threads.iter().filter(|t| !t.patient_has_read).count()
}
