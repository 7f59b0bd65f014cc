// src/models.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

/* -------------------------
   Clinical
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Confirmed,
    Pending,
    Cancelled,
    Completed,
    CheckedIn,
    NoShow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub office_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub appointment_type: String,
    pub reason: String,
    pub status: AppointmentStatus,
    pub confirmation_code: String,
    pub check_in_answers: Option<Vec<CheckInAnswer>>,
    pub telehealth_link: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInAnswer {
    pub question: String,
    pub answer: String,
}

/// One bookable slot in the availability index. Consumed (removed) when an
/// appointment lands on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub slot_id: Uuid,
    pub provider_id: Uuid,
    pub office_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub office_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub appointment_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Proposed,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedProcedure {
    pub description: String,
    pub estimate: Money,
    pub linked_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    pub status: PlanStatus,
    pub procedures: Vec<PlannedProcedure>,
    pub proposed_on: NaiveDate,
}

/* -------------------------
   Billing
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Open,
    PartiallyPaid,
    PaidInFull,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub charge: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub issued_on: NaiveDate,
    pub line_items: Vec<LineItem>,
    pub total_charges: Money,
    pub insurance_paid: Money,
    pub patient_responsibility: Money,
    pub payments_made: Money,
    pub amount_due: Money,
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub invoice_id: Uuid,
    pub amount_applied: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Completed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub amount: Money,
    pub method_id: Uuid,
    pub allocations: Vec<PaymentAllocation>,
    pub unapplied_amount: Money,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundStatus {
    Requested,
    Issued,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount: Money,
    pub reason: String,
    pub status: RefundStatus,
    pub requested_at: DateTime<Utc>,
}

/// Closed set of payment method shapes; each consumption site matches
/// exhaustively instead of sniffing optional fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PaymentMethodKind {
    Card {
        brand: String,
        last_four: String,
        expires: String,
    },
    Bank {
        bank_name: String,
        last_four: String,
    },
    Online {
        provider: String,
        account_email: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub is_default: bool,
    pub kind: PaymentMethodKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPaymentMethod {
    pub patient_id: Uuid,
    pub is_default: bool,
    pub kind: PaymentMethodKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub carrier: String,
    pub plan_name: String,
    pub subscriber_name: String,
    pub member_id: String,
    pub group_number: String,
    pub status: PolicyStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPolicy {
    pub patient_id: Uuid,
    pub carrier: String,
    pub plan_name: String,
    pub subscriber_name: String,
    pub member_id: String,
    pub group_number: String,
}

/* -------------------------
   Engagement (secure messaging)
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadStatus {
    PendingStaff,
    PendingPatient,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageThread {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub subject: String,
    pub category: String,
    pub status: ThreadStatus,
    pub patient_has_read: bool,
    pub staff_has_read: bool,
    pub last_message: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostAuthor {
    Patient,
    Staff,
    System,
}

/// Posts are append-only and never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePost {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub author: PostAuthor,
    pub body: String,
    pub attachment_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/* -------------------------
   Records (documents, forms, history, profile)
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    Active,
    Archived,
}

/// Points a document at another entity (an appointment, a claim, a form...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkContext {
    pub kind: String,
    pub id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationState {
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub state: VerificationState,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub file_name: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub storage_key: String,
    pub category: String,
    pub link: Option<LinkContext>,
    pub tags: Vec<String>,
    pub status: DocumentStatus,
    pub verification: Option<Verification>,
    pub created_at: DateTime<Utc>,
}

/// What the UI hands over when the patient picks a file.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpload {
    pub patient_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDefinition {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub required: bool,
    pub recurs_annually: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormStatus {
    Missing,
    Optional,
    Pending,
    Rejected,
    Expired,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HistoryItem {
    Allergy {
        substance: String,
        reaction: String,
        severity: String,
    },
    Medication {
        name: String,
        dosage: String,
        prescriber: String,
    },
    Surgery {
        procedure: String,
        performed_on: NaiveDate,
    },
    Condition {
        name: String,
        diagnosed_on: NaiveDate,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub email: String,
    pub phone: String,
    pub preferred_contact: String,
    pub address: String,
}

/// Field-wise profile merge; None leaves the current value in place.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub preferred_contact: Option<String>,
    pub address: Option<String>,
}

/* -------------------------
   Helpers
--------------------------*/

impl HistoryItem {
    pub fn summary(&self) -> String {
        match self {
            HistoryItem::Allergy { substance, severity, .. } => {
                format!("Allergy: {substance} ({severity})")
            }
            HistoryItem::Medication { name, dosage, .. } => {
                format!("Medication: {name} {dosage}")
            }
            HistoryItem::Surgery { procedure, performed_on } => {
                format!("Surgery: {procedure} on {performed_on}")
            }
            HistoryItem::Condition { name, diagnosed_on } => {
                format!("Condition: {name} since {diagnosed_on}")
            }
        }
    }
}

impl PaymentMethodKind {
    /// Masked label shown in payment pickers.
    pub fn display_label(&self) -> String {
        match self {
            PaymentMethodKind::Card { brand, last_four, .. } => {
                format!("{brand} •••• {last_four}")
            }
            PaymentMethodKind::Bank { bank_name, last_four } => {
                format!("{bank_name} •••• {last_four}")
            }
            PaymentMethodKind::Online { provider, account_email } => {
                format!("{provider} ({account_email})")
            }
        }
    }
}
