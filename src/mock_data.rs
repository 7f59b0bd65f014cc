//! Simulated patient-portal data. Everything here is hardcoded and
//! fictional; this module stands in for the real backend a production
//! deployment would call.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::models::*;
use crate::modules::Portal;
use crate::money::Money;

/// Stable ids the demo scenario can refer back to after seeding.
pub struct SeedIds {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub office_id: Uuid,
    pub open_invoice_id: Uuid,
    pub default_method_id: Uuid,
    pub hipaa_form_id: Uuid,
}

pub fn seed_portal(portal: &Portal) -> SeedIds {
    let patient_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();
    let office_id = Uuid::new_v4();

    let now = Utc::now();

    /* ---- clinical ---- */

    let past_visit = Appointment {
        id: Uuid::new_v4(),
        patient_id,
        provider_id,
        office_id,
        start_at: now - Duration::days(90),
        end_at: now - Duration::days(90) + Duration::minutes(45),
        appointment_type: "Cleaning".into(),
        reason: "Semi-annual cleaning".into(),
        status: AppointmentStatus::Completed,
        confirmation_code: "QX4R7M".into(),
        check_in_answers: None,
        telehealth_link: None,
        cancelled_at: None,
        cancel_reason: None,
    };

    let slots = (0..6)
        .map(|i| {
            let start = (now + Duration::days(7 + i)).date_naive();
            let start = Utc
                .from_utc_datetime(&start.and_hms_opt(9 + (i % 3) as u32, 0, 0).unwrap());
            TimeSlot {
                slot_id: Uuid::new_v4(),
                provider_id,
                office_id,
                start_at: start,
                end_at: start + Duration::minutes(30),
            }
        })
        .collect();

    let plan = TreatmentPlan {
        id: Uuid::new_v4(),
        patient_id,
        title: "Crown replacement, tooth 14".into(),
        status: PlanStatus::Proposed,
        procedures: vec![PlannedProcedure {
            description: "Porcelain crown".into(),
            estimate: Money::usd(1250.0),
            linked_appointment_id: None,
        }],
        proposed_on: (now - Duration::days(10)).date_naive(),
    };

    portal.clinical.seed(vec![past_visit], slots, vec![plan]);

    /* ---- billing ---- */

    let open_invoice = Invoice {
        id: Uuid::new_v4(),
        patient_id,
        issued_on: (now - Duration::days(30)).date_naive(),
        line_items: vec![
            LineItem {
                description: "Periodic oral evaluation".into(),
                charge: Money::usd(95.0),
            },
            LineItem {
                description: "Bitewing X-rays (four films)".into(),
                charge: Money::usd(85.0),
            },
        ],
        total_charges: Money::usd(180.0),
        insurance_paid: Money::usd(80.0),
        patient_responsibility: Money::usd(100.0),
        payments_made: Money::usd(0.0),
        amount_due: Money::usd(100.0),
        status: InvoiceStatus::Open,
    };

    let settled_invoice = Invoice {
        id: Uuid::new_v4(),
        patient_id,
        issued_on: (now - Duration::days(120)).date_naive(),
        line_items: vec![LineItem {
            description: "Prophylaxis, adult".into(),
            charge: Money::usd(120.0),
        }],
        total_charges: Money::usd(120.0),
        insurance_paid: Money::usd(96.0),
        patient_responsibility: Money::usd(24.0),
        payments_made: Money::usd(24.0),
        amount_due: Money::usd(0.0),
        status: InvoiceStatus::PaidInFull,
    };

    let default_method = PaymentMethod {
        id: Uuid::new_v4(),
        patient_id,
        is_default: true,
        kind: PaymentMethodKind::Card {
            brand: "Visa".into(),
            last_four: "4242".into(),
            expires: "12/27".into(),
        },
    };

    let policy = InsurancePolicy {
        id: Uuid::new_v4(),
        patient_id,
        carrier: "Delta Dental".into(),
        plan_name: "PPO Plus".into(),
        subscriber_name: "Jordan Avery".into(),
        member_id: "DD-2049117".into(),
        group_number: "88812".into(),
        status: PolicyStatus::Active,
    };

    let open_invoice_id = open_invoice.id;
    let default_method_id = default_method.id;
    portal
        .billing
        .seed(vec![open_invoice, settled_invoice], vec![default_method], vec![policy]);

    /* ---- records ---- */

    let hipaa_form = FormDefinition {
        id: Uuid::new_v4(),
        name: "HIPAA Consent".into(),
        category: "Consent Form".into(),
        required: true,
        recurs_annually: true,
    };
    let insurance_form = FormDefinition {
        id: Uuid::new_v4(),
        name: "Insurance Card".into(),
        category: "Insurance Card".into(),
        required: true,
        recurs_annually: false,
    };

    let insurance_card_doc = Document {
        id: Uuid::new_v4(),
        patient_id,
        file_name: "insurance-card-front.png".into(),
        url: "https://storage.portal.local/documents/seed-insurance-card-front.png".into(),
        content_type: "image/png".into(),
        size_bytes: 482_113,
        storage_key: "documents/seed-insurance-card-front.png".into(),
        category: "Insurance Card".into(),
        link: Some(LinkContext {
            kind: "form".into(),
            id: insurance_form.id,
        }),
        tags: vec!["patient-upload".into(), "insurance card".into()],
        status: DocumentStatus::Active,
        verification: Some(Verification {
            state: VerificationState::Verified,
            verified_at: Some(now - Duration::days(30)),
        }),
        created_at: now - Duration::days(31),
    };

    let profile = PatientProfile {
        patient_id,
        first_name: "Jordan".into(),
        last_name: "Avery".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1988, 9, 23).unwrap(),
        email: "jordan.avery@example.com".into(),
        phone: "555-0136".into(),
        preferred_contact: "email".into(),
        address: "487 Birch Lane, Springfield".into(),
    };

    let history = vec![
        HistoryItem::Allergy {
            substance: "Penicillin".into(),
            reaction: "Hives".into(),
            severity: "Moderate".into(),
        },
        HistoryItem::Medication {
            name: "Lisinopril".into(),
            dosage: "10mg daily".into(),
            prescriber: "Dr. Okafor".into(),
        },
        HistoryItem::Surgery {
            procedure: "Wisdom tooth extraction".into(),
            performed_on: NaiveDate::from_ymd_opt(2015, 6, 2).unwrap(),
        },
    ];

    let hipaa_form_id = hipaa_form.id;
    portal.records.seed(
        vec![insurance_card_doc],
        vec![hipaa_form, insurance_form],
        history,
        profile,
    );

    /* ---- engagement ---- */

    let thread_id = Uuid::new_v4();
    let opened_at = now - Duration::days(3);
    let thread = MessageThread {
        id: thread_id,
        patient_id,
        subject: "Question about my last visit".into(),
        category: "clinical".into(),
        status: ThreadStatus::PendingPatient,
        patient_has_read: false,
        staff_has_read: true,
        last_message: "Dr. Okafor recommends a follow-up in two weeks...".into(),
        updated_at: opened_at + Duration::hours(5),
    };
    let posts = vec![
        MessagePost {
            id: Uuid::new_v4(),
            thread_id,
            author: PostAuthor::Patient,
            body: "My jaw has been sore since Tuesday's appointment. Is that expected?".into(),
            attachment_ids: vec![],
            created_at: opened_at,
        },
        MessagePost {
            id: Uuid::new_v4(),
            thread_id,
            author: PostAuthor::Staff,
            body: "Dr. Okafor recommends a follow-up in two weeks if the soreness persists.".into(),
            attachment_ids: vec![],
            created_at: opened_at + Duration::hours(5),
        },
    ];
    portal.engagement.seed(vec![thread], posts);

    SeedIds {
        patient_id,
        provider_id,
        office_id,
        open_invoice_id,
        default_method_id,
        hipaa_form_id,
    }
}

pub fn first_available_slot(portal: &Portal) -> Option<TimeSlot> {
    let mut slots = portal.clinical.available_slots();
    slots.sort_by_key(|s| s.start_at);
    slots.into_iter().next()
}
