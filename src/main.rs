use portal_sim::{config::Config, mock_data, models, modules, money, views};

use chrono::Utc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    tracing::info!(
        "Simulated latency: clinical={:?} billing={:?} engagement={:?} records={:?}",
        cfg.clinical_latency,
        cfg.billing_latency,
        cfg.engagement_latency,
        cfg.records_latency
    );

    let portal = modules::build(&cfg);
    let ids = mock_data::seed_portal(&portal);

    // Dashboard views from the seeded state.
    let buckets = views::bucket_appointments(&portal.clinical.appointments(), Utc::now());
    tracing::info!(
        "Appointments: {} upcoming, {} past; {} unread message thread(s)",
        buckets.upcoming.len(),
        buckets.past.len(),
        views::unread_thread_count(&portal.engagement.threads())
    );

    // Book the soonest open slot.
    let slot = mock_data::first_available_slot(&portal)
        .ok_or_else(|| anyhow::anyhow!("no open slots in seed data"))?;
    let appointment = portal
        .clinical
        .book_appointment(models::NewAppointment {
            patient_id: ids.patient_id,
            provider_id: slot.provider_id,
            office_id: slot.office_id,
            start_at: slot.start_at,
            end_at: slot.end_at,
            appointment_type: "Checkup".into(),
            reason: "Follow-up on jaw soreness".into(),
        })
        .await?;
    tracing::info!(
        "Booked {} on {} (confirmation {})",
        appointment.appointment_type,
        appointment.start_at.format("%Y-%m-%d %H:%M"),
        appointment.confirmation_code
    );

    // Pay the outstanding invoice with the default card.
    let outstanding = views::outstanding_invoices(&portal.billing.invoices());
    tracing::info!("{} outstanding invoice(s)", outstanding.len());
    let payment = portal
        .billing
        .make_payment(
            ids.open_invoice_id,
            outstanding[0].amount_due.amount,
            ids.default_method_id,
            &cfg.default_currency,
        )
        .await?;
    tracing::info!("Paid {}", money::format_currency(&payment.amount));

    // The payment confirmation arrived as a system message.
    tracing::info!(
        "{} unread message thread(s) after payment",
        views::unread_thread_count(&portal.engagement.threads())
    );

    // A rejected command leaves its message on the module for the UI.
    if portal
        .billing
        .make_payment(ids.open_invoice_id, 10.0, ids.default_method_id, &cfg.default_currency)
        .await
        .is_err()
    {
        tracing::info!(
            "Second payment refused: {}",
            portal.billing.last_error().unwrap_or_default()
        );
    }

    // Upload this year's HIPAA consent and recheck form tracking.
    portal
        .records
        .upload_document(
            models::DocumentUpload {
                patient_id: ids.patient_id,
                file_name: "hipaa-consent-2026.pdf".into(),
                content_type: "application/pdf".into(),
                size_bytes: 68_431,
            },
            "Consent Form",
            Some(models::LinkContext {
                kind: "form".into(),
                id: ids.hipaa_form_id,
            }),
        )
        .await?;
    for form in views::form_statuses(&portal.records.forms(), &portal.records.documents(), Utc::now()) {
        tracing::info!("Form {:<16} -> {:?}", form.form_name, form.status);
    }

    // Final snapshot of the billing collections.
    tracing::info!(
        "Billing snapshot:\n{}",
        serde_json::to_string_pretty(&portal.billing.invoices())?
    );

    Ok(())
}
