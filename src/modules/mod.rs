use std::sync::Arc;

use crate::config::Config;
use crate::notify::Notify;
use crate::storage::FileStorage;

pub mod billing;
pub mod clinical;
pub mod engagement;
pub mod records;

pub use billing::BillingModule;
pub use clinical::ClinicalModule;
pub use engagement::EngagementModule;
pub use records::RecordsModule;

/// The four domain modules, constructed once at process start and passed to
/// callers by injection. Billing is handed Engagement as its notifier so a
/// committed payment can post a system message.
#[derive(Clone)]
pub struct Portal {
    pub clinical: ClinicalModule,
    pub billing: BillingModule,
    pub engagement: EngagementModule,
    pub records: RecordsModule,
}

pub fn build(cfg: &Config) -> Portal {
    let engagement = EngagementModule::new(cfg.engagement_latency);
    let notifier: Arc<dyn Notify> = Arc::new(engagement.clone());

    Portal {
        clinical: ClinicalModule::new(cfg.clinical_latency),
        billing: BillingModule::new(cfg.billing_latency, notifier),
        engagement,
        records: RecordsModule::new(cfg.records_latency, FileStorage::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Invoice, InvoiceStatus, PaymentMethod, PaymentMethodKind, PostAuthor};
    use crate::money::Money;
    use chrono::NaiveDate;
    use uuid::Uuid;

    /// End to end across the module boundary: a billing payment lands a
    /// system thread in engagement.
    #[tokio::test]
    async fn test_payment_posts_confirmation_thread() {
        let portal = build(&Config::instant());
        let patient_id = Uuid::new_v4();

        let invoice = Invoice {
            id: Uuid::new_v4(),
            patient_id,
            issued_on: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            line_items: vec![],
            total_charges: Money::usd(100.0),
            insurance_paid: Money::usd(0.0),
            patient_responsibility: Money::usd(100.0),
            payments_made: Money::usd(0.0),
            amount_due: Money::usd(100.0),
            status: InvoiceStatus::Open,
        };
        let method = PaymentMethod {
            id: Uuid::new_v4(),
            patient_id,
            is_default: true,
            kind: PaymentMethodKind::Card {
                brand: "Visa".into(),
                last_four: "4242".into(),
                expires: "12/27".into(),
            },
        };
        let (invoice_id, method_id) = (invoice.id, method.id);
        portal.billing.seed(vec![invoice], vec![method], vec![]);

        portal.billing.make_payment(invoice_id, 100.0, method_id, "USD").await.unwrap();

        let threads = portal.engagement.threads();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].subject, "Payment received");
        assert!(!threads[0].patient_has_read);

        let posts = portal.engagement.posts_for(threads[0].id);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].author, PostAuthor::System);
        assert!(posts[0].body.contains("$100.00 USD"));
    }
}
