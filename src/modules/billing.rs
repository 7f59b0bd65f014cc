// src/modules/billing.rs

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::PortalError,
    executor::CommandExecutor,
    models::{
        InsurancePolicy, Invoice, InvoiceStatus, NewPaymentMethod, NewPolicy, Payment,
        PaymentAllocation, PaymentMethod, PaymentStatus, PolicyStatus, Refund, RefundStatus,
    },
    money::{format_currency, Money, MONEY_EPSILON},
    notify::{notify_best_effort, Notify},
};

/// Overpayments within one cent of the due amount are clamped to it; anything
/// beyond that is rejected.
const OVERPAY_TOLERANCE: f64 = 0.01;

/// Invoices, payments, refunds, payment methods, and insurance policies.
/// Holds the cross-module notifier so committed payments and refunds can post
/// a confirmation thread in Engagement.
#[derive(Clone)]
pub struct BillingModule {
    state: Arc<Mutex<BillingState>>,
    executor: CommandExecutor,
    notifier: Arc<dyn Notify>,
}

#[derive(Default)]
struct BillingState {
    invoices: Vec<Invoice>,
    payments: Vec<Payment>,
    refunds: Vec<Refund>,
    methods: Vec<PaymentMethod>,
    policies: Vec<InsurancePolicy>,
}

impl BillingModule {
    pub fn new(latency: std::time::Duration, notifier: Arc<dyn Notify>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BillingState::default())),
            executor: CommandExecutor::new(latency),
            notifier,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BillingState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /* ============================================================
       Snapshots / module flags
       ============================================================ */

    pub fn invoices(&self) -> Vec<Invoice> {
        self.lock().invoices.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.lock().payments.clone()
    }

    pub fn refunds(&self) -> Vec<Refund> {
        self.lock().refunds.clone()
    }

    pub fn payment_methods(&self) -> Vec<PaymentMethod> {
        self.lock().methods.clone()
    }

    pub fn policies(&self) -> Vec<InsurancePolicy> {
        self.lock().policies.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.executor.is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.executor.last_error()
    }

    pub fn seed(&self, invoices: Vec<Invoice>, methods: Vec<PaymentMethod>, policies: Vec<InsurancePolicy>) {
        let mut state = self.lock();
        state.invoices = invoices;
        state.methods = methods;
        state.policies = policies;
    }

    /* ============================================================
       make_payment
       ============================================================ */

    pub async fn make_payment(
        &self,
        invoice_id: Uuid,
        amount: f64,
        method_id: Uuid,
        currency: &str,
    ) -> Result<Payment, PortalError> {
        let state = Arc::clone(&self.state);
        let currency = currency.to_string();
        let payment = self
            .executor
            .run(move || {
                if amount <= 0.0 {
                    return Err(PortalError::validation("Payment amount must be positive"));
                }

                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                if !state.methods.iter().any(|m| m.id == method_id) {
                    return Err(PortalError::not_found("payment method"));
                }

                let invoice = state
                    .invoices
                    .iter_mut()
                    .find(|i| i.id == invoice_id && i.amount_due.amount > MONEY_EPSILON)
                    .ok_or_else(PortalError::invoice_not_payable)?;

                let due = invoice.amount_due.amount;
                if amount > due + OVERPAY_TOLERANCE {
                    return Err(PortalError::payment_exceeds_due());
                }
                // Within tolerance an overpayment settles for exactly the due
                // amount; the extra cent is never collected.
                let applied = amount.min(due);

                invoice.payments_made = invoice.payments_made.plus(applied);
                invoice.amount_due = invoice
                    .patient_responsibility
                    .minus(invoice.payments_made.amount);
                invoice.status = if invoice.amount_due.is_settled() {
                    InvoiceStatus::PaidInFull
                } else {
                    InvoiceStatus::PartiallyPaid
                };

                let payment = Payment {
                    id: Uuid::new_v4(),
                    patient_id: invoice.patient_id,
                    amount: Money::new(applied, &currency),
                    method_id,
                    allocations: vec![PaymentAllocation {
                        invoice_id,
                        amount_applied: Money::new(applied, &currency),
                    }],
                    unapplied_amount: Money::zero(&currency),
                    status: PaymentStatus::Completed,
                    created_at: Utc::now(),
                };
                state.payments.push(payment.clone());
                Ok(payment)
            })
            .await?;

        // Committed; notification failure must not undo it.
        notify_best_effort(
            &self.notifier,
            payment.patient_id,
            "Payment received",
            "billing",
            &format!(
                "We received your payment of {}. Thank you!",
                format_currency(&payment.amount)
            ),
        )
        .await;

        Ok(payment)
    }

    /* ============================================================
       apply_unapplied_payment
       ============================================================ */

    pub async fn apply_unapplied_payment(
        &self,
        payment_id: Uuid,
        invoice_id: Uuid,
        amount: f64,
    ) -> Result<Payment, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                if amount <= 0.0 {
                    return Err(PortalError::validation("Applied amount must be positive"));
                }

                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());

                let unapplied = state
                    .payments
                    .iter()
                    .find(|p| p.id == payment_id)
                    .map(|p| p.unapplied_amount.amount)
                    .ok_or_else(|| PortalError::not_found("payment"))?;
                if amount > unapplied + MONEY_EPSILON {
                    return Err(PortalError::validation(
                        "Applied amount exceeds unapplied balance",
                    ));
                }

                let invoice = state
                    .invoices
                    .iter_mut()
                    .find(|i| i.id == invoice_id && i.amount_due.amount > MONEY_EPSILON)
                    .ok_or_else(PortalError::invoice_not_payable)?;

                let due = invoice.amount_due.amount;
                if amount > due + OVERPAY_TOLERANCE {
                    return Err(PortalError::payment_exceeds_due());
                }
                let applied = amount.min(due);

                invoice.payments_made = invoice.payments_made.plus(applied);
                invoice.amount_due = invoice
                    .patient_responsibility
                    .minus(invoice.payments_made.amount);
                invoice.status = if invoice.amount_due.is_settled() {
                    InvoiceStatus::PaidInFull
                } else {
                    InvoiceStatus::PartiallyPaid
                };

                let payment = state
                    .payments
                    .iter_mut()
                    .find(|p| p.id == payment_id)
                    .ok_or_else(|| PortalError::not_found("payment"))?;
                let currency = payment.unapplied_amount.currency.clone();
                payment.unapplied_amount = payment.unapplied_amount.minus(applied);
                payment.allocations.push(PaymentAllocation {
                    invoice_id,
                    amount_applied: Money::new(applied, &currency),
                });
                Ok(payment.clone())
            })
            .await
    }

    /* ============================================================
       request_refund
       ============================================================ */

    pub async fn request_refund(
        &self,
        payment_id: Uuid,
        reason: &str,
    ) -> Result<Refund, PortalError> {
        let state = Arc::clone(&self.state);
        let reason = reason.to_string();
        let (refund, patient_id) = self
            .executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let payment = state
                    .payments
                    .iter_mut()
                    .find(|p| p.id == payment_id)
                    .ok_or_else(|| PortalError::not_found("payment"))?;

                let patient_id = payment.patient_id;
                let refundable = payment.unapplied_amount.amount;
                if refundable <= MONEY_EPSILON {
                    return Err(PortalError::no_unapplied_balance());
                }

                // The refunded balance leaves the payment entirely, keeping
                // unapplied + allocations == amount.
                payment.unapplied_amount = Money::zero(&payment.unapplied_amount.currency);
                payment.amount = payment.amount.minus(refundable);
                if payment.amount.is_settled() {
                    payment.status = PaymentStatus::Refunded;
                }

                let refund = Refund {
                    id: Uuid::new_v4(),
                    payment_id,
                    amount: Money::new(refundable, &payment.amount.currency),
                    reason,
                    status: RefundStatus::Requested,
                    requested_at: Utc::now(),
                };
                state.refunds.push(refund.clone());
                Ok((refund, patient_id))
            })
            .await?;

        notify_best_effort(
            &self.notifier,
            patient_id,
            "Refund requested",
            "billing",
            &format!(
                "Your refund request for {} has been submitted.",
                format_currency(&refund.amount)
            ),
        )
        .await;

        Ok(refund)
    }

    /* ============================================================
       Payment methods
       ============================================================ */

    pub async fn add_payment_method(
        &self,
        req: NewPaymentMethod,
    ) -> Result<PaymentMethod, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let has_existing = state.methods.iter().any(|m| m.patient_id == req.patient_id);

                // First method is always the default; an explicit new default
                // displaces the old one.
                let is_default = !has_existing || req.is_default;
                if is_default {
                    for m in state.methods.iter_mut().filter(|m| m.patient_id == req.patient_id) {
                        m.is_default = false;
                    }
                }

                let method = PaymentMethod {
                    id: Uuid::new_v4(),
                    patient_id: req.patient_id,
                    is_default,
                    kind: req.kind,
                };
                state.methods.push(method.clone());
                Ok(method)
            })
            .await
    }

    pub async fn set_default_payment_method(&self, id: Uuid) -> Result<PaymentMethod, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let patient_id = state
                    .methods
                    .iter()
                    .find(|m| m.id == id)
                    .map(|m| m.patient_id)
                    .ok_or_else(|| PortalError::not_found("payment method"))?;

                for m in state.methods.iter_mut().filter(|m| m.patient_id == patient_id) {
                    m.is_default = m.id == id;
                }
                let method = state
                    .methods
                    .iter()
                    .find(|m| m.id == id)
                    .cloned()
                    .ok_or_else(|| PortalError::not_found("payment method"))?;
                Ok(method)
            })
            .await
    }

    /// The one physical delete in the system. Removing the default promotes
    /// the patient's first surviving method.
    pub async fn remove_payment_method(&self, id: Uuid) -> Result<(), PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let position = state
                    .methods
                    .iter()
                    .position(|m| m.id == id)
                    .ok_or_else(|| PortalError::not_found("payment method"))?;

                let removed = state.methods.remove(position);
                if removed.is_default {
                    if let Some(next) = state
                        .methods
                        .iter_mut()
                        .find(|m| m.patient_id == removed.patient_id)
                    {
                        next.is_default = true;
                    }
                }
                Ok(())
            })
            .await
    }

    /* ============================================================
       Insurance policies
       ============================================================ */

    pub async fn add_policy(&self, req: NewPolicy) -> Result<InsurancePolicy, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                if req.carrier.trim().is_empty() || req.member_id.trim().is_empty() {
                    return Err(PortalError::validation("carrier and member id are required"));
                }

                let policy = InsurancePolicy {
                    id: Uuid::new_v4(),
                    patient_id: req.patient_id,
                    carrier: req.carrier,
                    plan_name: req.plan_name,
                    subscriber_name: req.subscriber_name,
                    member_id: req.member_id,
                    group_number: req.group_number,
                    status: PolicyStatus::Active,
                };
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                state.policies.push(policy.clone());
                Ok(policy)
            })
            .await
    }

    pub async fn deactivate_policy(&self, id: Uuid) -> Result<InsurancePolicy, PortalError> {
        let state = Arc::clone(&self.state);
        self.executor
            .run(move || {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                let policy = state
                    .policies
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or_else(|| PortalError::not_found("policy"))?;
                policy.status = PolicyStatus::Inactive;
                Ok(policy.clone())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentMethodKind;
    use crate::notify::NullNotifier;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn module() -> BillingModule {
        BillingModule::new(Duration::ZERO, Arc::new(NullNotifier))
    }

    fn invoice(patient_id: Uuid, responsibility: f64) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            patient_id,
            issued_on: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            line_items: vec![],
            total_charges: Money::usd(responsibility + 80.0),
            insurance_paid: Money::usd(80.0),
            patient_responsibility: Money::usd(responsibility),
            payments_made: Money::usd(0.0),
            amount_due: Money::usd(responsibility),
            status: InvoiceStatus::Open,
        }
    }

    fn card(patient_id: Uuid) -> PaymentMethod {
        PaymentMethod {
            id: Uuid::new_v4(),
            patient_id,
            is_default: true,
            kind: PaymentMethodKind::Card {
                brand: "Visa".into(),
                last_four: "4242".into(),
                expires: "12/27".into(),
            },
        }
    }

    fn seeded(responsibility: f64) -> (BillingModule, Uuid, Uuid) {
        let patient_id = Uuid::new_v4();
        let inv = invoice(patient_id, responsibility);
        let method = card(patient_id);
        let (invoice_id, method_id) = (inv.id, method.id);
        let billing = module();
        billing.seed(vec![inv], vec![method], vec![]);
        (billing, invoice_id, method_id)
    }

    fn assert_conserved(p: &Payment) {
        let allocated: f64 = p.allocations.iter().map(|a| a.amount_applied.amount).sum();
        let diff = (p.unapplied_amount.amount + allocated - p.amount.amount).abs();
        assert!(diff <= MONEY_EPSILON, "conservation violated by {diff}");
    }

    #[tokio::test]
    async fn test_full_payment_flips_to_paid_in_full() {
        let (billing, invoice_id, method_id) = seeded(100.0);
        let payment = billing.make_payment(invoice_id, 100.0, method_id, "USD").await.unwrap();

        assert_eq!(payment.amount.amount, 100.0);
        assert_conserved(&payment);

        let inv = &billing.invoices()[0];
        assert_eq!(inv.status, InvoiceStatus::PaidInFull);
        assert!(inv.amount_due.amount <= MONEY_EPSILON);
    }

    #[tokio::test]
    async fn test_partial_payment_flips_to_partially_paid() {
        let (billing, invoice_id, method_id) = seeded(100.0);
        billing.make_payment(invoice_id, 40.0, method_id, "USD").await.unwrap();

        let inv = &billing.invoices()[0];
        assert_eq!(inv.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(inv.amount_due.amount, 60.0);
    }

    #[tokio::test]
    async fn test_overpayment_within_a_cent_clamps() {
        let (billing, invoice_id, method_id) = seeded(100.0);
        let payment = billing
            .make_payment(invoice_id, 100.005, method_id, "USD")
            .await
            .unwrap();

        assert_eq!(payment.amount.amount, 100.0); // clamped, not 100.005
        assert_eq!(billing.invoices()[0].status, InvoiceStatus::PaidInFull);
    }

    #[tokio::test]
    async fn test_overpayment_beyond_a_cent_rejects() {
        let (billing, invoice_id, method_id) = seeded(100.0);
        let err = billing
            .make_payment(invoice_id, 101.0, method_id, "USD")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PAYMENT_EXCEEDS_DUE");
        assert_eq!(billing.last_error().as_deref(), Some("Payment exceeds amount due"));
        assert!(billing.payments().is_empty());
        assert_eq!(billing.invoices()[0].status, InvoiceStatus::Open);
    }

    #[tokio::test]
    async fn test_settled_invoice_rejects_further_payments() {
        let (billing, invoice_id, method_id) = seeded(50.0);
        billing.make_payment(invoice_id, 50.0, method_id, "USD").await.unwrap();

        let err = billing
            .make_payment(invoice_id, 10.0, method_id, "USD")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVOICE_NOT_PAYABLE");
    }

    #[tokio::test]
    async fn test_unknown_method_rejects() {
        let (billing, invoice_id, _) = seeded(50.0);
        let err = billing
            .make_payment(invoice_id, 10.0, Uuid::new_v4(), "USD")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_apply_unapplied_preserves_conservation() {
        let (billing, invoice_id, _method_id) = seeded(60.0);
        let patient_id = billing.invoices()[0].patient_id;

        // Credit sitting on the account from a prior overpayment.
        let payment_id = Uuid::new_v4();
        {
            let mut state = billing.lock();
            state.payments.push(Payment {
                id: payment_id,
                patient_id,
                amount: Money::usd(25.0),
                method_id: Uuid::new_v4(),
                allocations: vec![],
                unapplied_amount: Money::usd(25.0),
                status: PaymentStatus::Completed,
                created_at: Utc::now(),
            });
        }

        let payment = billing
            .apply_unapplied_payment(payment_id, invoice_id, 25.0)
            .await
            .unwrap();
        assert_conserved(&payment);
        assert_eq!(payment.unapplied_amount.amount, 0.0);

        let inv = &billing.invoices()[0];
        assert_eq!(inv.amount_due.amount, 35.0);
        assert_eq!(inv.status, InvoiceStatus::PartiallyPaid);
    }

    #[tokio::test]
    async fn test_refund_zeroes_unapplied_and_records_amount() {
        let billing = module();
        let payment_id = Uuid::new_v4();
        {
            let mut state = billing.lock();
            state.payments.push(Payment {
                id: payment_id,
                patient_id: Uuid::new_v4(),
                amount: Money::usd(25.0),
                method_id: Uuid::new_v4(),
                allocations: vec![],
                unapplied_amount: Money::usd(25.0),
                status: PaymentStatus::Completed,
                created_at: Utc::now(),
            });
        }

        let refund = billing.request_refund(payment_id, "overpaid").await.unwrap();
        assert_eq!(refund.amount.amount, 25.0);
        assert_eq!(billing.refunds().len(), 1);

        let payment = &billing.payments()[0];
        assert_eq!(payment.unapplied_amount.amount, 0.0);
        assert_eq!(payment.status, PaymentStatus::Refunded);
        assert_conserved(payment);

        // Nothing left to refund.
        let err = billing.request_refund(payment_id, "again").await.unwrap_err();
        assert_eq!(err.code(), "NO_UNAPPLIED_BALANCE");
        assert_eq!(billing.refunds().len(), 1);
    }

    #[tokio::test]
    async fn test_refund_of_fully_allocated_payment_rejects() {
        let (billing, invoice_id, method_id) = seeded(100.0);
        let payment = billing.make_payment(invoice_id, 100.0, method_id, "USD").await.unwrap();

        let err = billing.request_refund(payment.id, "changed my mind").await.unwrap_err();
        assert_eq!(err.code(), "NO_UNAPPLIED_BALANCE");
    }

    #[tokio::test]
    async fn test_first_method_forced_default() {
        let billing = module();
        let patient_id = Uuid::new_v4();
        let method = billing
            .add_payment_method(NewPaymentMethod {
                patient_id,
                is_default: false, // ignored for the first method
                kind: PaymentMethodKind::Bank {
                    bank_name: "First National".into(),
                    last_four: "9921".into(),
                },
            })
            .await
            .unwrap();
        assert!(method.is_default);
    }

    #[tokio::test]
    async fn test_single_default_invariant_over_sequences() {
        let billing = module();
        let patient_id = Uuid::new_v4();

        let assert_single_default = |billing: &BillingModule| {
            let defaults = billing
                .payment_methods()
                .iter()
                .filter(|m| m.patient_id == patient_id && m.is_default)
                .count();
            assert!(defaults <= 1, "{defaults} defaults");
        };

        let first = billing
            .add_payment_method(NewPaymentMethod {
                patient_id,
                is_default: false,
                kind: PaymentMethodKind::Online {
                    provider: "PayPal".into(),
                    account_email: "pat@example.com".into(),
                },
            })
            .await
            .unwrap();
        assert_single_default(&billing);

        let second = billing
            .add_payment_method(NewPaymentMethod {
                patient_id,
                is_default: true, // displaces the first
                kind: PaymentMethodKind::Card {
                    brand: "Amex".into(),
                    last_four: "0005".into(),
                    expires: "03/28".into(),
                },
            })
            .await
            .unwrap();
        assert_single_default(&billing);
        assert!(second.is_default);
        assert!(!billing.payment_methods().iter().find(|m| m.id == first.id).unwrap().is_default);

        billing.set_default_payment_method(first.id).await.unwrap();
        assert_single_default(&billing);
        assert!(billing.payment_methods().iter().find(|m| m.id == first.id).unwrap().is_default);

        // Removing the default promotes the survivor.
        billing.remove_payment_method(first.id).await.unwrap();
        assert_single_default(&billing);
        assert!(billing.payment_methods().iter().find(|m| m.id == second.id).unwrap().is_default);
    }

    #[tokio::test]
    async fn test_policy_lifecycle() {
        let billing = module();
        let policy = billing
            .add_policy(NewPolicy {
                patient_id: Uuid::new_v4(),
                carrier: "Delta Dental".into(),
                plan_name: "PPO Plus".into(),
                subscriber_name: "Pat Doe".into(),
                member_id: "DD-10492".into(),
                group_number: "88812".into(),
            })
            .await
            .unwrap();
        assert_eq!(policy.status, PolicyStatus::Active);

        let deactivated = billing.deactivate_policy(policy.id).await.unwrap();
        assert_eq!(deactivated.status, PolicyStatus::Inactive);
        assert_eq!(billing.policies().len(), 1); // soft delete only

        assert!(billing.deactivate_policy(Uuid::new_v4()).await.is_err());
    }

    /* ============================================================
       Notifier isolation
       ============================================================ */

    struct FailingNotifier;

    #[async_trait]
    impl Notify for FailingNotifier {
        async fn notify(
            &self,
            _patient_id: Uuid,
            _subject: &str,
            _category: &str,
            _body: &str,
        ) -> Result<crate::models::MessageThread, PortalError> {
            Err(PortalError::Internal("messaging unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_payment_commits_when_notification_fails() {
        let patient_id = Uuid::new_v4();
        let inv = invoice(patient_id, 100.0);
        let method = card(patient_id);
        let (invoice_id, method_id) = (inv.id, method.id);

        let billing = BillingModule::new(Duration::ZERO, Arc::new(FailingNotifier));
        billing.seed(vec![inv], vec![method], vec![]);

        // The notifier blows up, the payment still settles.
        let payment = billing.make_payment(invoice_id, 100.0, method_id, "USD").await.unwrap();
        assert_eq!(payment.amount.amount, 100.0);
        assert_eq!(billing.invoices()[0].status, InvoiceStatus::PaidInFull);
        // And the module error slot stays clean: the command succeeded.
        assert!(billing.last_error().is_none());
    }
}
