//! Donation Records
//!
//! A donation is created `pending` when the donor starts checkout and is
//! settled by webhook events afterwards. Monthly gifts additionally collect
//! one [`RecurringPayment`] per paid invoice.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result};
use crate::money::is_whole_cents;
use crate::status::RecordStatus;
use crate::store::Record;

/// Contact details collected on the donation form
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl DonorInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// One settled invoice of a monthly donation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringPayment {
    pub invoice_id: String,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

/// Input for a new donation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDonation {
    pub amount: Decimal,
    #[serde(default)]
    pub is_monthly: bool,
    pub donor_info: DonorInfo,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Persisted donation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: String,
    pub amount: Decimal,
    pub is_monthly: bool,
    pub donor_info: DonorInfo,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub stripe_session_id: Option<String>,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,
    #[serde(default)]
    pub recurring_payments: Vec<RecurringPayment>,
    #[serde(default)]
    pub subscription_cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    /// Validate the input and build a pending donation
    pub fn new(input: NewDonation) -> Result<Self> {
        if input.amount <= Decimal::ZERO {
            return Err(RecordError::Validation("amount must be positive".into()));
        }
        if !is_whole_cents(input.amount) {
            return Err(RecordError::Validation("amount has fractional cents".into()));
        }
        if input.donor_info.email.trim().is_empty() || !input.donor_info.email.contains('@') {
            return Err(RecordError::Validation("a valid donor email is required".into()));
        }

        let now = Utc::now();
        Ok(Self {
            id: format!("don_{}", uuid::Uuid::new_v4().simple()),
            amount: input.amount.normalize(),
            is_monthly: input.is_monthly,
            donor_info: input.donor_info,
            message: input.message.filter(|m| !m.trim().is_empty()),
            is_public: input.is_public,
            status: RecordStatus::Pending,
            stripe_session_id: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            recurring_payments: Vec::new(),
            subscription_cancelled_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Mark the checkout as paid. Returns `false` if already completed.
    pub fn complete(
        &mut self,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    ) -> Result<bool> {
        let changed = self.status.transition(RecordStatus::Completed)?;
        if customer_id.is_some() {
            self.stripe_customer_id = customer_id;
        }
        if subscription_id.is_some() {
            self.stripe_subscription_id = subscription_id;
        }
        self.status = RecordStatus::Completed;
        Ok(changed)
    }

    /// Cancel a donation that never completed. Returns `false` if already cancelled.
    pub fn cancel(&mut self) -> Result<bool> {
        let changed = self.status.transition(RecordStatus::Cancelled)?;
        self.status = RecordStatus::Cancelled;
        Ok(changed)
    }

    /// Append a paid invoice. Replayed invoices are ignored and return `false`.
    pub fn record_recurring_payment(&mut self, payment: RecurringPayment) -> bool {
        if self
            .recurring_payments
            .iter()
            .any(|p| p.invoice_id == payment.invoice_id)
        {
            return false;
        }
        self.recurring_payments.push(payment);
        true
    }

    /// The subscription behind a monthly gift was deleted.
    ///
    /// A pending donation is cancelled; a completed one keeps its status and
    /// records when the pledge stopped. Returns `false` if that already happened.
    pub fn end_subscription(&mut self, at: DateTime<Utc>) -> Result<bool> {
        match self.status {
            RecordStatus::Pending => self.cancel(),
            RecordStatus::Completed if self.subscription_cancelled_at.is_none() => {
                self.subscription_cancelled_at = Some(at);
                Ok(true)
            }
            RecordStatus::Completed | RecordStatus::Cancelled => Ok(false),
        }
    }

    /// Monthly gift whose subscription is still running
    pub fn is_active_monthly(&self) -> bool {
        self.is_monthly
            && self.status == RecordStatus::Completed
            && self.subscription_cancelled_at.is_none()
    }

    /// Everything this donation has brought in so far.
    ///
    /// For monthly gifts the invoices are the source of truth; the initial
    /// charge is one of them.
    pub fn amount_received(&self) -> Decimal {
        if self.status != RecordStatus::Completed {
            return Decimal::ZERO;
        }
        if self.is_monthly && !self.recurring_payments.is_empty() {
            self.recurring_payments.iter().map(|p| p.amount).sum()
        } else {
            self.amount
        }
    }
}

impl Record for Donation {
    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Admin edit of a donation.
///
/// Status is not editable here; only Stripe events move it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DonationUpdate {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

impl DonationUpdate {
    pub fn apply(self, donation: &mut Donation) -> Result<()> {
        if let Some(message) = self.message {
            donation.message = Some(message).filter(|m| !m.trim().is_empty());
        }
        if let Some(is_public) = self.is_public {
            donation.is_public = is_public;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input(amount: Decimal, monthly: bool) -> NewDonation {
        NewDonation {
            amount,
            is_monthly: monthly,
            donor_info: DonorInfo {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.org".into(),
                ..Default::default()
            },
            message: Some("  ".into()),
            is_public: true,
        }
    }

    #[test]
    fn test_new_donation_is_pending() {
        let donation = Donation::new(input(dec!(25), false)).unwrap();
        assert_eq!(donation.status, RecordStatus::Pending);
        assert!(donation.id.starts_with("don_"));
        assert_eq!(donation.message, None);
        assert_eq!(donation.donor_info.full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        assert!(Donation::new(input(dec!(0), false)).is_err());
        assert!(Donation::new(input(dec!(-5), false)).is_err());
    }

    #[test]
    fn test_rejects_fractional_cents() {
        assert!(matches!(
            Donation::new(input(dec!(0.004), false)),
            Err(RecordError::Validation(_))
        ));
        assert!(Donation::new(input(dec!(10.005), false)).is_err());

        let donation = Donation::new(input(dec!(12.500), false)).unwrap();
        assert_eq!(donation.amount, dec!(12.5));
    }

    #[test]
    fn test_complete_then_cancel_is_rejected() {
        let mut donation = Donation::new(input(dec!(25), true)).unwrap();
        assert!(donation.complete(Some("cus_1".into()), Some("sub_1".into())).unwrap());
        assert_eq!(donation.stripe_subscription_id.as_deref(), Some("sub_1"));

        // redelivery
        assert!(!donation.complete(None, None).unwrap());
        assert_eq!(donation.stripe_customer_id.as_deref(), Some("cus_1"));

        assert!(donation.cancel().is_err());
        assert_eq!(donation.status, RecordStatus::Completed);
    }

    #[test]
    fn test_recurring_payment_replay_ignored() {
        let mut donation = Donation::new(input(dec!(10), true)).unwrap();
        donation.complete(None, Some("sub_1".into())).unwrap();

        let payment = RecurringPayment {
            invoice_id: "in_1".into(),
            amount: dec!(10),
            paid_at: Utc::now(),
        };
        assert!(donation.record_recurring_payment(payment.clone()));
        assert!(!donation.record_recurring_payment(payment));
        assert_eq!(donation.recurring_payments.len(), 1);
        assert_eq!(donation.amount_received(), dec!(10));
    }

    #[test]
    fn test_end_subscription() {
        let mut pending = Donation::new(input(dec!(10), true)).unwrap();
        assert!(pending.end_subscription(Utc::now()).unwrap());
        assert_eq!(pending.status, RecordStatus::Cancelled);
        assert!(!pending.end_subscription(Utc::now()).unwrap());

        let mut completed = Donation::new(input(dec!(10), true)).unwrap();
        completed.complete(None, Some("sub_1".into())).unwrap();
        assert!(completed.is_active_monthly());
        assert!(completed.end_subscription(Utc::now()).unwrap());
        assert_eq!(completed.status, RecordStatus::Completed);
        let ended_at = completed.subscription_cancelled_at;
        assert!(ended_at.is_some());
        assert!(!completed.is_active_monthly());

        // redelivery keeps the first timestamp
        assert!(!completed.end_subscription(Utc::now()).unwrap());
        assert_eq!(completed.subscription_cancelled_at, ended_at);
    }

    #[test]
    fn test_update_cannot_touch_status() {
        let body = serde_json::json!({ "status": "completed", "message": "thanks" });
        assert!(serde_json::from_value::<DonationUpdate>(body).is_err());

        let mut donation = Donation::new(input(dec!(10), false)).unwrap();
        let update: DonationUpdate =
            serde_json::from_value(serde_json::json!({ "message": "thanks", "isPublic": false }))
                .unwrap();
        update.apply(&mut donation).unwrap();
        assert_eq!(donation.status, RecordStatus::Pending);
        assert_eq!(donation.message.as_deref(), Some("thanks"));
        assert!(!donation.is_public);
    }

    #[test]
    fn test_serializes_camel_case() {
        let donation = Donation::new(input(dec!(25), true)).unwrap();
        let json = serde_json::to_value(&donation).unwrap();
        assert_eq!(json["isMonthly"], true);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["donorInfo"]["firstName"], "Ada");
    }
}
