//! Stripe Webhook Handling
//!
//! Turns raw Stripe events into [`WebhookEvent`]s and applies them to the
//! local donation and order records.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use benefactor_records::{Donation, DonationStore, OrderStore, RecordError, RecurringPayment};

use crate::checkout::{DONATION_ID_KEY, ORDER_ID_KEY, from_minor_units};
use crate::error::{PaymentError, Result};
use crate::signature::{DEFAULT_TOLERANCE_SECS, verify_signature};

/// Local record named in session metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum RecordRef {
    Donation(String),
    Order(String),
}

impl RecordRef {
    fn from_metadata(metadata: &HashMap<String, String>) -> Option<Self> {
        if let Some(id) = metadata.get(DONATION_ID_KEY).filter(|id| !id.is_empty()) {
            return Some(Self::Donation(id.clone()));
        }
        metadata
            .get(ORDER_ID_KEY)
            .filter(|id| !id.is_empty())
            .map(|id| Self::Order(id.clone()))
    }
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Checkout paid - complete the record
    CheckoutCompleted {
        session_id: String,
        record: Option<RecordRef>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },

    /// Checkout abandoned - cancel the pending record
    CheckoutExpired {
        session_id: String,
        record: Option<RecordRef>,
    },

    /// Monthly gift charged
    InvoicePaid {
        invoice_id: String,
        subscription_id: Option<String>,
        /// From the subscription metadata, for invoices that beat checkout completion
        donation_id: Option<String>,
        amount: Decimal,
        paid_at: DateTime<Utc>,
    },

    /// Monthly gift stopped
    SubscriptionDeleted {
        subscription_id: String,
        donation_id: Option<String>,
    },

    /// Unhandled event type
    Other {
        event_type: String,
    },
}

impl WebhookEvent {
    pub fn name(&self) -> &str {
        match self {
            Self::CheckoutCompleted { .. } => "checkout.session.completed",
            Self::CheckoutExpired { .. } => "checkout.session.expired",
            Self::InvoicePaid { .. } => "invoice.payment_succeeded",
            Self::SubscriptionDeleted { .. } => "customer.subscription.deleted",
            Self::Other { event_type } => event_type,
        }
    }
}

/// What handling an event did to local state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// A record changed
    Applied { record: RecordRef },

    /// The record already reflected this event
    Duplicate { record: RecordRef },

    /// The event conflicts with the record's terminal status
    Conflict { record: RecordRef, reason: String },

    /// No local record correlates with the event
    Unmatched,

    /// Event type we don't act on
    Ignored,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    type_: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: Value,
}

#[derive(Deserialize)]
struct RawCheckoutSession {
    id: String,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    customer: Option<Value>,
    #[serde(default)]
    subscription: Option<Value>,
}

#[derive(Deserialize)]
struct RawInvoice {
    id: String,
    #[serde(default)]
    subscription: Option<Value>,
    #[serde(default)]
    parent: Option<Value>,
    #[serde(default)]
    subscription_details: Option<Value>,
    #[serde(default)]
    amount_paid: i64,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    status_transitions: Option<Value>,
}

#[derive(Deserialize)]
struct RawSubscription {
    id: String,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

/// Id of a Stripe "expandable" field: either the id string or the object
fn expandable_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// `donationId` from a Stripe metadata object
fn metadata_donation_id(metadata: Option<&Value>) -> Option<String> {
    metadata?
        .get(DONATION_ID_KEY)?
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn object<T: for<'de> Deserialize<'de>>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| PaymentError::WebhookParse(format!("invalid {what} data: {e}")))
}

fn parse_session(value: Value) -> Result<(String, Option<RecordRef>, RawCheckoutSession)> {
    let session: RawCheckoutSession = object(value, "checkout session")?;
    let record = session
        .metadata
        .as_ref()
        .and_then(RecordRef::from_metadata)
        .or_else(|| {
            session.client_reference_id.as_deref().and_then(|id| {
                if id.starts_with("don_") {
                    Some(RecordRef::Donation(id.to_string()))
                } else if id.starts_with("ord_") {
                    Some(RecordRef::Order(id.to_string()))
                } else {
                    None
                }
            })
        });
    Ok((session.id.clone(), record, session))
}

/// Parse an already-verified event body
pub fn parse_event(payload: &str) -> Result<WebhookEvent> {
    let raw: RawEvent = serde_json::from_str(payload)
        .map_err(|e| PaymentError::WebhookParse(e.to_string()))?;
    tracing::debug!(event_id = %raw.id, event_type = %raw.type_, "Parsing Stripe event");

    match raw.type_.as_str() {
        "checkout.session.completed" => {
            let (session_id, record, session) = parse_session(raw.data.object)?;
            Ok(WebhookEvent::CheckoutCompleted {
                session_id,
                record,
                customer_id: expandable_id(session.customer.as_ref()),
                subscription_id: expandable_id(session.subscription.as_ref()),
            })
        }

        "checkout.session.expired" => {
            let (session_id, record, _) = parse_session(raw.data.object)?;
            Ok(WebhookEvent::CheckoutExpired { session_id, record })
        }

        "invoice.payment_succeeded" | "invoice.paid" => {
            let invoice: RawInvoice = object(raw.data.object, "invoice")?;
            // Newer API versions nest the subscription under `parent`.
            let details = invoice
                .parent
                .as_ref()
                .and_then(|p| p.get("subscription_details"))
                .or(invoice.subscription_details.as_ref());
            let subscription_id = expandable_id(invoice.subscription.as_ref())
                .or_else(|| expandable_id(details.and_then(|d| d.get("subscription"))));
            let donation_id = metadata_donation_id(details.and_then(|d| d.get("metadata")));
            let paid_ts = invoice
                .status_transitions
                .as_ref()
                .and_then(|t| t.get("paid_at"))
                .and_then(Value::as_i64)
                .or(invoice.created);
            let paid_at = paid_ts
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .unwrap_or_else(Utc::now);

            Ok(WebhookEvent::InvoicePaid {
                invoice_id: invoice.id,
                subscription_id,
                donation_id,
                amount: from_minor_units(invoice.amount_paid),
                paid_at,
            })
        }

        "customer.subscription.deleted" => {
            let sub: RawSubscription = object(raw.data.object, "subscription")?;
            let donation_id = sub
                .metadata
                .as_ref()
                .and_then(|m| m.get(DONATION_ID_KEY))
                .filter(|id| !id.is_empty())
                .cloned();
            Ok(WebhookEvent::SubscriptionDeleted {
                subscription_id: sub.id,
                donation_id,
            })
        }

        other => Ok(WebhookEvent::Other {
            event_type: other.to_string(),
        }),
    }
}

/// Webhook handler
pub struct WebhookHandler {
    donations: Arc<DonationStore>,
    orders: Arc<OrderStore>,
}

impl WebhookHandler {
    pub fn new(donations: Arc<DonationStore>, orders: Arc<OrderStore>) -> Self {
        Self { donations, orders }
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(&self, payload: &str, signature: &str, secret: &str) -> Result<WebhookEvent> {
        verify_signature(payload.as_bytes(), signature, secret, DEFAULT_TOLERANCE_SECS)?;
        parse_event(payload)
    }

    /// Apply an event to the local records
    pub async fn handle(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        tracing::info!(event_type = %event.name(), "Processing Stripe webhook");

        let outcome = match event {
            WebhookEvent::CheckoutCompleted {
                session_id,
                record,
                customer_id,
                subscription_id,
            } => {
                self.settle_checkout(session_id, record.as_ref(), |target| match target {
                    Target::Donation(d) => d.complete(customer_id.clone(), subscription_id.clone()),
                    Target::Order(o) => o.complete(customer_id.clone()),
                })
                .await?
            }

            WebhookEvent::CheckoutExpired { session_id, record } => {
                self.settle_checkout(session_id, record.as_ref(), |target| match target {
                    Target::Donation(d) => d.cancel(),
                    Target::Order(o) => o.cancel(),
                })
                .await?
            }

            WebhookEvent::InvoicePaid {
                invoice_id,
                subscription_id,
                donation_id,
                amount,
                paid_at,
            } => {
                let Some(subscription_id) = subscription_id else {
                    tracing::debug!(invoice_id = %invoice_id, "Invoice without subscription");
                    return Ok(WebhookOutcome::Ignored);
                };
                let payment = RecurringPayment {
                    invoice_id: invoice_id.clone(),
                    amount: *amount,
                    paid_at: *paid_at,
                };
                let updated = self
                    .donations
                    .update_where(
                        |d| owns_subscription(d, subscription_id, donation_id.as_deref()),
                        |d| {
                            d.stripe_subscription_id
                                .get_or_insert_with(|| subscription_id.clone());
                            Ok(d.record_recurring_payment(payment))
                        },
                    )
                    .await?;
                match updated {
                    Some((donation, true)) => {
                        tracing::info!(
                            donation_id = %donation.id,
                            invoice_id = %invoice_id,
                            amount = %amount,
                            "Recorded recurring payment"
                        );
                        WebhookOutcome::Applied {
                            record: RecordRef::Donation(donation.id),
                        }
                    }
                    Some((donation, false)) => WebhookOutcome::Duplicate {
                        record: RecordRef::Donation(donation.id),
                    },
                    None => WebhookOutcome::Unmatched,
                }
            }

            WebhookEvent::SubscriptionDeleted {
                subscription_id,
                donation_id,
            } => {
                let now = Utc::now();
                let updated = self
                    .donations
                    .update_where(
                        |d| owns_subscription(d, subscription_id, donation_id.as_deref()),
                        |d| d.end_subscription(now),
                    )
                    .await?;
                match updated {
                    Some((donation, false)) => WebhookOutcome::Duplicate {
                        record: RecordRef::Donation(donation.id),
                    },
                    Some((donation, true)) => {
                        tracing::info!(
                            donation_id = %donation.id,
                            subscription_id = %subscription_id,
                            status = %donation.status,
                            "Monthly donation ended"
                        );
                        WebhookOutcome::Applied {
                            record: RecordRef::Donation(donation.id),
                        }
                    }
                    None => WebhookOutcome::Unmatched,
                }
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                WebhookOutcome::Ignored
            }
        };

        if outcome == WebhookOutcome::Unmatched {
            tracing::warn!(event_type = %event.name(), "Webhook matched no local record");
        }
        Ok(outcome)
    }

    /// Find the record behind a checkout session and apply `transition`.
    ///
    /// Metadata wins; the stored session id is the fallback, also when the
    /// metadata names a record that no longer exists.
    async fn settle_checkout<F>(
        &self,
        session_id: &str,
        record: Option<&RecordRef>,
        transition: F,
    ) -> Result<WebhookOutcome>
    where
        F: Fn(Target<'_>) -> benefactor_records::Result<bool>,
    {
        let mut target = record.cloned();
        let mut result = match &target {
            Some(r) => self.apply_checkout(r, session_id, &transition).await,
            None => Err(RecordError::NotFound(session_id.to_string())),
        };

        if matches!(result, Err(RecordError::NotFound(_))) {
            let found = self.lookup_session(session_id).await?;
            if let Some(found) = found.filter(|f| target.as_ref() != Some(f)) {
                result = self.apply_checkout(&found, session_id, &transition).await;
                target = Some(found);
            }
        }
        let Some(target) = target else {
            return Ok(WebhookOutcome::Unmatched);
        };

        match result {
            Ok(true) => {
                tracing::info!(record = ?target, session_id, "Checkout settled");
                Ok(WebhookOutcome::Applied { record: target })
            }
            Ok(false) => Ok(WebhookOutcome::Duplicate { record: target }),
            Err(RecordError::NotFound(_)) => Ok(WebhookOutcome::Unmatched),
            Err(e @ RecordError::InvalidTransition { .. }) => {
                tracing::warn!(record = ?target, error = %e, "Webhook conflicts with record status");
                Ok(WebhookOutcome::Conflict {
                    record: target,
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_checkout<F>(
        &self,
        target: &RecordRef,
        session_id: &str,
        transition: &F,
    ) -> benefactor_records::Result<bool>
    where
        F: Fn(Target<'_>) -> benefactor_records::Result<bool>,
    {
        match target {
            RecordRef::Donation(id) => self
                .donations
                .update(id, |d| {
                    d.stripe_session_id.get_or_insert_with(|| session_id.to_string());
                    transition(Target::Donation(d))
                })
                .await
                .map(|(_, changed)| changed),
            RecordRef::Order(id) => self
                .orders
                .update(id, |o| {
                    o.stripe_session_id.get_or_insert_with(|| session_id.to_string());
                    transition(Target::Order(o))
                })
                .await
                .map(|(_, changed)| changed),
        }
    }

    async fn lookup_session(&self, session_id: &str) -> Result<Option<RecordRef>> {
        if let Some(d) = self.donations.find_by_session(session_id).await? {
            return Ok(Some(RecordRef::Donation(d.id)));
        }
        Ok(self
            .orders
            .find_by_session(session_id)
            .await?
            .map(|o| RecordRef::Order(o.id)))
    }
}

/// Mutable view of whichever record a checkout session belongs to
enum Target<'a> {
    Donation(&'a mut Donation),
    Order(&'a mut benefactor_records::Order),
}

/// Whether `donation` is the gift behind `subscription_id`.
///
/// Before checkout completion stores the subscription id, the donation id
/// copied into the subscription metadata is the only link.
fn owns_subscription(donation: &Donation, subscription_id: &str, donation_id: Option<&str>) -> bool {
    match donation.stripe_subscription_id.as_deref() {
        Some(stored) => stored == subscription_id,
        None => donation_id == Some(donation.id.as_str()),
    }
}
