//! Store Orders
//!
//! Payment status follows the shared [`RecordStatus`] lifecycle; the
//! physical side is tracked separately in [`DeliveryStatus`] with an
//! append-only fulfillment history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result};
use crate::money::is_whole_cents;
use crate::status::RecordStatus;
use crate::store::Record;

/// A product line in a cart or order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub variant: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Display label, e.g. "Tote Bag (Navy)"
    pub fn label(&self) -> String {
        match self.variant.as_deref() {
            Some(v) if !v.is_empty() => format!("{} ({})", self.name, v),
            _ => self.name.clone(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.product_id.trim().is_empty() {
            return Err(RecordError::Validation("line item without product id".into()));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(RecordError::Validation(format!(
                "negative price for {}",
                self.product_id
            )));
        }
        if !is_whole_cents(self.unit_price) {
            return Err(RecordError::Validation(format!(
                "price for {} has fractional cents",
                self.product_id
            )));
        }
        Ok(())
    }
}

/// Shipping and contact details for an order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Where the parcel is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Still waiting on the fulfillment team
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary line as shown on receipts and the dashboard
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryLine {
    pub label: String,
    pub quantity: u32,
    pub line_total: Decimal,
}

/// Priced snapshot taken at checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub items: Vec<SummaryLine>,
    pub subtotal: Decimal,
    #[serde(default)]
    pub bundle_discount: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Totals computed by cart pricing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub bundle_discount: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentEntry {
    pub delivery_status: DeliveryStatus,
    #[serde(default)]
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailEntry {
    /// e.g. "confirmation", "shipping"
    pub kind: String,
    pub to: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Persisted store order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub delivery_status: DeliveryStatus,
    pub currency: String,
    pub total: Decimal,
    pub items: Vec<LineItem>,
    pub summary: OrderSummary,
    pub customer: Customer,
    #[serde(default)]
    pub stripe_session_id: Option<String>,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub fulfillment_history: Vec<FulfillmentEntry>,
    #[serde(default)]
    pub email_history: Vec<EmailEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a pending order from already-priced items
    pub fn new(
        items: Vec<LineItem>,
        customer: Customer,
        notes: Option<String>,
        totals: OrderTotals,
        currency: impl Into<String>,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(RecordError::Validation("order has no items".into()));
        }
        for item in &items {
            item.validate()?;
        }
        if !customer.email.contains('@') {
            return Err(RecordError::Validation("a valid customer email is required".into()));
        }

        let summary = OrderSummary {
            items: items
                .iter()
                .map(|i| SummaryLine {
                    label: i.label(),
                    quantity: i.quantity,
                    line_total: i.line_total(),
                })
                .collect(),
            subtotal: totals.subtotal,
            bundle_discount: totals.bundle_discount,
            total: totals.total,
            notes: notes.filter(|n| !n.trim().is_empty()),
        };

        let now = Utc::now();
        Ok(Self {
            id: format!("ord_{}", uuid::Uuid::new_v4().simple()),
            status: RecordStatus::Pending,
            delivery_status: DeliveryStatus::Pending,
            currency: currency.into().to_lowercase(),
            total: totals.total,
            items,
            summary,
            customer,
            stripe_session_id: None,
            stripe_customer_id: None,
            fulfillment_history: Vec::new(),
            email_history: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Mark as paid. Returns `false` if already completed.
    pub fn complete(&mut self, customer_id: Option<String>) -> Result<bool> {
        let changed = self.status.transition(RecordStatus::Completed)?;
        if customer_id.is_some() {
            self.stripe_customer_id = customer_id;
        }
        self.status = RecordStatus::Completed;
        Ok(changed)
    }

    /// Cancel an unpaid order. Also closes out delivery.
    pub fn cancel(&mut self) -> Result<bool> {
        let changed = self.status.transition(RecordStatus::Cancelled)?;
        self.status = RecordStatus::Cancelled;
        if changed && self.delivery_status != DeliveryStatus::Cancelled {
            self.set_delivery_status(DeliveryStatus::Cancelled, Some("payment cancelled".into()));
        }
        Ok(changed)
    }

    /// Change delivery status and log it in the fulfillment history
    pub fn set_delivery_status(&mut self, status: DeliveryStatus, note: Option<String>) {
        self.delivery_status = status;
        self.fulfillment_history.push(FulfillmentEntry {
            delivery_status: status,
            note,
            at: Utc::now(),
        });
    }

    pub fn record_email(&mut self, entry: EmailEntry) {
        self.email_history.push(entry);
    }

    /// Paid but not yet shipped
    pub fn awaiting_fulfillment(&self) -> bool {
        self.status == RecordStatus::Completed && self.delivery_status.is_open()
    }
}

impl Record for Order {
    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Admin edit of an order
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    #[serde(default)]
    pub status: Option<RecordStatus>,
    #[serde(default)]
    pub delivery_status: Option<DeliveryStatus>,
    /// Note attached to the fulfillment entry
    #[serde(default)]
    pub note: Option<String>,
    /// Replaces the order notes
    #[serde(default)]
    pub notes: Option<String>,
}

impl OrderUpdate {
    pub fn apply(self, order: &mut Order) -> Result<()> {
        if let Some(status) = self.status {
            match status {
                RecordStatus::Completed => {
                    order.complete(None)?;
                }
                RecordStatus::Cancelled => {
                    order.cancel()?;
                }
                RecordStatus::Pending => {
                    order.status.transition(RecordStatus::Pending)?;
                }
            }
        }
        if let Some(delivery) = self.delivery_status {
            if delivery != order.delivery_status || self.note.is_some() {
                order.set_delivery_status(delivery, self.note);
            }
        }
        if let Some(notes) = self.notes {
            order.summary.notes = Some(notes).filter(|n| !n.trim().is_empty());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_order() -> Order {
        let items = vec![
            LineItem {
                product_id: "tee".into(),
                name: "T-Shirt".into(),
                variant: Some("M".into()),
                unit_price: dec!(25),
                quantity: 2,
            },
            LineItem {
                product_id: "mug".into(),
                name: "Mug".into(),
                variant: None,
                unit_price: dec!(12),
                quantity: 1,
            },
        ];
        let customer = Customer {
            name: "Grace Hopper".into(),
            email: "grace@example.org".into(),
            ..Default::default()
        };
        Order::new(
            items,
            customer,
            Some("gift wrap".into()),
            OrderTotals {
                subtotal: dec!(62),
                bundle_discount: dec!(10),
                total: dec!(52),
            },
            "USD",
        )
        .unwrap()
    }

    #[test]
    fn test_new_order_summary() {
        let order = sample_order();
        assert_eq!(order.status, RecordStatus::Pending);
        assert_eq!(order.delivery_status, DeliveryStatus::Pending);
        assert_eq!(order.currency, "usd");
        assert_eq!(order.total, dec!(52));
        assert_eq!(order.summary.items[0].label, "T-Shirt (M)");
        assert_eq!(order.summary.items[0].line_total, dec!(50));
        assert_eq!(order.summary.notes.as_deref(), Some("gift wrap"));
    }

    #[test]
    fn test_rejects_empty_order() {
        let result = Order::new(
            Vec::new(),
            Customer::default(),
            None,
            OrderTotals {
                subtotal: Decimal::ZERO,
                bundle_discount: Decimal::ZERO,
                total: Decimal::ZERO,
            },
            "usd",
        );
        assert!(matches!(result, Err(RecordError::Validation(_))));
    }

    #[test]
    fn test_rejects_fractional_cent_price() {
        let result = Order::new(
            vec![LineItem {
                product_id: "sticker".into(),
                name: "Sticker".into(),
                variant: None,
                unit_price: dec!(0.333),
                quantity: 3,
            }],
            Customer {
                name: "Grace Hopper".into(),
                email: "grace@example.org".into(),
                ..Default::default()
            },
            None,
            OrderTotals {
                subtotal: dec!(1),
                bundle_discount: Decimal::ZERO,
                total: dec!(1),
            },
            "usd",
        );
        assert!(matches!(result, Err(RecordError::Validation(_))));
    }

    #[test]
    fn test_cancel_closes_delivery() {
        let mut order = sample_order();
        assert!(order.cancel().unwrap());
        assert_eq!(order.delivery_status, DeliveryStatus::Cancelled);
        assert_eq!(order.fulfillment_history.len(), 1);
        assert!(order.complete(None).is_err());
    }

    #[test]
    fn test_update_tracks_fulfillment() {
        let mut order = sample_order();
        order.complete(Some("cus_9".into())).unwrap();
        assert!(order.awaiting_fulfillment());

        OrderUpdate {
            delivery_status: Some(DeliveryStatus::Shipped),
            note: Some("UPS 1Z999".into()),
            ..Default::default()
        }
        .apply(&mut order)
        .unwrap();

        assert!(!order.awaiting_fulfillment());
        let last = order.fulfillment_history.last().unwrap();
        assert_eq!(last.delivery_status, DeliveryStatus::Shipped);
        assert_eq!(last.note.as_deref(), Some("UPS 1Z999"));
    }
}
