//! Stripe Checkout Integration
//!
//! Donations and store orders both go through Stripe's hosted checkout page.
//! The local record id travels in the session metadata so the webhook can
//! find its way back to the record.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionLineItemsPriceDataRecurring,
    CreateCheckoutSessionLineItemsPriceDataRecurringInterval,
    CreateCheckoutSessionSubscriptionData, Currency,
};

use benefactor_records::{Donation, Order};

use crate::error::{PaymentError, Result};

/// Metadata key carrying the donation id
pub const DONATION_ID_KEY: &str = "donationId";

/// Metadata key carrying the order id
pub const ORDER_ID_KEY: &str = "orderId";

/// Metadata key naming the record kind ("donation" or "order")
pub const KIND_KEY: &str = "kind";

/// Where Stripe sends the user afterwards
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedirectUrls {
    pub success_url: String,
    pub cancel_url: String,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session ID
    pub id: String,

    /// URL to redirect user to
    pub checkout_url: String,
}

/// Anything that can open a hosted checkout session
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_donation_session(
        &self,
        donation: &Donation,
        urls: &RedirectUrls,
    ) -> Result<CheckoutSession>;

    async fn create_order_session(&self, order: &Order, urls: &RedirectUrls)
        -> Result<CheckoutSession>;
}

/// Convert a major-unit amount to Stripe's integer minor units
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    if amount < Decimal::ZERO {
        return Err(PaymentError::Amount(format!("negative amount {amount}")));
    }
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| PaymentError::Amount(format!("{amount} out of range")))
}

/// Convert Stripe minor units back to a major-unit amount
pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    currency: Currency,
}

impl StripeClient {
    /// Create a new Stripe client charging in USD
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            currency: Currency::USD,
        }
    }

    /// Charge in `currency` (ISO code, e.g. "usd")
    pub fn with_currency(mut self, currency: &str) -> Result<Self> {
        self.currency = serde_json::from_value::<Currency>(serde_json::Value::String(
            currency.to_lowercase(),
        ))
        .map_err(|_| PaymentError::Config(format!("unsupported currency '{currency}'")))?;
        Ok(self)
    }

    async fn open_session(&self, params: CreateCheckoutSession<'_>) -> Result<CheckoutSession> {
        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            checkout_url,
        })
    }

    fn price_data(
        &self,
        name: String,
        description: Option<String>,
        cents: i64,
        monthly: bool,
    ) -> CreateCheckoutSessionLineItemsPriceData {
        CreateCheckoutSessionLineItemsPriceData {
            currency: self.currency,
            unit_amount: Some(cents),
            product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                name,
                description,
                ..Default::default()
            }),
            recurring: monthly.then(|| CreateCheckoutSessionLineItemsPriceDataRecurring {
                interval: CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Month,
                interval_count: Some(1),
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CheckoutGateway for StripeClient {
    /// One-time gifts use payment mode; monthly gifts open a subscription.
    async fn create_donation_session(
        &self,
        donation: &Donation,
        urls: &RedirectUrls,
    ) -> Result<CheckoutSession> {
        let cents = to_minor_units(donation.amount)?;

        let mut params = CreateCheckoutSession::new();
        params.customer_email = Some(&donation.donor_info.email);
        params.client_reference_id = Some(&donation.id);
        params.success_url = Some(&urls.success_url);
        params.cancel_url = Some(&urls.cancel_url);
        params.mode = Some(if donation.is_monthly {
            CheckoutSessionMode::Subscription
        } else {
            CheckoutSessionMode::Payment
        });

        let mut metadata = HashMap::new();
        metadata.insert(KIND_KEY.to_string(), "donation".to_string());
        metadata.insert(DONATION_ID_KEY.to_string(), donation.id.clone());
        if donation.is_monthly {
            // Copied onto the subscription and its invoices, which can arrive
            // before checkout.session.completed.
            params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
                metadata: Some(metadata.clone()),
                ..Default::default()
            });
        }
        params.metadata = Some(metadata);

        let name = if donation.is_monthly {
            "Monthly Donation".to_string()
        } else {
            "Donation".to_string()
        };
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(self.price_data(name, None, cents, donation.is_monthly)),
            ..Default::default()
        }]);

        let session = self.open_session(params).await?;
        tracing::info!(
            donation_id = %donation.id,
            session_id = %session.id,
            monthly = donation.is_monthly,
            "Created donation checkout session"
        );
        Ok(session)
    }

    /// With a bundle discount the cart is charged as one summarized line,
    /// otherwise one Stripe line per cart line.
    async fn create_order_session(
        &self,
        order: &Order,
        urls: &RedirectUrls,
    ) -> Result<CheckoutSession> {
        let line_items = if order.summary.bundle_discount > Decimal::ZERO {
            let units: u32 = order.items.iter().map(|i| i.quantity).sum();
            vec![CreateCheckoutSessionLineItems {
                quantity: Some(1),
                price_data: Some(self.price_data(
                    format!("Store order ({units} items)"),
                    Some(format!(
                        "Includes bundle savings of {:.2}",
                        order.summary.bundle_discount
                    )),
                    to_minor_units(order.total)?,
                    false,
                )),
                ..Default::default()
            }]
        } else {
            order
                .items
                .iter()
                .map(|item| {
                    Ok(CreateCheckoutSessionLineItems {
                        quantity: Some(u64::from(item.quantity)),
                        price_data: Some(self.price_data(
                            item.label(),
                            None,
                            to_minor_units(item.unit_price)?,
                            false,
                        )),
                        ..Default::default()
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        let mut params = CreateCheckoutSession::new();
        params.customer_email = Some(&order.customer.email);
        params.client_reference_id = Some(&order.id);
        params.success_url = Some(&urls.success_url);
        params.cancel_url = Some(&urls.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);

        let mut metadata = HashMap::new();
        metadata.insert(KIND_KEY.to_string(), "order".to_string());
        metadata.insert(ORDER_ID_KEY.to_string(), order.id.clone());
        params.metadata = Some(metadata);
        params.line_items = Some(line_items);

        let session = self.open_session(params).await?;
        tracing::info!(
            order_id = %order.id,
            session_id = %session.id,
            total = %order.total,
            "Created store checkout session"
        );
        Ok(session)
    }
}
