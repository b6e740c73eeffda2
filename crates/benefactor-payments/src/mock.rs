//! Mock Checkout Gateway
//!
//! Hands out fake session ids and URLs without talking to Stripe. Used in
//! tests and when running the server locally without Stripe keys.

use async_trait::async_trait;
use tokio::sync::Mutex;

use benefactor_records::{Donation, Order};

use crate::checkout::{CheckoutGateway, CheckoutSession, RedirectUrls};
use crate::error::{PaymentError, Result};
use crate::webhook::RecordRef;

/// Session the mock handed out
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedSession {
    pub session: CheckoutSession,
    pub record: RecordRef,
    pub success_url: String,
}

/// In-memory gateway
#[derive(Default)]
pub struct MockGateway {
    issued: Mutex<Vec<IssuedSession>>,
    fail: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every call fails like an unreachable Stripe
    pub fn failing() -> Self {
        Self {
            issued: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Sessions created so far, oldest first
    pub async fn issued(&self) -> Vec<IssuedSession> {
        self.issued.lock().await.clone()
    }

    async fn issue(&self, record: RecordRef, urls: &RedirectUrls) -> Result<CheckoutSession> {
        if self.fail {
            return Err(PaymentError::Stripe("mock gateway unavailable".into()));
        }
        let id = format!("cs_test_{}", uuid::Uuid::new_v4().simple());
        let session = CheckoutSession {
            checkout_url: format!("https://checkout.stripe.test/pay/{id}"),
            id,
        };
        self.issued.lock().await.push(IssuedSession {
            session: session.clone(),
            record,
            success_url: urls.success_url.clone(),
        });
        Ok(session)
    }
}

#[async_trait]
impl CheckoutGateway for MockGateway {
    async fn create_donation_session(
        &self,
        donation: &Donation,
        urls: &RedirectUrls,
    ) -> Result<CheckoutSession> {
        self.issue(RecordRef::Donation(donation.id.clone()), urls).await
    }

    async fn create_order_session(
        &self,
        order: &Order,
        urls: &RedirectUrls,
    ) -> Result<CheckoutSession> {
        self.issue(RecordRef::Order(order.id.clone()), urls).await
    }
}
