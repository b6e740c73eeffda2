//! # benefactor-payments
//!
//! Stripe Checkout (hosted) for donations and store orders, plus the
//! webhook side that reconciles Stripe's asynchronous events with the local
//! records.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐  record id   ┌─────────────────┐         ┌─────────────┐
//! │  Our API    │─────────────▶│  Stripe Hosted  │────────▶│  Site       │
//! │  (pending)  │  in metadata │  Checkout Page  │ redirect│  (success)  │
//! └─────────────┘              └─────────────────┘         └─────────────┘
//!        ▲                              │
//!        │   checkout.session.completed │
//!        │   invoice.payment_succeeded  │
//!        └──────── webhook ─────────────┘
//!              customer.subscription.deleted
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use benefactor_payments::{CheckoutGateway, RedirectUrls, StripeClient};
//!
//! let client = StripeClient::new("sk_test_xxx", "whsec_xxx");
//! let session = client
//!     .create_donation_session(&donation, &RedirectUrls {
//!         success_url: "https://example.org/thanks?session_id={CHECKOUT_SESSION_ID}".into(),
//!         cancel_url: "https://example.org/donate".into(),
//!     })
//!     .await?;
//!
//! // Redirect user to: session.checkout_url
//! ```

mod checkout;
mod error;
mod mock;
mod signature;
mod webhook;

pub use checkout::{
    CheckoutGateway, CheckoutSession, DONATION_ID_KEY, KIND_KEY, ORDER_ID_KEY, RedirectUrls,
    StripeClient, from_minor_units, to_minor_units,
};
pub use error::{PaymentError, Result};
pub use mock::{IssuedSession, MockGateway};
pub use signature::{DEFAULT_TOLERANCE_SECS, sign_payload, verify_signature, verify_signature_at};
pub use webhook::{RecordRef, WebhookEvent, WebhookHandler, WebhookOutcome, parse_event};
