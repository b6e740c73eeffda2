//! benefactor HTTP Server
//!
//! Axum router for the donation and store backend.
//!
//! ```text
//!   browser ──► /api/create-checkout-session ──┐
//!           ──► /api/store/create-checkout-session ─► CheckoutGateway ─► Stripe
//!                                              │
//!   Stripe ───► /api/stripe-webhook ──► WebhookHandler ──► donations.json
//!                                                      └─► orders.json
//!   admin ────► /api/donations, /api/store/orders, /api/admin/dashboard
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers::{
    checkout_session_status, create_donation_checkout, create_store_checkout, dashboard,
    delete_donation, delete_order, get_donation, get_order, health_check, list_donations,
    list_orders, price_cart, public_donations, record_order_email, stripe_webhook,
    update_donation, update_order,
};
pub use crate::state::AppState;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.static_dir.clone();

    let app = Router::new()
        // Health
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        // Donations
        .route("/api/create-checkout-session", post(create_donation_checkout))
        .route("/api/checkout-session/{session_id}", get(checkout_session_status))
        .route("/api/donations/public", get(public_donations))
        .route("/api/donations", get(list_donations))
        .route(
            "/api/donations/{id}",
            get(get_donation).put(update_donation).delete(delete_donation),
        )
        // Store
        .route("/api/cart/price", post(price_cart))
        .route("/api/store/create-checkout-session", post(create_store_checkout))
        .route("/api/store/orders", get(list_orders))
        .route(
            "/api/store/orders/{id}",
            get(get_order).patch(update_order).delete(delete_order),
        )
        .route("/api/store/orders/{id}/emails", post(record_order_email))
        // Stripe
        .route("/api/stripe-webhook", post(stripe_webhook))
        // Admin
        .route("/api/admin/dashboard", get(dashboard));

    // Built frontend for everything else
    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app,
    };

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
