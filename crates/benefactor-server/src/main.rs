//! benefactor HTTP Server
//!
//! Donation checkout, store checkout, Stripe webhooks and the admin API,
//! persisted to JSON files under `DATA_DIR`.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use benefactor_payments::{CheckoutGateway, MockGateway, StripeClient};
use benefactor_server::{AppState, config::ServerConfig, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    tracing::debug!(?config, "Loaded configuration");

    // Initialize payments
    let gateway: Option<Arc<dyn CheckoutGateway>> = match config.stripe_secret_key.as_deref() {
        Some(key) => {
            let client = StripeClient::new(key).with_currency(&config.currency)?;
            tracing::info!(currency = %config.currency, "✓ Stripe configured");
            Some(Arc::new(client) as Arc<dyn CheckoutGateway>)
        }
        None if config.mock_payments => {
            tracing::warn!("⚠ Using mock checkout gateway - no real payments");
            Some(Arc::new(MockGateway::new()) as Arc<dyn CheckoutGateway>)
        }
        None => {
            tracing::warn!("⚠ Stripe not configured - checkout disabled");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            None
        }
    };

    if config.stripe_webhook_secret.is_none() {
        tracing::warn!("⚠ STRIPE_WEBHOOK_SECRET not set - webhooks will be rejected");
    }
    if config.admin_key.is_none() {
        tracing::warn!("⚠ ADMIN_KEY not set - admin routes disabled");
    }

    let addr = config.bind_addr.clone();
    tracing::info!(data_dir = %config.data_dir.display(), "Using JSON storage");

    let state = AppState::new(config, gateway);
    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 benefactor server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                            - Health check");
    tracing::info!("  POST /api/create-checkout-session       - Donation checkout");
    tracing::info!("  POST /api/store/create-checkout-session - Store checkout");
    tracing::info!("  POST /api/cart/price                    - Price a cart");
    tracing::info!("  POST /api/stripe-webhook                - Stripe events");
    tracing::info!("  GET  /api/admin/dashboard               - Admin summary");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
