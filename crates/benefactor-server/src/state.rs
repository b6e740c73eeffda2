//! Application State

use std::sync::Arc;

use benefactor_payments::{CheckoutGateway, WebhookHandler};
use benefactor_records::{DonationStore, OrderStore};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Donation records (donations.json)
    pub donations: Arc<DonationStore>,

    /// Store orders (orders.json)
    pub orders: Arc<OrderStore>,

    /// Checkout gateway (optional - None if payments are not configured)
    pub gateway: Option<Arc<dyn CheckoutGateway>>,

    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Open both stores under the configured data directory
    pub fn new(config: ServerConfig, gateway: Option<Arc<dyn CheckoutGateway>>) -> Self {
        Self {
            donations: Arc::new(DonationStore::open(config.donations_path())),
            orders: Arc::new(OrderStore::open(config.orders_path())),
            gateway,
            config: Arc::new(config),
        }
    }

    pub fn webhook_handler(&self) -> WebhookHandler {
        WebhookHandler::new(self.donations.clone(), self.orders.clone())
    }
}
