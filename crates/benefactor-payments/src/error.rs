//! Payment Error Types

use thiserror::Error;

use benefactor_records::RecordError;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Amount cannot be expressed in minor currency units
    #[error("Invalid amount: {0}")]
    Amount(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local record lookup or update failed
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl PaymentError {
    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            Self::Stripe(_) => "Payment processing failed. Please try again.",
            Self::WebhookSignature(_) => "Invalid signature.",
            Self::Amount(_) => "The amount could not be processed.",
            Self::Config(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}
