//! Error Types for Shop Calculations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShopError>;

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("Invalid cart line: {0}")]
    InvalidLine(String),

    #[error("Cart too large: {units} units exceeds {limit}")]
    CartTooLarge { units: u64, limit: u64 },

    #[error("Invalid bundle price: {0}")]
    InvalidBundlePrice(rust_decimal::Decimal),
}
