//! # benefactor-shop
//!
//! Merchandise store calculations: cart pricing with the "two for a flat
//! price" bundle, and the numbers behind the admin dashboard.
//!
//! ## Example: bundle pricing
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Cart                                 Price  │
//! ├──────────────────────────────────────────────┤
//! │  Hoodie                               $45.00 │
//! │  T-Shirt × 2                          $50.00 │
//! │  Tote Bag                             $18.00 │
//! ├──────────────────────────────────────────────┤
//! │  Subtotal                            $113.00 │
//! │  Bundle (2 pairs @ $40)              -$33.00 │
//! │  Total                                $80.00 │
//! └──────────────────────────────────────────────┘
//! ```

pub mod dashboard;
pub mod error;
pub mod pricing;

pub use dashboard::{DashboardSummary, TopProduct, summarize};
pub use error::{Result, ShopError};
pub use pricing::{BundlePolicy, CartPricing, MAX_CART_UNITS, normalize_lines, price_cart};
