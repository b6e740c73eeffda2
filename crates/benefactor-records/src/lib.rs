//! # benefactor-records
//!
//! Donation and store-order records, their payment lifecycle, and the flat
//! JSON files they are persisted in.
//!
//! ```text
//!  checkout started            webhook                 admin
//! ┌─────────────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │ insert(pending) │──▶│ update → completed   │──▶│ delivery /   │
//! │                 │   │        → cancelled   │   │ delete       │
//! └─────────────────┘   └──────────────────────┘   └──────────────┘
//!        data/donations.json      data/orders.json
//! ```

pub mod donation;
pub mod error;
pub mod money;
pub mod order;
pub mod status;
pub mod store;

pub use donation::{Donation, DonationUpdate, DonorInfo, NewDonation, RecurringPayment};
pub use error::{RecordError, Result};
pub use money::is_whole_cents;
pub use order::{
    Customer, DeliveryStatus, EmailEntry, FulfillmentEntry, LineItem, Order, OrderSummary,
    OrderTotals, OrderUpdate,
};
pub use status::RecordStatus;
pub use store::{DonationStore, JsonFileStore, OrderStore, Record};
