//! Admin Dashboard Aggregation
//!
//! Read-side numbers computed fresh from the full record lists on every
//! request.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use benefactor_records::{Donation, Order, RecordStatus};

/// Best-selling product across paid orders
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    pub units: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub order_count: usize,
    pub orders_by_status: BTreeMap<String, usize>,
    pub revenue: Decimal,
    pub top_product: Option<TopProduct>,
    pub fulfillment_queue: usize,
    pub donation_count: usize,
    pub donation_total: Decimal,
    pub active_monthly_donors: usize,
}

/// Sum of totals over completed orders
pub fn revenue(orders: &[Order]) -> Decimal {
    orders
        .iter()
        .filter(|o| o.status == RecordStatus::Completed)
        .map(|o| o.total)
        .sum()
}

/// Product with the most units sold in completed orders.
///
/// Ties go to the alphabetically first name.
pub fn top_product(orders: &[Order]) -> Option<TopProduct> {
    let mut sold: HashMap<&str, (&str, u64)> = HashMap::new();
    for order in orders.iter().filter(|o| o.status == RecordStatus::Completed) {
        for item in &order.items {
            let entry = sold.entry(item.product_id.as_str()).or_insert((item.name.as_str(), 0));
            entry.1 += u64::from(item.quantity);
        }
    }

    sold.into_iter()
        .filter(|(_, (_, units))| *units > 0)
        .min_by(|(_, (name_a, units_a)), (_, (name_b, units_b))| {
            units_b.cmp(units_a).then_with(|| name_a.cmp(name_b))
        })
        .map(|(product_id, (name, units))| TopProduct {
            product_id: product_id.to_string(),
            name: name.to_string(),
            units,
        })
}

/// Paid orders still waiting to ship
pub fn fulfillment_queue(orders: &[Order]) -> usize {
    orders.iter().filter(|o| o.awaiting_fulfillment()).count()
}

pub fn summarize(orders: &[Order], donations: &[Donation]) -> DashboardSummary {
    let mut orders_by_status = BTreeMap::new();
    for order in orders {
        *orders_by_status
            .entry(order.status.as_str().to_string())
            .or_insert(0) += 1;
    }

    let completed_donations: Vec<&Donation> = donations
        .iter()
        .filter(|d| d.status == RecordStatus::Completed)
        .collect();

    DashboardSummary {
        order_count: orders.len(),
        orders_by_status,
        revenue: revenue(orders),
        top_product: top_product(orders),
        fulfillment_queue: fulfillment_queue(orders),
        donation_count: completed_donations.len(),
        donation_total: completed_donations.iter().map(|d| d.amount_received()).sum(),
        active_monthly_donors: completed_donations
            .iter()
            .filter(|d| d.is_active_monthly())
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benefactor_records::{
        Customer, DeliveryStatus, DonorInfo, LineItem, NewDonation, OrderTotals, RecurringPayment,
    };
    use rust_decimal_macros::dec;

    fn order(items: &[(&str, u32)], total: Decimal) -> Order {
        let items = items
            .iter()
            .map(|(id, qty)| LineItem {
                product_id: (*id).into(),
                name: id.to_uppercase(),
                variant: None,
                unit_price: dec!(10),
                quantity: *qty,
            })
            .collect();
        Order::new(
            items,
            Customer {
                name: "C".into(),
                email: "c@example.org".into(),
                ..Default::default()
            },
            None,
            OrderTotals {
                subtotal: total,
                bundle_discount: Decimal::ZERO,
                total,
            },
            "usd",
        )
        .unwrap()
    }

    fn paid(mut o: Order) -> Order {
        o.complete(None).unwrap();
        o
    }

    #[test]
    fn test_revenue_counts_completed_only() {
        let orders = vec![
            paid(order(&[("tee", 1)], dec!(25))),
            order(&[("tee", 5)], dec!(125)),
            paid(order(&[("mug", 2)], dec!(24))),
        ];
        assert_eq!(revenue(&orders), dec!(49));
    }

    #[test]
    fn test_top_product_and_ties() {
        let orders = vec![
            paid(order(&[("tee", 2), ("mug", 1)], dec!(30))),
            paid(order(&[("mug", 1)], dec!(10))),
            order(&[("hat", 9)], dec!(90)),
        ];
        let top = top_product(&orders).unwrap();
        // tee and mug both at 2, MUG sorts first
        assert_eq!(top.product_id, "mug");
        assert_eq!(top.units, 2);

        assert!(top_product(&[]).is_none());
    }

    #[test]
    fn test_fulfillment_queue() {
        let mut shipped = paid(order(&[("tee", 1)], dec!(25)));
        shipped.set_delivery_status(DeliveryStatus::Shipped, None);
        let mut processing = paid(order(&[("tee", 1)], dec!(25)));
        processing.set_delivery_status(DeliveryStatus::Processing, None);

        let orders = vec![
            shipped,
            processing,
            paid(order(&[("mug", 1)], dec!(12))),
            order(&[("mug", 1)], dec!(12)),
        ];
        assert_eq!(fulfillment_queue(&orders), 2);
    }

    #[test]
    fn test_summary_includes_donations() {
        let donor = DonorInfo {
            first_name: "A".into(),
            last_name: "B".into(),
            email: "a@example.org".into(),
            ..Default::default()
        };
        let mut one_time = Donation::new(NewDonation {
            amount: dec!(50),
            is_monthly: false,
            donor_info: donor.clone(),
            message: None,
            is_public: false,
        })
        .unwrap();
        one_time.complete(None, None).unwrap();

        let mut monthly = Donation::new(NewDonation {
            amount: dec!(10),
            is_monthly: true,
            donor_info: donor.clone(),
            message: None,
            is_public: false,
        })
        .unwrap();
        monthly.complete(None, Some("sub_1".into())).unwrap();
        for invoice in ["in_1", "in_2"] {
            monthly.record_recurring_payment(RecurringPayment {
                invoice_id: invoice.into(),
                amount: dec!(10),
                paid_at: chrono::Utc::now(),
            });
        }

        let abandoned = Donation::new(NewDonation {
            amount: dec!(500),
            is_monthly: false,
            donor_info: donor,
            message: None,
            is_public: false,
        })
        .unwrap();

        let summary = summarize(
            &[paid(order(&[("tee", 1)], dec!(25)))],
            &[one_time, monthly, abandoned],
        );
        assert_eq!(summary.donation_count, 2);
        assert_eq!(summary.donation_total, dec!(70));
        assert_eq!(summary.active_monthly_donors, 1);
        assert_eq!(summary.orders_by_status.get("completed"), Some(&1));

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("fulfillmentQueue").is_some());
    }
}
