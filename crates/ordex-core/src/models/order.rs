//! Normalized order records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::money::Money;

/// A finalized order parsed from one invoice page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier, e.g. `002-7394758-9918293`.
    pub id: String,

    /// Currency symbol the totals are expressed in.
    pub currency: String,

    /// Date the order was placed.
    pub date: NaiveDate,

    /// Account holder who placed the order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placed_by: Option<String>,

    /// Sum of item prices, after any savings.
    pub subtotal: Money,

    pub tax: Money,

    /// Shipping and handling, when the page lists it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_cost: Option<Money>,

    /// Order total including amounts covered by gift cards.
    pub total: Money,

    pub shipments: Vec<Shipment>,

    /// Payments charged so far. Empty for orders not yet charged.
    #[serde(default)]
    pub payments: Vec<Payment>,
}

/// A group of items shipped (or picked up) together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    /// Absent when nothing is physically shipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,

    pub items: Vec<OrderItem>,
}

/// Destination of a shipment.
///
/// All fields empty means the page withheld the address (registry and gift
/// orders), which is different from a shipment with no address at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl ShippingAddress {
    /// True when the page withheld the address.
    pub fn is_undisclosed(&self) -> bool {
        self.name.is_empty()
            && self.address.is_empty()
            && self.city.is_empty()
            && self.state.is_empty()
            && self.zip.is_empty()
            && self.country.is_empty()
    }

    /// Format address as a single line.
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        for part in [&self.name, &self.address] {
            if !part.is_empty() {
                parts.push(part.clone());
            }
        }
        let locality = format!("{} {} {}", self.city, self.state, self.zip);
        let locality = locality.split_whitespace().collect::<Vec<_>>().join(" ");
        if !locality.is_empty() {
            parts.push(locality);
        }
        if !self.country.is_empty() {
            parts.push(self.country.clone());
        }
        parts.join(", ")
    }
}

/// A single line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,

    /// Unit price.
    pub price: Money,

    /// Always at least one.
    pub quantity: u32,
}

impl OrderItem {
    /// Price multiplied by quantity.
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }
}

/// How an order was paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payment {
    CreditCard {
        card_type: String,
        last4: String,
        date: NaiveDate,
        amount: Money,
    },
    GiftCard {
        date: NaiveDate,
        amount: Money,
    },
    Cash {
        date: NaiveDate,
        amount: Money,
    },
}

impl Payment {
    pub fn amount(&self) -> &Money {
        match self {
            Payment::CreditCard { amount, .. }
            | Payment::GiftCard { amount, .. }
            | Payment::Cash { amount, .. } => amount,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Payment::CreditCard { date, .. }
            | Payment::GiftCard { date, .. }
            | Payment::Cash { date, .. } => *date,
        }
    }

    pub fn is_gift_card(&self) -> bool {
        matches!(self, Payment::GiftCard { .. })
    }

    /// Short human description, e.g. `Visa ending in 1234`.
    pub fn describe(&self) -> String {
        match self {
            Payment::CreditCard {
                card_type, last4, ..
            } => format!("{} ending in {}", card_type, last4),
            Payment::GiftCard { .. } => "Gift card".to_string(),
            Payment::Cash { .. } => "Cash".to_string(),
        }
    }
}

impl Order {
    /// Number of units across all shipments.
    pub fn item_count(&self) -> u32 {
        self.items().fold(0u32, |n, i| n.saturating_add(i.quantity))
    }

    /// All items in shipment order.
    pub fn items(&self) -> impl Iterator<Item = &OrderItem> {
        self.shipments.iter().flat_map(|s| s.items.iter())
    }

    /// Consistency checks that do not prevent building the order.
    ///
    /// Pages routinely omit items (digital content, cancelled lines), so
    /// these are reported as warnings rather than failures.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.shipments.iter().all(|s| s.items.is_empty()) {
            issues.push("No items".to_string());
        } else {
            let items_total = self
                .items()
                .try_fold(Money::zero(Some(&self.currency)), |acc, item| {
                    acc.checked_add(&item.price.checked_times(item.quantity)?)
                });
            match items_total {
                Ok(total) if total.cents != self.subtotal.cents => issues.push(format!(
                    "Item total ({}) differs from subtotal ({})",
                    total, self.subtotal
                )),
                Ok(_) => {}
                Err(e) => issues.push(format!("Item total not computable: {}", e)),
            }
        }

        if !self.payments.is_empty() {
            match Money::checked_sum(self.payments.iter().map(Payment::amount)) {
                Ok(paid) if paid.cents != self.total.cents => issues.push(format!(
                    "Payments ({}) differ from total ({})",
                    Money::from_cents(paid.cents, Some(&self.currency)),
                    self.total
                )),
                Ok(_) => {}
                Err(e) => issues.push(format!("Payment total not computable: {}", e)),
            }
        }

        issues
    }
}

/// An order as persisted by a store, with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredOrder {
    pub order: Order,

    /// Account the order was scraped for.
    pub user: String,

    /// Invoice URL the order was parsed from.
    pub source_url: String,

    pub saved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn money(text: &str) -> Money {
        Money::parse(text).unwrap()
    }

    fn sample_order() -> Order {
        Order {
            id: "002-7394758-9918293".to_string(),
            currency: "$".to_string(),
            date: NaiveDate::from_ymd_opt(1998, 11, 5).unwrap(),
            placed_by: None,
            subtotal: money("$16.00"),
            tax: money("$0.00"),
            shipping_cost: None,
            total: money("$16.00"),
            shipments: vec![Shipment {
                date: None,
                shipping_address: None,
                items: vec![OrderItem {
                    name: "Brave New World".to_string(),
                    price: money("$8.00"),
                    quantity: 2,
                }],
            }],
            payments: vec![Payment::CreditCard {
                card_type: "Visa".to_string(),
                last4: "1234".to_string(),
                date: NaiveDate::from_ymd_opt(1998, 11, 6).unwrap(),
                amount: money("$16.00"),
            }],
        }
    }

    #[test]
    fn test_validate_consistent_order() {
        let order = sample_order();
        assert!(order.validate().is_empty());
        assert_eq!(order.item_count(), 2);
    }

    #[test]
    fn test_validate_reports_subtotal_mismatch() {
        let mut order = sample_order();
        order.subtotal = money("$20.00");
        let issues = order.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("subtotal"));
    }

    #[test]
    fn test_validate_survives_overflowing_line_total() {
        let mut order = sample_order();
        order.shipments[0].items = vec![OrderItem {
            name: "Yacht".to_string(),
            price: money("$50,000,000,000,000,000.00"),
            quantity: 3,
        }];
        let issues = order.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("out of range"), "{}", issues[0]);
        assert_eq!(order.items().next().unwrap().line_total().cents, i64::MAX);
    }

    #[test]
    fn test_payment_serializes_with_type_tag() {
        let order = sample_order();
        let json = serde_json::to_value(&order.payments[0]).unwrap();
        assert_eq!(json["type"], "credit_card");
        assert_eq!(json["last4"], "1234");
        assert_eq!(json["date"], "1998-11-06");
    }

    #[test]
    fn test_order_json_round_trip() {
        let order = sample_order();
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }

    #[test]
    fn test_address_format() {
        let addr = ShippingAddress {
            name: "Jane Doe".to_string(),
            address: "1 Main St".to_string(),
            city: "Seattle".to_string(),
            state: "WA".to_string(),
            zip: "98101".to_string(),
            country: "United States".to_string(),
        };
        assert_eq!(addr.format(), "Jane Doe, 1 Main St, Seattle WA 98101, United States");
        assert!(!addr.is_undisclosed());
        assert!(ShippingAddress::default().is_undisclosed());
    }
}
