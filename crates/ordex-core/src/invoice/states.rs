//! Parser states and their rule tables.
//!
//! Three page layouts are recognised, each with its own sub-graph:
//!
//! - standard online orders: `Unknown`, `Items`, `Item`, `Shipping`,
//!   `Payments`
//! - grocery orders (delivery or store pickup): `Groceries`,
//!   `GroceryItems`, `GroceryPayments`
//! - gift-card-only orders: `GiftCardOrder`
//!
//! Tables are built once on first use. Summary lines (subtotal, tax,
//! totals) are recognised from several states, so they live in shared
//! groups that each table appends.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::error::BuildError;
use crate::models::money::Money;

use super::builder::{Field, OrderBuilder};
use super::dates::canonical_date;
use super::engine::{Handler, Hit, Rule};
use super::patterns::*;
use super::Result;

/// Named parser states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Unknown,
    Items,
    Item,
    Shipping,
    Payments,
    Groceries,
    GroceryItems,
    GroceryPayments,
    GiftCardOrder,
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Unknown => "unknown",
            State::Items => "items",
            State::Item => "item",
            State::Shipping => "shipping",
            State::Payments => "payments",
            State::Groceries => "groceries",
            State::GroceryItems => "grocery_items",
            State::GroceryPayments => "grocery_payments",
            State::GiftCardOrder => "gift_card_order",
        }
    }

    /// Rule table for this state, evaluated first match wins.
    pub fn rules(&self) -> &'static [Rule] {
        match self {
            State::Unknown => &UNKNOWN_RULES,
            State::Items => &ITEMS_RULES,
            State::Item => &ITEM_RULES,
            State::Shipping => &SHIPPING_RULES,
            State::Payments => &PAYMENTS_RULES,
            State::Groceries => &GROCERIES_RULES,
            State::GroceryItems => &GROCERY_ITEMS_RULES,
            State::GroceryPayments => &GROCERY_PAYMENTS_RULES,
            State::GiftCardOrder => &GIFT_CARD_ORDER_RULES,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn pattern(regex: &'static Regex, handler: Handler) -> Rule {
    Rule::Pattern { regex, handler }
}

lazy_static! {
    static ref UNKNOWN_RULES: Vec<Rule> = {
        let mut rules = vec![
            pattern(&SHIPPED_ON, shipment_dated),
        ];
        rules.extend(header_rules());
        rules.extend(classic_rules());
        rules
    };

    static ref ITEMS_RULES: Vec<Rule> = {
        let mut rules = vec![
            pattern(&QUANTITY_OF, start_item),
        ];
        rules.extend(header_rules());
        rules.extend(classic_rules());
        rules
    };

    static ref ITEM_RULES: Vec<Rule> = {
        let mut rules = vec![
            pattern(&BARE_AMOUNT, item_priced),
            pattern(&UNIT_PRICE, item_priced),
            pattern(&QUANTITY_OF, start_item),
            pattern(&ITEM_DETAIL, ignore),
        ];
        rules.extend(header_rules());
        rules.extend(classic_rules());
        rules
    };

    static ref SHIPPING_RULES: Vec<Rule> = {
        let mut rules = vec![
            pattern(&ADDRESS_WITHHELD, address_withheld),
            pattern(&CITY_STATE_ZIP, locality),
            pattern(&SHIPPED_ON, shipped),
            pattern(&SHIPPING_SPEED, leave_shipping),
            pattern(&PAYMENT_HEADING, to_payments),
            pattern(&QUANTITY_OF, start_item),
            pattern(&BARE_AMOUNT, leave_shipping),
        ];
        rules.extend(header_rules());
        rules.extend(classic_rules());
        rules.push(Rule::Fallthrough { handler: address_line });
        rules
    };

    static ref PAYMENTS_RULES: Vec<Rule> = {
        let mut rules = vec![
            pattern(&CARD_PAYMENT, card_payment),
            pattern(&CASH_PAYMENT, cash_payment),
        ];
        rules.extend(header_rules());
        rules.extend(classic_rules());
        rules
    };

    static ref GROCERIES_RULES: Vec<Rule> = {
        let mut rules = vec![
            pattern(&GROCERY_ORDER, ignore),
            pattern(&ITEMS_ORDERED, to_grocery_items),
            pattern(&QUANTITY_OF, start_grocery_item),
            pattern(&CARD_TRANSACTIONS, to_grocery_payments),
        ];
        rules.extend(header_rules());
        rules.extend(grocery_shared_rules());
        rules.extend(summary_rules_staying());
        rules
    };

    static ref GROCERY_ITEMS_RULES: Vec<Rule> = {
        let mut rules = vec![
            Rule::Literal { value: "Items Ordered", handler: ignore },
            pattern(&QUANTITY_OF, start_grocery_item),
            pattern(&QUANTITY, grocery_quantity),
            pattern(&UNIT_PRICE, grocery_price),
            pattern(&ITEM_DETAIL, ignore),
            pattern(&CARD_TRANSACTIONS, to_grocery_payments),
        ];
        rules.extend(header_rules());
        rules.extend(grocery_shared_rules());
        rules.extend(summary_rules_to_groceries());
        rules.push(Rule::Fallthrough { handler: grocery_item_name });
        rules
    };

    static ref GROCERY_PAYMENTS_RULES: Vec<Rule> = {
        let mut rules = vec![
            pattern(&CARD_PAYMENT, card_payment),
            pattern(&CASH_PAYMENT, cash_payment),
        ];
        rules.extend(header_rules());
        rules.extend(grocery_shared_rules());
        rules.extend(summary_rules_staying());
        rules
    };

    static ref GIFT_CARD_ORDER_RULES: Vec<Rule> = {
        let mut rules = vec![
            pattern(&GIFT_CARD_ORDER, ignore),
            pattern(&GIFT_CARD_ITEM, gift_card_item),
            pattern(&GIFT_CARD_VALUE, gift_card_value),
            pattern(&QUANTITY_OF, start_gift_card_item),
            pattern(&CARD_PAYMENT, card_payment),
            pattern(&CARD_ON_FILE, card_on_file),
            pattern(&SUBTOTAL, subtotal_stay),
            pattern(&TOTAL, total_stay),
            pattern(&GIFT_CARD_AMOUNT, gift_card_stay),
            pattern(&PROMOTION, ignore),
        ];
        rules.extend(header_rules());
        rules
    };
}

/// Order id, placed-by and order date, recognised everywhere.
fn header_rules() -> Vec<Rule> {
    vec![
        pattern(&ORDER_ID, order_id),
        pattern(&PLACED_BY, placed_by),
        pattern(&ORDER_PLACED, order_date),
    ]
}

/// Summary lines and section markers of the standard layout.
fn classic_rules() -> Vec<Rule> {
    vec![
        pattern(&TOTAL_BEFORE_TAX, to_unknown),
        pattern(&SUBTOTAL, subtotal_then_unknown),
        pattern(&SHIPPING_COST, shipping_cost_then_unknown),
        pattern(&TAX, tax_then_unknown),
        pattern(&TOTAL, total_then_unknown),
        pattern(&GIFT_CARD_AMOUNT, gift_card_then_unknown),
        pattern(&TOTAL_SAVINGS, savings_then_unknown),
        pattern(&PROMOTION, to_unknown),
        pattern(&ITEMS_ORDERED, to_items),
        pattern(&CARD_TRANSACTIONS, to_payments),
        pattern(&SHIPPING_ADDRESS, start_address),
        pattern(&NOT_YET_SHIPPED, not_yet_shipped),
        pattern(&GROCERY_ORDER, enter_groceries),
        pattern(&GIFT_CARD_ORDER, enter_gift_card_order),
    ]
}

/// Delivery and payment lines shared by the grocery states.
fn grocery_shared_rules() -> Vec<Rule> {
    vec![
        pattern(&DELIVERED, delivered),
        pattern(&STORE_PICKUP, ignore),
        pattern(&CARD_ON_FILE, card_on_file_then_grocery_payments),
    ]
}

fn summary_rules_staying() -> Vec<Rule> {
    vec![
        pattern(&TOTAL_BEFORE_TAX, ignore),
        pattern(&SUBTOTAL, subtotal_stay),
        pattern(&SHIPPING_COST, shipping_cost_stay),
        pattern(&TAX, tax_stay),
        pattern(&TOTAL, total_stay),
        pattern(&GIFT_CARD_AMOUNT, gift_card_stay),
        pattern(&TOTAL_SAVINGS, savings_stay),
        pattern(&PROMOTION, ignore),
    ]
}

fn summary_rules_to_groceries() -> Vec<Rule> {
    vec![
        pattern(&TOTAL_BEFORE_TAX, to_groceries),
        pattern(&SUBTOTAL, subtotal_then_groceries),
        pattern(&SHIPPING_COST, shipping_cost_then_groceries),
        pattern(&TAX, tax_then_groceries),
        pattern(&TOTAL, total_then_groceries),
        pattern(&GIFT_CARD_AMOUNT, gift_card_then_groceries),
        pattern(&TOTAL_SAVINGS, savings_then_groceries),
        pattern(&PROMOTION, to_groceries),
    ]
}

// ---- capture helpers ----

fn amount(hit: &Hit<'_>) -> Result<Money> {
    Ok(Money::parse(hit.named("amount").unwrap_or(hit.token))?)
}

fn required_date(hit: &Hit<'_>) -> Result<String> {
    let text = hit.named("date").unwrap_or(hit.token);
    canonical_date(text).ok_or_else(|| BuildError::InvalidDate(text.to_string()))
}

fn quantity(hit: &Hit<'_>) -> Result<u32> {
    let text = hit.named("qty").unwrap_or_default();
    text.parse()
        .map_err(|_| BuildError::InvalidQuantity(text.to_string()))
}

fn record_subtotal(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<()> {
    b.set_subtotal(amount(hit)?)?;
    Ok(())
}

fn record_shipping_cost(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<()> {
    b.set_shipping_cost(amount(hit)?)?;
    Ok(())
}

fn record_tax(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<()> {
    b.set_tax(amount(hit)?)?;
    Ok(())
}

fn record_total(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<()> {
    b.set_total(amount(hit)?)?;
    Ok(())
}

/// A gift card deduction is a payment; the displayed total excludes it.
fn record_gift_card(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<()> {
    let amount = amount(hit)?;
    if amount.is_zero() {
        return Ok(());
    }
    b.add_gift_card_payment(amount, None)?;
    b.gift_card_adjusts_total();
    Ok(())
}

fn record_savings(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<()> {
    b.add_savings(amount(hit)?)?;
    Ok(())
}

/// Define a handler that records a capture and then moves to `$next`.
macro_rules! then {
    ($name:ident, $record:ident, $next:expr) => {
        fn $name(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
            $record(hit, b)?;
            Ok($next)
        }
    };
}

then!(subtotal_then_unknown, record_subtotal, Some(State::Unknown));
then!(shipping_cost_then_unknown, record_shipping_cost, Some(State::Unknown));
then!(tax_then_unknown, record_tax, Some(State::Unknown));
then!(total_then_unknown, record_total, Some(State::Unknown));
then!(gift_card_then_unknown, record_gift_card, Some(State::Unknown));
then!(savings_then_unknown, record_savings, Some(State::Unknown));

then!(subtotal_then_groceries, record_subtotal, Some(State::Groceries));
then!(shipping_cost_then_groceries, record_shipping_cost, Some(State::Groceries));
then!(tax_then_groceries, record_tax, Some(State::Groceries));
then!(total_then_groceries, record_total, Some(State::Groceries));
then!(gift_card_then_groceries, record_gift_card, Some(State::Groceries));
then!(savings_then_groceries, record_savings, Some(State::Groceries));

then!(subtotal_stay, record_subtotal, None);
then!(shipping_cost_stay, record_shipping_cost, None);
then!(tax_stay, record_tax, None);
then!(total_stay, record_total, None);
then!(gift_card_stay, record_gift_card, None);
then!(savings_stay, record_savings, None);

// ---- header ----

fn order_id(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    if let Some(id) = hit.named("id") {
        b.set_id(id)?;
    }
    Ok(None)
}

fn placed_by(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    if let Some(name) = hit.named("name").filter(|n| !n.is_empty()) {
        b.set_placed_by(name)?;
    }
    Ok(None)
}

fn order_date(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    match hit.named("date").and_then(canonical_date) {
        Some(date) => {
            b.set_date(&date)?;
        }
        None => debug!("order date line without a date: {:?}", hit.token),
    }
    Ok(None)
}

// ---- transitions without side effects ----

fn ignore(_hit: &Hit<'_>, _b: &mut OrderBuilder) -> Result<Option<State>> {
    Ok(None)
}

fn to_unknown(_hit: &Hit<'_>, _b: &mut OrderBuilder) -> Result<Option<State>> {
    Ok(Some(State::Unknown))
}

fn to_groceries(_hit: &Hit<'_>, _b: &mut OrderBuilder) -> Result<Option<State>> {
    Ok(Some(State::Groceries))
}

/// A new item list after a shipment's items and address starts the next
/// shipment.
fn to_items(_hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    if b.has_shipping_address() && b.shipment_has_items() {
        b.finalize_shipment();
    }
    b.finalize_item();
    Ok(Some(State::Items))
}

fn to_payments(_hit: &Hit<'_>, _b: &mut OrderBuilder) -> Result<Option<State>> {
    Ok(Some(State::Payments))
}

fn to_grocery_items(_hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.finalize_item();
    Ok(Some(State::GroceryItems))
}

fn to_grocery_payments(_hit: &Hit<'_>, _b: &mut OrderBuilder) -> Result<Option<State>> {
    Ok(Some(State::GroceryPayments))
}

fn enter_groceries(_hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.assume_payment_covers_total();
    Ok(Some(State::Groceries))
}

fn enter_gift_card_order(_hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.infer_tax()?;
    b.assume_payment_covers_total();
    Ok(Some(State::GiftCardOrder))
}

// ---- items ----

fn start_item(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.finalize_item();
    b.set_item_quantity(quantity(hit)?)?;
    if let Some(name) = hit.named("name") {
        b.set_item_name(name)?;
    }
    Ok(Some(State::Item))
}

fn item_priced(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.set_item_price(amount(hit)?)?;
    b.finalize_item();
    Ok(Some(State::Items))
}

// ---- shipping ----

/// Each address block belongs to its own shipment.
fn start_address(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    if b.has_shipping_address() {
        b.finalize_shipment();
    }
    if let Some(name) = hit.named("name").filter(|n| !n.is_empty()) {
        b.set_shipping_name(name)?;
    }
    Ok(Some(State::Shipping))
}

fn address_withheld(_hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.mark_address_undisclosed();
    Ok(None)
}

fn locality(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    let city = hit.named("city").unwrap_or_default();
    let state = hit.named("state").unwrap_or_default();
    let zip = hit.named("zip").unwrap_or_default();
    b.set_shipping_locality(city, state, zip)?;
    Ok(None)
}

fn address_line(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.fill_next_address_field(hit.token)?;
    Ok(None)
}

/// `Shipped on` closing a shipment's address block.
fn shipped(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.set_shipment_date(&required_date(hit)?)?;
    b.finalize_shipment();
    Ok(Some(State::Unknown))
}

/// `Shipped on` outside an address block dates the current shipment.
fn shipment_dated(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.set_shipment_date(&required_date(hit)?)?;
    Ok(None)
}

fn leave_shipping(_hit: &Hit<'_>, _b: &mut OrderBuilder) -> Result<Option<State>> {
    Ok(Some(State::Unknown))
}

fn not_yet_shipped(_hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.finalize_shipment();
    Ok(Some(State::Unknown))
}

// ---- payments ----

fn card_payment(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    let card = hit.named("card").unwrap_or_default();
    let last4 = hit.named("last4").unwrap_or_default();
    let date = required_date(hit)?;
    b.add_credit_card_payment(card, last4, Some(&date), Some(amount(hit)?))?;
    Ok(None)
}

/// Card named without an amount; it covers whatever the total leaves.
fn card_on_file(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    let card = hit.named("card").unwrap_or_default();
    let last4 = hit.named("last4").unwrap_or_default();
    b.add_credit_card_payment(card, last4, None, None)?;
    Ok(None)
}

fn card_on_file_then_grocery_payments(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    card_on_file(hit, b)?;
    Ok(Some(State::GroceryPayments))
}

fn cash_payment(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.add_cash_payment(amount(hit)?, None)?;
    Ok(None)
}

// ---- groceries ----

fn delivered(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.set_shipment_date(&required_date(hit)?)?;
    Ok(None)
}

fn start_grocery_item(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    start_item(hit, b)?;
    Ok(Some(State::GroceryItems))
}

fn grocery_item_name(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.set_item_name(hit.token)?;
    Ok(None)
}

fn grocery_quantity(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    if !b.has_open_item() {
        return Err(BuildError::NoCurrentItem(Field::ItemQuantity));
    }
    b.set_item_quantity(quantity(hit)?)?;
    Ok(None)
}

fn grocery_price(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    if !b.has_open_item() {
        return Err(BuildError::NoCurrentItem(Field::ItemPrice));
    }
    b.set_item_price(amount(hit)?)?;
    b.finalize_item();
    Ok(None)
}

// ---- gift-card-only orders ----

fn gift_card_item(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    b.finalize_item();
    b.set_item_name(hit.named("name").unwrap_or(hit.token))?;
    b.set_item_quantity(1)?;
    Ok(None)
}

fn start_gift_card_item(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    start_item(hit, b)?;
    Ok(None)
}

fn gift_card_value(hit: &Hit<'_>, b: &mut OrderBuilder) -> Result<Option<State>> {
    if !b.has_open_item() {
        return Err(BuildError::NoCurrentItem(Field::ItemPrice));
    }
    b.set_item_price(amount(hit)?)?;
    b.finalize_item();
    Ok(None)
}
