//! Token patterns recognised by the invoice state machine.

use lazy_static::lazy_static;
use regex::Regex;

/// A monetary amount inside a larger pattern, captured as `amount`.
const AMOUNT: &str = r"(?P<amount>\(?-?\s*(?:[$£€¥]|(?:USD|GBP|EUR|CAD|AUD)\s?)?\s*-?\d[\d,]*(?:\.\d{1,2})?\)?)";

/// An item price: either carries a currency or has exactly two decimals.
const PRICE: &str = r"(?P<amount>\(?-?\s*(?:[$£€¥]|(?:USD|GBP|EUR|CAD|AUD)\s?)\s*-?\d[\d,]*(?:\.\d{1,2})?\)?|-?\d[\d,]*\.\d{2})";

/// A long-form date such as `November 5, 1998`, captured as `date`.
const DATE: &str = r"(?P<date>[A-Za-z]{3,9}\.?\s+\d{1,2},\s+\d{4})";

fn with_amount(pattern: &str) -> Regex {
    let pattern = pattern
        .replace("{AMOUNT}", AMOUNT)
        .replace("{PRICE}", PRICE)
        .replace("{DATE}", DATE);
    Regex::new(&pattern).unwrap()
}

lazy_static! {
    // Order header
    pub static ref ORDER_ID: Regex = Regex::new(
        r"(?i)^(?:[\w.]+\s+)?order\s*(?:number|#)\s*:?\s*(?P<id>[0-9A-Z]{3}-\d{7}-\d{7})$"
    ).unwrap();

    pub static ref PLACED_BY: Regex = Regex::new(
        r"(?i)^(?:ordered|(?:order\s+)?placed)\s+by:?\s*(?P<name>.+)$"
    ).unwrap();

    pub static ref ORDER_PLACED: Regex = Regex::new(
        r"(?i)^(?:order\s+placed|placed\s+on|order\s+date):?\s*(?P<date>.+)$"
    ).unwrap();

    // Summary lines
    pub static ref SUBTOTAL: Regex = with_amount(
        r"(?i)^item(?:\(s\)|s)?\s+subtotal:?\s*{AMOUNT}$"
    );

    pub static ref SHIPPING_COST: Regex = with_amount(
        r"(?i)^(?:shipping\s*(?:&|and)\s*handling|delivery\s+fee):?\s*{AMOUNT}$"
    );

    pub static ref TAX: Regex = with_amount(
        r"(?i)^(?:estimated\s+tax(?:\s+to\s+be\s+collected)?|sales\s+tax|tax\s+collected|tax)(?:\s*\([^)]*\))?:?\s*{AMOUNT}$"
    );

    pub static ref TOTAL: Regex = with_amount(
        r"(?i)^(?:order\s+total|grand\s+total|total\s+for\s+this\s+order):?\s*{AMOUNT}$"
    );

    pub static ref TOTAL_BEFORE_TAX: Regex = with_amount(
        r"(?i)^total\s+before\s+tax:?\s*{AMOUNT}$"
    );

    pub static ref GIFT_CARD_AMOUNT: Regex = with_amount(
        r"(?i)^gift\s+card\s+amount:?\s*{AMOUNT}$"
    );

    pub static ref PROMOTION: Regex = with_amount(
        r"(?i)^(?:promotions?\s+applied|promotional\s+certificate|free\s+shipping|service\s+fee|(?:driver\s+)?tip):?\s*{AMOUNT}$"
    );

    pub static ref TOTAL_SAVINGS: Regex = with_amount(
        r"(?i)^(?:total\s+)?savings:?\s*{AMOUNT}$"
    );

    // Section markers
    pub static ref ITEMS_ORDERED: Regex = Regex::new(
        r"(?i)^items\s+ordered(?:\s+price)?$"
    ).unwrap();

    pub static ref PAYMENT_HEADING: Regex = Regex::new(
        r"(?i)^payment\s+(?:information|methods?):?$"
    ).unwrap();

    pub static ref CARD_TRANSACTIONS: Regex = Regex::new(
        r"(?i)^credit\s+card\s+transactions:?$"
    ).unwrap();

    pub static ref GROCERY_ORDER: Regex = Regex::new(
        r"(?i)^(?:amazon\s+fresh|whole\s+foods\s+market|grocery)\s+order(?:\s+details)?$"
    ).unwrap();

    pub static ref GIFT_CARD_ORDER: Regex = Regex::new(
        r"(?i)^e?-?gift\s+card\s+order(?:\s+details)?$"
    ).unwrap();

    // Items
    pub static ref QUANTITY_OF: Regex = Regex::new(
        r"^(?P<qty>\d+)\s+of:\s*(?P<name>.+)$"
    ).unwrap();

    pub static ref BARE_AMOUNT: Regex = with_amount(r"^{PRICE}$");

    pub static ref UNIT_PRICE: Regex = with_amount(
        r"(?i)^{PRICE}(?:\s*(?:each|/\s*ea(?:ch)?))?$"
    );

    pub static ref QUANTITY: Regex = Regex::new(
        r"(?i)^(?:qty|quantity):?\s*(?P<qty>\d+)$"
    ).unwrap();

    pub static ref ITEM_DETAIL: Regex = Regex::new(
        r"(?i)^(?:sold\s+by|condition|supplied\s+by|weight|business\s+price):?"
    ).unwrap();

    pub static ref GIFT_CARD_ITEM: Regex = Regex::new(
        r"(?i)^(?P<name>.*gift\s*card)$"
    ).unwrap();

    pub static ref GIFT_CARD_VALUE: Regex = with_amount(
        r"(?i)^(?:amount|value):?\s*{AMOUNT}$"
    );

    // Shipping
    pub static ref SHIPPING_ADDRESS: Regex = Regex::new(
        r"(?i)^shipping\s+address:?\s*(?P<name>.*)$"
    ).unwrap();

    pub static ref ADDRESS_WITHHELD: Regex = Regex::new(
        r"(?i)^(?:address\s+(?:withheld|not\s+shown)|gift\s+registry\s+address|ship\s+to\s+registry)"
    ).unwrap();

    pub static ref CITY_STATE_ZIP: Regex = Regex::new(
        r"^(?P<city>[^,]+),\s*(?P<state>[A-Za-z][A-Za-z .]*?)\s+(?P<zip>\d{5}(?:-\d{4})?)$"
    ).unwrap();

    pub static ref SHIPPED_ON: Regex = Regex::new(
        r"(?i)^shipped\s+on:?\s*(?P<date>.+)$"
    ).unwrap();

    pub static ref NOT_YET_SHIPPED: Regex = Regex::new(
        r"(?i)^(?:not\s+yet\s+shipped|preparing\s+for\s+shipment)$"
    ).unwrap();

    pub static ref SHIPPING_SPEED: Regex = Regex::new(
        r"(?i)^shipping\s+(?:speed|method):?"
    ).unwrap();

    pub static ref DELIVERED: Regex = with_amount(
        r"(?i)^(?:picked\s+up|delivered)\s+(?:on\s+)?{DATE}$"
    );

    pub static ref STORE_PICKUP: Regex = Regex::new(
        r"(?i)^(?:store\s+)?pickup(?:\s+order)?$"
    ).unwrap();

    // Payments
    pub static ref CARD_PAYMENT: Regex = with_amount(
        r"(?i)^(?P<card>[A-Za-z][A-Za-z .]*?)\s+ending\s+in\s+(?P<last4>\d{4}):\s*{DATE}:\s*{AMOUNT}$"
    );

    pub static ref CARD_ON_FILE: Regex = Regex::new(
        r"(?i)^(?:payment\s+method:?\s*)?(?P<card>[A-Za-z][A-Za-z .]*?)\s+ending\s+in\s+(?P<last4>\d{4})$"
    ).unwrap();

    pub static ref CASH_PAYMENT: Regex = with_amount(
        r"(?i)^(?:cash|pay\s+on\s+delivery):?\s*{AMOUNT}$"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_variants() {
        for token in [
            "Amazon.com order number: 002-7394758-9918293",
            "Order #: 112-1234567-7654321",
            "Order# 112-1234567-7654321",
            "Order number 112-1234567-7654321",
        ] {
            assert!(ORDER_ID.is_match(token), "{token}");
        }
        assert!(!ORDER_ID.is_match("Order Total: $96.33"));
    }

    #[test]
    fn test_summary_patterns_capture_amount() {
        let caps = SUBTOTAL.captures("Item(s) Subtotal: $77.15").unwrap();
        assert_eq!(&caps["amount"], "$77.15");
        let caps = TAX.captures("Estimated tax to be collected: $7.63").unwrap();
        assert_eq!(&caps["amount"], "$7.63");
        let caps = GIFT_CARD_AMOUNT.captures("Gift Card Amount: -$18.46").unwrap();
        assert_eq!(&caps["amount"], "-$18.46");
        assert!(TOTAL.is_match("Grand Total: $0.00"));
        assert!(!TOTAL.is_match("Total before tax: $10.00"));
        assert!(TOTAL_BEFORE_TAX.is_match("Total before tax: $10.00"));
    }

    #[test]
    fn test_card_payment_line() {
        let caps = CARD_PAYMENT
            .captures("Visa ending in 1234: November 6, 1998: $96.33")
            .unwrap();
        assert_eq!(&caps["card"], "Visa");
        assert_eq!(&caps["last4"], "1234");
        assert_eq!(&caps["date"], "November 6, 1998");
        assert_eq!(&caps["amount"], "$96.33");

        let caps = CARD_PAYMENT
            .captures("American Express ending in 9999: Jan. 2, 2020: $5.00")
            .unwrap();
        assert_eq!(&caps["card"], "American Express");
    }

    #[test]
    fn test_city_state_zip() {
        let caps = CITY_STATE_ZIP.captures("SEATTLE, WA 98101-1234").unwrap();
        assert_eq!(&caps["city"], "SEATTLE");
        assert_eq!(&caps["state"], "WA");
        assert_eq!(&caps["zip"], "98101-1234");
        assert!(CITY_STATE_ZIP.is_match("New York, New York 10001"));
        assert!(!CITY_STATE_ZIP.is_match("123 Main St"));
    }

    #[test]
    fn test_bare_amount() {
        assert!(BARE_AMOUNT.is_match("$8.00"));
        assert!(BARE_AMOUNT.is_match("$1,299.99"));
        assert!(!BARE_AMOUNT.is_match("1 of: Book"));
        assert!(!BARE_AMOUNT.is_match("Order Total: $1.00"));
        assert!(!BARE_AMOUNT.is_match("2021"));
        assert!(BARE_AMOUNT.is_match("12.99"));
        assert!(UNIT_PRICE.is_match("$2.99 each"));
    }

    #[test]
    fn test_payment_heading() {
        assert!(PAYMENT_HEADING.is_match("Payment information"));
        assert!(PAYMENT_HEADING.is_match("Payment Method:"));
        assert!(!PAYMENT_HEADING.is_match("Payment Method: Mastercard ending in 5555"));
    }
}
