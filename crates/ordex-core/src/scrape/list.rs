//! Order list page parsing.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::invoice::dates::parse_date;

lazy_static! {
    static ref YEAR_FILTER: Selector = Selector::parse(
        r#"select[name="timeFilter"], select[name="orderFilter"], #time-filter, form#timePeriodForm"#
    ).unwrap();

    static ref SIGN_IN: Selector = Selector::parse(
        r#"form[name="signIn"], #ap_email, #ap_password, form[action*="captcha"]"#
    ).unwrap();

    static ref ORDER_CARD: Selector = Selector::parse(
        ".order-card, .js-order-card, div.order"
    ).unwrap();

    static ref INVOICE_LINK: Selector = Selector::parse(
        r#"a[href*="print.html"], a[href*="invoice"]"#
    ).unwrap();

    static ref NEXT_PAGE: Selector = Selector::parse(
        r#"ul.a-pagination li.a-last a[href], a[rel="next"][href]"#
    ).unwrap();

    static ref ORDER_ID_TEXT: Regex = Regex::new(
        r"\b([0-9A-Z]{3}-\d{7}-\d{7})\b"
    ).unwrap();
}

/// One order as listed on an order list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCard {
    pub id: String,
    pub date: Option<NaiveDate>,
    /// Link as written in the markup; may be relative.
    pub invoice_href: Option<String>,
}

/// A parsed order list page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderListPage {
    /// Orders in markup order.
    pub orders: Vec<OrderCard>,
    /// Link to the following page; may be relative.
    pub next_href: Option<String>,
}

/// Parse an order list page.
///
/// Returns `None` when the year filter control is missing, which means the
/// site served something other than the order list (usually a sign-in wall).
pub fn parse_order_list(html: &str) -> Option<OrderListPage> {
    let document = Html::parse_document(html);
    if document.select(&YEAR_FILTER).next().is_none() {
        return None;
    }

    let mut page = OrderListPage::default();
    for card in document.select(&ORDER_CARD) {
        if let Some(order) = parse_card(card) {
            if !page.orders.iter().any(|o| o.id == order.id) {
                page.orders.push(order);
            }
        }
    }

    page.next_href = document
        .select(&NEXT_PAGE)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);

    Some(page)
}

fn parse_card(card: ElementRef<'_>) -> Option<OrderCard> {
    let text = card.text().collect::<Vec<_>>().join(" ");
    let id = ORDER_ID_TEXT.captures(&text)?[1].to_string();
    let date = parse_date(&text);
    let invoice_href = card
        .select(&INVOICE_LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);
    Some(OrderCard {
        id,
        date,
        invoice_href,
    })
}

/// Whether `html` is a sign-in or verification page.
pub fn is_sign_in_page(html: &str) -> bool {
    let document = Html::parse_document(html);
    document.select(&SIGN_IN).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LIST_PAGE: &str = r#"<html><body>
<form id="timePeriodForm"><select name="timeFilter"><option>2020</option></select></form>
<div class="order-card">
  <span>ORDER PLACED</span> <span>November 5, 2020</span>
  <span>ORDER # 112-1234567-7654321</span>
  <a href="/gp/css/summary/print.html?orderID=112-1234567-7654321">Invoice</a>
</div>
<div class="order-card">
  <span>ORDER PLACED</span> <span>March 2, 2020</span>
  <span>ORDER # 112-7654321-1234567</span>
</div>
<ul class="a-pagination"><li class="a-last"><a href="/your-orders/orders?startIndex=10">Next</a></li></ul>
</body></html>"#;

    #[test]
    fn test_parse_order_list() {
        let page = parse_order_list(LIST_PAGE).unwrap();
        assert_eq!(
            page.orders,
            vec![
                OrderCard {
                    id: "112-1234567-7654321".to_string(),
                    date: NaiveDate::from_ymd_opt(2020, 11, 5),
                    invoice_href: Some(
                        "/gp/css/summary/print.html?orderID=112-1234567-7654321".to_string()
                    ),
                },
                OrderCard {
                    id: "112-7654321-1234567".to_string(),
                    date: NaiveDate::from_ymd_opt(2020, 3, 2),
                    invoice_href: None,
                },
            ]
        );
        assert_eq!(
            page.next_href.as_deref(),
            Some("/your-orders/orders?startIndex=10")
        );
    }

    #[test]
    fn test_missing_year_filter() {
        let html = r#"<html><body><div class="order-card">ORDER # 112-1234567-7654321</div></body></html>"#;
        assert_eq!(parse_order_list(html), None);
    }

    #[test]
    fn test_last_page_has_no_next() {
        let html = r#"<select name="timeFilter"></select><ul class="a-pagination"><li class="a-disabled a-last">Next</li></ul>"#;
        let page = parse_order_list(html).unwrap();
        assert!(page.orders.is_empty());
        assert_eq!(page.next_href, None);
    }

    #[test]
    fn test_sign_in_detection() {
        assert!(is_sign_in_page(
            r#"<form name="signIn"><input id="ap_email"></form>"#
        ));
        assert!(!is_sign_in_page(LIST_PAGE));
    }
}
