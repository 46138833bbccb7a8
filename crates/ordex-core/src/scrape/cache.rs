//! Cache keys and the staleness policy.

use chrono::NaiveDate;

/// Bumped when the cached page format changes.
pub const CACHE_VERSION: &str = "v1";

/// Versioned, user-scoped, URL-qualified cache key.
pub fn cache_key(user: &str, url: &str) -> String {
    format!("{}:user:{}:url:{}", CACHE_VERSION, user, url)
}

/// Invoice pages are immutable once the order is old enough.
pub fn invoice_cacheable(order_date: NaiveDate, today: NaiveDate, min_age_days: i64) -> bool {
    (today - order_date).num_days() >= min_age_days
}

/// Whether a cached order list page may be reused without a live fetch.
///
/// Past years never change. A current-year page is reused only when every
/// invoice it links to is already cached; a new order would appear as an
/// uncached link.
pub fn list_page_trusted<'a, I, F, E>(
    year: i32,
    current_year: i32,
    invoice_urls: I,
    mut is_cached: F,
) -> Result<bool, E>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&str) -> Result<bool, E>,
{
    if year < current_year {
        return Ok(true);
    }
    for url in invoice_urls {
        if !is_cached(url)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        assert_eq!(
            cache_key("alice", "https://example.test/orders?year=2020"),
            "v1:user:alice:url:https://example.test/orders?year=2020"
        );
    }

    #[test]
    fn test_invoice_cacheable() {
        let today = NaiveDate::from_ymd_opt(2021, 4, 1).unwrap();
        let old = NaiveDate::from_ymd_opt(2020, 12, 1).unwrap();
        let recent = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        assert!(invoice_cacheable(old, today, 90));
        assert!(!invoice_cacheable(recent, today, 90));
        assert!(invoice_cacheable(today, today, 0));
    }

    #[test]
    fn test_past_year_always_trusted() {
        assert_eq!(list_page_trusted(2019, 2021, ["a", "b"], |_| Err("unused")), Ok(true));
    }

    #[test]
    fn test_current_year_needs_every_invoice() {
        let cached = ["a", "b"];
        let lookup = |u: &str| Ok::<_, ()>(cached.contains(&u));
        assert_eq!(list_page_trusted(2021, 2021, ["a", "b"], lookup), Ok(true));
        assert_eq!(list_page_trusted(2021, 2021, ["a", "c"], lookup), Ok(false));
    }

    #[test]
    fn test_lookup_error_is_returned() {
        let lookup = |u: &str| if u == "b" { Err("disk") } else { Ok(true) };
        assert_eq!(list_page_trusted(2021, 2021, ["a", "b"], lookup), Err("disk"));
    }
}
