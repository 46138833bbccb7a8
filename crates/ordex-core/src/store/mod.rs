//! Page cache and order persistence.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::cmp::Ordering;

use crate::error::StoreError;
use crate::models::order::{Order, StoredOrder};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Cache and order store used by the scrape orchestrator.
///
/// Cache keys are opaque to the store. Access is sequential from a single
/// orchestrator, so implementations need no locking.
pub trait OrderStore {
    /// Cached content for `key`, if any.
    fn check_cache(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace cached content.
    fn update_cache(&mut self, key: &str, content: &str) -> Result<()>;

    /// Drop a cache entry. Removing a missing key is not an error.
    fn remove_cache(&mut self, key: &str) -> Result<()>;

    /// Persist a parsed order together with the page it came from.
    fn save_order(
        &mut self,
        order: &Order,
        user: &str,
        source_url: &str,
        raw_content: &str,
    ) -> Result<()>;

    /// Stored orders, newest first, ties broken by id.
    fn get_orders(&self) -> Result<Vec<Order>>;

    /// Raw invoice page saved with an order.
    fn get_invoice_html(&self, order_id: &str) -> Result<Option<String>>;
}

/// Newest first, then by id.
pub(crate) fn order_by_recency(a: &StoredOrder, b: &StoredOrder) -> Ordering {
    b.order
        .date
        .cmp(&a.order.date)
        .then_with(|| a.order.id.cmp(&b.order.id))
}
