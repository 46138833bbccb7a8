//! In-memory store for tests and dry runs.

use std::collections::HashMap;

use chrono::Utc;

use crate::models::order::{Order, StoredOrder};

use super::{order_by_recency, OrderStore, Result};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    cache: HashMap<String, String>,
    orders: HashMap<String, (StoredOrder, String)>,
    cache_writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `update_cache` calls so far.
    pub fn cache_writes(&self) -> usize {
        self.cache_writes
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Stored record for an order, including its provenance.
    pub fn stored(&self, order_id: &str) -> Option<&StoredOrder> {
        self.orders.get(order_id).map(|(stored, _)| stored)
    }
}

impl OrderStore for MemoryStore {
    fn check_cache(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.get(key).cloned())
    }

    fn update_cache(&mut self, key: &str, content: &str) -> Result<()> {
        self.cache_writes += 1;
        self.cache.insert(key.to_string(), content.to_string());
        Ok(())
    }

    fn remove_cache(&mut self, key: &str) -> Result<()> {
        self.cache.remove(key);
        Ok(())
    }

    fn save_order(
        &mut self,
        order: &Order,
        user: &str,
        source_url: &str,
        raw_content: &str,
    ) -> Result<()> {
        let stored = StoredOrder {
            order: order.clone(),
            user: user.to_string(),
            source_url: source_url.to_string(),
            saved_at: Utc::now(),
        };
        self.orders
            .insert(order.id.clone(), (stored, raw_content.to_string()));
        Ok(())
    }

    fn get_orders(&self) -> Result<Vec<Order>> {
        let mut stored: Vec<&StoredOrder> = self.orders.values().map(|(s, _)| s).collect();
        stored.sort_by(|a, b| order_by_recency(a, b));
        Ok(stored.into_iter().map(|s| s.order.clone()).collect())
    }

    fn get_invoice_html(&self, order_id: &str) -> Result<Option<String>> {
        Ok(self.orders.get(order_id).map(|(_, html)| html.clone()))
    }
}
