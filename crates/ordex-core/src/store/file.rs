//! Directory-backed store.
//!
//! Layout under the data directory:
//!
//! ```text
//! cache/index.json        cache key -> page file
//! cache/00000001.html     cached pages
//! orders/<id>.json        StoredOrder records
//! orders/<id>.html        raw invoice page for each order
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::order::{Order, StoredOrder};

use super::{order_by_recency, OrderStore, Result};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    next: u64,
    entries: BTreeMap<String, String>,
}

/// Store persisting cache pages and orders as files.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    index: CacheIndex,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("cache"))?;
        fs::create_dir_all(root.join("orders"))?;

        let index_path = root.join("cache").join(INDEX_FILE);
        let index = match fs::read_to_string(&index_path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                StoreError::Corrupt(format!("{}: {}", index_path.display(), e))
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => CacheIndex::default(),
            Err(e) => return Err(e.into()),
        };

        debug!("Opened store at {}", root.display());
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of cached pages.
    pub fn cache_len(&self) -> usize {
        self.index.entries.len()
    }

    fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    fn orders_dir(&self) -> PathBuf {
        self.root.join("orders")
    }

    fn order_path(&self, order_id: &str, extension: &str) -> PathBuf {
        self.orders_dir()
            .join(format!("{}.{}", file_stem(order_id), extension))
    }

    fn save_index(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.index)?;
        fs::write(self.cache_dir().join(INDEX_FILE), content)?;
        Ok(())
    }

    /// All stored records, newest first.
    pub fn stored_orders(&self) -> Result<Vec<StoredOrder>> {
        let mut stored = Vec::new();
        for entry in fs::read_dir(self.orders_dir())? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            let record: StoredOrder = serde_json::from_str(&content).map_err(|e| {
                StoreError::Corrupt(format!("{}: {}", path.display(), e))
            })?;
            stored.push(record);
        }
        stored.sort_by(order_by_recency);
        Ok(stored)
    }
}

/// Order ids become file names; keep them to a safe alphabet.
fn file_stem(order_id: &str) -> String {
    order_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl OrderStore for FileStore {
    fn check_cache(&self, key: &str) -> Result<Option<String>> {
        let Some(file) = self.index.entries.get(key) else {
            return Ok(None);
        };
        match fs::read_to_string(self.cache_dir().join(file)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Cache file {} for {} is missing", file, key);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_cache(&mut self, key: &str, content: &str) -> Result<()> {
        let file = match self.index.entries.get(key) {
            Some(file) => file.clone(),
            None => {
                self.index.next += 1;
                format!("{:08}.html", self.index.next)
            }
        };
        fs::write(self.cache_dir().join(&file), content)?;
        self.index.entries.insert(key.to_string(), file);
        self.save_index()?;
        debug!("Cached {}", key);
        Ok(())
    }

    fn remove_cache(&mut self, key: &str) -> Result<()> {
        let Some(file) = self.index.entries.remove(key) else {
            return Ok(());
        };
        match fs::remove_file(self.cache_dir().join(&file)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.save_index()?;
        debug!("Removed cache entry {}", key);
        Ok(())
    }

    fn save_order(
        &mut self,
        order: &Order,
        user: &str,
        source_url: &str,
        raw_content: &str,
    ) -> Result<()> {
        let record = StoredOrder {
            order: order.clone(),
            user: user.to_string(),
            source_url: source_url.to_string(),
            saved_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&record)?;
        fs::write(self.order_path(&order.id, "json"), content)?;
        fs::write(self.order_path(&order.id, "html"), raw_content)?;
        debug!("Saved order {}", order.id);
        Ok(())
    }

    fn get_orders(&self) -> Result<Vec<Order>> {
        Ok(self
            .stored_orders()?
            .into_iter()
            .map(|record| record.order)
            .collect())
    }

    fn get_invoice_html(&self, order_id: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.order_path(order_id, "html")) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::money::Money;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn order(id: &str, y: i32, m: u32, d: u32) -> Order {
        Order {
            id: id.to_string(),
            currency: "$".to_string(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            placed_by: None,
            subtotal: Money::from_cents(1000, Some("$")),
            tax: Money::from_cents(80, Some("$")),
            shipping_cost: None,
            total: Money::from_cents(1080, Some("$")),
            shipments: Vec::new(),
            payments: Vec::new(),
        }
    }

    #[test]
    fn test_cache_roundtrip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        let key = "v1:user:alice:url:https://example.test/a?b=1";

        assert_eq!(store.check_cache(key).unwrap(), None);
        store.update_cache(key, "<html>one</html>").unwrap();
        store.update_cache(key, "<html>two</html>").unwrap();
        assert_eq!(store.check_cache(key).unwrap().as_deref(), Some("<html>two</html>"));
        assert_eq!(store.cache_len(), 1);

        store.remove_cache(key).unwrap();
        assert_eq!(store.check_cache(key).unwrap(), None);
        store.remove_cache(key).unwrap();
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.update_cache("k1", "first").unwrap();
            store.update_cache("k2", "second").unwrap();
        }
        let mut store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.check_cache("k2").unwrap().as_deref(), Some("second"));
        store.update_cache("k3", "third").unwrap();
        // New entries do not reuse earlier file names.
        assert_eq!(store.check_cache("k1").unwrap().as_deref(), Some("first"));
        assert_eq!(store.cache_len(), 3);
    }

    #[test]
    fn test_corrupt_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cache")).unwrap();
        fs::write(dir.path().join("cache").join(INDEX_FILE), "{not json").unwrap();
        assert!(matches!(
            FileStore::open(dir.path()),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store
            .save_order(&order("b-2", 2020, 1, 1), "alice", "https://x/b", "<b/>")
            .unwrap();
        store
            .save_order(&order("a-1", 2021, 6, 1), "alice", "https://x/a", "<a/>")
            .unwrap();
        store
            .save_order(&order("a-0", 2020, 1, 1), "alice", "https://x/c", "<c/>")
            .unwrap();

        let ids: Vec<String> = store.get_orders().unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["a-1", "a-0", "b-2"]);

        let stored = store.stored_orders().unwrap();
        assert_eq!(stored[0].source_url, "https://x/a");
        assert_eq!(stored[0].user, "alice");
    }

    #[test]
    fn test_invoice_html() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store
            .save_order(&order("111-2", 2020, 1, 1), "u", "https://x", "<html>inv</html>")
            .unwrap();
        assert_eq!(
            store.get_invoice_html("111-2").unwrap().as_deref(),
            Some("<html>inv</html>")
        );
        assert_eq!(store.get_invoice_html("nope").unwrap(), None);
    }

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(file_stem("112-123/../x"), "112-123____x");
    }
}
