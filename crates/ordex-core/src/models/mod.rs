//! Data models: money, orders, configuration.

pub mod config;
pub mod money;
pub mod order;

pub use config::{OrdexConfig, ParserConfig, ScrapeConfig, StoreConfig};
pub use money::Money;
pub use order::{Order, OrderItem, Payment, Shipment, ShippingAddress, StoredOrder};
