//! Core library for extracting orders from retailer invoice pages.
//!
//! This crate provides:
//! - Integer-cent monetary amounts
//! - HTML tokenization and a state-machine invoice parser
//! - A conflict-checked order builder
//! - A scrape orchestrator with cache staleness policy and headless to
//!   interactive escalation
//! - Cache and order store implementations

pub mod error;
pub mod models;
pub mod invoice;
pub mod scrape;
pub mod store;

pub use error::{
    BrowserError, BuildError, ErrorKind, MoneyError, OrdexError, ParseFailure, Result, ScrapeError,
    StoreError,
};
pub use models::{
    Money, Order, OrderItem, OrdexConfig, ParserConfig, Payment, ScrapeConfig, Shipment,
    ShippingAddress, StoreConfig, StoredOrder,
};
pub use invoice::{
    ExtractionResult, NoopObserver, OrderBuilder, OrderParser, ParseObserver, StateMachineParser,
    TraceObserver, tokenize_html,
};
pub use scrape::{
    BrowserContext, BrowserLauncher, BrowserPage, Interaction, LaunchMode, OrderAction,
    ScrapeHooks, ScrapeReport, Scraper, YearAction,
};
pub use store::{FileStore, MemoryStore, OrderStore};
