pub mod config;
pub mod invoice;
pub mod orders;
pub mod parse;
pub mod scrape;
