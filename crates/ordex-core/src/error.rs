//! Error types for the ordex-core library.

use thiserror::Error;

use crate::invoice::Field;

/// Main error type for the ordex library.
#[derive(Error, Debug)]
pub enum OrdexError {
    /// Monetary amount could not be parsed.
    #[error("money error: {0}")]
    Money(#[from] MoneyError),

    /// Invoice content could not be turned into an order.
    #[error("parse error: {0}")]
    Parse(#[from] ParseFailure),

    /// Scraping failed.
    #[error("scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// Cache or order store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to monetary amount parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Nothing left after stripping symbols and separators.
    #[error("empty amount: {0:?}")]
    Empty(String),

    /// The amount contains something other than digits.
    #[error("invalid amount: {0:?}")]
    Invalid(String),

    /// More than one decimal point.
    #[error("more than one decimal point in {0:?}")]
    MultipleDecimalPoints(String),

    /// Fractional part longer than two digits.
    #[error("fraction has more than two digits in {0:?}")]
    Fraction(String),

    /// Value does not fit in whole cents.
    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

/// Order builder invariant violations.
///
/// Every one of these means either a parser bug or a page layout the state
/// machine does not recognise.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// A field already holds a different value.
    #[error("conflicting values for {field}: existing {existing:?}, incoming {incoming:?}")]
    Conflict {
        field: Field,
        existing: String,
        incoming: String,
    },

    /// Required field is missing at build time.
    #[error("missing required field: {0}")]
    MissingField(Field),

    /// Date is not in canonical YYYY-MM-DD form.
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Item quantity must be positive.
    #[error("invalid quantity {0:?}")]
    InvalidQuantity(String),

    /// Every shipping address field is already filled.
    #[error("shipping address already complete, unexpected {0:?}")]
    AddressExhausted(String),

    /// Tax inference was requested but tax was captured explicitly.
    #[error("tax captured explicitly while tax inference is active")]
    TaxAlreadyCaptured,

    /// More than one payment without an amount.
    #[error("{0} payments have no amount, cannot attribute the order total")]
    AmbiguousPayment(usize),

    /// A per-item field was set with no item to receive it.
    #[error("no current item for {0}")]
    NoCurrentItem(Field),

    /// A captured amount failed to parse.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// A parse failure together with the exact content that was parsed.
///
/// The content is kept so the caller can persist it as a regression fixture
/// without fetching the page again.
#[derive(Error, Debug, Clone)]
#[error("{source}")]
pub struct ParseFailure {
    #[source]
    pub source: BuildError,
    pub content: String,
}

impl ParseFailure {
    pub fn new(source: BuildError, content: impl Into<String>) -> Self {
        Self {
            source,
            content: content.into(),
        }
    }
}

/// Scrape error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Sign-in wall or bot challenge.
    AuthenticationRequired,
    /// Builder invariant violated while parsing a page.
    ParseInvariant,
    /// Navigation failed and retries were exhausted.
    TransientFetch,
    /// Cached content failed to parse. Handled internally.
    CacheCorruption,
    /// Browser could not be launched or was closed underneath us.
    Browser,
    /// Cache or order store failure.
    Store,
}

/// Errors raised by the scrape orchestrator.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Expected structural marker missing; interpreted as a sign-in wall.
    #[error("authentication required at {url}")]
    AuthenticationRequired { url: String, content: String },

    /// Invoice content violated an order invariant.
    #[error("failed to parse {url}: {failure}")]
    Parse { url: String, failure: ParseFailure },

    /// Navigation kept failing.
    #[error("fetch of {url} failed after {attempts} attempts: {source}")]
    Fetch {
        url: String,
        attempts: u32,
        #[source]
        source: BrowserError,
    },

    /// Cached content for a key could not be used.
    #[error("cached content for {key} is unusable")]
    CacheCorruption { key: String },

    /// Browser capability failure outside of a retried navigation.
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScrapeError {
    /// The error category, for matching without inspecting fields.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::AuthenticationRequired { .. } => ErrorKind::AuthenticationRequired,
            ScrapeError::Parse { .. } => ErrorKind::ParseInvariant,
            ScrapeError::Fetch { .. } => ErrorKind::TransientFetch,
            ScrapeError::CacheCorruption { .. } => ErrorKind::CacheCorruption,
            ScrapeError::Browser(_) => ErrorKind::Browser,
            ScrapeError::Store(_) => ErrorKind::Store,
        }
    }

    /// Raw page content attached to the error, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            ScrapeError::AuthenticationRequired { content, .. } => Some(content),
            ScrapeError::Parse { failure, .. } => Some(&failure.content),
            _ => None,
        }
    }
}

/// Errors related to the cache and order store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Store contents are inconsistent.
    #[error("corrupt store: {0}")]
    Corrupt(String),
}

/// Errors reported by a browser capability.
#[derive(Error, Debug, Clone)]
pub enum BrowserError {
    /// Browser context could not be launched.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Navigation to a URL failed.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Page content could not be read.
    #[error("failed to read page content: {0}")]
    Content(String),

    /// The page or context was already closed.
    #[error("browser context closed")]
    Closed,
}

/// Result type for the ordex library.
pub type Result<T> = std::result::Result<T, OrdexError>;
