//! Invoice parser: tokenizer plus state machine plus builder.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::ParseFailure;
use crate::models::config::ParserConfig;
use crate::models::order::Order;

use super::builder::OrderBuilder;
use super::engine::{Machine, NoopObserver, ParseObserver};
use super::tokenizer::tokenize_html;

/// Result of parsing one invoice page.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// The parsed order.
    pub order: Order,
    /// Consistency warnings; the order is still valid.
    pub warnings: Vec<String>,
    /// Number of tokens fed to the state machine.
    pub token_count: usize,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Turns invoice page content into an order.
pub trait OrderParser {
    /// Parse raw page content.
    fn parse(&self, content: &str) -> Result<ExtractionResult, ParseFailure> {
        self.parse_observed(content, &mut NoopObserver)
    }

    /// Parse raw page content, reporting tokens, transitions and field
    /// assignments to `observer`.
    fn parse_observed(
        &self,
        content: &str,
        observer: &mut dyn ParseObserver,
    ) -> Result<ExtractionResult, ParseFailure>;
}

/// Parser driven by the rule tables in [`super::states`].
#[derive(Debug, Clone)]
pub struct StateMachineParser {
    default_currency: String,
    check_subtotal: bool,
}

impl Default for StateMachineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachineParser {
    /// Create a parser with default settings.
    pub fn new() -> Self {
        Self::from_config(&ParserConfig::default())
    }

    pub fn from_config(config: &ParserConfig) -> Self {
        Self {
            default_currency: config.default_currency.clone(),
            check_subtotal: config.check_subtotal,
        }
    }

    /// Set the currency used when no amount carries a symbol.
    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    /// Enable or disable the consistency warnings.
    pub fn with_subtotal_check(mut self, check: bool) -> Self {
        self.check_subtotal = check;
        self
    }

    /// Parse an already tokenized page. On failure the tokens, one per
    /// line, are returned as the failure content.
    pub fn parse_tokens<S: AsRef<str>>(
        &self,
        tokens: &[S],
        observer: &mut dyn ParseObserver,
    ) -> Result<ExtractionResult, ParseFailure> {
        let start = Instant::now();
        let order = self.run(tokens, observer).map_err(|source| {
            let content = tokens
                .iter()
                .map(|t| t.as_ref())
                .collect::<Vec<_>>()
                .join("\n");
            ParseFailure::new(source, content)
        })?;
        Ok(self.finish(order, tokens.len(), start))
    }

    fn run<S: AsRef<str>>(
        &self,
        tokens: &[S],
        observer: &mut dyn ParseObserver,
    ) -> super::Result<Order> {
        let builder = OrderBuilder::new().with_default_currency(self.default_currency.clone());
        let mut machine = Machine::new(builder);
        machine.run(tokens, observer)?;
        debug!("Token stream ended in state {}", machine.state());
        machine.finish()
    }

    fn finish(&self, order: Order, token_count: usize, start: Instant) -> ExtractionResult {
        let warnings = if self.check_subtotal {
            order.validate()
        } else {
            Vec::new()
        };
        for warning in &warnings {
            warn!("Order {}: {}", order.id, warning);
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Parsed order {} ({} tokens) in {}ms",
            order.id, token_count, processing_time_ms
        );

        ExtractionResult {
            order,
            warnings,
            token_count,
            processing_time_ms,
        }
    }
}

impl OrderParser for StateMachineParser {
    fn parse_observed(
        &self,
        content: &str,
        observer: &mut dyn ParseObserver,
    ) -> Result<ExtractionResult, ParseFailure> {
        let start = Instant::now();
        let tokens = tokenize_html(content);
        debug!("Tokenized page into {} tokens", tokens.len());

        let order = self
            .run(&tokens, observer)
            .map_err(|source| ParseFailure::new(source, content))?;
        Ok(self.finish(order, tokens.len(), start))
    }
}
