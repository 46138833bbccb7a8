//! Invoice page parsing.
//!
//! A page is flattened into text tokens, the tokens drive a state machine,
//! and the state handlers fill an [`OrderBuilder`] that finally produces
//! the [`Order`](crate::models::Order).

mod builder;
pub mod dates;
mod engine;
mod parser;
pub mod patterns;
mod states;
pub mod tokenizer;

pub use builder::{BuildModes, Field, FieldAssignment, OrderBuilder};
pub use engine::{Handler, Hit, Machine, NoopObserver, Outcome, ParseObserver, Rule, TraceObserver};
pub use parser::{ExtractionResult, OrderParser, StateMachineParser};
pub use states::State;
pub use tokenizer::{tokenize, tokenize_html};

use crate::error::BuildError;

/// Result type for builder and state machine operations.
pub type Result<T> = std::result::Result<T, BuildError>;
