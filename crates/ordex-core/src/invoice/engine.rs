//! Generic rule interpreter driving the invoice state machine.
//!
//! Each [`State`] owns an ordered list of [`Rule`]s. A token is offered to
//! the rules of the current state in order; the first rule that matches runs
//! its handler against the [`OrderBuilder`]. A token no rule matches leaves
//! the machine where it is.

use regex::{Captures, Regex};
use tracing::trace;

use crate::models::order::Order;

use super::builder::{Field, OrderBuilder};
use super::states::State;
use super::Result;

/// State handler. `Some(state)` moves the machine, `None` stays put.
pub type Handler = fn(&Hit<'_>, &mut OrderBuilder) -> Result<Option<State>>;

/// One entry in a state's rule table.
pub enum Rule {
    /// Token equals `value` exactly.
    Literal { value: &'static str, handler: Handler },
    /// Token matches `regex`; named captures are available to the handler.
    Pattern { regex: &'static Regex, handler: Handler },
    /// Matches any token.
    Fallthrough { handler: Handler },
}

impl Rule {
    fn matches<'t>(&self, token: &'t str) -> Option<Hit<'t>> {
        match self {
            Rule::Literal { value, .. } => (*value == token).then_some(Hit { token, caps: None }),
            Rule::Pattern { regex, .. } => regex.captures(token).map(|caps| Hit {
                token,
                caps: Some(caps),
            }),
            Rule::Fallthrough { .. } => Some(Hit { token, caps: None }),
        }
    }

    fn handler(&self) -> Handler {
        match self {
            Rule::Literal { handler, .. }
            | Rule::Pattern { handler, .. }
            | Rule::Fallthrough { handler } => *handler,
        }
    }
}

/// A token accepted by a rule.
pub struct Hit<'t> {
    pub token: &'t str,
    caps: Option<Captures<'t>>,
}

impl<'t> Hit<'t> {
    /// Text of a named capture group, trimmed.
    pub fn named(&self, name: &str) -> Option<&'t str> {
        self.caps
            .as_ref()
            .and_then(|c| c.name(name))
            .map(|m| m.as_str().trim())
    }
}

/// What happened to a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A rule matched and moved the machine to another state.
    Transition(State),
    /// A rule matched and the machine stayed in its state.
    Handled,
    /// No rule matched.
    Unrecognized,
}

/// Diagnostic callbacks. All methods default to no-ops.
pub trait ParseObserver {
    fn on_token(&mut self, _state: State, _token: &str, _outcome: Outcome) {}

    fn on_transition(&mut self, _from: State, _to: State, _token: &str) {}

    /// A field received its first value.
    fn on_field(&mut self, _state: State, _token: &str, _field: Field, _value: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ParseObserver for NoopObserver {}

/// Observer that logs every event at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceObserver;

impl ParseObserver for TraceObserver {
    fn on_token(&mut self, state: State, token: &str, outcome: Outcome) {
        if outcome == Outcome::Unrecognized {
            trace!("[{}] unrecognized: {:?}", state, token);
        }
    }

    fn on_transition(&mut self, from: State, to: State, token: &str) {
        trace!("{} -> {} on {:?}", from, to, token);
    }

    fn on_field(&mut self, state: State, _token: &str, field: Field, value: &str) {
        trace!("[{}] {} = {:?}", state, field, value);
    }
}

/// The running state machine for one invoice.
#[derive(Debug)]
pub struct Machine {
    state: State,
    builder: OrderBuilder,
}

impl Machine {
    pub fn new(builder: OrderBuilder) -> Self {
        Self {
            state: State::Unknown,
            builder,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Offer one token to the current state.
    pub fn feed(&mut self, token: &str, observer: &mut dyn ParseObserver) -> Result<Outcome> {
        let state = self.state;
        let mut outcome = Outcome::Unrecognized;

        for rule in state.rules() {
            let Some(hit) = rule.matches(token) else {
                continue;
            };
            let next = (rule.handler())(&hit, &mut self.builder)?;
            outcome = match next {
                Some(next) if next != state => Outcome::Transition(next),
                _ => Outcome::Handled,
            };
            break;
        }

        for assignment in self.builder.take_assignments() {
            observer.on_field(state, token, assignment.field, &assignment.value);
        }
        observer.on_token(state, token, outcome);

        if let Outcome::Transition(next) = outcome {
            observer.on_transition(state, next, token);
            self.state = next;
        }
        Ok(outcome)
    }

    /// Feed every token, stopping at the first builder error.
    pub fn run<I, S>(&mut self, tokens: I, observer: &mut dyn ParseObserver) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            self.feed(token.as_ref(), observer)?;
        }
        Ok(())
    }

    /// Build the order from everything fed so far.
    pub fn finish(self) -> Result<Order> {
        self.builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        transitions: Vec<(State, State)>,
        fields: Vec<Field>,
        unrecognized: usize,
    }

    impl ParseObserver for Recorder {
        fn on_token(&mut self, _state: State, _token: &str, outcome: Outcome) {
            if outcome == Outcome::Unrecognized {
                self.unrecognized += 1;
            }
        }

        fn on_transition(&mut self, from: State, to: State, _token: &str) {
            self.transitions.push((from, to));
        }

        fn on_field(&mut self, _state: State, _token: &str, field: Field, _value: &str) {
            self.fields.push(field);
        }
    }

    #[test]
    fn test_unknown_token_stays() {
        let mut machine = Machine::new(OrderBuilder::new());
        let mut recorder = Recorder::default();
        let outcome = machine.feed("Thank you for shopping", &mut recorder).unwrap();
        assert_eq!(outcome, Outcome::Unrecognized);
        assert_eq!(machine.state(), State::Unknown);
        assert_eq!(recorder.unrecognized, 1);
    }

    #[test]
    fn test_transition_reported_once() {
        let mut machine = Machine::new(OrderBuilder::new());
        let mut recorder = Recorder::default();
        machine.feed("Items Ordered", &mut recorder).unwrap();
        // Same marker again while already in Items is handled, not a transition.
        machine.feed("Items Ordered", &mut recorder).unwrap();
        assert_eq!(machine.state(), State::Items);
        assert_eq!(recorder.transitions, vec![(State::Unknown, State::Items)]);
    }

    #[test]
    fn test_fields_forwarded_to_observer() {
        let mut machine = Machine::new(OrderBuilder::new());
        let mut recorder = Recorder::default();
        machine
            .run(
                ["Order #: 112-1234567-7654321", "Order Total: $5.00"],
                &mut recorder,
            )
            .unwrap();
        assert_eq!(
            recorder.fields,
            vec![Field::Id, Field::Currency, Field::Total]
        );
    }

    #[test]
    fn test_named_capture_is_trimmed() {
        let regex = Regex::new(r"^a(?P<x>.*)$").unwrap();
        let hit = Hit {
            token: "a  b ",
            caps: regex.captures("a  b "),
        };
        assert_eq!(hit.named("x"), Some("b"));
        assert_eq!(hit.named("missing"), None);
    }
}
