//! Invariant checking over recorded flow traces.
//!
//! Invariants are properties that must hold for every run, whatever order the
//! rider, the driver and the collaborators acted in. Property tests drive the
//! flows with arbitrary mutator sequences and chaotic collaborators, record a
//! [`FlowTrace`], then run every registered [`Invariant`] against it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.assert_all(&trace, "after scenario");
//! ```

mod checks;
mod trace;

pub use checks::{
    ConfirmedIsTerminal, NavigationReentryGuarded, PairReportedOnce, PreTripEdgesValid,
    SingleTripCreation,
};
pub use trace::FlowTrace;

/// Outcome of checking one invariant against one trace.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant and what in the trace broke it.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Which invariant failed, e.g. `SingleTripCreation`.
    pub invariant: &'static str,
    /// The offending states or events, rendered for the failure report.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a recorded trace.
pub trait Invariant: Send + Sync {
    /// Name shown in front of every violation message.
    fn name(&self) -> &'static str;

    /// Check the invariant against `trace`.
    fn check(&self, trace: &FlowTrace) -> InvariantResult;

    /// Tag `message` with this invariant's name.
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// Ordered set of invariants run against each recorded [`FlowTrace`].
///
/// Violations come back in registration order, so a report lists location
/// problems before pre-trip, driving and confirmation ones.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// No invariants; every trace passes.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every standard flow invariant.
    ///
    /// Includes:
    /// - [`PairReportedOnce`]: one `set` per completed location pair
    /// - [`PreTripEdgesValid`]: pre-trip states only follow allowed edges
    /// - [`SingleTripCreation`]: at most one created trip per run
    /// - [`NavigationReentryGuarded`]: navigation resumes only when offered
    /// - [`ConfirmedIsTerminal`]: nothing follows a completed confirmation
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(PairReportedOnce);
        registry.add(PreTripEdgesValid);
        registry.add(SingleTripCreation);
        registry.add(NavigationReentryGuarded);
        registry.add(ConfirmedIsTerminal);
        registry
    }

    /// Run `invariant` after the ones already registered.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every invariant against `trace`, collecting each violation rather
    /// than stopping at the first.
    pub fn check_all(&self, trace: &FlowTrace) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(trace).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Panic listing every violation in `trace`, one per line, prefixed with
    /// `context` (for example the seed or scenario that produced the trace).
    #[allow(clippy::panic, reason = "trace assertion for property tests")]
    pub fn assert_all(&self, trace: &FlowTrace, context: &str) {
        if let Err(violations) = self.check_all(trace) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
