//! Check trait and scan context
//!
//! Provides the [`Check`] trait every detector in the battery implements and
//! the [`Scan`] context a check reads the trace through.

use autopsy_model::{
    BudgetExceeded, Environment, EventId, Meter, PatternKind, ScanBudget, Signal, Trace,
    TraceEvent,
};

/// One independent, pure detector
///
/// # Contract
/// `run` must be deterministic, must call [`Scan::tick`] once per visited
/// event and must only cite ids of events in the scanned trace.
pub trait Check: Send + Sync + std::fmt::Debug {
    /// Check name (for logs and partial-result reporting)
    fn name(&self) -> &'static str;

    /// Pattern this check emits
    fn pattern(&self) -> PatternKind;

    /// Scan the trace and return findings
    ///
    /// # Errors
    /// Propagates `BudgetExceeded` from [`Scan::tick`]
    fn run(&self, scan: &mut Scan<'_>) -> Result<Vec<Signal>, BudgetExceeded>;
}

/// Field a check needed but an event lacked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataGap {
    /// Event lacking the field
    pub event: EventId,
    /// Field name (`name`, `timestamp`, `token_usage`)
    pub field: &'static str,
}

/// Read-only view of one pass, plus the check's budget meter and gap log
#[derive(Debug)]
pub struct Scan<'a> {
    trace: &'a Trace,
    environment: &'a Environment,
    meter: Meter,
    gaps: Vec<DataGap>,
}

impl<'a> Scan<'a> {
    /// Create scan context for one check
    #[must_use]
    pub fn new(trace: &'a Trace, environment: &'a Environment, budget: &ScanBudget) -> Self {
        Self {
            trace,
            environment,
            meter: budget.meter(),
            gaps: Vec::new(),
        }
    }

    /// Run environment
    #[inline]
    #[must_use]
    pub fn environment(&self) -> &'a Environment {
        self.environment
    }

    /// All events, in order
    #[inline]
    #[must_use]
    pub fn events(&self) -> &'a [TraceEvent] {
        self.trace.events()
    }

    /// Account for one visited event
    ///
    /// # Errors
    /// Returns `BudgetExceeded` once the check's budget is exhausted
    #[inline]
    pub fn tick(&mut self) -> Result<(), BudgetExceeded> {
        self.meter.tick()
    }

    /// Record that `event` lacked `field`
    #[inline]
    pub fn note_gap(&mut self, event: EventId, field: &'static str) {
        self.gaps.push(DataGap { event, field });
    }

    /// Events visited so far
    #[inline]
    #[must_use]
    pub fn visited(&self) -> u64 {
        self.meter.visited()
    }

    /// Gaps recorded so far
    #[inline]
    #[must_use]
    pub fn gaps(&self) -> &[DataGap] {
        &self.gaps
    }

    /// Consume the scan, returning its gap log
    #[inline]
    #[must_use]
    pub fn into_gaps(self) -> Vec<DataGap> {
        self.gaps
    }
}
