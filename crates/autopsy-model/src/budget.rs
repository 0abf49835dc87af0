//! Per-check processing budget
//!
//! Every check and the contract validator draw a [`Meter`] from the shared
//! [`ScanBudget`] and tick it once per visited event. Exhaustion aborts that
//! check only.

use std::time::{Duration, Instant};

/// Budget exhausted while scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BudgetExceeded {
    /// Visited more events than allowed
    #[error("event budget of {limit} exhausted")]
    Events {
        /// Configured ceiling
        limit: u64,
    },

    /// Wall-clock deadline passed
    #[error("deadline passed after {visited} events")]
    Deadline {
        /// Events visited before the deadline hit
        visited: u64,
    },
}

/// Limits shared by all checks of one pass
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanBudget {
    max_events: Option<u64>,
    deadline: Option<Instant>,
}

impl ScanBudget {
    /// No limits
    #[inline]
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_events: None,
            deadline: None,
        }
    }

    /// Budget with optional per-check event ceiling and pass deadline
    ///
    /// The deadline is measured from now.
    #[must_use]
    pub fn new(max_events: Option<u64>, timeout: Option<Duration>) -> Self {
        Self {
            max_events,
            deadline: timeout.and_then(|t| Instant::now().checked_add(t)),
        }
    }

    /// Event ceiling per check
    #[inline]
    #[must_use]
    pub fn max_events(&self) -> Option<u64> {
        self.max_events
    }

    /// Whether neither limit is set
    #[inline]
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.max_events.is_none() && self.deadline.is_none()
    }

    /// Fresh meter for one check
    #[inline]
    #[must_use]
    pub fn meter(&self) -> Meter {
        Meter {
            budget: *self,
            visited: 0,
        }
    }
}

/// Running count of events a single check has visited
#[derive(Debug, Clone)]
pub struct Meter {
    budget: ScanBudget,
    visited: u64,
}

impl Meter {
    /// Account for one visited event
    ///
    /// # Errors
    /// Returns `BudgetExceeded` once the event ceiling or the deadline is hit
    pub fn tick(&mut self) -> Result<(), BudgetExceeded> {
        if let Some(limit) = self.budget.max_events {
            if self.visited >= limit {
                return Err(BudgetExceeded::Events { limit });
            }
        }
        if let Some(deadline) = self.budget.deadline {
            if Instant::now() >= deadline {
                return Err(BudgetExceeded::Deadline {
                    visited: self.visited,
                });
            }
        }
        self.visited += 1;
        Ok(())
    }

    /// Events visited so far
    #[inline]
    #[must_use]
    pub fn visited(&self) -> u64 {
        self.visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_never_trips() {
        let mut meter = ScanBudget::unlimited().meter();
        for _ in 0..10_000 {
            meter.tick().unwrap();
        }
        assert_eq!(meter.visited(), 10_000);
    }

    #[test]
    fn event_ceiling_trips_after_limit() {
        let mut meter = ScanBudget::new(Some(2), None).meter();
        meter.tick().unwrap();
        meter.tick().unwrap();
        assert_eq!(meter.tick(), Err(BudgetExceeded::Events { limit: 2 }));
    }

    #[test]
    fn zero_timeout_trips_immediately() {
        let mut meter = ScanBudget::new(None, Some(Duration::ZERO)).meter();
        assert!(matches!(meter.tick(), Err(BudgetExceeded::Deadline { visited: 0 })));
    }

    #[test]
    fn meters_are_independent() {
        let budget = ScanBudget::new(Some(1), None);
        let mut a = budget.meter();
        let mut b = budget.meter();
        a.tick().unwrap();
        b.tick().unwrap();
        assert!(a.tick().is_err());
    }
}
