//! Error-cascade detection

use crate::check::{Check, Scan};
use crate::config::CascadeConfig;
use autopsy_model::{BudgetExceeded, Confidence, EventId, PatternKind, Severity, Signal};

/// Detects chains of closely spaced failures
///
/// Positions are indices in the full event sequence, so a chain tolerates up
/// to `max_gap - 1` healthy events between two failures.
#[derive(Debug, Clone)]
pub struct ErrorCascadeCheck {
    config: CascadeConfig,
    confidence: Confidence,
}

impl ErrorCascadeCheck {
    /// Create check from thresholds
    #[must_use]
    pub fn new(config: CascadeConfig, confidence: Confidence) -> Self {
        Self {
            config: CascadeConfig {
                max_gap: config.max_gap.max(1),
                min_length: config.min_length.max(2),
            },
            confidence,
        }
    }

    fn close(&self, chain: &mut Vec<EventId>, out: &mut Vec<Signal>) {
        if chain.len() >= self.config.min_length {
            let first = chain[0];
            out.push(Signal::new(
                PatternKind::ErrorCascade,
                Severity::High,
                format!("{} failures in close succession starting at {first}", chain.len()),
                std::mem::take(chain),
                self.confidence,
            ));
        }
        chain.clear();
    }
}

impl Check for ErrorCascadeCheck {
    fn name(&self) -> &'static str {
        "error_cascade"
    }

    fn pattern(&self) -> PatternKind {
        PatternKind::ErrorCascade
    }

    fn run(&self, scan: &mut Scan<'_>) -> Result<Vec<Signal>, BudgetExceeded> {
        let mut signals = Vec::new();
        let mut chain = Vec::new();
        let mut last: Option<usize> = None;

        for (position, event) in scan.events().iter().enumerate() {
            scan.tick()?;
            if !event.is_error() {
                continue;
            }
            if last.is_some_and(|prev| position - prev > self.config.max_gap) {
                self.close(&mut chain, &mut signals);
            }
            chain.push(event.id);
            last = Some(position);
        }
        self.close(&mut chain, &mut signals);

        Ok(signals)
    }
}
