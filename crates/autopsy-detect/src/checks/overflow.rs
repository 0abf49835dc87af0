//! Context-overflow detection

use crate::check::{Check, Scan};
use crate::config::OverflowConfig;
use autopsy_model::{BudgetExceeded, Confidence, PatternKind, Severity, Signal};

/// Flags the first event at which cumulative token usage exceeds the ceiling
///
/// The ceiling is the configured override, else the environment's effective
/// limit. Without either the check does nothing.
#[derive(Debug, Clone)]
pub struct ContextOverflowCheck {
    config: OverflowConfig,
    confidence: Confidence,
}

impl ContextOverflowCheck {
    /// Create check
    #[must_use]
    pub fn new(config: OverflowConfig, confidence: Confidence) -> Self {
        Self { config, confidence }
    }
}

impl Check for ContextOverflowCheck {
    fn name(&self) -> &'static str {
        "context_overflow"
    }

    fn pattern(&self) -> PatternKind {
        PatternKind::ContextOverflow
    }

    fn run(&self, scan: &mut Scan<'_>) -> Result<Vec<Signal>, BudgetExceeded> {
        let Some(limit) = self
            .config
            .context_limit
            .or_else(|| scan.environment().effective_context_limit())
        else {
            return Ok(Vec::new());
        };

        let mut signals = Vec::new();
        let mut total = 0u64;

        for event in scan.events() {
            scan.tick()?;
            match event.total_tokens() {
                Some(tokens) => total = total.saturating_add(tokens),
                None if event.is_model_call() => {
                    scan.note_gap(event.id, "token_usage");
                    continue;
                }
                None => continue,
            }
            if total > limit && signals.is_empty() {
                signals.push(Signal::new(
                    PatternKind::ContextOverflow,
                    Severity::Critical,
                    format!("cumulative token usage {total} exceeds context limit {limit} at {}", event.id),
                    vec![event.id],
                    self.confidence,
                ));
            }
        }

        Ok(signals)
    }
}
