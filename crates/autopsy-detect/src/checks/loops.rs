//! Signature-based loop detection
//!
//! A loop is a run of consecutive tool calls (non-tool events ignored) with
//! the same [`CallSignature`]. A nameless tool call has no signature and
//! breaks the run.

use crate::check::{Check, Scan};
use crate::config::LoopConfig;
use autopsy_model::{
    BudgetExceeded, CallSignature, Confidence, EventId, PatternKind, Severity, Signal,
};

/// Detects identical tool calls repeated back to back
#[derive(Debug, Clone)]
pub struct LoopCheck {
    min_repeats: usize,
    confidence: Confidence,
}

impl LoopCheck {
    /// Create check from thresholds
    #[must_use]
    pub fn new(config: LoopConfig, confidence: Confidence) -> Self {
        Self {
            min_repeats: config.min_repeats.max(2),
            confidence,
        }
    }

    fn flush(&self, run: &mut Vec<EventId>, signature: Option<&CallSignature>, out: &mut Vec<Signal>) {
        if let Some(signature) = signature {
            if run.len() >= self.min_repeats {
                out.push(Signal::new(
                    PatternKind::Loop,
                    Severity::Critical,
                    format!(
                        "tool `{}` called {} times in a row with identical input ({})",
                        signature.tool,
                        run.len(),
                        signature
                    ),
                    std::mem::take(run),
                    self.confidence,
                ));
            }
        }
        run.clear();
    }
}

impl Check for LoopCheck {
    fn name(&self) -> &'static str {
        "loop"
    }

    fn pattern(&self) -> PatternKind {
        PatternKind::Loop
    }

    fn run(&self, scan: &mut Scan<'_>) -> Result<Vec<Signal>, BudgetExceeded> {
        let mut signals = Vec::new();
        let mut current: Option<CallSignature> = None;
        let mut run: Vec<EventId> = Vec::new();

        for event in scan.events() {
            scan.tick()?;
            if !event.is_tool_call() {
                continue;
            }
            match event.signature() {
                Some(signature) if current.as_ref() == Some(&signature) => run.push(event.id),
                Some(signature) => {
                    self.flush(&mut run, current.as_ref(), &mut signals);
                    current = Some(signature);
                    run.push(event.id);
                }
                None => {
                    scan.note_gap(event.id, "name");
                    self.flush(&mut run, current.as_ref(), &mut signals);
                    current = None;
                }
            }
        }
        self.flush(&mut run, current.as_ref(), &mut signals);

        Ok(signals)
    }
}
