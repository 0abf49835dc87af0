//! Hallucinated-tool detection

use crate::check::{Check, Scan};
use autopsy_model::{BudgetExceeded, Confidence, PatternKind, Severity, Signal};

/// Flags every named tool call whose tool was never made available
///
/// One signal per offending call, never merged. An empty tool set flags
/// every named call.
#[derive(Debug, Clone)]
pub struct HallucinatedToolCheck {
    confidence: Confidence,
}

impl HallucinatedToolCheck {
    /// Create check
    #[inline]
    #[must_use]
    pub fn new(confidence: Confidence) -> Self {
        Self { confidence }
    }
}

impl Check for HallucinatedToolCheck {
    fn name(&self) -> &'static str {
        "hallucinated_tool"
    }

    fn pattern(&self) -> PatternKind {
        PatternKind::HallucinatedTool
    }

    fn run(&self, scan: &mut Scan<'_>) -> Result<Vec<Signal>, BudgetExceeded> {
        let environment = scan.environment();
        let mut signals = Vec::new();

        for event in scan.events() {
            scan.tick()?;
            if !event.is_tool_call() {
                continue;
            }
            let Some(name) = event.name.as_deref() else {
                scan.note_gap(event.id, "name");
                continue;
            };
            if environment.has_tool(name) {
                continue;
            }
            signals.push(Signal::new(
                PatternKind::HallucinatedTool,
                Severity::High,
                format!(
                    "tool `{name}` is not among the {} available tools",
                    environment.available_tools.len()
                ),
                vec![event.id],
                self.confidence,
            ));
        }

        Ok(signals)
    }
}
