//! Empty-response detection

use crate::check::{Check, Scan};
use autopsy_model::{BudgetExceeded, Confidence, EventKind, PatternKind, Severity, Signal};

/// Flags successful model and tool calls that returned nothing
///
/// Model calls and tool calls are reported in separate signals so each maps
/// to a single fix category downstream.
#[derive(Debug, Clone)]
pub struct EmptyResponseCheck {
    confidence: Confidence,
}

impl EmptyResponseCheck {
    /// Create check
    #[inline]
    #[must_use]
    pub fn new(confidence: Confidence) -> Self {
        Self { confidence }
    }
}

impl Check for EmptyResponseCheck {
    fn name(&self) -> &'static str {
        "empty_response"
    }

    fn pattern(&self) -> PatternKind {
        PatternKind::EmptyResponse
    }

    fn run(&self, scan: &mut Scan<'_>) -> Result<Vec<Signal>, BudgetExceeded> {
        let mut model_calls = Vec::new();
        let mut tool_calls = Vec::new();

        for event in scan.events() {
            scan.tick()?;
            if event.has_error || !event.has_empty_output() {
                continue;
            }
            match event.kind {
                EventKind::ModelCall => model_calls.push(event.id),
                EventKind::ToolCall => tool_calls.push(event.id),
                EventKind::Message | EventKind::Error => {}
            }
        }

        let signals = [("model call", model_calls), ("tool call", tool_calls)]
            .into_iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(what, ids)| {
                Signal::new(
                    PatternKind::EmptyResponse,
                    Severity::Medium,
                    format!("{} {what}(s) returned empty output", ids.len()),
                    ids,
                    self.confidence,
                )
            })
            .collect();
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::run_check;
    use autopsy_model::{Environment, EventId, Trace, TraceEvent};
    use serde_json::json;

    #[test]
    fn separates_model_and_tool_calls() {
        let trace = Trace::new(vec![
            TraceEvent::model_call(1, "gpt-4o").with_output(json!("")),
            TraceEvent::tool_call(2, "search", json!({})).with_output(json!([])),
            TraceEvent::tool_call(3, "search", json!({})).with_output(json!({"hits": 2})),
            TraceEvent::model_call(4, "gpt-4o"),
            TraceEvent::tool_call(5, "search", json!({})).failed(),
            TraceEvent::new(6, EventKind::Message),
        ])
        .unwrap();
        let check = EmptyResponseCheck::new(Confidence::new(0.7));
        let (signals, _) = run_check(&check, &trace, &Environment::new());
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].event_ids(), &[EventId(1), EventId(4)]);
        assert_eq!(signals[1].event_ids(), &[EventId(2)]);
        assert!(signals.iter().all(|s| s.severity() == Severity::Medium));
    }
}
