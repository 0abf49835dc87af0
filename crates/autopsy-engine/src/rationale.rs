//! Rationale templates
//!
//! Pure string formatting over `(pattern, category, evidence)`. Nothing here
//! looks at configuration or calls out of process.

use autopsy_model::{Category, EventId, EventKind, PatternKind};

/// Fix category for a finding
///
/// `kind` is the kind of the finding's first evidence event; it only matters
/// for empty responses, where a tool call points at the tool contract and
/// anything else at the prompt.
#[must_use]
pub fn category_for(pattern: PatternKind, kind: Option<EventKind>) -> Category {
    match pattern {
        PatternKind::Loop | PatternKind::RetryStorm | PatternKind::ErrorCascade => {
            Category::GraphCode
        }
        PatternKind::HallucinatedTool | PatternKind::ContractViolation => Category::ToolContract,
        PatternKind::EmptyResponse if kind == Some(EventKind::ToolCall) => Category::ToolContract,
        PatternKind::EmptyResponse => Category::PromptPolicy,
        PatternKind::ContextOverflow | PatternKind::DataQuality => Category::Ops,
    }
}

fn headline(pattern: PatternKind, category: Category) -> &'static str {
    match (pattern, category) {
        (PatternKind::Loop, _) => {
            "Agent is stuck repeating an identical tool call; the graph or router lacks an exit condition"
        }
        (PatternKind::RetryStorm, _) => {
            "Tool is retried in quick succession with varying input; the retry policy is missing or misconfigured"
        }
        (PatternKind::ErrorCascade, _) => "An unhandled error cascades into further failures",
        (PatternKind::HallucinatedTool, _) => "Model calls tools that were never made available",
        (PatternKind::EmptyResponse, Category::ToolContract) => {
            "Tool returns empty or null output that the agent does not handle"
        }
        (PatternKind::EmptyResponse, _) => "Model returns empty responses",
        (PatternKind::ContextOverflow, _) => {
            "Context window overflow causes truncation or failure"
        }
        (PatternKind::DataQuality, _) => "Trace lacks data some checks need, so findings may be incomplete",
        (PatternKind::ContractViolation, _) => {
            "Tool input or output does not match its declared contract"
        }
    }
}

/// Description of one hypothesis
///
/// `lead` is the evidence text of the group's first finding.
#[must_use]
pub fn describe(
    pattern: PatternKind,
    category: Category,
    count: usize,
    first: Option<EventId>,
    lead: &str,
) -> String {
    let headline = headline(pattern, category);
    let findings = if count == 1 {
        "1 finding".to_string()
    } else {
        format!("{count} findings")
    };
    match first {
        Some(first) => format!("{headline} ({findings}, first at {first}): {lead}"),
        None => format!("{headline} ({findings}): {lead}"),
    }
}

/// Generic remediation for a pattern
#[must_use]
pub fn suggested_fixes(pattern: PatternKind, category: Category) -> &'static [&'static str] {
    match (pattern, category) {
        (PatternKind::Loop, _) => &[
            "Add a maximum iteration limit to graph execution",
            "Add an exit condition check in the router node",
            "Detect repeated identical calls and terminate early",
        ],
        (PatternKind::RetryStorm, _) => &[
            "Add exponential backoff to tool calls",
            "Set a maximum retry count",
            "Wrap the tool in a circuit breaker",
        ],
        (PatternKind::ErrorCascade, _) => &[
            "Handle errors around tool calls instead of propagating them",
            "Add fallback behavior for failed operations",
        ],
        (PatternKind::HallucinatedTool, _) => &[
            "List the exact tool names in the system prompt",
            "Validate tool names before execution",
            "Use structured output for tool selection",
        ],
        (PatternKind::EmptyResponse, Category::ToolContract) => &[
            "Validate tool results before handing them to the model",
            "Handle null responses gracefully",
        ],
        (PatternKind::EmptyResponse, _) => &[
            "Require a non-empty answer in the prompt",
            "Retry empty model responses with a bounded budget",
        ],
        (PatternKind::ContextOverflow, _) => &[
            "Summarize or truncate conversation history",
            "Use a sliding window over earlier turns",
            "Switch to a model with a larger context window",
        ],
        (PatternKind::DataQuality, _) => &[
            "Record tool names, timestamps and token usage in the trace exporter",
        ],
        (PatternKind::ContractViolation, _) => &[
            "Update tool schemas to match actual behavior",
            "Validate tool input before the call",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(category_for(PatternKind::Loop, None), Category::GraphCode);
        assert_eq!(category_for(PatternKind::RetryStorm, None), Category::GraphCode);
        assert_eq!(
            category_for(PatternKind::HallucinatedTool, Some(EventKind::ToolCall)),
            Category::ToolContract
        );
        assert_eq!(
            category_for(PatternKind::EmptyResponse, Some(EventKind::ToolCall)),
            Category::ToolContract
        );
        assert_eq!(
            category_for(PatternKind::EmptyResponse, Some(EventKind::ModelCall)),
            Category::PromptPolicy
        );
        assert_eq!(category_for(PatternKind::ContextOverflow, None), Category::Ops);
        assert_eq!(category_for(PatternKind::DataQuality, None), Category::Ops);
    }

    #[test]
    fn description_mentions_count_and_first_event() {
        let text = describe(
            PatternKind::HallucinatedTool,
            Category::ToolContract,
            2,
            Some(EventId(4)),
            "tool `send_mail` is not among the 1 available tools",
        );
        assert!(text.contains("2 findings"));
        assert!(text.contains("#4"));
        assert!(text.contains("send_mail"));
    }

    #[test]
    fn every_pattern_has_fixes() {
        for pattern in [
            PatternKind::Loop,
            PatternKind::RetryStorm,
            PatternKind::ErrorCascade,
            PatternKind::HallucinatedTool,
            PatternKind::EmptyResponse,
            PatternKind::ContextOverflow,
            PatternKind::DataQuality,
            PatternKind::ContractViolation,
        ] {
            let category = category_for(pattern, None);
            assert!(!suggested_fixes(pattern, category).is_empty());
        }
    }
}
