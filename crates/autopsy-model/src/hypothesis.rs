//! Ranked root-cause explanations

use crate::event::EventId;
use crate::signal::{Confidence, PatternKind};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Where the fix for a failure most likely lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Control flow of the agent graph or its code
    GraphCode,
    /// Tool definitions, schemas and registrations
    ToolContract,
    /// Prompts and model-facing policy
    PromptPolicy,
    /// Runtime, limits and data plumbing
    Ops,
}

impl Category {
    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GraphCode => "graph_code",
            Self::ToolContract => "tool_contract",
            Self::PromptPolicy => "prompt_policy",
            Self::Ops => "ops",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate root-cause explanation with supporting evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    description: String,
    category: Category,
    confidence: Confidence,
    supporting_event_ids: Vec<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<PatternKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    suggested_fixes: Vec<String>,
}

impl Hypothesis {
    /// Create a hypothesis; supporting ids are sorted and deduplicated
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        category: Category,
        confidence: impl Into<Confidence>,
        mut supporting_event_ids: Vec<EventId>,
    ) -> Self {
        supporting_event_ids.sort_unstable();
        supporting_event_ids.dedup();
        Self {
            description: description.into(),
            category,
            confidence: confidence.into(),
            supporting_event_ids,
            pattern: None,
            suggested_fixes: Vec::new(),
        }
    }

    /// The single low-confidence entry emitted when nothing was found
    #[must_use]
    pub fn placeholder(confidence: impl Into<Confidence>) -> Self {
        Self::new(
            "No failure pattern detected; the run may have failed for reasons not visible in the trace",
            Category::Ops,
            confidence,
            Vec::new(),
        )
    }

    /// With the pattern this hypothesis was derived from
    #[inline]
    #[must_use]
    pub fn with_pattern(mut self, pattern: PatternKind) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// With remediation suggestions
    #[must_use]
    pub fn with_fixes<I, S>(mut self, fixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggested_fixes.extend(fixes.into_iter().map(Into::into));
        self
    }

    /// Human-readable rationale
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Fix category
    #[inline]
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// Confidence
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Evidence event ids, ascending
    #[inline]
    #[must_use]
    pub fn supporting_event_ids(&self) -> &[EventId] {
        &self.supporting_event_ids
    }

    /// Source pattern, absent for the placeholder
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> Option<PatternKind> {
        self.pattern
    }

    /// Remediation suggestions
    #[inline]
    #[must_use]
    pub fn suggested_fixes(&self) -> &[String] {
        &self.suggested_fixes
    }

    /// Whether this is the nothing-found entry
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.pattern.is_none() && self.supporting_event_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_shape() {
        let h = Hypothesis::placeholder(0.05);
        assert!(h.is_placeholder());
        assert_eq!(h.category(), Category::Ops);
        assert!(h.confidence().value() < 0.1);
        assert!(h.supporting_event_ids().is_empty());
    }

    #[test]
    fn supporting_ids_normalized() {
        let h = Hypothesis::new(
            "loop",
            Category::GraphCode,
            0.9,
            vec![EventId(4), EventId(2), EventId(4)],
        )
        .with_pattern(PatternKind::Loop)
        .with_fixes(["add a stop condition"]);
        assert_eq!(h.supporting_event_ids(), &[EventId(2), EventId(4)]);
        assert!(!h.is_placeholder());
        assert_eq!(h.suggested_fixes().len(), 1);
    }

    #[test]
    fn category_wire_names() {
        let json = serde_json::to_string(&Category::PromptPolicy).unwrap();
        assert_eq!(json, "\"prompt_policy\"");
        assert_eq!(Category::GraphCode.to_string(), "graph_code");
    }
}
