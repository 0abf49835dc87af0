//! Findings produced by the analysis pass
//!
//! A [`Signal`] is one deterministic detector finding. A [`Violation`] is a
//! signal raised by the contract validator and always points at exactly one
//! tool-call event. Both are immutable once built.

use crate::event::EventId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

/// Finding severity, totally ordered `Critical > High > Medium > Low`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Advisory
    Low,
    /// Degraded behaviour
    Medium,
    /// Likely cause of failure
    High,
    /// Run cannot succeed
    Critical,
}

impl Severity {
    /// All severities, most severe first
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of failure pattern a finding belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Identical tool call repeated back to back
    Loop,
    /// Same tool hammered with varying input
    RetryStorm,
    /// Chain of closely spaced failures
    ErrorCascade,
    /// Call to a tool the agent was never given
    HallucinatedTool,
    /// Model or tool returned nothing
    EmptyResponse,
    /// Cumulative tokens exceeded the context ceiling
    ContextOverflow,
    /// Event lacked data a check needed
    DataQuality,
    /// Tool input/output did not match its contract
    ContractViolation,
}

impl PatternKind {
    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loop => "loop",
            Self::RetryStorm => "retry_storm",
            Self::ErrorCascade => "error_cascade",
            Self::HallucinatedTool => "hallucinated_tool",
            Self::EmptyResponse => "empty_response",
            Self::ContextOverflow => "context_overflow",
            Self::DataQuality => "data_quality",
            Self::ContractViolation => "contract_violation",
        }
    }
}

impl Display for PatternKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence score, always within `[0, 1]`
///
/// Out-of-range inputs are clamped and NaN becomes zero, on construction and
/// on deserialization alike.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// No confidence
    pub const ZERO: Confidence = Confidence(0.0);
    /// Full confidence
    pub const ONE: Confidence = Confidence(1.0);

    /// Clamp a raw score into range
    #[inline]
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self::ZERO
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Total order for ranking
    #[inline]
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

impl Display for Confidence {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.0 * 100.0)
    }
}

/// Rejected evidence on a deserialized finding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvidenceError {
    /// Signal cites no event
    #[error("signal cites no event")]
    NoEvents,
    /// Violation must cite exactly one tool call
    #[error("violation must cite exactly one event, found {found}")]
    NotSingleEvent {
        /// Distinct ids cited
        found: usize,
    },
}

/// One deterministic finding
///
/// Evidence ids are non-empty, ascending and unique, on construction and on
/// deserialization alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SignalParts")]
pub struct Signal {
    pattern: PatternKind,
    severity: Severity,
    evidence_text: String,
    event_ids: Vec<EventId>,
    confidence: Confidence,
}

#[derive(Deserialize)]
struct SignalParts {
    pattern: PatternKind,
    severity: Severity,
    evidence_text: String,
    event_ids: Vec<EventId>,
    confidence: Confidence,
}

impl TryFrom<SignalParts> for Signal {
    type Error = EvidenceError;

    fn try_from(parts: SignalParts) -> Result<Self, Self::Error> {
        if parts.event_ids.is_empty() {
            return Err(EvidenceError::NoEvents);
        }
        Ok(Self::new(
            parts.pattern,
            parts.severity,
            parts.evidence_text,
            parts.event_ids,
            parts.confidence,
        ))
    }
}

impl Signal {
    /// Create a signal; evidence ids are sorted and deduplicated
    #[must_use]
    pub fn new(
        pattern: PatternKind,
        severity: Severity,
        evidence_text: impl Into<String>,
        mut event_ids: Vec<EventId>,
        confidence: impl Into<Confidence>,
    ) -> Self {
        debug_assert!(!event_ids.is_empty(), "signal without evidence");
        event_ids.sort_unstable();
        event_ids.dedup();
        Self {
            pattern,
            severity,
            evidence_text: evidence_text.into(),
            event_ids,
            confidence: confidence.into(),
        }
    }

    /// Pattern kind
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> PatternKind {
        self.pattern
    }

    /// Severity
    #[inline]
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Human-readable evidence
    #[inline]
    #[must_use]
    pub fn evidence_text(&self) -> &str {
        &self.evidence_text
    }

    /// Evidence event ids, ascending
    #[inline]
    #[must_use]
    pub fn event_ids(&self) -> &[EventId] {
        &self.event_ids
    }

    /// Confidence
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Earliest evidence event
    #[inline]
    #[must_use]
    pub fn first_event(&self) -> Option<EventId> {
        self.event_ids.first().copied()
    }

    /// Whether the event is part of the evidence
    #[inline]
    #[must_use]
    pub fn mentions(&self, id: EventId) -> bool {
        self.event_ids.binary_search(&id).is_ok()
    }

    /// Canonical ordering: earliest evidence, then most severe, then pattern
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.event_ids
            .cmp(&other.event_ids)
            .then_with(|| other.severity.cmp(&self.severity))
            .then_with(|| self.pattern.cmp(&other.pattern))
            .then_with(|| self.evidence_text.cmp(&other.evidence_text))
    }
}

/// Which side of a tool call a violation concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Arguments passed to the tool
    Input,
    /// Value returned by the tool
    Output,
    /// Telemetry attached to the call
    Metadata,
}

impl Direction {
    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Metadata => "metadata",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of contract mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Required field absent
    MissingField,
    /// Value has the wrong kind
    KindMismatch,
    /// Field not declared on a closed object
    UnexpectedField,
    /// Latency or token metadata absent (advisory)
    MissingMetadata,
}

/// Everything needed to build a [`Violation`]
#[derive(Debug, Clone)]
pub struct ViolationDraft {
    /// Offending tool call
    pub event_id: EventId,
    /// Tool name
    pub tool: String,
    /// Input, output or metadata
    pub direction: Direction,
    /// Mismatch kind
    pub kind: ViolationKind,
    /// Field path (`$` for the root value)
    pub field: String,
    /// What is wrong
    pub detail: String,
    /// How to fix it
    pub suggested_fix: String,
    /// Severity
    pub severity: Severity,
    /// Confidence
    pub confidence: Confidence,
}

/// Contract mismatch on a single tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ViolationParts")]
pub struct Violation {
    #[serde(flatten)]
    signal: Signal,
    tool: String,
    direction: Direction,
    violation_kind: ViolationKind,
    field: String,
    suggested_fix: String,
}

#[derive(Deserialize)]
struct ViolationParts {
    #[serde(flatten)]
    signal: Signal,
    tool: String,
    direction: Direction,
    violation_kind: ViolationKind,
    field: String,
    suggested_fix: String,
}

impl TryFrom<ViolationParts> for Violation {
    type Error = EvidenceError;

    fn try_from(parts: ViolationParts) -> Result<Self, Self::Error> {
        let found = parts.signal.event_ids.len();
        if found != 1 {
            return Err(EvidenceError::NotSingleEvent { found });
        }
        Ok(Self {
            signal: parts.signal,
            tool: parts.tool,
            direction: parts.direction,
            violation_kind: parts.violation_kind,
            field: parts.field,
            suggested_fix: parts.suggested_fix,
        })
    }
}

impl From<ViolationDraft> for Violation {
    fn from(draft: ViolationDraft) -> Self {
        let evidence = format!(
            "tool `{}` {} `{}`: {}; suggested fix: {}",
            draft.tool, draft.direction, draft.field, draft.detail, draft.suggested_fix
        );
        Self {
            signal: Signal::new(
                PatternKind::ContractViolation,
                draft.severity,
                evidence,
                vec![draft.event_id],
                draft.confidence,
            ),
            tool: draft.tool,
            direction: draft.direction,
            violation_kind: draft.kind,
            field: draft.field,
            suggested_fix: draft.suggested_fix,
        }
    }
}

impl Violation {
    /// The underlying signal
    #[inline]
    #[must_use]
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// The single tool-call event this violation references
    #[inline]
    #[must_use]
    pub fn event_id(&self) -> EventId {
        // Exactly one id on every construction path
        self.signal.first_event().unwrap_or_default()
    }

    /// Tool name
    #[inline]
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Input, output or metadata
    #[inline]
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Mismatch kind
    #[inline]
    #[must_use]
    pub fn violation_kind(&self) -> ViolationKind {
        self.violation_kind
    }

    /// Offending field path
    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Suggested remediation
    #[inline]
    #[must_use]
    pub fn suggested_fix(&self) -> &str {
        &self.suggested_fix
    }

    /// Severity of the underlying signal
    #[inline]
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.signal.severity
    }

    /// Canonical ordering: event, most severe, direction, field
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.event_id()
            .cmp(&other.event_id())
            .then_with(|| other.severity().cmp(&self.severity()))
            .then_with(|| self.direction.cmp(&other.direction))
            .then_with(|| self.field.cmp(&other.field))
            .then_with(|| self.violation_kind.cmp(&other.violation_kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn severity_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        let mut all = vec![Severity::Low, Severity::Critical, Severity::Medium, Severity::High];
        all.sort_by(|a, b| b.cmp(a));
        assert_eq!(all, Severity::ALL.to_vec());
    }

    #[test]
    fn confidence_clamps() {
        assert_eq!(Confidence::new(1.7).value(), 1.0);
        assert_eq!(Confidence::new(-0.2).value(), 0.0);
        assert_eq!(Confidence::new(f64::NAN).value(), 0.0);
        let parsed: Confidence = serde_json::from_str("3.5").unwrap();
        assert_eq!(parsed, Confidence::ONE);
    }

    #[test]
    fn signal_normalizes_ids() {
        let signal = Signal::new(
            PatternKind::ErrorCascade,
            Severity::High,
            "chain",
            vec![EventId(5), EventId(2), EventId(5)],
            0.8,
        );
        assert_eq!(signal.event_ids(), &[EventId(2), EventId(5)]);
        assert!(signal.mentions(EventId(5)));
        assert!(!signal.mentions(EventId(3)));
    }

    #[test]
    fn violation_evidence_names_field_and_fix() {
        let violation = Violation::from(ViolationDraft {
            event_id: EventId(3),
            tool: "send_email".into(),
            direction: Direction::Output,
            kind: ViolationKind::MissingField,
            field: "message_id".into(),
            detail: "required field is missing".into(),
            suggested_fix: "add field `message_id` to the output".into(),
            severity: Severity::High,
            confidence: Confidence::new(0.9),
        });
        assert_eq!(violation.event_id(), EventId(3));
        assert_eq!(violation.signal().pattern(), PatternKind::ContractViolation);
        assert!(violation.signal().evidence_text().contains("message_id"));
        assert!(violation.signal().evidence_text().contains("suggested fix"));

        let json = serde_json::to_value(&violation).unwrap();
        assert_eq!(json["pattern"], "contract_violation");
        assert_eq!(json["direction"], "output");
    }

    #[test]
    fn deserialized_signal_is_normalized() {
        let signal: Signal = serde_json::from_value(serde_json::json!({
            "pattern": "loop",
            "severity": "high",
            "evidence_text": "repeat",
            "event_ids": [3, 1, 3],
            "confidence": 0.5
        }))
        .unwrap();
        assert_eq!(signal.event_ids(), &[EventId(1), EventId(3)]);
        assert_eq!(signal.first_event(), Some(EventId(1)));
    }

    #[test]
    fn signal_without_events_is_rejected() {
        let err = serde_json::from_value::<Signal>(serde_json::json!({
            "pattern": "loop",
            "severity": "high",
            "evidence_text": "repeat",
            "event_ids": [],
            "confidence": 0.5
        }))
        .unwrap_err();
        assert!(err.to_string().contains("signal cites no event"));
    }

    #[test]
    fn violation_must_cite_one_event() {
        let violation = Violation::from(ViolationDraft {
            event_id: EventId(4),
            tool: "send_email".into(),
            direction: Direction::Input,
            kind: ViolationKind::MissingField,
            field: "to".into(),
            detail: "required field is missing".into(),
            suggested_fix: "add field `to` to the input".into(),
            severity: Severity::High,
            confidence: Confidence::new(0.9),
        });
        let json = serde_json::to_value(&violation).unwrap();
        let back: Violation = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back.event_id(), EventId(4));

        let mut empty = json.clone();
        empty["event_ids"] = serde_json::json!([]);
        assert!(serde_json::from_value::<Violation>(empty).is_err());

        let mut two = json;
        two["event_ids"] = serde_json::json!([4, 5]);
        let err = serde_json::from_value::<Violation>(two).unwrap_err();
        assert!(err.to_string().contains("exactly one event, found 2"));
    }

    proptest! {
        #[test]
        fn prop_confidence_in_range(raw in any::<f64>()) {
            let c = Confidence::new(raw).value();
            prop_assert!((0.0..=1.0).contains(&c));
        }
    }
}
