//! Hypothesis builder
//!
//! Reduces the full set of signals and violations into ranked hypotheses.
//! Runs only after every check and the validator have finished.

use crate::config::ScoringConfig;
use crate::rationale;
use autopsy_model::{
    Category, Confidence, EventId, Hypothesis, PatternKind, Severity, Signal, Trace, Violation,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Findings sharing one `(pattern, category)` key
#[derive(Debug)]
struct Group<'a> {
    lead: &'a Signal,
    count: usize,
    max_confidence: Confidence,
    max_severity: Severity,
    event_ids: BTreeSet<EventId>,
    fixes: Vec<&'a str>,
}

impl<'a> Group<'a> {
    fn new(lead: &'a Signal) -> Self {
        Self {
            lead,
            count: 0,
            max_confidence: Confidence::ZERO,
            max_severity: Severity::Low,
            event_ids: BTreeSet::new(),
            fixes: Vec::new(),
        }
    }

    fn add(&mut self, signal: &'a Signal) {
        self.count += 1;
        if signal.confidence() > self.max_confidence {
            self.max_confidence = signal.confidence();
        }
        self.max_severity = self.max_severity.max(signal.severity());
        self.event_ids.extend(signal.event_ids().iter().copied());
    }
}

/// Builds ranked hypotheses from findings
#[derive(Debug, Clone, Copy)]
pub struct HypothesisBuilder<'a> {
    scoring: &'a ScoringConfig,
}

impl<'a> HypothesisBuilder<'a> {
    /// Create builder with scoring parameters
    #[inline]
    #[must_use]
    pub fn new(scoring: &'a ScoringConfig) -> Self {
        Self { scoring }
    }

    /// Group score before clamping
    #[must_use]
    pub fn raw_score(&self, base: Confidence, severity: Severity, count: usize) -> f64 {
        base.value() * self.scoring.severity_weights.get(severity) * self.scoring.frequency_factor(count)
    }

    /// One hypothesis per `(pattern, category)` group, ranked
    ///
    /// A non-empty trace with no findings yields the single placeholder; an
    /// empty trace yields nothing.
    #[must_use]
    pub fn build(&self, trace: &Trace, signals: &[Signal], violations: &[Violation]) -> Vec<Hypothesis> {
        if signals.is_empty() && violations.is_empty() {
            if trace.is_empty() {
                return Vec::new();
            }
            return vec![Hypothesis::placeholder(self.scoring.placeholder_confidence)];
        }

        let mut groups: BTreeMap<(PatternKind, Category), Group<'_>> = BTreeMap::new();
        for signal in signals {
            let kind = signal.first_event().and_then(|id| trace.get(id)).map(|e| e.kind);
            let category = rationale::category_for(signal.pattern(), kind);
            groups
                .entry((signal.pattern(), category))
                .or_insert_with(|| Group::new(signal))
                .add(signal);
        }
        for violation in violations {
            let signal = violation.signal();
            let group = groups
                .entry((PatternKind::ContractViolation, Category::ToolContract))
                .or_insert_with(|| Group::new(signal));
            group.add(signal);
            if !group.fixes.contains(&violation.suggested_fix()) {
                group.fixes.push(violation.suggested_fix());
            }
        }

        let mut hypotheses: Vec<Hypothesis> = groups
            .into_iter()
            .map(|((pattern, category), group)| self.hypothesis(pattern, category, group))
            .collect();
        hypotheses.sort_by(rank);
        hypotheses
    }

    fn hypothesis(&self, pattern: PatternKind, category: Category, group: Group<'_>) -> Hypothesis {
        let score = self.raw_score(group.max_confidence, group.max_severity, group.count);
        let ids: Vec<EventId> = group.event_ids.into_iter().collect();
        let description = rationale::describe(
            pattern,
            category,
            group.count,
            ids.first().copied(),
            group.lead.evidence_text(),
        );
        Hypothesis::new(description, category, Confidence::new(score), ids)
            .with_pattern(pattern)
            .with_fixes(group.fixes.into_iter().map(str::to_string))
            .with_fixes(rationale::suggested_fixes(pattern, category).iter().copied())
    }
}

/// Confidence descending, then earliest supporting id, category, pattern
fn rank(a: &Hypothesis, b: &Hypothesis) -> Ordering {
    b.confidence()
        .total_cmp(&a.confidence())
        .then_with(|| a.supporting_event_ids().first().cmp(&b.supporting_event_ids().first()))
        .then_with(|| a.category().as_str().cmp(b.category().as_str()))
        .then_with(|| {
            let name = |h: &Hypothesis| h.pattern().map_or("", PatternKind::as_str);
            name(a).cmp(name(b))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopsy_model::{Direction, TraceEvent, ViolationDraft, ViolationKind};
    use serde_json::json;

    fn trace() -> Trace {
        Trace::new(vec![
            TraceEvent::model_call(1, "gpt-4o").with_output(json!("")),
            TraceEvent::tool_call(2, "send_email", json!({})),
            TraceEvent::tool_call(3, "send_email", json!({})),
        ])
        .unwrap()
    }

    fn signal(pattern: PatternKind, severity: Severity, ids: &[u64], confidence: f64) -> Signal {
        Signal::new(
            pattern,
            severity,
            "evidence",
            ids.iter().copied().map(EventId).collect(),
            confidence,
        )
    }

    fn violation(id: u64, field: &str) -> Violation {
        Violation::from(ViolationDraft {
            event_id: EventId(id),
            tool: "send_email".into(),
            direction: Direction::Output,
            kind: ViolationKind::MissingField,
            field: field.into(),
            detail: "required field is missing".into(),
            suggested_fix: format!("add field `{field}` to the output schema or populate it"),
            severity: Severity::High,
            confidence: Confidence::new(0.9),
        })
    }

    #[test]
    fn placeholder_only_for_non_empty_trace() {
        let scoring = ScoringConfig::default();
        let builder = HypothesisBuilder::new(&scoring);

        let hypotheses = builder.build(&trace(), &[], &[]);
        assert_eq!(hypotheses.len(), 1);
        assert!(hypotheses[0].is_placeholder());
        assert_eq!(hypotheses[0].confidence().value(), 0.05);

        assert!(builder.build(&Trace::default(), &[], &[]).is_empty());
    }

    #[test]
    fn score_formula() {
        let scoring = ScoringConfig::default();
        let builder = HypothesisBuilder::new(&scoring);
        let single = builder.raw_score(Confidence::new(0.95), Severity::Critical, 1);
        assert!((single - 0.95).abs() < 1e-9);
        let pair = builder.raw_score(Confidence::new(0.95), Severity::High, 2);
        assert!((pair - 0.95 * 0.8 * (1.0 + 0.25 * 2f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn score_is_clamped() {
        let scoring = ScoringConfig {
            max_frequency_factor: 3.0,
            frequency_growth: 1.0,
            ..ScoringConfig::default()
        };
        let signals: Vec<_> = (0..10)
            .map(|_| signal(PatternKind::Loop, Severity::Critical, &[2], 1.0))
            .collect();
        let hypotheses = HypothesisBuilder::new(&scoring).build(&trace(), &signals, &[]);
        assert_eq!(hypotheses[0].confidence().value(), 1.0);
    }

    #[test]
    fn groups_by_pattern_and_unions_ids() {
        let scoring = ScoringConfig::default();
        let signals = vec![
            signal(PatternKind::HallucinatedTool, Severity::High, &[3], 0.95),
            signal(PatternKind::HallucinatedTool, Severity::High, &[2], 0.95),
        ];
        let hypotheses = HypothesisBuilder::new(&scoring).build(&trace(), &signals, &[]);
        assert_eq!(hypotheses.len(), 1);
        assert_eq!(hypotheses[0].category(), Category::ToolContract);
        assert_eq!(hypotheses[0].supporting_event_ids(), &[EventId(2), EventId(3)]);
        assert!(hypotheses[0].confidence().value() >= 0.85);
    }

    #[test]
    fn empty_response_category_follows_event_kind() {
        let scoring = ScoringConfig::default();
        let signals = vec![
            signal(PatternKind::EmptyResponse, Severity::Medium, &[1], 0.7),
            signal(PatternKind::EmptyResponse, Severity::Medium, &[2], 0.7),
        ];
        let hypotheses = HypothesisBuilder::new(&scoring).build(&trace(), &signals, &[]);
        let categories: BTreeSet<_> = hypotheses.iter().map(Hypothesis::category).collect();
        assert_eq!(
            categories,
            BTreeSet::from([Category::PromptPolicy, Category::ToolContract])
        );
    }

    #[test]
    fn violations_contribute_their_fixes() {
        let scoring = ScoringConfig::default();
        let violations = vec![violation(2, "message_id"), violation(3, "message_id")];
        let hypotheses = HypothesisBuilder::new(&scoring).build(&trace(), &[], &violations);
        assert_eq!(hypotheses.len(), 1);
        let h = &hypotheses[0];
        assert_eq!(h.pattern(), Some(PatternKind::ContractViolation));
        assert_eq!(
            h.suggested_fixes()
                .iter()
                .filter(|f| f.contains("message_id"))
                .count(),
            1
        );
    }

    #[test]
    fn ranking_breaks_ties_by_earliest_event() {
        let scoring = ScoringConfig::default();
        let signals = vec![
            signal(PatternKind::ErrorCascade, Severity::High, &[2, 3], 0.85),
            signal(PatternKind::RetryStorm, Severity::High, &[1, 2], 0.85),
        ];
        let hypotheses = HypothesisBuilder::new(&scoring).build(&trace(), &signals, &[]);
        assert_eq!(hypotheses[0].pattern(), Some(PatternKind::RetryStorm));
        assert_eq!(hypotheses[1].pattern(), Some(PatternKind::ErrorCascade));
    }

    #[test]
    fn ranking_falls_back_to_category_then_pattern() {
        let scoring = ScoringConfig::default();
        let signals = vec![
            signal(PatternKind::EmptyResponse, Severity::Medium, &[1], 0.7),
            signal(PatternKind::DataQuality, Severity::Medium, &[1], 0.7),
            signal(PatternKind::ContextOverflow, Severity::Medium, &[1, 3], 0.7),
        ];
        let hypotheses = HypothesisBuilder::new(&scoring).build(&trace(), &signals, &[]);
        assert_eq!(hypotheses.len(), 3);
        assert!(hypotheses
            .windows(2)
            .all(|w| w[0].confidence() == w[1].confidence()));

        let order: Vec<_> = hypotheses
            .iter()
            .map(|h| (h.category(), h.pattern()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Category::Ops, Some(PatternKind::ContextOverflow)),
                (Category::Ops, Some(PatternKind::DataQuality)),
                (Category::PromptPolicy, Some(PatternKind::EmptyResponse)),
            ]
        );
    }
}
