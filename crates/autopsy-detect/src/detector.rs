//! Pattern detector: runs the check battery over one trace
//!
//! Checks run in parallel on the rayon pool against the same immutable
//! snapshot. Each check is isolated: budget exhaustion discards that check's
//! output and a panic is caught and discarded the same way. Data gaps from
//! completed checks are merged into one advisory signal per event.

use crate::check::{Check, DataGap, Scan};
use crate::checks::{
    ContextOverflowCheck, EmptyResponseCheck, ErrorCascadeCheck, HallucinatedToolCheck, LoopCheck,
    RetryStormCheck,
};
use crate::config::DetectorConfig;
use autopsy_model::{
    BudgetExceeded, Confidence, Environment, EventId, PatternKind, ScanBudget, Severity, Signal,
    Trace,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// How a single check ended
#[derive(Debug)]
enum Outcome {
    Completed(Vec<Signal>, Vec<DataGap>),
    Aborted(BudgetExceeded),
    Faulted(String),
}

/// Result of one detection pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionReport {
    signals: Vec<Signal>,
    aborted: Vec<&'static str>,
    faulted: Vec<&'static str>,
    missing: Vec<PatternKind>,
}

impl DetectionReport {
    /// Signals in canonical order
    #[inline]
    #[must_use]
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Take the signals
    #[inline]
    #[must_use]
    pub fn into_signals(self) -> Vec<Signal> {
        self.signals
    }

    /// Checks that ran out of budget
    #[inline]
    #[must_use]
    pub fn aborted(&self) -> &[&'static str] {
        &self.aborted
    }

    /// Checks that panicked
    #[inline]
    #[must_use]
    pub fn faulted(&self) -> &[&'static str] {
        &self.faulted
    }

    /// Patterns whose check aborted or faulted, so their absence from
    /// [`Self::signals`] says nothing about the trace
    #[inline]
    #[must_use]
    pub fn missing_patterns(&self) -> &[PatternKind] {
        &self.missing
    }

    /// Whether every check ran to completion
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.aborted.is_empty() && self.faulted.is_empty()
    }
}

/// Fixed battery of independent checks
#[derive(Debug)]
pub struct PatternDetector {
    checks: Vec<Box<dyn Check>>,
    data_quality_confidence: Confidence,
}

impl PatternDetector {
    /// Detector with no checks
    #[must_use]
    pub fn empty(config: &DetectorConfig) -> Self {
        Self {
            checks: Vec::new(),
            data_quality_confidence: config.confidence.get(PatternKind::DataQuality),
        }
    }

    /// The six standard checks
    #[must_use]
    pub fn standard(config: &DetectorConfig) -> Self {
        let confidence = &config.confidence;
        Self::empty(config)
            .with_check(LoopCheck::new(config.loops, confidence.get(PatternKind::Loop)))
            .with_check(RetryStormCheck::new(
                config.retry,
                config.loops,
                confidence.get(PatternKind::RetryStorm),
            ))
            .with_check(ErrorCascadeCheck::new(
                config.cascade,
                confidence.get(PatternKind::ErrorCascade),
            ))
            .with_check(HallucinatedToolCheck::new(
                confidence.get(PatternKind::HallucinatedTool),
            ))
            .with_check(EmptyResponseCheck::new(
                confidence.get(PatternKind::EmptyResponse),
            ))
            .with_check(ContextOverflowCheck::new(
                config.overflow,
                confidence.get(PatternKind::ContextOverflow),
            ))
    }

    /// Add a check to the battery
    #[must_use]
    pub fn with_check(mut self, check: impl Check + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Names of the checks, in battery order
    pub fn check_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.checks.iter().map(|c| c.name())
    }

    /// Run every check over the trace
    #[must_use]
    pub fn detect(
        &self,
        trace: &Trace,
        environment: &Environment,
        budget: &ScanBudget,
    ) -> DetectionReport {
        let outcomes: Vec<(&'static str, PatternKind, Outcome)> = self
            .checks
            .par_iter()
            .map(|check| {
                let outcome = run_isolated(check.as_ref(), trace, environment, budget);
                (check.name(), check.pattern(), outcome)
            })
            .collect();

        let mut report = DetectionReport::default();
        let mut gaps: BTreeMap<EventId, BTreeSet<&'static str>> = BTreeMap::new();

        for (name, pattern, outcome) in outcomes {
            match outcome {
                Outcome::Completed(signals, check_gaps) => {
                    debug!(check = name, signals = signals.len(), "check complete");
                    report.signals.extend(signals);
                    for gap in check_gaps {
                        gaps.entry(gap.event).or_default().insert(gap.field);
                    }
                }
                Outcome::Aborted(reason) => {
                    warn!(check = name, %reason, "check aborted, output discarded");
                    report.aborted.push(name);
                    report.missing.push(pattern);
                }
                Outcome::Faulted(message) => {
                    warn!(check = name, %message, "check panicked, output discarded");
                    report.faulted.push(name);
                    report.missing.push(pattern);
                }
            }
        }

        report
            .signals
            .extend(gaps.into_iter().map(|(event, fields)| {
                data_quality_signal(event, &fields, self.data_quality_confidence)
            }));
        report.signals.sort_by(Signal::canonical_cmp);
        report.missing.sort_unstable();
        report.missing.dedup();
        report
    }
}

fn run_isolated(
    check: &dyn Check,
    trace: &Trace,
    environment: &Environment,
    budget: &ScanBudget,
) -> Outcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut scan = Scan::new(trace, environment, budget);
        check.run(&mut scan).map(|signals| (signals, scan.into_gaps()))
    }));

    match result {
        Ok(Ok((signals, gaps))) => Outcome::Completed(signals, gaps),
        Ok(Err(exceeded)) => Outcome::Aborted(exceeded),
        Err(payload) => Outcome::Faulted(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn data_quality_signal(
    event: EventId,
    fields: &BTreeSet<&'static str>,
    confidence: Confidence,
) -> Signal {
    let fields: Vec<&str> = fields.iter().copied().collect();
    Signal::new(
        PatternKind::DataQuality,
        Severity::Low,
        format!(
            "event {event} is missing {}; checks that need it skipped the event",
            fields.join(", ")
        ),
        vec![event],
        confidence,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopsy_model::{EventKind, TraceEvent};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Debug)]
    struct Exploding;

    impl Check for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn pattern(&self) -> PatternKind {
            PatternKind::Loop
        }

        fn run(&self, _scan: &mut Scan<'_>) -> Result<Vec<Signal>, BudgetExceeded> {
            panic!("boom");
        }
    }

    fn scenario_a() -> Trace {
        Trace::new(
            (1..=7)
                .map(|i| TraceEvent::tool_call(i, "web_search", json!({"query": "x"})).failed())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn standard_battery_has_six_checks() {
        let detector = PatternDetector::standard(&DetectorConfig::default());
        assert_eq!(
            detector.check_names().collect::<Vec<_>>(),
            vec![
                "loop",
                "retry_storm",
                "error_cascade",
                "hallucinated_tool",
                "empty_response",
                "context_overflow"
            ]
        );
    }

    #[test]
    fn repeated_failing_search_yields_loop_and_cascade() {
        let env = Environment::new().with_tools(["web_search"]);
        let report = PatternDetector::standard(&DetectorConfig::default()).detect(
            &scenario_a(),
            &env,
            &ScanBudget::unlimited(),
        );
        assert!(report.is_complete());
        let patterns: Vec<_> = report.signals().iter().map(Signal::pattern).collect();
        assert_eq!(patterns, vec![PatternKind::Loop, PatternKind::ErrorCascade]);
        for signal in report.signals() {
            assert_eq!(signal.event_ids().len(), 7);
        }
    }

    #[test]
    fn gaps_merge_into_one_signal_per_event() {
        let trace = Trace::new(vec![TraceEvent::new(1, EventKind::ToolCall)]).unwrap();
        let report = PatternDetector::standard(&DetectorConfig::default()).detect(
            &trace,
            &Environment::new(),
            &ScanBudget::unlimited(),
        );
        let quality: Vec<_> = report
            .signals()
            .iter()
            .filter(|s| s.pattern() == PatternKind::DataQuality)
            .collect();
        assert_eq!(quality.len(), 1);
        assert_eq!(quality[0].severity(), Severity::Low);
        assert!(quality[0].evidence_text().contains("name"));
    }

    #[test]
    fn panicking_check_is_isolated() {
        let detector = PatternDetector::standard(&DetectorConfig::default()).with_check(Exploding);
        let report = detector.detect(
            &scenario_a(),
            &Environment::new().with_tools(["web_search"]),
            &ScanBudget::unlimited(),
        );
        assert_eq!(report.faulted(), &["exploding"]);
        assert_eq!(report.missing_patterns(), &[PatternKind::Loop]);
        assert!(report.aborted().is_empty());
        assert_eq!(report.signals().len(), 2);
    }

    #[test]
    fn budget_exhaustion_discards_only_aborted_output() {
        let report = PatternDetector::standard(&DetectorConfig::default()).detect(
            &scenario_a(),
            &Environment::new(),
            &ScanBudget::new(Some(3), None),
        );
        // Overflow has no ceiling here and returns before visiting anything
        assert_eq!(report.aborted().len(), 5);
        assert!(!report.aborted().contains(&"context_overflow"));
        assert_eq!(
            report.missing_patterns(),
            &[
                PatternKind::Loop,
                PatternKind::RetryStorm,
                PatternKind::ErrorCascade,
                PatternKind::HallucinatedTool,
                PatternKind::EmptyResponse,
            ]
        );
        assert!(report.signals().is_empty());
        assert!(!report.is_complete());
    }

    #[test]
    fn empty_trace_yields_nothing() {
        let report = PatternDetector::standard(&DetectorConfig::default()).detect(
            &Trace::default(),
            &Environment::new(),
            &ScanBudget::unlimited(),
        );
        assert!(report.signals().is_empty());
        assert!(report.is_complete());
    }

    #[test]
    fn detection_is_deterministic() {
        let detector = PatternDetector::standard(&DetectorConfig::default());
        let env = Environment::new();
        let a = detector.detect(&scenario_a(), &env, &ScanBudget::unlimited());
        let b = detector.detect(&scenario_a(), &env, &ScanBudget::unlimited());
        assert_eq!(a, b);
    }
}
