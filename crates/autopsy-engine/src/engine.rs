//! Engine facade
//!
//! One stateless pass: detector ∥ validator on the rayon pool, then the
//! hypothesis builder as a barrier, then bundle assembly.

use crate::bundle::{Bundle, BundleStatus};
use crate::config::EngineConfig;
use crate::error::AnalysisError;
use crate::hypothesis::HypothesisBuilder;
use autopsy_contract::{ContractRegistry, ContractValidator};
use autopsy_detect::PatternDetector;
use autopsy_model::{Environment, Trace, TraceDocument, TraceEvent};
use std::panic::{self, AssertUnwindSafe};
use tracing::{info, warn};

const VALIDATOR: &str = "contract_validator";

/// Deterministic pattern-detection and hypothesis engine
#[derive(Debug)]
pub struct AnalysisEngine {
    config: EngineConfig,
    detector: PatternDetector,
}

impl AnalysisEngine {
    /// Create engine from a validated configuration
    ///
    /// # Errors
    /// `AnalysisError::Config` if the configuration is out of range
    pub fn new(config: EngineConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: EngineConfig) -> Self {
        let detector = PatternDetector::standard(&config.detector);
        Self { config, detector }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze a validated trace
    ///
    /// Always returns a bundle; budget exhaustion and faulted checks show up
    /// in [`Bundle::status`].
    #[must_use]
    pub fn analyze(
        &self,
        trace: &Trace,
        environment: &Environment,
        registry: &ContractRegistry,
    ) -> Bundle {
        info!(
            run_id = trace.run_id().unwrap_or("-"),
            events = trace.len(),
            contracts = registry.len(),
            "analysis started"
        );

        let budget = self.config.budget.start();
        let (report, validation) = rayon::join(
            || self.detector.detect(trace, environment, &budget),
            || {
                panic::catch_unwind(AssertUnwindSafe(|| {
                    ContractValidator::new(registry).validate(trace, &budget)
                }))
            },
        );

        let mut status = if report.faulted().is_empty() {
            if report.aborted().is_empty() {
                BundleStatus::Clean
            } else {
                BundleStatus::Partial
            }
        } else {
            BundleStatus::FailedAnalysis
        };
        let mut incomplete: Vec<&str> = report
            .aborted()
            .iter()
            .chain(report.faulted())
            .copied()
            .collect();

        let violations = match validation {
            Ok(Ok(violations)) => violations,
            Ok(Err(reason)) => {
                warn!(%reason, "contract validation aborted, output discarded");
                if status == BundleStatus::Clean {
                    status = BundleStatus::Partial;
                }
                incomplete.push(VALIDATOR);
                Vec::new()
            }
            Err(_) => {
                warn!("contract validation panicked, output discarded");
                status = BundleStatus::FailedAnalysis;
                incomplete.push(VALIDATOR);
                Vec::new()
            }
        };
        incomplete.sort_unstable();
        if !report.missing_patterns().is_empty() {
            let patterns: Vec<&str> = report.missing_patterns().iter().map(|p| p.as_str()).collect();
            warn!(patterns = ?patterns, "results may omit these patterns");
        }

        let signals = report.into_signals();
        let hypotheses = HypothesisBuilder::new(&self.config.scoring).build(trace, &signals, &violations);

        let bundle = Bundle::new(status, signals, violations, hypotheses).with_incomplete_checks(incomplete);
        info!(
            status = %bundle.status(),
            signals = bundle.signals().len(),
            violations = bundle.violations().len(),
            hypotheses = bundle.hypotheses().len(),
            "analysis finished"
        );
        bundle
    }

    /// Validate raw events, then analyze
    ///
    /// # Errors
    /// `AnalysisError::InvalidInput` if ids are not strictly increasing or a
    /// parent id does not name an earlier event
    pub fn analyze_events(
        &self,
        events: Vec<TraceEvent>,
        environment: &Environment,
        registry: &ContractRegistry,
    ) -> Result<Bundle, AnalysisError> {
        let trace = Trace::new(events)?;
        Ok(self.analyze(&trace, environment, registry))
    }

    /// Validate an on-disk document, then analyze
    ///
    /// # Errors
    /// `AnalysisError::InvalidInput` as for [`Self::analyze_events`]
    pub fn analyze_document(
        &self,
        document: TraceDocument,
        registry: &ContractRegistry,
    ) -> Result<Bundle, AnalysisError> {
        let (trace, environment) = document.into_parts()?;
        Ok(self.analyze(&trace, &environment, registry))
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::from_valid(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopsy_model::{EventKind, TraceError};
    use autopsy_test_utils::{email_contracts, TraceBuilder};
    use serde_json::json;

    #[test]
    fn rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.scoring.placeholder_confidence = 2.0;
        assert!(matches!(AnalysisEngine::new(config), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn rejects_out_of_order_events() {
        let engine = AnalysisEngine::default();
        let err = engine
            .analyze_events(
                vec![TraceEvent::new(2, EventKind::Message), TraceEvent::new(1, EventKind::Message)],
                &Environment::new(),
                &ContractRegistry::new(),
            )
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(matches!(
            err,
            AnalysisError::InvalidInput(TraceError::NonIncreasingId { .. })
        ));
    }

    #[test]
    fn empty_trace_is_clean_with_no_hypotheses() {
        let bundle = AnalysisEngine::default().analyze(
            &Trace::default(),
            &Environment::new(),
            &ContractRegistry::new(),
        );
        assert_eq!(bundle.status(), BundleStatus::Clean);
        assert!(bundle.signals().is_empty());
        assert!(bundle.hypotheses().is_empty());
    }

    #[test]
    fn validator_runs_alongside_detector() {
        let trace = TraceBuilder::new()
            .tool("send_email", json!({"to": "a@b.c"}), json!({"status": "queued"}))
            .build();
        let env = Environment::new().with_tools(["send_email"]);
        let bundle = AnalysisEngine::default().analyze(&trace, &env, &email_contracts());
        assert_eq!(bundle.violations().len(), 1);
        assert_eq!(bundle.violations()[0].field(), "message_id");
        assert_eq!(bundle.top_hypothesis().unwrap().pattern(), Some(autopsy_model::PatternKind::ContractViolation));
    }

    #[test]
    fn exhausted_budget_marks_partial() {
        let engine = AnalysisEngine::new(EngineConfig::new().with_max_events_per_check(2)).unwrap();
        let trace = TraceBuilder::new()
            .tool("send_email", json!({"to": "x"}), json!({"message_id": "m"}))
            .message()
            .message()
            .build();
        let bundle = engine.analyze(&trace, &Environment::new(), &email_contracts());
        assert_eq!(bundle.status(), BundleStatus::Partial);
        assert!(bundle.incomplete_checks().contains(&"contract_validator".to_string()));
        assert!(bundle.violations().is_empty());
    }
}
