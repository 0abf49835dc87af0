//! Analysis bundle: the immutable result of one pass

use autopsy_model::{Category, EventId, Hypothesis, Severity, Signal, Violation};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// How completely the pass ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    /// Every check and the validator completed
    Clean,
    /// At least one check ran out of budget; its output is missing
    Partial,
    /// At least one check panicked; its output is missing
    FailedAnalysis,
}

impl BundleStatus {
    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Partial => "partial",
            Self::FailedAnalysis => "failed_analysis",
        }
    }
}

impl Display for BundleStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals, violations and ranked hypotheses of one trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    status: BundleStatus,
    signals: Vec<Signal>,
    violations: Vec<Violation>,
    hypotheses: Vec<Hypothesis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    incomplete_checks: Vec<String>,
}

impl Bundle {
    /// Assemble a bundle; inputs are expected in canonical order
    #[must_use]
    pub fn new(
        status: BundleStatus,
        signals: Vec<Signal>,
        violations: Vec<Violation>,
        hypotheses: Vec<Hypothesis>,
    ) -> Self {
        Self {
            status,
            signals,
            violations,
            hypotheses,
            incomplete_checks: Vec::new(),
        }
    }

    /// With names of checks whose output is missing
    #[must_use]
    pub fn with_incomplete_checks<I, S>(mut self, checks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.incomplete_checks.extend(checks.into_iter().map(Into::into));
        self
    }

    /// Detector findings
    #[inline]
    #[must_use]
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Contract violations
    #[inline]
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Hypotheses, best first
    #[inline]
    #[must_use]
    pub fn hypotheses(&self) -> &[Hypothesis] {
        &self.hypotheses
    }

    /// Completion status
    #[inline]
    #[must_use]
    pub fn status(&self) -> BundleStatus {
        self.status
    }

    /// Checks that aborted or faulted
    #[inline]
    #[must_use]
    pub fn incomplete_checks(&self) -> &[String] {
        &self.incomplete_checks
    }

    /// Signals citing an event
    pub fn signals_for_event(&self, id: EventId) -> impl Iterator<Item = &Signal> + '_ {
        self.signals.iter().filter(move |s| s.mentions(id))
    }

    /// Violations on an event
    pub fn violations_for_event(&self, id: EventId) -> impl Iterator<Item = &Violation> + '_ {
        self.violations.iter().filter(move |v| v.event_id() == id)
    }

    /// Highest-ranked hypothesis
    #[inline]
    #[must_use]
    pub fn top_hypothesis(&self) -> Option<&Hypothesis> {
        self.hypotheses.first()
    }

    /// Hypotheses in one category, in rank order
    pub fn hypotheses_in(&self, category: Category) -> impl Iterator<Item = &Hypothesis> + '_ {
        self.hypotheses.iter().filter(move |h| h.category() == category)
    }

    /// Whether every check completed
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == BundleStatus::Clean
    }

    /// Complete pass with no findings at all
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.is_complete() && self.signals.is_empty() && self.violations.is_empty()
    }

    /// Findings per severity, most severe first
    #[must_use]
    pub fn severity_counts(&self) -> [(Severity, usize); 4] {
        Severity::ALL.map(|severity| {
            let count = self
                .signals
                .iter()
                .chain(self.violations.iter().map(Violation::signal))
                .filter(|s| s.severity() == severity)
                .count();
            (severity, count)
        })
    }

    /// One-line human summary
    #[must_use]
    pub fn summary(&self) -> String {
        let counts: Vec<String> = self
            .severity_counts()
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(severity, n)| format!("{n} {severity}"))
            .collect();

        let mut summary = if counts.is_empty() {
            "No significant issues detected.".to_string()
        } else {
            format!("Found {} finding(s): {}.", self.signals.len() + self.violations.len(), counts.join(", "))
        };

        if let Some(top) = self.top_hypothesis().filter(|h| !h.is_placeholder()) {
            summary.push_str(&format!(
                " Top hypothesis [{}]: {} (confidence {})",
                top.category(),
                top.description(),
                top.confidence()
            ));
        }
        if self.status != BundleStatus::Clean {
            summary.push_str(&format!(" Analysis {}: {} incomplete.", self.status, self.incomplete_checks.join(", ")));
        }
        summary
    }

    /// Pretty JSON rendering
    ///
    /// # Errors
    /// Propagates `serde_json` serialization failures
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
