//! Engine configuration
//!
//! [`EngineConfig`] bundles detector thresholds, hypothesis scoring and the
//! processing budget. Every table is optional in TOML; absent keys keep their
//! documented defaults.
//!
//! ```toml
//! [detector.loop]
//! min_repeats = 3
//!
//! [detector.retry]
//! window_events = 5
//! window_secs = 30
//!
//! [scoring]
//! frequency_growth = 0.25
//! max_frequency_factor = 1.5
//!
//! [budget]
//! max_events_per_check = 100000
//! deadline_ms = 2000
//! ```

use crate::error::ConfigError;
use autopsy_detect::DetectorConfig;
use autopsy_model::{ScanBudget, Severity};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Check thresholds and signal confidences
    pub detector: DetectorConfig,
    /// Hypothesis scoring
    pub scoring: ScoringConfig,
    /// Per-pass processing budget
    pub budget: BudgetConfig,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With detector configuration
    #[inline]
    #[must_use]
    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// With scoring configuration
    #[inline]
    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// With per-check event ceiling
    #[inline]
    #[must_use]
    pub fn with_max_events_per_check(mut self, max: u64) -> Self {
        self.budget.max_events_per_check = Some(max);
        self
    }

    /// With pass deadline
    #[inline]
    #[must_use]
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.budget.deadline_ms = Some(deadline_ms);
        self
    }

    /// Parse TOML
    ///
    /// # Errors
    /// `ConfigError::Parse` for malformed TOML, `ConfigError::Invalid` for
    /// out-of-range values
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// `ConfigError::Render` if serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject nonsensical values
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detector;
        at_least("detector.loop.min_repeats", d.loops.min_repeats, 2)?;
        at_least("detector.retry.window_events", d.retry.window_events, 1)?;
        at_least("detector.retry.min_calls", d.retry.min_calls, 2)?;
        at_least("detector.retry.min_distinct_inputs", d.retry.min_distinct_inputs, 1)?;
        at_least("detector.cascade.max_gap", d.cascade.max_gap, 1)?;
        at_least("detector.cascade.min_length", d.cascade.min_length, 2)?;
        if d.retry.window_secs == Some(0) {
            return Err(ConfigError::invalid("detector.retry.window_secs", "must be positive"));
        }
        if d.overflow.context_limit == Some(0) {
            return Err(ConfigError::invalid(
                "detector.overflow.context_limit",
                "must be positive",
            ));
        }
        for (name, value) in d.confidence.entries() {
            unit_interval(&format!("detector.confidence.{name}"), value)?;
        }

        let s = &self.scoring;
        for severity in Severity::ALL {
            unit_interval(
                &format!("scoring.severity_weights.{severity}"),
                s.severity_weights.get(severity),
            )?;
        }
        if !s.frequency_growth.is_finite() || s.frequency_growth < 0.0 {
            return Err(ConfigError::invalid(
                "scoring.frequency_growth",
                "must be finite and non-negative",
            ));
        }
        if !s.max_frequency_factor.is_finite() || s.max_frequency_factor < 1.0 {
            return Err(ConfigError::invalid(
                "scoring.max_frequency_factor",
                "must be finite and at least 1.0",
            ));
        }
        unit_interval("scoring.placeholder_confidence", s.placeholder_confidence)?;

        if self.budget.max_events_per_check == Some(0) {
            return Err(ConfigError::invalid(
                "budget.max_events_per_check",
                "must be positive",
            ));
        }
        if self.budget.deadline_ms == Some(0) {
            return Err(ConfigError::invalid("budget.deadline_ms", "must be positive"));
        }
        Ok(())
    }
}

fn at_least(field: &str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::invalid(field, format!("must be at least {min}, got {value}")));
    }
    Ok(())
}

fn unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(field, format!("must be within [0, 1], got {value}")));
    }
    Ok(())
}

/// Hypothesis scoring parameters
///
/// `score = base_confidence × severity_weight × min(max_frequency_factor,
/// 1 + frequency_growth × ln(count))`, clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of a group's highest severity
    pub severity_weights: SeverityWeights,
    /// Growth of the frequency factor per log-occurrence
    pub frequency_growth: f64,
    /// Ceiling of the frequency factor
    pub max_frequency_factor: f64,
    /// Confidence of the nothing-found hypothesis
    pub placeholder_confidence: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            severity_weights: SeverityWeights::default(),
            frequency_growth: 0.25,
            max_frequency_factor: 1.5,
            placeholder_confidence: 0.05,
        }
    }
}

impl ScoringConfig {
    /// Sub-linear boost for repeated findings
    #[must_use]
    pub fn frequency_factor(&self, count: usize) -> f64 {
        if count <= 1 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = count as f64;
        (1.0 + self.frequency_growth * count.ln()).min(self.max_frequency_factor)
    }
}

/// Weight applied per severity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    /// Critical
    pub critical: f64,
    /// High
    pub high: f64,
    /// Medium
    pub medium: f64,
    /// Low
    pub low: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 1.0,
            high: 0.8,
            medium: 0.6,
            low: 0.4,
        }
    }
}

impl SeverityWeights {
    /// Weight for a severity
    #[inline]
    #[must_use]
    pub fn get(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// Processing budget, both limits optional
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Events a single check may visit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_events_per_check: Option<u64>,
    /// Wall-clock allowance for the whole pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl BudgetConfig {
    /// Start the clock: budget for a pass beginning now
    #[must_use]
    pub fn start(&self) -> ScanBudget {
        ScanBudget::new(
            self.max_events_per_check,
            self.deadline_ms.map(Duration::from_millis),
        )
    }
}
