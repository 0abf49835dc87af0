//! Detector thresholds and confidences
//!
//! All structures deserialize with `#[serde(default)]`, so a partial TOML
//! table only overrides what it names.

use autopsy_model::{Confidence, PatternKind};
use serde::{Deserialize, Serialize};

/// Configuration for the whole check battery
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Loop check
    #[serde(rename = "loop")]
    pub loops: LoopConfig,
    /// Retry-storm check
    pub retry: RetryConfig,
    /// Error-cascade check
    pub cascade: CascadeConfig,
    /// Context-overflow check
    pub overflow: OverflowConfig,
    /// Per-pattern signal confidence
    pub confidence: ConfidenceTable,
}

impl DetectorConfig {
    /// Create configuration with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set loop repetition threshold
    #[inline]
    #[must_use]
    pub fn with_loop_min_repeats(mut self, n: usize) -> Self {
        self.loops.min_repeats = n;
        self
    }

    /// Set retry time window
    #[inline]
    #[must_use]
    pub fn with_retry_window_secs(mut self, secs: u64) -> Self {
        self.retry.window_secs = Some(secs);
        self
    }

    /// Override the context ceiling from the environment
    #[inline]
    #[must_use]
    pub fn with_context_limit(mut self, limit: u64) -> Self {
        self.overflow.context_limit = Some(limit);
        self
    }
}

/// Loop check thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Consecutive identical calls needed for a loop
    pub min_repeats: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { min_repeats: 3 }
    }
}

/// Retry-storm check thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Sliding window size, counted in tool calls
    pub window_events: usize,
    /// Max seconds between the oldest and newest call of a window, if set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_secs: Option<u64>,
    /// Calls needed for a storm
    pub min_calls: usize,
    /// Distinct inputs needed for a storm
    pub min_distinct_inputs: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            window_events: 5,
            window_secs: None,
            min_calls: 3,
            min_distinct_inputs: 2,
        }
    }
}

/// Error-cascade check thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Max position distance between chained failures
    pub max_gap: usize,
    /// Failures needed for a cascade
    pub min_length: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_gap: 3,
            min_length: 2,
        }
    }
}

/// Context-overflow check settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverflowConfig {
    /// Ceiling that takes precedence over the environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_limit: Option<u64>,
}

/// Confidence attached to each signal kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceTable {
    /// Loop
    #[serde(rename = "loop")]
    pub loops: f64,
    /// Retry storm
    pub retry_storm: f64,
    /// Error cascade
    pub error_cascade: f64,
    /// Hallucinated tool
    pub hallucinated_tool: f64,
    /// Empty response
    pub empty_response: f64,
    /// Context overflow
    pub context_overflow: f64,
    /// Data-quality gap
    pub data_quality: f64,
}

impl Default for ConfidenceTable {
    fn default() -> Self {
        Self {
            loops: 0.95,
            retry_storm: 0.80,
            error_cascade: 0.85,
            hallucinated_tool: 0.95,
            empty_response: 0.70,
            context_overflow: 0.90,
            data_quality: 0.50,
        }
    }
}

impl ConfidenceTable {
    /// Confidence for a detector pattern; contract violations carry their own
    #[must_use]
    pub fn get(&self, pattern: PatternKind) -> Confidence {
        let raw = match pattern {
            PatternKind::Loop => self.loops,
            PatternKind::RetryStorm => self.retry_storm,
            PatternKind::ErrorCascade => self.error_cascade,
            PatternKind::HallucinatedTool => self.hallucinated_tool,
            PatternKind::EmptyResponse => self.empty_response,
            PatternKind::ContextOverflow => self.context_overflow,
            PatternKind::DataQuality => self.data_quality,
            PatternKind::ContractViolation => 1.0,
        };
        Confidence::new(raw)
    }

    /// Entries as `(name, value)` pairs, for range validation
    #[must_use]
    pub fn entries(&self) -> [(&'static str, f64); 7] {
        [
            ("loop", self.loops),
            ("retry_storm", self.retry_storm),
            ("error_cascade", self.error_cascade),
            ("hallucinated_tool", self.hallucinated_tool),
            ("empty_response", self.empty_response),
            ("context_overflow", self.context_overflow),
            ("data_quality", self.data_quality),
        ]
    }
}
