//! Autopsy Detect
//!
//! Deterministic failure-pattern checks over a validated agent trace.
//!
//! # Core Concepts
//!
//! - [`Check`]: Pure, independent detector run against a [`Scan`]
//! - [`PatternDetector`]: Runs the battery in parallel with per-check isolation
//! - [`DetectorConfig`]: Thresholds and per-pattern confidences
//! - [`DetectionReport`]: Merged signals plus aborted/faulted check names
//!
//! # Example
//!
//! ```rust
//! use autopsy_detect::{DetectorConfig, PatternDetector};
//! use autopsy_model::{Environment, PatternKind, ScanBudget, Trace, TraceEvent};
//! use serde_json::json;
//!
//! let trace = Trace::new(
//!     (1..=3)
//!         .map(|i| TraceEvent::tool_call(i, "web_search", json!({"query": "rust"})))
//!         .collect(),
//! )
//! .unwrap();
//! let env = Environment::new().with_tools(["web_search"]);
//!
//! let report = PatternDetector::standard(&DetectorConfig::default())
//!     .detect(&trace, &env, &ScanBudget::unlimited());
//! assert_eq!(report.signals()[0].pattern(), PatternKind::Loop);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod check;
mod checks;
mod config;
mod detector;

pub use check::{Check, DataGap, Scan};
pub use checks::{
    ContextOverflowCheck, EmptyResponseCheck, ErrorCascadeCheck, HallucinatedToolCheck, LoopCheck,
    RetryStormCheck,
};
pub use config::{
    CascadeConfig, ConfidenceTable, DetectorConfig, LoopConfig, OverflowConfig, RetryConfig,
};
pub use detector::{DetectionReport, PatternDetector};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
