//! Autopsy Engine
//!
//! Turns a normalized agent trace into ranked, evidence-backed explanations
//! of why the run failed.
//!
//! # Pipeline
//!
//! ```text
//! Trace ──┬─> PatternDetector ───┐
//!         └─> ContractValidator ─┴─> HypothesisBuilder ─> Bundle
//! ```
//!
//! Detector and validator read the same immutable snapshot in parallel; the
//! builder waits for both. The pass is pure: no I/O, no input mutation.
//!
//! # Example
//!
//! ```rust
//! use autopsy_engine::{AnalysisEngine, BundleStatus};
//! use autopsy_contract::ContractRegistry;
//! use autopsy_model::{Category, Environment, TraceEvent};
//! use serde_json::json;
//!
//! let events = vec![
//!     TraceEvent::tool_call(1, "email_sender", json!({"to": "ops@example.com"})),
//!     TraceEvent::tool_call(2, "send_mail", json!({"to": "ops@example.com"})),
//! ];
//! let env = Environment::new().with_tools(["send_email"]);
//!
//! let bundle = AnalysisEngine::default()
//!     .analyze_events(events, &env, &ContractRegistry::new())
//!     .unwrap();
//!
//! assert_eq!(bundle.status(), BundleStatus::Clean);
//! assert_eq!(bundle.top_hypothesis().unwrap().category(), Category::ToolContract);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod bundle;
mod config;
mod engine;
mod error;
mod hypothesis;
pub mod rationale;

pub use bundle::{Bundle, BundleStatus};
pub use config::{BudgetConfig, EngineConfig, ScoringConfig, SeverityWeights};
pub use engine::AnalysisEngine;
pub use error::{AnalysisError, ConfigError};
pub use hypothesis::HypothesisBuilder;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
