//! Autopsy Model
//!
//! Value types shared by every stage of the analysis pass.
//!
//! # Core Concepts
//!
//! - [`TraceEvent`]: One normalized step of an agent run (model call, tool call, ...)
//! - [`Trace`]: Validated, read-only event sequence (ids strictly increasing)
//! - [`Environment`]: Tools the agent could call and its context ceiling
//! - [`CallSignature`]: `(tool, BLAKE3 digest of canonical input)` used for loop detection
//! - [`Signal`] / [`Violation`]: Deterministic findings with evidence event ids
//! - [`Hypothesis`]: Ranked, categorized explanation built from findings
//! - [`ScanBudget`]: Per-check event ceiling and pass deadline
//!
//! # Example
//!
//! ```rust
//! use autopsy_model::{EventId, EventKind, Trace, TraceEvent};
//! use serde_json::json;
//!
//! let trace = Trace::new(vec![
//!     TraceEvent::new(EventId(1), EventKind::ModelCall).with_name("gpt-4o"),
//!     TraceEvent::new(EventId(2), EventKind::ToolCall)
//!         .with_name("web_search")
//!         .with_input(json!({"query": "rust"}))
//!         .with_parent(EventId(1)),
//! ])
//! .unwrap();
//!
//! assert_eq!(trace.tool_calls().count(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod budget;
mod environment;
mod event;
mod hypothesis;
mod signal;
mod signature;
mod trace;

pub use budget::{BudgetExceeded, Meter, ScanBudget};
pub use environment::{known_model_limit, Environment};
pub use event::{EventId, EventKind, TokenUsage, TraceEvent};
pub use hypothesis::{Category, Hypothesis};
pub use signal::{
    Confidence, Direction, EvidenceError, PatternKind, Severity, Signal, Violation,
    ViolationDraft, ViolationKind,
};
pub use signature::{CallSignature, InputDigest};
pub use trace::{Trace, TraceDocument, TraceError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
