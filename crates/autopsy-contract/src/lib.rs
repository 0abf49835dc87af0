//! Autopsy Contract
//!
//! Structural contracts for agent tools and the validator that checks
//! recorded tool calls against them.
//!
//! # Core Concepts
//!
//! - [`Shape`]: Tagged structural description (`string`, `object`, `array`, ...)
//! - [`ToolContract`]: Input/output shapes plus required metadata for one tool
//! - [`ContractRegistry`]: Tool name → contract, loaded from a JSON array
//! - [`ContractValidator`]: Turns mismatches into ordered [`Violation`]s
//!
//! # Example
//!
//! ```rust
//! use autopsy_contract::{ContractRegistry, ContractValidator, FieldSpec, Shape, ToolContract};
//! use autopsy_model::{ScanBudget, Trace, TraceEvent};
//! use serde_json::json;
//!
//! let registry = ContractRegistry::from_contracts([ToolContract::new("send_email")
//!     .with_output(Shape::object([("message_id", FieldSpec::required(Shape::String))]))])
//! .unwrap();
//!
//! let trace = Trace::new(vec![TraceEvent::tool_call(1, "send_email", json!({"to": "a@b.c"}))
//!     .with_output(json!({"status": "sent"}))
//!     .with_latency(40)])
//! .unwrap();
//!
//! let violations = ContractValidator::new(&registry)
//!     .validate(&trace, &ScanBudget::unlimited())
//!     .unwrap();
//! assert!(violations.iter().any(|v| v.field() == "message_id"));
//! ```
//!
//! [`Violation`]: autopsy_model::Violation

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod registry;
mod shape;
mod validator;

pub use registry::{ContractRegistry, MetadataField, RegistryError, ToolContract};
pub use shape::{value_kind, FieldSpec, Mismatch, MismatchKind, Shape, ShapeError};
pub use validator::ContractValidator;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
