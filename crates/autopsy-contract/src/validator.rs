//! Contract validation of tool calls
//!
//! Walks every tool_call of a trace, looks up its contract by name and turns
//! structural mismatches into [`Violation`]s. Calls without a contract are
//! skipped; unknown tools are the hallucination check's business.

use crate::registry::{ContractRegistry, MetadataField, ToolContract};
use crate::shape::{Mismatch, MismatchKind};
use autopsy_model::{
    BudgetExceeded, Confidence, Direction, ScanBudget, Severity, Trace, TraceEvent, Violation,
    ViolationDraft, ViolationKind,
};
use serde_json::Value;
use tracing::debug;

const MISSING_FIELD: (Severity, f64) = (Severity::High, 0.90);
const REQUIRED_KIND_MISMATCH: (Severity, f64) = (Severity::High, 0.85);
const OPTIONAL_KIND_MISMATCH: (Severity, f64) = (Severity::Medium, 0.75);
const UNEXPECTED_FIELD: (Severity, f64) = (Severity::Medium, 0.60);
const REQUIRED_METADATA: (Severity, f64) = (Severity::Medium, 0.60);
const ADVISORY_METADATA: (Severity, f64) = (Severity::Low, 0.50);

/// Validates tool calls against a borrowed registry
#[derive(Debug, Clone, Copy)]
pub struct ContractValidator<'a> {
    registry: &'a ContractRegistry,
}

impl<'a> ContractValidator<'a> {
    /// Create validator over a registry
    #[inline]
    #[must_use]
    pub fn new(registry: &'a ContractRegistry) -> Self {
        Self { registry }
    }

    /// Validate every tool call in the trace
    ///
    /// Output is ordered by event id, then severity (most severe first), then
    /// field path.
    ///
    /// # Errors
    /// Returns `BudgetExceeded` if the budget runs out before the last event;
    /// nothing validated so far is returned in that case.
    pub fn validate(
        &self,
        trace: &Trace,
        budget: &ScanBudget,
    ) -> Result<Vec<Violation>, BudgetExceeded> {
        let mut violations = Vec::new();
        if self.registry.is_empty() {
            return Ok(violations);
        }

        let mut meter = budget.meter();
        for event in trace.events() {
            meter.tick()?;
            if !event.is_tool_call() {
                continue;
            }
            let Some(contract) = event.name.as_deref().and_then(|n| self.registry.get(n)) else {
                continue;
            };
            violations.extend(validate_call(event, contract).into_iter().map(Violation::from));
        }

        violations.sort_by(Violation::canonical_cmp);
        debug!(
            events = meter.visited(),
            violations = violations.len(),
            "contract validation complete"
        );
        Ok(violations)
    }
}

/// All mismatches of one contracted call
///
/// Missing `latency_ms` is the only low-severity advisory. Token usage is
/// reported by model calls, not tool calls, so an absent `token_usage` is
/// flagged only when the contract lists it in `required_metadata`.
fn validate_call(event: &TraceEvent, contract: &ToolContract) -> Vec<ViolationDraft> {
    let mut drafts = Vec::new();

    if let Some(shape) = &contract.input_shape {
        let input = event.input.as_ref().unwrap_or(&Value::Null);
        for mismatch in shape.mismatches(input) {
            drafts.push(structural(event, contract, Direction::Input, mismatch));
        }
    }

    if let (Some(shape), Some(output), false) =
        (&contract.output_shape, event.output_value(), event.has_error)
    {
        for mismatch in shape.mismatches(output) {
            drafts.push(structural(event, contract, Direction::Output, mismatch));
        }
    }

    for field in &contract.required_metadata {
        let present = match field {
            MetadataField::LatencyMs => event.latency_ms.is_some(),
            MetadataField::TokenUsage => event.token_usage.is_some(),
        };
        if !present {
            drafts.push(metadata(
                event,
                contract,
                *field,
                "required by the contract",
                REQUIRED_METADATA,
            ));
        }
    }

    if event.latency_ms.is_none() && !contract.required_metadata.contains(&MetadataField::LatencyMs)
    {
        drafts.push(metadata(
            event,
            contract,
            MetadataField::LatencyMs,
            "not recorded (advisory)",
            ADVISORY_METADATA,
        ));
    }

    drafts
}

fn structural(
    event: &TraceEvent,
    contract: &ToolContract,
    direction: Direction,
    mismatch: Mismatch,
) -> ViolationDraft {
    let Mismatch {
        path,
        kind,
        required,
    } = mismatch;

    let (kind, detail, suggested_fix, (severity, confidence)) = match kind {
        MismatchKind::Missing => (
            ViolationKind::MissingField,
            "required field is missing".to_string(),
            format!("add field `{path}` to the {direction} schema or populate it"),
            MISSING_FIELD,
        ),
        MismatchKind::WrongKind { expected, found } => (
            ViolationKind::KindMismatch,
            format!("expected {expected}, found {found}"),
            format!("coerce type of `{path}` to {expected}"),
            if required {
                REQUIRED_KIND_MISMATCH
            } else {
                OPTIONAL_KIND_MISMATCH
            },
        ),
        MismatchKind::Unexpected => (
            ViolationKind::UnexpectedField,
            "field is not declared by the contract".to_string(),
            format!("remove field `{path}` or declare it in the {direction} schema"),
            UNEXPECTED_FIELD,
        ),
    };

    ViolationDraft {
        event_id: event.id,
        tool: contract.name.clone(),
        direction,
        kind,
        field: path,
        detail,
        suggested_fix,
        severity,
        confidence: Confidence::new(confidence),
    }
}

fn metadata(
    event: &TraceEvent,
    contract: &ToolContract,
    field: MetadataField,
    detail: &str,
    (severity, confidence): (Severity, f64),
) -> ViolationDraft {
    ViolationDraft {
        event_id: event.id,
        tool: contract.name.clone(),
        direction: Direction::Metadata,
        kind: ViolationKind::MissingMetadata,
        field: field.as_str().to_string(),
        detail: format!("`{}` {detail}", field.as_str()),
        suggested_fix: format!("record `{}` on every call to `{}`", field.as_str(), contract.name),
        severity,
        confidence: Confidence::new(confidence),
    }
}
