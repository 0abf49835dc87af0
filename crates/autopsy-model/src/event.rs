//! Normalized trace events
//!
//! A [`TraceEvent`] is the unit every detector scans. Events are produced by
//! the ingestion collaborator and never modified by the analysis pass.

use crate::signature::CallSignature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Event identifier, unique and strictly increasing within a trace
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// Raw numeric value
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Kind of step recorded in the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Conversational message (user, system or assistant)
    Message,
    /// Call into a language model
    ModelCall,
    /// Tool invocation requested by the agent
    ToolCall,
    /// Standalone error record
    Error,
}

impl EventKind {
    /// Wire name of the kind
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::ModelCall => "model_call",
            Self::ToolCall => "tool_call",
            Self::Error => "error",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token accounting for a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens sent to the model
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens produced by the model
    #[serde(default)]
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Create usage from prompt and completion counts
    #[inline]
    #[must_use]
    pub const fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Prompt plus completion tokens
    #[inline]
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// A single normalized event of an agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Unique, strictly increasing identifier
    pub id: EventId,
    /// Wall-clock time the event started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Kind of step
    pub kind: EventKind,
    /// Tool or model identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Structured input (absent and `null` are equivalent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Structured output (absent and `null` are equivalent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Measured latency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Token accounting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    /// Causal parent, always an earlier event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EventId>,
    /// Whether the step failed
    #[serde(default)]
    pub has_error: bool,
}

impl TraceEvent {
    /// Create a bare event of the given kind
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<EventId>, kind: EventKind) -> Self {
        Self {
            id: id.into(),
            timestamp: None,
            kind,
            name: None,
            input: None,
            output: None,
            latency_ms: None,
            token_usage: None,
            parent_id: None,
            has_error: false,
        }
    }

    /// Shorthand for a named tool call with input
    #[must_use]
    pub fn tool_call(id: impl Into<EventId>, name: impl Into<String>, input: Value) -> Self {
        Self::new(id, EventKind::ToolCall)
            .with_name(name)
            .with_input(input)
    }

    /// Shorthand for a named model call
    #[must_use]
    pub fn model_call(id: impl Into<EventId>, model: impl Into<String>) -> Self {
        Self::new(id, EventKind::ModelCall).with_name(model)
    }

    /// With tool or model name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With structured input
    #[inline]
    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    /// With structured output
    #[inline]
    #[must_use]
    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// With timestamp
    #[inline]
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// With latency
    #[inline]
    #[must_use]
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    /// With token usage
    #[inline]
    #[must_use]
    pub fn with_tokens(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.token_usage = Some(TokenUsage::new(prompt_tokens, completion_tokens));
        self
    }

    /// With causal parent
    #[inline]
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<EventId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Mark the event as failed
    #[inline]
    #[must_use]
    pub fn failed(mut self) -> Self {
        self.has_error = true;
        self
    }

    /// Whether this is a tool invocation
    #[inline]
    #[must_use]
    pub fn is_tool_call(&self) -> bool {
        self.kind == EventKind::ToolCall
    }

    /// Whether this is a model invocation
    #[inline]
    #[must_use]
    pub fn is_model_call(&self) -> bool {
        self.kind == EventKind::ModelCall
    }

    /// Failed step or standalone error record
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.has_error || self.kind == EventKind::Error
    }

    /// Output, treating JSON `null` as absent
    #[inline]
    #[must_use]
    pub fn output_value(&self) -> Option<&Value> {
        self.output.as_ref().filter(|v| !v.is_null())
    }

    /// Whether the output is null, blank text or an empty collection
    #[must_use]
    pub fn has_empty_output(&self) -> bool {
        match self.output_value() {
            None => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        }
    }

    /// Total tokens, if the event carries usage
    #[inline]
    #[must_use]
    pub fn total_tokens(&self) -> Option<u64> {
        self.token_usage.map(|u| u.total())
    }

    /// Loop-detection signature; `None` unless this is a named tool call
    #[must_use]
    pub fn signature(&self) -> Option<CallSignature> {
        if !self.is_tool_call() {
            return None;
        }
        let name = self.name.as_deref()?;
        Some(CallSignature::new(name, self.input.as_ref()))
    }
}
