//! Run environment
//!
//! What the agent was allowed to call and how much context it had.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Context windows of common model families, matched by substring
const KNOWN_MODEL_LIMITS: &[(&str, u64)] = &[
    ("gpt-4", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-3.5-turbo", 16_000),
    ("claude-3", 200_000),
    ("claude-2", 100_000),
    ("llama-3", 8_000),
    ("llama-3.1", 128_000),
    ("mistral", 32_000),
];

/// Look up the context window for a model identifier
///
/// Matching is case-insensitive and the longest matching family wins, so
/// `meta-llama/llama-3.1-8b` resolves to `llama-3.1`, not `llama-3`.
#[must_use]
pub fn known_model_limit(model: &str) -> Option<u64> {
    let model = model.to_lowercase();
    KNOWN_MODEL_LIMITS
        .iter()
        .filter(|(family, _)| model.contains(family))
        .max_by_key(|(family, _)| family.len())
        .map(|&(_, limit)| limit)
}

/// Environment the agent ran in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Tool names the agent was given
    #[serde(default)]
    pub available_tools: BTreeSet<String>,
    /// Token ceiling of the model context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_context_limit: Option<u64>,
    /// Model identifier, used to infer a ceiling when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Environment {
    /// Create an environment with no tools and no ceiling
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With available tools
    #[must_use]
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_tools.extend(tools.into_iter().map(Into::into));
        self
    }

    /// With explicit context ceiling
    #[inline]
    #[must_use]
    pub fn with_context_limit(mut self, limit: u64) -> Self {
        self.model_context_limit = Some(limit);
        self
    }

    /// With model identifier
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Whether the agent was given a tool with this name
    #[inline]
    #[must_use]
    pub fn has_tool(&self, name: &str) -> bool {
        self.available_tools.contains(name)
    }

    /// The tighter of the explicit ceiling and the known model window
    #[must_use]
    pub fn effective_context_limit(&self) -> Option<u64> {
        let inferred = self.model.as_deref().and_then(known_model_limit);
        match (self.model_context_limit, inferred) {
            (Some(explicit), Some(inferred)) => Some(explicit.min(inferred)),
            (explicit, inferred) => explicit.or(inferred),
        }
    }
}
