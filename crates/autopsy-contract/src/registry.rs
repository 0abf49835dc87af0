//! Tool contracts and the registry that holds them

use crate::shape::{Shape, ShapeError};
use autopsy_model::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Telemetry a contract can demand on every call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    /// `latency_ms`
    LatencyMs,
    /// `token_usage`
    TokenUsage,
}

impl MetadataField {
    /// Field name on the event
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LatencyMs => "latency_ms",
            Self::TokenUsage => "token_usage",
        }
    }
}

/// Declared input/output structure of one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContract {
    /// Tool name as it appears on tool_call events
    pub name: String,
    /// Expected input, unconstrained when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<Shape>,
    /// Expected output, unconstrained when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_shape: Option<Shape>,
    /// Metadata every call must carry
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub required_metadata: BTreeSet<MetadataField>,
}

impl ToolContract {
    /// Contract with no constraints
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_shape: None,
            output_shape: None,
            required_metadata: BTreeSet::new(),
        }
    }

    /// With input shape
    #[inline]
    #[must_use]
    pub fn with_input(mut self, shape: Shape) -> Self {
        self.input_shape = Some(shape);
        self
    }

    /// With output shape
    #[inline]
    #[must_use]
    pub fn with_output(mut self, shape: Shape) -> Self {
        self.output_shape = Some(shape);
        self
    }

    /// Demand a metadata field on every call
    #[inline]
    #[must_use]
    pub fn requiring(mut self, field: MetadataField) -> Self {
        self.required_metadata.insert(field);
        self
    }

    /// Shape for one side of the call
    #[must_use]
    pub fn shape(&self, direction: Direction) -> Option<&Shape> {
        match direction {
            Direction::Input => self.input_shape.as_ref(),
            Direction::Output => self.output_shape.as_ref(),
            Direction::Metadata => None,
        }
    }

    /// Check name and both shape descriptors
    ///
    /// # Errors
    /// `RegistryError::EmptyName` or `RegistryError::InvalidShape`
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        for direction in [Direction::Input, Direction::Output] {
            if let Some(shape) = self.shape(direction) {
                shape
                    .validate()
                    .map_err(|source| RegistryError::InvalidShape {
                        tool: self.name.clone(),
                        direction,
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

/// Registry loading failures
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Contract without a tool name
    #[error("contract has an empty tool name")]
    EmptyName,

    /// Two contracts for one tool
    #[error("duplicate contract for tool `{name}`")]
    Duplicate {
        /// Tool name
        name: String,
    },

    /// Defective shape descriptor
    #[error("invalid {direction} shape for tool `{tool}`: {source}")]
    InvalidShape {
        /// Tool name
        tool: String,
        /// Side of the call
        direction: Direction,
        /// Underlying defect
        #[source]
        source: ShapeError,
    },

    /// Malformed JSON
    #[error("contract registry parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tool name → contract, read-only during analysis
///
/// Serialized as a JSON array of contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ToolContract>", into = "Vec<ToolContract>")]
pub struct ContractRegistry {
    contracts: BTreeMap<String, ToolContract>,
}

impl ContractRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of contracts
    ///
    /// # Errors
    /// Fails on the first invalid or duplicate contract
    pub fn from_contracts<I>(contracts: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = ToolContract>,
    {
        let mut registry = Self::new();
        for contract in contracts {
            registry.register(contract)?;
        }
        Ok(registry)
    }

    /// Parse a JSON array of contracts
    ///
    /// # Errors
    /// `RegistryError::Parse` for malformed JSON, otherwise as [`Self::register`]
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let contracts: Vec<ToolContract> = serde_json::from_str(json)?;
        Self::from_contracts(contracts)
    }

    /// Add a contract
    ///
    /// # Errors
    /// Rejects invalid contracts and a second contract for the same tool
    pub fn register(&mut self, contract: ToolContract) -> Result<(), RegistryError> {
        contract.validate()?;
        if self.contracts.contains_key(&contract.name) {
            return Err(RegistryError::Duplicate {
                name: contract.name,
            });
        }
        self.contracts.insert(contract.name.clone(), contract);
        Ok(())
    }

    /// Contract for a tool
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolContract> {
        self.contracts.get(name)
    }

    /// Whether a tool has a contract
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.contracts.contains_key(name)
    }

    /// Number of contracts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Whether the registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Contracts in name order
    pub fn iter(&self) -> impl Iterator<Item = &ToolContract> {
        self.contracts.values()
    }
}

impl TryFrom<Vec<ToolContract>> for ContractRegistry {
    type Error = RegistryError;

    fn try_from(contracts: Vec<ToolContract>) -> Result<Self, Self::Error> {
        Self::from_contracts(contracts)
    }
}

impl From<ContractRegistry> for Vec<ToolContract> {
    fn from(registry: ContractRegistry) -> Self {
        registry.contracts.into_values().collect()
    }
}
