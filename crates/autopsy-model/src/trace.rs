//! Validated traces
//!
//! [`Trace`] is the read-only snapshot every check runs against. Ordering is
//! load-bearing for all detectors, so a trace can only be constructed (or
//! deserialized) from events whose ids strictly increase and whose parents
//! point backwards.

use crate::environment::Environment;
use crate::event::{EventId, TraceEvent};
use serde::{Deserialize, Serialize};

/// Structural defects that make a trace unanalyzable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    /// Ids are duplicated or out of order
    #[error("event ids must be strictly increasing: {current} follows {previous}")]
    NonIncreasingId {
        /// Id of the preceding event
        previous: EventId,
        /// Offending id
        current: EventId,
    },

    /// Parent id does not name an earlier event
    #[error("event {event} references parent {parent}, which is not an earlier event")]
    UnknownParent {
        /// Event carrying the bad reference
        event: EventId,
        /// Referenced parent
        parent: EventId,
    },
}

/// Ordered, validated event sequence of one agent run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "TraceParts")]
pub struct Trace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_id: Option<String>,
    events: Vec<TraceEvent>,
}

#[derive(Deserialize)]
struct TraceParts {
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    events: Vec<TraceEvent>,
}

impl TryFrom<TraceParts> for Trace {
    type Error = TraceError;

    fn try_from(parts: TraceParts) -> Result<Self, Self::Error> {
        let trace = Self::new(parts.events)?;
        Ok(match parts.run_id {
            Some(run_id) => trace.with_run_id(run_id),
            None => trace,
        })
    }
}

impl Trace {
    /// Validate and wrap an event sequence
    ///
    /// # Errors
    /// - `TraceError::NonIncreasingId` if any id is not greater than its predecessor
    /// - `TraceError::UnknownParent` if a parent id is not an earlier event
    pub fn new(events: Vec<TraceEvent>) -> Result<Self, TraceError> {
        for (i, event) in events.iter().enumerate() {
            if i > 0 && event.id <= events[i - 1].id {
                return Err(TraceError::NonIncreasingId {
                    previous: events[i - 1].id,
                    current: event.id,
                });
            }
            if let Some(parent) = event.parent_id {
                // Prefix is sorted by the check above
                if events[..i].binary_search_by_key(&parent, |e| e.id).is_err() {
                    return Err(TraceError::UnknownParent {
                        event: event.id,
                        parent,
                    });
                }
            }
        }

        Ok(Self {
            run_id: None,
            events,
        })
    }

    /// With run identifier
    #[inline]
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Run identifier, if known
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// All events in chronological order
    #[inline]
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Number of events
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the trace has no events
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Position of an event in the sequence
    #[inline]
    #[must_use]
    pub fn position(&self, id: EventId) -> Option<usize> {
        self.events.binary_search_by_key(&id, |e| e.id).ok()
    }

    /// Get an event by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: EventId) -> Option<&TraceEvent> {
        self.position(id).map(|pos| &self.events[pos])
    }

    /// Whether an event with this id exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EventId) -> bool {
        self.position(id).is_some()
    }

    /// Tool-call subsequence, in order
    pub fn tool_calls(&self) -> impl Iterator<Item = &TraceEvent> + '_ {
        self.events.iter().filter(|e| e.is_tool_call())
    }

    /// Failed steps and error records, in order
    pub fn error_events(&self) -> impl Iterator<Item = &TraceEvent> + '_ {
        self.events.iter().filter(|e| e.is_error())
    }

    /// Sum of all reported token usage
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.events
            .iter()
            .filter_map(TraceEvent::total_tokens)
            .fold(0, u64::saturating_add)
    }
}

/// On-disk envelope: environment plus raw events
///
/// Events are validated only when the document is split with
/// [`TraceDocument::into_parts`], so a malformed trace surfaces as a
/// [`TraceError`] rather than a generic parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceDocument {
    /// Run identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Run environment
    #[serde(default)]
    pub environment: Environment,
    /// Unvalidated events
    #[serde(default)]
    pub events: Vec<TraceEvent>,
}

impl TraceDocument {
    /// Validate the events and split into trace and environment
    ///
    /// # Errors
    /// Returns `TraceError` if the event sequence is malformed
    pub fn into_parts(self) -> Result<(Trace, Environment), TraceError> {
        let mut trace = Trace::new(self.events)?;
        trace.run_id = self.run_id;
        Ok((trace, self.environment))
    }
}
