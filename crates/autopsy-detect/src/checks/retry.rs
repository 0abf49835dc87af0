//! Retry-storm detection
//!
//! Each tool keeps a sliding window over the last `window_events` tool calls
//! (positions count tool calls only) and, if a time window is set, over the
//! last `window_secs`. Whenever at least `min_calls` calls of one tool sit in
//! its window, those calls join the tool's storm cluster; overlapping windows
//! extend the same cluster.
//!
//! Calls that are part of an identical-signature run of `loop.min_repeats`
//! belong to the loop check and are left out before a cluster is scored, so
//! a cluster needs `min_calls` non-loop calls with `min_distinct_inputs`
//! distinct inputs to be reported.

use crate::check::{Check, Scan};
use crate::config::{LoopConfig, RetryConfig};
use autopsy_model::{
    BudgetExceeded, CallSignature, Confidence, EventId, InputDigest, PatternKind, Severity,
    Signal,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Detects a tool hammered with varying input
#[derive(Debug, Clone)]
pub struct RetryStormCheck {
    config: RetryConfig,
    loop_min_repeats: usize,
    confidence: Confidence,
}

#[derive(Debug, Clone, Copy)]
struct Call {
    id: EventId,
    position: usize,
    input: InputDigest,
    at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct ToolState {
    window: VecDeque<Call>,
    cluster: Vec<Call>,
}

/// Identical-signature run tracker, mirroring the loop check
#[derive(Debug, Default)]
struct LoopRuns {
    current: Option<CallSignature>,
    run: Vec<EventId>,
    members: BTreeSet<EventId>,
}

impl LoopRuns {
    fn push(&mut self, signature: Option<CallSignature>, id: EventId, min_repeats: usize) {
        match signature {
            Some(signature) if self.current.as_ref() == Some(&signature) => self.run.push(id),
            other => {
                self.flush(min_repeats);
                if other.is_some() {
                    self.run.push(id);
                }
                self.current = other;
            }
        }
    }

    fn flush(&mut self, min_repeats: usize) {
        if self.run.len() >= min_repeats {
            self.members.extend(self.run.iter().copied());
        }
        self.run.clear();
    }
}

impl RetryStormCheck {
    /// Create check from thresholds
    ///
    /// `loops` sets which identical-call runs are left to the loop check.
    #[must_use]
    pub fn new(config: RetryConfig, loops: LoopConfig, confidence: Confidence) -> Self {
        Self {
            config,
            loop_min_repeats: loops.min_repeats.max(2),
            confidence,
        }
    }

    fn in_window(&self, earlier: &Call, now: &Call) -> bool {
        if now.position - earlier.position >= self.config.window_events {
            return false;
        }
        match (self.config.window_secs, earlier.at, now.at) {
            (Some(secs), Some(start), Some(end)) => {
                let limit = i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX);
                (end - start).num_milliseconds() <= limit
            }
            // No time window, or a missing timestamp: positional window only
            _ => true,
        }
    }

    fn observe(&self, state: &mut ToolState, call: Call, finished: &mut Vec<Vec<Call>>) {
        state.window.retain(|earlier| self.in_window(earlier, &call));
        state.window.push_back(call);
        if state.window.len() < self.config.min_calls.max(1) {
            return;
        }

        let overlaps = state
            .cluster
            .last()
            .is_some_and(|last| state.window.iter().any(|c| c.id == last.id));
        if overlaps {
            let last = state.cluster.last().map_or(EventId(0), |c| c.id);
            state
                .cluster
                .extend(state.window.iter().filter(|c| c.id > last).copied());
        } else {
            if !state.cluster.is_empty() {
                finished.push(std::mem::take(&mut state.cluster));
            }
            state.cluster = state.window.iter().copied().collect();
        }
    }

    fn score(&self, tool: &str, cluster: &[Call], loops: &BTreeSet<EventId>) -> Option<Signal> {
        let calls: Vec<&Call> = cluster.iter().filter(|c| !loops.contains(&c.id)).collect();
        let distinct = calls.iter().map(|c| c.input).collect::<BTreeSet<_>>().len();
        if calls.len() < self.config.min_calls || distinct < self.config.min_distinct_inputs {
            return None;
        }
        Some(Signal::new(
            PatternKind::RetryStorm,
            Severity::High,
            format!(
                "tool `{tool}` called {} times with {distinct} distinct inputs within {} tool calls",
                calls.len(),
                self.config.window_events
            ),
            calls.iter().map(|c| c.id).collect(),
            self.confidence,
        ))
    }
}

impl Check for RetryStormCheck {
    fn name(&self) -> &'static str {
        "retry_storm"
    }

    fn pattern(&self) -> PatternKind {
        PatternKind::RetryStorm
    }

    fn run(&self, scan: &mut Scan<'_>) -> Result<Vec<Signal>, BudgetExceeded> {
        let mut tools: BTreeMap<&str, ToolState> = BTreeMap::new();
        let mut finished: Vec<(&str, Vec<Call>)> = Vec::new();
        let mut loops = LoopRuns::default();
        let mut position = 0usize;

        for event in scan.events() {
            scan.tick()?;
            if !event.is_tool_call() {
                continue;
            }
            position += 1;
            loops.push(event.signature(), event.id, self.loop_min_repeats);

            let Some(tool) = event.name.as_deref() else {
                scan.note_gap(event.id, "name");
                continue;
            };
            if self.config.window_secs.is_some() && event.timestamp.is_none() {
                scan.note_gap(event.id, "timestamp");
            }

            let call = Call {
                id: event.id,
                position,
                input: InputDigest::of(event.input.as_ref()),
                at: event.timestamp,
            };
            let mut closed = Vec::new();
            self.observe(tools.entry(tool).or_default(), call, &mut closed);
            finished.extend(closed.into_iter().map(|cluster| (tool, cluster)));
        }
        loops.flush(self.loop_min_repeats);

        for (tool, state) in tools {
            if !state.cluster.is_empty() {
                finished.push((tool, state.cluster));
            }
        }
        Ok(finished
            .iter()
            .filter_map(|(tool, cluster)| self.score(tool, cluster, &loops.members))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::run_check;
    use autopsy_model::{Environment, EventKind, Trace, TraceEvent};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn check(config: RetryConfig) -> RetryStormCheck {
        RetryStormCheck::new(config, LoopConfig::default(), Confidence::new(0.8))
    }

    fn call(id: u64, tool: &str, q: u64) -> TraceEvent {
        TraceEvent::tool_call(id, tool, json!({ "q": q }))
    }

    #[test]
    fn varying_inputs_form_a_storm() {
        let trace = Trace::new(vec![
            call(1, "fetch", 1),
            call(2, "fetch", 2),
            call(3, "other", 0),
            call(4, "fetch", 3),
        ])
        .unwrap();
        let (signals, _) = run_check(&check(RetryConfig::default()), &trace, &Environment::new());
        assert_eq!(signals.len(), 1);
        assert_eq!(
            signals[0].event_ids(),
            &[EventId(1), EventId(2), EventId(4)]
        );
        assert_eq!(signals[0].severity(), Severity::High);
    }

    #[test]
    fn identical_inputs_are_a_loop_not_a_storm() {
        let trace = Trace::new((1..=5).map(|i| call(i, "fetch", 7)).collect()).unwrap();
        let (signals, _) = run_check(&check(RetryConfig::default()), &trace, &Environment::new());
        assert!(signals.is_empty());
    }

    #[test]
    fn calls_outside_positional_window_split_runs() {
        let mut events = vec![call(1, "fetch", 1), call(2, "fetch", 2)];
        for id in 3..=8 {
            events.push(call(id, "other", id));
        }
        events.push(call(9, "fetch", 3));
        let trace = Trace::new(events).unwrap();
        let (signals, _) = run_check(&check(RetryConfig::default()), &trace, &Environment::new());
        // `other` is a storm of its own; `fetch` at 9 is 8 tool calls after 1 and 2
        assert_eq!(signals.len(), 1);
        assert!(signals[0].evidence_text().contains("`other`"));
    }

    #[test]
    fn non_tool_events_do_not_count_toward_window() {
        let mut events = vec![call(1, "fetch", 1)];
        for id in 2..=20 {
            events.push(TraceEvent::new(id, EventKind::Message));
        }
        events.push(call(21, "fetch", 2));
        events.push(call(22, "fetch", 3));
        let trace = Trace::new(events).unwrap();
        let (signals, _) = run_check(&check(RetryConfig::default()), &trace, &Environment::new());
        assert_eq!(signals.len(), 1);
    }

    #[test]
    fn time_window_splits_slow_retries() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let trace = Trace::new(vec![
            call(1, "fetch", 1).at(t0),
            call(2, "fetch", 2).at(t0 + Duration::seconds(5)),
            call(3, "fetch", 3).at(t0 + Duration::seconds(120)),
        ])
        .unwrap();
        let config = RetryConfig {
            window_secs: Some(60),
            ..RetryConfig::default()
        };
        let (signals, gaps) = run_check(&check(config), &trace, &Environment::new());
        assert!(signals.is_empty());
        assert!(gaps.is_empty());

        let (signals, _) = run_check(&check(RetryConfig::default()), &trace, &Environment::new());
        assert_eq!(signals.len(), 1);
    }

    #[test]
    fn missing_timestamp_falls_back_and_records_gap() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let trace = Trace::new(vec![
            call(1, "fetch", 1).at(t0),
            call(2, "fetch", 2),
            call(3, "fetch", 3).at(t0 + Duration::seconds(1)),
        ])
        .unwrap();
        let config = RetryConfig {
            window_secs: Some(60),
            ..RetryConfig::default()
        };
        let (signals, gaps) = run_check(&check(config), &trace, &Environment::new());
        assert_eq!(signals.len(), 1);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].field, "timestamp");
        assert_eq!(gaps[0].event, EventId(2));
    }

    #[test]
    fn round_robin_over_window_size_is_not_a_storm() {
        let tools = ["search", "read", "write", "list", "grep"];
        let trace = Trace::new(
            (1..=15)
                .map(|i| call(i, tools[(i as usize - 1) % tools.len()], i))
                .collect(),
        )
        .unwrap();
        let (signals, _) = run_check(&check(RetryConfig::default()), &trace, &Environment::new());
        assert!(signals.is_empty(), "{signals:?}");
    }

    #[test]
    fn window_is_bounded_to_recent_tool_calls() {
        // fetch every other call: three fetches always fit within five calls
        let mut events = Vec::new();
        for i in 1..=6u64 {
            let tool = if i % 2 == 1 { "fetch" } else { "parse" };
            events.push(call(i, tool, i));
        }
        let trace = Trace::new(events).unwrap();
        let (signals, _) = run_check(&check(RetryConfig::default()), &trace, &Environment::new());
        let fetch = signals
            .iter()
            .find(|s| s.evidence_text().contains("`fetch`"))
            .unwrap();
        assert_eq!(fetch.event_ids(), &[EventId(1), EventId(3), EventId(5)]);

        // every third call: only two fetches fit, so no storm
        let trace = Trace::new(
            (1..=9u64)
                .map(|i| call(i, if i % 3 == 1 { "fetch" } else { "parse" }, i))
                .collect(),
        )
        .unwrap();
        let (signals, _) = run_check(&check(RetryConfig::default()), &trace, &Environment::new());
        assert!(signals.iter().all(|s| !s.evidence_text().contains("`fetch`")));
    }

    #[test]
    fn loop_members_are_not_counted_as_retries() {
        let mut events: Vec<TraceEvent> = (1..=5).map(|i| call(i, "fetch", 1)).collect();
        events.push(call(6, "fetch", 2));
        let trace = Trace::new(events).unwrap();
        let (signals, _) = run_check(&check(RetryConfig::default()), &trace, &Environment::new());
        assert!(signals.is_empty(), "{signals:?}");
    }

    #[test]
    fn storm_next_to_a_loop_keeps_only_varying_calls() {
        let mut events: Vec<TraceEvent> = (1..=3).map(|i| call(i, "fetch", 0)).collect();
        events.extend((4..=6).map(|i| call(i, "fetch", i)));
        let trace = Trace::new(events).unwrap();
        let (signals, _) = run_check(&check(RetryConfig::default()), &trace, &Environment::new());
        assert_eq!(signals.len(), 1);
        assert_eq!(
            signals[0].event_ids(),
            &[EventId(4), EventId(5), EventId(6)]
        );
    }
}
