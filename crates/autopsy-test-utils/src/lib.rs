//! Testing utilities for the autopsy workspace
//!
//! Shared trace builders, canned scenarios and contract fixtures.

#![allow(missing_docs)]

use autopsy_contract::{ContractRegistry, FieldSpec, Shape, ToolContract};
use autopsy_model::{Environment, EventId, EventKind, Trace, TraceEvent};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

/// Fixed reference instant so timestamped fixtures are reproducible
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Builds traces with ids assigned 1, 2, 3, ...
#[derive(Debug, Default)]
pub struct TraceBuilder {
    events: Vec<TraceEvent>,
    run_id: Option<String>,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    fn next_id(&self) -> EventId {
        EventId(self.events.len() as u64 + 1)
    }

    /// Append an arbitrary event, renumbered to the next id
    pub fn push(mut self, mut event: TraceEvent) -> Self {
        event.id = self.next_id();
        self.events.push(event);
        self
    }

    pub fn message(self) -> Self {
        let id = self.next_id();
        self.push(TraceEvent::new(id, EventKind::Message))
    }

    pub fn model(self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> Self {
        let id = self.next_id();
        self.push(
            TraceEvent::model_call(id, model)
                .with_tokens(prompt_tokens, completion_tokens)
                .with_output(json!("ok")),
        )
    }

    pub fn tool(self, name: &str, input: Value, output: Value) -> Self {
        let id = self.next_id();
        self.push(
            TraceEvent::tool_call(id, name, input)
                .with_output(output)
                .with_latency(25),
        )
    }

    pub fn failed_tool(self, name: &str, input: Value) -> Self {
        let id = self.next_id();
        self.push(
            TraceEvent::tool_call(id, name, input)
                .with_latency(25)
                .failed(),
        )
    }

    pub fn error(self) -> Self {
        let id = self.next_id();
        self.push(TraceEvent::new(id, EventKind::Error))
    }

    /// Stamp every event `step_secs` apart starting at [`t0`]
    pub fn timed(mut self, step_secs: i64) -> Self {
        for (i, event) in self.events.iter_mut().enumerate() {
            event.timestamp = Some(t0() + Duration::seconds(step_secs * i as i64));
        }
        self
    }

    pub fn events(self) -> Vec<TraceEvent> {
        self.events
    }

    pub fn build(self) -> Trace {
        let run_id = self.run_id.clone();
        let trace = Trace::new(self.events).unwrap();
        match run_id {
            Some(run_id) => trace.with_run_id(run_id),
            None => trace,
        }
    }
}

/// Seven identical, failing `web_search` calls
pub fn repeated_failing_search() -> (Trace, Environment) {
    let mut builder = TraceBuilder::new().run_id("scenario-a");
    for _ in 0..7 {
        builder = builder.failed_tool("web_search", json!({"query": "latest rust release"}));
    }
    (
        builder.build(),
        Environment::new().with_tools(["web_search"]),
    )
}

/// Two calls to misnamed email tools while only `send_email` exists
pub fn misnamed_email_tools() -> (Trace, Environment) {
    let trace = TraceBuilder::new()
        .run_id("scenario-b")
        .model("gpt-4o", 120, 30)
        .tool("email_sender", json!({"to": "ops@example.com"}), json!({"status": "sent"}))
        .tool("send_mail", json!({"to": "ops@example.com"}), json!({"status": "sent"}))
        .build();
    (trace, Environment::new().with_tools(["send_email"]))
}

/// A short, healthy run
pub fn healthy_run() -> (Trace, Environment) {
    let trace = TraceBuilder::new()
        .run_id("scenario-c")
        .message()
        .model("gpt-4o", 200, 40)
        .tool(
            "web_search",
            json!({"query": "rust 2024 edition"}),
            json!({"results": ["https://blog.rust-lang.org"]}),
        )
        .model("gpt-4o", 400, 80)
        .message()
        .build();
    (
        trace,
        Environment::new()
            .with_tools(["web_search", "send_email"])
            .with_context_limit(128_000),
    )
}

/// Contract for `send_email` requiring a `message_id` in the output
pub fn email_contracts() -> ContractRegistry {
    ContractRegistry::from_contracts([ToolContract::new("send_email")
        .with_input(Shape::object([
            ("to", FieldSpec::required(Shape::String)),
            ("subject", FieldSpec::optional(Shape::String)),
        ]))
        .with_output(Shape::object([
            ("message_id", FieldSpec::required(Shape::String)),
            ("status", FieldSpec::optional(Shape::String)),
        ]))])
    .unwrap()
}
