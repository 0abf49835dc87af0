use autopsy_contract::{ContractRegistry, FieldSpec, Shape, ToolContract};
use autopsy_engine::AnalysisEngine;
use autopsy_model::{Environment, EventKind, Hypothesis, PatternKind, Trace, TraceEvent};
use proptest::prelude::*;
use serde_json::json;

const TOOLS: [&str; 4] = ["web_search", "send_email", "email_sender", "fetch"];

fn arb_event() -> impl Strategy<Value = (u8, usize, u8, bool, Option<u16>)> {
    (0u8..4, 0usize..4, 0u8..3, any::<bool>(), proptest::option::of(0u16..2_000))
}

fn build_trace(specs: &[(u8, usize, u8, bool, Option<u16>)]) -> Trace {
    let events = specs
        .iter()
        .enumerate()
        .map(|(i, &(kind, tool, q, failed, tokens))| {
            let id = i as u64 + 1;
            let mut event = match kind {
                0 => TraceEvent::tool_call(id, TOOLS[tool], json!({ "q": q })),
                1 => TraceEvent::model_call(id, "gpt-4o").with_output(json!("answer")),
                2 => TraceEvent::new(id, EventKind::Message),
                _ => TraceEvent::new(id, EventKind::Error),
            };
            if failed {
                event = event.failed();
            }
            if let Some(t) = tokens {
                event = event.with_tokens(u64::from(t), 0);
            }
            event
        })
        .collect();
    Trace::new(events).unwrap()
}

fn env() -> Environment {
    Environment::new()
        .with_tools(["web_search", "send_email", "fetch"])
        .with_context_limit(5_000)
}

fn registry() -> ContractRegistry {
    ContractRegistry::from_contracts([ToolContract::new("send_email")
        .with_input(Shape::object([("to", FieldSpec::required(Shape::String))]))])
    .unwrap()
}

proptest! {
    #[test]
    fn prop_idempotent(specs in proptest::collection::vec(arb_event(), 0..40)) {
        let trace = build_trace(&specs);
        let engine = AnalysisEngine::default();
        let a = serde_json::to_string(&engine.analyze(&trace, &env(), &registry())).unwrap();
        let b = serde_json::to_string(&engine.analyze(&trace, &env(), &registry())).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_confidence_bounds(specs in proptest::collection::vec(arb_event(), 0..40)) {
        let trace = build_trace(&specs);
        let bundle = AnalysisEngine::default().analyze(&trace, &env(), &registry());
        for s in bundle.signals() {
            prop_assert!((0.0..=1.0).contains(&s.confidence().value()));
        }
        for v in bundle.violations() {
            prop_assert!((0.0..=1.0).contains(&v.signal().confidence().value()));
        }
        for h in bundle.hypotheses() {
            prop_assert!((0.0..=1.0).contains(&h.confidence().value()));
        }
    }

    #[test]
    fn prop_evidence_references_trace(specs in proptest::collection::vec(arb_event(), 0..40)) {
        let trace = build_trace(&specs);
        let bundle = AnalysisEngine::default().analyze(&trace, &env(), &registry());
        for s in bundle.signals() {
            prop_assert!(!s.event_ids().is_empty());
            prop_assert!(s.event_ids().windows(2).all(|w| w[0] < w[1]));
            for id in s.event_ids() {
                prop_assert!(trace.contains(*id));
            }
        }
        for v in bundle.violations() {
            let event = trace.get(v.event_id());
            prop_assert!(event.is_some_and(TraceEvent::is_tool_call));
        }
    }

    #[test]
    fn prop_hallucination_iff_unknown_tool(specs in proptest::collection::vec(arb_event(), 0..40)) {
        let trace = build_trace(&specs);
        let env = env();
        let bundle = AnalysisEngine::default().analyze(&trace, &env, &registry());
        let flagged: Vec<_> = bundle
            .signals()
            .iter()
            .filter(|s| s.pattern() == PatternKind::HallucinatedTool)
            .map(|s| s.event_ids()[0])
            .collect();
        let expected: Vec<_> = trace
            .tool_calls()
            .filter(|e| e.name.as_deref().is_some_and(|n| !env.has_tool(n)))
            .map(|e| e.id)
            .collect();
        prop_assert_eq!(flagged, expected);
    }

    #[test]
    fn prop_ranking_is_ordered(specs in proptest::collection::vec(arb_event(), 1..40)) {
        let trace = build_trace(&specs);
        let bundle = AnalysisEngine::default().analyze(&trace, &env(), &registry());
        let hypotheses = bundle.hypotheses();
        prop_assert!(!hypotheses.is_empty());
        for pair in hypotheses.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.confidence() >= b.confidence());
            if a.confidence() == b.confidence() {
                let (first_a, first_b) = (
                    a.supporting_event_ids().first(),
                    b.supporting_event_ids().first(),
                );
                prop_assert!(first_a <= first_b);
                if first_a == first_b {
                    prop_assert!(a.category().as_str() <= b.category().as_str());
                    if a.category() == b.category() {
                        let name = |h: &Hypothesis| h.pattern().map_or("", PatternKind::as_str);
                        prop_assert!(name(a) < name(b));
                    }
                }
            }
        }
    }
}
