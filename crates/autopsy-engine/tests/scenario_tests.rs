use autopsy_contract::ContractRegistry;
use autopsy_engine::{AnalysisEngine, Bundle, BundleStatus, EngineConfig};
use autopsy_model::{Category, Environment, EventId, PatternKind, Severity};
use autopsy_test_utils::{
    email_contracts, healthy_run, misnamed_email_tools, repeated_failing_search, TraceBuilder,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn ids_for(bundle: &Bundle, pattern: PatternKind) -> Vec<Vec<EventId>> {
    bundle
        .signals()
        .iter()
        .filter(|s| s.pattern() == pattern)
        .map(|s| s.event_ids().to_vec())
        .collect()
}

#[test]
fn test_repeated_failing_search() {
    let (trace, env) = repeated_failing_search();
    let bundle = AnalysisEngine::default().analyze(&trace, &env, &ContractRegistry::new());

    assert_eq!(bundle.status(), BundleStatus::Clean);
    let all: Vec<EventId> = (1..=7).map(EventId).collect();

    let loops: Vec<_> = bundle
        .signals()
        .iter()
        .filter(|s| s.pattern() == PatternKind::Loop)
        .collect();
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].event_ids(), all.as_slice());

    let cascades: Vec<_> = bundle
        .signals()
        .iter()
        .filter(|s| s.pattern() == PatternKind::ErrorCascade)
        .collect();
    assert_eq!(cascades.len(), 1);
    assert_eq!(cascades[0].event_ids(), all.as_slice());

    let top = bundle.top_hypothesis().unwrap();
    assert_eq!(top.category(), Category::GraphCode);
    assert_eq!(top.pattern(), Some(PatternKind::Loop));
    assert_eq!(top.supporting_event_ids(), all.as_slice());
}

#[test]
fn test_misnamed_email_tools() {
    let (trace, env) = misnamed_email_tools();
    let bundle = AnalysisEngine::default().analyze(&trace, &env, &email_contracts());

    let hallucinations: Vec<_> = bundle
        .signals()
        .iter()
        .filter(|s| s.pattern() == PatternKind::HallucinatedTool)
        .collect();
    assert_eq!(hallucinations.len(), 2);
    assert!(hallucinations.iter().all(|s| s.event_ids().len() == 1));
    assert!(bundle.violations().is_empty());

    let top = bundle.top_hypothesis().unwrap();
    assert_eq!(top.category(), Category::ToolContract);
    assert!(top.confidence().value() >= 0.85, "got {}", top.confidence());
}

#[test]
fn test_healthy_run() {
    let (trace, env) = healthy_run();
    let bundle = AnalysisEngine::default().analyze(&trace, &env, &ContractRegistry::new());

    assert_eq!(bundle.status(), BundleStatus::Clean);
    assert!(bundle.signals().is_empty());
    assert!(bundle.is_clean());
    assert_eq!(bundle.hypotheses().len(), 1);

    let placeholder = &bundle.hypotheses()[0];
    assert!(placeholder.is_placeholder());
    assert!(placeholder.supporting_event_ids().is_empty());
    assert!(placeholder.confidence().value() < 0.1);
}

#[test]
fn test_summary_reports_counts_and_top_hypothesis() {
    let (trace, env) = repeated_failing_search();
    let bundle = AnalysisEngine::default().analyze(&trace, &env, &ContractRegistry::new());
    let summary = bundle.summary();
    assert!(summary.contains("1 critical"));
    assert!(summary.contains("1 high"));
    assert!(summary.contains("graph_code"));
    assert_eq!(bundle.severity_counts()[0], (Severity::Critical, 1));
}

#[test]
fn test_signals_for_event() {
    let (trace, env) = repeated_failing_search();
    let bundle = AnalysisEngine::default().analyze(&trace, &env, &ContractRegistry::new());
    assert_eq!(bundle.signals_for_event(EventId(4)).count(), 2);
    assert_eq!(bundle.violations_for_event(EventId(4)).count(), 0);
}

#[test]
fn test_retry_time_window_and_trailing_errors() {
    let trace = TraceBuilder::new()
        .tool("fetch", json!({"q": 1}), json!({"ok": false}))
        .tool("fetch", json!({"q": 2}), json!({"ok": false}))
        .tool("fetch", json!({"q": 3}), json!({"ok": false}))
        .error()
        .error()
        .timed(40)
        .build();
    let env = Environment::new().with_tools(["fetch"]);
    let cascade = vec![vec![EventId(4), EventId(5)]];

    let bundle = AnalysisEngine::default().analyze(&trace, &env, &ContractRegistry::new());
    assert_eq!(
        ids_for(&bundle, PatternKind::RetryStorm),
        vec![vec![EventId(1), EventId(2), EventId(3)]]
    );
    assert_eq!(ids_for(&bundle, PatternKind::ErrorCascade), cascade);

    let config = EngineConfig::from_toml_str("[detector.retry]\nwindow_secs = 30\n").unwrap();
    let bundle = AnalysisEngine::new(config)
        .unwrap()
        .analyze(&trace, &env, &ContractRegistry::new());
    assert!(ids_for(&bundle, PatternKind::RetryStorm).is_empty());
    assert_eq!(ids_for(&bundle, PatternKind::ErrorCascade), cascade);
}
