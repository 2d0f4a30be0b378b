mod common;

use common::{trace, traced, JsonStep};
use promo_core::step::SkipReason;
use promo_core::{ConditionGroup, CoreEngineError, FlowDefinition, FlowEngine, FlowEventKind, StepKind, StepStatus};
use serde_json::json;

fn fork(gate_payload: serde_json::Value, t: &std::sync::Arc<std::sync::Mutex<Vec<String>>>) -> FlowDefinition {
    FlowDefinition::builder().step(JsonStep::new("src", StepKind::Source, json!({"v": 1}), t).boxed())
                             .step_after(JsonStep::new("gate", StepKind::Gate, gate_payload, t).boxed(), &["src"])
                             .condition_group(ConditionGroup::new("Yes", "gate", "ok", true),
                                              vec![(JsonStep::new("yes", StepKind::Sink, json!({"y": 1}), t).boxed(), vec![])])
                             .condition_group(ConditionGroup::new("No", "gate", "ok", false),
                                              vec![(JsonStep::new("no", StepKind::Sink, json!({"n": 1}), t).boxed(), vec![]),
                                                   (JsonStep::new("after-no", StepKind::Sink, json!({}), t).boxed(),
                                                    vec!["no".to_string()])])
                             .build()
                             .unwrap()
}

#[tokio::test]
async fn true_gate_runs_only_the_matching_group() {
    let t = trace();
    let def = fork(json!({"ok": true}), &t);
    let mut engine = FlowEngine::new().definition(def).build();
    let flow_id = engine.run().await.unwrap();

    assert_eq!(traced(&t), vec!["src", "gate", "yes"]);
    let def = engine.definition().unwrap().clone();
    let inst = engine.instance(flow_id, &def).unwrap();
    assert_eq!(inst.status_of("yes"), Some(&StepStatus::Succeeded));
    assert_eq!(inst.status_of("no"),
               Some(&StepStatus::Skipped(SkipReason::BranchNotTaken { group: "No".into(),
                                                                       gate: "gate".into() })));
    assert_eq!(inst.status_of("after-no"),
               Some(&StepStatus::Skipped(SkipReason::UpstreamSkipped { step_id: "no".into() })));
    assert_eq!(inst.branch("gate", "ok"), Some(true));
    assert!(engine.flow_fingerprint().is_some());
}

#[tokio::test]
async fn false_gate_runs_the_other_group() {
    let t = trace();
    let mut engine = FlowEngine::new().definition(fork(json!({"ok": false}), &t)).build();
    engine.run().await.unwrap();
    assert_eq!(traced(&t), vec!["src", "gate", "no", "after-no"]);

    let selections: Vec<_> = engine.events()
                                   .unwrap()
                                   .into_iter()
                                   .filter_map(|e| match e.kind {
                                       FlowEventKind::BranchSelected { gate_id, value, .. } => Some((gate_id, value)),
                                       _ => None,
                                   })
                                   .collect();
    assert_eq!(selections, vec![("gate".to_string(), false)]);
}

#[tokio::test]
async fn gate_without_boolean_output_fails() {
    let t = trace();
    let mut engine = FlowEngine::new().definition(fork(json!({"ok": "yes"}), &t)).build();
    let err = engine.run().await.unwrap_err();
    assert_eq!(err, CoreEngineError::FlowFailed { failed_steps: vec!["gate".into()] });
    assert_eq!(traced(&t), vec!["src", "gate"]);
    let failed = engine.events().unwrap().into_iter().find_map(|e| match e.kind {
                                                         FlowEventKind::StepFailed { error, .. } => Some(error),
                                                         _ => None,
                                                     });
    assert_eq!(failed,
               Some(CoreEngineError::GateOutputNotBoolean { gate: "gate".into(),
                                                            key: "ok".into() }));
}

#[tokio::test]
async fn failure_short_circuits_dependents_but_not_independent_steps() {
    let t = trace();
    let def = FlowDefinition::builder().step(JsonStep::new("src", StepKind::Source, json!({}), &t).failing().boxed())
                                       .step(JsonStep::new("side", StepKind::Source, json!({}), &t).boxed())
                                       .step_after(JsonStep::new("gate", StepKind::Gate, json!({"ok": true}), &t).boxed(),
                                                   &["src"])
                                       .step_after(JsonStep::new("side-2", StepKind::Sink, json!({}), &t).boxed(), &["side"])
                                       .condition_group(ConditionGroup::new("Yes", "gate", "ok", true),
                                                        vec![(JsonStep::new("yes", StepKind::Sink, json!({}), &t).boxed(),
                                                              vec![])])
                                       .build()
                                       .unwrap();
    let mut engine = FlowEngine::new().definition(def).build();
    let err = engine.run().await.unwrap_err();
    assert_eq!(err, CoreEngineError::FlowFailed { failed_steps: vec!["src".into()] });

    let ran = traced(&t);
    assert!(ran.contains(&"side".to_string()));
    assert!(ran.contains(&"side-2".to_string()));
    assert!(!ran.contains(&"gate".to_string()));
    assert!(!ran.contains(&"yes".to_string()));

    let variants = engine.event_variants().unwrap();
    assert_eq!(variants.last(), Some(&"Z"));
    // Un flow cerrado no vuelve a ejecutarse.
    assert!(matches!(engine.next().await, Err(CoreEngineError::FlowFailed { .. })));
}
