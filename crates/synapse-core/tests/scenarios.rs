//! End-to-end mitigation scenarios

use chrono::{Duration, Utc};
use std::sync::Arc;
use std::thread;

use synapse_core::gates::templates::default_gates;
use synapse_core::{
    ComponentRegistration, ComponentState, EnforcementPoint, EventChannel, GateScope,
    MitigationAction, MitigationConfig, MitigationEngine, PolicyGateEvaluator, PruneTransition,
    TelemetrySample,
};

fn engine() -> Arc<MitigationEngine> {
    Arc::new(MitigationEngine::new(MitigationConfig::default()).unwrap())
}

fn sample(id: &str, cpu: f64, memory: f64) -> TelemetrySample {
    TelemetrySample {
        cpu_usage: cpu,
        memory_usage: memory,
        throughput: 600.0,
        io_latency_ms: 40.0,
        temperature_c: Some(55.0),
        ..TelemetrySample::new(id)
    }
}

#[test]
fn hot_busy_hardware_stays_balanced_but_controller_trims() {
    let engine = engine();
    engine
        .register(ComponentRegistration::new("motor-ctl", "rover"))
        .unwrap();

    let telemetry = TelemetrySample {
        cpu_usage: 90.0,
        memory_usage: 80.0,
        temperature_c: Some(90.0),
        throughput: 500.0,
        io_latency_ms: 50.0,
        error_rate: 0.01,
        ..TelemetrySample::new("motor-ctl")
    };
    let outcome = engine.process_telemetry(&telemetry).unwrap();

    let balance = outcome.balance.expect("balance observed");
    assert!((balance.sample.hw_capacity - 18.0).abs() < 1e-9);
    assert!((balance.sample.sw_demand - 34.5).abs() < 1e-9);
    assert!((balance.smoothed_imbalance + 0.165).abs() < 1e-9);
    assert_eq!(balance.decision.action, MitigationAction::None);

    // cpu 20 points over target: one controller step of -0.13
    assert!((outcome.throttle_level - 0.87).abs() < 1e-9);
    assert_eq!(outcome.decision.action, MitigationAction::None);
    assert!(outcome.triggered.is_empty());
}

#[test]
fn full_quarantine_cycle() {
    let engine = engine();
    engine
        .register(ComponentRegistration::new("sensor-hub", "rover").with_debt(2, 1000, 10))
        .unwrap();
    let mut events = engine.subscribe();

    let t0 = Utc::now();
    let mut failing = sample("sensor-hub", 70.0, 50.0);
    failing.error_rate = 0.08;
    let outcome = engine.process_telemetry_at(&failing, t0).unwrap();
    assert!(matches!(outcome.transition, PruneTransition::Quarantined { .. }));
    assert_eq!(outcome.throttle_level, 0.0);

    // still failing: no second record, still zero
    let again = engine.process_telemetry_at(&failing, t0 + Duration::minutes(1)).unwrap();
    assert!(matches!(
        again.transition,
        PruneTransition::Unchanged {
            state: ComponentState::Quarantined
        }
    ));
    assert_eq!(again.throttle_level, 0.0);
    let record = engine.snapshot("sensor-hub").unwrap().quarantine.unwrap();
    assert_eq!(record.quarantined_at, t0);

    engine.update_health("sensor-hub", 75.0).unwrap();
    let healthy = sample("sensor-hub", 70.0, 50.0);
    let early = engine
        .process_telemetry_at(&healthy, t0 + Duration::minutes(30))
        .unwrap();
    assert!(early.quarantined);

    let late = engine
        .process_telemetry_at(&healthy, t0 + Duration::minutes(90))
        .unwrap();
    assert!(matches!(late.transition, PruneTransition::Restored { .. }));
    assert!((late.throttle_level - 0.5).abs() < 1e-9);
    assert_eq!(
        engine.snapshot("sensor-hub").unwrap().state,
        ComponentState::Active
    );

    let mut quarantined = 0;
    let mut restored = 0;
    while let Ok(event) = events.try_recv() {
        match event.channel {
            EventChannel::ComponentQuarantined => quarantined += 1,
            EventChannel::ComponentRestored => restored += 1,
            _ => {}
        }
    }
    assert_eq!(quarantined, 1);
    assert_eq!(restored, 1);
}

#[test]
fn debt_gates_follow_engine_state() {
    let engine = engine();
    engine
        .register(ComponentRegistration::new("fpga", "rover").with_debt(5, 1000, 10))
        .unwrap();

    let debt_engine = Arc::clone(&engine);
    let quarantine_engine = Arc::clone(&engine);
    let gates = PolicyGateEvaluator::builder()
        .gates(default_gates())
        .resolver("debt_score", move |scope: &GateScope| {
            let project = scope.project_id.as_deref()?;
            debt_engine.project_debt(project).ok().flatten()
        })
        .resolver("quarantined_components", move |_: &GateScope| {
            quarantine_engine
                .system_health()
                .ok()
                .map(|h| h.quarantined_components as f64)
        })
        .build()
        .unwrap();

    assert!(gates.can_proceed_with_commit("rover", "abc123").unwrap());

    engine.update_debt_inputs("fpga", 8, 1000, 10).unwrap();
    let verdict = gates
        .check(EnforcementPoint::PreCommit, &GateScope::project("rover"))
        .unwrap();
    assert!(!verdict.allowed);
    assert_eq!(verdict.blocking_failures, vec!["integration_debt".to_string()]);
    assert!(verdict.skipped.contains(&"static_analysis".to_string()));

    assert!(gates.can_proceed_with_deployment("rover").unwrap());
    let mut broken = sample("fpga", 70.0, 50.0);
    broken.error_rate = 0.5;
    engine.process_telemetry(&broken).unwrap();
    assert!(!gates.can_proceed_with_deployment("rover").unwrap());
}

#[test]
fn components_evaluate_in_parallel() {
    let engine = engine();
    let ids: Vec<String> = (0..8).map(|i| format!("node-{}", i)).collect();
    for id in &ids {
        engine
            .register(ComponentRegistration::new(id.as_str(), "cluster"))
            .unwrap();
    }

    thread::scope(|s| {
        for id in &ids {
            let engine = Arc::clone(&engine);
            s.spawn(move || {
                for i in 0..50 {
                    let cpu = 40.0 + (i % 5) as f64 * 10.0;
                    let outcome = engine.process_telemetry(&sample(id, cpu, 50.0)).unwrap();
                    assert!((0.0..=1.0).contains(&outcome.throttle_level));
                }
            });
        }
    });

    for id in &ids {
        assert_eq!(engine.snapshot(id).unwrap().samples_processed, 50);
    }
}

#[test]
fn removal_races_with_evaluation() {
    let engine = engine();
    engine
        .register(ComponentRegistration::new("flaky", "p"))
        .unwrap();

    thread::scope(|s| {
        let worker = Arc::clone(&engine);
        s.spawn(move || {
            for _ in 0..200 {
                match worker.process_telemetry(&sample("flaky", 60.0, 40.0)) {
                    Ok(outcome) => assert!(!outcome.quarantined),
                    Err(e) => {
                        assert!(e.is_lookup_failure());
                        break;
                    }
                }
            }
        });
        let remover = Arc::clone(&engine);
        s.spawn(move || {
            remover.remove("flaky").unwrap();
        });
    });

    assert!(engine.snapshot("flaky").is_err());
    assert!(engine.component_ids().unwrap().is_empty());
}
