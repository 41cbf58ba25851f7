//! End-to-end pipeline tests: scripted probes through probers, engine,
//! and notification delivery

use site_monitoring::probe::ProbeOutcome;

use super::helpers::*;

#[tokio::test]
async fn outage_and_recovery_flow_end_to_end() {
    let pipeline = spawn_pipeline(four_host_fleet("Будинок 1"));

    // First sweep settles the engine and publishes the dashboard.
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 0);
    assert_eq!(pipeline.messenger.sent().len(), 1);
    assert_eq!(pipeline.messenger.pins.lock().unwrap().len(), 1);

    // One host down: 1/4 is below the 0.5 threshold.
    pipeline.probe.set("10.0.0.1", ProbeOutcome::Unreachable);
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 0);

    // Second host down: exactly at the threshold, the site alerts.
    pipeline.probe.set("10.0.0.2", ProbeOutcome::Unreachable);
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 1);

    let sent = pipeline.messenger.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains("Зникло світло: Будинок 1"));
    assert!(sent[1].contains("Впало 2 з 4 пристроїв"));

    // Third host down: still alerting, no repeat notification.
    pipeline.probe.set("10.0.0.3", ProbeOutcome::Unreachable);
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 0);
    assert_eq!(pipeline.messenger.sent().len(), 2);

    // Two hosts recover: 1/4 down again, one restored notification.
    pipeline.probe.set("10.0.0.1", ProbeOutcome::Reachable);
    pipeline.probe.set("10.0.0.2", ProbeOutcome::Reachable);
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 1);

    let sent = pipeline.messenger.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent[2].contains("Світло з'явилося: Будинок 1"));
    assert!(sent[2].contains("Доступно 3 з 4 пристроїв"));
}

#[tokio::test]
async fn probe_errors_count_as_down() {
    let pipeline = spawn_pipeline(four_host_fleet("Будинок 1"));
    pipeline.sweep().await;
    pipeline.scan().await;

    // Two probes erroring out must weigh like two unreachable hosts.
    pipeline.probe.set("10.0.0.1", ProbeOutcome::Failed);
    pipeline.probe.set("10.0.0.2", ProbeOutcome::Failed);
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 1);

    let sites = pipeline.engine.snapshot().await;
    assert_eq!(sites[0].down, 2);
    assert!(sites[0].alert_active);
}

#[tokio::test]
async fn sites_alert_independently() {
    let mut endpoints = four_host_fleet("Аврора");
    endpoints.extend(
        (1..=4).map(|i| site_monitoring::Endpoint::new(format!("10.0.1.{i}"), "Берегиня")),
    );
    let pipeline = spawn_pipeline(endpoints);

    pipeline.sweep().await;
    pipeline.scan().await;

    // All of Аврора down, Берегиня untouched.
    for i in 1..=4 {
        pipeline
            .probe
            .set(&format!("10.0.0.{i}"), ProbeOutcome::Unreachable);
    }
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 1);

    let sent = pipeline.messenger.sent();
    assert!(sent[1].contains("Аврора"));
    assert!(!sent[1].contains("Берегиня"));

    let sites = pipeline.engine.snapshot().await;
    let beregynia = sites.iter().find(|s| s.name == "Берегиня").unwrap();
    assert!(!beregynia.alert_active);
    assert_eq!(beregynia.down, 0);
}

#[tokio::test]
async fn dashboard_refresh_lists_alerting_sites_first() {
    let mut endpoints = four_host_fleet("Аврора");
    endpoints.extend(
        (1..=4).map(|i| site_monitoring::Endpoint::new(format!("10.0.1.{i}"), "Берегиня")),
    );
    let pipeline = spawn_pipeline(endpoints);

    pipeline.sweep().await;
    pipeline.scan().await;

    // Берегиня goes dark; Аврора stays healthy. The alphabetically later
    // site must still lead the dashboard.
    for i in 1..=4 {
        pipeline
            .probe
            .set(&format!("10.0.1.{i}"), ProbeOutcome::Unreachable);
    }
    pipeline.sweep().await;
    pipeline.scan().await;

    let edits = pipeline.messenger.edits.lock().unwrap().clone();
    let dashboard = edits.last().unwrap();
    let alerting = dashboard.find("🔴 Берегиня").unwrap();
    let healthy = dashboard.find("🟢 Аврора").unwrap();
    assert!(alerting < healthy);
}
