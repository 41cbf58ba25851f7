//! Failure scenarios: the monitoring loop must outlive every
//! collaborator failure

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use site_monitoring::{
    actors::engine::{EngineHandle, EngineSettings},
    actors::messages::ProbeReport,
    config::SettleConfig,
    notify::Notifier,
    probe::ProbeOutcome,
    status::StatusStore,
    telegram::{MessageId, Messenger, SendError},
    Endpoint, Liveness,
};

use super::helpers::*;

/// Wrapper that fails the next N sends with flood control before
/// delegating to the recording messenger.
struct RateLimitingMessenger {
    inner: Arc<RecordingMessenger>,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl RateLimitingMessenger {
    fn new(inner: Arc<RecordingMessenger>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failures_left: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        })
    }

    fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Messenger for RateLimitingMessenger {
    async fn send(&self, text: &str) -> Result<MessageId, SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SendError::RateLimited {
                retry_after: Duration::from_secs(2),
            });
        }
        self.inner.send(text).await
    }

    async fn edit(&self, message: MessageId, text: &str) -> Result<(), SendError> {
        self.inner.edit(message, text).await
    }

    async fn pin(&self, message: MessageId) -> Result<(), SendError> {
        self.inner.pin(message).await
    }
}

/// Messenger whose every call is a permanent API rejection.
struct BrokenMessenger;

#[async_trait]
impl Messenger for BrokenMessenger {
    async fn send(&self, _text: &str) -> Result<MessageId, SendError> {
        Err(SendError::Api {
            code: Some(401),
            description: "Unauthorized".to_string(),
        })
    }

    async fn edit(&self, _message: MessageId, _text: &str) -> Result<(), SendError> {
        Err(SendError::Api {
            code: Some(401),
            description: "Unauthorized".to_string(),
        })
    }

    async fn pin(&self, _message: MessageId) -> Result<(), SendError> {
        Err(SendError::Api {
            code: Some(401),
            description: "Unauthorized".to_string(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_alert_is_delivered_exactly_once() {
    let recording = RecordingMessenger::new();
    let flaky = RateLimitingMessenger::new(recording.clone());
    let pipeline = spawn_pipeline_with(
        four_host_fleet("Будинок 1"),
        flaky.clone(),
        recording.clone(),
    );

    pipeline.sweep().await;
    pipeline.scan().await;
    let attempts_before = flaky.attempts.load(Ordering::SeqCst);

    // Flood control kicks in right when the outage alert goes out.
    flaky.fail_next(2);
    pipeline.probe.set("10.0.0.1", ProbeOutcome::Unreachable);
    pipeline.probe.set("10.0.0.2", ProbeOutcome::Unreachable);
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 1);

    // Two rejected attempts, two slept-out retry intervals, one delivery.
    assert_eq!(
        flaky.attempts.load(Ordering::SeqCst) - attempts_before,
        3
    );
    let sent = recording.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains("Зникло світло"));
}

#[tokio::test]
async fn broken_channel_does_not_stop_the_state_machine() {
    let recording = RecordingMessenger::new();
    let pipeline = spawn_pipeline_with(
        four_host_fleet("Будинок 1"),
        Arc::new(BrokenMessenger),
        recording.clone(),
    );

    // Settling: the dashboard publish fails permanently; the engine must
    // carry on without one.
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 0);

    // Transitions still happen and still track state, even though every
    // notification is abandoned.
    pipeline.probe.set("10.0.0.1", ProbeOutcome::Unreachable);
    pipeline.probe.set("10.0.0.2", ProbeOutcome::Unreachable);
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 1);

    let sites = pipeline.engine.snapshot().await;
    assert!(sites[0].alert_active);

    pipeline.probe.set("10.0.0.1", ProbeOutcome::Reachable);
    pipeline.probe.set("10.0.0.2", ProbeOutcome::Reachable);
    pipeline.sweep().await;
    assert_eq!(pipeline.scan().await, 1);

    let sites = pipeline.engine.snapshot().await;
    assert!(!sites[0].alert_active);
    assert!(recording.sent().is_empty());
}

#[tokio::test]
async fn corrupt_status_file_is_survived() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.json");
    std::fs::write(&path, "][ definitely not json").unwrap();

    let recording = RecordingMessenger::new();
    let engine = EngineHandle::spawn(
        &[Endpoint::new("10.0.0.1", "Будинок 1")],
        Notifier::new(recording.clone(), Duration::from_secs(1)),
        StatusStore::new(&path),
        EngineSettings {
            interval: Duration::from_secs(3600),
            threshold: 0.5,
            settle: SettleConfig::FirstSweep,
        },
    );

    let report_tx = engine.report_sender();
    report_tx
        .send(ProbeReport {
            address: "10.0.0.1".to_string(),
            site: "Будинок 1".to_string(),
            liveness: Liveness::Up,
            timestamp: chrono::Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(engine.scan_now().await, Some(0));

    // The full alert flow still works from the clean slate.
    report_tx
        .send(ProbeReport {
            address: "10.0.0.1".to_string(),
            site: "Будинок 1".to_string(),
            liveness: Liveness::Down,
            timestamp: chrono::Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(engine.scan_now().await, Some(1));

    // And the save after the transition replaced the corrupt file.
    assert!(!StatusStore::new(&path).load().is_empty());
}
