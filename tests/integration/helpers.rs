//! Test helpers shared by the integration suites

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use site_monitoring::{
    Endpoint,
    actors::engine::{EngineHandle, EngineSettings},
    actors::prober::ProberHandle,
    config::SettleConfig,
    notify::Notifier,
    probe::{Probe, ProbeOutcome},
    status::StatusStore,
    telegram::{MessageId, Messenger, SendError},
};

/// Probe whose per-address outcomes tests flip at will. Unknown
/// addresses answer as reachable.
pub struct FleetProbe {
    outcomes: Mutex<HashMap<String, ProbeOutcome>>,
}

impl FleetProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(HashMap::new()),
        })
    }

    pub fn set(&self, address: &str, outcome: ProbeOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(address.to_string(), outcome);
    }
}

#[async_trait]
impl Probe for FleetProbe {
    async fn probe(&self, address: &str) -> ProbeOutcome {
        self.outcomes
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(ProbeOutcome::Reachable)
    }
}

/// Messenger that records all traffic and always succeeds.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sends: Mutex<Vec<String>>,
    pub edits: Mutex<Vec<String>>,
    pub pins: Mutex<Vec<i64>>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<String> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, text: &str) -> Result<MessageId, SendError> {
        let mut sends = self.sends.lock().unwrap();
        sends.push(text.to_string());
        Ok(MessageId(sends.len() as i64))
    }

    async fn edit(&self, _message: MessageId, text: &str) -> Result<(), SendError> {
        self.edits.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn pin(&self, message: MessageId) -> Result<(), SendError> {
        self.pins.lock().unwrap().push(message.0);
        Ok(())
    }
}

/// A four-host site, the canonical threshold scenario fleet.
pub fn four_host_fleet(site: &str) -> Vec<Endpoint> {
    (1..=4)
        .map(|i| Endpoint::new(format!("10.0.0.{i}"), site))
        .collect()
}

/// The full pipeline under test: probers wired to an engine, both driven
/// manually through their handles (probe and scan intervals are long
/// enough that only the immediate first ticks fire on their own).
pub struct Pipeline {
    pub engine: EngineHandle,
    pub probers: Vec<ProberHandle>,
    pub probe: Arc<FleetProbe>,
    pub messenger: Arc<RecordingMessenger>,
    _dir: tempfile::TempDir,
}

impl Pipeline {
    /// Probe every endpoint once; transitions land in the engine's
    /// report queue before this returns.
    pub async fn sweep(&self) {
        for prober in &self.probers {
            prober.probe_now().await.unwrap();
        }
    }

    pub async fn scan(&self) -> usize {
        self.engine.scan_now().await.unwrap()
    }
}

/// Spawn probers and an engine over a scripted probe, a recording
/// messenger and a throwaway status file, with first-sweep settling so
/// tests stay deterministic.
pub fn spawn_pipeline(endpoints: Vec<Endpoint>) -> Pipeline {
    let messenger = RecordingMessenger::new();
    spawn_pipeline_with(endpoints, messenger.clone(), messenger)
}

/// Same as [`spawn_pipeline`], but delivery goes through `delivering`
/// (e.g. a failure-injecting wrapper) while `recording` stays observable.
pub fn spawn_pipeline_with(
    endpoints: Vec<Endpoint>,
    delivering: Arc<dyn Messenger>,
    recording: Arc<RecordingMessenger>,
) -> Pipeline {
    let probe = FleetProbe::new();

    let dir = tempfile::tempdir().unwrap();
    let store = StatusStore::new(dir.path().join("status.json"));

    let notifier = Notifier::new(delivering, Duration::from_secs(1));
    let engine = EngineHandle::spawn(
        &endpoints,
        notifier,
        store,
        EngineSettings {
            interval: Duration::from_secs(3600),
            threshold: 0.5,
            settle: SettleConfig::FirstSweep,
        },
    );

    let probers = endpoints
        .into_iter()
        .map(|endpoint| {
            ProberHandle::spawn(
                endpoint,
                probe.clone() as Arc<dyn Probe>,
                Duration::from_secs(3600),
                engine.report_sender(),
            )
        })
        .collect();

    Pipeline {
        engine,
        probers,
        probe,
        messenger: recording,
        _dir: dir,
    }
}
