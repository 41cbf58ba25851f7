//! ProberActor - periodic reachability checks for one endpoint
//!
//! One prober per endpoint row. Each cycle runs a single probe with a
//! fixed deadline, classifies the outcome (failing open to Down), and
//! reports to the engine only when the classification changed - except
//! for the very first cycle, which always reports so the engine knows
//! the endpoint has been swept.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → probe → classify → (on change) ProbeReport → AlertEngineActor
//!     ↑
//!     └─── Commands (ProbeNow, Shutdown)
//! ```
//!
//! There are no retries within a cycle: a failed probe is simply Down
//! this cycle and gets probed again on the next tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, instrument, trace, warn};

use crate::probe::Probe;
use crate::{Endpoint, Liveness};

use super::messages::{ProbeReport, ProberCommand};

/// Actor that probes a single endpoint
pub struct ProberActor {
    endpoint: Endpoint,

    /// Reachability check implementation (system ping in production)
    probe: Arc<dyn Probe>,

    /// Where liveness transitions are reported
    report_tx: mpsc::Sender<ProbeReport>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<ProberCommand>,

    /// Time between probe cycles
    interval_duration: Duration,

    /// Last classification; `None` until the first probe has run
    last: Option<Liveness>,
}

impl ProberActor {
    pub fn new(
        endpoint: Endpoint,
        probe: Arc<dyn Probe>,
        report_tx: mpsc::Sender<ProbeReport>,
        command_rx: mpsc::Receiver<ProberCommand>,
        interval_duration: Duration,
    ) -> Self {
        Self {
            endpoint,
            probe,
            report_tx,
            command_rx,
            interval_duration,
            last: None,
        }
    }

    /// Run the actor's main loop until shutdown or a closed command channel.
    #[instrument(skip(self), fields(host = %self.endpoint.address, site = %self.endpoint.site))]
    pub async fn run(mut self) {
        debug!("starting prober");

        let mut ticker = interval(self.interval_duration);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cycle().await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        ProberCommand::ProbeNow { respond_to } => {
                            debug!("received ProbeNow command");
                            let liveness = self.cycle().await;
                            let _ = respond_to.send(liveness);
                        }

                        ProberCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("prober stopped");
    }

    /// One probe cycle: check reachability, report a changed classification.
    async fn cycle(&mut self) -> Liveness {
        let outcome = self.probe.probe(&self.endpoint.address).await;
        let liveness = outcome.liveness();
        trace!("probe -> {outcome:?}");

        if self.last != Some(liveness) {
            self.last = Some(liveness);

            let report = ProbeReport {
                address: self.endpoint.address.clone(),
                site: self.endpoint.site.clone(),
                liveness,
                timestamp: Utc::now(),
            };
            if self.report_tx.send(report).await.is_err() {
                warn!("engine is gone, dropping report");
            }
        }

        liveness
    }
}

/// Handle for controlling a ProberActor
#[derive(Clone)]
pub struct ProberHandle {
    sender: mpsc::Sender<ProberCommand>,
    address: String,
}

impl ProberHandle {
    /// Spawn a new prober for one endpoint row.
    pub fn spawn(
        endpoint: Endpoint,
        probe: Arc<dyn Probe>,
        interval_duration: Duration,
        report_tx: mpsc::Sender<ProbeReport>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let address = endpoint.address.clone();

        let actor = ProberActor::new(endpoint, probe, report_tx, cmd_rx, interval_duration);

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            address,
        }
    }

    /// Probe immediately, returning the fresh classification.
    pub async fn probe_now(&self) -> Option<Liveness> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ProberCommand::ProbeNow { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Shut down the prober.
    pub async fn shutdown(self) {
        let _ = self.sender.send(ProberCommand::Shutdown).await;
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}
