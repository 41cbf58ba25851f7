//! AlertEngineActor - site evaluation, notifications, dashboard upkeep
//!
//! The engine owns all site state. Probers feed it liveness transitions;
//! every `interval` seconds it re-evaluates each site's fail ratio
//! against the threshold and drives the per-site state machine:
//!
//! ```text
//! ratio >= threshold, alert inactive  → Alerting (send "Зникло світло")
//! ratio <  threshold, alert active    → Normal   (send "Світло з'явилося")
//! anything else                       → no transition, no message
//! ```
//!
//! The sticky `alert_active` flag is the whole of the hysteresis: while a
//! site stays on one side of the threshold the scan is a no-op, however
//! long the outage lasts.
//!
//! Before the first evaluation the engine waits out a settling period so
//! probers can replace the assumed-Up startup state with reality; the
//! first pass then *observes* the current state without announcing it.
//! Timestamps of state changes are batched to the status store after each
//! scan that produced transitions, and the pinned dashboard is refreshed
//! every cycle whether or not anything changed.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::Endpoint;
use crate::config::{MonitorConfig, SettleConfig};
use crate::notify::Notifier;
use crate::registry::{HostKey, SiteRegistry, SiteSnapshot};
use crate::report;
use crate::status::StatusStore;
use crate::telegram::MessageId;

use super::messages::{EngineCommand, ProbeReport};

/// Tunables the engine needs, extracted from [`MonitorConfig`]
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Time between scans
    pub interval: Duration,

    /// Inclusive fail-ratio bound for alerting
    pub threshold: f64,

    /// When the first evaluation may run
    pub settle: SettleConfig,
}

impl From<&MonitorConfig> for EngineSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval),
            threshold: config.threshold,
            settle: config.settle,
        }
    }
}

/// Actor that evaluates sites and sends alerts
pub struct AlertEngineActor {
    registry: SiteRegistry,
    notifier: Notifier,
    store: StatusStore,
    settings: EngineSettings,

    /// When the engine started, for the fixed-delay settling policy
    started: Instant,

    /// Endpoints that have reported at least once, for the first-sweep policy
    seen: HashSet<HostKey>,

    /// Whether the initial observation pass has run
    settled: bool,

    /// The pinned dashboard message, once published
    dashboard: Option<MessageId>,

    report_rx: mpsc::Receiver<ProbeReport>,
    command_rx: mpsc::Receiver<EngineCommand>,
}

impl AlertEngineActor {
    fn new(
        registry: SiteRegistry,
        notifier: Notifier,
        store: StatusStore,
        settings: EngineSettings,
        report_rx: mpsc::Receiver<ProbeReport>,
        command_rx: mpsc::Receiver<EngineCommand>,
    ) -> Self {
        Self {
            registry,
            notifier,
            store,
            settings,
            started: Instant::now(),
            seen: HashSet::new(),
            settled: false,
            dashboard: None,
            report_rx,
            command_rx,
        }
    }

    /// Run the actor's main loop until shutdown or closed channels.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting alert engine");

        let mut ticker = interval(self.settings.interval);

        loop {
            tokio::select! {
                Some(report) = self.report_rx.recv() => {
                    self.handle_report(report);
                }

                _ = ticker.tick() => {
                    self.tick().await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        EngineCommand::ScanNow { respond_to } => {
                            debug!("received ScanNow command");
                            let transitions = self.tick().await;
                            let _ = respond_to.send(transitions);
                        }

                        EngineCommand::Snapshot { respond_to } => {
                            let _ = respond_to.send(self.registry.snapshot());
                        }

                        EngineCommand::Shutdown => {
                            debug!("received shutdown command");
                            self.flush();
                            break;
                        }
                    }
                }

                else => {
                    warn!("all channels closed, shutting down");
                    break;
                }
            }
        }

        debug!("alert engine stopped");
    }

    fn handle_report(&mut self, report: ProbeReport) {
        self.seen.insert(HostKey::of(&report));
        self.registry.record_transition(&report);
    }

    /// Drain already-queued reports so the coming evaluation sees every
    /// flip that happened before this scan boundary.
    fn drain_reports(&mut self) {
        while let Ok(report) = self.report_rx.try_recv() {
            self.handle_report(report);
        }
    }

    fn ready(&self) -> bool {
        match self.settings.settle {
            SettleConfig::FixedDelay { seconds } => {
                self.started.elapsed() >= Duration::from_secs(seconds)
            }
            SettleConfig::FirstSweep => self.seen.len() >= self.registry.host_count(),
        }
    }

    /// One engine cycle. Before settling this is the readiness check and,
    /// once ready, the silent initial observation; afterwards it is a full
    /// scan plus dashboard refresh. Returns the number of transitions.
    async fn tick(&mut self) -> usize {
        self.drain_reports();

        if !self.settled {
            if !self.ready() {
                trace!("still settling, skipping evaluation");
                return 0;
            }
            self.seed();
            self.publish_dashboard().await;
            self.settled = true;
            return 0;
        }

        let transitions = self.evaluate().await;
        self.refresh_dashboard().await;
        transitions
    }

    /// First evaluation: adopt the current comparison as the baseline
    /// without announcing it.
    fn seed(&mut self) {
        let threshold = self.settings.threshold;
        let mut alerting = 0;
        for site in self.registry.sites_mut() {
            site.alert_active = site.fail_ratio() >= threshold;
            if site.alert_active {
                alerting += 1;
                debug!("{}: starting in alerting state", site.name);
            }
        }
        info!(
            "initial observation done: {} sites, {alerting} alerting",
            self.registry.sites().count()
        );
    }

    /// Evaluate every site against the threshold, emit notifications for
    /// transitions and persist the batch if anything changed.
    async fn evaluate(&mut self) -> usize {
        let now = Utc::now();
        let at = Local::now();
        let threshold = self.settings.threshold;

        let mut messages = Vec::new();
        for site in self.registry.sites_mut() {
            let ratio = site.fail_ratio();

            if ratio >= threshold && !site.alert_active {
                let healthy_for = now - site.last_change;
                site.alert_active = true;
                site.last_change = now;
                debug!(
                    "{}: outage detected, {} of {} down",
                    site.name, site.down, site.total
                );
                messages.push(report::outage_message(
                    &site.name, site.down, site.total, healthy_for, at,
                ));
            } else if ratio < threshold && site.alert_active {
                let down_for = now - site.last_change;
                site.alert_active = false;
                site.last_change = now;
                debug!(
                    "{}: recovered, {} of {} up",
                    site.name,
                    site.total - site.down,
                    site.total
                );
                messages.push(report::recovery_message(
                    &site.name,
                    site.total - site.down,
                    site.total,
                    down_for,
                    at,
                ));
            }
        }

        let transitions = messages.len();
        for message in messages {
            self.notifier.deliver(&message).await;
        }

        if transitions > 0 {
            self.flush();
        }
        transitions
    }

    /// Write the current last-change mapping to the status store.
    fn flush(&self) {
        if let Err(e) = self.store.save(&self.registry.last_changes()) {
            warn!("could not save status file: {e}");
        }
    }

    fn render(&self) -> String {
        report::render_dashboard(&self.registry.snapshot(), Utc::now(), Local::now())
    }

    async fn publish_dashboard(&mut self) {
        match self.notifier.publish_dashboard(&self.render()).await {
            Ok(id) => {
                info!("dashboard published and pinned");
                self.dashboard = Some(id);
            }
            Err(e) => {
                error!("could not publish dashboard, continuing without one: {e}");
            }
        }
    }

    async fn refresh_dashboard(&self) {
        let Some(id) = self.dashboard else {
            return;
        };
        self.notifier.refresh_dashboard(id, &self.render()).await;
    }
}

/// Handle for controlling the AlertEngineActor
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
    report_tx: mpsc::Sender<ProbeReport>,
}

impl EngineHandle {
    /// Spawn the engine for a fleet of endpoints.
    ///
    /// Builds the site registry from the endpoint list, seeds last-change
    /// timestamps from the status store, and starts the actor.
    pub fn spawn(
        endpoints: &[Endpoint],
        notifier: Notifier,
        store: StatusStore,
        settings: EngineSettings,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (report_tx, report_rx) = mpsc::channel(256);

        let mut registry = SiteRegistry::new(endpoints, Utc::now());
        registry.seed_last_change(&store.load());

        let actor = AlertEngineActor::new(registry, notifier, store, settings, report_rx, cmd_rx);

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            report_tx,
        }
    }

    /// The channel probers report liveness transitions to.
    pub fn report_sender(&self) -> mpsc::Sender<ProbeReport> {
        self.report_tx.clone()
    }

    /// Run one engine cycle immediately. Returns the number of site
    /// transitions, or `None` if the engine is gone.
    pub async fn scan_now(&self) -> Option<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::ScanNow { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Snapshot of every site's current state.
    pub async fn snapshot(&self) -> Vec<SiteSnapshot> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(EngineCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Shut down the engine and wait for the final status flush.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(EngineCommand::Shutdown).await;
        // The actor drops its receiver once the loop has exited (and the
        // status file is flushed).
        self.sender.closed().await;
    }
}
