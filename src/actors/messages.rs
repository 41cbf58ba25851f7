//! Message types for actor communication

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::Liveness;
use crate::registry::SiteSnapshot;

/// Sent by a prober after its very first probe (whatever the outcome,
/// so the engine can tell when every endpoint has been swept once) and
/// afterwards only when the classification changes.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub address: String,
    pub site: String,
    pub liveness: Liveness,
    pub timestamp: DateTime<Utc>,
}

/// Commands that can be sent to a ProberActor
#[derive(Debug)]
pub enum ProberCommand {
    /// Probe immediately, bypassing the interval timer
    ///
    /// Used for testing and manual refresh operations.
    ProbeNow {
        respond_to: oneshot::Sender<Liveness>,
    },

    /// Gracefully shut down the prober
    Shutdown,
}

/// Commands that can be sent to the AlertEngineActor
#[derive(Debug)]
pub enum EngineCommand {
    /// Run one tick immediately: a scan, or the settling check if the
    /// engine has not settled yet. Responds with the number of site
    /// transitions the pass produced.
    ScanNow { respond_to: oneshot::Sender<usize> },

    /// Get a snapshot of every site's current state
    Snapshot {
        respond_to: oneshot::Sender<Vec<SiteSnapshot>>,
    },

    /// Flush the status file and stop
    Shutdown,
}
