//! Reachability probes for monitored endpoints.
//!
//! A probe answers one question: did this address respond within the
//! timeout? Everything that is not a positive answer - non-zero exit,
//! a wedged child process, failure to launch `ping` at all - collapses
//! into "not reachable". A broken probe must never pass as a live host.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

use crate::Liveness;

/// Per-probe deadline. One second, as enforced by the `ping` flags below.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of a single reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered within the timeout.
    Reachable,
    /// The endpoint did not answer (non-zero exit or timeout).
    Unreachable,
    /// The probe itself could not be executed.
    Failed,
}

impl ProbeOutcome {
    /// Classify the outcome as host liveness, failing open to [`Liveness::Down`].
    pub fn liveness(self) -> Liveness {
        match self {
            ProbeOutcome::Reachable => Liveness::Up,
            ProbeOutcome::Unreachable | ProbeOutcome::Failed => Liveness::Down,
        }
    }
}

/// A reachability check for a single address.
///
/// Implemented by [`PingProbe`] for production use; tests inject scripted
/// implementations to drive probers deterministically.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, address: &str) -> ProbeOutcome;
}

/// Probe backed by the system `ping` binary.
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[cfg(not(windows))]
    fn command(&self, address: &str) -> Command {
        let mut command = Command::new("ping");
        command
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(self.timeout.as_secs().max(1).to_string())
            .arg(address)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }

    #[cfg(windows)]
    fn command(&self, address: &str) -> Command {
        let mut command = Command::new("ping");
        command
            .arg("-n")
            .arg("1")
            .arg("-w")
            .arg(self.timeout.as_millis().max(1).to_string())
            .arg(address)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn probe(&self, address: &str) -> ProbeOutcome {
        let mut child = match self.command(address).spawn() {
            Ok(child) => child,
            Err(e) => {
                trace!("{address}: could not spawn ping: {e}");
                return ProbeOutcome::Failed;
            }
        };

        // `ping` enforces its own deadline; the outer timeout only guards
        // against a wedged child process.
        match tokio::time::timeout(self.timeout + Duration::from_secs(1), child.wait()).await {
            Ok(Ok(status)) if status.success() => ProbeOutcome::Reachable,
            Ok(Ok(status)) => {
                trace!("{address}: ping exited with {status}");
                ProbeOutcome::Unreachable
            }
            Ok(Err(e)) => {
                trace!("{address}: could not await ping: {e}");
                ProbeOutcome::Failed
            }
            Err(_) => {
                let _ = child.kill().await;
                trace!("{address}: ping did not finish in time");
                ProbeOutcome::Unreachable
            }
        }
    }
}
