//! Delivery policy around the messaging channel.
//!
//! The engine never talks to the [`Messenger`] directly; it goes through
//! a [`Notifier`], which owns the retry rules:
//!
//! - alert messages retry forever on flood control and transport errors
//!   and are dropped (with a log line) only on permanent API rejections;
//! - the initial dashboard publish retries only transport errors;
//! - dashboard refreshes are fire-and-forget, the next cycle edits again.
//!
//! A broken channel must never take the monitoring loop down with it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::telegram::{MessageId, Messenger, SendError};

pub struct Notifier {
    messenger: Arc<dyn Messenger>,
    error_delay: Duration,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn Messenger>, error_delay: Duration) -> Self {
        Self {
            messenger,
            error_delay,
        }
    }

    /// Deliver one alert message. Never returns an error: the message is
    /// either sent (possibly after many retries) or abandoned with a log
    /// entry on a permanent rejection.
    #[instrument(skip(self, text))]
    pub async fn deliver(&self, text: &str) {
        loop {
            match self.messenger.send(text).await {
                Ok(_) => {
                    debug!("alert delivered");
                    return;
                }
                Err(SendError::RateLimited { retry_after }) => {
                    warn!("flood control, retrying in {}s", retry_after.as_secs());
                    sleep(retry_after).await;
                }
                Err(SendError::Network(e)) => {
                    warn!(
                        "network error, retrying in {}s: {e}",
                        self.error_delay.as_secs()
                    );
                    sleep(self.error_delay).await;
                }
                Err(e @ SendError::Api { .. }) => {
                    error!("abandoning alert after permanent failure: {e}");
                    return;
                }
            }
        }
    }

    /// Send and pin the initial dashboard message. Only transport errors
    /// are retried here; any other failure is handed back to the caller.
    /// A failed pin after a successful send is tolerated - the dashboard
    /// still works, just unpinned.
    #[instrument(skip(self, text))]
    pub async fn publish_dashboard(&self, text: &str) -> Result<MessageId, SendError> {
        let id = loop {
            match self.messenger.send(text).await {
                Ok(id) => break id,
                Err(SendError::Network(e)) => {
                    warn!(
                        "network error while publishing dashboard, retrying in {}s: {e}",
                        self.error_delay.as_secs()
                    );
                    sleep(self.error_delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        if let Err(e) = self.messenger.pin(id).await {
            warn!("could not pin dashboard message: {e}");
        }

        Ok(id)
    }

    /// Edit the dashboard in place. One attempt; failures are swallowed
    /// since the next scan cycle refreshes the same message anyway.
    pub async fn refresh_dashboard(&self, message: MessageId, text: &str) {
        if let Err(e) = self.messenger.edit(message, text).await {
            debug!("dashboard refresh failed, will retry next cycle: {e}");
        }
    }
}
