//! ConnectionSupervisor - Reader Connection Keep-Alive
//!
//! Attempts one connect at startup, then supervises forever: while connection
//! tasks are alive it polls at a fixed cadence; once they are all gone it
//! sleeps for the current backoff and reconnects. Connect failures double the
//! backoff up to a cap; any successful connect resets it. The loop never
//! propagates a connect error and exits only on cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::device_gateway::DeviceGateway;

/// Doubling backoff with a cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    first: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(first: Duration, max: Duration) -> Self {
        Self {
            current: first,
            first,
            max,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn delay(&self) -> Duration {
        self.current
    }

    /// Double the delay after a failure, capped at the maximum.
    pub fn grow(&mut self) {
        self.current = (self.current * 2).min(self.max);
    }

    /// Reset to the initial delay after a success.
    pub fn reset(&mut self) {
        self.current = self.first;
    }
}

pub struct ConnectionSupervisor {
    gateway: Arc<dyn DeviceGateway>,
    backoff_first: Duration,
    backoff_max: Duration,
    poll_interval: Duration,
}

impl ConnectionSupervisor {
    pub fn new(gateway: Arc<dyn DeviceGateway>) -> Self {
        Self {
            gateway,
            backoff_first: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }

    #[cfg(test)]
    fn with_intervals(mut self, first: Duration, max: Duration, poll: Duration) -> Self {
        self.backoff_first = first;
        self.backoff_max = max;
        self.poll_interval = poll;
        self
    }

    /// Supervise until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("Connecting to RFID devices on startup");
        if let Err(e) = self.gateway.connect_all().await {
            tracing::error!(error = %e, "Initial device connect failed");
        }

        let mut backoff = Backoff::new(self.backoff_first, self.backoff_max);
        loop {
            if self.gateway.connections_active() {
                // Connection tasks are running; check again later.
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(backoff.delay()) => {}
            }

            match self.gateway.connect_all().await {
                Ok(()) => {
                    tracing::info!("Devices reconnected");
                    backoff.reset();
                }
                Err(e) => {
                    tracing::error!(error = %e, next_delay = ?backoff.delay(), "Reconnect failed");
                    backoff.grow();
                }
            }
        }

        tracing::info!("Connection supervisor stopped");
    }
}
