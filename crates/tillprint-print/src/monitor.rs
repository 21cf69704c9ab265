// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connectivity monitor for the print daemon.
//
// Polls `/health` on a fixed interval while the point-of-sale screen is in
// use and publishes the result to the shared status board. Polling pauses
// while the screen is backgrounded and resumes with an immediate probe when
// it comes back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tillprint_core::types::{ConnectivityStatus, HealthStatus};

use crate::client::PrintServerClient;
use crate::status::StatusBoard;

pub struct ConnectivityMonitor {
    client: PrintServerClient,
    board: Arc<StatusBoard>,
    active: watch::Sender<bool>,
    poll_interval: Duration,
}

impl ConnectivityMonitor {
    /// Create a monitor that polls through `client` and publishes to `board`.
    /// Starts in the active state; nothing runs until [`Self::start`].
    pub fn new(client: PrintServerClient, board: Arc<StatusBoard>) -> Self {
        let poll_interval = client.config().poll_interval();
        let (active, _) = watch::channel(true);
        Self {
            client,
            board,
            active,
            poll_interval,
        }
    }

    /// Reachability of the currently configured address.
    pub fn status(&self) -> ConnectivityStatus {
        self.board.status_for(&self.client.endpoint())
    }

    pub fn board(&self) -> &Arc<StatusBoard> {
        &self.board
    }

    /// Resume (`true`) or suspend (`false`) polling.
    ///
    /// Repeating the current state is a no-op and does not wake the poll loop.
    pub fn set_active(&self, active: bool) {
        let toggled = self
            .active
            .send_if_modified(|current| std::mem::replace(current, active) != active);
        if toggled {
            info!(active, "connectivity polling toggled");
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Probe the configured address now and publish the result.
    pub async fn poll_once(&self) -> HealthStatus {
        let endpoint = self.client.endpoint();
        let status = self.client.check_health(&endpoint).await;
        self.board.record(&endpoint, status);
        status
    }

    /// Spawn the polling loop on the current Tokio runtime.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move { monitor.run(cancel).await })
    }

    /// Poll until `cancel` fires. Never returns early on a failed probe.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut active = self.active.subscribe();
        info!(interval_ms = self.poll_interval.as_millis(), "connectivity monitor started");

        loop {
            let is_active = *active.borrow_and_update();
            if !is_active {
                debug!("connectivity polling suspended");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = active.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.poll_once() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = active.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("connectivity monitor stopped");
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("poll_interval", &self.poll_interval)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
