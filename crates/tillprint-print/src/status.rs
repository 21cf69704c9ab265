// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Last observed reachability of the print daemon.
//
// Written by the connectivity monitor, read by the UI indicator and by the
// client's offline short-circuit. Every observation carries the endpoint it
// was taken against and when, so a stale reading or one for an address the
// operator has since replaced is never mistaken for the current state.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use tillprint_core::types::{ConnectivityStatus, HealthStatus, ServerEndpoint};

/// One health observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub endpoint: ServerEndpoint,
    pub status: HealthStatus,
    /// Monotonic time of the observation, used for staleness checks.
    pub checked_at: Instant,
    /// Wall-clock time of the observation, for display.
    pub observed_at: DateTime<Utc>,
}

/// Shared connectivity state.
#[derive(Debug, Default)]
pub struct StatusBoard {
    latest: RwLock<Option<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a health check outcome, logging transitions.
    pub fn record(&self, endpoint: &ServerEndpoint, status: HealthStatus) {
        let snapshot = StatusSnapshot {
            endpoint: endpoint.clone(),
            status,
            checked_at: Instant::now(),
            observed_at: Utc::now(),
        };

        if let Ok(mut latest) = self.latest.write() {
            let previous = latest
                .as_ref()
                .filter(|s| &s.endpoint == endpoint)
                .map(|s| s.status);
            match (previous, status) {
                (Some(HealthStatus::Offline), HealthStatus::Online) => {
                    info!(address = %endpoint, "print server reachable again");
                }
                (Some(HealthStatus::Online), HealthStatus::Offline) => {
                    warn!(address = %endpoint, "print server connection lost");
                }
                (None, HealthStatus::Offline) => {
                    warn!(address = %endpoint, "print server not reachable");
                }
                (None, HealthStatus::Online) => {
                    info!(address = %endpoint, "print server reachable");
                }
                _ => {}
            }
            *latest = Some(snapshot);
        }
    }

    /// Status for `endpoint`; `Unknown` if the last observation was for a
    /// different address or nothing has been observed yet.
    pub fn status_for(&self, endpoint: &ServerEndpoint) -> ConnectivityStatus {
        self.latest
            .read()
            .ok()
            .and_then(|latest| {
                latest
                    .as_ref()
                    .filter(|s| &s.endpoint == endpoint)
                    .map(|s| ConnectivityStatus::from(s.status))
            })
            .unwrap_or_default()
    }

    /// True only if the most recent observation for `endpoint` was a failure
    /// taken no longer than `window` ago.
    pub fn is_confidently_offline(&self, endpoint: &ServerEndpoint, window: Duration) -> bool {
        self.latest
            .read()
            .ok()
            .and_then(|latest| {
                latest.as_ref().map(|s| {
                    &s.endpoint == endpoint
                        && s.status == HealthStatus::Offline
                        && s.checked_at.elapsed() <= window
                })
            })
            .unwrap_or(false)
    }

    /// Copy of the most recent observation, whatever endpoint it was for.
    pub fn snapshot(&self) -> Option<StatusSnapshot> {
        self.latest.read().ok().and_then(|latest| latest.clone())
    }

    /// Forget the last observation, e.g. after the address changes.
    pub fn clear(&self) {
        if let Ok(mut latest) = self.latest.write() {
            *latest = None;
        }
    }
}
