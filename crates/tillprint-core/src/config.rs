// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client tunables: timeouts, retry policy, and polling cadence.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TillprintError};

/// Timing and retry settings for the print-daemon client and monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on a single `/health` request.
    pub health_timeout_ms: u64,
    /// Bound on a single `/print` attempt.
    pub print_timeout_ms: u64,
    /// Retries after the first failed submission attempt.
    pub max_retries: u32,
    /// Delay before the first retry; later retries wait a multiple of it.
    pub retry_base_delay_ms: u64,
    /// Upper bound on any single retry delay.
    pub retry_max_delay_ms: u64,
    /// How often the connectivity monitor polls `/health`.
    pub poll_interval_ms: u64,
    /// Skip the network when the monitor recently saw the daemon offline.
    pub short_circuit_offline: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            health_timeout_ms: 2_000,
            print_timeout_ms: 10_000,
            max_retries: 2,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 5_000,
            poll_interval_ms: 5_000,
            short_circuit_offline: true,
        }
    }
}

impl ClientConfig {
    /// Read settings from a JSON file. A missing file yields the defaults;
    /// missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would leave a request or the poll loop unbounded
    /// or spinning.
    pub fn validate(&self) -> Result<()> {
        if self.health_timeout_ms == 0 {
            return Err(TillprintError::Config("health_timeout_ms must be > 0".into()));
        }
        if self.print_timeout_ms == 0 {
            return Err(TillprintError::Config("print_timeout_ms must be > 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(TillprintError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(TillprintError::Config(
                "retry_max_delay_ms must not be below retry_base_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn print_timeout(&self) -> Duration {
        Duration::from_millis(self.print_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// How long an `Offline` observation stays trustworthy: one poll
    /// interval plus the time the poll itself may take.
    pub fn staleness_window(&self) -> Duration {
        self.poll_interval() + self.health_timeout()
    }
}
