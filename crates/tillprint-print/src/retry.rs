// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry policy for print submissions.
//
// Only transport-level failures (unreachable / unknown) are retried, a small
// bounded number of times with a linearly growing delay. A rejection is the
// daemon's final word and is returned immediately.

use std::time::Duration;

use tillprint_core::config::ClientConfig;
use tillprint_core::error::PrintError;
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts are `1 + max_retries`.
    pub max_retries: u32,
    /// Delay before the first retry. Retry `n` waits `n × base_delay`.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for RetryConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry: the daemon rejected the job or the caller cancelled.
    GiveUp,
    /// Maximum retries exhausted.
    Exhausted,
}

/// Decide whether to retry after attempt number `attempt` (0-based) failed.
pub fn should_retry(err: &PrintError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    if !err.is_retryable() {
        info!(error = %err, "not retrying");
        return RetryDecision::GiveUp;
    }

    if attempt >= config.max_retries {
        warn!(attempt, max = config.max_retries, "retry limit exhausted");
        return RetryDecision::Exhausted;
    }

    let delay = compute_delay(attempt, config);
    debug!(attempt, delay_ms = delay.as_millis(), "scheduling retry");
    RetryDecision::RetryAfter(delay)
}

/// delay = min(base × (attempt + 1), max_delay)
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    config
        .base_delay
        .saturating_mul(attempt.saturating_add(1))
        .min(config.max_delay)
}
