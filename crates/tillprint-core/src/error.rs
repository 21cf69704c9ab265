// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types for Tillprint.
//
// Two families: `TillprintError` covers local concerns (persisted settings,
// config files) and `PrintError` classifies a failed print submission so the
// ordering flow can decide what to tell the operator.

use thiserror::Error;

/// Error type for local (non-network) operations.
#[derive(Debug, Error)]
pub enum TillprintError {
    #[error("settings storage failed: {0}")]
    Storage(String),

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TillprintError>;

/// Why a print submission did not produce an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrintError {
    /// Connection refused, timed out, or the address could not be resolved.
    /// The daemon is not running or the configured address is wrong.
    #[error("print server unreachable: {0}")]
    Unreachable(String),

    /// The daemon answered with a non-success status.
    #[error("print server rejected the job (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// Any other transport-level failure.
    #[error("print submission failed: {0}")]
    Unknown(String),

    /// The caller abandoned the submission.
    #[error("print submission cancelled")]
    Cancelled,
}

impl PrintError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// A rejection is authoritative and a cancellation is the caller's
    /// decision, so neither is retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Unknown(_))
    }
}
