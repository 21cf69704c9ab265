// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Tillprint print-daemon client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Port the print daemon listens on when the operator does not give one.
pub const DEFAULT_PORT: u16 = 3001;

/// Host used when no print server address has been saved.
pub const DEFAULT_HOST: &str = "localhost";

/// Health endpoint, relative to the daemon origin.
pub const HEALTH_PATH: &str = "/health";

/// Print endpoint, relative to the daemon origin.
pub const PRINT_PATH: &str = "/print";

/// Unique identifier for a print job, used to correlate attempts in logs
/// and on the daemon side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// URL schemes the print daemon can be reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Parse a URL scheme, accepting only `http` and `https`.
    pub fn from_url_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }
}

/// Canonical origin of the print daemon: scheme, host, and an explicit port.
///
/// Constructed by normalisation and never mutated afterwards; a new
/// configuration produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrintServerAddress {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl PrintServerAddress {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// `http://localhost:3001`, used whenever nothing has been saved.
    pub fn default_local() -> Self {
        Self::new(Scheme::Http, DEFAULT_HOST, DEFAULT_PORT)
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Display for PrintServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

/// Where requests for the print daemon are sent.
///
/// `Unparsed` holds operator input that could not be read as a URL. It is
/// kept rather than rejected; requests built from it fail at call time and
/// are reported as a connectivity failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerEndpoint {
    Origin(PrintServerAddress),
    Unparsed(String),
}

impl ServerEndpoint {
    /// Absolute URL for one of the daemon's fixed sub-paths.
    pub fn url_for(&self, path: &str) -> String {
        format!("{self}{path}")
    }

    pub fn health_url(&self) -> String {
        self.url_for(HEALTH_PATH)
    }

    pub fn print_url(&self) -> String {
        self.url_for(PRINT_PATH)
    }

    pub fn as_origin(&self) -> Option<&PrintServerAddress> {
        match self {
            Self::Origin(addr) => Some(addr),
            Self::Unparsed(_) => None,
        }
    }
}

impl Default for ServerEndpoint {
    fn default() -> Self {
        Self::Origin(PrintServerAddress::default_local())
    }
}

impl From<PrintServerAddress> for ServerEndpoint {
    fn from(addr: PrintServerAddress) -> Self {
        Self::Origin(addr)
    }
}

impl std::fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Origin(addr) => addr.fmt(f),
            Self::Unparsed(raw) => f.write_str(raw),
        }
    }
}

/// Outcome of a single health check. Failure is a value, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Online,
    Offline,
}

/// Reachability of the configured daemon as seen by the connectivity monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectivityStatus {
    /// No poll has completed for the current address yet.
    #[default]
    Unknown,
    Online,
    Offline,
}

impl From<HealthStatus> for ConnectivityStatus {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Online => Self::Online,
            HealthStatus::Offline => Self::Offline,
        }
    }
}

impl std::fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::Online => "online",
            Self::Offline => "offline",
        };
        f.write_str(label)
    }
}

/// An opaque print request handed over by the ordering flow.
///
/// The payload is forwarded to the daemon untouched; formatting and
/// templating happen elsewhere.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: JobId,
    pub payload: Vec<u8>,
    /// MIME type sent as `Content-Type`.
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl PrintJob {
    pub fn new(payload: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            payload,
            content_type: content_type.into(),
            created_at: Utc::now(),
        }
    }

    /// Build a job whose payload is the JSON encoding of `document`.
    pub fn json<T: Serialize>(document: &T) -> crate::error::Result<Self> {
        let payload = serde_json::to_vec(document)?;
        Ok(Self::new(payload, "application/json"))
    }

    /// Replace the generated id with one supplied by the caller.
    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }
}

/// Acknowledgement returned when the daemon accepts a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintAck {
    pub job_id: JobId,
    /// HTTP status the daemon answered with.
    pub status: u16,
    /// Number of attempts it took, including the successful one.
    pub attempts: u32,
    /// Response body, if the daemon sent one.
    pub body: Option<String>,
}
