// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The printing surface the ordering flow depends on.
//
// `get_status`, `print`, and `configure` are all the rest of the application
// needs. Everything else (normalisation, persistence, retries, polling) stays
// behind this type.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tillprint_core::config::ClientConfig;
use tillprint_core::error::{PrintError, Result};
use tillprint_core::types::{ConnectivityStatus, PrintAck, PrintJob, ServerEndpoint};

use crate::client::{PrintOptions, PrintServerClient};
use crate::monitor::ConnectivityMonitor;
use crate::status::StatusBoard;
use crate::store::ConfigStore;
use crate::transport::{ReqwestTransport, Transport, TransportError};

#[derive(Clone)]
pub struct PrintService {
    client: PrintServerClient,
    monitor: Arc<ConnectivityMonitor>,
}

impl PrintService {
    pub fn new(store: ConfigStore, transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let board = Arc::new(StatusBoard::new());
        let client = PrintServerClient::new(store, transport, config).with_status_board(board.clone());
        let monitor = Arc::new(ConnectivityMonitor::new(client.clone(), board));
        Self { client, monitor }
    }

    /// Build a service that talks HTTP through `reqwest`.
    pub fn over_http(
        store: ConfigStore,
        config: ClientConfig,
    ) -> std::result::Result<Self, TransportError> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::new(store, Arc::new(transport), config))
    }

    /// Last known reachability of the configured print server.
    pub fn get_status(&self) -> ConnectivityStatus {
        self.monitor.status()
    }

    /// Submit a job with default options and no external cancellation.
    pub async fn print(&self, job: &PrintJob) -> std::result::Result<PrintAck, PrintError> {
        self.print_with(job, PrintOptions::default(), &CancellationToken::new())
            .await
    }

    /// Submit a job, optionally forcing a live attempt, abandoning it when
    /// `cancel` fires.
    pub async fn print_with(
        &self,
        job: &PrintJob,
        options: PrintOptions,
        cancel: &CancellationToken,
    ) -> std::result::Result<PrintAck, PrintError> {
        self.client.print(job, options, cancel).await
    }

    /// Save operator input as the print server address and return the
    /// address now in effect (the default if `raw` was blank).
    pub fn configure(&self, raw: &str) -> Result<ServerEndpoint> {
        let saved = self.client.store().save(raw)?;
        Ok(saved.unwrap_or_default())
    }

    /// Drop the saved address and return the default now in effect.
    pub fn reset(&self) -> Result<ServerEndpoint> {
        self.client.store().reset()?;
        Ok(ServerEndpoint::default())
    }

    pub fn endpoint(&self) -> ServerEndpoint {
        self.client.endpoint()
    }

    pub fn client(&self) -> &PrintServerClient {
        &self.client
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }
}

impl std::fmt::Debug for PrintService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintService")
            .field("client", &self.client)
            .field("monitor", &self.monitor)
            .finish()
    }
}
