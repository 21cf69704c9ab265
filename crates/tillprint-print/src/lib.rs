// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tillprint Print — the client side of the LAN receipt/kitchen print daemon:
// address normalisation, the persisted address, health checks and job
// submission with bounded retries, and the connectivity monitor.

pub mod client;
pub mod monitor;
pub mod normalize;
pub mod retry;
pub mod service;
pub mod status;
pub mod store;
pub mod transport;

pub use client::{PrintOptions, PrintServerClient};
pub use monitor::ConnectivityMonitor;
pub use normalize::normalize;
pub use service::PrintService;
pub use status::StatusBoard;
pub use store::{ConfigStore, JsonFileStore, MemoryStore, SettingStore};
pub use transport::{ReqwestTransport, Transport};
