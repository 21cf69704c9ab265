// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client for the LAN print daemon: health checks and job submission.
//
// Every request is bounded by a timeout, and the address is looked up in the
// configuration store on every call so a saved change applies immediately.
// Health failures come back as `Offline`; submission failures come back as a
// classified `PrintError`. Nothing here may hold up order completion.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use tillprint_core::config::ClientConfig;
use tillprint_core::error::PrintError;
use tillprint_core::types::{HealthStatus, PrintAck, PrintJob, ServerEndpoint};

use crate::retry::{RetryConfig, RetryDecision, should_retry};
use crate::status::StatusBoard;
use crate::store::ConfigStore;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// Header carrying the job id to the daemon.
pub const JOB_ID_HEADER: &str = "x-print-job-id";

/// Per-call submission options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintOptions {
    /// Always attempt the network, even if the daemon was just seen offline.
    pub force_live: bool,
}

impl PrintOptions {
    pub fn live() -> Self {
        Self { force_live: true }
    }
}

/// Stateless client for the print daemon's `/health` and `/print` endpoints.
///
/// Cheap to clone; clones share the transport, store, and status board.
#[derive(Clone)]
pub struct PrintServerClient {
    store: ConfigStore,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    retry: RetryConfig,
    board: Option<Arc<StatusBoard>>,
}

impl PrintServerClient {
    pub fn new(store: ConfigStore, transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let retry = RetryConfig::from(&config);
        Self {
            store,
            transport,
            config,
            retry,
            board: None,
        }
    }

    /// Consult `board` before submitting, to skip attempts against a daemon
    /// the monitor has just seen offline.
    pub fn with_status_board(mut self, board: Arc<StatusBoard>) -> Self {
        self.board = Some(board);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// The endpoint the next request will use.
    pub fn endpoint(&self) -> ServerEndpoint {
        self.store.get()
    }

    /// Probe `endpoint/health`. Any failure, including a timeout, is `Offline`.
    #[instrument(skip(self, endpoint), fields(address = %endpoint))]
    pub async fn check_health(&self, endpoint: &ServerEndpoint) -> HealthStatus {
        let request = HttpRequest::get(endpoint.health_url(), self.config.health_timeout());
        match self.send_bounded(request).await {
            Ok(response) if response.is_success() => {
                debug!(status = response.status, "health check passed");
                HealthStatus::Online
            }
            Ok(response) => {
                debug!(status = response.status, "health check returned error status");
                HealthStatus::Offline
            }
            Err(e) => {
                debug!(error = %e, "health check failed");
                HealthStatus::Offline
            }
        }
    }

    /// Probe the currently configured address.
    pub async fn check_configured_health(&self) -> HealthStatus {
        let endpoint = self.store.get();
        self.check_health(&endpoint).await
    }

    /// Submit `job` to the currently configured address.
    pub async fn print(
        &self,
        job: &PrintJob,
        options: PrintOptions,
        cancel: &CancellationToken,
    ) -> Result<PrintAck, PrintError> {
        let endpoint = self.store.get();
        self.submit_print_job(&endpoint, job, options, cancel).await
    }

    /// POST `job` to `endpoint/print`, retrying transport failures.
    ///
    /// At most `1 + max_retries` attempts are made. A rejection ends the call
    /// after one attempt. Cancelling `cancel` stops the loop at once, whether
    /// an attempt is in flight or a retry delay is pending.
    #[instrument(skip(self, endpoint, job, cancel), fields(address = %endpoint, job_id = %job.id))]
    pub async fn submit_print_job(
        &self,
        endpoint: &ServerEndpoint,
        job: &PrintJob,
        options: PrintOptions,
        cancel: &CancellationToken,
    ) -> Result<PrintAck, PrintError> {
        if cancel.is_cancelled() {
            return Err(PrintError::Cancelled);
        }

        if self.short_circuits(endpoint, options) {
            info!("print server offline at last health check, not attempting");
            return Err(PrintError::Unreachable(format!(
                "{endpoint} was offline at the last health check"
            )));
        }

        let url = endpoint.print_url();
        let mut attempt: u32 = 0;

        loop {
            let request = HttpRequest::post(
                url.clone(),
                job.payload.clone(),
                self.config.print_timeout(),
            )
            .header("content-type", job.content_type.clone())
            .header(JOB_ID_HEADER, job.id.to_string());

            debug!(attempt, "sending print job");
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(attempt, "print submission cancelled");
                    return Err(PrintError::Cancelled);
                }
                result = self.send_bounded(request) => result,
            };

            let err = match outcome {
                Ok(response) if response.is_success() => {
                    info!(status = response.status, attempts = attempt + 1, "print job accepted");
                    return Ok(PrintAck {
                        job_id: job.id,
                        status: response.status,
                        attempts: attempt + 1,
                        body: response.text(),
                    });
                }
                Ok(response) => rejected(response),
                Err(e) => classify(e),
            };
            warn!(attempt, error = %err, "print attempt failed");

            match should_retry(&err, attempt, &self.retry) {
                RetryDecision::RetryAfter(delay) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!(attempt, "print submission cancelled during back-off");
                            return Err(PrintError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                RetryDecision::GiveUp | RetryDecision::Exhausted => return Err(err),
            }
        }
    }

    fn short_circuits(&self, endpoint: &ServerEndpoint, options: PrintOptions) -> bool {
        if options.force_live || !self.config.short_circuit_offline {
            return false;
        }
        self.board.as_ref().is_some_and(|board| {
            board.is_confidently_offline(endpoint, self.config.staleness_window())
        })
    }

    /// Send through the transport, enforcing the request's timeout even if
    /// the transport does not.
    async fn send_bounded(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let timeout = request.timeout;
        tokio::time::timeout(timeout, self.transport.request(request))
            .await
            .unwrap_or(Err(TransportError::Timeout(timeout)))
    }
}

impl std::fmt::Debug for PrintServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintServerClient")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Map a transport failure onto the submission taxonomy.
pub fn classify(err: TransportError) -> PrintError {
    match err {
        TransportError::Connect(detail) => PrintError::Unreachable(detail),
        TransportError::Timeout(after) => {
            PrintError::Unreachable(format!("no response within {after:?}"))
        }
        TransportError::InvalidUrl(detail) => PrintError::Unreachable(detail),
        TransportError::Other(detail) => PrintError::Unknown(detail),
    }
}

fn rejected(response: HttpResponse) -> PrintError {
    PrintError::Rejected {
        status: response.status,
        body: response.text().unwrap_or_default(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::transport::{Method, ReqwestTransport};

    /// What the scripted daemon does for one request.
    #[derive(Debug, Clone)]
    pub(crate) enum Reply {
        Respond(u16, &'static str),
        Fail(TransportError),
        Hang,
    }

    /// Transport that plays back a script; the last entry repeats forever.
    pub(crate) struct FakeTransport {
        script: Mutex<VecDeque<Reply>>,
        last: Reply,
        attempts: AtomicU32,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        pub(crate) fn new(script: Vec<Reply>) -> Arc<Self> {
            let last = script.last().cloned().unwrap_or(Reply::Respond(200, ""));
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last,
                attempts: AtomicU32::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn always(reply: Reply) -> Arc<Self> {
            Self::new(vec![reply])
        }

        pub(crate) fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            let reply = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    self.last.clone()
                }
            };
            match reply {
                Reply::Respond(status, body) => Ok(HttpResponse::new(status, body)),
                Reply::Fail(err) => Err(err),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    pub(crate) fn fast_config() -> ClientConfig {
        ClientConfig {
            health_timeout_ms: 100,
            print_timeout_ms: 200,
            max_retries: 2,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 50,
            poll_interval_ms: 50,
            short_circuit_offline: true,
        }
    }

    fn refused() -> Reply {
        Reply::Fail(TransportError::Connect("connection refused".into()))
    }

    fn client_with(transport: Arc<FakeTransport>, config: ClientConfig) -> PrintServerClient {
        let store = ConfigStore::in_memory();
        store.save("10.0.0.5").unwrap();
        PrintServerClient::new(store, transport, config)
    }

    fn ticket() -> PrintJob {
        PrintJob::new(b"{\"table\":4}".to_vec(), "application/json")
    }

    // -- health ---------------------------------------------------------

    #[tokio::test]
    async fn healthy_daemon_is_online() {
        let transport = FakeTransport::always(Reply::Respond(200, ""));
        let client = client_with(transport.clone(), fast_config());

        assert_eq!(client.check_configured_health().await, HealthStatus::Online);
        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].url, "http://10.0.0.5:3001/health");
        assert_eq!(requests[0].timeout, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn error_status_is_offline() {
        let client = client_with(FakeTransport::always(Reply::Respond(503, "")), fast_config());
        assert_eq!(client.check_configured_health().await, HealthStatus::Offline);
    }

    #[tokio::test]
    async fn refused_connection_is_offline() {
        let client = client_with(FakeTransport::always(refused()), fast_config());
        assert_eq!(client.check_configured_health().await, HealthStatus::Offline);
    }

    #[tokio::test]
    async fn hanging_daemon_is_offline_within_timeout() {
        let client = client_with(FakeTransport::always(Reply::Hang), fast_config());
        let started = Instant::now();
        assert_eq!(client.check_configured_health().await, HealthStatus::Offline);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    // -- submission -----------------------------------------------------

    #[tokio::test]
    async fn accepted_job_is_acknowledged() {
        let transport = FakeTransport::always(Reply::Respond(200, "queued"));
        let client = client_with(transport.clone(), fast_config());
        let job = ticket();

        let ack = client
            .print(&job, PrintOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ack.job_id, job.id);
        assert_eq!(ack.attempts, 1);
        assert_eq!(ack.body.as_deref(), Some("queued"));

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "http://10.0.0.5:3001/print");
        assert_eq!(request.body.as_deref(), Some(job.payload.as_slice()));
        assert!(
            request
                .headers
                .contains(&(JOB_ID_HEADER.to_string(), job.id.to_string()))
        );
        assert!(
            request
                .headers
                .contains(&("content-type".to_string(), "application/json".to_string()))
        );
    }

    #[tokio::test]
    async fn refused_daemon_hits_retry_ceiling() {
        let transport = FakeTransport::always(refused());
        let config = fast_config();
        let client = client_with(transport.clone(), config.clone());

        let result = client
            .print(&ticket(), PrintOptions::default(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(PrintError::Unreachable(_))), "{result:?}");
        assert_eq!(transport.attempts(), 1 + config.max_retries);
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let transport = FakeTransport::always(Reply::Respond(500, "out of paper"));
        let client = client_with(transport.clone(), fast_config());

        let result = client
            .print(&ticket(), PrintOptions::default(), &CancellationToken::new())
            .await;

        assert_eq!(
            result,
            Err(PrintError::Rejected {
                status: 500,
                body: "out of paper".into()
            })
        );
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn transient_failure_then_success() {
        let transport = FakeTransport::new(vec![refused(), Reply::Respond(202, "")]);
        let client = client_with(transport.clone(), fast_config());

        let ack = client
            .print(&ticket(), PrintOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ack.attempts, 2);
        assert_eq!(ack.status, 202);
        assert_eq!(ack.body, None);
    }

    #[tokio::test]
    async fn other_transport_errors_are_unknown() {
        let transport =
            FakeTransport::always(Reply::Fail(TransportError::Other("connection reset".into())));
        let client = client_with(transport.clone(), fast_config());

        let result = client
            .print(&ticket(), PrintOptions::default(), &CancellationToken::new())
            .await;

        assert_eq!(result, Err(PrintError::Unknown("connection reset".into())));
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test]
    async fn hanging_attempts_time_out_as_unreachable() {
        let transport = FakeTransport::always(Reply::Hang);
        let config = ClientConfig {
            max_retries: 1,
            ..fast_config()
        };
        let client = client_with(transport.clone(), config);

        let started = Instant::now();
        let result = client
            .print(&ticket(), PrintOptions::default(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(PrintError::Unreachable(_))), "{result:?}");
        assert_eq!(transport.attempts(), 2);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    // -- cancellation ---------------------------------------------------

    #[tokio::test]
    async fn cancellation_stops_retry_loop() {
        let transport = FakeTransport::always(refused());
        let config = ClientConfig {
            max_retries: 5,
            retry_base_delay_ms: 5_000,
            retry_max_delay_ms: 5_000,
            ..fast_config()
        };
        let client = client_with(transport.clone(), config);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = client.print(&ticket(), PrintOptions::default(), &cancel).await;

        assert_eq!(result, Err(PrintError::Cancelled));
        assert_eq!(transport.attempts(), 1);
        assert!(started.elapsed() < Duration::from_secs(2));

        // Nothing keeps retrying in the background.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_attempt() {
        let transport = FakeTransport::always(Reply::Hang);
        let config = ClientConfig {
            print_timeout_ms: 10_000,
            ..fast_config()
        };
        let client = client_with(transport.clone(), config);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = client.print(&ticket(), PrintOptions::default(), &cancel).await;
        assert_eq!(result, Err(PrintError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn already_cancelled_makes_no_attempt() {
        let transport = FakeTransport::always(Reply::Respond(200, ""));
        let client = client_with(transport.clone(), fast_config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.print(&ticket(), PrintOptions::default(), &cancel).await;
        assert_eq!(result, Err(PrintError::Cancelled));
        assert_eq!(transport.attempts(), 0);
    }

    // -- offline short-circuit -----------------------------------------

    #[tokio::test]
    async fn confidently_offline_skips_network() {
        let transport = FakeTransport::always(Reply::Respond(200, ""));
        let board = Arc::new(StatusBoard::new());
        let client = client_with(transport.clone(), fast_config()).with_status_board(board.clone());
        board.record(&client.endpoint(), HealthStatus::Offline);

        let result = client
            .print(&ticket(), PrintOptions::default(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(PrintError::Unreachable(_))), "{result:?}");
        assert_eq!(transport.attempts(), 0);

        let forced = client
            .print(&ticket(), PrintOptions::live(), &CancellationToken::new())
            .await;
        assert!(forced.is_ok());
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn short_circuit_can_be_disabled() {
        let transport = FakeTransport::always(Reply::Respond(200, ""));
        let board = Arc::new(StatusBoard::new());
        let config = ClientConfig {
            short_circuit_offline: false,
            ..fast_config()
        };
        let client = client_with(transport.clone(), config).with_status_board(board.clone());
        board.record(&client.endpoint(), HealthStatus::Offline);

        let result = client
            .print(&ticket(), PrintOptions::default(), &CancellationToken::new())
            .await;
        assert!(result.is_ok());
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn stale_offline_reading_does_not_short_circuit() {
        let transport = FakeTransport::always(Reply::Respond(200, ""));
        let board = Arc::new(StatusBoard::new());
        let config = ClientConfig {
            poll_interval_ms: 10,
            health_timeout_ms: 10,
            ..fast_config()
        };
        let client = client_with(transport.clone(), config).with_status_board(board.clone());
        board.record(&client.endpoint(), HealthStatus::Offline);
        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = client
            .print(&ticket(), PrintOptions::default(), &CancellationToken::new())
            .await;
        assert!(result.is_ok());
        assert_eq!(transport.attempts(), 1);
    }

    // -- configuration -------------------------------------------------

    #[tokio::test]
    async fn saved_address_applies_to_next_call() {
        let transport = FakeTransport::always(Reply::Respond(200, ""));
        let client = client_with(transport.clone(), fast_config());

        client.check_configured_health().await;
        client.store().save("https://printer.local:9000/").unwrap();
        client.check_configured_health().await;
        client.store().reset().unwrap();
        client.check_configured_health().await;

        let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "http://10.0.0.5:3001/health",
                "https://printer.local:9000/health",
                "http://localhost:3001/health",
            ]
        );
    }

    #[test]
    fn classification_table() {
        assert!(matches!(
            classify(TransportError::Connect("dns".into())),
            PrintError::Unreachable(_)
        ));
        assert!(matches!(
            classify(TransportError::Timeout(Duration::from_secs(1))),
            PrintError::Unreachable(_)
        ));
        assert!(matches!(
            classify(TransportError::InvalidUrl("bad".into())),
            PrintError::Unreachable(_)
        ));
        assert!(matches!(
            classify(TransportError::Other("tls".into())),
            PrintError::Unknown(_)
        ));
    }

    // -- real sockets --------------------------------------------------

    fn real_client(address: &str, config: ClientConfig) -> PrintServerClient {
        let store = ConfigStore::in_memory();
        store.save(address).unwrap();
        PrintServerClient::new(store, Arc::new(ReqwestTransport::new().unwrap()), config)
    }

    /// Read one HTTP request (headers plus `content-length` body).
    async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return buf;
                }
            }
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return buf;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    #[tokio::test]
    async fn resetting_daemon_reports_offline_within_bound() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let client = real_client(&format!("127.0.0.1:{port}"), fast_config());
        let started = Instant::now();
        assert_eq!(client.check_configured_health().await, HealthStatus::Offline);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn rejecting_daemon_sees_exactly_one_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let counter = counter.clone();
                tokio::spawn(async move {
                    let request = read_request(&mut socket).await;
                    if !request.is_empty() {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 12\r\nconnection: close\r\n\r\nout of paper",
                        )
                        .await;
                });
            }
        });

        let config = ClientConfig {
            print_timeout_ms: 2_000,
            ..fast_config()
        };
        let client = real_client(&format!("127.0.0.1:{port}"), config);

        let result = client
            .print(&ticket(), PrintOptions::default(), &CancellationToken::new())
            .await;

        assert_eq!(
            result,
            Err(PrintError::Rejected {
                status: 503,
                body: "out of paper".into()
            })
        );
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unparsed_address_fails_at_call_time() {
        let config = ClientConfig {
            max_retries: 0,
            ..fast_config()
        };
        let client = real_client("http://bad host/", config);
        assert_eq!(client.endpoint(), ServerEndpoint::Unparsed("http://bad host".into()));

        assert_eq!(client.check_configured_health().await, HealthStatus::Offline);
        let result = client
            .print(&ticket(), PrintOptions::default(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(PrintError::Unreachable(_))), "{result:?}");
    }
}
