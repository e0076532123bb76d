//! The NTRIP Caster: accepts TCP connections, serves the sourcetable,
//! and multiplexes RTCM3 corrections from one producer per mountpoint
//! to any number of consumers.
//!
//! New relative to the teacher crate — grounded on
//! `examples/original_source/src/ntrip.py::Caster` for the request
//! dispatch/response shape, and on
//! `examples/mycrl-turn-rs/turn-server/src/server/tcp.rs` for the tokio
//! accept-loop idiom (`tokio::spawn` per connection, a registry guarded
//! by a single lock rather than hand-rolled synchronization).

mod fanout;
mod prober;
mod registry;
mod request;

pub use registry::Connection;
pub use request::{Method, Request};

use std::{sync::Arc, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Notify,
};

use crate::{
    config::CasterConfig,
    credentials::NtripCredentials,
    error::{NtripError, Result},
    sourcetable::Sourcetable,
};

use registry::Registry;
use request::MAX_REQUEST_BYTES;

const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Headers every success response carries, per spec.md §4.6.
const MANDATORY_HEADERS: &str = "Server: NTRIP ESP32_GPS/2.0\r\nNtrip-Version: Ntrip/2.0\r\n";

/// Extra headers on a `GET /<mount>` 200 OK, per the spec.md §4.6 dispatch table.
const GET_SUCCESS_HEADERS: &str = "Content-Type: gnss/data\r\nConnection: keep-alive\r\n";

/// A running NTRIP caster: owns the mountpoint registry, the advertised
/// sourcetable, and the two credential pairs (one for consumers, one for
/// producers) this instance accepts.
pub struct Caster {
    config: CasterConfig,
    client_creds: NtripCredentials,
    server_creds: NtripCredentials,
    sourcetable: Sourcetable,
    registry: Arc<Registry>,
}

impl Caster {
    pub fn new(
        config: CasterConfig,
        client_creds: NtripCredentials,
        server_creds: NtripCredentials,
        sourcetable: Sourcetable,
    ) -> Self {
        Self {
            config,
            client_creds,
            server_creds,
            sourcetable,
            registry: Arc::new(Registry::new()),
        }
    }

    /// Bind the listening socket. Separated from [`Caster::run`] so
    /// callers can observe bind failures (the one error that reaches
    /// the process boundary, per the error handling design) before
    /// committing to the accept loop.
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.address())
            .await
            .map_err(NtripError::Io)
    }

    /// Run the accept loop and liveness prober until `shutdown` fires.
    /// Every accepted connection is dispatched on its own task; the
    /// caster itself never blocks on a single connection's I/O.
    pub async fn run(self: Arc<Self>, listener: TcpListener, shutdown: Arc<Notify>) {
        let prober = tokio::spawn(prober::run(
            Arc::clone(&self.registry),
            Duration::from_secs(self.config.probe_interval_secs),
            Arc::clone(&shutdown),
        ));

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let caster = Arc::clone(&self);
                            let shutdown = Arc::clone(&shutdown);
                            tokio::spawn(async move {
                                caster.handle_connection(stream, peer_addr, shutdown).await;
                            });
                        }
                        Err(err) => {
                            #[cfg(feature = "log")]
                            tracing::warn!(error = %err, "accept failed");
                        }
                    }
                }
                _ = shutdown.notified() => break,
            }
        }

        // Dropping each connection's last `Arc<TcpStream>` closes its socket.
        drop(self.registry.drain_all().await);
        prober.abort();
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer_addr: std::net::SocketAddr, shutdown: Arc<Notify>) {
        let request = match read_request(&mut stream).await {
            Ok(request) => request,
            Err(_) => return,
        };

        match request.method {
            Method::Get if request.path.is_empty() => {
                let _ = write_sourcetable(&mut stream, &self.sourcetable).await;
            }
            Method::Get => {
                self.handle_get_mount(stream, peer_addr, &request).await;
            }
            Method::Post => {
                self.handle_post_mount(stream, peer_addr, &request, shutdown).await;
            }
            Method::Other => {}
        }
    }

    async fn handle_get_mount(&self, mut stream: TcpStream, peer_addr: std::net::SocketAddr, request: &Request) {
        if let Err(err) = self.check_get_mount(request).await {
            let _ = write_status(&mut stream, reason_phrase(&err), None).await;
            return;
        }

        if write_status(&mut stream, "200 OK", Some(GET_SUCCESS_HEADERS)).await.is_err() {
            return;
        }

        self.registry
            .attach_consumer(&request.path, Connection::new(stream, peer_addr))
            .await;
    }

    async fn check_get_mount(&self, request: &Request) -> Result<()> {
        if !self.sourcetable.allowed_mounts().contains(&request.path) {
            return Err(NtripError::UnknownMountpoint(request.path.clone()));
        }
        if !request.authorized_as(&self.client_creds) {
            return Err(NtripError::Auth);
        }
        if !self.registry.has_producer(&request.path).await {
            return Err(NtripError::MountpointUnavailable(request.path.clone()));
        }
        Ok(())
    }

    async fn handle_post_mount(
        &self,
        mut stream: TcpStream,
        peer_addr: std::net::SocketAddr,
        request: &Request,
        shutdown: Arc<Notify>,
    ) {
        if let Err(err) = self.check_post_mount(request).await {
            let _ = write_status(&mut stream, reason_phrase(&err), None).await;
            return;
        }

        if write_status(&mut stream, "200 OK", None).await.is_err() {
            return;
        }

        let producer = Connection::new(stream, peer_addr);
        if !self.registry.attach_producer(&request.path, producer.clone()).await {
            // Lost a race against another POST between the check above and
            // now; the loser's socket is simply dropped.
            return;
        }

        #[cfg(feature = "log")]
        tracing::info!(mount = %request.path, peer = %peer_addr, "producer attached");

        fanout::run(request.path.clone(), Arc::clone(&self.registry), producer, shutdown).await;
    }

    async fn check_post_mount(&self, request: &Request) -> Result<()> {
        if !self.sourcetable.allowed_mounts().contains(&request.path) {
            return Err(NtripError::UnknownMountpoint(request.path.clone()));
        }
        if !request.authorized_as(&self.server_creds) {
            return Err(NtripError::Auth);
        }
        if self.registry.has_producer(&request.path).await {
            return Err(NtripError::MountpointConflict(request.path.clone()));
        }
        Ok(())
    }
}

/// The exact reason phrase spec.md's request-dispatch table requires for
/// each error kind the caster can raise while handling a request.
fn reason_phrase(err: &NtripError) -> &'static str {
    match err {
        NtripError::UnknownMountpoint(_) => "404 Invalid Mountpoint",
        NtripError::Auth => "401 Invalid Username or Password",
        NtripError::MountpointUnavailable(_) => "503 Mountpoint Unavailable",
        NtripError::MountpointConflict(_) => "409 Mountpoint Conflict",
        _ => "500 Internal Server Error",
    }
}

async fn read_request(stream: &mut TcpStream) -> Result<Request> {
    let mut buf = Vec::with_capacity(256);
    let mut chunk = [0u8; 256];

    loop {
        if buf.len() >= MAX_REQUEST_BYTES {
            return Err(NtripError::MalformedInput("request exceeded maximum size".into()));
        }
        let n = tokio::time::timeout(REQUEST_READ_TIMEOUT, stream.read(&mut chunk))
            .await
            .map_err(|_| NtripError::MalformedInput("timed out reading request".into()))??;
        if n == 0 {
            return Err(NtripError::MalformedInput("connection closed before request completed".into()));
        }
        buf.extend_from_slice(&chunk[..n]);
        if request::header_end(&buf).is_some() {
            break;
        }
    }

    let text = String::from_utf8_lossy(&buf);
    Request::parse(&text)
}

/// Write a status line followed by the mandatory `Server`/`Ntrip-Version`
/// headers, any `extra_headers`, and the terminating blank line.
/// `reason` is the exact reason phrase (e.g. `"404 Invalid Mountpoint"`).
async fn write_status(stream: &mut TcpStream, reason: &str, extra_headers: Option<&str>) -> std::io::Result<()> {
    let mut response = format!("HTTP/1.1 {reason}\r\n{MANDATORY_HEADERS}");
    if let Some(extra) = extra_headers {
        response.push_str(extra);
    }
    response.push_str("\r\n");
    stream.write_all(response.as_bytes()).await
}

async fn write_sourcetable(stream: &mut TcpStream, table: &Sourcetable) -> std::io::Result<()> {
    let header = format!("SOURCETABLE 200 OK\r\n{MANDATORY_HEADERS}Content-Type: text/plain\r\nConnection: close\r\n\r\n");
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&table.render()).await
}
