//! NTRIP Client: dials an upstream caster in download direction and
//! exposes received bytes as a lazy, restartable stream.

use std::{pin::Pin, sync::Arc};

use bytes::Bytes;
use futures::Stream;
use tokio::{
    io::AsyncReadExt,
    net::TcpStream,
    sync::{mpsc, Notify},
    task::JoinHandle,
};

use crate::{
    config::UpstreamConfig,
    connector::{self, Role},
    credentials::NtripCredentials,
};

/// Maximum size of a single chunk yielded on the client's byte stream.
const CHUNK_SIZE: usize = 128;

/// Delay before reconnecting after the peer closes the connection.
const RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

/// NTRIP Client, used to connect to an NTRIP (RTCM) service in download
/// (`GET`) mode.
pub struct NtripClient {
    config: UpstreamConfig,
    creds: NtripCredentials,
}

impl NtripClient {
    pub fn new(config: UpstreamConfig, creds: NtripCredentials) -> Self {
        Self { config, creds }
    }

    /// Connect (retrying indefinitely, per [`connector::connect_loop`])
    /// and spawn the receive loop. The returned [`NtripHandle`] is a
    /// lazy [`Stream`] of byte chunks; no parsing is performed on this
    /// path, bytes are forwarded verbatim upstream→receiver.
    pub fn connect(self, shutdown: Arc<Notify>) -> NtripHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(self.config, self.creds, tx, shutdown));
        NtripHandle { _task: task, rx }
    }
}

/// Lazy, restartable stream of byte chunks received from an NTRIP caster.
pub struct NtripHandle {
    _task: JoinHandle<()>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Stream for NtripHandle {
    type Item = Bytes;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

async fn run(
    config: UpstreamConfig,
    creds: NtripCredentials,
    tx: mpsc::UnboundedSender<Bytes>,
    shutdown: Arc<Notify>,
) {
    'reconnect: loop {
        let mut sock = match connector::connect_loop(Role::Client, &config, &creds, &shutdown).await {
            Some(sock) => sock,
            None => return, // shutdown fired before we logged in
        };

        #[cfg(feature = "log")]
        tracing::debug!(mount = %config.mount, "NTRIP client connected");

        loop {
            let mut buf = [0u8; CHUNK_SIZE];
            tokio::select! {
                result = sock.read(&mut buf) => match result {
                    Ok(0) => {
                        #[cfg(feature = "log")]
                        tracing::warn!("NTRIP client connection closed by peer, reconnecting");
                        if !sleep_or_shutdown(RECONNECT_DELAY, &shutdown).await {
                            return;
                        }
                        continue 'reconnect;
                    }
                    Ok(n) => {
                        if tx.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                            return; // handle dropped, nothing left to feed
                        }
                    }
                    Err(err) => {
                        #[cfg(feature = "log")]
                        tracing::warn!(error = %err, "NTRIP client read error, reconnecting");
                        if !sleep_or_shutdown(RECONNECT_DELAY, &shutdown).await {
                            return;
                        }
                        continue 'reconnect;
                    }
                },
                _ = shutdown.notified() => return,
            }
        }
    }
}

/// Sleep for `delay`, observing `shutdown`. Returns `false` if shutdown
/// fired first.
async fn sleep_or_shutdown(delay: std::time::Duration, shutdown: &Notify) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.notified() => false,
    }
}
