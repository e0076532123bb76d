//! NTRIP Server (producer): dials an upstream caster in upload
//! direction and reliably streams a bounded, back-pressured queue of
//! RTCM frames.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::Bytes;
use tokio::{
    io::AsyncWriteExt,
    sync::Notify,
};

use crate::{
    config::UpstreamConfig,
    connector::{self, Role},
    credentials::NtripCredentials,
};

/// Default bound on the [`SendQueue`]; within the 10-128 range allowed
/// by the spec.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Bounded FIFO of RTCM frames awaiting upload. Append never blocks and
/// drops nothing while capacity remains; on overflow the oldest frame is
/// dropped to favour freshness (RTCM corrections age quickly).
struct SendQueue {
    items: VecDeque<Bytes>,
    capacity: usize,
}

impl SendQueue {
    fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns `true` if an older frame was dropped to make room.
    fn push_back(&mut self, frame: Bytes) -> bool {
        let mut dropped = false;
        if self.items.len() >= self.capacity {
            self.items.pop_front();
            dropped = true;
        }
        self.items.push_back(frame);
        dropped
    }

    fn push_front(&mut self, frame: Bytes) {
        self.items.push_front(frame);
    }

    fn front(&self) -> Option<Bytes> {
        self.items.front().cloned()
    }

    fn pop_front(&mut self) {
        self.items.pop_front();
    }
}

/// NTRIP Server (producer), used to push RTCM corrections upstream via
/// `POST`. Cheaply cloneable: every clone shares the same underlying
/// queue, so callers can keep a handle for [`NtripServer::enqueue`]
/// while handing another clone's [`NtripServer::run`] off to its own
/// task.
#[derive(Clone)]
pub struct NtripServer {
    config: UpstreamConfig,
    creds: NtripCredentials,
    queue: Arc<Mutex<SendQueue>>,
    non_empty: Arc<Notify>,
}

impl NtripServer {
    pub fn new(config: UpstreamConfig, creds: NtripCredentials) -> Self {
        Self::with_capacity(config, creds, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(config: UpstreamConfig, creds: NtripCredentials, capacity: usize) -> Self {
        Self {
            config,
            creds,
            queue: Arc::new(Mutex::new(SendQueue::new(capacity))),
            non_empty: Arc::new(Notify::new()),
        }
    }

    /// Append `frame` to the bounded queue and signal the drain loop.
    /// Never blocks; drops the oldest frame on overflow.
    ///
    /// Callers must only enqueue non-NMEA (RTCM) frames; the server does
    /// not filter its input.
    pub fn enqueue(&self, frame: Bytes) {
        let dropped = self.queue.lock().unwrap().push_back(frame);
        if dropped {
            #[cfg(feature = "log")]
            tracing::warn!("send queue full, dropped oldest frame");
        }
        self.non_empty.notify_one();
    }

    /// The drain loop: connects, then repeatedly waits on the non-empty
    /// signal and drains the queue head-first, writing each frame and
    /// flushing. On write failure, the in-flight frame is put back at
    /// the head of the queue, the socket is closed, and the loop
    /// reconnects after a delay — preserving at-least-once delivery
    /// at the cost of possibly re-sending one frame.
    pub async fn run(self, shutdown: Arc<Notify>) {
        'reconnect: loop {
            let mut sock = match connector::connect_loop(Role::Server, &self.config, &self.creds, &shutdown).await {
                Some(sock) => sock,
                None => return,
            };

            #[cfg(feature = "log")]
            tracing::debug!(mount = %self.config.mount, "NTRIP server connected");

            loop {
                if self.queue.lock().unwrap().front().is_none() {
                    tokio::select! {
                        _ = self.non_empty.notified() => {}
                        _ = shutdown.notified() => return,
                    }
                }

                if drain_queue(&self.queue, &mut sock).await.is_err() {
                    #[cfg(feature = "log")]
                    tracing::warn!("NTRIP server write failed, reconnecting");
                    if !sleep_or_shutdown(RECONNECT_DELAY, &shutdown).await {
                        return;
                    }
                    continue 'reconnect;
                }
            }
        }
    }
}

/// Drain `queue` head-first into `sock`, writing and flushing each frame.
/// On the first write failure the in-flight frame is put back at the
/// head of the queue and the error is returned; frames already written
/// successfully are gone for good.
async fn drain_queue<W>(queue: &Mutex<SendQueue>, sock: &mut W) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(frame) = queue.lock().unwrap().front() {
        match write_frame(sock, &frame).await {
            Ok(()) => {
                queue.lock().unwrap().pop_front();
            }
            Err(err) => {
                queue.lock().unwrap().push_front(frame);
                return Err(err);
            }
        }
    }
    Ok(())
}

async fn write_frame<W>(sock: &mut W, frame: &[u8]) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    sock.write_all(frame).await?;
    sock.flush().await
}

async fn sleep_or_shutdown(delay: Duration, shutdown: &Notify) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.notified() => false,
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[test]
    fn overflow_drops_oldest() {
        let mut queue = SendQueue::new(2);
        assert!(!queue.push_back(Bytes::from_static(b"a")));
        assert!(!queue.push_back(Bytes::from_static(b"b")));
        assert!(queue.push_back(Bytes::from_static(b"c")));
        assert_eq!(queue.front().unwrap(), Bytes::from_static(b"b"));
    }

    #[test]
    fn requeue_preserves_order() {
        let mut queue = SendQueue::new(8);
        queue.push_back(Bytes::from_static(b"a"));
        queue.push_back(Bytes::from_static(b"b"));
        let in_flight = queue.front().unwrap();
        queue.pop_front();
        queue.push_front(in_flight);
        assert_eq!(queue.front().unwrap(), Bytes::from_static(b"a"));
        queue.pop_front();
        assert_eq!(queue.front().unwrap(), Bytes::from_static(b"b"));
    }

    #[tokio::test]
    async fn enqueue_signals_drain_loop() {
        let config = UpstreamConfig {
            host: "127.0.0.1".into(),
            port: 1,
            mount: "ESP32".into(),
            user_agent: "NTRIP test/1.0".into(),
        };
        let server = NtripServer::new(config, NtripCredentials::new("s", "s"));
        server.enqueue(Bytes::from_static(b"frame"));
        assert!(server.queue.lock().unwrap().front().is_some());
    }

    #[tokio::test]
    async fn write_failure_requeues_in_flight_frame() {
        let queue = Mutex::new(SendQueue::new(8));
        queue.lock().unwrap().push_back(Bytes::from_static(b"A"));
        queue.lock().unwrap().push_back(Bytes::from_static(b"B"));
        queue.lock().unwrap().push_back(Bytes::from_static(b"C"));

        // Peer dropped: writes to this half return BrokenPipe.
        let (mut broken, peer) = tokio::io::duplex(64);
        drop(peer);

        let err = drain_queue(&queue, &mut broken).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);

        // "A" is still at the head, order preserved.
        assert_eq!(queue.lock().unwrap().front().unwrap(), Bytes::from_static(b"A"));

        // A healthy socket now drains A, B, C in order with no loss.
        let (mut good, mut test_end) = tokio::io::duplex(64);
        let drain = tokio::spawn(async move { drain_queue(&queue, &mut good).await });

        let mut received = Vec::new();
        let mut buf = [0u8; 16];
        for _ in 0..3 {
            let n = test_end.read(&mut buf).await.unwrap();
            received.push(buf[..n].to_vec());
        }
        drain.await.unwrap().unwrap();

        assert_eq!(received, vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]);
    }
}
