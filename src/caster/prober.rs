//! Liveness prober: on a fixed interval, probes every registered
//! consumer with a non-consuming-in-intent, non-blocking read and every
//! producer with a non-blocking zero-length write, dropping whichever
//! side reports a hard error.
//!
//! The consumer side is safe to probe by actually reading a byte,
//! because consumers never send meaningful application data upstream in
//! this protocol (the same trade-off `original_source/src/ntrip.py`
//! makes with its own one-byte liveness `recv`). The producer side must
//! not steal bytes the fan-out task needs, so it is probed via the
//! otherwise-idle write direction instead.

use std::{sync::Arc, time::Duration};

use tokio::sync::Notify;

use super::registry::Registry;

pub async fn run(registry: Arc<Registry>, interval: Duration, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.notified() => return,
        }
        probe_all(&registry).await;
    }
}

async fn probe_all(registry: &Registry) {
    for mount in registry.mount_names().await {
        if let Some(producer) = registry.producer(&mount).await {
            if !probe_write(&producer.stream) {
                #[cfg(feature = "log")]
                tracing::warn!(mount = %mount, "producer failed liveness probe");
                drop(registry.detach_mount(&mount).await);
                continue;
            }
        }

        for consumer in registry.consumers(&mount).await {
            if !probe_read(&consumer.stream) {
                #[cfg(feature = "log")]
                tracing::warn!(mount = %mount, peer = %consumer.peer_addr, "consumer failed liveness probe");
                registry.remove_consumer(&mount, consumer.peer_addr).await;
            }
        }
    }
}

fn probe_read(stream: &tokio::net::TcpStream) -> bool {
    let mut throwaway = [0u8; 1];
    match stream.try_read(&mut throwaway) {
        Ok(0) => false,
        Ok(_) => true,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
        Err(_) => false,
    }
}

fn probe_write(stream: &tokio::net::TcpStream) -> bool {
    match stream.try_write(&[]) {
        Ok(_) => true,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
        Err(_) => false,
    }
}
