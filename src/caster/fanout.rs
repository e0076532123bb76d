//! Per-producer fan-out task: reads raw bytes from one producer, feeds a
//! dedicated [`Framer`], and broadcasts every complete RTCM3 frame to the
//! mountpoint's registered consumers.

use std::io::ErrorKind;

use crate::framer::Framer;

use super::registry::{Connection, Registry};

/// Drive the fan-out loop for `mount` until the producer disconnects or
/// `shutdown` fires. On return, the mountpoint has already been detached
/// from `registry` and every connection it owned has been shut down.
pub async fn run(
    mount: String,
    registry: std::sync::Arc<Registry>,
    producer: Connection,
    shutdown: std::sync::Arc<tokio::sync::Notify>,
) {
    let mut framer = Framer::new();
    let mut buf = [0u8; 1024];

    loop {
        tokio::select! {
            readiness = producer.stream.readable() => {
                if readiness.is_err() {
                    break;
                }
                match producer.stream.try_read(&mut buf) {
                    Ok(0) => break, // producer closed
                    Ok(n) => {
                        if framer.feed(&buf[..n]).is_err() {
                            // Overflow: framer already reset itself, keep going.
                            continue;
                        }
                        while let Some(frame) = framer.next() {
                            if frame.is_rtcm3() {
                                broadcast(&registry, &mount, frame.as_bytes()).await;
                            }
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                    Err(_) => break,
                }
            }
            _ = shutdown.notified() => break,
        }
    }

    #[cfg(feature = "log")]
    tracing::info!(mount = %mount, "producer disconnected, tearing down mountpoint");

    // Dropping each connection's last `Arc<TcpStream>` closes its socket.
    drop(registry.detach_mount(&mount).await);
}

/// Write `data` to every consumer of `mount`, dropping any consumer whose
/// socket errors or can't keep up within its own write loop.
async fn broadcast(registry: &Registry, mount: &str, data: &[u8]) {
    for conn in registry.consumers(mount).await {
        if write_all_nonblocking(&conn.stream, data).await.is_err() {
            registry.remove_consumer(mount, conn.peer_addr).await;
        }
    }
}

async fn write_all_nonblocking(stream: &tokio::net::TcpStream, mut data: &[u8]) -> std::io::Result<()> {
    while !data.is_empty() {
        stream.writable().await?;
        match stream.try_write(data) {
            Ok(n) => data = &data[n..],
            Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
