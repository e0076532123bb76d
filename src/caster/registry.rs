//! Mountpoint registry: owns every attached producer and consumer
//! connection. Confined to a single [`tokio::sync::Mutex`] so the
//! accept dispatcher, fan-out tasks and liveness prober can mutate it
//! without a dedicated actor/command-channel (see spec §5 / §9).

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// A registered TCP connection. Cheaply cloneable: the underlying
/// socket is shared via `Arc` so the fan-out task and the prober can
/// each independently perform non-blocking I/O on it (`try_read` /
/// `try_write` / `peek` all take `&self`), without needing to split the
/// stream or contend on a lock for every byte.
#[derive(Clone)]
pub struct Connection {
    pub stream: Arc<TcpStream>,
    pub peer_addr: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            stream: Arc::new(stream),
            peer_addr,
        }
    }
}

#[derive(Default)]
struct Mount {
    producer: Option<Connection>,
    consumers: Vec<Connection>,
}

/// `mounts` from spec §4.6: map from mountpoint name to its producer and
/// consumer set. An entry exists only while a producer is attached.
#[derive(Default)]
pub struct Registry {
    mounts: Mutex<HashMap<String, Mount>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `conn` as the producer of `mount`. Fails (returns `false`,
    /// leaving the existing producer in place) if one is already
    /// attached — callers respond `409 Mountpoint Conflict` in that
    /// case.
    pub async fn attach_producer(&self, mount: &str, conn: Connection) -> bool {
        let mut mounts = self.mounts.lock().await;
        let entry = mounts.entry(mount.to_string()).or_default();
        if entry.producer.is_some() {
            return false;
        }
        entry.producer = Some(conn);
        true
    }

    pub async fn has_producer(&self, mount: &str) -> bool {
        self.mounts
            .lock()
            .await
            .get(mount)
            .is_some_and(|m| m.producer.is_some())
    }

    pub async fn attach_consumer(&self, mount: &str, conn: Connection) {
        let mut mounts = self.mounts.lock().await;
        if let Some(entry) = mounts.get_mut(mount) {
            entry.consumers.push(conn);
        }
    }

    pub async fn consumers(&self, mount: &str) -> Vec<Connection> {
        self.mounts
            .lock()
            .await
            .get(mount)
            .map(|m| m.consumers.clone())
            .unwrap_or_default()
    }

    pub async fn producer(&self, mount: &str) -> Option<Connection> {
        self.mounts.lock().await.get(mount).and_then(|m| m.producer.clone())
    }

    pub async fn remove_consumer(&self, mount: &str, addr: SocketAddr) {
        let mut mounts = self.mounts.lock().await;
        if let Some(entry) = mounts.get_mut(mount) {
            entry.consumers.retain(|c| c.peer_addr != addr);
        }
    }

    /// Detach a mountpoint entirely: used when its producer disconnects.
    /// Returns every connection (producer + consumers) that the caller
    /// must now close.
    pub async fn detach_mount(&self, mount: &str) -> Vec<Connection> {
        let mut mounts = self.mounts.lock().await;
        match mounts.remove(mount) {
            Some(entry) => {
                let mut all = entry.consumers;
                if let Some(producer) = entry.producer {
                    all.push(producer);
                }
                all
            }
            None => Vec::new(),
        }
    }

    /// Every mountpoint name currently producing, for the prober to
    /// iterate.
    pub async fn mount_names(&self) -> Vec<String> {
        self.mounts.lock().await.keys().cloned().collect()
    }

    /// Tear down every mount on shutdown, returning all connections to
    /// close.
    pub async fn drain_all(&self) -> Vec<Connection> {
        let mut mounts = self.mounts.lock().await;
        mounts
            .drain()
            .flat_map(|(_, mount)| {
                let mut all = mount.consumers;
                if let Some(producer) = mount.producer {
                    all.push(producer);
                }
                all
            })
            .collect()
    }
}
