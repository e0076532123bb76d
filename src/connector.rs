//! Shared upstream dialer used by [`crate::client::NtripClient`] and
//! [`crate::server::NtripServer`]: builds the NTRIP request, verifies
//! the response, and reconnects with backoff on failure.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use crate::{
    config::UpstreamConfig,
    credentials::NtripCredentials,
    error::{NtripError, Result},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_DELAY: Duration = Duration::from_secs(3);
const RESPONSE_READ_CAP: usize = 2048;

/// Which direction this connector is being used for; only affects the
/// request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// NTRIP Client: downloads corrections.
    Client,
    /// NTRIP Server: uploads corrections.
    Server,
}

impl Role {
    fn method(self) -> &'static str {
        match self {
            Role::Client => "GET",
            Role::Server => "POST",
        }
    }
}

/// Build the NTRIP request line + headers for `role` against `config`,
/// authenticating with `creds`.
pub fn build_request(role: Role, config: &UpstreamConfig, creds: &NtripCredentials) -> Vec<u8> {
    let auth = general_purpose::STANDARD.encode(format!("{}:{}", creds.user, creds.password));
    format!(
        "{method} /{mount} HTTP/1.1\r\n\
         Ntrip-Version: Ntrip/2.0\r\n\
         User-Agent: {agent}\r\n\
         Authorization: Basic {auth}\r\n\
         Connection: keep-alive\r\n\
         \r\n",
        method = role.method(),
        mount = config.mount,
        agent = config.user_agent,
    )
    .into_bytes()
}

/// Dial `config.address()`, send the request for `role`, and verify a
/// response line ending in `200 OK`. Retries indefinitely on any
/// failure (DNS, connect, I/O, or non-200), sleeping [`RETRY_DELAY`]
/// between attempts, until `shutdown` fires.
///
/// Returns `None` only when `shutdown` fires before a connection is
/// established.
pub async fn connect_loop(
    role: Role,
    config: &UpstreamConfig,
    creds: &NtripCredentials,
    shutdown: &tokio::sync::Notify,
) -> Option<TcpStream> {
    let request = build_request(role, config, creds);

    loop {
        let attempt = try_connect_once(&config.address(), &request);

        tokio::select! {
            result = attempt => match result {
                Ok(sock) => return Some(sock),
                Err(err) => {
                    #[cfg(feature = "log")]
                    tracing::warn!(address = %config.address(), error = %err, "upstream connect failed, retrying");
                }
            },
            _ = shutdown.notified() => return None,
        }

        tokio::select! {
            _ = tokio::time::sleep(RETRY_DELAY) => {}
            _ = shutdown.notified() => return None,
        }
    }
}

async fn try_connect_once(address: &str, request: &[u8]) -> Result<TcpStream> {
    let mut sock = timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| NtripError::Transport(format!("connect to {address} timed out")))??;

    sock.write_all(request).await?;

    let mut buf = vec![0u8; RESPONSE_READ_CAP];
    let n = sock.read(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf[..n]);

    let logged_in = response.lines().any(|line| line.ends_with("200 OK"));
    if !logged_in {
        return Err(NtripError::Transport(format!(
            "upstream rejected login: {}",
            response.lines().next().unwrap_or("<empty response>")
        )));
    }

    Ok(sock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_get_request() {
        let config = UpstreamConfig {
            host: "caster.example".into(),
            port: 2101,
            mount: "ESP32".into(),
            user_agent: "NTRIP test/1.0".into(),
        };
        let creds = NtripCredentials::new("c", "c");
        let request = build_request(Role::Client, &config, &creds);
        let request = String::from_utf8(request).unwrap();

        assert!(request.starts_with("GET /ESP32 HTTP/1.1\r\n"));
        assert!(request.contains("Ntrip-Version: Ntrip/2.0\r\n"));
        assert!(request.contains("Authorization: Basic Yzpj\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn builds_post_request() {
        let config = UpstreamConfig {
            host: "caster.example".into(),
            port: 2101,
            mount: "ESP32".into(),
            user_agent: "NTRIP test/1.0".into(),
        };
        let creds = NtripCredentials::new("s", "s");
        let request = build_request(Role::Server, &config, &creds);
        let request = String::from_utf8(request).unwrap();
        assert!(request.starts_with("POST /ESP32 HTTP/1.1\r\n"));
    }
}
