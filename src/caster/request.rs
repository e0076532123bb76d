//! Parses the inbound request line and `Authorization` header off a raw,
//! non-blocking byte stream, without needing a full HTTP parser — mirrors
//! the NTRIP request shape built by [`crate::connector::build_request`].

use crate::error::{NtripError, Result};

/// Maximum bytes read while looking for the end of the request headers.
/// A legitimate NTRIP `GET`/`POST` line plus a handful of headers always
/// fits comfortably inside this.
pub const MAX_REQUEST_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

/// A parsed request line + the `Authorization` header value, if present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Mountpoint name with the leading `/` stripped; empty for `GET /`.
    pub path: String,
    /// Raw value following `Authorization: Basic `, if the header was
    /// present and well formed.
    pub basic_auth: Option<String>,
}

impl Request {
    /// Parse `raw` (a complete, CRLF-terminated request up to the blank
    /// line) into a [`Request`]. Fails with
    /// [`NtripError::MalformedInput`] if the request line cannot be
    /// read.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw.lines();
        let request_line = lines
            .next()
            .ok_or_else(|| NtripError::MalformedInput("empty request".into()))?;

        let mut parts = request_line.split_whitespace();
        let method = match parts.next() {
            Some("GET") => Method::Get,
            Some("POST") => Method::Post,
            Some(_) => Method::Other,
            None => return Err(NtripError::MalformedInput("missing method".into())),
        };
        let target = parts
            .next()
            .ok_or_else(|| NtripError::MalformedInput("missing request target".into()))?;
        let path = target.trim_start_matches('/').to_string();

        let basic_auth = lines
            .find_map(|line| line.strip_prefix("Authorization: Basic "))
            .map(|value| value.trim().to_string());

        Ok(Request { method, path, basic_auth })
    }

    /// Whether `creds` encode to the same value carried in this request's
    /// `Authorization` header.
    pub fn authorized_as(&self, creds: &crate::credentials::NtripCredentials) -> bool {
        self.basic_auth.as_deref() == Some(creds.encode().as_str())
    }
}

/// Scan `buf` for the CRLFCRLF that ends an HTTP-style header block,
/// returning the byte offset just past it.
pub fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::NtripCredentials;

    #[test]
    fn parses_get_sourcetable_request() {
        let req = Request::parse("GET / HTTP/1.1\r\nUser-Agent: x\r\n\r\n").unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "");
        assert!(req.basic_auth.is_none());
    }

    #[test]
    fn parses_post_with_auth() {
        let creds = NtripCredentials::new("s", "s");
        let raw = format!(
            "POST /ESP32 HTTP/1.1\r\nAuthorization: Basic {}\r\n\r\n",
            creds.encode()
        );
        let req = Request::parse(&raw).unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.path, "ESP32");
        assert!(req.authorized_as(&creds));
    }

    #[test]
    fn rejects_missing_method() {
        assert!(Request::parse("").is_err());
    }

    #[test]
    fn finds_header_terminator() {
        let buf = b"GET / HTTP/1.1\r\n\r\nTRAILING";
        assert_eq!(header_end(buf), Some(18));
    }
}
