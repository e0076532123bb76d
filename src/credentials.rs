//! Credentials carried on the wire as HTTP Basic auth.

use base64::{engine::general_purpose, Engine};

/// A (user, password) pair, used by [`crate::client::NtripClient`] and
/// [`crate::server::NtripServer`] to authenticate against a caster, and
/// by [`crate::caster::Caster`] to compare against an inbound
/// `Authorization: Basic ...` header.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "clap", derive(clap::Parser))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NtripCredentials {
    /// Username for the NTRIP service.
    #[cfg_attr(feature = "clap", clap(long = "ntrip-user", env = "NTRIP_USER"))]
    pub user: String,

    /// Password for the NTRIP service.
    #[cfg_attr(
        feature = "clap",
        clap(long = "ntrip-pass", env = "NTRIP_PASS", default_value = "")
    )]
    pub password: String,
}

impl NtripCredentials {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    /// Pre-encode as base64(user:pass), ready to compare verbatim against
    /// the `Authorization: Basic <...>` header value, or to send on an
    /// outbound request.
    pub fn encode(&self) -> String {
        general_purpose::STANDARD.encode(format!("{}:{}", self.user, self.password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_as_basic_auth() {
        let creds = NtripCredentials::new("c", "c");
        assert_eq!(creds.encode(), general_purpose::STANDARD.encode("c:c"));
    }
}
