//! Configuration objects for the client, server and caster.

use std::str::FromStr;

use strum::{Display, EnumString, VariantNames};

use crate::NtripError;

/// Connection settings shared by [`crate::client::NtripClient`] and
/// [`crate::server::NtripServer`]: which caster to dial and which
/// mountpoint to use.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "clap", derive(clap::Parser))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpstreamConfig {
    /// Host name or IP address of the NTRIP caster.
    #[cfg_attr(
        feature = "clap",
        clap(long = "ntrip-host", env = "NTRIP_HOST", default_value = "rtk2go.com")
    )]
    pub host: String,

    /// Port number of the NTRIP caster.
    #[cfg_attr(
        feature = "clap",
        clap(long = "ntrip-port", env = "NTRIP_PORT", default_value_t = 2101)
    )]
    pub port: u16,

    /// Mountpoint name to GET / POST.
    #[cfg_attr(
        feature = "clap",
        clap(long = "ntrip-mount", env = "NTRIP_MOUNT", default_value = "ESP32")
    )]
    pub mount: String,

    /// User-Agent header value sent with the request line.
    #[cfg_attr(
        feature = "clap",
        clap(
            long = "ntrip-user-agent",
            env = "NTRIP_USER_AGENT",
            default_value = "NTRIP ntrip-core/2.0"
        )
    )]
    pub user_agent: String,
}

/// Alias kept for symmetry between the client and server CLI surfaces.
pub type ClientConfig = UpstreamConfig;
pub type ServerConfig = UpstreamConfig;

impl UpstreamConfig {
    /// Generate a connection address ("host:port") from the config.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Caster listen configuration: bind address/port plus the two credential
/// pairs (one for consumers, one for producers) and the sourcetable this
/// caster advertises.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "clap", derive(clap::Parser))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CasterConfig {
    /// Address to bind the caster's TCP listener on.
    #[cfg_attr(
        feature = "clap",
        clap(long = "bind-address", env = "NTRIP_BIND_ADDRESS", default_value = "0.0.0.0")
    )]
    pub bind_address: String,

    /// Port to bind the caster's TCP listener on.
    #[cfg_attr(
        feature = "clap",
        clap(long = "bind-port", env = "NTRIP_BIND_PORT", default_value_t = 2101)
    )]
    pub bind_port: u16,

    /// Probe interval, in seconds, for the liveness prober. Must be within
    /// [5, 10] seconds per the observed source variants.
    #[cfg_attr(
        feature = "clap",
        clap(long = "probe-interval-secs", env = "NTRIP_PROBE_INTERVAL_SECS", default_value_t = 7)
    )]
    pub probe_interval_secs: u64,
}

impl CasterConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

/// Common RTCM data providers, for convenience when parsing an
/// [`UpstreamConfig`] from a short name rather than a full host:port.
#[derive(Clone, PartialEq, Debug, EnumString, Display, VariantNames)]
pub enum RtcmProvider {
    /// RTK2GO.com free service
    #[strum(serialize = "rtk2go")]
    Rtk2Go,
    /// Land Information New Zealand
    ///
    /// Note: requires credentials
    #[strum(serialize = "linz")]
    Linz,
    /// Centipede FR
    #[strum(serialize = "centipede")]
    Centipede,
}

impl RtcmProvider {
    /// Fetch the hostname for the provider.
    pub fn host(&self) -> &str {
        match self {
            RtcmProvider::Linz => "positionz-rt.linz.govt.nz",
            RtcmProvider::Rtk2Go => "rtk2go.com",
            RtcmProvider::Centipede => "caster.centipede.fr",
        }
    }

    /// Fetch the TCP port for the provider.
    pub fn port(&self) -> u16 {
        2101
    }
}

impl FromStr for UpstreamConfig {
    type Err = NtripError;

    /// Parse an [`UpstreamConfig`] from a "host:port" string, optionally
    /// prefixed with "ntrip://", or from a well known [`RtcmProvider`]
    /// name. The mountpoint and user agent are left at their defaults.
    ///
    /// ```
    /// # use ntrip_core::config::UpstreamConfig;
    /// let cfg = "ntrip://rtk2go.com:2101".parse::<UpstreamConfig>().unwrap();
    /// assert_eq!(cfg.host, "rtk2go.com");
    /// assert_eq!(cfg.port, 2101);
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(provider) = RtcmProvider::from_str(s) {
            return Ok(UpstreamConfig {
                host: provider.host().to_string(),
                port: provider.port(),
                mount: "ESP32".to_string(),
                user_agent: "NTRIP ntrip-core/2.0".to_string(),
            });
        }

        let s = s.trim_start_matches("ntrip://");
        let parts: Vec<&str> = s.split(':').collect();
        if parts.is_empty() || parts[0].is_empty() {
            return Err(NtripError::InvalidUrl);
        }
        let host = parts[0].to_string();
        let port = if parts.len() > 1 {
            parts[1].parse::<u16>().map_err(|_| NtripError::InvalidPort)?
        } else {
            2101
        };

        Ok(UpstreamConfig {
            host,
            port,
            mount: "ESP32".to_string(),
            user_agent: "NTRIP ntrip-core/2.0".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port() {
        let cfg = "ntrip://rtk2go.com:2101".parse::<UpstreamConfig>().unwrap();
        assert_eq!(cfg.host, "rtk2go.com");
        assert_eq!(cfg.port, 2101);
    }

    #[test]
    fn parses_known_provider() {
        let cfg = "centipede".parse::<UpstreamConfig>().unwrap();
        assert_eq!(cfg.host, "caster.centipede.fr");
        assert_eq!(cfg.port, 2101);
    }

    #[test]
    fn rejects_empty_host() {
        assert!("".parse::<UpstreamConfig>().is_err());
    }
}
