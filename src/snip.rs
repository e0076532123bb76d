//! Parsing of NTRIP sourcetable responses (`STR;` lines and the
//! surrounding response headers), shared by [`crate::client::NtripClient`]
//! and by [`crate::caster::Caster`] when extracting its own
//! `allowed_mounts` set from a configured sourcetable.
//!
//! Note: mountpoint *selection* by NEAR/GGA position is explicitly out
//! of scope — this module only parses the sourcetable, it never ranks
//! or picks a mount for the caller.

use std::str::FromStr;

use geoutils::Location;
use isocountry::CountryCode;
use strum::{Display, EnumString, VariantNames};

/// Information about an NTRIP server and its mounts, as returned by a
/// `GET /` sourcetable request.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerInfo {
    pub server: Option<String>,
    pub date: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<usize>,

    pub services: Vec<MountInfo>,
}

/// Information about a specific NTRIP mount point, parsed from a
/// `STR;...` sourcetable line.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MountInfo {
    pub name: String,
    pub details: String,
    pub protocol: Protocol,
    pub messages: Vec<String>,
    pub constellations: Vec<Constellation>,
    pub network: Network,
    pub country: Option<CountryCode>,
    pub location: Location,
}

/// NTRIP protocol types
#[derive(Clone, PartialEq, Debug, EnumString, Display, VariantNames)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Protocol {
    #[strum(serialize = "RTCM 3")]
    Rtcm3,
    #[strum(serialize = "RTCM 3.0")]
    Rtcm3_0,
    #[strum(serialize = "RTCM 3.2")]
    Rtcm3_2,
    #[strum(serialize = "RTCM 3.3")]
    Rtcm3_3,
    #[strum(serialize = "RAW")]
    Raw,
    #[strum(serialize = "CMRx")]
    CMRx,
    #[strum(serialize = "UNKNOWN")]
    Unknown,
}

/// NTRIP network types
#[derive(Clone, PartialEq, Debug, EnumString, Display, VariantNames)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Network {
    #[strum(serialize = "SNIP")]
    Snip,
    #[strum(serialize = "NONE")]
    None,
    #[strum(serialize = "UNKNOWN")]
    Unknown,
}

/// GNSS constellation types
#[derive(Clone, PartialEq, Debug, EnumString, Display, VariantNames)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Constellation {
    #[strum(serialize = "GPS")]
    Gps,
    #[strum(serialize = "GLO")]
    Glonass,
    #[strum(serialize = "GAL")]
    Galileo,
    #[strum(serialize = "BDS")]
    BeiDou,
    #[strum(serialize = "QZS")]
    Qzss,
    #[strum(serialize = "UNKNOWN")]
    Unknown,
}

impl ServerInfo {
    /// Parse a sourcetable response from an iterator of lines.
    pub fn parse<'a>(lines: impl Iterator<Item = &'a str>) -> Self {
        let mut server = None;
        let mut date = None;
        let mut content_type = None;
        let mut content_length = None;
        let mut services = Vec::new();

        for line in lines {
            if let Some(rest) = line.strip_prefix("Server: ") {
                server = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("Date: ") {
                date = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("Content-Type: ") {
                content_type = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("Content-Length: ") {
                content_length = rest.parse().ok();
            } else if line.starts_with("STR;") {
                match MountInfo::parse(line) {
                    Some(info) => services.push(info),
                    None => {
                        #[cfg(feature = "log")]
                        tracing::debug!(line, "failed to parse STR line");
                    }
                }
            }
        }

        ServerInfo {
            server,
            date,
            content_type,
            content_length,
            services,
        }
    }
}

impl MountInfo {
    pub fn parse(info: &str) -> Option<Self> {
        let parts: Vec<&str> = info.split(';').collect();
        if parts.len() < 2 {
            return None;
        }

        if parts[0] != "STR" {
            return None;
        }

        let name = parts[1].to_string();
        let details = parts.get(2).map(|s| s.trim().to_string()).unwrap_or_default();
        let protocol = parts
            .get(3)
            .and_then(|s| Protocol::from_str(s).ok())
            .unwrap_or(Protocol::Raw);

        let messages = match parts.get(4) {
            Some(msgs) => msgs.split(',').map(|m| m.trim().to_string()).collect(),
            None => vec![],
        };

        let constellations = match parts.get(6) {
            Some(c) => c
                .split('+')
                .map(|s| Constellation::from_str(s).ok().unwrap_or(Constellation::Unknown))
                .collect::<Vec<_>>(),
            None => vec![],
        };

        let network = parts
            .get(7)
            .and_then(|s| Network::from_str(s).ok())
            .unwrap_or(Network::Unknown);

        let country = parts.get(8).and_then(|s| CountryCode::for_alpha3(s).ok());

        let location = Location::new(
            parts.get(9).and_then(|s| s.parse().ok()).unwrap_or(0.0),
            parts.get(10).and_then(|s| s.parse().ok()).unwrap_or(0.0),
        );

        Some(MountInfo {
            name,
            details,
            protocol,
            messages,
            constellations,
            network,
            country,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_str_line() {
        let info = "STR;VargaRTKhr;Is near: Zagreb, Zagreb;RTCM 3.2;1006(1),1033(1),1074(1),1084(1),1094(1),1124(1),1230(1);;GPS+GLO+GAL+BDS;SNIP;HRV;46.44;16.50;1;0;sNTRIP;none;B;N;0;";

        let mount = MountInfo::parse(info).unwrap();

        assert_eq!(mount.name, "VargaRTKhr");
        assert_eq!(mount.details, "Is near: Zagreb, Zagreb");
        assert_eq!(mount.protocol, Protocol::Rtcm3_2);
        assert_eq!(
            mount.messages,
            vec!["1006(1)", "1033(1)", "1074(1)", "1084(1)", "1094(1)", "1124(1)", "1230(1)"]
        );
        assert_eq!(
            mount.constellations,
            vec![
                Constellation::Gps,
                Constellation::Glonass,
                Constellation::Galileo,
                Constellation::BeiDou
            ]
        );
        assert_eq!(mount.network, Network::Snip);
        assert_eq!(mount.country, Some(CountryCode::for_alpha3("HRV").unwrap()));
        assert!((mount.location.latitude() - 46.44).abs() < 0.001);
        assert!((mount.location.longitude() - 16.50).abs() < 0.001);
    }

    #[test]
    fn parses_full_sourcetable_response() {
        let response = "SOURCETABLE 200 OK\r\nServer: NTRIP ntrip-core/2.0\r\nContent-Type: text/plain\r\nSTR;ESP32;NTRIP ntrip-core;RTCM 3.3;1005,1077,1087;2;GPS+GLO;NONE;USA;0.00;0.00;0;0;none;none;N;N;0;\r\nENDSOURCETABLE\r\n";

        let lines: Vec<&str> = response.lines().collect();
        let info = ServerInfo::parse(lines.into_iter());

        assert_eq!(info.server.as_deref(), Some("NTRIP ntrip-core/2.0"));
        assert_eq!(info.services.len(), 1);
        assert_eq!(info.services[0].name, "ESP32");
    }

    #[test]
    fn rejects_non_str_lines() {
        assert!(MountInfo::parse("CAS;host;2101;...").is_none());
        assert!(MountInfo::parse("ENDSOURCETABLE").is_none());
    }
}
