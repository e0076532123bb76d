//! Builds and parses the caster's sourcetable: a CRLF-terminated text
//! blob of `CAS;`/`STR;` lines ending with `ENDSOURCETABLE`.

use std::collections::HashSet;

use crate::snip::MountInfo;

const TERMINATOR: &str = "ENDSOURCETABLE\r\n";

/// One advertised mountpoint. `details` holds the remaining
/// semicolon-separated `STR;` fields (format, messages, constellations,
/// country, lat/lon, ...) verbatim, since this crate does not interpret
/// them beyond the mountpoint name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountEntry {
    pub name: String,
    pub details: String,
}

impl MountEntry {
    pub fn new(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            details: details.into(),
        }
    }
}

/// The caster's discovery document, built once at startup from its
/// configured mountpoints.
#[derive(Clone, Debug, Default)]
pub struct Sourcetable {
    mounts: Vec<MountEntry>,
    /// Optional `CAS;` line describing this caster itself, rendered
    /// ahead of the `STR;` lines when set.
    cas_line: Option<String>,
}

impl Sourcetable {
    pub fn new(mounts: Vec<MountEntry>) -> Self {
        Self { mounts, cas_line: None }
    }

    /// Attach a `CAS;` line (caster host;port;identifier;...), following
    /// the field layout `original_source/src/ntrip.py` leaves commented
    /// out but which standard NTRIP casters advertise.
    pub fn with_cas_line(mut self, cas_line: impl Into<String>) -> Self {
        self.cas_line = Some(cas_line.into());
        self
    }

    /// Render the CRLF-terminated sourcetable body.
    pub fn render(&self) -> Vec<u8> {
        let mut body = String::new();
        if let Some(cas) = &self.cas_line {
            body.push_str("CAS;");
            body.push_str(cas);
            body.push_str("\r\n");
        }
        for mount in &self.mounts {
            body.push_str("STR;");
            body.push_str(&mount.name);
            body.push(';');
            body.push_str(&mount.details);
            body.push_str("\r\n");
        }
        body.push_str(TERMINATOR);
        body.into_bytes()
    }

    /// The set of mountpoint names this sourcetable advertises, used by
    /// the caster as `allowed_mounts`.
    pub fn allowed_mounts(&self) -> HashSet<String> {
        self.mounts.iter().map(|m| m.name.clone()).collect()
    }

    /// Extract the set of mountpoint names from an arbitrary
    /// CRLF-terminated sourcetable body, using the first field after
    /// each `STR;`.
    pub fn parse_mount_names(body: &str) -> HashSet<String> {
        body.lines().filter_map(MountInfo::parse).map(|info| info.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_mount_and_terminator() {
        let table = Sourcetable::new(vec![MountEntry::new(
            "ESP32",
            "NTRIP ntrip-core;RTCM 3.3;1005,1077;2;GPS+GLO;NONE;USA;0.00;0.00;0;0;none;none;N;N;0;",
        )]);
        let rendered = String::from_utf8(table.render()).unwrap();

        assert!(rendered.starts_with("STR;ESP32;NTRIP ntrip-core;"));
        assert!(rendered.ends_with("ENDSOURCETABLE\r\n"));
        assert_eq!(table.allowed_mounts(), HashSet::from(["ESP32".to_string()]));
    }

    #[test]
    fn cas_line_is_rendered_first_when_present() {
        let table = Sourcetable::new(vec![MountEntry::new("ESP32", "d1")])
            .with_cas_line("caster.example;2101;ntrip-core;None;0;USA;0.0;0.0;0.0.0.0;0;https://example.invalid");
        let rendered = String::from_utf8(table.render()).unwrap();
        let mut lines = rendered.lines();
        assert!(lines.next().unwrap().starts_with("CAS;caster.example;"));
        assert!(lines.next().unwrap().starts_with("STR;ESP32;"));
    }

    #[test]
    fn parses_mount_names_back_out() {
        let table = Sourcetable::new(vec![
            MountEntry::new("ESP32", "d1"),
            MountEntry::new("ESP32B", "d2"),
        ]);
        let body = String::from_utf8(table.render()).unwrap();
        let names = Sourcetable::parse_mount_names(&body);
        assert_eq!(names, HashSet::from(["ESP32".to_string(), "ESP32B".to_string()]));
    }
}
