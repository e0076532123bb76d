//! NMEA 0183 checksum and sentence utilities, and the vendor
//! `$PQTMEPE` → `$GPGST` conversion.

use crate::error::{NtripError, Result};

/// Compute the NMEA 0183 XOR checksum of `body` (the bytes strictly
/// between the leading `$` and the trailing `*`), as two uppercase hex
/// digits.
pub fn nmea_checksum(body: &str) -> String {
    let body = body.trim_start_matches('$');
    let body = body.split('*').next().unwrap_or(body);
    let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("{:02X}", checksum)
}

/// Build a complete sentence: `"$" + body + "*" + checksum + "\r\n"`.
pub fn build(body: &str) -> String {
    let checksum = nmea_checksum(body);
    format!("${body}*{checksum}\r\n")
}

/// Convert a vendor `$PQTMEPE,ver,epe_n,epe_e,epe_d,epe_2d,epe_3d*CS`
/// sentence into a standard `$GPGST,...` sentence, using the most
/// recently observed UTC time (typically the third field of the latest
/// `$GNRMC` sentence; ownership of that state belongs to the caller).
///
/// Mapping (approximate): `rms = maj = epe_2d`, `smin = min(epe_n, epe_e)`,
/// `ori = 0.0`, `lat_err = epe_n`, `lon_err = epe_e`, `alt_err = epe_d`.
pub fn pqtmepe_to_gst(sentence: &str, utc_time: &str) -> Result<String> {
    let parse_err = || NtripError::MalformedInput(sentence.to_string());

    let body = sentence.trim().trim_start_matches('$');
    let (fields, _checksum) = body.split_once('*').ok_or_else(parse_err)?;
    let parts: Vec<&str> = fields.split(',').collect();

    if parts.first().copied() != Some("PQTMEPE") {
        return Err(parse_err());
    }

    let epe_north: f64 = parts.get(2).ok_or_else(parse_err)?.parse().map_err(|_| parse_err())?;
    let epe_east: f64 = parts.get(3).ok_or_else(parse_err)?.parse().map_err(|_| parse_err())?;
    let epe_down: f64 = parts.get(4).ok_or_else(parse_err)?.parse().map_err(|_| parse_err())?;
    let epe_2d: f64 = parts.get(5).ok_or_else(parse_err)?.parse().map_err(|_| parse_err())?;

    let rms = epe_2d;
    let maj = epe_2d;
    let smin = epe_north.min(epe_east);
    let ori = 0.0_f64;
    let lat_err = epe_north;
    let lon_err = epe_east;
    let alt_err = epe_down;

    let body = format!(
        "GPGST,{utc_time},{rms:.4},{maj:.4},{smin:.4},{ori:.1},{lat_err:.4},{lon_err:.4},{alt_err:.4}"
    );

    Ok(build(&body))
}

/// Tracks the most recently observed `$GNRMC` UTC time, so that
/// [`pqtmepe_to_gst`] conversions can be fed the right timestamp. Owned
/// by whichever component orchestrates conversion (e.g. the collaborator
/// feeding the [`crate::framer::Framer`]), not by this crate's core.
#[derive(Debug, Clone, Default)]
pub struct GnrmcClock {
    utc_time: String,
}

impl GnrmcClock {
    pub fn new() -> Self {
        Self {
            utc_time: "000000.000".to_string(),
        }
    }

    /// Feed a `$GNRMC` sentence, updating the tracked UTC time from its
    /// third comma-separated field. Ignores sentences that aren't GNRMC
    /// or that are too short to contain a time field.
    pub fn observe(&mut self, sentence: &str) {
        let body = sentence.trim().trim_start_matches('$');
        let fields: Vec<&str> = body.split(['*', ',']).collect();
        if fields.first().copied() == Some("GNRMC") {
            if let Some(time) = fields.get(1) {
                if !time.is_empty() {
                    self.utc_time = time.to_string();
                }
            }
        }
    }

    pub fn utc_time(&self) -> &str {
        &self.utc_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_known_sentence() {
        assert_eq!(nmea_checksum("GPGGA"), "56");
    }

    #[test]
    fn build_appends_checksum_and_terminator() {
        let sentence = build("GPGGA");
        assert_eq!(sentence, "$GPGGA*56\r\n");
    }

    #[test]
    fn pqtmepe_roundtrip_checksum() {
        let input = "$PQTMEPE,2,0.0120,0.0180,0.0250,0.0210,0.0330*4A";
        let gst = pqtmepe_to_gst(input, "120000.00").unwrap();

        assert!(gst.starts_with("$GPGST,120000.00,"));
        assert!(gst.ends_with("\r\n"));

        let body = gst.trim_start_matches('$').trim_end_matches("\r\n");
        let (fields, checksum) = body.split_once('*').unwrap();
        assert_eq!(nmea_checksum(fields), checksum);
    }

    #[test]
    fn pqtmepe_rejects_wrong_talker() {
        let input = "$GNRMC,120000.00,A,*7F";
        assert!(pqtmepe_to_gst(input, "120000.00").is_err());
    }

    #[test]
    fn pqtmepe_rejects_missing_fields() {
        let input = "$PQTMEPE,2,0.01*00";
        assert!(pqtmepe_to_gst(input, "120000.00").is_err());
    }

    #[test]
    fn clock_tracks_latest_gnrmc_time() {
        let mut clock = GnrmcClock::new();
        clock.observe("$GNRMC,120000.00,A,3723.46587704,N,12202.26957864,W,0.0,0.0,110624,,,A*7A");
        assert_eq!(clock.utc_time(), "120000.00");
        clock.observe("$GPGGA,123519,...");
        assert_eq!(clock.utc_time(), "120000.00");
    }
}
