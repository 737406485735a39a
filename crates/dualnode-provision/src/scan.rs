//! Wi-Fi scan payload parsing.
//!
//! Station firmware reports scanned networks through a single read-only
//! characteristic as UTF-8 text: semicolon-separated records of
//! `ssid,rssi,securityCode`. Malformed records are skipped rather than
//! failing the whole scan.

use dualnode_core::types::{WifiNetwork, WifiSecurity};

/// Parse a scan payload into networks, sorted by descending signal
/// strength (ties keep their original order).
///
/// Records are skipped when they have fewer than three fields, an empty
/// SSID, or a non-numeric RSSI. An unrecognized security code maps to
/// [`WifiSecurity::Unknown`].
#[must_use]
pub fn parse_scan_results(payload: &str) -> Vec<WifiNetwork> {
    let mut networks: Vec<WifiNetwork> = payload
        .split(';')
        .filter_map(parse_record)
        .collect();
    networks.sort_by(|a, b| b.rssi.cmp(&a.rssi));
    networks
}

fn parse_record(record: &str) -> Option<WifiNetwork> {
    let record = record.trim();
    if record.is_empty() {
        return None;
    }
    let mut parts = record.splitn(3, ',');
    let ssid = parts.next()?.trim();
    if ssid.is_empty() {
        return None;
    }
    let rssi: i16 = parts.next()?.trim().parse().ok()?;
    let security = parts
        .next()
        .and_then(|code| code.trim().parse::<u8>().ok())
        .map_or(WifiSecurity::Unknown, WifiSecurity::from_code);
    Some(WifiNetwork {
        ssid: ssid.to_string(),
        rssi,
        security,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_three_networks_sorted_by_signal() {
        let networks = parse_scan_results("weak,-80,3;strong,-40,3;middle,-60,0");
        assert_eq!(networks.len(), 3);
        assert_eq!(networks[0].ssid, "strong");
        assert_eq!(networks[1].ssid, "middle");
        assert_eq!(networks[2].ssid, "weak");
        assert_eq!(networks[1].security, WifiSecurity::Open);
    }

    #[test]
    fn test_ties_keep_original_order() {
        let networks = parse_scan_results("first,-50,3;second,-50,3;third,-50,3");
        let ssids: Vec<_> = networks.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_empty_payload_yields_no_networks() {
        assert!(parse_scan_results("").is_empty());
        assert!(parse_scan_results("  ").is_empty());
        assert!(parse_scan_results(";;;").is_empty());
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        // Missing fields, blank SSID, non-numeric RSSI.
        let networks = parse_scan_results("ok,-50,3;nofields;,-60,3;bad,notanumber,3;");
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].ssid, "ok");
    }

    #[test]
    fn test_unknown_security_code() {
        let networks = parse_scan_results("net,-50,9");
        assert_eq!(networks[0].security, WifiSecurity::Unknown);
    }

    #[test]
    fn test_trailing_separator_is_tolerated() {
        let networks = parse_scan_results("a,-40,3;b,-50,3;");
        assert_eq!(networks.len(), 2);
    }

    #[test]
    fn test_ssid_with_spaces_is_preserved() {
        let networks = parse_scan_results("Cafe Guest WiFi,-55,2");
        assert_eq!(networks[0].ssid, "Cafe Guest WiFi");
        assert_eq!(networks[0].security, WifiSecurity::Wpa);
    }
}
