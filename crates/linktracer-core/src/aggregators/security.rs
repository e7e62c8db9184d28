//! Security aggregator: SYN-scan detection and payload-pattern scanning
//! (SQL injection, XSS, plaintext basic auth), with alert dedup (§4.7, §9).

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dissector::{FieldRow, Gateway};
use crate::error::ExtractError;

const SYN_SCAN_THRESHOLD: usize = 20;
const SYN_FIELDS: &[&str] = &["ip.src", "tcp.dstport"];
const SYN_FILTER: &str = "tcp.flags.syn==1 and tcp.flags.ack==0";

const PAYLOAD_FIELDS: &[&str] = &["ip.src", "tcp.payload"];
const PAYLOAD_FILTER: &str = "tcp.len > 0";

static SQLI_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("union select", r"(?i)\bunion\s+select\b"),
        ("tautology", r"(?i)\bor\s+1\s*=\s*1\b"),
        ("drop table", r"(?i)';\s*drop\s+table"),
        ("select from where", r"(?i)\bselect\b.+\bfrom\b.+\bwhere\b"),
        ("comment terminator", r"(?i)(--\s|;--)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("valid sqli pattern")))
    .collect()
});

static XSS_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("script tag", r"(?i)<script[^>]*>"),
        ("javascript uri", r"(?i)javascript:"),
        ("onerror handler", r"(?i)onerror\s*="),
        ("onload handler", r"(?i)onload\s*="),
        ("img javascript src", r#"(?i)<img[^>]+src\s*=\s*['"]?javascript:"#),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("valid xss pattern")))
    .collect()
});

const PLAINTEXT_AUTH_MARKER: &str = "Authorization: Basic";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SecurityAlert {
    pub alert_type: String,
    pub source_ip: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityReport {
    pub alerts: Vec<SecurityAlert>,
}

pub fn analyze_security(gateway: &Gateway, pcap: &Path) -> Result<SecurityReport, ExtractError> {
    let syn_rows = gateway.field_stream(pcap, SYN_FIELDS, Some(SYN_FILTER))?;
    let payload_rows = gateway.field_stream(pcap, PAYLOAD_FIELDS, Some(PAYLOAD_FILTER))?;
    Ok(analyze_security_rows(syn_rows, payload_rows))
}

pub fn analyze_security_rows<I: Iterator<Item = FieldRow>, J: Iterator<Item = FieldRow>>(syn_rows: I, payload_rows: J) -> SecurityReport {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut alerts = Vec::new();

    let mut ports_by_src: HashMap<String, HashSet<u16>> = HashMap::new();
    for row in syn_rows {
        let src = row.get_str("ip.src").to_string();
        if src.is_empty() {
            continue;
        }
        ports_by_src.entry(src).or_default().insert(row.get_u16("tcp.dstport"));
    }
    for (src, ports) in ports_by_src {
        if ports.len() > SYN_SCAN_THRESHOLD {
            push_alert(&mut alerts, &mut seen, "syn_scan", &src, &format!("{} distinct destination ports probed", ports.len()));
        }
    }

    for row in payload_rows {
        let src = row.get_str("ip.src").to_string();
        let bytes = row.get_hex_bytes("tcp.payload");
        if bytes.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(&bytes);

        for (name, pattern) in SQLI_PATTERNS.iter() {
            if pattern.is_match(&text) {
                push_alert(&mut alerts, &mut seen, "sql_injection", &src, &format!("matched SQLi pattern: {name}"));
            }
        }
        for (name, pattern) in XSS_PATTERNS.iter() {
            if pattern.is_match(&text) {
                push_alert(&mut alerts, &mut seen, "xss", &src, &format!("matched XSS pattern: {name}"));
            }
        }
        if text.contains(PLAINTEXT_AUTH_MARKER) {
            push_alert(&mut alerts, &mut seen, "plaintext_auth", &src, "HTTP Basic credentials observed in cleartext");
        }
    }

    SecurityReport { alerts }
}

fn push_alert(alerts: &mut Vec<SecurityAlert>, seen: &mut HashSet<(String, String, String)>, alert_type: &str, source_ip: &str, description: &str) {
    let key = (alert_type.to_string(), source_ip.to_string(), description.to_string());
    if seen.insert(key) {
        alerts.push(SecurityAlert { alert_type: alert_type.to_string(), source_ip: source_ip.to_string(), description: description.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> FieldRow {
        FieldRow(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn syn_scan_triggers_past_threshold() {
        let rows: Vec<_> = (0..21).map(|port| row(&[("ip.src", "10.0.0.1"), ("tcp.dstport", &port.to_string())])).collect();
        let report = analyze_security_rows(rows.into_iter(), std::iter::empty());
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].alert_type, "syn_scan");
    }

    #[test]
    fn syn_scan_at_threshold_does_not_trigger() {
        let rows: Vec<_> = (0..20).map(|port| row(&[("ip.src", "10.0.0.1"), ("tcp.dstport", &port.to_string())])).collect();
        let report = analyze_security_rows(rows.into_iter(), std::iter::empty());
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn sql_injection_payload_is_flagged() {
        let payload = hex::encode(b"id=1 UNION SELECT username,password FROM users");
        let rows = vec![row(&[("ip.src", "10.0.0.5"), ("tcp.payload", &payload)])];
        let report = analyze_security_rows(std::iter::empty(), rows.into_iter());
        assert!(report.alerts.iter().any(|a| a.alert_type == "sql_injection"));
    }

    #[test]
    fn different_patterns_from_same_source_are_not_deduplicated_away() {
        let payload = hex::encode(b"<script>alert(1)</script> onerror=x");
        let rows = vec![row(&[("ip.src", "10.0.0.5"), ("tcp.payload", &payload)])];
        let report = analyze_security_rows(std::iter::empty(), rows.into_iter());
        let xss_alerts: Vec<_> = report.alerts.iter().filter(|a| a.alert_type == "xss").collect();
        assert!(xss_alerts.len() >= 2);
    }

    #[test]
    fn plaintext_basic_auth_is_flagged() {
        let payload = hex::encode(b"GET / HTTP/1.1\r\nAuthorization: Basic dXNlcjpwYXNz\r\n");
        let rows = vec![row(&[("ip.src", "10.0.0.9"), ("tcp.payload", &payload)])];
        let report = analyze_security_rows(std::iter::empty(), rows.into_iter());
        assert!(report.alerts.iter().any(|a| a.alert_type == "plaintext_auth"));
    }
}
