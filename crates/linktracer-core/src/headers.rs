//! Header Harvester: second pass over HTTP traffic, attaching textual
//! correlation headers scraped from raw payload bytes to existing sessions.
//!
//! Per §4.3/§9, later packets overwrite earlier header values within the
//! same session — this is carried over literally, not "fixed".

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::dissector::{FieldRow, Gateway};
use crate::error::ExtractError;
use crate::model::SessionInfo;

const FIELDS: &[&str] = &["tcp.stream", "http.x_forwarded_for", "tcp.payload"];

const CORRELATION_HEADERS: &[&str] = &["x-request-id", "x-correlation-id", "x-trace-id", "x-forwarded-for", "x-real-ip"];

static HEADER_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    CORRELATION_HEADERS
        .iter()
        .map(|name| {
            let pattern = format!(r"(?i){}:\s*([^\r\n]+)", regex::escape(name));
            (*name, Regex::new(&pattern).expect("correlation header pattern is valid"))
        })
        .collect()
});

/// Harvests headers from `pcap` and attaches them to `sessions` in place.
pub fn harvest_headers(gateway: &Gateway, pcap: &Path, sessions: &mut [SessionInfo]) -> Result<(), ExtractError> {
    let rows = gateway.field_stream(pcap, FIELDS, Some("http"))?;
    harvest_headers_from_rows(rows, sessions);
    Ok(())
}

/// Pure accumulation over an already-decoded row stream.
pub fn harvest_headers_from_rows<I: Iterator<Item = FieldRow>>(rows: I, sessions: &mut [SessionInfo]) {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, session) in sessions.iter().enumerate() {
        index.insert(session.session_id.clone(), i);
    }

    for row in rows {
        let stream_id = row.get_str("tcp.stream");
        let Some(&idx) = index.get(stream_id) else { continue };
        let session = &mut sessions[idx];

        if row.is_present("http.x_forwarded_for") {
            session.http_headers.insert("x-forwarded-for".to_string(), row.get_str("http.x_forwarded_for").trim().to_string());
        }

        let payload = row.get_hex_bytes("tcp.payload");
        if payload.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(&payload);
        for (name, pattern) in HEADER_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(&text) {
                if let Some(value) = caps.get(1) {
                    session.http_headers.insert((*name).to_string(), value.as_str().trim().to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> FieldRow {
        FieldRow(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn session(id: &str) -> SessionInfo {
        SessionInfo::new(id.to_string(), "file1".to_string(), "10.0.0.1".to_string(), 1000, "10.0.0.2".to_string(), 80)
    }

    #[test]
    fn extracts_x_request_id_from_payload_text() {
        let mut sessions = vec![session("0")];
        let payload = hex::encode(b"GET / HTTP/1.1\r\nX-Request-Id: abc-123\r\n\r\n");
        let rows = vec![row(&[("tcp.stream", "0"), ("tcp.payload", &payload)])];
        harvest_headers_from_rows(rows.into_iter(), &mut sessions);
        assert_eq!(sessions[0].http_headers.get("x-request-id").map(String::as_str), Some("abc-123"));
    }

    #[test]
    fn later_packet_overwrites_earlier_header_value() {
        let mut sessions = vec![session("0")];
        let first = hex::encode(b"X-Request-Id: first\r\n");
        let second = hex::encode(b"X-Request-Id: second\r\n");
        let rows = vec![row(&[("tcp.stream", "0"), ("tcp.payload", &first)]), row(&[("tcp.stream", "0"), ("tcp.payload", &second)])];
        harvest_headers_from_rows(rows.into_iter(), &mut sessions);
        assert_eq!(sessions[0].http_headers.get("x-request-id").map(String::as_str), Some("second"));
    }

    #[test]
    fn xff_field_is_trimmed_and_stored() {
        let mut sessions = vec![session("0")];
        let rows = vec![row(&[("tcp.stream", "0"), ("http.x_forwarded_for", " 1.1.1.1 ")])];
        harvest_headers_from_rows(rows.into_iter(), &mut sessions);
        assert_eq!(sessions[0].http_headers.get("x-forwarded-for").map(String::as_str), Some("1.1.1.1"));
    }

    #[test]
    fn rows_for_unknown_stream_are_ignored() {
        let mut sessions = vec![session("0")];
        let rows = vec![row(&[("tcp.stream", "99"), ("http.x_forwarded_for", "1.1.1.1")])];
        harvest_headers_from_rows(rows.into_iter(), &mut sessions);
        assert!(sessions[0].http_headers.is_empty());
    }
}
