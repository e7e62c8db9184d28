//! Session Extractor: first pass over a capture's TCP traffic, building
//! bidirectional-flow-accounted [`SessionInfo`] records.
//!
//! The pure accumulation logic is separated from dissector I/O (mirroring
//! the teacher's `analyze_source<S: PacketSource>` split) so it can be unit
//! tested against synthetic rows without spawning a subprocess.

use std::collections::HashMap;
use std::path::Path;

use md5::{Digest, Md5};

use crate::dissector::{FieldRow, Gateway};
use crate::error::ExtractError;
use crate::model::{SessionInfo, MAX_PACKET_SIZES};

const FIELDS: &[&str] = &["tcp.stream", "ip.src", "ip.dst", "tcp.srcport", "tcp.dstport", "frame.time_epoch", "frame.len", "tcp.payload"];

/// Extracts sessions from `pcap`, tagging every resulting [`SessionInfo`]
/// with `file_source`.
pub fn extract_sessions(gateway: &Gateway, pcap: &Path, file_source: &str) -> Result<Vec<SessionInfo>, ExtractError> {
    let rows = gateway.field_stream(pcap, FIELDS, Some("tcp"))?;
    Ok(extract_sessions_from_rows(rows, file_source))
}

/// Pure accumulation over an already-decoded row stream.
pub fn extract_sessions_from_rows<I: Iterator<Item = FieldRow>>(rows: I, file_source: &str) -> Vec<SessionInfo> {
    let mut order: Vec<String> = Vec::new();
    let mut sessions: HashMap<String, SessionInfo> = HashMap::new();

    for row in rows {
        let stream_id = row.get_str("tcp.stream");
        if stream_id.is_empty() {
            continue;
        }

        let session = sessions.entry(stream_id.to_string()).or_insert_with(|| {
            order.push(stream_id.to_string());
            SessionInfo::new(
                stream_id.to_string(),
                file_source.to_string(),
                row.get_str("ip.src").to_string(),
                row.get_u16("tcp.srcport"),
                row.get_str("ip.dst").to_string(),
                row.get_u16("tcp.dstport"),
            )
        });

        let ts = row.get_f64("frame.time_epoch");
        let len = row.get_u64("frame.len");

        session.packet_count += 1;
        session.byte_count += len;
        if session.packet_sizes.len() < MAX_PACKET_SIZES {
            session.packet_sizes.push(len);
        }

        session.start_time = if session.start_time == 0.0 { ts } else { session.start_time.min(ts) };
        session.end_time = session.end_time.max(ts);

        let is_forward = row.get_str("ip.src") == session.src_ip;
        if is_forward {
            session.forward_packets += 1;
            session.forward_bytes += len;
            session.forward_start = if session.forward_start == 0.0 { ts } else { session.forward_start.min(ts) };
            session.forward_end = session.forward_end.max(ts);
        } else {
            session.backward_packets += 1;
            session.backward_bytes += len;
            session.backward_start = if session.backward_start == 0.0 { ts } else { session.backward_start.min(ts) };
            session.backward_end = session.backward_end.max(ts);
        }

        if session.payload_fingerprint.is_empty() && row.is_present("tcp.payload") {
            let bytes = row.get_hex_bytes("tcp.payload");
            if bytes.len() >= 8 {
                let take = bytes.len().min(64);
                let mut hasher = Md5::new();
                hasher.update(&bytes[..take]);
                let digest = hasher.finalize();
                session.payload_fingerprint = hex::encode(digest)[..16].to_string();
            }
        }
    }

    order.into_iter().filter_map(|id| sessions.remove(&id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> FieldRow {
        FieldRow(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn accumulates_bidirectional_counts() {
        let rows = vec![
            row(&[("tcp.stream", "0"), ("ip.src", "10.0.0.1"), ("ip.dst", "10.0.0.2"), ("tcp.srcport", "5000"), ("tcp.dstport", "80"), ("frame.time_epoch", "1.0"), ("frame.len", "60")]),
            row(&[("tcp.stream", "0"), ("ip.src", "10.0.0.2"), ("ip.dst", "10.0.0.1"), ("tcp.srcport", "80"), ("tcp.dstport", "5000"), ("frame.time_epoch", "1.5"), ("frame.len", "120")]),
        ];
        let sessions = extract_sessions_from_rows(rows.into_iter(), "file1");
        assert_eq!(sessions.len(), 1);
        let s = &sessions[0];
        assert_eq!(s.packet_count, 2);
        assert_eq!(s.byte_count, 180);
        assert_eq!(s.forward_packets, 1);
        assert_eq!(s.backward_packets, 1);
        assert_eq!(s.packet_count, s.forward_packets + s.backward_packets);
        assert_eq!(s.start_time, 1.0);
        assert_eq!(s.end_time, 1.5);
    }

    #[test]
    fn packet_sizes_capped_at_twenty() {
        let rows: Vec<_> = (0..30)
            .map(|i| {
                row(&[
                    ("tcp.stream", "0"),
                    ("ip.src", "10.0.0.1"),
                    ("ip.dst", "10.0.0.2"),
                    ("tcp.srcport", "5000"),
                    ("tcp.dstport", "80"),
                    ("frame.time_epoch", &format!("{}", 1.0 + i as f64)),
                    ("frame.len", "64"),
                ])
            })
            .collect();
        let sessions = extract_sessions_from_rows(rows.into_iter(), "file1");
        assert_eq!(sessions[0].packet_sizes.len(), MAX_PACKET_SIZES);
        assert_eq!(sessions[0].packet_count, 30);
    }

    #[test]
    fn fingerprint_requires_eight_bytes_and_is_sixteen_hex_chars() {
        let rows = vec![row(&[
            ("tcp.stream", "0"),
            ("ip.src", "10.0.0.1"),
            ("ip.dst", "10.0.0.2"),
            ("tcp.srcport", "5000"),
            ("tcp.dstport", "80"),
            ("frame.time_epoch", "1.0"),
            ("frame.len", "74"),
            ("tcp.payload", "4745542f68656c6c6f20485454502f312e31"),
        ])];
        let sessions = extract_sessions_from_rows(rows.into_iter(), "file1");
        let fp = &sessions[0].payload_fingerprint;
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn short_payload_leaves_fingerprint_empty() {
        let rows = vec![row(&[
            ("tcp.stream", "0"),
            ("ip.src", "10.0.0.1"),
            ("ip.dst", "10.0.0.2"),
            ("tcp.srcport", "5000"),
            ("tcp.dstport", "80"),
            ("frame.time_epoch", "1.0"),
            ("frame.len", "50"),
            ("tcp.payload", "4142"),
        ])];
        let sessions = extract_sessions_from_rows(rows.into_iter(), "file1");
        assert_eq!(sessions[0].payload_fingerprint, "");
    }

    #[test]
    fn rows_with_empty_stream_id_are_skipped() {
        let rows = vec![row(&[("tcp.stream", ""), ("ip.src", "10.0.0.1")])];
        let sessions = extract_sessions_from_rows(rows.into_iter(), "file1");
        assert!(sessions.is_empty());
    }

    #[test]
    fn identical_fingerprints_are_stable_across_calls() {
        let make = || {
            vec![row(&[
                ("tcp.stream", "0"),
                ("ip.src", "10.0.0.1"),
                ("ip.dst", "10.0.0.2"),
                ("tcp.srcport", "5000"),
                ("tcp.dstport", "80"),
                ("frame.time_epoch", "1.0"),
                ("frame.len", "74"),
                ("tcp.payload", "4745542f68656c6c6f"),
            ])]
        };
        let a = extract_sessions_from_rows(make().into_iter(), "file1");
        let b = extract_sessions_from_rows(make().into_iter(), "file1");
        assert_eq!(a[0].payload_fingerprint, b[0].payload_fingerprint);
    }
}
