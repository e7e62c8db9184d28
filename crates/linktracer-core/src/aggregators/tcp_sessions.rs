//! TCP-sessions aggregator: per-stream payload preview, independent of the
//! Link Tracer's correlation logic (§4.7).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::MAX_TCP_SESSIONS;
use crate::dissector::{FieldRow, Gateway};
use crate::error::ExtractError;

const FIELDS: &[&str] = &["tcp.stream", "ip.src", "ip.dst", "tcp.srcport", "tcp.dstport", "frame.time_epoch", "frame.len", "tcp.payload", "_ws.col.protocol", "_ws.col.Info"];

const MAX_PAYLOAD_HEX_CHARS: usize = 4000;
const MAX_PAYLOAD_PREVIEW_CHARS: usize = 1000;
const MAX_HEX_VIEW_BYTES: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpSessionSummary {
    pub stream_id: String,
    pub src: String,
    pub dst: String,
    pub packet_count: u64,
    pub byte_count: u64,
    pub start_time: f64,
    pub end_time: f64,
    pub protocol: String,
    pub first_info: String,
    pub payload_preview: String,
    pub payload_hex_view: String,
}

#[derive(Default)]
struct Accumulator {
    src_ip: String,
    src_port: u16,
    dst_ip: String,
    dst_port: u16,
    packet_count: u64,
    byte_count: u64,
    start_time: f64,
    end_time: f64,
    protocol_counts: HashMap<String, u64>,
    first_info: Option<String>,
    payload_hex: String,
}

pub fn analyze_tcp_sessions(gateway: &Gateway, pcap: &Path) -> Result<Vec<TcpSessionSummary>, ExtractError> {
    let rows = gateway.field_stream(pcap, FIELDS, Some("tcp"))?;
    Ok(analyze_tcp_sessions_rows(rows))
}

pub fn analyze_tcp_sessions_rows<I: Iterator<Item = FieldRow>>(rows: I) -> Vec<TcpSessionSummary> {
    let mut order: Vec<String> = Vec::new();
    let mut sessions: HashMap<String, Accumulator> = HashMap::new();

    for row in rows {
        let stream_id = row.get_str("tcp.stream");
        if stream_id.is_empty() {
            continue;
        }
        let acc = sessions.entry(stream_id.to_string()).or_insert_with(|| {
            order.push(stream_id.to_string());
            Accumulator { src_ip: row.get_str("ip.src").to_string(), src_port: row.get_u16("tcp.srcport"), dst_ip: row.get_str("ip.dst").to_string(), dst_port: row.get_u16("tcp.dstport"), ..Default::default() }
        });

        let ts = row.get_f64("frame.time_epoch");
        let len = row.get_u64("frame.len");
        acc.packet_count += 1;
        acc.byte_count += len;
        acc.start_time = if acc.start_time == 0.0 { ts } else { acc.start_time.min(ts) };
        acc.end_time = acc.end_time.max(ts);

        let protocol = row.get_str("_ws.col.protocol").to_string();
        if !protocol.is_empty() {
            *acc.protocol_counts.entry(protocol).or_insert(0) += 1;
        }
        if acc.first_info.is_none() {
            acc.first_info = Some(row.get_str("_ws.col.Info").to_string());
        }
        if acc.payload_hex.len() < MAX_PAYLOAD_HEX_CHARS {
            let hex = row.get_str("tcp.payload");
            let remaining = MAX_PAYLOAD_HEX_CHARS - acc.payload_hex.len();
            acc.payload_hex.push_str(&hex.chars().take(remaining).collect::<String>());
        }
    }

    let mut summaries: Vec<TcpSessionSummary> = order
        .into_iter()
        .filter_map(|id| sessions.remove(&id).map(|acc| (id, acc)))
        .map(|(stream_id, acc)| {
            let protocol = acc.protocol_counts.into_iter().max_by_key(|(_, count)| *count).map(|(name, _)| name).unwrap_or_default();
            let payload_bytes: Vec<u8> = hex_decode_lenient(&acc.payload_hex);
            TcpSessionSummary {
                stream_id,
                src: format!("{}:{}", acc.src_ip, acc.src_port),
                dst: format!("{}:{}", acc.dst_ip, acc.dst_port),
                packet_count: acc.packet_count,
                byte_count: acc.byte_count,
                start_time: acc.start_time,
                end_time: acc.end_time,
                protocol,
                first_info: acc.first_info.unwrap_or_default(),
                payload_preview: render_preview(&payload_bytes),
                payload_hex_view: hex::encode(&payload_bytes[..payload_bytes.len().min(MAX_HEX_VIEW_BYTES)]),
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.packet_count.cmp(&a.packet_count));
    summaries.truncate(MAX_TCP_SESSIONS);
    summaries
}

fn hex_decode_lenient(s: &str) -> Vec<u8> {
    if s.contains(':') {
        s.split(':').filter_map(|p| u8::from_str_radix(p, 16).ok()).collect()
    } else {
        hex::decode(s).unwrap_or_default()
    }
}

fn render_preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '.' })
        .take(MAX_PAYLOAD_PREVIEW_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> FieldRow {
        FieldRow(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn aggregates_per_stream_with_modal_protocol() {
        let rows = vec![
            row(&[("tcp.stream", "0"), ("ip.src", "10.0.0.1"), ("ip.dst", "10.0.0.2"), ("tcp.srcport", "5000"), ("tcp.dstport", "80"), ("frame.time_epoch", "1.0"), ("frame.len", "60"), ("_ws.col.protocol", "TCP"), ("_ws.col.Info", "SYN")]),
            row(&[("tcp.stream", "0"), ("ip.src", "10.0.0.2"), ("ip.dst", "10.0.0.1"), ("tcp.srcport", "80"), ("tcp.dstport", "5000"), ("frame.time_epoch", "1.1"), ("frame.len", "512"), ("_ws.col.protocol", "HTTP"), ("_ws.col.Info", "200 OK")]),
            row(&[("tcp.stream", "0"), ("ip.src", "10.0.0.2"), ("ip.dst", "10.0.0.1"), ("tcp.srcport", "80"), ("tcp.dstport", "5000"), ("frame.time_epoch", "1.2"), ("frame.len", "64"), ("_ws.col.protocol", "HTTP")]),
        ];
        let sessions = analyze_tcp_sessions_rows(rows.into_iter());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].packet_count, 3);
        assert_eq!(sessions[0].protocol, "HTTP");
        assert_eq!(sessions[0].first_info, "SYN");
    }

    #[test]
    fn non_printable_bytes_render_as_dots() {
        let preview = render_preview(&[0x41, 0x00, 0x42]);
        assert_eq!(preview, "A.B");
    }
}
