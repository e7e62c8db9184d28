//! Traffic summary: protocol/talker/timeline statistics over every packet.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{MAX_TIMELINE_POINTS, TOP_N};
use crate::dissector::{FieldRow, Gateway};
use crate::error::ExtractError;

const FIELDS: &[&str] = &["frame.time_epoch", "frame.len", "ip.src", "ip.dst", "ipv6.src", "ipv6.dst", "_ws.col.protocol"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProtocolCount {
    pub protocol: String,
    pub packets: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TalkerStats {
    pub ip: String,
    pub sent_packets: u64,
    pub sent_bytes: u64,
    pub recv_packets: u64,
    pub recv_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimelinePoint {
    pub second: i64,
    pub packets: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SummaryReport {
    pub total_packets: u64,
    pub total_bytes: u64,
    pub start_time: f64,
    pub end_time: f64,
    pub top_protocols: Vec<ProtocolCount>,
    pub top_talkers: Vec<TalkerStats>,
    pub timeline: Vec<TimelinePoint>,
}

pub fn summarize(gateway: &Gateway, pcap: &Path) -> Result<SummaryReport, ExtractError> {
    let rows = gateway.field_stream(pcap, FIELDS, None)?;
    Ok(summarize_rows(rows))
}

pub fn summarize_rows<I: Iterator<Item = FieldRow>>(rows: I) -> SummaryReport {
    let mut total_packets = 0u64;
    let mut total_bytes = 0u64;
    let mut start_time = 0.0;
    let mut end_time = 0.0;
    let mut first_second: Option<i64> = None;
    let mut protocol_counts: HashMap<String, u64> = HashMap::new();
    let mut talkers: HashMap<String, TalkerStats> = HashMap::new();
    let mut buckets: HashMap<i64, (u64, u64)> = HashMap::new();

    for row in rows {
        let ts = row.get_f64("frame.time_epoch");
        let len = row.get_u64("frame.len");
        let src = {
            let v = row.get_str("ip.src");
            if v.is_empty() { row.get_str("ipv6.src").to_string() } else { v.to_string() }
        };
        let dst = {
            let v = row.get_str("ip.dst");
            if v.is_empty() { row.get_str("ipv6.dst").to_string() } else { v.to_string() }
        };
        let protocol = row.get_str("_ws.col.protocol").to_string();

        total_packets += 1;
        total_bytes += len;
        start_time = if start_time == 0.0 { ts } else { start_time.min(ts) };
        end_time = end_time.max(ts);

        if !protocol.is_empty() {
            *protocol_counts.entry(protocol).or_insert(0) += 1;
        }

        if !src.is_empty() {
            let entry = talkers.entry(src).or_default();
            entry.sent_packets += 1;
            entry.sent_bytes += len;
        }
        if !dst.is_empty() {
            let entry = talkers.entry(dst).or_default();
            entry.recv_packets += 1;
            entry.recv_bytes += len;
        }

        let second_floor = ts.floor() as i64;
        let base = *first_second.get_or_insert(second_floor);
        let bucket = buckets.entry(second_floor - base).or_insert((0, 0));
        bucket.0 += 1;
        bucket.1 += len;
    }

    for (ip, stats) in talkers.iter_mut() {
        stats.ip = ip.clone();
    }

    let mut top_protocols: Vec<ProtocolCount> = protocol_counts
        .into_iter()
        .map(|(protocol, packets)| {
            let percentage = if total_packets == 0 { 0.0 } else { (packets as f64 / total_packets as f64 * 1000.0).round() / 10.0 };
            ProtocolCount { protocol, packets, percentage }
        })
        .collect();
    top_protocols.sort_by(|a, b| b.packets.cmp(&a.packets));
    top_protocols.truncate(TOP_N);

    let mut top_talkers: Vec<TalkerStats> = talkers.into_values().collect();
    top_talkers.sort_by(|a, b| (b.sent_packets + b.recv_packets).cmp(&(a.sent_packets + a.recv_packets)));
    top_talkers.truncate(TOP_N);

    let mut timeline: Vec<TimelinePoint> = buckets.into_iter().map(|(second, (packets, bytes))| TimelinePoint { second, packets, bytes }).collect();
    timeline.sort_by_key(|p| p.second);
    if timeline.len() > MAX_TIMELINE_POINTS {
        let len = timeline.len();
        timeline = (0..MAX_TIMELINE_POINTS).map(|i| timeline[i * len / MAX_TIMELINE_POINTS].clone()).collect();
    }

    SummaryReport { total_packets, total_bytes, start_time, end_time, top_protocols, top_talkers, timeline }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> FieldRow {
        FieldRow(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn counts_packets_bytes_and_protocols() {
        let rows = vec![
            row(&[("frame.time_epoch", "1.0"), ("frame.len", "60"), ("ip.src", "10.0.0.1"), ("ip.dst", "10.0.0.2"), ("_ws.col.protocol", "TCP")]),
            row(&[("frame.time_epoch", "1.5"), ("frame.len", "500"), ("ip.src", "10.0.0.2"), ("ip.dst", "10.0.0.1"), ("_ws.col.protocol", "HTTP")]),
        ];
        let report = summarize_rows(rows.into_iter());
        assert_eq!(report.total_packets, 2);
        assert_eq!(report.total_bytes, 560);
        assert_eq!(report.top_protocols.len(), 2);
    }

    #[test]
    fn falls_back_to_ipv6_when_ipv4_absent() {
        let rows = vec![row(&[("frame.time_epoch", "1.0"), ("frame.len", "60"), ("ipv6.src", "::1"), ("ipv6.dst", "::2")])];
        let report = summarize_rows(rows.into_iter());
        assert_eq!(report.top_talkers.iter().find(|t| t.ip == "::1").unwrap().sent_packets, 1);
    }

    #[test]
    fn empty_stream_yields_zeroed_report() {
        let report = summarize_rows(std::iter::empty());
        assert_eq!(report.total_packets, 0);
        assert!(report.top_protocols.is_empty());
    }
}
