//! TCP-anomalies aggregator: per-stream classification of retransmissions,
//! duplicate ACKs, out-of-order delivery, zero windows, and resets (§4.7).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dissector::{Gateway, PacketTree};
use crate::error::ExtractError;

const FILTER: &str = "tcp.analysis.flags or tcp.flags.reset==1";
const FIELDS: &[&str] = &[
    "tcp.stream",
    "ip.src",
    "ip.dst",
    "tcp.analysis.retransmission",
    "tcp.analysis.duplicate_ack",
    "tcp.analysis.fast_retransmission",
    "tcp.analysis.out_of_order",
    "tcp.analysis.zero_window",
    "tcp.flags.reset",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamAnomalies {
    pub stream_id: String,
    pub src: String,
    pub dst: String,
    pub retransmissions: u64,
    pub duplicate_acks: u64,
    pub fast_retransmissions: u64,
    pub out_of_order: u64,
    pub zero_windows: u64,
    pub resets: u64,
    pub total: u64,
}

pub fn analyze_tcp_anomalies(gateway: &Gateway, pcap: &Path) -> Result<Vec<StreamAnomalies>, ExtractError> {
    let trees = gateway.tree_export(pcap, Some(FILTER), Some(FIELDS))?;
    Ok(analyze_tcp_anomalies_trees(&trees))
}

fn flag_set(value: Option<String>) -> bool {
    matches!(value.as_deref(), Some("1") | Some("True"))
}

pub fn analyze_tcp_anomalies_trees(trees: &[PacketTree]) -> Vec<StreamAnomalies> {
    let mut order: Vec<String> = Vec::new();
    let mut streams: HashMap<String, StreamAnomalies> = HashMap::new();

    for tree in trees {
        let Some(stream_id) = tree.first("tcp.stream") else { continue };
        let entry = streams.entry(stream_id.clone()).or_insert_with(|| {
            order.push(stream_id.clone());
            StreamAnomalies { stream_id: stream_id.clone(), src: tree.first("ip.src").unwrap_or_default(), dst: tree.first("ip.dst").unwrap_or_default(), ..Default::default() }
        });

        if flag_set(tree.first("tcp.analysis.retransmission")) {
            entry.retransmissions += 1;
            entry.total += 1;
        }
        if flag_set(tree.first("tcp.analysis.duplicate_ack")) {
            entry.duplicate_acks += 1;
            entry.total += 1;
        }
        if flag_set(tree.first("tcp.analysis.fast_retransmission")) {
            entry.fast_retransmissions += 1;
            entry.total += 1;
        }
        if flag_set(tree.first("tcp.analysis.out_of_order")) {
            entry.out_of_order += 1;
            entry.total += 1;
        }
        if flag_set(tree.first("tcp.analysis.zero_window")) {
            entry.zero_windows += 1;
            entry.total += 1;
        }
        if flag_set(tree.first("tcp.flags.reset")) {
            entry.resets += 1;
            entry.total += 1;
        }
    }

    let mut out: Vec<StreamAnomalies> = order.into_iter().filter_map(|id| streams.remove(&id)).collect();
    out.sort_by(|a, b| b.total.cmp(&a.total));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(fields: &[(&str, &str)]) -> PacketTree {
        let mut layers = serde_json::Map::new();
        for (k, v) in fields {
            layers.insert((*k).to_string(), serde_json::json!([v]));
        }
        PacketTree(serde_json::json!({"_source": {"layers": layers}}))
    }

    #[test]
    fn aggregates_and_sorts_by_total_descending() {
        let trees = vec![
            tree(&[("tcp.stream", "0"), ("ip.src", "10.0.0.1"), ("ip.dst", "10.0.0.2"), ("tcp.analysis.retransmission", "1")]),
            tree(&[("tcp.stream", "1"), ("ip.src", "10.0.0.3"), ("ip.dst", "10.0.0.4"), ("tcp.flags.reset", "1")]),
            tree(&[("tcp.stream", "1"), ("ip.src", "10.0.0.3"), ("ip.dst", "10.0.0.4"), ("tcp.analysis.duplicate_ack", "1")]),
        ];
        let streams = analyze_tcp_anomalies_trees(&trees);
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].stream_id, "1");
        assert_eq!(streams[0].total, 2);
    }
}
