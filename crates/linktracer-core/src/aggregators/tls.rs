//! TLS aggregator: handshake records, top SNIs, and version decoding (§4.7).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::TOP_N;
use crate::dissector::{Gateway, PacketTree};
use crate::error::ExtractError;

const FIELDS: &[&str] = &["tls.handshake.extensions_server_name", "tls.record.version", "tls.handshake.type"];

pub fn tls_version_name(code: &str) -> Option<&'static str> {
    match code.trim().to_lowercase().as_str() {
        "0x0301" => Some("TLS 1.0"),
        "0x0302" => Some("TLS 1.1"),
        "0x0303" => Some("TLS 1.2"),
        "0x0304" => Some("TLS 1.3"),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TlsReport {
    pub handshakes: u64,
    pub top_snis: Vec<(String, u64)>,
    pub versions: HashMap<String, u64>,
}

pub fn analyze_tls(gateway: &Gateway, pcap: &Path) -> Result<TlsReport, ExtractError> {
    let trees = gateway.tree_export(pcap, Some("tls.handshake"), Some(FIELDS))?;
    Ok(analyze_tls_trees(&trees))
}

pub fn analyze_tls_trees(trees: &[PacketTree]) -> TlsReport {
    let mut handshakes = 0u64;
    let mut sni_counts: HashMap<String, u64> = HashMap::new();
    let mut versions: HashMap<String, u64> = HashMap::new();

    for tree in trees {
        handshakes += 1;
        if let Some(sni) = tree.first("tls.handshake.extensions_server_name") {
            *sni_counts.entry(sni).or_insert(0) += 1;
        }
        if let Some(code) = tree.first("tls.record.version") {
            if let Some(name) = tls_version_name(&code) {
                *versions.entry(name.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut top_snis: Vec<(String, u64)> = sni_counts.into_iter().collect();
    top_snis.sort_by(|a, b| b.1.cmp(&a.1));
    top_snis.truncate(TOP_N);

    TlsReport { handshakes, top_snis, versions }
}
