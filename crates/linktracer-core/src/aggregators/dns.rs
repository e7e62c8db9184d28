//! DNS aggregator: query/response records, top domains, and the type
//! mnemonic table (§4.7).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::TOP_N;
use crate::dissector::{Gateway, PacketTree};
use crate::error::ExtractError;

const FIELDS: &[&str] = &["dns.qry.name", "dns.qry.type", "dns.flags.response"];

pub fn dns_type_name(code: &str) -> &'static str {
    match code.trim() {
        "1" => "A",
        "2" => "NS",
        "5" => "CNAME",
        "6" => "SOA",
        "12" => "PTR",
        "15" => "MX",
        "16" => "TXT",
        "28" => "AAAA",
        "33" => "SRV",
        "255" => "ANY",
        _ => "UNKNOWN",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecord {
    pub name: String,
    pub qtype: String,
    pub is_response: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DnsReport {
    pub queries: u64,
    pub responses: u64,
    pub top_domains: Vec<(String, u64)>,
    pub records: Vec<DnsRecord>,
}

pub fn analyze_dns(gateway: &Gateway, pcap: &Path) -> Result<DnsReport, ExtractError> {
    let trees = gateway.tree_export(pcap, Some("dns"), Some(FIELDS))?;
    Ok(analyze_dns_trees(&trees))
}

pub fn analyze_dns_trees(trees: &[PacketTree]) -> DnsReport {
    let mut queries = 0u64;
    let mut responses = 0u64;
    let mut domain_counts: HashMap<String, u64> = HashMap::new();
    let mut records = Vec::new();

    for tree in trees {
        let Some(name) = tree.first("dns.qry.name") else { continue };
        let qtype = dns_type_name(&tree.first("dns.qry.type").unwrap_or_default()).to_string();
        let is_response = matches!(tree.first("dns.flags.response").as_deref(), Some("1") | Some("True"));

        if is_response {
            responses += 1;
        } else {
            queries += 1;
        }
        *domain_counts.entry(name.clone()).or_insert(0) += 1;
        records.push(DnsRecord { name, qtype, is_response });
    }

    let mut top_domains: Vec<(String, u64)> = domain_counts.into_iter().collect();
    top_domains.sort_by(|a, b| b.1.cmp(&a.1));
    top_domains.truncate(TOP_N);

    DnsReport { queries, responses, top_domains, records }
}
