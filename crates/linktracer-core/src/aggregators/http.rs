//! HTTP aggregator: request/response records and top hosts, via tree-export.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::TOP_N;
use crate::dissector::{Gateway, PacketTree};
use crate::error::ExtractError;

const FIELDS: &[&str] = &["http.host", "http.request.method", "http.request.uri", "http.response.code", "frame.time_epoch"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRecord {
    pub is_request: bool,
    pub host: Option<String>,
    pub method: Option<String>,
    pub uri: Option<String>,
    pub status_code: Option<String>,
    pub time_epoch: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HttpReport {
    pub requests: u64,
    pub responses: u64,
    pub top_hosts: Vec<(String, u64)>,
    pub records: Vec<HttpRecord>,
}

pub fn analyze_http(gateway: &Gateway, pcap: &Path) -> Result<HttpReport, ExtractError> {
    let trees = gateway.tree_export(pcap, Some("http"), Some(FIELDS))?;
    Ok(analyze_http_trees(&trees))
}

pub fn analyze_http_trees(trees: &[PacketTree]) -> HttpReport {
    let mut requests = 0u64;
    let mut responses = 0u64;
    let mut host_counts: HashMap<String, u64> = HashMap::new();
    let mut records = Vec::new();

    for tree in trees {
        let method = tree.first("http.request.method");
        let status = tree.first("http.response.code");
        let host = tree.first("http.host");
        let is_request = method.is_some();

        if is_request {
            requests += 1;
            if let Some(host) = &host {
                *host_counts.entry(host.clone()).or_insert(0) += 1;
            }
        }
        if status.is_some() {
            responses += 1;
        }

        records.push(HttpRecord {
            is_request,
            host,
            method,
            uri: tree.first("http.request.uri"),
            status_code: status,
            time_epoch: tree.first("frame.time_epoch").and_then(|v| v.parse().ok()).unwrap_or(0.0),
        });
    }

    let mut top_hosts: Vec<(String, u64)> = host_counts.into_iter().collect();
    top_hosts.sort_by(|a, b| b.1.cmp(&a.1));
    top_hosts.truncate(TOP_N);

    HttpReport { requests, responses, top_hosts, records }
}
