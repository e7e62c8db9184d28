//! Data model shared by extraction, matching, and chain assembly.
//!
//! Field names mirror the public JSON contract (spec §6) exactly; renaming
//! any of them is a breaking change for downstream consumers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Maximum number of leading frame sizes retained per session for
/// size-sequence matching.
pub const MAX_PACKET_SIZES: usize = 20;

/// TCP session metadata with bidirectional flow accounting.
///
/// One instance per `tcp.stream` identifier observed within a single capture
/// file. See spec §3 for invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub file_source: String,
    pub src_ip: String,
    pub src_port: u16,
    pub dst_ip: String,
    pub dst_port: u16,

    pub packet_count: u64,
    pub byte_count: u64,
    pub start_time: f64,
    pub end_time: f64,

    pub forward_packets: u64,
    pub forward_bytes: u64,
    pub forward_start: f64,
    pub forward_end: f64,

    pub backward_packets: u64,
    pub backward_bytes: u64,
    pub backward_start: f64,
    pub backward_end: f64,

    /// First [`MAX_PACKET_SIZES`] frame lengths in stream order.
    pub packet_sizes: Vec<u64>,
    /// 16 lowercase hex characters, or empty if no qualifying packet was seen.
    pub payload_fingerprint: String,
    /// Lowercased header name -> raw (trimmed) value.
    pub http_headers: HashMap<String, String>,
}

impl SessionInfo {
    pub fn new(session_id: String, file_source: String, src_ip: String, src_port: u16, dst_ip: String, dst_port: u16) -> Self {
        Self {
            session_id,
            file_source,
            src_ip,
            src_port,
            dst_ip,
            dst_port,
            packet_count: 0,
            byte_count: 0,
            start_time: 0.0,
            end_time: 0.0,
            forward_packets: 0,
            forward_bytes: 0,
            forward_start: 0.0,
            forward_end: 0.0,
            backward_packets: 0,
            backward_bytes: 0,
            backward_start: 0.0,
            backward_end: 0.0,
            packet_sizes: Vec::new(),
            payload_fingerprint: String::new(),
            http_headers: HashMap::new(),
        }
    }

    /// `"<file_source>:<session_id>"`, the node key used by the chain builder's
    /// union-find.
    pub fn key(&self) -> String {
        format!("{}:{}", self.file_source, self.session_id)
    }

    pub fn src_endpoint(&self) -> String {
        format!("{}:{}", self.src_ip, self.src_port)
    }

    pub fn dst_endpoint(&self) -> String {
        format!("{}:{}", self.dst_ip, self.dst_port)
    }
}

/// Direction of a [`ChainHop`] relative to the session's original src/dst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Request => "request",
            Direction::Response => "response",
        }
    }
}

/// A single directional leg of a session within a reconstructed chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainHop {
    pub session_id: String,
    pub src: String,
    pub dst: String,
    pub packet_count: u64,
    pub byte_count: u64,
    pub duration: f64,
    pub file: String,
    pub direction: Direction,
    pub start_time: f64,
    pub missing: bool,
    pub packets: Vec<PacketInfo>,
    pub total_packets: usize,
}

/// Per-packet detail within a materialized hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketInfo {
    pub seq: u32,
    pub frame_number: u64,
    pub time_epoch: f64,
    pub relative_time_ms: f64,
    pub size: u64,
    pub src_port: u16,
    pub dst_port: u16,
    pub seq_num: u64,
    pub ack_num: u64,
    pub flags: String,
    pub window_size: u64,
    pub checksum: String,
    pub urgent_pointer: u32,
    pub options: String,
    pub info: String,
    pub is_retransmission: bool,
}

/// An ordered set of hops spanning multiple sessions believed to carry a
/// single logical request end-to-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChain {
    pub chain_id: String,
    pub confidence: f64,
    pub method: String,
    pub hops: Vec<ChainHop>,
    pub latency_ms: f64,
}

/// A session that could not be attached to any chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmatchedSession {
    pub session_id: String,
    pub src: String,
    pub dst: String,
    pub packets: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Weighted pairwise candidate match produced by a matcher.
#[derive(Debug, Clone)]
pub struct CandidateMatch {
    pub a: SessionInfo,
    pub b: SessionInfo,
    pub confidence: f64,
    pub method: String,
}

impl CandidateMatch {
    pub fn new(a: SessionInfo, b: SessionInfo, confidence: f64, method: impl Into<String>) -> Self {
        Self { a, b, confidence, method: method.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TraceStats {
    pub total_sessions: usize,
    pub matched_chains: usize,
    pub matched_sessions: usize,
    pub methods_used: HashMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file1_sessions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file2_sessions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceResult {
    pub chains: Vec<SessionChain>,
    pub unmatched_sessions: Vec<UnmatchedSession>,
    pub stats: TraceStats,
}
