//! Chain Builder: dedup, union-find, sub-chain splitting, and hop
//! materialization (§4.5).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::dissector::{FieldRow, Gateway};
use crate::matchers::is_valid_hop_pair;
use crate::model::{CandidateMatch, ChainHop, Direction, PacketInfo, SessionChain, SessionInfo, UnmatchedSession};

const HOP_PACKET_FIELDS: &[&str] = &[
    "frame.number",
    "frame.time_epoch",
    "frame.len",
    "ip.src",
    "tcp.srcport",
    "tcp.dstport",
    "tcp.seq",
    "tcp.ack",
    "tcp.flags",
    "tcp.window_size_value",
    "tcp.checksum",
    "tcp.urgent_pointer",
    "tcp.options",
    "_ws.col.Info",
    "tcp.analysis.retransmission",
];

/// Dedupes `edges` by unordered session-pair key, keeping the max-confidence
/// edge, then unions, splits, and materializes chains. Returns chains sorted
/// by descending confidence plus the list of sessions that ended up in none.
pub fn build_chains(
    edges: Vec<CandidateMatch>,
    all_sessions: &[SessionInfo],
    gateway: Option<&Gateway>,
    file_paths: &HashMap<String, PathBuf>,
    include_packets: bool,
) -> (Vec<SessionChain>, Vec<UnmatchedSession>) {
    let deduped = dedupe_edges(edges);

    let mut parent: HashMap<String, String> = HashMap::new();
    for (a, b) in deduped.keys() {
        parent.entry(a.clone()).or_insert_with(|| a.clone());
        parent.entry(b.clone()).or_insert_with(|| b.clone());
    }
    for (a, b) in deduped.keys() {
        union(&mut parent, a, b);
    }

    let mut components: HashMap<String, Vec<String>> = HashMap::new();
    let node_keys: Vec<String> = parent.keys().cloned().collect();
    for key in node_keys {
        let root = find(&mut parent, &key);
        components.entry(root).or_default().push(key);
    }

    let by_key: HashMap<String, &SessionInfo> = all_sessions.iter().map(|s| (s.key(), s)).collect();

    let mut chains = Vec::new();
    let mut matched_keys: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut chain_counter: u32 = 0;

    for members_keys in components.values() {
        let mut members: Vec<&SessionInfo> = members_keys.iter().filter_map(|k| by_key.get(k).copied()).collect();
        members.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap_or(Ordering::Equal));
        if members.is_empty() {
            continue;
        }

        for subchain in split_valid_subchains(&members) {
            if subchain.len() < 2 {
                continue;
            }

            let (confidence, method) = subchain_confidence_and_method(&subchain, &deduped);
            let hops = materialize_hops(&subchain, gateway, file_paths, include_packets);
            let latency_ms = compute_latency_ms(&subchain);

            for s in &subchain {
                matched_keys.insert(s.key());
            }

            chains.push(SessionChain { chain_id: format!("chain_{:03}", chain_counter), confidence, method, hops, latency_ms });
            chain_counter += 1;
        }
    }

    chains.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

    let unmatched = all_sessions
        .iter()
        .filter(|s| !matched_keys.contains(&s.key()))
        .take(50)
        .map(|s| UnmatchedSession { session_id: s.session_id.clone(), src: s.src_endpoint(), dst: s.dst_endpoint(), packets: s.packet_count, file: Some(s.file_source.clone()) })
        .collect();

    (chains, unmatched)
}

fn dedupe_edges(edges: Vec<CandidateMatch>) -> HashMap<(String, String), CandidateMatch> {
    let mut deduped: HashMap<(String, String), CandidateMatch> = HashMap::new();
    for edge in edges {
        let (ka, kb) = (edge.a.key(), edge.b.key());
        let pair_key = if ka <= kb { (ka, kb) } else { (kb, ka) };
        match deduped.get(&pair_key) {
            Some(existing) if existing.confidence >= edge.confidence => {}
            _ => {
                deduped.insert(pair_key, edge);
            }
        }
    }
    deduped
}

fn find(parent: &mut HashMap<String, String>, x: &str) -> String {
    let mut root = x.to_string();
    while parent[&root] != root {
        root = parent[&root].clone();
    }
    let mut cur = x.to_string();
    while cur != root {
        let next = parent[&cur].clone();
        parent.insert(cur, root.clone());
        cur = next;
    }
    root
}

fn union(parent: &mut HashMap<String, String>, a: &str, b: &str) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent.insert(ra, rb);
    }
}

/// Splits a `start_time`-sorted component into maximal runs where every
/// consecutive pair satisfies [`is_valid_hop_pair`].
fn split_valid_subchains<'a>(members: &[&'a SessionInfo]) -> Vec<Vec<&'a SessionInfo>> {
    let mut subchains = Vec::new();
    let mut current: Vec<&SessionInfo> = vec![members[0]];
    for &m in &members[1..] {
        let last = *current.last().unwrap();
        if is_valid_hop_pair(last, m) {
            current.push(m);
        } else {
            subchains.push(std::mem::replace(&mut current, vec![m]));
        }
    }
    subchains.push(current);
    subchains
}

fn subchain_confidence_and_method(subchain: &[&SessionInfo], deduped: &HashMap<(String, String), CandidateMatch>) -> (f64, String) {
    let mut confidences = Vec::new();
    let mut method_counts: Vec<(String, usize)> = Vec::new();

    for pair in subchain.windows(2) {
        let (ka, kb) = (pair[0].key(), pair[1].key());
        let pair_key = if ka <= kb { (ka, kb) } else { (kb, ka) };
        let (confidence, method) = match deduped.get(&pair_key) {
            Some(edge) => (edge.confidence, edge.method.clone()),
            None => (0.5, "inferred".to_string()),
        };
        confidences.push(confidence);
        match method_counts.iter_mut().find(|(m, _)| *m == method) {
            Some((_, count)) => *count += 1,
            None => method_counts.push((method, 1)),
        }
    }

    let mean = if confidences.is_empty() { 0.0 } else { confidences.iter().sum::<f64>() / confidences.len() as f64 };
    let rounded = (mean * 100.0).round() / 100.0;

    let mode = method_counts.into_iter().max_by_key(|(_, count)| *count).map(|(m, _)| m).unwrap_or_else(|| "inferred".to_string());

    (rounded, mode)
}

fn compute_latency_ms(subchain: &[&SessionInfo]) -> f64 {
    let first = subchain.first().unwrap();
    let last = subchain.last().unwrap();
    let start = if first.forward_start != 0.0 { first.forward_start } else { first.start_time };
    let end = if last.backward_end != 0.0 { last.backward_end } else { last.end_time };
    ((end - start) * 1000.0 * 100.0).round() / 100.0
}

fn materialize_hops(
    subchain: &[&SessionInfo],
    gateway: Option<&Gateway>,
    file_paths: &HashMap<String, PathBuf>,
    include_packets: bool,
) -> Vec<ChainHop> {
    let mut hops = Vec::new();
    for session in subchain {
        let forward_missing = session.forward_packets == 0;
        let backward_missing = session.backward_packets == 0;

        let request_packets = if include_packets && !forward_missing {
            materialize_for_direction(gateway, file_paths, session, Direction::Request)
        } else {
            Vec::new()
        };
        let response_packets = if include_packets && !backward_missing {
            materialize_for_direction(gateway, file_paths, session, Direction::Response)
        } else {
            Vec::new()
        };

        hops.push(ChainHop {
            session_id: session.session_id.clone(),
            src: session.src_endpoint(),
            dst: session.dst_endpoint(),
            packet_count: session.forward_packets,
            byte_count: session.forward_bytes,
            duration: round3(session.forward_end - session.forward_start),
            file: session.file_source.clone(),
            direction: Direction::Request,
            start_time: session.forward_start,
            missing: forward_missing,
            total_packets: request_packets.len(),
            packets: request_packets,
        });

        hops.push(ChainHop {
            session_id: session.session_id.clone(),
            src: session.dst_endpoint(),
            dst: session.src_endpoint(),
            packet_count: session.backward_packets,
            byte_count: session.backward_bytes,
            duration: round3(session.backward_end - session.backward_start),
            file: session.file_source.clone(),
            direction: Direction::Response,
            start_time: session.backward_start,
            missing: backward_missing,
            total_packets: response_packets.len(),
            packets: response_packets,
        });
    }

    hops.sort_by(|a, b| {
        let key_a = (a.missing, a.start_time);
        let key_b = (b.missing, b.start_time);
        key_a.0.cmp(&key_b.0).then(key_a.1.partial_cmp(&key_b.1).unwrap_or(Ordering::Equal))
    });
    hops
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn materialize_for_direction(gateway: Option<&Gateway>, file_paths: &HashMap<String, PathBuf>, session: &SessionInfo, direction: Direction) -> Vec<PacketInfo> {
    let Some(gateway) = gateway else { return Vec::new() };
    let Some(path) = file_paths.get(&session.file_source) else { return Vec::new() };
    let filter = format!("tcp.stream eq {}", session.session_id);
    let Ok(rows) = gateway.field_stream(path, HOP_PACKET_FIELDS, Some(&filter)) else { return Vec::new() };
    build_hop_packets_from_rows(rows, session, direction)
}

/// Pure filtering/translation step, split out so it can be unit tested
/// without spawning a dissector process.
fn build_hop_packets_from_rows<I: Iterator<Item = FieldRow>>(rows: I, session: &SessionInfo, direction: Direction) -> Vec<PacketInfo> {
    let mut packets = Vec::new();
    let mut first_epoch: Option<f64> = None;
    let mut seq = 1u32;

    for row in rows {
        let is_forward = row.get_str("ip.src") == session.src_ip;
        let matches_direction = match direction {
            Direction::Request => is_forward,
            Direction::Response => !is_forward,
        };
        if !matches_direction {
            continue;
        }

        let epoch = row.get_f64("frame.time_epoch");
        let base = *first_epoch.get_or_insert(epoch);

        let retransmission = matches!(row.get_str("tcp.analysis.retransmission"), "1" | "True" | "true");

        packets.push(PacketInfo {
            seq,
            frame_number: row.get_u64("frame.number"),
            time_epoch: epoch,
            relative_time_ms: (epoch - base) * 1000.0,
            size: row.get_u64("frame.len"),
            src_port: row.get_u16("tcp.srcport"),
            dst_port: row.get_u16("tcp.dstport"),
            seq_num: row.get_u64("tcp.seq"),
            ack_num: row.get_u64("tcp.ack"),
            flags: translate_tcp_flags(parse_tcp_flags(row.get_str("tcp.flags"))),
            window_size: row.get_u64("tcp.window_size_value"),
            checksum: row.get_str("tcp.checksum").to_string(),
            urgent_pointer: row.get_str("tcp.urgent_pointer").trim().parse().unwrap_or(0),
            options: row.get_str("tcp.options").to_string(),
            info: row.get_str("_ws.col.Info").to_string(),
            is_retransmission: retransmission,
        });
        seq += 1;
    }

    packets
}

/// Accepts both `0x02`-style hex and bare decimal (§9: dissector version
/// skew in how `tcp.flags` is rendered).
fn parse_tcp_flags(raw: &str) -> u32 {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).unwrap_or(0)
    } else {
        raw.parse().unwrap_or(0)
    }
}

fn translate_tcp_flags(bits: u32) -> String {
    const MNEMONICS: &[(u32, &str)] = &[(0x02, "SYN"), (0x10, "ACK"), (0x08, "PSH"), (0x01, "FIN"), (0x04, "RST"), (0x20, "URG")];
    let set: Vec<&str> = MNEMONICS.iter().filter(|(mask, _)| bits & mask != 0).map(|(_, name)| *name).collect();
    if set.is_empty() {
        "---".to_string()
    } else {
        set.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, file: &str, src_ip: &str, src_port: u16, dst_ip: &str, dst_port: u16, start: f64) -> SessionInfo {
        let mut s = SessionInfo::new(id.into(), file.into(), src_ip.into(), src_port, dst_ip.into(), dst_port);
        s.start_time = start;
        s.forward_start = start;
        s.forward_end = start + 0.01;
        s.forward_packets = 3;
        s.backward_start = start + 0.02;
        s.backward_end = start + 0.03;
        s.backward_packets = 2;
        s.packet_count = 5;
        s
    }

    #[test]
    fn direct_proxy_pair_forms_one_chain() {
        let a = session("1", "cap", "10.0.0.1", 51000, "10.0.0.2", 80, 0.0);
        let b = session("2", "cap", "10.0.0.2", 51000, "10.0.0.3", 80, 0.05);
        let edge = CandidateMatch::new(a.clone(), b.clone(), 0.90, "payload_fingerprint");
        let all = vec![a, b];
        let (chains, unmatched) = build_chains(vec![edge], &all, None, &HashMap::new(), false);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].confidence, 0.90);
        assert_eq!(chains[0].hops.len(), 4);
        assert!(unmatched.is_empty());
    }

    #[test]
    fn singleton_session_is_unmatched() {
        let a = session("1", "cap", "10.0.0.1", 51000, "10.0.0.2", 80, 0.0);
        let all = vec![a];
        let (chains, unmatched) = build_chains(Vec::new(), &all, None, &HashMap::new(), false);
        assert!(chains.is_empty());
        assert_eq!(unmatched.len(), 1);
    }

    #[test]
    fn transitive_chain_stays_together_when_every_consecutive_pair_is_valid() {
        let a = session("1", "cap", "10.0.0.1", 6000, "10.0.0.2", 80, 0.0);
        let b = session("2", "cap", "10.0.0.2", 6000, "10.0.0.3", 80, 0.05);
        let c = session("3", "cap", "10.0.0.3", 6000, "10.0.0.4", 80, 0.10);
        let e1 = CandidateMatch::new(a.clone(), b.clone(), 0.75, "payload_fingerprint");
        let e2 = CandidateMatch::new(b.clone(), c.clone(), 0.75, "payload_fingerprint");
        let e3 = CandidateMatch::new(a.clone(), c.clone(), 0.75, "payload_fingerprint");
        let all = vec![a, b, c];
        let (chains, _) = build_chains(vec![e1, e2, e3], &all, None, &HashMap::new(), false);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].hops.len(), 6);
    }

    #[test]
    fn missing_edge_between_chain_members_defaults_to_inferred() {
        // Union comes in via (a,c) and (b,c); the time-sorted consecutive
        // pair (a,b) has no stored edge and must default to 0.5/"inferred".
        let a = session("1", "cap", "10.0.0.1", 6000, "10.0.0.2", 80, 0.0);
        let b = session("2", "cap", "10.0.0.2", 6000, "10.0.0.3", 80, 0.05);
        let c = session("3", "cap", "10.0.0.3", 6000, "10.0.0.4", 80, 0.10);
        let e1 = CandidateMatch::new(a.clone(), c.clone(), 0.75, "payload_fingerprint");
        let e2 = CandidateMatch::new(b.clone(), c.clone(), 0.75, "payload_fingerprint");
        let all = vec![a, b, c];
        let (chains, _) = build_chains(vec![e1, e2], &all, None, &HashMap::new(), false);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].confidence, 0.63);
    }

    #[test]
    fn flags_translate_in_fixed_order_and_accept_hex_or_decimal() {
        assert_eq!(translate_tcp_flags(parse_tcp_flags("0x12")), "SYN,ACK");
        assert_eq!(translate_tcp_flags(parse_tcp_flags("18")), "SYN,ACK");
        assert_eq!(translate_tcp_flags(parse_tcp_flags("0")), "---");
    }

    #[test]
    fn chains_sort_by_confidence_descending() {
        let a = session("1", "cap", "10.0.0.1", 6000, "10.0.0.2", 80, 0.0);
        let b = session("2", "cap", "10.0.0.2", 6000, "10.0.0.3", 80, 0.05);
        let c = session("3", "cap", "10.0.0.10", 7000, "10.0.0.11", 80, 1.0);
        let d = session("4", "cap", "10.0.0.11", 7000, "10.0.0.12", 80, 1.05);
        let low = CandidateMatch::new(c.clone(), d.clone(), 0.75, "payload_fingerprint");
        let high = CandidateMatch::new(a.clone(), b.clone(), 0.90, "payload_fingerprint");
        let all = vec![a, b, c, d];
        let (chains, _) = build_chains(vec![low, high], &all, None, &HashMap::new(), false);
        assert_eq!(chains.len(), 2);
        assert!(chains[0].confidence >= chains[1].confidence);
    }
}
