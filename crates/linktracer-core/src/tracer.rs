//! Tracer Façade: the two public entry points that orchestrate extraction,
//! header harvesting, matching, and chain building (§4.6).

use std::collections::HashMap;
use std::path::Path;

use crate::chain::build_chains;
use crate::dissector::Gateway;
use crate::error::TraceError;
use crate::extractor::extract_sessions;
use crate::headers::harvest_headers;
use crate::matchers::cross_file::match_cross_file;
use crate::matchers::fingerprint::match_fingerprints;
use crate::matchers::http_header::match_http_headers;
use crate::matchers::timing_size::match_timing_size;
use crate::model::{CandidateMatch, TraceResult, TraceStats};

fn file_tag(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn tally_methods(chains: &[crate::model::SessionChain]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for chain in chains {
        *counts.entry(chain.method.clone()).or_insert(0) += 1;
    }
    counts
}

/// Single-file trace: extract, harvest, run the three intra-file matchers,
/// and build chains with per-packet detail.
pub fn trace_single(gateway: &Gateway, path: &Path) -> Result<TraceResult, TraceError> {
    let tag = file_tag(path);
    let mut sessions = extract_sessions(gateway, path, &tag)?;
    harvest_headers(gateway, path, &mut sessions)?;

    let mut edges: Vec<CandidateMatch> = Vec::new();
    edges.extend(match_fingerprints(&sessions));
    edges.extend(match_http_headers(&sessions));
    edges.extend(match_timing_size(&sessions));

    let mut file_paths = HashMap::new();
    file_paths.insert(tag, path.to_path_buf());

    let (chains, unmatched_sessions) = build_chains(edges, &sessions, Some(gateway), &file_paths, true);

    let stats = TraceStats {
        total_sessions: sessions.len(),
        matched_chains: chains.len(),
        matched_sessions: chains.iter().map(|c| c.hops.len() / 2).sum(),
        methods_used: tally_methods(&chains),
        file1_sessions: None,
        file2_sessions: None,
    };

    Ok(TraceResult { chains, unmatched_sessions, stats })
}

/// Two-file cross-trace: extract and harvest each file independently, run
/// the cross-file matcher plus the intra-file fingerprint/header matchers
/// within each file, and build chains with per-packet detail — each
/// session's hops are materialized against its own file's path via the
/// `file1`/`file2`-keyed path map rather than a single shared path.
pub fn trace_two(gateway: &Gateway, path_a: &Path, path_b: &Path) -> Result<TraceResult, TraceError> {
    let mut sessions_a = extract_sessions(gateway, path_a, "file1")?;
    harvest_headers(gateway, path_a, &mut sessions_a)?;
    let mut sessions_b = extract_sessions(gateway, path_b, "file2")?;
    harvest_headers(gateway, path_b, &mut sessions_b)?;

    let mut edges: Vec<CandidateMatch> = Vec::new();
    edges.extend(match_cross_file(&sessions_a, &sessions_b));
    edges.extend(match_fingerprints(&sessions_a));
    edges.extend(match_http_headers(&sessions_a));
    edges.extend(match_fingerprints(&sessions_b));
    edges.extend(match_http_headers(&sessions_b));

    let mut all_sessions = sessions_a.clone();
    all_sessions.extend(sessions_b.clone());

    let mut file_paths = HashMap::new();
    file_paths.insert("file1".to_string(), path_a.to_path_buf());
    file_paths.insert("file2".to_string(), path_b.to_path_buf());

    let (chains, unmatched_sessions) = build_chains(edges, &all_sessions, Some(gateway), &file_paths, true);

    let stats = TraceStats {
        total_sessions: all_sessions.len(),
        matched_chains: chains.len(),
        matched_sessions: chains.iter().map(|c| c.hops.len() / 2).sum(),
        methods_used: tally_methods(&chains),
        file1_sessions: Some(sessions_a.len()),
        file2_sessions: Some(sessions_b.len()),
    };

    Ok(TraceResult { chains, unmatched_sessions, stats })
}
