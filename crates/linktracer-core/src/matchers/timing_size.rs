//! Timing + size-sequence matcher (§4.4c), within a single file.

use super::{size_sequence_similarity, TIME_WINDOW};
use crate::model::{CandidateMatch, SessionInfo};

pub fn match_timing_size(sessions: &[SessionInfo]) -> Vec<CandidateMatch> {
    let mut sorted: Vec<&SessionInfo> = sessions.iter().collect();
    sorted.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap_or(std::cmp::Ordering::Equal));

    let mut out = Vec::new();
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            let (s1, s2) = (sorted[i], sorted[j]);
            if s2.start_time - s1.start_time > TIME_WINDOW {
                break;
            }
            if (s2.start_time - s1.start_time).abs() < 0.001 {
                continue;
            }
            if s1.src_ip == s2.src_ip && s1.dst_ip == s2.dst_ip {
                continue;
            }
            if !(super::direct_proxy(s1, s2) || (super::port_preserved(s1, s2) && super::same_vip(s1, s2))) {
                continue;
            }
            let Some(similarity) = size_sequence_similarity(&s1.packet_sizes, &s2.packet_sizes) else { continue };
            if similarity > 0.6 {
                out.push(CandidateMatch::new(s1.clone(), s2.clone(), 0.5 + 0.3 * similarity, "timing_size"));
            }
        }
    }
    out
}
