//! Payload-fingerprint matcher (§4.4a).

use std::collections::HashMap;

use super::TIME_WINDOW;
use crate::model::{CandidateMatch, SessionInfo};

pub fn match_fingerprints(sessions: &[SessionInfo]) -> Vec<CandidateMatch> {
    let mut groups: HashMap<&str, Vec<&SessionInfo>> = HashMap::new();
    for session in sessions {
        if !session.payload_fingerprint.is_empty() {
            groups.entry(session.payload_fingerprint.as_str()).or_default().push(session);
        }
    }

    let mut out = Vec::new();
    for group in groups.values() {
        if group.len() < 2 {
            continue;
        }
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                let (s1, s2) = if group[i].start_time <= group[j].start_time { (group[i], group[j]) } else { (group[j], group[i]) };

                if s1.src_ip == s2.src_ip && s1.dst_ip == s2.dst_ip {
                    continue;
                }
                if (s1.start_time - s2.start_time).abs() > 2.0 * TIME_WINDOW {
                    continue;
                }

                let confidence = if super::direct_proxy(s1, s2) {
                    Some(0.90)
                } else {
                    let preserved = super::port_preserved(s1, s2);
                    let vip = super::same_vip(s1, s2);
                    if preserved && vip {
                        Some(0.85)
                    } else if preserved ^ vip {
                        Some(0.75)
                    } else {
                        None
                    }
                };

                if let Some(confidence) = confidence {
                    out.push(CandidateMatch::new(s1.clone(), s2.clone(), confidence, "payload_fingerprint"));
                }
            }
        }
    }
    out
}
