//! Cross-file matcher for two-capture correlation (§4.4, "Cross-file matcher").

use super::{size_sequence_similarity, TIME_WINDOW};
use crate::model::{CandidateMatch, SessionInfo};

const ID_HEADERS: &[&str] = &["x-request-id", "x-correlation-id", "x-trace-id"];

pub fn match_cross_file(sessions_a: &[SessionInfo], sessions_b: &[SessionInfo]) -> Vec<CandidateMatch> {
    let mut out = Vec::new();

    for s1 in sessions_a {
        for s2 in sessions_b {
            if !s1.payload_fingerprint.is_empty() && s1.payload_fingerprint == s2.payload_fingerprint {
                out.push(CandidateMatch::new(s1.clone(), s2.clone(), 0.90, "payload_fingerprint"));
            }

            for header in ID_HEADERS {
                if let (Some(v1), Some(v2)) = (s1.http_headers.get(*header), s2.http_headers.get(*header)) {
                    if !v1.is_empty() && v1 == v2 {
                        out.push(CandidateMatch::new(s1.clone(), s2.clone(), 0.95, format!("http_header:{header}")));
                    }
                }
            }

            if (s1.start_time - s2.start_time).abs() < TIME_WINDOW {
                if let Some(similarity) = size_sequence_similarity(&s1.packet_sizes, &s2.packet_sizes) {
                    if similarity > 0.5 {
                        out.push(CandidateMatch::new(s1.clone(), s2.clone(), 0.5 + 0.3 * similarity, "timing_size"));
                    }
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, file: &str, fp: &str) -> SessionInfo {
        let mut s = SessionInfo::new(id.into(), file.into(), "10.0.0.1".into(), 5000, "10.0.0.2".into(), 80);
        s.payload_fingerprint = fp.into();
        s
    }

    #[test]
    fn matching_fingerprints_across_files_get_point_nine() {
        let a = session("1", "file1", "deadbeefcafefeed");
        let b = session("1", "file2", "deadbeefcafefeed");
        let out = match_cross_file(&[a], &[b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.90);
        assert_eq!(out[0].method, "payload_fingerprint");
    }

    #[test]
    fn shared_header_uses_suffixed_method_name() {
        let mut a = session("1", "file1", "");
        let mut b = session("1", "file2", "");
        a.http_headers.insert("x-trace-id".into(), "t-1".into());
        b.http_headers.insert("x-trace-id".into(), "t-1".into());
        let out = match_cross_file(&[a], &[b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].method, "http_header:x-trace-id");
    }

    #[test]
    fn empty_fingerprints_never_match() {
        let a = session("1", "file1", "");
        let b = session("1", "file2", "");
        assert!(match_cross_file(&[a], &[b]).is_empty());
    }
}
