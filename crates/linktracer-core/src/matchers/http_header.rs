//! HTTP correlation-header matcher (§4.4b).

use std::collections::HashMap;

use super::TIME_WINDOW;
use crate::model::{CandidateMatch, SessionInfo};

const ID_HEADERS: &[&str] = &["x-request-id", "x-correlation-id", "x-trace-id"];

pub fn match_http_headers(sessions: &[SessionInfo]) -> Vec<CandidateMatch> {
    let mut out = Vec::new();

    for header in ID_HEADERS {
        let mut groups: HashMap<&str, Vec<&SessionInfo>> = HashMap::new();
        for session in sessions {
            if let Some(value) = session.http_headers.get(*header) {
                if !value.is_empty() {
                    groups.entry(value.as_str()).or_default().push(session);
                }
            }
        }
        for group in groups.values() {
            if group.len() < 2 {
                continue;
            }
            for i in 0..group.len() {
                for j in (i + 1)..group.len() {
                    out.push(CandidateMatch::new(group[i].clone(), group[j].clone(), 0.95, "http_header"));
                }
            }
        }
    }

    for session in sessions {
        let Some(xff) = session.http_headers.get("x-forwarded-for") else { continue };
        let client_ips: Vec<&str> = xff.split(',').map(str::trim).filter(|ip| !ip.is_empty()).collect();
        for other in sessions {
            if std::ptr::eq(other, session) {
                continue;
            }
            if client_ips.contains(&other.src_ip.as_str()) && (other.start_time - session.start_time).abs() < TIME_WINDOW {
                out.push(CandidateMatch::new(other.clone(), session.clone(), 0.90, "http_header"));
            }
        }
    }

    out
}
