//! Pure pairwise matchers over a session set.
//!
//! Each matcher is a free function from a slice of [`SessionInfo`] to a list
//! of weighted [`CandidateMatch`] edges; none of them touch the dissector.

pub mod cross_file;
pub mod fingerprint;
pub mod http_header;
pub mod timing_size;

use crate::model::SessionInfo;

/// Matching window: candidates more than this many seconds apart in
/// `start_time` are never compared (beyond the doubled bound used by the
/// fingerprint matcher).
pub const TIME_WINDOW: f64 = 0.5;

pub(crate) fn direct_proxy(a: &SessionInfo, b: &SessionInfo) -> bool {
    a.dst_ip == b.src_ip
}

pub(crate) fn same_vip(a: &SessionInfo, b: &SessionInfo) -> bool {
    a.dst_ip == b.dst_ip
}

pub(crate) fn port_preserved(a: &SessionInfo, b: &SessionInfo) -> bool {
    a.src_port == b.src_port && a.src_ip != b.src_ip
}

/// Direct proxy, or a NAT/load-balancer hop that preserved the source port.
pub(crate) fn is_valid_hop_pair(a: &SessionInfo, b: &SessionInfo) -> bool {
    direct_proxy(a, b) || port_preserved(a, b)
}

/// Positional size-sequence similarity over the first `min(len_a, len_b, 10)`
/// frames. `None` when fewer than 3 comparable positions exist.
pub(crate) fn size_sequence_similarity(a: &[u64], b: &[u64]) -> Option<f64> {
    let n = a.len().min(b.len()).min(10);
    if n < 3 {
        return None;
    }
    let matches = (0..n)
        .filter(|&i| {
            let (x, y) = (a[i] as f64, b[i] as f64);
            (x - y).abs() <= 100.0f64.max(0.2 * x.max(y))
        })
        .count();
    Some(matches as f64 / n as f64)
}
