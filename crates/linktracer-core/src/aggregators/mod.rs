//! Analytical Aggregators (§4.7): simpler adjunct consumers of the
//! Dissector Gateway, sharing its streaming-record abstraction with the
//! Link Tracer but not its matching/chain-building machinery.

pub mod dns;
pub mod http;
pub mod security;
pub mod summary;
pub mod tcp_anomalies;
pub mod tcp_sessions;
pub mod tls;

/// Cap applied to most "top-N" aggregator outputs.
pub const TOP_N: usize = 10;

/// Cap on resampled timeline points in the summary aggregator.
pub const MAX_TIMELINE_POINTS: usize = 50;

/// Cap on the number of sessions returned by the TCP-sessions aggregator.
pub const MAX_TCP_SESSIONS: usize = 50;
