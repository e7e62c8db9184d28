//! Packet-capture analysis over an external dissector subprocess.
//!
//! The hard core is the Link Tracer: session extraction with bidirectional
//! flow accounting, three independent correlation strategies, union-find
//! chain assembly, and directional hop materialization. A simpler set of
//! adjunct aggregators (traffic summary, HTTP, DNS, TLS, security, TCP
//! sessions/anomalies) shares the same streaming-record abstraction.
//!
//! # Examples
//!
//! ```no_run
//! use linktracer_core::{Gateway, trace_single};
//! use std::path::Path;
//!
//! let gateway = Gateway::new();
//! let result = trace_single(&gateway, Path::new("capture.pcapng"))?;
//! println!("{} chains reconstructed", result.chains.len());
//! # Ok::<(), linktracer_core::TraceError>(())
//! ```

pub mod aggregators;
pub mod chain;
pub mod dissector;
pub mod error;
pub mod extractor;
pub mod headers;
pub mod matchers;
pub mod model;
pub mod tracer;

pub use dissector::{FieldRow, FieldStreamReader, Gateway, PacketTree};
pub use error::{DissectorError, ExtractError, TraceError};
pub use model::{CandidateMatch, ChainHop, Direction, PacketInfo, SessionChain, SessionInfo, TraceResult, TraceStats, UnmatchedSession};
pub use tracer::{trace_single, trace_two};
