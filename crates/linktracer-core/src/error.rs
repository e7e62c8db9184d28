//! Error enums for each layer, following the teacher's per-module
//! `thiserror` convention (`SourceError`, `AnalysisError`).

use std::path::PathBuf;

use thiserror::Error;

/// Failures from invoking or reading the external dissector.
#[derive(Debug, Error)]
pub enum DissectorError {
    #[error("dissector binary not available")]
    Unavailable,
    #[error("dissector failed: {0}")]
    Failed(String),
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures surfaced by the session extractor / header harvester.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Dissector(#[from] DissectorError),
}

/// Failures surfaced by the tracer façade.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error(transparent)]
    Dissector(#[from] DissectorError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}
