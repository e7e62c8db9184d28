//! Streaming reader over a dissector child process's field-stream stdout.
//!
//! Mirrors the teacher's `PcapFileSource` refill/consume loop, but the
//! refill source is a child process's stdout instead of a memory-mapped
//! file.

use std::process::{Child, ChildStdout};

use crate::dissector::row::FieldRow;
use crate::error::DissectorError;

pub struct FieldStreamReader {
    child: Child,
    csv_reader: csv::Reader<ChildStdout>,
}

impl FieldStreamReader {
    pub(crate) fn new(mut child: Child) -> Result<Self, DissectorError> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DissectorError::Failed("child produced no stdout handle".into()))?;
        let csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(stdout);
        Ok(Self { child, csv_reader })
    }
}

impl Iterator for FieldStreamReader {
    type Item = FieldRow;

    fn next(&mut self) -> Option<FieldRow> {
        let headers = self.csv_reader.headers().ok()?.clone();
        let mut record = csv::StringRecord::new();
        match self.csv_reader.read_record(&mut record) {
            Ok(true) => {
                let map = headers.iter().zip(record.iter()).map(|(k, v)| (k.to_string(), v.to_string())).collect();
                Some(FieldRow(map))
            }
            Ok(false) => None,
            Err(err) => {
                log::warn!("dissector field-stream terminated early: {err}");
                None
            }
        }
    }
}

impl Drop for FieldStreamReader {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
