//! Dissector Gateway: locates and invokes the external packet dissector in
//! two modes, field-stream and tree-export.
//!
//! Generalizes the teacher's `PacketSource` trait seam (byte-level pcap
//! parsing) into a subprocess-backed record seam: callers never touch
//! `Command`/`Child` directly, only [`FieldStreamReader`] and [`PacketTree`].

mod csv_stream;
pub mod row;

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub use csv_stream::FieldStreamReader;
pub use row::FieldRow;

use crate::error::DissectorError;

/// A single packet object from a tree-export invocation: `_source.layers`
/// with values as lists of strings.
#[derive(Debug, Clone)]
pub struct PacketTree(pub serde_json::Value);

impl PacketTree {
    /// All values tshark recorded for `field` on this packet (may repeat).
    pub fn layer_values(&self, field: &str) -> Vec<String> {
        self.0
            .get("_source")
            .and_then(|s| s.get("layers"))
            .and_then(|layers| layers.get(field))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|x| x.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    /// First recorded value for `field`, or `None` if absent.
    pub fn first(&self, field: &str) -> Option<String> {
        self.layer_values(field).into_iter().next()
    }
}

fn probe_binary() -> Option<PathBuf> {
    if let Ok(env_path) = env::var("TSHARK_PATH") {
        let candidate = PathBuf::from(env_path);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            let bundled = dir.join("resources").join("bin").join("tshark");
            if bundled.is_file() {
                return Some(bundled);
            }
        }
    }
    let mac_app = PathBuf::from("/Applications/Wireshark.app/Contents/MacOS/tshark");
    if mac_app.is_file() {
        return Some(mac_app);
    }
    if let Some(path_var) = env::var_os("PATH") {
        for dir in env::split_paths(&path_var) {
            let candidate = dir.join("tshark");
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Owns the resolved dissector binary path and runs both invocation modes.
pub struct Gateway {
    path: Option<PathBuf>,
}

impl Gateway {
    /// Probes for the binary using the standard discovery order.
    pub fn new() -> Self {
        Self { path: probe_binary() }
    }

    /// Bypasses probing with an explicit binary path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    /// Overwrites the configured binary path. Safe to call repeatedly.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn is_available(&self) -> bool {
        self.path.as_ref().is_some_and(|p| p.is_file())
    }

    /// First line of `tshark -v`.
    pub fn version(&self) -> Result<String, DissectorError> {
        let path = self.path.as_ref().ok_or(DissectorError::Unavailable)?;
        let output = Command::new(path).arg("-v").output().map_err(|_| DissectorError::Unavailable)?;
        if !output.status.success() {
            return Err(DissectorError::Failed(String::from_utf8_lossy(&output.stderr).into_owned()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).lines().next().unwrap_or("").to_string())
    }

    /// Row-oriented field projection over `pcap`, optionally filtered.
    pub fn field_stream(&self, pcap: &Path, fields: &[&str], filter: Option<&str>) -> Result<FieldStreamReader, DissectorError> {
        let path = self.path.as_ref().ok_or(DissectorError::Unavailable)?;
        if !pcap.is_file() {
            return Err(DissectorError::FileNotFound(pcap.to_path_buf()));
        }
        let mut cmd = Command::new(path);
        cmd.arg("-r")
            .arg(pcap)
            .arg("-T")
            .arg("fields")
            .arg("-E")
            .arg("separator=,")
            .arg("-E")
            .arg("header=y")
            .arg("-E")
            .arg("quote=d")
            .arg("-E")
            .arg("occurrence=f");
        for field in fields {
            cmd.arg("-e").arg(field);
        }
        if let Some(filt) = filter {
            cmd.arg("-Y").arg(filt);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());
        let child = cmd.spawn().map_err(|_| DissectorError::Unavailable)?;
        FieldStreamReader::new(child)
    }

    /// Whole-file tree export over `pcap`, optionally filtered and with an
    /// explicit field projection.
    pub fn tree_export(&self, pcap: &Path, filter: Option<&str>, fields: Option<&[&str]>) -> Result<Vec<PacketTree>, DissectorError> {
        let path = self.path.as_ref().ok_or(DissectorError::Unavailable)?;
        if !pcap.is_file() {
            return Err(DissectorError::FileNotFound(pcap.to_path_buf()));
        }
        let mut cmd = Command::new(path);
        cmd.arg("-r").arg(pcap).arg("-T").arg("json");
        if let Some(filt) = filter {
            cmd.arg("-Y").arg(filt);
        }
        if let Some(fields) = fields {
            for field in fields {
                cmd.arg("-e").arg(field);
            }
        }
        let output = cmd.output().map_err(|_| DissectorError::Unavailable)?;
        if !output.status.success() {
            return Err(DissectorError::Failed(String::from_utf8_lossy(&output.stderr).into_owned()));
        }
        let value: serde_json::Value =
            serde_json::from_slice(&output.stdout).map_err(|e| DissectorError::Failed(format!("malformed json: {e}")))?;
        let array = value.as_array().ok_or_else(|| DissectorError::Failed("expected a JSON array".into()))?;
        Ok(array.iter().cloned().map(PacketTree).collect())
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}
