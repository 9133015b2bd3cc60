use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::codec::PacketType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLogMode {
    /// Every frame in both directions.
    Full,
    /// Inbound frames identical to the previous inbound frame are skipped.
    Changes,
}

/// Newline-delimited JSON capture of the serial traffic.
pub(crate) struct FrameLogger {
    mode: FrameLogMode,
    file: File,
    previous_rx: Option<Vec<u8>>,
}

impl FrameLogger {
    pub fn new(mode: FrameLogMode, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_rx: None,
        })
    }

    pub fn log_tx(&mut self, bytes: &[u8]) {
        let entry = frame_entry("tx", bytes);
        self.write_line(&entry);
    }

    pub fn log_rx(&mut self, bytes: &[u8]) {
        if self.mode == FrameLogMode::Changes {
            if self.previous_rx.as_deref() == Some(bytes) {
                return;
            }
            self.previous_rx = Some(bytes.to_vec());
        }
        let entry = frame_entry("rx", bytes);
        self.write_line(&entry);
    }

    pub fn log_link(&mut self, state: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "link",
            "state": state,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write frame log entry: {e}");
        }
    }
}

fn frame_entry(dir: &str, bytes: &[u8]) -> Value {
    let kind = bytes
        .get(3)
        .map(|b| PacketType::from_byte(*b))
        .filter(|t| t.is_known());
    json!({
        "ts": Utc::now().to_rfc3339(),
        "dir": dir,
        "len": bytes.len(),
        "type": kind.map(|t| t.as_str()),
        "hex": hex(bytes),
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
