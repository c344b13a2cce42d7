// src/utils/logbook.rs
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::{fs, io::Write, path::Path};

/// Append one event line to the JSONL logbook.
pub fn emit_event(path: &Path, event: &str, data: Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let line = serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "event": event,
        "data": data
    });
    let json = serde_json::to_string(&line)?;
    let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{}", json)?;
    Ok(())
}
