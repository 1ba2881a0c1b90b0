//! Reading and parsing on-disk run logs.
//!
//! Engines write plain-text logs under `<output_dir>/logs/*.log` in the
//! format `"<ts> - <source> - <LEVEL> - <message>"`. Lines that do not
//! match are surfaced verbatim rather than dropped.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::warn;

use crate::EngineError;

/// One parsed line from a run log file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    /// Seconds since the Unix epoch (UTC).
    pub timestamp: f64,
    pub level: String,
    pub message: String,
    pub source: String,
}

/// Parse a single `"<ts> - <source> - <LEVEL> - <message>"` line.
///
/// Non-conforming lines become an `info` record with source `unknown`
/// and a zero timestamp, carrying the whole line as the message. A
/// structurally valid line whose timestamp fails to parse keeps its
/// source, level and message and degrades only the timestamp to zero.
pub fn parse_log_line(line: &str) -> LogLine {
    let parts: Vec<&str> = line.splitn(4, " - ").collect();
    if parts.len() == 4 {
        let timestamp = NaiveDateTime::parse_from_str(parts[0], "%Y-%m-%d %H:%M:%S,%3f")
            .map_or(0.0, |ts| ts.and_utc().timestamp_millis() as f64 / 1000.0);
        return LogLine {
            timestamp,
            level: parts[2].to_lowercase(),
            message: parts[3].to_string(),
            source: parts[1].to_string(),
        };
    }
    LogLine {
        timestamp: 0.0,
        level: "info".to_string(),
        message: line.to_string(),
        source: "unknown".to_string(),
    }
}

/// Read the most recently modified `.log` file under `<output_dir>/logs`
/// and return its last `limit` lines, parsed.
pub fn read_run_logs(output_dir: &Path, limit: usize) -> Result<Vec<LogLine>, EngineError> {
    let logs_dir = output_dir.join("logs");
    if !logs_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut newest: Option<(std::time::SystemTime, std::path::PathBuf)> = None;
    for entry in std::fs::read_dir(&logs_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map_or(true, |e| e != "log") {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(m, _)| modified > *m) {
            newest = Some((modified, path));
        }
    }

    let Some((_, path)) = newest else {
        return Ok(Vec::new());
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read log file");
            return Ok(Vec::new());
        }
    };

    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(limit);
    Ok(lines[start..].iter().map(|l| parse_log_line(l)).collect())
}
