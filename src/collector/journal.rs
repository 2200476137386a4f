//! Journal Log Collector
//!
//! Gathers raw log records from the systemd journal via `journalctl`, run
//! twice per severity: once for system-unit logs and once for the kernel
//! ring buffer (`-k`). Kernel logs matter: GPU and driver faults live there
//! and are frequently logged at warning level only.
//!
//! Collection never aborts the pipeline. A missing binary or a permission
//! failure (e.g. no systemd-journal group membership for kernel logs) turns
//! into a `degraded` note on the partial result. Empty output is a valid
//! "no issues found" result, not a failure.

use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::types::{LogRecord, LogSource, Severity};

/// Long messages are truncated at collection; the prompt needs evidence,
/// not full stack dumps.
const MAX_MESSAGE_CHARS: usize = 200;

/// Result of one collection pass: raw records (most recent first) plus
/// notes about anything that kept the pass from being complete.
#[derive(Debug, Clone, Default)]
pub struct LogCollection {
    pub records: Vec<LogRecord>,
    pub degraded: Vec<String>,
}

impl LogCollection {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Collect journal records for one severity across both scopes, merged
/// chronologically descending.
pub async fn collect(since: &str, severity: Severity) -> LogCollection {
    let mut collection = LogCollection::default();

    for source in [LogSource::System, LogSource::Kernel] {
        match run_journalctl(since, severity, source).await {
            Ok(stdout) => {
                let records = parse_export(&stdout, source, severity);
                debug!(
                    source = %source,
                    severity = %severity,
                    count = records.len(),
                    "Collected journal records"
                );
                collection.records.extend(records);
            }
            Err(note) => {
                warn!(source = %source, severity = %severity, "{note}");
                collection.degraded.push(note);
            }
        }
    }

    collection
        .records
        .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    collection
}

/// Collect both `error` and `warning` passes over the window and union them.
///
/// `journalctl -p warning` includes error-priority entries as well, so the
/// union is deduplicated by (timestamp, message), keeping the first (error)
/// occurrence.
pub async fn collect_window(since: &str) -> LogCollection {
    let mut merged = collect(since, Severity::Error).await;
    let warnings = collect(since, Severity::Warning).await;

    merged.records.extend(warnings.records);
    merged.degraded.extend(warnings.degraded);
    merged.degraded.dedup();

    merged
        .records
        .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut seen = std::collections::HashSet::new();
    merged
        .records
        .retain(|r| seen.insert((r.timestamp, r.message.clone())));

    merged
}

/// Run one journalctl query; any failure becomes a degraded-collection note.
async fn run_journalctl(
    since: &str,
    severity: Severity,
    source: LogSource,
) -> std::result::Result<String, String> {
    let mut cmd = Command::new("journalctl");
    if source == LogSource::Kernel {
        cmd.arg("-k");
    }
    cmd.arg("--since")
        .arg(format!("{} ago", since))
        .arg("-p")
        .arg(severity.journal_priority())
        .arg("--no-pager")
        .arg("-o")
        .arg("json");

    let output = cmd
        .output()
        .await
        .map_err(|e| format!("journalctl not available: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "Failed to read {} logs ({} severity): {}",
            source,
            severity,
            stderr.trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// =============================================================================
// Journal Export Parsing
// =============================================================================

/// One line of `journalctl -o json` output. MESSAGE can legally be an array
/// of bytes for binary payloads; only string messages are kept.
#[derive(Debug, Deserialize)]
struct JournalEntry {
    #[serde(rename = "MESSAGE")]
    message: Option<serde_json::Value>,
    #[serde(rename = "_SYSTEMD_UNIT")]
    unit: Option<String>,
    #[serde(rename = "__REALTIME_TIMESTAMP")]
    realtime_timestamp: Option<String>,
}

/// Parse JSON-per-line journal export into records.
fn parse_export(stdout: &str, source: LogSource, severity: Severity) -> Vec<LogRecord> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<JournalEntry>(line) {
            Ok(entry) => entry_to_record(entry, source, severity),
            Err(e) => {
                debug!("Skipping unparsable journal line: {}", e);
                None
            }
        })
        .collect()
}

fn entry_to_record(
    entry: JournalEntry,
    source: LogSource,
    severity: Severity,
) -> Option<LogRecord> {
    let message = entry.message.as_ref().and_then(|m| m.as_str())?;
    if message.is_empty() {
        return None;
    }

    Some(LogRecord {
        timestamp: parse_realtime_timestamp(entry.realtime_timestamp.as_deref()),
        source,
        severity,
        unit: entry.unit.filter(|u| !u.is_empty()),
        message: truncate_message(message),
    })
}

/// Journal timestamps are microseconds since the epoch, as a string.
/// Unparsable values map to the epoch rather than being dropped: a record
/// with a bad clock is still evidence.
fn parse_realtime_timestamp(raw: Option<&str>) -> DateTime<Local> {
    raw.and_then(|s| s.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_micros)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .with_timezone(&Local)
}

fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        message.to_string()
    } else {
        message.chars().take(MAX_MESSAGE_CHARS).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
