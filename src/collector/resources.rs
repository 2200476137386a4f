//! Resource Snapshot Collector
//!
//! Invokes `free`, `df` and `uptime` and parses their output into a
//! `ResourceSnapshot`. Each utility can fail independently; a failure leaves
//! the corresponding fields unset and adds a degraded note rather than
//! aborting the run.

use regex::Regex;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::debug;

use crate::types::{MountUsage, ResourceSnapshot};

/// Collect a resource snapshot. Returns the snapshot plus degraded-collection
/// notes for any utility that could not be read.
pub async fn snapshot() -> (ResourceSnapshot, Vec<String>) {
    let mut snapshot = ResourceSnapshot::default();
    let mut degraded = Vec::new();

    match run("free", &["-b"]).await {
        Ok(out) => {
            if let Some((total, used)) = parse_free(&out) {
                snapshot.memory_total = Some(total);
                snapshot.memory_used = Some(used);
            }
        }
        Err(note) => degraded.push(note),
    }

    match run("df", &["-P", "-k"]).await {
        Ok(out) => snapshot.disks = parse_df(&out),
        Err(note) => degraded.push(note),
    }

    match run("uptime", &[]).await {
        Ok(out) => {
            let (uptime, load) = parse_uptime(&out);
            snapshot.uptime = uptime;
            snapshot.load_average = load;
        }
        Err(note) => degraded.push(note),
    }

    (snapshot, degraded)
}

async fn run(program: &str, args: &[&str]) -> std::result::Result<String, String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| format!("{} not available: {}", program, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} failed: {}", program, stderr.trim()));
    }

    debug!(program, "Collected resource output");
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse `free -b` output into (total, used) bytes from the `Mem:` row.
fn parse_free(output: &str) -> Option<(u64, u64)> {
    let mem_line = output.lines().find(|l| l.starts_with("Mem:"))?;
    let mut fields = mem_line.split_whitespace().skip(1);
    let total = fields.next()?.parse().ok()?;
    let used = fields.next()?.parse().ok()?;
    Some((total, used))
}

/// Parse `df -P -k` portable output. Pseudo-filesystems (tmpfs, overlay,
/// /dev entries without a device path) are skipped.
fn parse_df(output: &str) -> Vec<MountUsage> {
    output
        .lines()
        .skip(1)
        .filter_map(parse_df_line)
        .collect()
}

fn parse_df_line(line: &str) -> Option<MountUsage> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 || !fields[0].starts_with('/') {
        return None;
    }

    Some(MountUsage {
        mount: fields[5].to_string(),
        size_kb: fields[1].parse().ok()?,
        used_kb: fields[2].parse().ok()?,
        used_percent: fields[4].trim_end_matches('%').parse().ok()?,
    })
}

/// Extract the raw uptime line and the three load averages.
fn parse_uptime(output: &str) -> (Option<String>, Option<[f64; 3]>) {
    static LOAD_RE: OnceLock<Regex> = OnceLock::new();
    let re = LOAD_RE.get_or_init(|| {
        // "load average: 0.52, 0.58, 0.59" (BSD-style "averages" tolerated)
        Regex::new(r"load averages?:\s*([\d.]+),?\s+([\d.]+),?\s+([\d.]+)")
            .expect("load average regex is valid")
    });

    let line = output.lines().find(|l| !l.trim().is_empty());
    let uptime = line.map(|l| l.trim().to_string());

    let load = line.and_then(|l| {
        let caps = re.captures(l)?;
        Some([
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        ])
    });

    (uptime, load)
}

// =============================================================================
// Tests
// =============================================================================
