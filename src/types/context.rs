//! Diagnostic Data Model
//!
//! Immutable data carried through a single diagnostic run:
//! raw log records, classified findings, resource snapshot, OS identity, and
//! the `DiagnosticContext` aggregate handed to the prompt assembler.
//!
//! A `DiagnosticContext` is exclusively owned by the invocation that built
//! it; nothing mutates it after `build`.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// =============================================================================
// Log Records
// =============================================================================

/// Which journal scope a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    System,
    Kernel,
}

impl std::fmt::Display for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Kernel => write!(f, "kernel"),
        }
    }
}

/// Collected severity levels. Both are always queried: display-server
/// crashes and GPU faults are frequently logged at warning level only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    /// Priority keyword understood by `journalctl -p`.
    pub fn journal_priority(&self) -> &'static str {
        match self {
            Self::Error => "err",
            Self::Warning => "warning",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// One collected log entry. Immutable once collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub source: LogSource,
    pub severity: Severity,
    /// Originating systemd unit, when the journal knows it.
    pub unit: Option<String>,
    pub message: String,
}

impl LogRecord {
    /// Render as a prompt/report sample line.
    pub fn render(&self) -> String {
        format!(
            "- [{}] {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.unit.as_deref().unwrap_or("unknown"),
            self.message
        )
    }
}

// =============================================================================
// Classification Categories
// =============================================================================

/// Closed set of diagnostic topics used to bucket log findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Gui,
    Hardware,
    Driver,
    Service,
    Security,
}

impl Category {
    /// Reporting order. GUI/display findings lead because they are the most
    /// user-visible failure mode.
    pub const ALL: [Category; 5] = [
        Category::Gui,
        Category::Hardware,
        Category::Driver,
        Category::Service,
        Category::Security,
    ];

    /// Stable identifier used in structured output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gui => "gui_errors",
            Self::Hardware => "hardware_errors",
            Self::Driver => "driver_errors",
            Self::Service => "service_errors",
            Self::Security => "security_warnings",
        }
    }

    /// Human-readable section title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Gui => "GUI/Display errors",
            Self::Hardware => "Hardware errors",
            Self::Driver => "Driver errors",
            Self::Service => "Service errors",
            Self::Security => "Security warnings",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gui" | "display" => Ok(Self::Gui),
            "hardware" => Ok(Self::Hardware),
            "driver" | "drivers" => Ok(Self::Driver),
            "service" | "services" => Ok(Self::Service),
            "security" => Ok(Self::Security),
            _ => Err(format!(
                "Invalid category '{}'. Valid values: gui, hardware, drivers, services, security",
                s
            )),
        }
    }
}

// =============================================================================
// Classified Findings
// =============================================================================

/// Deduplicated log findings, bucketed per category, each bucket capped and
/// ordered most-recent-first. A record may sit in several buckets when it
/// matches several keyword sets; deduplication never crosses buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedFindings {
    gui: Vec<LogRecord>,
    hardware: Vec<LogRecord>,
    driver: Vec<LogRecord>,
    service: Vec<LogRecord>,
    security: Vec<LogRecord>,
}

impl ClassifiedFindings {
    pub fn get(&self, category: Category) -> &[LogRecord] {
        match category {
            Category::Gui => &self.gui,
            Category::Hardware => &self.hardware,
            Category::Driver => &self.driver,
            Category::Service => &self.service,
            Category::Security => &self.security,
        }
    }

    pub fn push(&mut self, category: Category, record: LogRecord) {
        let bucket = match category {
            Category::Gui => &mut self.gui,
            Category::Hardware => &mut self.hardware,
            Category::Driver => &mut self.driver,
            Category::Service => &mut self.service,
            Category::Security => &mut self.security,
        };
        bucket.push(record);
    }

    pub fn count(&self, category: Category) -> usize {
        self.get(category).len()
    }

    pub fn total(&self) -> usize {
        Category::ALL.iter().map(|c| self.count(*c)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Categories with no findings. Stamped into the prompt so the model is
    /// told "none found" instead of being left to fill a perceived gap.
    pub fn empty_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.count(*c) == 0)
            .collect()
    }
}

// =============================================================================
// Resource Snapshot
// =============================================================================

/// Disk usage for one mount point, in kibibytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountUsage {
    pub mount: String,
    pub size_kb: u64,
    pub used_kb: u64,
    pub used_percent: u8,
}

/// Host resource metrics collected once per diagnostic run. Fields are
/// optional because each underlying utility can independently be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Bytes.
    pub memory_total: Option<u64>,
    /// Bytes.
    pub memory_used: Option<u64>,
    pub disks: Vec<MountUsage>,
    /// Raw `uptime` line, kept opaque.
    pub uptime: Option<String>,
    /// 1, 5 and 15 minute load averages.
    pub load_average: Option<[f64; 3]>,
}

impl ResourceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.memory_total.is_none()
            && self.disks.is_empty()
            && self.uptime.is_none()
            && self.load_average.is_none()
    }
}

// =============================================================================
// OS Identity
// =============================================================================

/// Package manager families the prompt can reference, so the model
/// recommends commands for the right distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Pacman,
    Zypper,
    Apk,
}

impl PackageManager {
    pub fn command(&self) -> &'static str {
        match self {
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Zypper => "zypper",
            Self::Apk => "apk",
        }
    }

    /// Map an os-release `ID`/`ID_LIKE` token to a package manager family.
    pub fn from_os_id(token: &str) -> Option<Self> {
        match token {
            "debian" | "ubuntu" | "linuxmint" | "pop" => Some(Self::Apt),
            "fedora" | "rhel" | "centos" | "rocky" | "almalinux" => Some(Self::Dnf),
            "arch" | "manjaro" | "endeavouros" => Some(Self::Pacman),
            "opensuse" | "suse" | "sles" => Some(Self::Zypper),
            "alpine" => Some(Self::Apk),
            _ => None,
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Detected OS identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: Option<String>,
    pub id: Option<String>,
    pub pretty_name: Option<String>,
    pub kernel: Option<String>,
    pub package_manager: Option<PackageManager>,
}

impl OsInfo {
    pub fn display_name(&self) -> &str {
        self.pretty_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("unknown Linux")
    }
}

// =============================================================================
// Diagnostic Context
// =============================================================================

/// Everything one diagnostic run knows, aggregated for the prompt assembler.
/// Pure aggregation: building it performs no I/O and cannot fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticContext {
    pub findings: ClassifiedFindings,
    pub resources: ResourceSnapshot,
    pub os: OsInfo,
    /// Optional user-supplied issue description.
    pub issue: Option<String>,
    /// Notes about degraded collection (missing journalctl, kernel log
    /// permission, absent resource utilities).
    pub degraded: Vec<String>,
}

impl DiagnosticContext {
    pub fn build(
        findings: ClassifiedFindings,
        resources: ResourceSnapshot,
        os: OsInfo,
        issue: Option<String>,
        degraded: Vec<String>,
    ) -> Self {
        Self {
            findings,
            resources,
            os,
            issue,
            degraded,
        }
    }

    pub fn empty_categories(&self) -> Vec<Category> {
        self.findings.empty_categories()
    }
}

// =============================================================================
// Tests
// =============================================================================
