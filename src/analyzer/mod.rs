//! Log Classifier / Deduplicator
//!
//! Buckets raw log records into diagnostic categories by keyword matching.
//! A record may land in several categories; deduplication is per category
//! only, keyed on lowercased, whitespace-collapsed message text, keeping the
//! most recent occurrence. Each bucket is capped, most-recent-first.
//!
//! Pure and deterministic over its input: zero matches is a valid result,
//! and classification never fails.

use std::collections::HashSet;

use crate::config::LogConfig;
use crate::types::{Category, ClassifiedFindings, LogRecord};

// =============================================================================
// Keyword Rules
// =============================================================================

/// Keyword tables per category. Fixed defaults, overridable per category via
/// `[logs.keywords]` in configuration.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    hardware: Vec<String>,
    driver: Vec<String>,
    gui: Vec<String>,
    security: Vec<String>,
    service: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            hardware: to_owned(&[
                "cpu",
                "memory",
                "disk",
                "smart",
                "thermal",
                "temperature",
                "overheating",
                "hardware",
                "mce",
                "edac",
                "ecc",
                "i/o error",
            ]),
            driver: to_owned(&[
                "driver", "module", "firmware", "i915", "nouveau", "nvidia", "amdgpu", "radeon",
                "drm", "usb",
            ]),
            gui: to_owned(&[
                "x11", "wayland", "xorg", "gdm", "sddm", "lightdm", "plasma", "kde", "gnome",
                "mutter", "kwin", "display",
            ]),
            security: to_owned(&[
                "authentication failed",
                "authentication failure",
                "denied",
                "unauthorized",
                "permission denied",
                "security",
                "firewall",
            ]),
            service: to_owned(&["failed", "failure", "exit-code", "dumped core", ".service"]),
        }
    }
}

impl ClassifierRules {
    /// Built-in defaults with any configured per-category overrides applied.
    pub fn from_config(config: &LogConfig) -> Self {
        let mut rules = Self::default();
        let overrides = &config.keywords;

        apply(&mut rules.hardware, &overrides.hardware);
        apply(&mut rules.driver, &overrides.driver);
        apply(&mut rules.gui, &overrides.gui);
        apply(&mut rules.security, &overrides.security);
        apply(&mut rules.service, &overrides.service);

        rules
    }

    fn keywords(&self, category: Category) -> &[String] {
        match category {
            Category::Hardware => &self.hardware,
            Category::Driver => &self.driver,
            Category::Gui => &self.gui,
            Category::Security => &self.security,
            Category::Service => &self.service,
        }
    }

    /// Whether a record belongs in a category. Matching is against the
    /// lowercased message; service membership also considers the unit name,
    /// since a failing unit's message does not always repeat it.
    fn matches(&self, category: Category, record: &LogRecord, message_lower: &str) -> bool {
        let keyword_hit = self
            .keywords(category)
            .iter()
            .any(|kw| message_lower.contains(kw.as_str()));

        match category {
            Category::Service => {
                keyword_hit || (record.unit.is_some() && message_lower.contains("error"))
            }
            Category::Gui => {
                keyword_hit
                    || record
                        .unit
                        .as_deref()
                        .is_some_and(|u| self.gui.iter().any(|kw| u.to_lowercase().contains(kw.as_str())))
            }
            _ => keyword_hit,
        }
    }
}

fn to_owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|s| s.to_string()).collect()
}

fn apply(target: &mut Vec<String>, replacement: &Option<Vec<String>>) {
    if let Some(list) = replacement {
        *target = list.iter().map(|s| s.to_lowercase()).collect();
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Classify records into capped, per-category deduplicated findings.
/// Records are expected most-recent-first; that order is preserved.
pub fn classify(records: &[LogRecord], rules: &ClassifierRules, cap: usize) -> ClassifiedFindings {
    let mut findings = ClassifiedFindings::default();
    let mut seen: [HashSet<String>; Category::ALL.len()] = Default::default();

    for record in records {
        let message_lower = record.message.to_lowercase();

        for (idx, category) in Category::ALL.into_iter().enumerate() {
            if !rules.matches(category, record, &message_lower) {
                continue;
            }

            let key = normalize(&record.message);
            if seen[idx].insert(key) && findings.count(category) < cap {
                findings.push(category, record.clone());
            }
        }
    }

    findings
}

/// Dedup key: case-insensitive, whitespace-collapsed message text.
fn normalize(message: &str) -> String {
    message
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Automated pre-analysis lines embedded into the prompt ahead of the raw
/// samples, one per non-empty category.
pub fn summarize(findings: &ClassifiedFindings) -> Vec<String> {
    let mut lines = Vec::new();

    let count = findings.count(Category::Hardware);
    if count > 0 {
        lines.push(format!(
            "CRITICAL: {} hardware error(s) detected - check system health immediately",
            count
        ));
    }

    let count = findings.count(Category::Driver);
    if count > 0 {
        lines.push(format!(
            "{} driver error(s) detected - may need driver updates or module reload",
            count
        ));
    }

    let count = findings.count(Category::Gui);
    if count > 0 {
        lines.push(format!(
            "{} GUI/display error(s) detected - review display manager and session logs",
            count
        ));
    }

    let count = findings.count(Category::Service);
    if count > 0 {
        lines.push(format!(
            "{} service error(s) detected - review failed services",
            count
        ));
    }

    let count = findings.count(Category::Security);
    if count > 0 {
        lines.push(format!(
            "{} security warning(s) detected - review authentication and access logs",
            count
        ));
    }

    lines
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogSource, Severity};
    use chrono::{Local, TimeZone};
    use proptest::prelude::*;

    fn record_at(
        secs: i64,
        source: LogSource,
        severity: Severity,
        unit: Option<&str>,
        message: &str,
    ) -> LogRecord {
        LogRecord {
            timestamp: Local.timestamp_opt(1_714_560_000 + secs, 0).unwrap(),
            source,
            severity,
            unit: unit.map(str::to_string),
            message: message.to_string(),
        }
    }

    fn system_error(secs: i64, message: &str) -> LogRecord {
        record_at(secs, LogSource::System, Severity::Error, None, message)
    }

    #[test]
    fn test_kernel_drm_warning_lands_in_driver_errors() {
        // The motivating failure mode: GPU faults are kernel-source and
        // warning-severity, and must still be classified as driver errors.
        let records = vec![record_at(
            0,
            LogSource::Kernel,
            Severity::Warning,
            None,
            "[drm:radeon_ib_ring_tests] *ERROR* fence wait timed out",
        )];

        let findings = classify(&records, &ClassifierRules::default(), 20);
        assert_eq!(findings.count(Category::Driver), 1);
    }

    #[test]
    fn test_service_failure_lands_in_service_errors() {
        let records = vec![record_at(
            0,
            LogSource::System,
            Severity::Error,
            Some("nginx.service"),
            "nginx.service: Failed with result 'exit-code'",
        )];

        let findings = classify(&records, &ClassifierRules::default(), 20);
        assert_eq!(findings.count(Category::Service), 1);
        assert_eq!(
            findings.get(Category::Service)[0].unit.as_deref(),
            Some("nginx.service")
        );
    }

    #[test]
    fn test_multi_category_membership() {
        let records = vec![system_error(0, "amdgpu: memory thermal throttling")];
        let findings = classify(&records, &ClassifierRules::default(), 20);

        // Matches both hardware (memory, thermal) and driver (amdgpu).
        assert_eq!(findings.count(Category::Hardware), 1);
        assert_eq!(findings.count(Category::Driver), 1);
    }

    #[test]
    fn test_dedup_within_category_keeps_most_recent() {
        let records = vec![
            system_error(10, "disk I/O error on sda"),
            system_error(0, "Disk   I/O error on   sda"),
        ];
        let findings = classify(&records, &ClassifierRules::default(), 20);

        let hardware = findings.get(Category::Hardware);
        assert_eq!(hardware.len(), 1);
        // First record in most-recent-first input wins.
        assert_eq!(hardware[0].message, "disk I/O error on sda");
    }

    #[test]
    fn test_dedup_never_crosses_categories() {
        // Same normalized text in two categories stays in both.
        let records = vec![system_error(0, "amdgpu firmware memory fault")];
        let findings = classify(&records, &ClassifierRules::default(), 20);

        assert_eq!(findings.count(Category::Driver), 1);
        assert_eq!(findings.count(Category::Hardware), 1);
        assert_eq!(
            findings.get(Category::Driver)[0].message,
            findings.get(Category::Hardware)[0].message
        );
    }

    #[test]
    fn test_cap_and_order_preserved() {
        let records: Vec<LogRecord> = (0..30)
            .map(|i| system_error(30 - i, &format!("disk error number {}", i)))
            .collect();
        let findings = classify(&records, &ClassifierRules::default(), 20);

        let hardware = findings.get(Category::Hardware);
        assert_eq!(hardware.len(), 20);
        // Most-recent-first: input order is preserved, truncated at the cap.
        assert_eq!(hardware[0].message, "disk error number 0");
        assert_eq!(hardware[19].message, "disk error number 19");
        for pair in hardware.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[test]
    fn test_zero_matches_is_valid() {
        let records = vec![system_error(0, "some entirely unremarkable line")];
        let findings = classify(&records, &ClassifierRules::default(), 20);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_gui_match_via_unit_name() {
        let records = vec![record_at(
            0,
            LogSource::System,
            Severity::Warning,
            Some("sddm.service"),
            "Could not start session",
        )];
        let findings = classify(&records, &ClassifierRules::default(), 20);
        assert_eq!(findings.count(Category::Gui), 1);
    }

    #[test]
    fn test_keyword_override_replaces_defaults() {
        let mut config = LogConfig::default();
        config.keywords.hardware = Some(vec!["zfs".to_string()]);
        let rules = ClassifierRules::from_config(&config);

        let records = vec![
            system_error(1, "zfs pool degraded"),
            system_error(0, "disk error"),
        ];
        let findings = classify(&records, &rules, 20);

        let hardware = findings.get(Category::Hardware);
        assert_eq!(hardware.len(), 1);
        assert!(hardware[0].message.contains("zfs"));
    }

    #[test]
    fn test_summarize_counts() {
        let records = vec![
            system_error(2, "disk failure imminent"),
            system_error(1, "authentication failed for user root"),
        ];
        let findings = classify(&records, &ClassifierRules::default(), 20);
        let lines = summarize(&findings);

        assert!(lines.iter().any(|l| l.starts_with("CRITICAL: 1 hardware")));
        assert!(lines.iter().any(|l| l.contains("security warning")));
    }

    #[test]
    fn test_summarize_empty_findings() {
        assert!(summarize(&ClassifiedFindings::default()).is_empty());
    }

    proptest! {
        #[test]
        fn prop_classification_is_deterministic(messages in proptest::collection::vec(".{0,80}", 0..40)) {
            let records: Vec<LogRecord> = messages
                .iter()
                .enumerate()
                .map(|(i, m)| system_error(100 - i as i64, m))
                .collect();
            let rules = ClassifierRules::default();

            let first = classify(&records, &rules, 20);
            let second = classify(&records, &rules, 20);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_category_lengths_bounded_by_cap(
            messages in proptest::collection::vec("[a-z ]{0,40}", 0..60),
            cap in 1usize..10,
        ) {
            let records: Vec<LogRecord> = messages
                .iter()
                .enumerate()
                .map(|(i, m)| system_error(1000 - i as i64, m))
                .collect();
            let findings = classify(&records, &ClassifierRules::default(), cap);

            for category in Category::ALL {
                prop_assert!(findings.count(category) <= cap);
            }
        }
    }
}
