//! Metrics collection for expiry sweeps

use std::collections::BTreeMap;
use temper_domain::RetentionClass;

/// Outcome of a single sweep tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records looked at
    pub examined: usize,

    /// Expired entries removed from disk and from the store
    pub deleted: usize,

    /// Expired records whose target was already gone
    pub vanished: usize,

    /// Expired entries that could not be deleted and stay tracked
    pub failed: usize,

    /// Expired entries left alone because of dry-run mode
    pub skipped: usize,
}

impl SweepReport {
    /// Number of records this tick dropped from the store
    pub fn removed(&self) -> usize {
        self.deleted + self.vanished
    }
}

/// Cumulative metrics across sweep ticks
///
/// Tracks entries deleted per class, self-healed records and failures.
#[derive(Debug, Clone, Default)]
pub struct SweepMetrics {
    /// Entries deleted per class
    pub deleted: BTreeMap<RetentionClass, usize>,

    /// Records dropped because their target had vanished, per class
    pub vanished: BTreeMap<RetentionClass, usize>,

    /// Deletion attempts that failed and will be retried
    pub failed: usize,

    /// Records examined over all sweeps
    pub examined: usize,

    /// Total sweep iterations completed
    pub sweep_count: usize,

    /// Total runtime in milliseconds
    pub total_runtime_ms: u64,
}

impl SweepMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deleted entry
    pub fn record_deletion(&mut self, class: RetentionClass) {
        *self.deleted.entry(class).or_insert(0) += 1;
    }

    /// Record a record whose target was already gone
    pub fn record_vanished(&mut self, class: RetentionClass) {
        *self.vanished.entry(class).or_insert(0) += 1;
    }

    /// Record a failed deletion
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Record a sweep cycle completion
    pub fn record_sweep(&mut self, report: &SweepReport, runtime_ms: u64) {
        self.sweep_count += 1;
        self.examined += report.examined;
        self.total_runtime_ms += runtime_ms;
    }

    /// Get total entries deleted across all classes
    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum()
    }

    /// Get total vanished records across all classes
    pub fn total_vanished(&self) -> usize {
        self.vanished.values().sum()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Sweep Metrics Summary".to_string(),
            "=====================".to_string(),
            format!("Sweep cycles: {}", self.sweep_count),
            format!("Records examined: {}", self.examined),
            format!("Total runtime: {}ms", self.total_runtime_ms),
            format!("Failed deletions: {}", self.failed),
            String::new(),
        ];

        if !self.deleted.is_empty() {
            lines.push("Deletions by class:".to_string());
            for (class, count) in &self.deleted {
                lines.push(format!("  {}: {}", class, count));
            }
            lines.push(format!("  Total: {}", self.total_deleted()));
            lines.push(String::new());
        }

        if !self.vanished.is_empty() {
            lines.push("Vanished targets by class:".to_string());
            for (class, count) in &self.vanished {
                lines.push(format!("  {}: {}", class, count));
            }
            lines.push(format!("  Total: {}", self.total_vanished()));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = SweepMetrics::new();
        assert_eq!(metrics.total_deleted(), 0);
        assert_eq!(metrics.total_vanished(), 0);
        assert_eq!(metrics.sweep_count, 0);
    }

    #[test]
    fn test_record_deletion() {
        let mut metrics = SweepMetrics::new();
        metrics.record_deletion(RetentionClass::Daily);
        metrics.record_deletion(RetentionClass::Weekly);
        metrics.record_deletion(RetentionClass::Daily);

        assert_eq!(metrics.deleted[&RetentionClass::Daily], 2);
        assert_eq!(metrics.deleted[&RetentionClass::Weekly], 1);
        assert_eq!(metrics.total_deleted(), 3);
    }

    #[test]
    fn test_record_sweep() {
        let mut metrics = SweepMetrics::new();
        let report = SweepReport {
            examined: 4,
            deleted: 1,
            ..Default::default()
        };
        metrics.record_sweep(&report, 15);
        metrics.record_sweep(&report, 5);

        assert_eq!(metrics.sweep_count, 2);
        assert_eq!(metrics.examined, 8);
        assert_eq!(metrics.total_runtime_ms, 20);
    }

    #[test]
    fn test_reset() {
        let mut metrics = SweepMetrics::new();
        metrics.record_deletion(RetentionClass::Monthly);
        metrics.record_failure();
        metrics.record_sweep(&SweepReport::default(), 1);

        metrics.reset();

        assert_eq!(metrics.total_deleted(), 0);
        assert_eq!(metrics.failed, 0);
        assert_eq!(metrics.sweep_count, 0);
    }

    #[test]
    fn test_summary() {
        let mut metrics = SweepMetrics::new();
        metrics.record_deletion(RetentionClass::Daily);
        metrics.record_vanished(RetentionClass::Weekly);
        metrics.record_failure();
        metrics.record_sweep(&SweepReport { examined: 3, ..Default::default() }, 120);

        let summary = metrics.summary();
        assert!(summary.contains("Sweep cycles: 1"));
        assert!(summary.contains("Records examined: 3"));
        assert!(summary.contains("Total runtime: 120ms"));
        assert!(summary.contains("Failed deletions: 1"));
        assert!(summary.contains("daily: 1"));
        assert!(summary.contains("weekly: 1"));
    }
}
