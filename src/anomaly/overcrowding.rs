//! Overcrowding detection: people count against a configurable threshold.

use tracing::{info, warn};

use crate::event::{OvercrowdingReport, Severity};

/// Flags frames where the tracked-person count exceeds a threshold.
///
/// The alert is edge-triggered on a single detector-wide boolean: it fires
/// on the frame the count first crosses the threshold and stays silent
/// until the condition has cleared and crossed again.
#[derive(Debug)]
pub struct OvercrowdingDetector {
    threshold: u32,
    alert_active: bool,
}

impl OvercrowdingDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            alert_active: false,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold;
        info!(threshold, "overcrowding threshold updated");
    }

    /// Evaluate the current frame's person count. `threshold` overrides the
    /// stored configuration for this call only.
    pub fn detect(&mut self, count: usize, threshold: Option<u32>) -> OvercrowdingReport {
        let active_threshold = threshold.unwrap_or(self.threshold);
        let is_overcrowded = count > active_threshold as usize;

        let alert_triggered = is_overcrowded && !self.alert_active;
        if alert_triggered {
            warn!(count, threshold = active_threshold, "overcrowding detected");
        }
        self.alert_active = is_overcrowded;

        OvercrowdingReport {
            is_overcrowded,
            current_count: count,
            threshold: active_threshold,
            alert_triggered,
            severity: severity(count, active_threshold),
        }
    }
}

fn severity(count: usize, threshold: u32) -> Severity {
    if count <= threshold as usize {
        return Severity::None;
    }
    let ratio = count as f64 / threshold as f64;
    if ratio <= 1.2 {
        Severity::Low
    } else if ratio <= 1.5 {
        Severity::Medium
    } else {
        Severity::High
    }
}
