//! Restricted-zone violation detection.

use std::collections::HashSet;

use tracing::warn;

use crate::event::ZoneViolationReport;
use crate::zone::ZoneSet;
use crate::Result;

/// Flags tracks whose center point lies inside any configured zone.
///
/// Alerts are edge-triggered per track id: entering any zone fires once,
/// re-entering after a full exit fires again.
#[derive(Debug, Default)]
pub struct ZoneViolationDetector {
    zones: ZoneSet,
    violating_tracks: HashSet<u64>,
}

impl ZoneViolationDetector {
    pub fn new(zones: ZoneSet) -> Self {
        Self {
            zones,
            violating_tracks: HashSet::new(),
        }
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    /// Add one zone; fewer than three vertices is an error for the caller
    /// to log and skip.
    pub fn add_zone(&mut self, points: Vec<[f64; 2]>) -> Result<()> {
        self.zones.add(points)
    }

    pub fn remove_zone(&mut self, index: usize) {
        self.zones.remove(index);
    }

    /// Drop all zones and the per-track edge state.
    pub fn clear_zones(&mut self) {
        self.zones.clear();
        self.violating_tracks.clear();
    }

    /// Evaluate one track's center point. `zones` overrides the stored set
    /// for this call only.
    pub fn detect(
        &mut self,
        track_id: u64,
        point: (f64, f64),
        zones: Option<&ZoneSet>,
    ) -> ZoneViolationReport {
        let active_zones = zones.unwrap_or(&self.zones);

        if active_zones.is_empty() {
            return ZoneViolationReport {
                is_violation: false,
                violated_zones: Vec::new(),
                point,
                alert_triggered: false,
                track_id,
            };
        }

        let violated_zones = active_zones.containing(point.0, point.1);
        let is_violation = !violated_zones.is_empty();

        let alert_triggered = if is_violation && !self.violating_tracks.contains(&track_id) {
            self.violating_tracks.insert(track_id);
            warn!(track_id, ?point, "zone violation detected");
            true
        } else {
            if !is_violation {
                self.violating_tracks.remove(&track_id);
            }
            false
        };

        ZoneViolationReport {
            is_violation,
            violated_zones,
            point,
            alert_triggered,
            track_id,
        }
    }

    /// Drop edge state for tracks no longer alive.
    pub fn cleanup(&mut self, active_track_ids: &[u64]) {
        let active: HashSet<u64> = active_track_ids.iter().copied().collect();
        self.violating_tracks.retain(|id| active.contains(id));
    }
}
