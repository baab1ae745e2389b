//! Anomaly detection over tracker output.
//!
//! Four independent stateful detectors, evaluated once per frame
//! (overcrowding) or once per active track (the rest). The engine owns
//! them, drives the per-frame scan and keeps their per-track state pruned
//! to the live track set.

mod loitering;
mod overcrowding;
mod suspicious;
mod zone_violation;

pub use loitering::LoiteringDetector;
pub use overcrowding::OvercrowdingDetector;
pub use suspicious::SuspiciousActivityDetector;
pub use zone_violation::ZoneViolationDetector;

use tracing::warn;

use crate::config::AnalysisConfig;
use crate::event::{
    LoiteringReport, OvercrowdingReport, SuspiciousActivityReport, ZoneViolationReport,
};
use crate::session::PoseSource;
use crate::tracker::TrackedPerson;
use crate::Result;

/// Raw detector output for one frame, before any alert policy is applied.
#[derive(Debug, Clone, Default)]
pub struct FrameScan {
    pub overcrowding: Option<OvercrowdingReport>,
    pub loitering: Vec<LoiteringReport>,
    pub zones: Vec<ZoneViolationReport>,
    /// Suspicious-activity reports for the tracks evaluated this frame
    /// (evaluation runs on a frame cadence, not every frame).
    pub activity: Vec<SuspiciousActivityReport>,
}

/// Owns the four anomaly detectors for one session.
#[derive(Debug)]
pub struct AnomalyEngine {
    pub overcrowding: OvercrowdingDetector,
    pub loitering: LoiteringDetector,
    pub zones: ZoneViolationDetector,
    pub suspicious: SuspiciousActivityDetector,
}

impl AnomalyEngine {
    /// Build the detectors from a validated configuration. Zones with too
    /// few vertices are logged and skipped rather than failing the build.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let mut engine = Self {
            overcrowding: OvercrowdingDetector::new(config.overcrowding_threshold),
            loitering: LoiteringDetector::new(
                config.loitering_distance,
                config.loitering_time,
                config.fps,
            ),
            zones: ZoneViolationDetector::default(),
            suspicious: SuspiciousActivityDetector::new(config.velocity_threshold, 10),
        };
        engine.replace_zones(&config.restricted_zones);
        engine
    }

    /// Replace the restricted-zone set, skipping degenerate zones.
    pub fn replace_zones(&mut self, zones: &[Vec<[f64; 2]>]) {
        self.zones.clear_zones();
        for zone in zones {
            if let Err(err) = self.zones.add_zone(zone.clone()) {
                warn!(%err, "skipping invalid restricted zone");
            }
        }
    }

    /// Evaluate all detectors against this frame's tracks.
    ///
    /// Pose frames are buffered every frame; the suspicious-activity
    /// statistics only run every `activity_interval` frames. A pose-source
    /// error aborts the scan (collaborator failure is fatal to the
    /// session); a `None` pose just skips that track this frame.
    pub fn scan<P: PoseSource>(
        &mut self,
        frame: u64,
        tracks: &[TrackedPerson],
        activity_interval: u64,
        poses: &mut P,
    ) -> Result<FrameScan> {
        let mut scan = FrameScan {
            overcrowding: Some(self.overcrowding.detect(tracks.len(), None)),
            ..FrameScan::default()
        };

        let check_activity = activity_interval > 0 && frame % activity_interval == 0;
        let active_ids: Vec<u64> = tracks.iter().map(|t| t.id).collect();

        for track in tracks {
            let center = track.center();

            self.loitering.observe(track.id, center, frame);
            scan.loitering.push(self.loitering.detect(track.id, None, None));

            scan.zones.push(self.zones.detect(track.id, center, None));

            if let Some(pose) = poses.pose_for(track)? {
                self.suspicious.observe(track.id, pose);
                if check_activity {
                    scan.activity.push(self.suspicious.detect(track.id, None));
                }
            }
        }

        self.loitering.cleanup(&active_ids);
        self.suspicious.cleanup(&active_ids);
        self.zones.cleanup(&active_ids);

        Ok(scan)
    }
}
