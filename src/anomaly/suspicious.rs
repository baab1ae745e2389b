//! Suspicious-activity detection from pose keypoint motion.
//!
//! Joint velocities are pixel displacements between consecutive pose
//! frames, weighted by visibility. Fight-like motion shows up as a high
//! peak velocity spread across many joints, or as violent arm motion.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;

use crate::detection::{PoseFrame, ARM_KEYPOINTS};
use crate::event::SuspiciousActivityReport;

/// Maximum pose frames buffered per track.
const MAX_POSE_HISTORY: usize = 100;

/// Detects fight-like motion per track from buffered pose frames.
///
/// Alerts are edge-triggered per track id.
#[derive(Debug)]
pub struct SuspiciousActivityDetector {
    velocity_threshold: f64,
    min_frames: usize,

    history: HashMap<u64, VecDeque<PoseFrame>>,
    suspicious_tracks: HashSet<u64>,
}

impl SuspiciousActivityDetector {
    pub fn new(velocity_threshold: f64, min_frames: usize) -> Self {
        Self {
            velocity_threshold,
            min_frames,
            history: HashMap::new(),
            suspicious_tracks: HashSet::new(),
        }
    }

    pub fn velocity_threshold(&self) -> f64 {
        self.velocity_threshold
    }

    pub fn set_velocity_threshold(&mut self, threshold: f64) {
        self.velocity_threshold = threshold;
    }

    /// Buffer one pose frame for a track.
    pub fn observe(&mut self, track_id: u64, keypoints: PoseFrame) {
        let frames = self.history.entry(track_id).or_default();
        frames.push_back(keypoints);
        while frames.len() > MAX_POSE_HISTORY {
            frames.pop_front();
        }
    }

    /// Number of pose frames currently buffered for a track.
    pub fn buffered_frames(&self, track_id: u64) -> usize {
        self.history.get(&track_id).map_or(0, |f| f.len())
    }

    /// Evaluate a track's buffered poses. `velocity_threshold` overrides
    /// the stored configuration for this call only.
    pub fn detect(&mut self, track_id: u64, velocity_threshold: Option<f64>) -> SuspiciousActivityReport {
        let threshold = velocity_threshold.unwrap_or(self.velocity_threshold);

        let frames = self.history.get(&track_id);
        let buffered = frames.map_or(0, |f| f.len());

        if buffered < self.min_frames {
            return SuspiciousActivityReport {
                is_suspicious: false,
                track_id,
                max_velocity: 0.0,
                mean_velocity: 0.0,
                arm_velocity: 0.0,
                frac_exceed: 0.0,
                frames_analyzed: buffered,
                alert_triggered: false,
                activity_type: "normal".to_string(),
                subtype: None,
                nearest_distance: None,
                reliability: None,
            };
        }

        let window: Vec<&PoseFrame> = frames
            .into_iter()
            .flatten()
            .skip(buffered - self.min_frames)
            .collect();

        let velocities = joint_velocities(&window, None);
        let max_velocity = velocities.iter().copied().fold(0.0, f64::max);
        let mean_velocity = mean(&velocities);
        let frac_exceed = if velocities.is_empty() {
            0.0
        } else {
            velocities.iter().filter(|&&v| v > threshold).count() as f64 / velocities.len() as f64
        };

        let arm_velocity = mean(&joint_velocities(&window, Some(&ARM_KEYPOINTS)));

        // Broad-motion clause: high peak and mean with enough joints
        // participating. Arm clause: violent arm motion with some spread.
        let is_suspicious = (max_velocity > threshold * 1.2
            && mean_velocity > threshold * 0.6
            && frac_exceed >= 0.25)
            || (arm_velocity > threshold * 1.4 && frac_exceed >= 0.2);

        let alert_triggered = if is_suspicious && !self.suspicious_tracks.contains(&track_id) {
            self.suspicious_tracks.insert(track_id);
            warn!(
                track_id,
                max_velocity, arm_velocity, "suspicious activity detected"
            );
            true
        } else {
            if !is_suspicious {
                self.suspicious_tracks.remove(&track_id);
            }
            false
        };

        SuspiciousActivityReport {
            is_suspicious,
            track_id,
            max_velocity,
            mean_velocity,
            arm_velocity,
            frac_exceed,
            frames_analyzed: buffered,
            alert_triggered,
            activity_type: if is_suspicious { "fight_like" } else { "normal" }.to_string(),
            subtype: None,
            nearest_distance: None,
            reliability: None,
        }
    }

    /// Drop pose history and edge state for tracks no longer alive.
    pub fn cleanup(&mut self, active_track_ids: &[u64]) {
        let active: HashSet<u64> = active_track_ids.iter().copied().collect();
        self.history.retain(|id, _| active.contains(id));
        self.suspicious_tracks.retain(|id| active.contains(id));
    }
}

/// Visibility-weighted joint velocities over consecutive frame pairs.
///
/// With `joints = None`, every joint contributes one value per transition;
/// otherwise only the listed joint indices do.
fn joint_velocities(window: &[&PoseFrame], joints: Option<&[usize]>) -> Vec<f64> {
    if window.len() < 2 {
        return Vec::new();
    }

    let mut velocities = Vec::new();
    for pair in window.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        let indices: Vec<usize> = match joints {
            Some(list) => list.iter().copied().filter(|&j| j < prev.len()).collect(),
            None => (0..prev.len().min(curr.len())).collect(),
        };
        for j in indices {
            if j >= curr.len() {
                continue;
            }
            let dist = prev[j].distance(&curr[j]);
            let visibility = (prev[j].visibility + curr[j].visibility) / 2.0;
            velocities.push(dist * visibility);
        }
    }
    velocities
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Keypoint, POSE_KEYPOINT_COUNT};
    use approx::assert_relative_eq;

    /// A full pose frame with every joint at `(x, y)`.
    fn static_pose(x: f64, y: f64) -> PoseFrame {
        (0..POSE_KEYPOINT_COUNT)
            .map(|_| Keypoint::new(x, y, 1.0))
            .collect()
    }

    /// A fighting stance: arm joints plus one hip joint at `(x, y)`, the
    /// rest of the body at the origin. Seven moving joints out of 33 keeps
    /// the exceed fraction just above the arm-clause floor of 0.2.
    fn arms_at(x: f64, y: f64) -> PoseFrame {
        (0..POSE_KEYPOINT_COUNT)
            .map(|j| {
                if ARM_KEYPOINTS.contains(&j) || j == 23 {
                    Keypoint::new(x, y, 1.0)
                } else {
                    Keypoint::new(0.0, 0.0, 1.0)
                }
            })
            .collect()
    }

    // ===== Insufficient data =====

    #[test]
    fn test_too_few_frames() {
        let mut det = SuspiciousActivityDetector::new(15.0, 10);
        for _ in 0..5 {
            det.observe(1, static_pose(100.0, 100.0));
        }
        let r = det.detect(1, None);
        assert!(!r.is_suspicious);
        assert_eq!(r.frames_analyzed, 5);
    }

    // ===== Static vs violent motion =====

    #[test]
    fn test_static_pose_not_suspicious() {
        let mut det = SuspiciousActivityDetector::new(15.0, 10);
        for _ in 0..20 {
            det.observe(1, static_pose(100.0, 100.0));
        }
        let r = det.detect(1, None);
        assert!(!r.is_suspicious);
        assert_relative_eq!(r.max_velocity, 0.0);
        assert_eq!(r.activity_type, "normal");
    }

    #[test]
    fn test_fast_arm_motion_is_suspicious() {
        let mut det = SuspiciousActivityDetector::new(15.0, 10);
        // Arms swinging 60 px per frame, far beyond threshold*1.4
        for i in 0..12 {
            let x = if i % 2 == 0 { 0.0 } else { 60.0 };
            det.observe(1, arms_at(x, 0.0));
        }
        let r = det.detect(1, None);
        assert!(r.is_suspicious);
        assert!(r.alert_triggered);
        assert_eq!(r.activity_type, "fight_like");
        assert!(r.arm_velocity > 15.0 * 1.4);
    }

    #[test]
    fn test_whole_body_fast_motion_is_suspicious() {
        let mut det = SuspiciousActivityDetector::new(15.0, 10);
        for i in 0..12 {
            let x = 40.0 * i as f64;
            det.observe(1, static_pose(x, 0.0));
        }
        let r = det.detect(1, None);
        assert!(r.is_suspicious);
        // All joints move identically: full spread
        assert_relative_eq!(r.frac_exceed, 1.0);
    }

    // ===== Visibility weighting =====

    #[test]
    fn test_invisible_joints_do_not_count() {
        let mut det = SuspiciousActivityDetector::new(15.0, 10);
        // Large displacements but zero visibility: weighted velocity is 0
        for i in 0..12 {
            let frame: PoseFrame = (0..POSE_KEYPOINT_COUNT)
                .map(|_| Keypoint::new(100.0 * i as f64, 0.0, 0.0))
                .collect();
            det.observe(1, frame);
        }
        let r = det.detect(1, None);
        assert!(!r.is_suspicious);
        assert_relative_eq!(r.max_velocity, 0.0);
    }

    // ===== Edge triggering =====

    #[test]
    fn test_edge_triggered_per_track() {
        let mut det = SuspiciousActivityDetector::new(15.0, 10);
        for i in 0..12 {
            let x = if i % 2 == 0 { 0.0 } else { 60.0 };
            det.observe(1, arms_at(x, 0.0));
        }
        assert!(det.detect(1, None).alert_triggered);

        // Still suspicious next frame: no new edge
        det.observe(1, arms_at(0.0, 0.0));
        let r = det.detect(1, None);
        if r.is_suspicious {
            assert!(!r.alert_triggered);
        }

        // Calm down long enough to clear, then flare up again
        for _ in 0..20 {
            det.observe(1, static_pose(0.0, 0.0));
        }
        assert!(!det.detect(1, None).is_suspicious);
        for i in 0..12 {
            let x = if i % 2 == 0 { 0.0 } else { 60.0 };
            det.observe(1, arms_at(x, 0.0));
        }
        assert!(det.detect(1, None).alert_triggered);
    }

    // ===== Per-call override =====

    #[test]
    fn test_threshold_override() {
        let mut det = SuspiciousActivityDetector::new(1000.0, 10);
        for i in 0..12 {
            let x = 40.0 * i as f64;
            det.observe(1, static_pose(x, 0.0));
        }
        assert!(!det.detect(1, None).is_suspicious);
        assert!(det.detect(1, Some(15.0)).is_suspicious);
    }

    // ===== Buffer bounding and cleanup =====

    #[test]
    fn test_pose_history_bounded() {
        let mut det = SuspiciousActivityDetector::new(15.0, 10);
        for _ in 0..500 {
            det.observe(1, static_pose(0.0, 0.0));
        }
        assert_eq!(det.buffered_frames(1), MAX_POSE_HISTORY);
    }

    #[test]
    fn test_cleanup_drops_dead_tracks() {
        let mut det = SuspiciousActivityDetector::new(15.0, 10);
        for _ in 0..12 {
            det.observe(1, static_pose(0.0, 0.0));
            det.observe(2, static_pose(0.0, 0.0));
        }
        det.cleanup(&[2]);
        assert_eq!(det.buffered_frames(1), 0);
        assert_eq!(det.buffered_frames(2), 12);
    }
}
