//! Input types produced by the external detection and pose collaborators.

use serde::{Deserialize, Serialize};

use crate::bbox::BBox;

/// Number of keypoints per pose frame (full-body landmark model).
pub const POSE_KEYPOINT_COUNT: usize = 33;

/// Keypoint indices covering shoulders, elbows and wrists, used by the
/// fight-like motion heuristic.
pub const ARM_KEYPOINTS: [usize; 6] = [11, 12, 13, 14, 15, 16];

/// A single person detection for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: impl Into<BBox>, confidence: f64) -> Self {
        Self {
            bbox: bbox.into(),
            confidence,
        }
    }
}

/// One estimated body-joint location in original-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// Visibility confidence in `[0, 1]`.
    pub visibility: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }

    /// Euclidean pixel distance to another keypoint.
    pub fn distance(&self, other: &Keypoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A fixed-size array of keypoints extracted from one person crop in one
/// frame. The pose collaborator either yields a full frame or nothing.
pub type PoseFrame = Vec<Keypoint>;
