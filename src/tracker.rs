//! Track manager: owns the live track set, drives the per-frame
//! predict → associate → update → lifecycle cycle and issues identities.

use serde::Serialize;
use tracing::debug;

use crate::bbox::BBox;
use crate::detection::Detection;
use crate::matching::associate;
use crate::track::KalmanBoxTrack;

/// One row of the tracker's per-frame output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackedPerson {
    pub id: u64,
    pub bbox: BBox,
    pub confidence: f64,
}

impl TrackedPerson {
    /// Center point of the tracked box.
    pub fn center(&self) -> (f64, f64) {
        self.bbox.center()
    }
}

/// Multi-object tracker over person detections.
///
/// One instance per logical stream; the identity counter is instance state,
/// so concurrent sessions never collide. Identities are strictly increasing
/// and never reused within a session.
#[derive(Debug)]
pub struct Tracker {
    /// Frames a track survives without a match before removal.
    pub max_age: u32,
    /// Consecutive matches required before a track is reported.
    pub min_hits: u32,
    /// Minimum IOU for a detection/track pairing.
    pub iou_threshold: f64,

    tracks: Vec<KalmanBoxTrack>,
    frame_count: u64,
    next_id: u64,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(30, 3, 0.3)
    }
}

impl Tracker {
    pub fn new(max_age: u32, min_hits: u32, iou_threshold: f64) -> Self {
        Self {
            max_age,
            min_hits,
            iou_threshold,
            tracks: Vec::new(),
            frame_count: 0,
            next_id: 0,
        }
    }

    /// Process one frame of detections and return the confirmed tracks.
    ///
    /// Tracks are reported while freshly matched (`time_since_update < 1`)
    /// and either confirmed (`hit_streak >= min_hits`) or inside the
    /// startup grace window of the first `min_hits` frames.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedPerson> {
        self.frame_count += 1;

        // Predict every live track; tracks whose state went non-finite are
        // dropped before association rather than surfacing an error
        let mut predicted: Vec<BBox> = Vec::with_capacity(self.tracks.len());
        let mut finite = Vec::with_capacity(self.tracks.len());
        for track in &mut self.tracks {
            let bbox = track.predict();
            if bbox.is_finite() && track.is_finite() {
                predicted.push(bbox);
                finite.push(true);
            } else {
                debug!(track_id = track.id, "dropping track with non-finite state");
                finite.push(false);
            }
        }
        let mut idx = 0;
        self.tracks.retain(|_| {
            let kept = finite[idx];
            idx += 1;
            kept
        });

        let det_boxes: Vec<BBox> = detections.iter().map(|d| d.bbox).collect();
        let assoc = associate(&det_boxes, &predicted, self.iou_threshold);

        for (det_idx, trk_idx) in assoc.matches {
            self.tracks[trk_idx].update(&detections[det_idx]);
        }

        for det_idx in assoc.unmatched_detections {
            let id = self.next_id;
            self.next_id += 1;
            self.tracks.push(KalmanBoxTrack::new(id, &detections[det_idx]));
        }

        let output: Vec<TrackedPerson> = self
            .tracks
            .iter()
            .filter(|t| {
                t.time_since_update < 1
                    && (t.hit_streak >= self.min_hits
                        || self.frame_count <= u64::from(self.min_hits))
            })
            .map(|t| TrackedPerson {
                id: t.id,
                bbox: t.bbox(),
                confidence: t.confidence,
            })
            .collect();

        // Prune dead tracklets; this fires exactly once per track, on the
        // first frame time_since_update reaches max_age
        let max_age = self.max_age;
        self.tracks.retain(|t| t.time_since_update < max_age);

        output
    }

    /// Number of tracks currently alive (matched or still aging).
    pub fn live_track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Total identities issued so far.
    pub fn issued_ids(&self) -> u64 {
        self.next_id
    }

    /// Frames processed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
