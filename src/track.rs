//! Per-identity motion model: a Kalman-filtered bounding box with the
//! lifecycle counters the track manager drives.

use nalgebra::{DMatrix, DVector};

use crate::bbox::BBox;
use crate::detection::Detection;
use crate::kalman::KalmanFilter;

/// State layout indices: `[cx, cy, s, r, vcx, vcy, vs]`.
///
/// Center position, box area and aspect ratio are observed; the center and
/// area carry modeled velocities, the aspect ratio does not.
const DIM_X: usize = 7;
const DIM_Z: usize = 4;
const IDX_AREA: usize = 2;
const IDX_AREA_VEL: usize = 6;

/// A single tracked person: constant-velocity Kalman estimate over the box
/// observation space plus match bookkeeping.
#[derive(Debug, Clone)]
pub struct KalmanBoxTrack {
    kf: KalmanFilter,
    /// Process-unique identity, issued by the tracker, never reused.
    pub id: u64,
    /// Total successful updates.
    pub hits: u32,
    /// Consecutive successful updates.
    pub hit_streak: u32,
    /// Frames since the last successful update.
    pub time_since_update: u32,
    /// Frames since creation.
    pub age: u32,
    /// Confidence of the most recent matched detection.
    pub confidence: f64,
}

impl KalmanBoxTrack {
    /// Create a track seeded with a detection.
    pub fn new(id: u64, detection: &Detection) -> Self {
        let mut kf = KalmanFilter::new(DIM_X, DIM_Z);

        // Constant-velocity transition: positions and area advance by their
        // velocity, aspect ratio and the velocities themselves persist.
        kf.f = DMatrix::from_row_slice(
            DIM_X,
            DIM_X,
            &[
                1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, //
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
            ],
        );

        // Measurement noise on the observed box; velocities start with a
        // wide prior so the first few updates pin them down.
        kf.r *= 10.0;
        for i in DIM_Z..DIM_X {
            kf.p[(i, i)] *= 1000.0;
        }
        kf.p *= 10.0;
        kf.q[(IDX_AREA_VEL, IDX_AREA_VEL)] *= 0.01;
        for i in DIM_Z..DIM_X {
            kf.q[(i, i)] *= 0.01;
        }

        let obs = detection.bbox.to_observation();
        for (i, v) in obs.iter().enumerate() {
            kf.x[i] = *v;
        }

        Self {
            kf,
            id,
            hits: 0,
            hit_streak: 0,
            time_since_update: 0,
            age: 0,
            confidence: detection.confidence,
        }
    }

    /// Advance the motion model one frame and return the predicted box.
    ///
    /// If the projected area would go non-positive the area velocity is
    /// zeroed first, which keeps the state out of negative-area territory.
    pub fn predict(&mut self) -> BBox {
        if self.kf.x[IDX_AREA_VEL] + self.kf.x[IDX_AREA] <= 0.0 {
            self.kf.x[IDX_AREA_VEL] = 0.0;
        }
        self.kf.predict();

        self.age += 1;
        if self.time_since_update > 0 {
            self.hit_streak = 0;
        }
        self.time_since_update += 1;

        self.bbox()
    }

    /// Fold a matched detection into the estimate.
    pub fn update(&mut self, detection: &Detection) {
        self.time_since_update = 0;
        self.hits += 1;
        self.hit_streak += 1;
        self.confidence = detection.confidence;

        let obs = detection.bbox.to_observation();
        let z = DVector::from_row_slice(&obs);
        self.kf.update(&z);
    }

    /// Current bounding-box estimate.
    pub fn bbox(&self) -> BBox {
        BBox::from_observation(self.kf.x.as_slice())
    }

    /// Whether the estimated state is entirely finite. Tracks that blow up
    /// numerically are dropped by the manager before association.
    pub fn is_finite(&self) -> bool {
        self.kf.x.iter().all(|v| v.is_finite())
    }
}
