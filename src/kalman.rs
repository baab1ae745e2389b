//! Linear Kalman filter used by the box motion model.
//!
//! A standard recursive estimator: predict advances the state through the
//! transition matrix and inflates the covariance by the process noise;
//! update folds a measurement in through the innovation and Kalman gain.

use nalgebra::{DMatrix, DVector};

/// Standard linear Kalman filter over dynamically sized state.
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    /// State dimension.
    pub dim_x: usize,
    /// Measurement dimension.
    pub dim_z: usize,
    /// State vector.
    pub x: DVector<f64>,
    /// State covariance.
    pub p: DMatrix<f64>,
    /// State transition matrix.
    pub f: DMatrix<f64>,
    /// Measurement matrix.
    pub h: DMatrix<f64>,
    /// Measurement noise covariance.
    pub r: DMatrix<f64>,
    /// Process noise covariance.
    pub q: DMatrix<f64>,
}

impl KalmanFilter {
    /// Create a filter with identity dynamics and an H matrix observing the
    /// first `dim_z` state components.
    pub fn new(dim_x: usize, dim_z: usize) -> Self {
        let mut h = DMatrix::zeros(dim_z, dim_x);
        for i in 0..dim_z.min(dim_x) {
            h[(i, i)] = 1.0;
        }

        Self {
            dim_x,
            dim_z,
            x: DVector::zeros(dim_x),
            p: DMatrix::identity(dim_x, dim_x),
            f: DMatrix::identity(dim_x, dim_x),
            h,
            r: DMatrix::identity(dim_z, dim_z),
            q: DMatrix::identity(dim_x, dim_x),
        }
    }

    /// Advance the state estimate one step: `x = F x`, `P = F P Fᵀ + Q`.
    pub fn predict(&mut self) {
        self.x = &self.f * &self.x;
        self.p = &self.f * &self.p * self.f.transpose() + &self.q;
    }

    /// Correct the estimate with a measurement `z`.
    pub fn update(&mut self, z: &DVector<f64>) {
        // Innovation and its covariance
        let y = z - &self.h * &self.x;
        let s = &self.h * &self.p * self.h.transpose() + &self.r;

        // Kalman gain; a singular S falls back to identity rather than
        // poisoning the state with NaNs
        let si = s
            .try_inverse()
            .unwrap_or_else(|| DMatrix::identity(self.dim_z, self.dim_z));
        let k = &self.p * self.h.transpose() * si;

        self.x = &self.x + &k * y;

        let i = DMatrix::identity(self.dim_x, self.dim_x);
        self.p = (i - &k * &self.h) * &self.p;
    }
}
