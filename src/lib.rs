//! # Crowdwatch - Crowd Anomaly Detection Core
//!
//! Multi-object person tracking plus edge-triggered anomaly detection for
//! video surveillance streams.
//!
//! The crate covers two layers:
//!
//! - A SORT-style tracker: a constant-velocity Kalman motion model per
//!   person ([`track::KalmanBoxTrack`]), IOU-based frame-to-frame
//!   association with an optimal assignment fallback ([`matching`]), and a
//!   lifecycle manager that issues stable identities ([`Tracker`]).
//! - An anomaly engine consuming tracked identities: overcrowding,
//!   loitering, restricted-zone entry and fight-like motion detectors,
//!   each independently stateful and edge-triggered ([`anomaly`]), with a
//!   subtype/reliability gate and debouncer for the live alerting path
//!   ([`alert`]).
//!
//! Detection and pose inference, video decoding and the network transport
//! are external collaborators; the crate only defines the seams
//! ([`session::PoseSource`]) and the payload shapes ([`event::Event`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! use crowdwatch::{AnalysisConfig, Detection, Session, SessionMode};
//! use crowdwatch::session::NoPose;
//!
//! let config = AnalysisConfig::default();
//! let mut session = Session::new(config, SessionMode::Batch)?;
//!
//! let detections = vec![Detection::new([10.0, 10.0, 50.0, 90.0], 0.9)];
//! let report = session.process_frame(detections, &mut NoPose)?;
//! for track in &report.tracks {
//!     println!("person {} at {:?}", track.id, track.bbox);
//! }
//! ```

pub(crate) mod internal;

pub mod alert;
pub mod anomaly;
pub mod bbox;
pub mod bus;
pub mod config;
pub mod detection;
pub mod event;
pub mod kalman;
pub mod matching;
pub mod session;
pub mod track;
pub mod tracker;
pub mod zone;

// Re-exports for convenience
pub use bbox::BBox;
pub use config::{AnalysisConfig, ConfigPatch};
pub use detection::{Detection, Keypoint, PoseFrame};
pub use event::{Event, EventDetails, EventKind};
pub use session::{Session, SessionMode};
pub use tracker::{TrackedPerson, Tracker};
pub use zone::{Zone, ZoneSet};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the crowdwatch core.
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("zone must have at least 3 points, got {points}")]
        InvalidZone { points: usize },

        #[error("invalid detection: {0}")]
        InvalidDetection(String),

        /// A collaborator (detection or pose backend) failed. Fatal to the
        /// session: the stream should terminate rather than silently degrade.
        #[error("backend failure: {0}")]
        Backend(String),
    }

    /// Result type alias for crowdwatch operations.
    pub type Result<T> = std::result::Result<T, Error>;
}
