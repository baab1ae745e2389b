//! Anomaly event payloads emitted toward the transport layer.
//!
//! Events are a tagged union: one variant per event type, each with its own
//! detail fields, serialized uniformly as
//! `{event_type, frame_number, timestamp, track_id, details, snapshot}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminant of the four anomaly event families. Also the debounce and
/// summary-breakdown key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Overcrowding,
    Loitering,
    ZoneViolation,
    SuspiciousActivity,
}

/// Overcrowding severity bucketed by `count / threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

/// Classified subtype of a suspicious-activity candidate (live path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivitySubtype {
    Fight,
    Intimacy,
    Cruelty,
    Suspicious,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvercrowdingReport {
    pub is_overcrowded: bool,
    pub current_count: usize,
    pub threshold: u32,
    pub alert_triggered: bool,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoiteringReport {
    pub is_loitering: bool,
    pub track_id: u64,
    pub duration_frames: usize,
    pub duration_seconds: f64,
    pub movement_distance: f64,
    pub alert_triggered: bool,
    /// Most recent sampled position, when any history exists.
    pub position: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneViolationReport {
    pub is_violation: bool,
    /// Indices of every zone containing the point, in zone-set order.
    pub violated_zones: Vec<usize>,
    pub point: (f64, f64),
    pub alert_triggered: bool,
    pub track_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousActivityReport {
    pub is_suspicious: bool,
    pub track_id: u64,
    pub max_velocity: f64,
    pub mean_velocity: f64,
    pub arm_velocity: f64,
    /// Fraction of joint transitions exceeding the velocity threshold.
    pub frac_exceed: f64,
    pub frames_analyzed: usize,
    pub alert_triggered: bool,
    /// `"fight_like"` when suspicious, `"normal"` otherwise.
    pub activity_type: String,
    /// Live-path enrichment; absent on the batch path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<ActivitySubtype>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reliability: Option<f64>,
}

/// Per-event detail payload, tagged by event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "details", rename_all = "snake_case")]
pub enum EventDetails {
    Overcrowding(OvercrowdingReport),
    Loitering(LoiteringReport),
    ZoneViolation(ZoneViolationReport),
    SuspiciousActivity(SuspiciousActivityReport),
}

impl EventDetails {
    pub fn kind(&self) -> EventKind {
        match self {
            EventDetails::Overcrowding(_) => EventKind::Overcrowding,
            EventDetails::Loitering(_) => EventKind::Loitering,
            EventDetails::ZoneViolation(_) => EventKind::ZoneViolation,
            EventDetails::SuspiciousActivity(_) => EventKind::SuspiciousActivity,
        }
    }

    /// Track the event concerns, if it is per-track.
    pub fn track_id(&self) -> Option<u64> {
        match self {
            EventDetails::Overcrowding(_) => None,
            EventDetails::Loitering(r) => Some(r.track_id),
            EventDetails::ZoneViolation(r) => Some(r.track_id),
            EventDetails::SuspiciousActivity(r) => Some(r.track_id),
        }
    }
}

/// One emitted anomaly event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub frame_number: u64,
    pub timestamp: DateTime<Utc>,
    pub track_id: Option<u64>,
    #[serde(flatten)]
    pub details: EventDetails,
    /// Opaque caller-supplied snapshot (e.g. a base64 JPEG data URI).
    pub snapshot: Option<String>,
}

impl Event {
    pub fn new(frame_number: u64, details: EventDetails) -> Self {
        Self {
            frame_number,
            timestamp: Utc::now(),
            track_id: details.track_id(),
            details,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: String) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.details.kind()
    }
}
