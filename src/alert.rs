//! Live-path alert post-processing: subtype classification, reliability
//! scoring, gating, and cross-call debounce.
//!
//! The batch/upload path emits raw edge-triggered suspicious-activity
//! alerts; only the live path runs this layer (observed behaviour of the
//! system, kept as-is).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::event::{ActivitySubtype, EventKind, SuspiciousActivityReport};
use crate::tracker::TrackedPerson;

/// Default cooldown between repeated alerts for the same key.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Minimum center-to-center distance from `track` to any other track in
/// the same frame. `None` when the track is alone.
pub fn nearest_distance(track: &TrackedPerson, tracks: &[TrackedPerson]) -> Option<f64> {
    let (cx, cy) = track.center();
    tracks
        .iter()
        .filter(|other| other.id != track.id)
        .map(|other| {
            let (ox, oy) = other.center();
            ((ox - cx).powi(2) + (oy - cy).powi(2)).sqrt()
        })
        .min_by(|a, b| a.total_cmp(b))
}

/// Classify a suspicious-activity candidate into a subtype.
pub fn classify(
    report: &SuspiciousActivityReport,
    threshold: f64,
    nearest: Option<f64>,
) -> ActivitySubtype {
    if report.max_velocity > threshold && report.arm_velocity > threshold * 1.2 {
        ActivitySubtype::Fight
    } else if nearest.is_some_and(|d| d < 60.0) && report.mean_velocity < threshold * 0.4 {
        ActivitySubtype::Intimacy
    } else if report.arm_velocity > threshold && nearest.is_some_and(|d| d < 80.0) {
        ActivitySubtype::Cruelty
    } else {
        ActivitySubtype::Suspicious
    }
}

/// Reliability score in `[0, 1]` weighting motion magnitude, joint spread
/// and proximity to another person.
pub fn reliability(
    report: &SuspiciousActivityReport,
    threshold: f64,
    nearest: Option<f64>,
) -> f64 {
    let denom = threshold * 1.2;
    let motion = (report.max_velocity / denom * 0.5 + report.arm_velocity / denom * 0.5).min(1.0);
    let spread = (report.frac_exceed / 0.35).min(1.0);
    let proximity = if nearest.is_some_and(|d| d < 80.0) {
        1.0
    } else {
        0.6
    };

    (0.4 * motion + 0.4 * spread + 0.2 * proximity).clamp(0.0, 1.0)
}

/// Whether a classified candidate clears the emission gate.
pub fn gate(subtype: ActivitySubtype, reliability: f64, nearest: Option<f64>) -> bool {
    match subtype {
        ActivitySubtype::Fight => reliability >= 0.6 && nearest.is_some_and(|d| d < 120.0),
        ActivitySubtype::Cruelty => reliability >= 0.6 && nearest.is_some_and(|d| d < 140.0),
        ActivitySubtype::Intimacy => false,
        ActivitySubtype::Suspicious => reliability >= 0.5,
    }
}

/// Enrich a suspicious candidate with subtype, proximity and reliability,
/// and decide whether it should be surfaced. Non-suspicious reports pass
/// through untouched and never alert.
pub fn postprocess(
    report: &mut SuspiciousActivityReport,
    threshold: f64,
    track: &TrackedPerson,
    tracks: &[TrackedPerson],
) -> bool {
    if !report.is_suspicious {
        return report.alert_triggered;
    }

    let nearest = nearest_distance(track, tracks);
    let subtype = classify(report, threshold, nearest);
    let score = reliability(report, threshold, nearest);

    report.subtype = Some(subtype);
    report.nearest_distance = nearest;
    report.reliability = Some(score);

    let should_alert = gate(subtype, score, nearest);
    report.alert_triggered = should_alert;
    should_alert
}

/// Suppresses repeat emissions of the same `(event kind, track)` key
/// inside a cooldown window.
#[derive(Debug)]
pub struct Debouncer {
    cooldown: Duration,
    last_emission: HashMap<(EventKind, Option<u64>), Instant>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emission: HashMap::new(),
        }
    }

    /// Check the key against the wall clock; records the emission when
    /// allowed.
    pub fn allow(&mut self, kind: EventKind, track_id: Option<u64>) -> bool {
        self.allow_at(kind, track_id, Instant::now())
    }

    /// Clock-injected variant of [`Debouncer::allow`].
    pub fn allow_at(&mut self, kind: EventKind, track_id: Option<u64>, now: Instant) -> bool {
        let key = (kind, track_id);
        if let Some(last) = self.last_emission.get(&key) {
            if now.duration_since(*last) < self.cooldown {
                debug!(?kind, ?track_id, "alert suppressed inside cooldown");
                return false;
            }
        }
        self.last_emission.insert(key, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use approx::assert_relative_eq;

    fn person(id: u64, cx: f64) -> TrackedPerson {
        TrackedPerson {
            id,
            bbox: BBox::new(cx - 20.0, 0.0, cx + 20.0, 100.0),
            confidence: 0.9,
        }
    }

    fn candidate(max_v: f64, mean_v: f64, arm_v: f64, frac: f64) -> SuspiciousActivityReport {
        SuspiciousActivityReport {
            is_suspicious: true,
            track_id: 0,
            max_velocity: max_v,
            mean_velocity: mean_v,
            arm_velocity: arm_v,
            frac_exceed: frac,
            frames_analyzed: 10,
            alert_triggered: true,
            activity_type: "fight_like".to_string(),
            subtype: None,
            nearest_distance: None,
            reliability: None,
        }
    }

    const T: f64 = 15.0;

    // ===== Nearest distance =====

    #[test]
    fn test_nearest_distance_none_when_alone() {
        let tracks = vec![person(0, 100.0)];
        assert_eq!(nearest_distance(&tracks[0], &tracks), None);
    }

    #[test]
    fn test_nearest_distance_picks_minimum() {
        let tracks = vec![person(0, 100.0), person(1, 150.0), person(2, 400.0)];
        let d = nearest_distance(&tracks[0], &tracks).unwrap();
        assert_relative_eq!(d, 50.0);
    }

    // ===== Classification =====

    #[test]
    fn test_classify_fight() {
        let report = candidate(30.0, 20.0, 25.0, 0.5);
        assert_eq!(classify(&report, T, Some(100.0)), ActivitySubtype::Fight);
    }

    #[test]
    fn test_classify_intimacy() {
        // Slow close-range motion: mean below 0.4*t, neighbor within 60px
        let report = candidate(10.0, 4.0, 5.0, 0.1);
        assert_eq!(classify(&report, T, Some(40.0)), ActivitySubtype::Intimacy);
    }

    #[test]
    fn test_classify_cruelty() {
        // Violent arms without the overall peak of a fight, close range
        let report = candidate(14.0, 10.0, 16.0, 0.3);
        assert_eq!(classify(&report, T, Some(70.0)), ActivitySubtype::Cruelty);
    }

    #[test]
    fn test_classify_default_suspicious() {
        let report = candidate(16.0, 10.0, 10.0, 0.3);
        assert_eq!(classify(&report, T, None), ActivitySubtype::Suspicious);
    }

    // ===== Reliability =====

    #[test]
    fn test_reliability_clamped_to_unit() {
        let report = candidate(1000.0, 500.0, 1000.0, 1.0);
        let r = reliability(&report, T, Some(10.0));
        assert_relative_eq!(r, 1.0);

        let report = candidate(0.0, 0.0, 0.0, 0.0);
        let r = reliability(&report, T, None);
        // Only the distant-proximity term remains: 0.2 * 0.6
        assert_relative_eq!(r, 0.12);
    }

    #[test]
    fn test_reliability_proximity_term() {
        let report = candidate(18.0, 10.0, 18.0, 0.35);
        let near = reliability(&report, T, Some(50.0));
        let far = reliability(&report, T, Some(200.0));
        assert_relative_eq!(near - far, 0.2 * 0.4, epsilon = 1e-9);
    }

    // ===== Gate =====

    #[test]
    fn test_gate_fight_needs_proximity() {
        assert!(gate(ActivitySubtype::Fight, 0.9, Some(100.0)));
        assert!(!gate(ActivitySubtype::Fight, 0.9, Some(150.0)));
        assert!(!gate(ActivitySubtype::Fight, 0.9, None));
        assert!(!gate(ActivitySubtype::Fight, 0.5, Some(100.0)));
    }

    #[test]
    fn test_gate_intimacy_never_emits() {
        assert!(!gate(ActivitySubtype::Intimacy, 1.0, Some(10.0)));
    }

    #[test]
    fn test_gate_suspicious_moderate_reliability() {
        assert!(gate(ActivitySubtype::Suspicious, 0.5, None));
        assert!(!gate(ActivitySubtype::Suspicious, 0.49, None));
    }

    // ===== Postprocess =====

    #[test]
    fn test_postprocess_enriches_report() {
        let tracks = vec![person(0, 100.0), person(1, 160.0)];
        let mut report = candidate(30.0, 20.0, 25.0, 0.5);

        let emitted = postprocess(&mut report, T, &tracks[0], &tracks);
        assert!(emitted);
        assert_eq!(report.subtype, Some(ActivitySubtype::Fight));
        assert_relative_eq!(report.nearest_distance.unwrap(), 60.0);
        assert!(report.reliability.unwrap() >= 0.6);
    }

    #[test]
    fn test_postprocess_skips_non_suspicious() {
        let tracks = vec![person(0, 100.0)];
        let mut report = candidate(0.0, 0.0, 0.0, 0.0);
        report.is_suspicious = false;
        report.alert_triggered = false;

        assert!(!postprocess(&mut report, T, &tracks[0], &tracks));
        assert_eq!(report.subtype, None);
    }

    // ===== Debounce =====

    #[test]
    fn test_debounce_suppresses_within_window() {
        let mut debouncer = Debouncer::new(Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(debouncer.allow_at(EventKind::Loitering, Some(1), t0));
        assert!(!debouncer.allow_at(EventKind::Loitering, Some(1), t0 + Duration::from_secs(2)));
        assert!(debouncer.allow_at(EventKind::Loitering, Some(1), t0 + Duration::from_secs(6)));
    }

    #[test]
    fn test_debounce_keys_are_independent() {
        let mut debouncer = Debouncer::new(Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(debouncer.allow_at(EventKind::Loitering, Some(1), t0));
        // Different track, different event type: both pass
        assert!(debouncer.allow_at(EventKind::Loitering, Some(2), t0));
        assert!(debouncer.allow_at(EventKind::Overcrowding, None, t0));
    }

    #[test]
    fn test_debounce_window_resets_on_emission() {
        let mut debouncer = Debouncer::new(Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(debouncer.allow_at(EventKind::ZoneViolation, Some(1), t0));
        let t6 = t0 + Duration::from_secs(6);
        assert!(debouncer.allow_at(EventKind::ZoneViolation, Some(1), t6));
        // Window restarts at the second emission
        assert!(!debouncer.allow_at(EventKind::ZoneViolation, Some(1), t6 + Duration::from_secs(4)));
    }
}
