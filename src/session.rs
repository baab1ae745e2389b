//! Per-stream analysis session: one tracker plus one anomaly engine,
//! driven frame by frame.
//!
//! Every logical stream (an upload job or a live camera connection) owns
//! its own [`Session`]; nothing is shared between sessions, so identity
//! counters and edge-trigger state can never bleed across streams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::alert::{postprocess, Debouncer};
use crate::anomaly::AnomalyEngine;
use crate::bus::{EventBus, StreamMessage};
use crate::config::{AnalysisConfig, ConfigPatch};
use crate::detection::{Detection, PoseFrame};
use crate::event::{Event, EventDetails, EventKind};
use crate::tracker::{TrackedPerson, Tracker};
use crate::Result;

/// Seam to the external pose-estimation collaborator.
///
/// `Ok(None)` means extraction failed for this crop and the track is
/// simply skipped this frame. `Err` means the backend itself is down,
/// which is fatal to the session.
pub trait PoseSource {
    fn pose_for(&mut self, track: &TrackedPerson) -> Result<Option<PoseFrame>>;
}

/// Pose source for streams without pose estimation; yields nothing.
pub struct NoPose;

impl PoseSource for NoPose {
    fn pose_for(&mut self, _track: &TrackedPerson) -> Result<Option<PoseFrame>> {
        Ok(None)
    }
}

/// Alerting policy of a session.
///
/// Batch (upload analysis) emits raw edge-triggered alerts. Live applies
/// the subtype/reliability gate to suspicious activity and debounces every
/// alert across calls. The asymmetry mirrors the system this was built
/// for; unifying the two paths is a deliberate non-change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Batch,
    Live,
}

impl SessionMode {
    /// Default frames between suspicious-activity evaluations.
    fn default_activity_interval(self) -> u64 {
        match self {
            SessionMode::Batch => 10,
            SessionMode::Live => 5,
        }
    }
}

/// Output of one processed frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub frame_number: u64,
    pub tracks: Vec<TrackedPerson>,
    pub events: Vec<Event>,
}

/// Per-stream analysis context.
pub struct Session {
    config: AnalysisConfig,
    mode: SessionMode,
    tracker: Tracker,
    engine: AnomalyEngine,
    debouncer: Debouncer,
    frame_number: u64,
}

impl Session {
    pub fn new(config: AnalysisConfig, mode: SessionMode) -> Result<Self> {
        config.validate()?;
        let engine = AnomalyEngine::from_config(&config);
        Ok(Self {
            config,
            mode,
            tracker: Tracker::default(),
            engine,
            debouncer: Debouncer::default(),
            frame_number: 0,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Direct access to the tracker, mainly for inspection in tests.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    fn activity_interval(&self) -> u64 {
        self.config
            .activity_check_interval
            .unwrap_or_else(|| self.mode.default_activity_interval())
    }

    /// Hot-update any subset of the configuration surface.
    ///
    /// The merged configuration is validated before anything is touched;
    /// a malformed patch leaves the session unchanged.
    pub fn apply_patch(&mut self, patch: &ConfigPatch) -> Result<()> {
        let merged = self.config.merged(patch);
        merged.validate()?;

        self.engine
            .overcrowding
            .set_threshold(merged.overcrowding_threshold);
        self.engine.loitering.configure(
            merged.loitering_distance,
            merged.loitering_time,
            merged.fps,
        );
        self.engine
            .suspicious
            .set_velocity_threshold(merged.velocity_threshold);
        if patch.restricted_zones.is_some() {
            self.engine.replace_zones(&merged.restricted_zones);
        }

        info!("session configuration updated");
        self.config = merged;
        Ok(())
    }

    /// Run one frame through the pipeline:
    /// predict → associate → update → anomaly scan → alert policy.
    pub fn process_frame<P: PoseSource>(
        &mut self,
        detections: &[Detection],
        poses: &mut P,
    ) -> Result<FrameReport> {
        self.frame_number += 1;
        let frame = self.frame_number;

        let tracks = self.tracker.update(detections);
        let scan = self
            .engine
            .scan(frame, &tracks, self.activity_interval(), poses)?;

        let mut events = Vec::new();

        if let Some(report) = scan.overcrowding {
            if report.alert_triggered && self.pass_debounce(EventKind::Overcrowding, None) {
                events.push(Event::new(frame, EventDetails::Overcrowding(report)));
            }
        }

        for report in scan.loitering {
            if report.alert_triggered
                && self.pass_debounce(EventKind::Loitering, Some(report.track_id))
            {
                events.push(Event::new(frame, EventDetails::Loitering(report)));
            }
        }

        for report in scan.zones {
            if report.alert_triggered
                && self.pass_debounce(EventKind::ZoneViolation, Some(report.track_id))
            {
                events.push(Event::new(frame, EventDetails::ZoneViolation(report)));
            }
        }

        for mut report in scan.activity {
            let emit = match self.mode {
                SessionMode::Batch => report.alert_triggered,
                SessionMode::Live => {
                    let track = tracks.iter().find(|t| t.id == report.track_id);
                    match track {
                        Some(track) => {
                            postprocess(
                                &mut report,
                                self.config.velocity_threshold,
                                track,
                                &tracks,
                            ) && self
                                .pass_debounce(EventKind::SuspiciousActivity, Some(report.track_id))
                        }
                        None => false,
                    }
                }
            };
            if emit {
                events.push(Event::new(frame, EventDetails::SuspiciousActivity(report)));
            }
        }

        Ok(FrameReport {
            frame_number: frame,
            tracks,
            events,
        })
    }

    /// The debounce layer only exists on the live path.
    fn pass_debounce(&mut self, kind: EventKind, track_id: Option<u64>) -> bool {
        match self.mode {
            SessionMode::Batch => true,
            SessionMode::Live => self.debouncer.allow(kind, track_id),
        }
    }
}

/// Cooperative cancellation flag shared between the driving loop and its
/// controller. Checked between frames, so stopping is observed within one
/// frame's processing time.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Aggregate result of a full analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub total_frames: u64,
    pub total_events: usize,
    pub event_breakdown: HashMap<EventKind, usize>,
    pub events: Vec<Event>,
}

/// Drive a session over a sequence of per-frame detection lists.
///
/// Frame items are `Err` when the detection collaborator fails; that
/// terminates the run with the stream-level error after broadcasting it.
/// The stop flag is honored between frames. Tracking updates and alerts
/// are broadcast on the bus when one is supplied.
pub fn run_analysis<I, P>(
    session: &mut Session,
    frames: I,
    poses: &mut P,
    mut bus: Option<&mut EventBus>,
    stop: &StopFlag,
) -> Result<AnalysisSummary>
where
    I: IntoIterator<Item = Result<Vec<Detection>>>,
    P: PoseSource,
{
    let mut total_frames = 0u64;
    let mut events = Vec::new();

    for frame in frames {
        if stop.is_stopped() {
            info!(total_frames, "analysis cancelled");
            break;
        }

        let detections = match frame {
            Ok(detections) => detections,
            Err(err) => {
                error!(%err, "frame acquisition failed, terminating session");
                if let Some(bus) = bus.as_deref_mut() {
                    bus.broadcast(StreamMessage::Error {
                        message: err.to_string(),
                    });
                }
                return Err(err);
            }
        };

        let report = session.process_frame(&detections, poses)?;
        total_frames += 1;

        if let Some(bus) = bus.as_deref_mut() {
            bus.broadcast(StreamMessage::Tracking {
                frame_number: report.frame_number,
                tracks: report.tracks.clone(),
            });
            for event in &report.events {
                bus.broadcast(StreamMessage::Alert(event.clone()));
            }
        }

        events.extend(report.events);
    }

    let mut event_breakdown: HashMap<EventKind, usize> = HashMap::from([
        (EventKind::Overcrowding, 0),
        (EventKind::Loitering, 0),
        (EventKind::ZoneViolation, 0),
        (EventKind::SuspiciousActivity, 0),
    ]);
    for event in &events {
        *event_breakdown.entry(event.kind()).or_default() += 1;
    }

    info!(total_frames, total_events = events.len(), "analysis complete");

    Ok(AnalysisSummary {
        total_frames,
        total_events: events.len(),
        event_breakdown,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f64, y: f64) -> Detection {
        Detection::new([x, y, x + 40.0, y + 80.0], 0.9)
    }

    fn small_config() -> AnalysisConfig {
        AnalysisConfig {
            overcrowding_threshold: 1,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_session_rejects_invalid_config() {
        let mut config = AnalysisConfig::default();
        config.fps = 0;
        assert!(Session::new(config, SessionMode::Batch).is_err());
    }

    #[test]
    fn test_process_frame_reports_tracks() {
        let mut session = Session::new(AnalysisConfig::default(), SessionMode::Batch).unwrap();
        let report = session
            .process_frame(&[det(100.0, 100.0)], &mut NoPose)
            .unwrap();
        assert_eq!(report.frame_number, 1);
        assert_eq!(report.tracks.len(), 1);
        assert!(report.events.is_empty());
    }

    #[test]
    fn test_overcrowding_event_emitted_once() {
        let mut session = Session::new(small_config(), SessionMode::Batch).unwrap();
        let dets = [det(100.0, 100.0), det(400.0, 100.0)];

        let first = session.process_frame(&dets, &mut NoPose).unwrap();
        assert_eq!(first.events.len(), 1);
        assert_eq!(first.events[0].kind(), EventKind::Overcrowding);

        // Condition persists: edge already consumed
        let second = session.process_frame(&dets, &mut NoPose).unwrap();
        assert!(second.events.is_empty());
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = Session::new(AnalysisConfig::default(), SessionMode::Batch).unwrap();
        let mut b = Session::new(AnalysisConfig::default(), SessionMode::Batch).unwrap();

        a.process_frame(&[det(0.0, 0.0)], &mut NoPose).unwrap();
        a.process_frame(&[det(0.0, 0.0), det(200.0, 0.0)], &mut NoPose)
            .unwrap();

        // Session b issues ids from zero regardless of a's history
        let report = b.process_frame(&[det(500.0, 500.0)], &mut NoPose).unwrap();
        assert_eq!(report.tracks[0].id, 0);
    }

    #[test]
    fn test_apply_patch_is_atomic() {
        let mut session = Session::new(AnalysisConfig::default(), SessionMode::Batch).unwrap();

        let bad = ConfigPatch {
            overcrowding_threshold: Some(3),
            loitering_distance: Some(-5.0),
            ..ConfigPatch::default()
        };
        assert!(session.apply_patch(&bad).is_err());
        // The valid field must not have been applied either
        assert_eq!(session.config().overcrowding_threshold, 10);

        let good = ConfigPatch {
            overcrowding_threshold: Some(3),
            ..ConfigPatch::default()
        };
        session.apply_patch(&good).unwrap();
        assert_eq!(session.config().overcrowding_threshold, 3);
    }

    #[test]
    fn test_patch_updates_zones_mid_session() {
        let mut session = Session::new(AnalysisConfig::default(), SessionMode::Batch).unwrap();

        // No zones: walking through (120, 140) is fine
        let report = session.process_frame(&[det(100.0, 100.0)], &mut NoPose).unwrap();
        assert!(report.events.is_empty());

        let patch = ConfigPatch {
            restricted_zones: Some(vec![vec![
                [50.0, 50.0],
                [300.0, 50.0],
                [300.0, 300.0],
                [50.0, 300.0],
            ]]),
            ..ConfigPatch::default()
        };
        session.apply_patch(&patch).unwrap();

        let report = session.process_frame(&[det(100.0, 100.0)], &mut NoPose).unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].kind(), EventKind::ZoneViolation);
    }

    #[test]
    fn test_run_analysis_summary() {
        let mut session = Session::new(small_config(), SessionMode::Batch).unwrap();
        let frames: Vec<Result<Vec<Detection>>> = (0..5)
            .map(|_| Ok(vec![det(100.0, 100.0), det(400.0, 100.0)]))
            .collect();

        let summary =
            run_analysis(&mut session, frames, &mut NoPose, None, &StopFlag::new()).unwrap();

        assert_eq!(summary.total_frames, 5);
        assert_eq!(summary.total_events, 1);
        assert_eq!(summary.event_breakdown[&EventKind::Overcrowding], 1);
        assert_eq!(summary.event_breakdown[&EventKind::Loitering], 0);
    }

    #[test]
    fn test_run_analysis_stops_on_collaborator_failure() {
        let mut session = Session::new(AnalysisConfig::default(), SessionMode::Batch).unwrap();
        let frames: Vec<Result<Vec<Detection>>> = vec![
            Ok(vec![det(100.0, 100.0)]),
            Err(crate::Error::Backend("detector unavailable".to_string())),
            Ok(vec![det(100.0, 100.0)]),
        ];

        let result = run_analysis(&mut session, frames, &mut NoPose, None, &StopFlag::new());
        assert!(matches!(result, Err(crate::Error::Backend(_))));
        // Only the first frame was processed
        assert_eq!(session.frame_number(), 1);
    }

    #[test]
    fn test_stop_flag_cancels_run() {
        let mut session = Session::new(AnalysisConfig::default(), SessionMode::Batch).unwrap();
        let stop = StopFlag::new();
        stop.stop();

        let frames: Vec<Result<Vec<Detection>>> =
            (0..100).map(|_| Ok(vec![det(0.0, 0.0)])).collect();
        let summary = run_analysis(&mut session, frames, &mut NoPose, None, &stop).unwrap();
        assert_eq!(summary.total_frames, 0);
    }
}
