//! Loitering detection: people who stay inside a small radius for too long.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;

use crate::event::LoiteringReport;

/// Extra history kept beyond the detection window, so the window never
/// starves right after a configuration change.
const HISTORY_SLACK: usize = 100;

/// Detects tracks whose recent positions all stay within `pixel_threshold`
/// of their centroid for `time_threshold` seconds.
///
/// Alerts are edge-triggered per track id: a track enters the loitering set
/// on its rising edge and leaves it as soon as it moves again.
#[derive(Debug)]
pub struct LoiteringDetector {
    pixel_threshold: f64,
    time_threshold: f64,
    fps: u32,
    frame_threshold: usize,

    /// Per-track bounded position history `(x, y, frame)`.
    history: HashMap<u64, VecDeque<(f64, f64, u64)>>,
    loitering_tracks: HashSet<u64>,
}

impl LoiteringDetector {
    pub fn new(pixel_threshold: f64, time_threshold: f64, fps: u32) -> Self {
        Self {
            pixel_threshold,
            time_threshold,
            fps,
            frame_threshold: (time_threshold * fps as f64) as usize,
            history: HashMap::new(),
            loitering_tracks: HashSet::new(),
        }
    }

    pub fn pixel_threshold(&self) -> f64 {
        self.pixel_threshold
    }

    pub fn time_threshold(&self) -> f64 {
        self.time_threshold
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Update thresholds; the frame window is recomputed from the new
    /// values.
    pub fn configure(&mut self, pixel_threshold: f64, time_threshold: f64, fps: u32) {
        self.pixel_threshold = pixel_threshold;
        self.time_threshold = time_threshold;
        self.fps = fps;
        self.frame_threshold = (time_threshold * fps as f64) as usize;
    }

    /// Record a track's center position for the current frame.
    pub fn observe(&mut self, track_id: u64, center: (f64, f64), frame: u64) {
        let positions = self.history.entry(track_id).or_default();
        positions.push_back((center.0, center.1, frame));

        let max_history = self.frame_threshold + HISTORY_SLACK;
        while positions.len() > max_history {
            positions.pop_front();
        }
    }

    /// Evaluate a track against the stored history. The threshold overrides
    /// apply to this call only (`time_threshold` override is in frames).
    pub fn detect(
        &mut self,
        track_id: u64,
        pixel_threshold: Option<f64>,
        frame_threshold: Option<usize>,
    ) -> LoiteringReport {
        let active_pixel = pixel_threshold.unwrap_or(self.pixel_threshold);
        let active_frames = frame_threshold.unwrap_or(self.frame_threshold);

        let positions = self.history.get(&track_id);
        let len = positions.map_or(0, |p| p.len());

        if active_frames == 0 || len < active_frames {
            return LoiteringReport {
                is_loitering: false,
                track_id,
                duration_frames: len,
                duration_seconds: len as f64 / self.fps as f64,
                movement_distance: 0.0,
                alert_triggered: false,
                position: positions.and_then(|p| p.back()).map(|&(x, y, _)| (x, y)),
            };
        }

        let window: Vec<(f64, f64)> = positions
            .into_iter()
            .flatten()
            .skip(len - active_frames)
            .map(|&(x, y, _)| (x, y))
            .collect();

        let movement = max_spread(&window);
        let is_loitering = movement < active_pixel;

        let alert_triggered = if is_loitering && !self.loitering_tracks.contains(&track_id) {
            self.loitering_tracks.insert(track_id);
            warn!(
                track_id,
                movement_px = movement,
                frames = window.len(),
                "loitering detected"
            );
            true
        } else {
            if !is_loitering {
                self.loitering_tracks.remove(&track_id);
            }
            false
        };

        LoiteringReport {
            is_loitering,
            track_id,
            duration_frames: window.len(),
            duration_seconds: window.len() as f64 / self.fps as f64,
            movement_distance: movement,
            alert_triggered,
            position: window.last().copied(),
        }
    }

    /// Drop history and edge state for tracks no longer alive.
    pub fn cleanup(&mut self, active_track_ids: &[u64]) {
        let active: HashSet<u64> = active_track_ids.iter().copied().collect();
        self.history.retain(|id, _| active.contains(id));
        self.loitering_tracks.retain(|id| active.contains(id));
    }
}

/// Maximum distance of any sample from the window centroid.
fn max_spread(positions: &[(f64, f64)]) -> f64 {
    if positions.len() < 2 {
        return 0.0;
    }

    let n = positions.len() as f64;
    let (sx, sy) = positions
        .iter()
        .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
    let (mx, my) = (sx / n, sy / n);

    positions
        .iter()
        .map(|(x, y)| ((x - mx).powi(2) + (y - my).powi(2)).sqrt())
        .fold(0.0, f64::max)
}
