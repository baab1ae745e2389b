//! Frame-to-frame association of detections to predicted track boxes.
//!
//! The solver computes the pairwise IOU matrix, takes a greedy shortcut
//! when thresholding already yields a one-to-one matching, and otherwise
//! solves the optimal assignment that maximizes total IOU. Pairs below the
//! IOU threshold are never accepted.

use nalgebra::DMatrix;

use crate::bbox::{iou, BBox};
use crate::internal::hungarian::minimum_cost_assignment;

/// Result of associating one frame's detections with the live tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    /// `(detection_idx, track_idx)` pairs accepted at or above threshold.
    pub matches: Vec<(usize, usize)>,
    /// Detection indices with no accepted match (candidates for new tracks).
    pub unmatched_detections: Vec<usize>,
    /// Track indices with no accepted match (they age this frame).
    pub unmatched_tracks: Vec<usize>,
}

/// Pairwise IOU matrix, detections as rows, tracks as columns.
pub fn iou_matrix(detections: &[BBox], tracks: &[BBox]) -> DMatrix<f64> {
    let mut m = DMatrix::zeros(detections.len(), tracks.len());
    for (d, det) in detections.iter().enumerate() {
        for (t, trk) in tracks.iter().enumerate() {
            m[(d, t)] = iou(det, trk);
        }
    }
    m
}

/// Match detections to predicted track boxes by IOU.
///
/// `iou_threshold` is the minimum overlap for a valid pair; anything the
/// optimal solver proposes below it is pushed back into the unmatched
/// pools.
pub fn associate(detections: &[BBox], tracks: &[BBox], iou_threshold: f64) -> Association {
    if tracks.is_empty() || detections.is_empty() {
        return Association {
            matches: Vec::new(),
            unmatched_detections: (0..detections.len()).collect(),
            unmatched_tracks: (0..tracks.len()).collect(),
        };
    }

    let ious = iou_matrix(detections, tracks);

    let candidate_pairs = match unique_threshold_pairs(&ious, iou_threshold) {
        // Thresholding alone produced a valid one-to-one matching; no need
        // for the optimal solver
        Some(pairs) => pairs,
        // Ambiguous overlaps: maximize total IOU over the full bipartite
        // graph (minimize -IOU)
        None => minimum_cost_assignment(&ious.map(|v| -v)),
    };

    let mut matched_dets = vec![false; detections.len()];
    let mut matched_trks = vec![false; tracks.len()];
    let mut matches = Vec::with_capacity(candidate_pairs.len());

    for (d, t) in candidate_pairs {
        if ious[(d, t)] < iou_threshold {
            continue;
        }
        matched_dets[d] = true;
        matched_trks[t] = true;
        matches.push((d, t));
    }

    Association {
        matches,
        unmatched_detections: (0..detections.len()).filter(|&d| !matched_dets[d]).collect(),
        unmatched_tracks: (0..tracks.len()).filter(|&t| !matched_trks[t]).collect(),
    }
}

/// Fast path: threshold the IOU matrix into a binary matrix and, when every
/// row and every column has at most one bit set, return those pairs
/// directly. Returns `None` when any row or column is ambiguous.
fn unique_threshold_pairs(ious: &DMatrix<f64>, threshold: f64) -> Option<Vec<(usize, usize)>> {
    let mut row_counts = vec![0usize; ious.nrows()];
    let mut col_counts = vec![0usize; ious.ncols()];
    let mut pairs = Vec::new();

    for d in 0..ious.nrows() {
        for t in 0..ious.ncols() {
            if ious[(d, t)] > threshold {
                row_counts[d] += 1;
                col_counts[t] += 1;
                pairs.push((d, t));
            }
        }
    }

    let unique = row_counts.iter().all(|&c| c <= 1) && col_counts.iter().all(|&c| c <= 1);
    unique.then_some(pairs)
}
