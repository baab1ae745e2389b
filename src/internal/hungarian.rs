//! Kuhn–Munkres (Hungarian) solver for the minimum-cost assignment problem.
//!
//! Operates on a rectangular cost matrix; rows and columns beyond the
//! square padding stay unassigned. Used by the association front-end when
//! the thresholded IOU matrix is ambiguous and a globally optimal matching
//! is required.

use nalgebra::DMatrix;

const ZERO_TOL: f64 = 1e-10;

/// Solve the assignment problem, minimizing total cost.
///
/// Returns `(row, col)` pairs covering `min(nrows, ncols)` assignments.
/// Empty matrices produce an empty assignment.
pub(crate) fn minimum_cost_assignment(cost_matrix: &DMatrix<f64>) -> Vec<(usize, usize)> {
    let n_rows = cost_matrix.nrows();
    let n_cols = cost_matrix.ncols();
    if n_rows == 0 || n_cols == 0 {
        return Vec::new();
    }

    // Pad to a square working matrix
    let n = n_rows.max(n_cols);
    let mut cost = DMatrix::zeros(n, n);
    cost.view_mut((0, 0), (n_rows, n_cols))
        .copy_from(cost_matrix);

    // Row and column reduction: subtract each row's minimum, then each
    // remaining column's minimum, creating at least one zero per line
    for i in 0..n {
        let row_min = (0..n).map(|j| cost[(i, j)]).fold(f64::INFINITY, f64::min);
        if row_min.is_finite() {
            for j in 0..n {
                cost[(i, j)] -= row_min;
            }
        }
    }
    for j in 0..n {
        let col_min = (0..n).map(|i| cost[(i, j)]).fold(f64::INFINITY, f64::min);
        if col_min.is_finite() {
            for i in 0..n {
                cost[(i, j)] -= col_min;
            }
        }
    }

    let mut row_match: Vec<Option<usize>> = vec![None; n];
    let mut col_match: Vec<Option<usize>> = vec![None; n];

    // Seed with the obvious zero assignments
    for i in 0..n {
        for j in 0..n {
            if cost[(i, j)].abs() < ZERO_TOL && row_match[i].is_none() && col_match[j].is_none() {
                row_match[i] = Some(j);
                col_match[j] = Some(i);
            }
        }
    }

    loop {
        let unmatched_rows: Vec<usize> = (0..n).filter(|&i| row_match[i].is_none()).collect();
        if unmatched_rows.is_empty() {
            break;
        }

        if !augment(&cost, n, &unmatched_rows, &mut row_match, &mut col_match) {
            // No augmenting path over the current zeros; shift costs to
            // create new zeros along the uncovered region
            if !relax_costs(&mut cost, n, &unmatched_rows, &col_match) {
                break;
            }
        }
    }

    row_match
        .into_iter()
        .take(n_rows)
        .enumerate()
        .filter_map(|(row, col)| col.filter(|&c| c < n_cols).map(|c| (row, c)))
        .collect()
}

/// Breadth-first search for one augmenting path of zero-cost edges starting
/// from any unmatched row. Returns true if the matching grew.
fn augment(
    cost: &DMatrix<f64>,
    n: usize,
    unmatched_rows: &[usize],
    row_match: &mut [Option<usize>],
    col_match: &mut [Option<usize>],
) -> bool {
    for &start_row in unmatched_rows {
        let mut parent_col: Vec<Option<usize>> = vec![None; n];
        let mut visited_col = vec![false; n];
        let mut queue = std::collections::VecDeque::from([start_row]);
        let mut found_col: Option<usize> = None;

        'bfs: while let Some(row) = queue.pop_front() {
            for col in 0..n {
                if visited_col[col] || cost[(row, col)].abs() >= ZERO_TOL {
                    continue;
                }
                visited_col[col] = true;
                parent_col[col] = Some(row);

                match col_match[col] {
                    None => {
                        found_col = Some(col);
                        break 'bfs;
                    }
                    Some(next_row) => queue.push_back(next_row),
                }
            }
        }

        if let Some(mut col) = found_col {
            // Flip the alternating path back to the start row
            loop {
                let row = parent_col[col].unwrap();
                let prev_col = row_match[row];
                row_match[row] = Some(col);
                col_match[col] = Some(row);
                match prev_col {
                    Some(pc) => col = pc,
                    None => break,
                }
            }
            return true;
        }
    }
    false
}

/// Dual-variable adjustment: find the minimum cost over the uncovered
/// cells and shift it so at least one new zero appears. Returns false when
/// no further improvement is possible.
fn relax_costs(
    cost: &mut DMatrix<f64>,
    n: usize,
    unmatched_rows: &[usize],
    col_match: &[Option<usize>],
) -> bool {
    let mut row_covered = vec![false; n];
    let mut col_covered = vec![false; n];

    // Rows reachable from unmatched rows through alternating zero paths
    let mut stack: Vec<usize> = unmatched_rows.to_vec();
    while let Some(row) = stack.pop() {
        if row_covered[row] {
            continue;
        }
        row_covered[row] = true;
        for col in 0..n {
            if cost[(row, col)].abs() < ZERO_TOL && !col_covered[col] {
                col_covered[col] = true;
                if let Some(matched_row) = col_match[col] {
                    stack.push(matched_row);
                }
            }
        }
    }

    let mut min_val = f64::INFINITY;
    for i in 0..n {
        if !row_covered[i] {
            continue;
        }
        for j in 0..n {
            if !col_covered[j] {
                min_val = min_val.min(cost[(i, j)]);
            }
        }
    }

    if !min_val.is_finite() || min_val <= 0.0 {
        return false;
    }

    for i in 0..n {
        for j in 0..n {
            if row_covered[i] && !col_covered[j] {
                cost[(i, j)] -= min_val;
            } else if !row_covered[i] && col_covered[j] {
                cost[(i, j)] += min_val;
            }
        }
    }
    true
}
