use log::debug;
use thiserror::Error;

use crate::parse::{series, Case, MeasurementRow, Operation};

#[derive(Debug, Error, PartialEq)]
pub enum ComputationError {
    #[error("no data to scale the reference curve against")]
    EmptySeries,
    #[error("target series has {target} values but there are {rows} rows")]
    LengthMismatch { rows: usize, target: usize },
    #[error("row {index}: dataset size {n} has no logarithm")]
    NonPositiveSize { index: usize, n: i64 },
    #[error("log2(n) is zero for every row, the scale factor is undefined")]
    ZeroLogMaximum,
    #[error("target series maximum {0} cannot scale the reference curve")]
    DegenerateTarget(f64),
}

/// `log2(n)` for every row, scaled so its maximum equals the maximum of `target`.
pub fn compute_reference_curve(
    rows: &[MeasurementRow],
    target: &[f64],
) -> Result<Vec<f64>, ComputationError> {
    if rows.is_empty() || target.is_empty() {
        return Err(ComputationError::EmptySeries);
    }
    if rows.len() != target.len() {
        return Err(ComputationError::LengthMismatch {
            rows: rows.len(),
            target: target.len(),
        });
    }

    let logs = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            if row.n <= 0 {
                Err(ComputationError::NonPositiveSize { index, n: row.n })
            } else {
                Ok((row.n as f64).log2())
            }
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let log_max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if log_max <= 0.0 {
        return Err(ComputationError::ZeroLogMaximum);
    }

    let target_max = target.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if target.iter().any(|v| !v.is_finite()) || target_max <= 0.0 {
        return Err(ComputationError::DegenerateTarget(target_max));
    }

    let scale = target_max / log_max;
    debug!("reference scale factor {:.4} (target max {})", scale, target_max);
    Ok(logs.into_iter().map(|l| l * scale).collect())
}

/// One scaled reference curve per panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceCurves {
    pub insert: Vec<f64>,
    pub search: Vec<f64>,
}

impl ReferenceCurves {
    /// Each panel's curve is scaled to that operation's average-case counts.
    pub fn compute(rows: &[MeasurementRow]) -> Result<Self, ComputationError> {
        let _span = flame::start_guard("reference");
        let insert = compute_reference_curve(
            rows,
            &series(rows, Operation::Insert, Case::Average),
        )?;
        let search = compute_reference_curve(
            rows,
            &series(rows, Operation::Search, Case::Average),
        )?;
        Ok(ReferenceCurves { insert, search })
    }

    pub fn for_operation(&self, op: Operation) -> &[f64] {
        match op {
            Operation::Insert => &self.insert,
            Operation::Search => &self.search,
        }
    }
}

#[cfg(test)]
fn rows_with(sizes: &[i64], insert_avg: &[f64]) -> Vec<MeasurementRow> {
    sizes
        .iter()
        .zip(insert_avg)
        .map(|(&n, &avg)| MeasurementRow {
            n,
            insert_min_comps: 1.0,
            insert_avg_comps: avg,
            insert_max_comps: avg * 2.0,
            search_min_comps: 1.0,
            search_avg_comps: avg + 1.0,
            search_max_comps: avg * 3.0,
        })
        .collect()
}

#[test]
fn scales_to_target_maximum() {
    let rows = rows_with(&[10, 100, 1000], &[5.0, 10.0, 15.0]);
    let curve = compute_reference_curve(&rows, &[5.0, 10.0, 15.0]).unwrap();
    assert_eq!(curve.len(), 3);
    assert!((curve[2] - 15.0).abs() < 1e-9);
    // log2 is linear in the exponent, so 10/100/1000 land on thirds.
    assert!((curve[0] - 5.0).abs() < 1e-9);
    assert!((curve[1] - 10.0).abs() < 1e-9);
}

#[test]
fn maximum_matches_unordered_target() {
    let rows = rows_with(&[5, 50, 500, 5000, 50000], &[2.2, 5.5, 8.9, 12.1, 15.4]);
    let target = [3.0, 17.5, 4.0, 9.0, 11.0];
    let curve = compute_reference_curve(&rows, &target).unwrap();
    let max = curve.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(curve.len(), rows.len());
    assert!((max - 17.5).abs() < 1e-9);
}

#[test]
fn zero_size_is_rejected() {
    let rows = rows_with(&[0, 10], &[1.0, 2.0]);
    assert_eq!(
        compute_reference_curve(&rows, &[1.0, 2.0]),
        Err(ComputationError::NonPositiveSize { index: 0, n: 0 })
    );
}

#[test]
fn negative_size_is_rejected() {
    let rows = rows_with(&[10, -4], &[1.0, 2.0]);
    assert_eq!(
        compute_reference_curve(&rows, &[1.0, 2.0]),
        Err(ComputationError::NonPositiveSize { index: 1, n: -4 })
    );
}

#[test]
fn single_row_of_size_one_is_rejected() {
    let rows = rows_with(&[1], &[0.0]);
    assert_eq!(
        compute_reference_curve(&rows, &[0.0]),
        Err(ComputationError::ZeroLogMaximum)
    );
}

#[test]
fn all_zero_target_is_rejected() {
    let rows = rows_with(&[10, 100], &[0.0, 0.0]);
    assert_eq!(
        compute_reference_curve(&rows, &[0.0, 0.0]),
        Err(ComputationError::DegenerateTarget(0.0))
    );
}

#[test]
fn empty_input_is_rejected() {
    assert_eq!(
        compute_reference_curve(&[], &[]),
        Err(ComputationError::EmptySeries)
    );
    let rows = rows_with(&[10], &[1.0]);
    assert_eq!(
        compute_reference_curve(&rows, &[]),
        Err(ComputationError::EmptySeries)
    );
}

#[test]
fn mismatched_lengths_are_rejected() {
    let rows = rows_with(&[10, 100], &[1.0, 2.0]);
    assert_eq!(
        compute_reference_curve(&rows, &[1.0]),
        Err(ComputationError::LengthMismatch { rows: 2, target: 1 })
    );
}

#[test]
fn panels_use_their_own_average() {
    let rows = rows_with(&[10, 100, 1000], &[5.0, 10.0, 15.0]);
    let curves = ReferenceCurves::compute(&rows).unwrap();
    assert!((curves.for_operation(Operation::Insert)[2] - 15.0).abs() < 1e-9);
    assert!((curves.for_operation(Operation::Search)[2] - 16.0).abs() < 1e-9);
}
