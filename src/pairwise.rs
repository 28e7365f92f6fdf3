use tracing::debug;

use crate::error::AhpError;

/// Acceptability threshold for the consistency ratio.
pub const CONSISTENCY_THRESHOLD: f64 = 0.10;

/// Tolerance used when checking `m[i][j] * m[j][i] == 1` on loaded matrices.
const RECIPROCAL_TOLERANCE: f64 = 1e-6;

/// Random consistency index for `n` criteria.
///
/// Values for `n > 10` are a flat 1.5. That extrapolation is not a
/// published table value; it is kept so stored rankings stay reproducible.
pub fn random_index(n: usize) -> f64 {
    match n {
        0..=2 => 0.0,
        3 => 0.58,
        4 => 0.9,
        5 => 1.12,
        6 => 1.24,
        7 => 1.32,
        8 => 1.41,
        9 => 1.45,
        10 => 1.49,
        _ => 1.5,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightDerivation {
    pub weights: Vec<f64>,
    pub lambda_max: f64,
    pub consistency_index: f64,
    pub random_index: f64,
    pub consistency_ratio: f64,
    pub is_consistent: bool,
}

/// Positive reciprocal matrix of pairwise judgments with a unit diagonal.
///
/// The only mutation path is [`ComparisonMatrix::set_comparison`], which
/// writes a cell and its mirror together and drops the memoized derivation.
#[derive(Debug, Clone)]
pub struct ComparisonMatrix {
    cells: Vec<Vec<f64>>,
    derivation: Option<WeightDerivation>,
}

impl ComparisonMatrix {
    /// All criteria judged equally important.
    pub fn identity(n: usize) -> Result<Self, AhpError> {
        if n < 2 {
            return Err(AhpError::InvalidMatrix(format!(
                "at least 2 criteria are required, got {n}"
            )));
        }
        Ok(Self {
            cells: vec![vec![1.0; n]; n],
            derivation: None,
        })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, AhpError> {
        let n = rows.len();
        if n < 2 {
            return Err(AhpError::InvalidMatrix(format!(
                "at least 2 criteria are required, got {n}"
            )));
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(AhpError::InvalidMatrix(format!(
                    "row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            for (j, &value) in row.iter().enumerate() {
                check_judgment(i, j, value)?;
            }
            if (row[i] - 1.0).abs() > RECIPROCAL_TOLERANCE {
                return Err(AhpError::InvalidMatrix(format!(
                    "diagonal entry ({i}, {i}) is {}, expected 1",
                    row[i]
                )));
            }
        }

        for i in 0..n {
            for j in (i + 1)..n {
                let product = rows[i][j] * rows[j][i];
                if (product - 1.0).abs() > RECIPROCAL_TOLERANCE {
                    return Err(AhpError::InvalidMatrix(format!(
                        "entries ({i}, {j}) = {} and ({j}, {i}) = {} are not reciprocal",
                        rows[i][j], rows[j][i]
                    )));
                }
            }
        }

        Ok(Self {
            cells: rows,
            derivation: None,
        })
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Records that criterion `row` is `value` times as important as `col`
    /// and stores the reciprocal in the mirror cell.
    pub fn set_comparison(&mut self, row: usize, col: usize, value: f64) -> Result<(), AhpError> {
        let n = self.size();
        if row >= n || col >= n {
            return Err(AhpError::InvalidMatrix(format!(
                "cell ({row}, {col}) is outside a {n}x{n} matrix"
            )));
        }
        if row == col {
            return Err(AhpError::InvalidMatrix(format!(
                "diagonal cell ({row}, {col}) is fixed at 1"
            )));
        }
        check_judgment(row, col, value)?;

        self.cells[row][col] = value;
        self.cells[col][row] = 1.0 / value;
        self.derivation = None;
        Ok(())
    }

    /// Memoized [`compute_weights`] result, dropped by every mutation.
    pub fn derivation(&mut self) -> &WeightDerivation {
        self.derivation
            .get_or_insert_with(|| derive(&self.cells))
    }

    pub fn has_derivation(&self) -> bool {
        self.derivation.is_some()
    }
}

fn check_judgment(row: usize, col: usize, value: f64) -> Result<(), AhpError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AhpError::InvalidMatrix(format!(
            "entry ({row}, {col}) must be a positive finite ratio, got {value}"
        )));
    }
    Ok(())
}

/// Derives priority weights and the consistency ratio using the
/// column-normalized row-average estimate of the principal eigenvector.
pub fn compute_weights(matrix: &ComparisonMatrix) -> WeightDerivation {
    derive(&matrix.cells)
}

fn derive(cells: &[Vec<f64>]) -> WeightDerivation {
    let n = cells.len();
    let size = n as f64;

    let column_sums: Vec<f64> = (0..n)
        .map(|j| cells.iter().map(|row| row[j]).sum())
        .collect();

    let weights: Vec<f64> = cells
        .iter()
        .map(|row| {
            row.iter()
                .zip(column_sums.iter())
                .map(|(value, sum)| value / sum)
                .sum::<f64>()
                / size
        })
        .collect();

    let lambda_max = cells
        .iter()
        .zip(weights.iter())
        .map(|(row, weight)| {
            let weighted: f64 = row.iter().zip(weights.iter()).map(|(m, w)| m * w).sum();
            weighted / weight
        })
        .sum::<f64>()
        / size;

    let consistency_index = (lambda_max - size) / (size - 1.0);
    let random_index = random_index(n);
    let consistency_ratio = if random_index == 0.0 {
        0.0
    } else {
        consistency_index / random_index
    };
    let is_consistent = consistency_ratio <= CONSISTENCY_THRESHOLD;

    debug!(
        event = "weights_computed",
        criteria = n,
        lambda_max,
        consistency_ratio,
        is_consistent,
    );

    WeightDerivation {
        weights,
        lambda_max,
        consistency_index,
        random_index,
        consistency_ratio,
        is_consistent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAATY: [f64; 17] = [
        1.0 / 9.0,
        1.0 / 8.0,
        1.0 / 7.0,
        1.0 / 6.0,
        1.0 / 5.0,
        1.0 / 4.0,
        1.0 / 3.0,
        1.0 / 2.0,
        1.0,
        2.0,
        3.0,
        4.0,
        5.0,
        6.0,
        7.0,
        8.0,
        9.0,
    ];

    fn matrix_from_weights(weights: &[f64]) -> ComparisonMatrix {
        let rows = weights
            .iter()
            .map(|wi| weights.iter().map(|wj| wi / wj).collect())
            .collect();
        ComparisonMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn random_index_table_and_extrapolation() {
        assert_eq!(random_index(2), 0.0);
        assert_eq!(random_index(3), 0.58);
        assert_eq!(random_index(5), 1.12);
        assert_eq!(random_index(10), 1.49);
        assert_eq!(random_index(11), 1.5);
        assert_eq!(random_index(40), 1.5);
    }

    #[test]
    fn dominant_first_criterion() {
        let mut matrix = ComparisonMatrix::identity(3).unwrap();
        matrix.set_comparison(0, 1, 9.0).unwrap();
        matrix.set_comparison(0, 2, 9.0).unwrap();
        matrix.set_comparison(1, 2, 1.0).unwrap();

        let result = compute_weights(&matrix);
        assert_eq!(&result, matrix.derivation());
        assert!(result.weights[0] > 5.0 * result.weights[1]);
        assert!((result.weights[1] - result.weights[2]).abs() < 1e-9);
        assert!(result.consistency_ratio < 0.01);
        assert!(result.is_consistent);
    }

    #[test]
    fn two_criteria_are_always_consistent() {
        for value in [1.0 / 9.0, 0.5, 1.0, 3.0, 9.0, 250.0] {
            let mut matrix = ComparisonMatrix::identity(2).unwrap();
            matrix.set_comparison(0, 1, value).unwrap();
            let result = matrix.derivation();
            assert_eq!(result.consistency_ratio, 0.0);
            assert!(result.is_consistent);
        }
    }

    #[test]
    fn contradictory_judgments_are_flagged() {
        let mut matrix = ComparisonMatrix::identity(3).unwrap();
        matrix.set_comparison(0, 1, 9.0).unwrap();
        matrix.set_comparison(1, 2, 9.0).unwrap();
        matrix.set_comparison(2, 0, 9.0).unwrap();

        let result = matrix.derivation();
        assert!(result.consistency_ratio > CONSISTENCY_THRESHOLD);
        assert!(!result.is_consistent);
    }

    #[test]
    fn set_comparison_writes_mirror_and_drops_verdict() {
        let mut matrix = ComparisonMatrix::identity(5).unwrap();
        let before = matrix.derivation().clone();
        assert!(matrix.has_derivation());

        matrix.set_comparison(1, 3, 4.0).unwrap();
        assert_eq!(matrix.get(1, 3), Some(4.0));
        assert_eq!(matrix.get(3, 1), Some(0.25));
        assert!(!matrix.has_derivation());

        let after = matrix.derivation().clone();
        assert_ne!(before.weights, after.weights);
    }

    #[test]
    fn set_comparison_rejects_bad_input() {
        let mut matrix = ComparisonMatrix::identity(3).unwrap();
        matrix.derivation();
        assert!(matrix.set_comparison(1, 1, 2.0).is_err());
        assert!(matrix.set_comparison(0, 3, 2.0).is_err());
        assert!(matrix.set_comparison(0, 1, 0.0).is_err());
        assert!(matrix.set_comparison(0, 1, -3.0).is_err());
        assert!(matrix.set_comparison(0, 1, f64::NAN).is_err());
        assert!(matrix.has_derivation());
        assert_eq!(matrix.get(0, 1), Some(1.0));
    }

    #[test]
    fn from_rows_validates_shape_and_values() {
        assert!(matches!(
            ComparisonMatrix::from_rows(vec![vec![1.0]]),
            Err(AhpError::InvalidMatrix(_))
        ));
        assert!(ComparisonMatrix::from_rows(vec![vec![1.0, 2.0], vec![0.5]]).is_err());
        assert!(ComparisonMatrix::from_rows(vec![vec![1.0, 2.0], vec![2.0, 1.0]]).is_err());
        assert!(ComparisonMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).is_err());
        assert!(ComparisonMatrix::from_rows(vec![vec![2.0, 2.0], vec![0.5, 1.0]]).is_err());
        assert!(ComparisonMatrix::from_rows(vec![vec![1.0, 3.0], vec![1.0 / 3.0, 1.0]]).is_ok());
        assert!(ComparisonMatrix::identity(1).is_err());
    }

    proptest! {
        #[test]
        fn weights_sum_to_one(
            n in 2usize..12,
            picks in prop::collection::vec(0usize..SAATY.len(), 66),
        ) {
            let mut matrix = ComparisonMatrix::identity(n).unwrap();
            let mut k = 0;
            for i in 0..n {
                for j in (i + 1)..n {
                    matrix.set_comparison(i, j, SAATY[picks[k]]).unwrap();
                    k += 1;
                }
            }
            let result = matrix.derivation();
            let total: f64 = result.weights.iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
            prop_assert!(result.weights.iter().all(|w| *w > 0.0));
        }

        #[test]
        fn transitive_judgments_have_zero_ratio(
            raw in prop::collection::vec(0.05f64..10.0, 2..11),
        ) {
            let total: f64 = raw.iter().sum();
            let truth: Vec<f64> = raw.iter().map(|w| w / total).collect();
            let mut matrix = matrix_from_weights(&truth);
            let result = matrix.derivation();
            prop_assert!(result.consistency_ratio.abs() < 1e-9);
            prop_assert!(result.is_consistent);
            for (derived, expected) in result.weights.iter().zip(truth.iter()) {
                prop_assert!((derived - expected).abs() < 1e-9);
            }
        }
    }
}
