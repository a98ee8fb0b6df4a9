use crate::detect::DetectError;
use serde::{Deserialize, Serialize};

/// Per-column standardization to zero mean and unit variance.
///
/// Columns with zero variance keep a scale of 1 so they pass through centered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub sample_count: usize,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, DetectError> {
        let width = check_width(rows)?;
        let n = rows.len() as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        // Population variance, as the scaler is fitted on the full batch.
        let mut variances = vec![0.0; width];
        for row in rows {
            for ((var, v), m) in variances.iter_mut().zip(row).zip(&means) {
                *var += (v - m).powi(2);
            }
        }

        let scales = variances
            .into_iter()
            .map(|s| {
                let std = (s / n).sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self {
            means,
            scales,
            sample_count: rows.len(),
        })
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, DetectError> {
        rows.iter()
            .map(|row| {
                if row.len() != self.width() {
                    return Err(DetectError::DimensionMismatch {
                        expected: self.width(),
                        got: row.len(),
                    });
                }
                Ok(row
                    .iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect())
            })
            .collect()
    }
}

/// Width shared by every row; errors on an empty or ragged batch.
pub(crate) fn check_width(rows: &[Vec<f64>]) -> Result<usize, DetectError> {
    let first = rows.first().ok_or(DetectError::InsufficientSamples { needed: 1, have: 0 })?;
    let width = first.len();
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(DetectError::DimensionMismatch {
            expected: width,
            got: bad.len(),
        });
    }
    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_standardizes() {
        let rows: Vec<Vec<f64>> = (1..=5).map(|i| vec![f64::from(i), 5.0]).collect();
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.means, vec![3.0, 5.0]);
        // Variance of 1..5 is 2.0; the constant column keeps scale 1.
        assert!((scaler.scales[0] - 2.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(scaler.scales[1], 1.0);

        let out = scaler.transform(&rows).unwrap();
        let mean: f64 = out.iter().map(|r| r[0]).sum::<f64>() / 5.0;
        assert!(mean.abs() < 1e-12);
        assert!(out.iter().all(|r| r[1] == 0.0));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            StandardScaler::fit(&rows),
            Err(DetectError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_transform_width_checked() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert!(scaler.transform(&[vec![1.0]]).is_err());
    }
}
