use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Per-column standardization to zero mean and unit variance.
///
/// Statistics are fitted once over the full dataset and reused for every
/// transform. Columns with zero variance keep a scale of 1, so they are
/// only centered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on a row-major matrix with `dim` columns
    pub fn fit(data: &[f64], dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("scaler dimension must be positive".to_string()));
        }
        if data.is_empty() {
            return Err(Error::EmptyDataset);
        }
        if data.len() % dim != 0 {
            return Err(Error::InvalidDimension {
                expected: dim,
                actual: data.len() % dim,
            });
        }

        let rows = (data.len() / dim) as f64;
        let mut mean = vec![0.0; dim];
        for row in data.chunks_exact(dim) {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= rows;
        }

        // population variance, matching the usual ddof=0 convention
        let mut var = vec![0.0; dim];
        for row in data.chunks_exact(dim) {
            for ((v, x), m) in var.iter_mut().zip(row).zip(&mean) {
                let d = x - m;
                *v += d * d;
            }
        }

        let scale = var
            .into_iter()
            .map(|v| {
                let std = (v / rows).sqrt();
                if std > f64::EPSILON { std } else { 1.0 }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn fit_transform(data: &[f64], dim: usize) -> Result<(Self, Vec<f64>)> {
        let scaler = Self::fit(data, dim)?;
        let scaled = scaler.transform(data)?;
        Ok((scaler, scaled))
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.dim() {
            return Err(Error::InvalidDimension {
                expected: self.dim(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    pub fn transform(&self, data: &[f64]) -> Result<Vec<f64>> {
        let dim = self.dim();
        if data.len() % dim != 0 {
            return Err(Error::InvalidDimension {
                expected: dim,
                actual: data.len() % dim,
            });
        }
        let mut out = Vec::with_capacity(data.len());
        for row in data.chunks_exact(dim) {
            out.extend(row.iter().zip(self.mean.iter().zip(&self.scale)).map(|(x, (m, s))| (x - m) / s));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mean_unit_variance() {
        let data = vec![1.0, 100.0, 2.0, 200.0, 3.0, 300.0, 4.0, 400.0];
        let (scaler, scaled) = StandardScaler::fit_transform(&data, 2).unwrap();
        assert_eq!(scaler.mean(), &[2.5, 250.0]);

        for col in 0..2 {
            let values: Vec<f64> = scaled.chunks_exact(2).map(|r| r[col]).collect();
            let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
            let var: f64 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_is_centered_only() {
        let data = vec![5.0, 1.0, 5.0, 2.0, 5.0, 3.0];
        let (scaler, scaled) = StandardScaler::fit_transform(&data, 2).unwrap();
        assert_eq!(scaler.scale()[0], 1.0);
        assert!(scaled.chunks_exact(2).all(|r| r[0] == 0.0));
    }

    #[test]
    fn test_single_row() {
        let (_, scaled) = StandardScaler::fit_transform(&[3.0, 4.0], 2).unwrap();
        assert_eq!(scaled, vec![0.0, 0.0]);
    }

    #[test]
    fn test_fit_validation() {
        assert!(matches!(StandardScaler::fit(&[], 2), Err(Error::EmptyDataset)));
        assert!(matches!(
            StandardScaler::fit(&[1.0, 2.0, 3.0], 2),
            Err(Error::InvalidDimension { .. })
        ));

        let scaler = StandardScaler::fit(&[1.0, 2.0], 2).unwrap();
        assert!(scaler.transform_row(&[1.0]).is_err());
    }
}
