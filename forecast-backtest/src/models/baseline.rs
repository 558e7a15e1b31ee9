//! Baseline forecasting models.
//!
//! NaN gaps in the training data are ignored by every model.

use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::backtest::{FitResult, ForecastModel, ModelError};
use crate::data::{Prediction, Series, TimeFrame};

/// Two-sided 95% standard normal quantile.
fn z95() -> f64 {
    Normal::new(0.0, 1.0)
        .map(|n| n.inverse_cdf(0.975))
        .unwrap_or(1.959963984540054)
}

fn observed(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Repeats the last observed value.
#[derive(Debug, Clone, Default)]
pub struct Naive {
    last: Option<f64>,
}

impl Naive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ForecastModel for Naive {
    fn name(&self) -> &str {
        "naive"
    }

    fn train(&mut self, training: &Series, _: Option<&TimeFrame>) -> FitResult<()> {
        let last = training
            .values()
            .iter()
            .rev()
            .find(|v| !v.is_nan())
            .copied()
            .ok_or(ModelError::InsufficientData { needed: 1, got: 0 })?;
        self.last = Some(last);
        Ok(())
    }

    fn predict(&self, future_index: &[NaiveDate], _: Option<&TimeFrame>) -> FitResult<Prediction> {
        let last = self.last.ok_or(ModelError::NotTrained)?;
        Ok(Prediction::point(future_index.to_vec(), vec![last; future_index.len()]))
    }
}

/// Historical mean with a ±z95·σ band.
#[derive(Debug, Clone, Default)]
pub struct Mean {
    fitted: Option<(f64, f64)>,
}

impl Mean {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ForecastModel for Mean {
    fn name(&self) -> &str {
        "mean"
    }

    fn train(&mut self, training: &Series, _: Option<&TimeFrame>) -> FitResult<()> {
        let data = observed(training.values());
        if data.is_empty() {
            return Err(ModelError::InsufficientData { needed: 1, got: 0 });
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let std_dev = if data.len() > 1 {
            (data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        self.fitted = Some((mean, std_dev));
        Ok(())
    }

    fn predict(&self, future_index: &[NaiveDate], _: Option<&TimeFrame>) -> FitResult<Prediction> {
        let (mean, std_dev) = self.fitted.ok_or(ModelError::NotTrained)?;
        let n = future_index.len();
        let half_width = z95() * std_dev;
        Ok(Prediction::point(future_index.to_vec(), vec![mean; n])
            .with_bounds(vec![mean - half_width; n], vec![mean + half_width; n]))
    }
}

/// Ordinary least squares on time plus any extra regressors.
///
/// Time is measured in days since the first training timestamp. The band is
/// ±z95 times the residual standard deviation.
#[derive(Debug, Clone, Default)]
pub struct LinearTrend {
    fit: Option<LinearFit>,
}

#[derive(Debug, Clone)]
struct LinearFit {
    origin: NaiveDate,
    regressors: Vec<String>,
    /// Intercept, slope on time, then one coefficient per regressor.
    coefficients: Array1<f64>,
    residual_std: f64,
}

impl LinearTrend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitted coefficients: intercept, time slope, regressors.
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.fit.as_ref().and_then(|f| f.coefficients.as_slice())
    }
}

/// Design row for one timestamp.
fn design_row(
    date: NaiveDate,
    origin: NaiveDate,
    regressors: &[String],
    frame: Option<&TimeFrame>,
) -> FitResult<Array1<f64>> {
    let mut row = Array1::zeros(regressors.len() + 2);
    row[0] = 1.0;
    row[1] = (date - origin).num_days() as f64;
    for (j, column) in regressors.iter().enumerate() {
        row[j + 2] = frame
            .and_then(|f| f.value_at(column, date))
            .filter(|v| !v.is_nan())
            .ok_or_else(|| ModelError::MissingRegressor {
                column: column.clone(),
                date,
            })?;
    }
    Ok(row)
}

impl ForecastModel for LinearTrend {
    fn name(&self) -> &str {
        "linear_trend"
    }

    fn train(&mut self, training: &Series, extra_regressors: Option<&TimeFrame>) -> FitResult<()> {
        let origin = training
            .first_timestamp()
            .ok_or(ModelError::InsufficientData { needed: 2, got: 0 })?;
        let regressors: Vec<String> = extra_regressors
            .map(|f| f.column_names().into_iter().map(String::from).collect())
            .unwrap_or_default();

        let observed: Vec<(NaiveDate, f64)> =
            training.iter().filter(|(_, v)| !v.is_nan()).collect();

        let p = regressors.len() + 2;
        if observed.len() < p {
            return Err(ModelError::InsufficientData {
                needed: p,
                got: observed.len(),
            });
        }

        let mut design = Array2::<f64>::zeros((observed.len(), p));
        for (i, (date, _)) in observed.iter().enumerate() {
            let row = design_row(*date, origin, &regressors, extra_regressors)?;
            design.row_mut(i).assign(&row);
        }
        let targets: Array1<f64> = observed.iter().map(|(_, v)| *v).collect();

        // Normal equations: (X^T X) b = X^T y
        let xt = design.t();
        let coefficients = solve(xt.dot(&design), xt.dot(&targets))
            .ok_or_else(|| ModelError::Fit("singular design matrix".to_string()))?;

        let residuals = &targets - &design.dot(&coefficients);
        let ssr = residuals.dot(&residuals);
        let dof = observed.len().saturating_sub(p).max(1);

        self.fit = Some(LinearFit {
            origin,
            regressors,
            coefficients,
            residual_std: (ssr / dof as f64).sqrt(),
        });
        Ok(())
    }

    fn predict(
        &self,
        future_index: &[NaiveDate],
        extra_regressors: Option<&TimeFrame>,
    ) -> FitResult<Prediction> {
        let fit = self.fit.as_ref().ok_or(ModelError::NotTrained)?;

        let yhat = future_index
            .iter()
            .map(|date| {
                design_row(*date, fit.origin, &fit.regressors, extra_regressors)
                    .map(|row| row.dot(&fit.coefficients))
            })
            .collect::<FitResult<Vec<f64>>>()?;

        let half_width = z95() * fit.residual_std;
        let lower = yhat.iter().map(|v| v - half_width).collect();
        let upper = yhat.iter().map(|v| v + half_width).collect();

        Ok(Prediction::point(future_index.to_vec(), yhat).with_bounds(lower, upper))
    }
}

/// Gaussian elimination with partial pivoting. `None` when singular.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(1.0);

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() <= scale * 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}
