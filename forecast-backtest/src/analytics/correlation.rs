//! Correlation measures over paired samples.
//!
//! All functions take two equally long slices without NaN values and return
//! NaN when the coefficient is undefined (fewer than two pairs or a constant
//! input).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Correlation method used for cross-correlation curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    Pearson,
    Kendall,
    Spearman,
    /// Raw cross-correlation normalised by the energies of the paired samples.
    MatlabNormalized,
}

impl CorrelationMode {
    pub const ALL: [CorrelationMode; 4] = [
        CorrelationMode::Pearson,
        CorrelationMode::Kendall,
        CorrelationMode::Spearman,
        CorrelationMode::MatlabNormalized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pearson => "pearson",
            Self::Kendall => "kendall",
            Self::Spearman => "spearman",
            Self::MatlabNormalized => "matlab_normalized",
        }
    }
}

impl fmt::Display for CorrelationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrelationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pearson" => Ok(Self::Pearson),
            "kendall" => Ok(Self::Kendall),
            "spearman" => Ok(Self::Spearman),
            "matlab_normalized" => Ok(Self::MatlabNormalized),
            other => Err(format!("Unknown correlation mode: {}", other)),
        }
    }
}

/// Pearson product-moment correlation.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }

    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x[..n].iter().zip(y[..n].iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

/// Spearman rank correlation: Pearson over average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    pearson(&average_ranks(&x[..n]), &average_ranks(&y[..n]))
}

/// Kendall tau-b, corrected for ties.
pub fn kendall(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }

    let mut score: i64 = 0;
    let mut tied_x: i64 = 0;
    let mut tied_y: i64 = 0;

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = sign(x[i] - x[j]);
            let dy = sign(y[i] - y[j]);
            if dx == 0 {
                tied_x += 1;
            }
            if dy == 0 {
                tied_y += 1;
            }
            score += dx * dy;
        }
    }

    let pairs = (n * (n - 1) / 2) as i64;
    let denom = ((pairs - tied_x) as f64 * (pairs - tied_y) as f64).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    score as f64 / denom
}

fn sign(v: f64) -> i64 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// 1-based ranks; tied values share the mean of their ranks.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Positions i..=j are tied
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Correlation of two paired samples under the given mode.
pub fn correlate(mode: CorrelationMode, x: &[f64], y: &[f64]) -> f64 {
    match mode {
        CorrelationMode::Pearson => pearson(x, y),
        CorrelationMode::Kendall => kendall(x, y),
        CorrelationMode::Spearman => spearman(x, y),
        CorrelationMode::MatlabNormalized => matlab_normalized(x, y),
    }
}

/// Raw cross-correlation `sum(x * y)` divided by `sqrt(sum(x^2) * sum(y^2))`,
/// both sums taken over the same pairs.
///
/// The result is uncentred, so a constant offset shared by both inputs still
/// counts as correlation. It stays within `[-1, 1]`.
pub fn matlab_normalized(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return f64::NAN;
    }

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x[..n].iter().zip(y[..n].iter()) {
        sxy += a * b;
        sxx += a * a;
        syy += b * b;
    }

    let denom = (sxx * syy).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    sxy / denom
}
