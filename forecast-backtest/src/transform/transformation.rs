//! Reversible pointwise transformations.
//!
//! - `none`: identity
//! - `log`: sign(x)·ln|x|, with 0 mapped to 0
//! - `log_modified`: sign(x)·ln(|x| + 1)
//!
//! `log` sends every value in [-1, 1] to 0, so only values outside that band
//! survive a round trip. `log_modified` is invertible on the whole real line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::{Prediction, Series};

/// Transformation applied to the data before training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    None,
    #[default]
    Log,
    LogModified,
}

impl TransformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Log => "log",
            Self::LogModified => "log_modified",
        }
    }

    /// Forward transform of a single value.
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Self::None => x,
            Self::Log => {
                if x == 0.0 {
                    0.0
                } else {
                    x.signum() * x.abs().ln()
                }
            }
            Self::LogModified => {
                if x == 0.0 {
                    0.0
                } else {
                    x.signum() * x.abs().ln_1p()
                }
            }
        }
    }

    /// Inverse transform of a single value.
    pub fn invert(&self, y: f64) -> f64 {
        match self {
            Self::None => y,
            Self::Log => {
                if y == 0.0 {
                    0.0
                } else {
                    y.signum() * y.abs().exp()
                }
            }
            Self::LogModified => {
                if y == 0.0 {
                    0.0
                } else {
                    y.signum() * y.abs().exp_m1()
                }
            }
        }
    }

    pub fn apply_slice(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|x| self.apply(*x)).collect()
    }

    pub fn invert_slice(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|y| self.invert(*y)).collect()
    }

    pub fn apply_series(&self, series: &Series) -> Series {
        series.map_values(|x| self.apply(x))
    }

    /// Undo the transform on every column of a prediction. Each bound is
    /// inverted from its own column.
    pub fn invert_prediction(&self, prediction: Prediction) -> Prediction {
        if *self == Self::None {
            return prediction;
        }
        Prediction {
            index: prediction.index,
            yhat: self.invert_slice(&prediction.yhat),
            yhat_lower: prediction.yhat_lower.map(|v| self.invert_slice(&v)),
            yhat_upper: prediction.yhat_upper.map(|v| self.invert_slice(&v)),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "log" => Ok(Self::Log),
            "log_modified" => Ok(Self::LogModified),
            other => Err(format!("Unknown transformation: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XS: [f64; 9] = [-4.0, -3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0, 4.0];

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_log_modified_values() {
        let res = TransformKind::LogModified.apply_slice(&XS);
        let expected = [
            -(5.0f64).ln(),
            -(4.0f64).ln(),
            -(3.0f64).ln(),
            -(2.0f64).ln(),
            0.0,
            (2.0f64).ln(),
            (3.0f64).ln(),
            (4.0f64).ln(),
            (5.0f64).ln(),
        ];
        for (r, e) in res.iter().zip(expected.iter()) {
            assert!(close(*r, *e), "{} != {}", r, e);
        }
    }

    #[test]
    fn test_log_modified_round_trip() {
        let kind = TransformKind::LogModified;
        let res = kind.invert_slice(&kind.apply_slice(&XS));
        for (r, x) in res.iter().zip(XS.iter()) {
            assert!(close(*r, *x), "{} != {}", r, x);
        }
    }

    #[test]
    fn test_log_modified_round_trip_wide_range() {
        let kind = TransformKind::LogModified;
        for x in [-1e6, -123.456, -0.5, -1e-8, 1e-8, 0.25, 7.0, 1e9] {
            assert!(close(kind.invert(kind.apply(x)), x));
        }
    }

    #[test]
    fn test_log_values_collapse_band() {
        let res = TransformKind::Log.apply_slice(&XS);
        assert_eq!(res[0], -(4.0f64).ln());
        assert_eq!(res[1], -(3.0f64).ln());
        assert_eq!(res[2], -(2.0f64).ln());
        assert_eq!(res[3], 0.0);
        assert_eq!(res[4], 0.0);
        assert_eq!(res[5], 0.0);
        assert_eq!(res[6], (2.0f64).ln());
        assert_eq!(res[7], (3.0f64).ln());
        assert_eq!(res[8], (4.0f64).ln());
    }

    #[test]
    fn test_log_round_trip_outside_band() {
        let kind = TransformKind::Log;
        for x in [-4.0, -3.0, -2.0, 0.0, 2.0, 3.0, 4.0, 1234.5] {
            assert!(close(kind.invert(kind.apply(x)), x));
        }
    }

    #[test]
    fn test_none_is_identity() {
        assert_eq!(TransformKind::None.apply(2.0), 2.0);
        assert_eq!(TransformKind::None.apply_slice(&XS), XS.to_vec());
        assert_eq!(TransformKind::None.invert_slice(&XS), XS.to_vec());
    }

    #[test]
    fn test_nan_passes_through() {
        assert!(TransformKind::Log.apply(f64::NAN).is_nan());
        assert!(TransformKind::LogModified.invert(f64::NAN).is_nan());
    }

    #[test]
    fn test_invert_prediction_uses_each_bound() {
        let index = vec![chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()];
        let kind = TransformKind::LogModified;
        let p = Prediction::point(index, vec![kind.apply(5.0)])
            .with_bounds(vec![kind.apply(1.0)], vec![kind.apply(9.0)]);
        let inv = kind.invert_prediction(p);
        assert!(close(inv.yhat[0], 5.0));
        assert!(close(inv.yhat_lower.unwrap()[0], 1.0));
        assert!(close(inv.yhat_upper.unwrap()[0], 9.0));
    }

    #[test]
    fn test_parse() {
        assert_eq!("log_modified".parse::<TransformKind>().unwrap(), TransformKind::LogModified);
        assert_eq!("None".parse::<TransformKind>().unwrap(), TransformKind::None);
        assert!("sqrt".parse::<TransformKind>().is_err());
        assert_eq!(TransformKind::default(), TransformKind::Log);
    }
}
