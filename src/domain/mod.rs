use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RmtError};


/// Closed rectangular domain `[a_0, b_0] × ... × [a_{nx-1}, b_{nx-1}]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainBounds {
    limits: Array2<f64>,
}

impl DomainBounds {
    /// This method builds the domain from an `nx × 2` array of lower and upper
    /// bounds. Every bound must be finite and every lower bound strictly
    /// smaller than its upper bound.
    pub fn new(xlimits: Array2<f64>) -> Result<Self> {
        if xlimits.ncols() != 2 {
            return Err(RmtError::configuration(
                "xlimits",
                format!("expected 2 columns, found {}", xlimits.ncols()),
            ));
        }
        if xlimits.nrows() == 0 {
            return Err(RmtError::configuration("xlimits", "at least one dimension is required"));
        }
        for (dim, row) in xlimits.rows().into_iter().enumerate() {
            let (lower, upper) = (row[0], row[1]);
            if !lower.is_finite() || !upper.is_finite() {
                return Err(RmtError::configuration(
                    "xlimits",
                    format!("bounds of dimension {} are not finite", dim),
                ));
            }
            if lower >= upper {
                return Err(RmtError::configuration(
                    "xlimits",
                    format!(
                        "lower bound {} is not below upper bound {} in dimension {}",
                        lower, upper, dim
                    ),
                ));
            }
        }
        Ok(DomainBounds { limits: xlimits })
    }

    /// Wraps bounds that already went through [`DomainBounds::new`].
    pub(crate) fn from_checked(xlimits: Array2<f64>) -> Self {
        DomainBounds { limits: xlimits }
    }

    pub fn nx(&self) -> usize {
        self.limits.nrows()
    }

    pub fn lower(&self, dim: usize) -> f64 {
        self.limits[[dim, 0]]
    }

    pub fn upper(&self, dim: usize) -> f64 {
        self.limits[[dim, 1]]
    }

    pub fn width(&self, dim: usize) -> f64 {
        self.upper(dim) - self.lower(dim)
    }

    /// This method is a getter for the `nx × 2` bounds array.
    pub fn limits(&self) -> ArrayView2<f64> {
        self.limits.view()
    }

    pub fn contains(&self, x: ArrayView1<f64>) -> bool {
        x.iter()
            .enumerate()
            .all(|(dim, &v)| v >= self.lower(dim) && v <= self.upper(dim))
    }

    /// This method checks that every point of `x` lies in the closed domain.
    ///
    /// The per-dimension extrema are screened first; the offending point is
    /// only searched for when a violation exists. `context` names the point
    /// set in the returned error.
    pub fn check_points(&self, x: ArrayView2<f64>, context: &str) -> Result<()> {
        if x.ncols() != self.nx() {
            return Err(RmtError::DimensionMismatch {
                what: "point dimension",
                expected: self.nx(),
                found: x.ncols(),
            });
        }
        if x.nrows() == 0 {
            return Ok(());
        }
        for (dim, column) in x.axis_iter(Axis(1)).enumerate() {
            let (lower, upper) = (self.lower(dim), self.upper(dim));
            let within = match (column.min(), column.max()) {
                (Ok(&min), Ok(&max)) => min >= lower && max <= upper,
                _ => false,
            };
            if within {
                continue;
            }
            // NaN coordinates fail both comparisons and are reported as well.
            if let Some((point, &value)) = column
                .iter()
                .enumerate()
                .find(|&(_, &v)| !(v >= lower && v <= upper))
            {
                return Err(RmtError::OutOfDomain {
                    context: context.to_string(),
                    point,
                    dim,
                    value,
                    lower,
                    upper,
                });
            }
        }
        Ok(())
    }

    /// This method projects every point onto the closed domain.
    pub fn clamp(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut clamped = x.to_owned();
        for (dim, mut column) in clamped.axis_iter_mut(Axis(1)).enumerate() {
            let (lower, upper) = (self.lower(dim), self.upper(dim));
            column.mapv_inplace(|v| v.max(lower).min(upper));
        }
        clamped
    }

    /// This method computes, for every point, the signed offset from the
    /// nearest point of the closed domain. Rows of interior points are zero.
    pub fn external_offsets(&self, x: ArrayView2<f64>) -> Array2<f64> {
        &x - &self.clamp(x)
    }
}
