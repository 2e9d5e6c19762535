//! Step-length selection along a descent direction.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RmtError};


/// Sufficient-decrease constant of the Armijo condition.
const ARMIJO_C1: f64 = 1e-4;
const MAX_TRIALS: usize = 30;

/// Objective function seen by a line search.
pub trait ObjectiveFunction {
    fn value(&self, x: ArrayView1<f64>) -> f64;

    fn gradient(&self, x: ArrayView1<f64>) -> Array1<f64>;
}

/// A line search returns the next iterate along `direction` starting from
/// `x`, trying `initial_step` first.
pub trait LineSearch: fmt::Debug {
    fn search(
        &self,
        x: ArrayView1<f64>,
        direction: ArrayView1<f64>,
        objective: &dyn ObjectiveFunction,
        initial_step: f64,
    ) -> Array1<f64>;
}

fn step(x: ArrayView1<f64>, direction: ArrayView1<f64>, alpha: f64) -> Array1<f64> {
    let mut out = x.to_owned();
    out.scaled_add(alpha, &direction);
    out
}

/// Armijo backtracking, halving the step until sufficient decrease.
///
/// `x` is returned unchanged when `direction` is not a descent direction or
/// when no acceptable step is found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backtracking {
    pub shrink: f64,
}

impl Default for Backtracking {
    fn default() -> Self {
        Backtracking { shrink: 0.5 }
    }
}

impl LineSearch for Backtracking {
    fn search(
        &self,
        x: ArrayView1<f64>,
        direction: ArrayView1<f64>,
        objective: &dyn ObjectiveFunction,
        initial_step: f64,
    ) -> Array1<f64> {
        let f0 = objective.value(x);
        let slope = objective.gradient(x).dot(&direction);
        if !(slope < 0.) {
            log::debug!("line search: not a descent direction (slope {:e})", slope);
            return x.to_owned();
        }
        let mut alpha = initial_step;
        for _ in 0..MAX_TRIALS {
            let candidate = step(x, direction, alpha);
            let f = objective.value(candidate.view());
            if f <= f0 + ARMIJO_C1 * alpha * slope {
                return candidate;
            }
            alpha *= self.shrink;
        }
        log::debug!("line search: no sufficient decrease after {} trials", MAX_TRIALS);
        x.to_owned()
    }
}

/// Backtracking where each new trial step minimizes the quadratic
/// interpolating `φ(0)`, `φ'(0)` and `φ(α)`, safeguarded to `[0.1α, 0.5α]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quadratic;

impl LineSearch for Quadratic {
    fn search(
        &self,
        x: ArrayView1<f64>,
        direction: ArrayView1<f64>,
        objective: &dyn ObjectiveFunction,
        initial_step: f64,
    ) -> Array1<f64> {
        let f0 = objective.value(x);
        let slope = objective.gradient(x).dot(&direction);
        if !(slope < 0.) {
            return x.to_owned();
        }
        let mut alpha = initial_step;
        for _ in 0..MAX_TRIALS {
            let candidate = step(x, direction, alpha);
            let f = objective.value(candidate.view());
            if f <= f0 + ARMIJO_C1 * alpha * slope {
                return candidate;
            }
            let curvature = f - f0 - slope * alpha;
            let trial = if curvature > 0. && f.is_finite() {
                -slope * alpha * alpha / (2. * curvature)
            } else {
                0.5 * alpha
            };
            alpha = trial.clamp(0.1 * alpha, 0.5 * alpha);
        }
        x.to_owned()
    }
}

/// Takes the initial step unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FullStep;

impl LineSearch for FullStep {
    fn search(
        &self,
        x: ArrayView1<f64>,
        direction: ArrayView1<f64>,
        _objective: &dyn ObjectiveFunction,
        initial_step: f64,
    ) -> Array1<f64> {
        step(x, direction, initial_step)
    }
}

/// Line search selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineSearchKind {
    #[serde(rename = "backtracking")]
    Backtracking,
    #[serde(rename = "quadratic")]
    Quadratic,
    #[serde(rename = "null")]
    Null,
}

impl LineSearchKind {
    pub fn build(&self) -> Box<dyn LineSearch> {
        match self {
            LineSearchKind::Backtracking => Box::new(Backtracking::default()),
            LineSearchKind::Quadratic => Box::new(Quadratic),
            LineSearchKind::Null => Box::new(FullStep),
        }
    }
}

impl Default for LineSearchKind {
    fn default() -> Self {
        LineSearchKind::Backtracking
    }
}

impl fmt::Display for LineSearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineSearchKind::Backtracking => "backtracking",
            LineSearchKind::Quadratic => "quadratic",
            LineSearchKind::Null => "null",
        };
        f.write_str(name)
    }
}

impl FromStr for LineSearchKind {
    type Err = RmtError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "backtracking" | "armijo" => Ok(LineSearchKind::Backtracking),
            "quadratic" | "bracketed" => Ok(LineSearchKind::Quadratic),
            "null" | "none" => Ok(LineSearchKind::Null),
            other => Err(RmtError::configuration(
                "line_search",
                format!("unknown line search `{}`", other),
            )),
        }
    }
}
