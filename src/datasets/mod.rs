use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{Result, RmtError};


/// Training data of a surrogate model.
///
/// Observations are grouped by derivative order: order `0` holds function
/// values and order `k > 0` holds the partial derivative with respect to the
/// input dimension `k - 1`. Each order stores a pair `(xt, yt)` of input
/// points (`n × nx`) and targets (`n × ny`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    points: BTreeMap<usize, (Array2<f64>, Array2<f64>)>,
}

impl TrainingSet {
    /// This method instantiates an empty training set.
    pub fn new() -> Self {
        TrainingSet::default()
    }

    /// This method sets the function values `yt` observed at `xt`. A previous
    /// set of values is replaced.
    pub fn set_values(&mut self, xt: Array2<f64>, yt: Array2<f64>) -> Result<&mut Self> {
        self.insert(0, xt, yt)
    }

    /// This method sets the partial derivatives with respect to the input
    /// dimension `dim` (0-based) observed at `xt`.
    pub fn set_derivatives(
        &mut self,
        xt: Array2<f64>,
        yt: Array2<f64>,
        dim: usize,
    ) -> Result<&mut Self> {
        let nx = xt.len_of(Axis(1));
        if dim >= nx {
            return Err(RmtError::DimensionMismatch {
                what: "derivative dimension",
                expected: nx,
                found: dim,
            });
        }
        self.insert(dim + 1, xt, yt)
    }

    fn insert(&mut self, kx: usize, xt: Array2<f64>, yt: Array2<f64>) -> Result<&mut Self> {
        if xt.nrows() != yt.nrows() {
            return Err(RmtError::DimensionMismatch {
                what: "number of training targets",
                expected: xt.nrows(),
                found: yt.nrows(),
            });
        }
        if let Some((other_x, other_y)) = self
            .points
            .iter()
            .find(|&(&order, _)| order != kx)
            .map(|(_, pair)| pair)
        {
            if other_x.ncols() != xt.ncols() {
                return Err(RmtError::DimensionMismatch {
                    what: "training input dimension",
                    expected: other_x.ncols(),
                    found: xt.ncols(),
                });
            }
            if other_y.ncols() != yt.ncols() {
                return Err(RmtError::DimensionMismatch {
                    what: "training output dimension",
                    expected: other_y.ncols(),
                    found: yt.ncols(),
                });
            }
        }
        self.points.insert(kx, (xt, yt));
        Ok(self)
    }

    /// Number of input dimensions, `None` for an empty training set.
    pub fn nx(&self) -> Option<usize> {
        self.points.values().next().map(|(xt, _)| xt.ncols())
    }

    /// Number of output dimensions, `None` for an empty training set.
    pub fn ny(&self) -> Option<usize> {
        self.points.values().next().map(|(_, yt)| yt.ncols())
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total number of observations over all derivative orders.
    pub fn n_observations(&self) -> usize {
        self.points.values().map(|(xt, _)| xt.nrows()).sum()
    }

    /// This method is a getter for the observations of a given derivative
    /// order.
    pub fn get(&self, kx: usize) -> Option<(ArrayView2<f64>, ArrayView2<f64>)> {
        self.points.get(&kx).map(|(xt, yt)| (xt.view(), yt.view()))
    }

    /// Iterates over `(order, xt, yt)` by increasing derivative order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, ArrayView2<f64>, ArrayView2<f64>)> {
        self.points
            .iter()
            .map(|(&kx, (xt, yt))| (kx, xt.view(), yt.view()))
    }
}
