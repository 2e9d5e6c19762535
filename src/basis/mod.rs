//! Jacobian assembly for tensor-product bases.
//!
//! The fitting engine never looks at basis functions directly: it only asks
//! an assembler for sparse matrices mapping the coefficient vector to values
//! or derivatives at a set of points.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use sprs::CsMat;

mod bspline;

pub use bspline::{BSpline1d, BSplineAssembler};

#[cfg(test)]
mod tests;

/// Sizing record of a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sizing {
    /// Number of input dimensions
    pub x: usize,
    /// Number of output dimensions
    pub y: usize,
    /// Number of basis coefficients
    pub coeff: usize,
    /// Number of unknowns of the linear systems
    pub dof: usize,
    /// Number of non-zero basis functions at any point
    pub support: usize,
    /// Number of tensor-product elements
    pub elem: usize,
}

/// Assembler of sparse Jacobians of a tensor-product basis.
///
/// Derivative indices follow the training-set convention: `0` means no
/// derivative and `d + 1` means a derivative along input dimension `d`.
/// `compute_jac(kx, ix, x)` applies both derivatives, so `kx == ix` yields a
/// second derivative and `kx != ix` a mixed one.
pub trait JacobianAssembler {
    fn nx(&self) -> usize;

    fn num_coefficients(&self) -> usize;

    fn sizing(&self, ny: usize) -> Sizing;

    /// Returns the `n × coeff` CSR matrix of the requested derivative at the
    /// points `x`, each point being first projected onto the domain.
    fn compute_jac(&self, kx: usize, ix: usize, x: ArrayView2<f64>) -> CsMat<f64>;

    /// Returns the `coeff × coeff` curvature energy
    /// `Σ_i smoothness[i] ∫ (∂²f/∂x_i²)² dx`.
    fn energy_hessian(&self, smoothness: &[f64]) -> CsMat<f64>;

    /// Returns the prolongation matrices from each multigrid level to the
    /// next finer one, finest first.
    fn prolongation_matrices(&self, _mg_factors: &[usize]) -> Vec<CsMat<f64>> {
        Vec::new()
    }
}

/// Expands per-dimension `(index, value)` lists into the entries of their
/// tensor product. Dimension 0 varies slowest in the flattened index.
pub(crate) fn tensor_entries(per_dim: &[Vec<(usize, f64)>], sizes: &[usize]) -> Vec<(usize, f64)> {
    let mut entries = vec![(0usize, 1.0)];
    for (dim_entries, &size) in per_dim.iter().zip(sizes) {
        entries = entries
            .iter()
            .flat_map(|&(idx, val)| {
                dim_entries
                    .iter()
                    .map(move |&(j, b)| (idx * size + j, val * b))
            })
            .collect();
    }
    entries
}
