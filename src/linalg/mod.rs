//! Sparse linear algebra used by the fitting engine: the operator abstraction
//! shared by explicit and matrix-free Hessians, and the linear solvers.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};

use crate::error::{Result, RmtError};

mod direct;
mod krylov;
mod multigrid;
mod operator;

pub use direct::DirectSolver;
pub use krylov::KrylovSolver;
pub use multigrid::MultigridSolver;
pub use operator::{HessianOperator, LinearOperator, WeightedGram};


/// Solver of the symmetric positive definite systems arising in the fit.
///
/// `initialize` is called once per operator; `solve` may then be called for
/// any number of right-hand sides. `sol` holds the initial guess on entry for
/// iterative solvers and the solution on exit.
pub trait LinearSolver: fmt::Debug {
    fn initialize(&mut self, op: &LinearOperator, mg_matrices: &[CsMat<f64>]) -> Result<()>;

    fn solve(&self, rhs: ArrayView1<f64>, sol: &mut Array1<f64>) -> Result<()>;
}

/// Linear solver selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    /// Sparse LDLᵀ factorization
    #[serde(rename = "direct")]
    Direct,
    /// Jacobi-preconditioned conjugate gradient
    #[serde(rename = "krylov")]
    Krylov,
    /// Conjugate gradient preconditioned by a multigrid V-cycle
    #[serde(rename = "krylov-mg")]
    Multigrid,
}

impl SolverKind {
    /// This method builds a fresh solver. `tolerance` is the relative residual
    /// targeted by the iterative solvers.
    pub fn build(&self, tolerance: f64) -> Box<dyn LinearSolver> {
        match self {
            SolverKind::Direct => Box::new(DirectSolver::new()),
            SolverKind::Krylov => Box::new(KrylovSolver::new(tolerance)),
            SolverKind::Multigrid => Box::new(MultigridSolver::new(tolerance)),
        }
    }
}

impl Default for SolverKind {
    fn default() -> Self {
        SolverKind::Direct
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverKind::Direct => "direct",
            SolverKind::Krylov => "krylov",
            SolverKind::Multigrid => "krylov-mg",
        };
        f.write_str(name)
    }
}

impl FromStr for SolverKind {
    type Err = RmtError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "direct" | "ldl" | "lu" => Ok(SolverKind::Direct),
            "krylov" | "cg" => Ok(SolverKind::Krylov),
            "krylov-mg" | "mg" => Ok(SolverKind::Multigrid),
            other => Err(RmtError::configuration(
                "solver",
                format!("unknown solver `{}`", other),
            )),
        }
    }
}

/// Adds `scale · Σ_r weights[r] · jac[r, :]ᵀ jac[r, :]` to `tri`.
///
/// Each row contributes the outer product of its non-zeros, so the result
/// keeps the sparsity of `jacᵀ jac` without a sparse-sparse product.
/// Duplicate entries are summed when `tri` is converted.
pub(crate) fn accumulate_gram(tri: &mut TriMat<f64>, jac: &CsMat<f64>, weights: &[f64], scale: f64) {
    debug_assert!(jac.is_csr());
    for (row, vec) in jac.outer_iterator().enumerate() {
        let w = scale * weights[row];
        if w == 0. {
            continue;
        }
        for (i, &a) in vec.iter() {
            for (j, &b) in vec.iter() {
                tri.add_triplet(i, j, w * a * b);
            }
        }
    }
}

/// Adds every stored entry of `mat` to `tri`, scaled by `scale`.
pub(crate) fn accumulate_matrix(tri: &mut TriMat<f64>, mat: &CsMat<f64>, scale: f64) {
    for (&val, (i, j)) in mat.iter() {
        tri.add_triplet(i, j, scale * val);
    }
}

/// Diagonal of a square sparse matrix.
pub(crate) fn diagonal(mat: &CsMat<f64>) -> Array1<f64> {
    let mut diag = Array1::zeros(mat.rows().min(mat.cols()));
    for (&val, (i, j)) in mat.iter() {
        if i == j {
            diag[i] += val;
        }
    }
    diag
}

/// Sparse-dense product `mat · x`.
pub(crate) fn spmv(mat: &CsMat<f64>, x: ArrayView1<f64>) -> Array1<f64> {
    let mut out = Array1::zeros(mat.rows());
    if mat.is_csr() {
        for (row, vec) in mat.outer_iterator().enumerate() {
            out[row] = vec.iter().map(|(j, &v)| v * x[j]).sum();
        }
    } else {
        for (col, vec) in mat.outer_iterator().enumerate() {
            let xj = x[col];
            for (i, &v) in vec.iter() {
                out[i] += v * xj;
            }
        }
    }
    out
}

/// Transposed copy of `mat`, in CSR storage.
pub(crate) fn transpose(mat: &CsMat<f64>) -> CsMat<f64> {
    mat.transpose_view().to_csr()
}

/// Sparse-dense product `mat · b`.
pub(crate) fn spmm(mat: &CsMat<f64>, b: ArrayView2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((mat.rows(), b.ncols()));
    for (&val, (i, j)) in mat.iter() {
        out.row_mut(i).scaled_add(val, &b.row(j));
    }
    out
}
