use std::sync::Arc;

use ndarray::{Array1, ArrayView1};
use sprs::{CsMat, TriMat};

use super::{accumulate_gram, accumulate_matrix, diagonal, spmv};

/// A weighted Gram term `jacᵀ diag(weights) jac`.
#[derive(Debug, Clone)]
pub struct WeightedGram {
    pub jac: Arc<CsMat<f64>>,
    pub jac_t: Arc<CsMat<f64>>,
    pub weights: Array1<f64>,
}

impl WeightedGram {
    fn apply_add(&self, x: ArrayView1<f64>, out: &mut Array1<f64>) {
        let mut r = spmv(&self.jac, x);
        r *= &self.weights;
        *out += &spmv(&self.jac_t, r.view());
    }
}

/// Matrix-free operator `base + Σ_k jac_kᵀ diag(w_k) jac_k`.
#[derive(Debug, Clone)]
pub struct HessianOperator {
    base: Arc<CsMat<f64>>,
    terms: Vec<WeightedGram>,
}

impl HessianOperator {
    pub fn new(base: Arc<CsMat<f64>>, terms: Vec<WeightedGram>) -> Self {
        HessianOperator { base, terms }
    }

    pub fn dim(&self) -> usize {
        self.base.rows()
    }

    pub fn apply(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let mut out = spmv(&self.base, x);
        for term in &self.terms {
            term.apply_add(x, &mut out);
        }
        out
    }

    pub fn diagonal(&self) -> Array1<f64> {
        let mut diag = diagonal(&self.base);
        for term in &self.terms {
            for (row, vec) in term.jac.outer_iterator().enumerate() {
                let w = term.weights[row];
                for (j, &a) in vec.iter() {
                    diag[j] += w * a * a;
                }
            }
        }
        diag
    }

    /// This method assembles the operator as an explicit CSR matrix.
    pub fn assemble(&self) -> CsMat<f64> {
        let n = self.dim();
        let mut tri = TriMat::new((n, n));
        accumulate_matrix(&mut tri, &self.base, 1.);
        for term in &self.terms {
            let weights = term.weights.to_vec();
            accumulate_gram(&mut tri, &term.jac, &weights, 1.);
        }
        tri.to_csr()
    }
}

/// Symmetric linear operator handed to the solvers, either assembled or
/// applied on the fly.
#[derive(Debug, Clone)]
pub enum LinearOperator {
    Matrix(Arc<CsMat<f64>>),
    MatrixFree(HessianOperator),
}

impl LinearOperator {
    pub fn dim(&self) -> usize {
        match self {
            LinearOperator::Matrix(mat) => mat.rows(),
            LinearOperator::MatrixFree(op) => op.dim(),
        }
    }

    pub fn apply(&self, x: ArrayView1<f64>) -> Array1<f64> {
        match self {
            LinearOperator::Matrix(mat) => spmv(mat, x),
            LinearOperator::MatrixFree(op) => op.apply(x),
        }
    }

    pub fn diagonal(&self) -> Array1<f64> {
        match self {
            LinearOperator::Matrix(mat) => diagonal(mat),
            LinearOperator::MatrixFree(op) => op.diagonal(),
        }
    }

    /// The assembled matrix, if any.
    pub fn as_matrix(&self) -> Option<&CsMat<f64>> {
        match self {
            LinearOperator::Matrix(mat) => Some(mat),
            LinearOperator::MatrixFree(_) => None,
        }
    }

    /// The operator as a CSR matrix, assembling it when it is matrix-free.
    pub fn to_matrix(&self) -> Arc<CsMat<f64>> {
        match self {
            LinearOperator::Matrix(mat) => Arc::clone(mat),
            LinearOperator::MatrixFree(op) => Arc::new(op.assemble()),
        }
    }
}
