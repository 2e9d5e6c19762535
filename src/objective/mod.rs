//! The p-norm fit objective of one output column.
//!
//! ```ignore
//! F(c)   = 0.5 cᵀHc + 0.5 Σ_k Σ_i |r_ki|^p,   r_k = J_k c - t_k
//! ∇F(c)  = Hc + 0.5 p Σ_k J_kᵀ (sgn(r_k) |r_k|^(p-1))
//! ∇²F(c) = H + 0.5 p (p-1) Σ_k J_kᵀ diag(|r_k|^(p-2)) J_k
//! ```
//!
//! For even integer `p` these coincide with the plain powers of the residual.

use std::sync::Arc;

use ndarray::{Array1, ArrayView1};
use sprs::CsMat;

use crate::approximation::{ApproxJacobianSet, ApproxTerm};
use crate::line_search::ObjectiveFunction;
use crate::linalg::{spmv, HessianOperator, LinearOperator, WeightedGram};


/// `sgn(x) |x|^e`.
pub fn signed_power(x: f64, e: f64) -> f64 {
    x.signum() * x.abs().powf(e)
}

#[derive(Debug, Clone)]
struct Term {
    approx: ApproxTerm,
    target: Array1<f64>,
}

/// Objective of the fit of one output column.
#[derive(Debug, Clone)]
pub struct PNormObjective {
    hessian: Arc<CsMat<f64>>,
    terms: Vec<Term>,
    p: f64,
}

impl PNormObjective {
    /// `targets` holds one column per term of `approx`, in its iteration
    /// order.
    pub fn new(
        hessian: Arc<CsMat<f64>>,
        approx: &ApproxJacobianSet,
        targets: Vec<Array1<f64>>,
        p: f64,
    ) -> Self {
        let terms = approx
            .iter()
            .zip(targets)
            .map(|((_, term), target)| Term {
                approx: term.clone(),
                target,
            })
            .collect();
        PNormObjective { hessian, terms, p }
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn dim(&self) -> usize {
        self.hessian.rows()
    }

    fn residuals(&self, c: ArrayView1<f64>) -> Vec<Array1<f64>> {
        self.terms
            .iter()
            .map(|term| spmv(&term.approx.jac, c) - &term.target)
            .collect()
    }

    pub fn value(&self, c: ArrayView1<f64>) -> f64 {
        let energy = 0.5 * c.dot(&spmv(&self.hessian, c));
        let approx: f64 = self
            .residuals(c)
            .iter()
            .flat_map(|r| r.iter())
            .map(|r| r.abs().powf(self.p))
            .sum();
        energy + 0.5 * approx
    }

    pub fn gradient(&self, c: ArrayView1<f64>) -> Array1<f64> {
        let mut grad = spmv(&self.hessian, c);
        let scale = 0.5 * self.p;
        for (term, r) in self.terms.iter().zip(self.residuals(c)) {
            let powered = r.mapv(|v| scale * signed_power(v, self.p - 1.));
            grad += &spmv(&term.approx.jac_t, powered.view());
        }
        grad
    }

    fn weighted_terms(&self, weights: Vec<Array1<f64>>) -> Vec<WeightedGram> {
        self.terms
            .iter()
            .zip(weights)
            .map(|(term, weights)| WeightedGram {
                jac: Arc::clone(&term.approx.jac),
                jac_t: Arc::clone(&term.approx.jac_t),
                weights,
            })
            .collect()
    }

    fn operator(&self, weights: Vec<Array1<f64>>, matrix_free: bool) -> LinearOperator {
        let op = HessianOperator::new(Arc::clone(&self.hessian), self.weighted_terms(weights));
        if matrix_free {
            LinearOperator::MatrixFree(op)
        } else {
            LinearOperator::Matrix(Arc::new(op.assemble()))
        }
    }

    /// The Hessian `∇²F(c)`, assembled or matrix-free. Both forms have the
    /// same action.
    pub fn hessian(&self, c: ArrayView1<f64>, matrix_free: bool) -> LinearOperator {
        let scale = 0.5 * self.p * (self.p - 1.);
        let weights = self
            .residuals(c)
            .into_iter()
            .map(|r| r.mapv(|v| scale * v.abs().powf(self.p - 2.)))
            .collect();
        self.operator(weights, matrix_free)
    }

    /// The operator `H + Σ_k J_kᵀ J_k` of the least-squares (`p = 2`) fit.
    pub fn least_squares_operator(&self, matrix_free: bool) -> LinearOperator {
        let weights = self
            .terms
            .iter()
            .map(|term| Array1::ones(term.target.len()))
            .collect();
        self.operator(weights, matrix_free)
    }

    /// `-∇F(0)` of the least-squares fit, `Σ_k J_kᵀ t_k`.
    pub fn least_squares_rhs(&self) -> Array1<f64> {
        let mut rhs = Array1::zeros(self.dim());
        for term in &self.terms {
            rhs += &spmv(&term.approx.jac_t, term.target.view());
        }
        rhs
    }
}

impl ObjectiveFunction for PNormObjective {
    fn value(&self, x: ArrayView1<f64>) -> f64 {
        PNormObjective::value(self, x)
    }

    fn gradient(&self, x: ArrayView1<f64>) -> Array1<f64> {
        PNormObjective::gradient(self, x)
    }
}
