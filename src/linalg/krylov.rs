use ndarray::{Array1, ArrayView1};
use sprs::CsMat;

use super::{LinearOperator, LinearSolver};
use crate::error::{Result, RmtError};

/// Jacobi-preconditioned conjugate gradient.
#[derive(Debug, Clone)]
pub struct KrylovSolver {
    tolerance: f64,
    operator: Option<LinearOperator>,
    inv_diag: Array1<f64>,
}

impl KrylovSolver {
    pub fn new(tolerance: f64) -> Self {
        KrylovSolver {
            tolerance,
            operator: None,
            inv_diag: Array1::zeros(0),
        }
    }
}

/// Inverse of a diagonal, with zero entries mapped to one.
pub(crate) fn inverse_diagonal(diag: Array1<f64>) -> Array1<f64> {
    diag.mapv(|d| if d != 0. && d.is_finite() { 1. / d } else { 1. })
}

/// Preconditioned conjugate gradient on `op x = rhs`, starting from `sol`.
///
/// Stops when `‖r‖ ≤ tolerance · ‖rhs‖`. Running out of iterations is
/// logged and the last iterate is kept.
pub(crate) fn pcg<P>(
    op: &LinearOperator,
    rhs: ArrayView1<f64>,
    sol: &mut Array1<f64>,
    tolerance: f64,
    max_iter: usize,
    precond: P,
) -> Result<()>
where
    P: Fn(ArrayView1<f64>) -> Array1<f64>,
{
    let n = op.dim();
    if sol.len() != n {
        *sol = Array1::zeros(n);
    }
    let rhs_norm = rhs.dot(&rhs).sqrt();
    if rhs_norm == 0. {
        sol.fill(0.);
        return Ok(());
    }
    let target = tolerance * rhs_norm;

    let mut r = &rhs - &op.apply(sol.view());
    let mut res_norm = r.dot(&r).sqrt();
    if res_norm <= target {
        return Ok(());
    }
    let mut z = precond(r.view());
    let mut rz = r.dot(&z);
    if !(rz > 0.) {
        z = r.clone();
        rz = r.dot(&r);
    }
    let mut p = z;

    for it in 0..max_iter {
        let ap = op.apply(p.view());
        let pap = p.dot(&ap);
        if !(pap > 0.) {
            return Err(RmtError::LinearSolve(format!(
                "operator is not positive definite (pᵀAp = {:e} at iteration {})",
                pap, it
            )));
        }
        let alpha = rz / pap;
        sol.scaled_add(alpha, &p);
        r.scaled_add(-alpha, &ap);
        res_norm = r.dot(&r).sqrt();
        if res_norm <= target {
            log::trace!("conjugate gradient converged in {} iterations", it + 1);
            return Ok(());
        }
        let mut z = precond(r.view());
        let mut rz_new = r.dot(&z);
        if !(rz_new > 0.) {
            z = r.clone();
            rz_new = r.dot(&r);
        }
        let beta = rz_new / rz;
        rz = rz_new;
        p = &z + &(&p * beta);
    }

    log::warn!(
        "conjugate gradient did not converge in {} iterations (relative residual {:e})",
        max_iter,
        res_norm / rhs_norm
    );
    Ok(())
}

impl LinearSolver for KrylovSolver {
    fn initialize(&mut self, op: &LinearOperator, _mg_matrices: &[CsMat<f64>]) -> Result<()> {
        self.inv_diag = inverse_diagonal(op.diagonal());
        self.operator = Some(op.clone());
        Ok(())
    }

    fn solve(&self, rhs: ArrayView1<f64>, sol: &mut Array1<f64>) -> Result<()> {
        let op = self
            .operator
            .as_ref()
            .ok_or_else(|| RmtError::LinearSolve("solver is not initialized".to_string()))?;
        let max_iter = (10 * op.dim()).max(100);
        pcg(op, rhs, sol, self.tolerance, max_iter, |r| &r * &self.inv_diag)
    }
}
