use std::fmt;

use ndarray::{Array1, ArrayView1};
use sprs::{CsMat, FillInReduction, SymmetryCheck};
use sprs_ldl::{Ldl, LdlNumeric};

use super::{LinearOperator, LinearSolver};
use crate::error::{Result, RmtError};

/// Sparse LDLᵀ solver with reverse Cuthill-McKee ordering.
///
/// Matrix-free operators are assembled before factorization.
#[derive(Default)]
pub struct DirectSolver {
    factor: Option<LdlNumeric<f64, usize>>,
}

impl DirectSolver {
    pub fn new() -> Self {
        DirectSolver { factor: None }
    }
}

impl fmt::Debug for DirectSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectSolver")
            .field("factorized", &self.factor.is_some())
            .finish()
    }
}

pub(crate) fn factorize(mat: &CsMat<f64>) -> Result<LdlNumeric<f64, usize>> {
    let csc = mat.to_csc();
    let ldl = Ldl::new()
        .fill_in_reduction(FillInReduction::ReverseCuthillMcKee)
        .check_symmetry(SymmetryCheck::DontCheckSymmetry)
        .numeric(csc.view())?;
    if let Some((i, _)) = ldl.d().iter().enumerate().find(|&(_, &d)| !(d > 0.)) {
        return Err(RmtError::LinearSolve(format!(
            "matrix is not positive definite (pivot {})",
            i
        )));
    }
    Ok(ldl)
}

impl LinearSolver for DirectSolver {
    fn initialize(&mut self, op: &LinearOperator, _mg_matrices: &[CsMat<f64>]) -> Result<()> {
        let mat = op.to_matrix();
        self.factor = Some(factorize(&mat)?);
        Ok(())
    }

    fn solve(&self, rhs: ArrayView1<f64>, sol: &mut Array1<f64>) -> Result<()> {
        let factor = self
            .factor
            .as_ref()
            .ok_or_else(|| RmtError::LinearSolve("solver is not initialized".to_string()))?;
        let rhs = rhs.to_vec();
        let x = factor.solve(&rhs[..]);
        if x.iter().any(|v| !v.is_finite()) {
            return Err(RmtError::LinearSolve("non-finite solution".to_string()));
        }
        *sol = Array1::from(x);
        Ok(())
    }
}
