use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, ArrayView1};
use sprs::CsMat;
use sprs_ldl::LdlNumeric;

use super::direct::factorize;
use super::krylov::{inverse_diagonal, pcg};
use super::{spmv, transpose, LinearOperator, LinearSolver};
use crate::error::{Result, RmtError};

const SMOOTHING_STEPS: usize = 2;
const JACOBI_DAMPING: f64 = 2. / 3.;

struct Level {
    mat: Arc<CsMat<f64>>,
    inv_diag: Array1<f64>,
    /// Prolongation to this level from the next coarser one.
    prolongation: CsMat<f64>,
    restriction: CsMat<f64>,
}

/// Conjugate gradient preconditioned by a geometric multigrid V-cycle.
///
/// Coarse operators are Galerkin products `Pᵀ A P` of the prolongation
/// matrices; the coarsest one is factorized. Without prolongation matrices,
/// or with a matrix-free operator, the preconditioner falls back to Jacobi.
pub struct MultigridSolver {
    tolerance: f64,
    operator: Option<LinearOperator>,
    levels: Vec<Level>,
    coarsest: Option<LdlNumeric<f64, usize>>,
    inv_diag: Array1<f64>,
}

impl MultigridSolver {
    pub fn new(tolerance: f64) -> Self {
        MultigridSolver {
            tolerance,
            operator: None,
            levels: Vec::new(),
            coarsest: None,
            inv_diag: Array1::zeros(0),
        }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len() + usize::from(self.coarsest.is_some())
    }

    fn smooth(level: &Level, b: ArrayView1<f64>, x: &mut Array1<f64>) {
        for _ in 0..SMOOTHING_STEPS {
            let r = &b - &spmv(&level.mat, x.view());
            *x += &(&r * &level.inv_diag * JACOBI_DAMPING);
        }
    }

    fn v_cycle(&self, depth: usize, b: ArrayView1<f64>) -> Array1<f64> {
        let level = match self.levels.get(depth) {
            Some(level) => level,
            None => {
                return match &self.coarsest {
                    Some(ldl) => Array1::from(ldl.solve(&b.to_vec()[..])),
                    None => b.to_owned(),
                }
            }
        };
        let mut x = Array1::zeros(b.len());
        Self::smooth(level, b, &mut x);
        let r = &b - &spmv(&level.mat, x.view());
        let coarse_r = spmv(&level.restriction, r.view());
        let coarse_e = self.v_cycle(depth + 1, coarse_r.view());
        x += &spmv(&level.prolongation, coarse_e.view());
        Self::smooth(level, b, &mut x);
        x
    }
}

impl fmt::Debug for MultigridSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultigridSolver")
            .field("tolerance", &self.tolerance)
            .field("num_levels", &self.num_levels())
            .finish()
    }
}

impl LinearSolver for MultigridSolver {
    fn initialize(&mut self, op: &LinearOperator, mg_matrices: &[CsMat<f64>]) -> Result<()> {
        self.levels.clear();
        self.coarsest = None;
        self.inv_diag = inverse_diagonal(op.diagonal());
        self.operator = Some(op.clone());

        let fine = match op.as_matrix() {
            Some(mat) if !mg_matrices.is_empty() => Arc::new(mat.clone()),
            _ => {
                log::debug!("multigrid unavailable, using a Jacobi preconditioner");
                return Ok(());
            }
        };

        let mut current = fine;
        for p in mg_matrices {
            if p.rows() != current.rows() {
                return Err(RmtError::DimensionMismatch {
                    what: "prolongation matrix rows",
                    expected: current.rows(),
                    found: p.rows(),
                });
            }
            let restriction = transpose(p);
            let coarse: CsMat<f64> = &(&restriction * &*current) * p;
            self.levels.push(Level {
                inv_diag: inverse_diagonal(super::diagonal(&current)),
                mat: current,
                prolongation: p.clone(),
                restriction,
            });
            current = Arc::new(coarse);
        }
        self.coarsest = Some(factorize(&current)?);
        log::debug!(
            "multigrid hierarchy with {} levels, coarsest size {}",
            self.num_levels(),
            current.rows()
        );
        Ok(())
    }

    fn solve(&self, rhs: ArrayView1<f64>, sol: &mut Array1<f64>) -> Result<()> {
        let op = self
            .operator
            .as_ref()
            .ok_or_else(|| RmtError::LinearSolve("solver is not initialized".to_string()))?;
        let max_iter = (10 * op.dim()).max(100);
        if self.coarsest.is_some() {
            pcg(op, rhs, sol, self.tolerance, max_iter, |r| self.v_cycle(0, r))
        } else {
            pcg(op, rhs, sol, self.tolerance, max_iter, |r| &r * &self.inv_diag)
        }
    }
}
