use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1};
use sprs::CsMat;

use crate::approximation::ApproxJacobianSet;
use crate::datasets::TrainingSet;
use crate::diagnostics::Printer;
use crate::error::{Result, RmtError};
use crate::hyperparams::RmtValidParams;
use crate::line_search::LineSearch;
use crate::linalg::LinearSolver;
use crate::objective::PNormObjective;


/// Newton iterations stop once the gradient norm falls below this value.
pub const GRADIENT_TOLERANCE: f64 = 1e-16;

fn norm(x: &Array1<f64>) -> f64 {
    x.dot(x).sqrt()
}

/// This function fits every output column and returns the `dof × ny`
/// coefficient matrix.
///
/// Each column first gets the least-squares (`p = 2`) solution; when
/// `approx_norm != 2` and `max_nln_iter > 0`, damped Newton iterations on the
/// p-norm objective follow, starting from it. Running out of iterations is
/// not an error, and a failed Newton step keeps the current iterate: only a
/// failed least-squares solve aborts the fit.
pub fn fit_columns(
    params: &RmtValidParams,
    hessian: Arc<CsMat<f64>>,
    approx: &ApproxJacobianSet,
    training: &TrainingSet,
    mg_matrices: &[CsMat<f64>],
    printer: &Printer,
) -> Result<Array2<f64>> {
    let ny = training.ny().ok_or(RmtError::EmptyTrainingSet)?;
    let dof = hessian.rows();
    let p = params.approx_norm();
    let objectives = (0..ny)
        .map(|iy| {
            let targets = approx.targets(training, iy)?;
            Ok(PNormObjective::new(Arc::clone(&hessian), approx, targets, p))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut coefficients = Array2::zeros((dof, ny));
    if objectives.is_empty() {
        return Ok(coefficients);
    }
    let mut solver = params.solver().build(params.solver_tolerance());
    {
        let _scope = printer.timed("Solving initial linear problem");
        let op = objectives[0].least_squares_operator(params.use_mtx_free());
        solver.initialize(&op, mg_matrices)?;
        for (iy, objective) in objectives.iter().enumerate() {
            let rhs = objective.least_squares_rhs();
            let mut sol = Array1::zeros(dof);
            solver.solve(rhs.view(), &mut sol)?;
            coefficients.column_mut(iy).assign(&sol);
        }
    }

    if p == 2. || params.max_nln_iter() == 0 {
        return Ok(coefficients);
    }

    let newton = Newton {
        params,
        line_search: params.line_search().build(),
        mg_matrices,
        printer,
    };
    for (iy, objective) in objectives.iter().enumerate() {
        let _scope = printer.timed(format!("Solving nonlinear problem (col. {})", iy));
        let start = coefficients.column(iy).to_owned();
        let sol = newton.minimize(objective, start, solver.as_mut(), iy);
        coefficients.column_mut(iy).assign(&sol);
    }
    Ok(coefficients)
}

/// Damped Newton minimization of one column's objective.
struct Newton<'a> {
    params: &'a RmtValidParams,
    line_search: Box<dyn LineSearch>,
    mg_matrices: &'a [CsMat<f64>],
    printer: &'a Printer,
}

impl Newton<'_> {
    fn minimize(
        &self,
        objective: &PNormObjective,
        mut c: Array1<f64>,
        solver: &mut dyn LinearSolver,
        column: usize,
    ) -> Array1<f64> {
        let mut grad = objective.gradient(c.view());
        self.printer
            .iteration(0, column, norm(&grad), objective.value(c.view()));

        for iteration in 0..self.params.max_nln_iter() {
            let direction = match self.newton_direction(objective, c.view(), &grad, solver) {
                Ok(direction) => direction,
                Err(e) => {
                    log::warn!("stopping Newton iterations of column {}: {}", column, e);
                    self.printer.message(format!(
                        "Newton step {} of column {} failed, keeping the current iterate",
                        iteration + 1,
                        column
                    ));
                    break;
                }
            };

            c = self
                .line_search
                .search(c.view(), direction.view(), objective, 1.);
            grad = objective.gradient(c.view());
            let grad_norm = norm(&grad);
            self.printer
                .iteration(iteration + 1, column, grad_norm, objective.value(c.view()));
            if grad_norm < GRADIENT_TOLERANCE {
                break;
            }
        }
        c
    }

    fn newton_direction(
        &self,
        objective: &PNormObjective,
        c: ArrayView1<f64>,
        grad: &Array1<f64>,
        solver: &mut dyn LinearSolver,
    ) -> Result<Array1<f64>> {
        let hessian = objective.hessian(c, self.params.use_mtx_free());
        solver.initialize(&hessian, self.mg_matrices)?;
        let rhs = -grad;
        let mut direction = Array1::zeros(c.len());
        solver.solve(rhs.view(), &mut direction)?;
        Ok(direction)
    }
}
