use ndarray::Array2;
use serde::Serialize;

use crate::domain::DomainBounds;
use crate::error::{Result, RmtError};
use crate::line_search::LineSearchKind;
use crate::linalg::SolverKind;
use crate::param_guard::ParamGuard;


/// A verified hyperparameter set ready for the fitting of an RMT surrogate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RmtValidParams {
    xlimits: Array2<f64>,
    smoothness: Vec<f64>,
    energy_weight: f64,
    reg_dv: f64,
    reg_cons: f64,
    extrapolate: bool,
    min_energy: bool,
    approx_norm: f64,
    use_mtx_free: bool,
    solver: SolverKind,
    solver_tolerance: f64,
    max_nln_iter: usize,
    line_search: LineSearchKind,
    mg_factors: Vec<usize>,
    save_solution: bool,
    max_print_depth: usize,
    order: Vec<usize>,
    num_ctrl_pts: Vec<usize>,
    name: String,
}

/// Repeats a single value over `nx` dimensions.
fn broadcast<T: Copy>(values: &[T], nx: usize) -> Vec<T> {
    if values.len() == 1 {
        vec![values[0]; nx]
    } else {
        values.to_vec()
    }
}

impl RmtValidParams {
    pub fn xlimits(&self) -> &Array2<f64> {
        &self.xlimits
    }

    /// The validated domain described by `xlimits`.
    pub fn domain(&self) -> DomainBounds {
        DomainBounds::from_checked(self.xlimits.clone())
    }

    pub fn nx(&self) -> usize {
        self.xlimits.nrows()
    }

    pub fn smoothness(&self) -> &[f64] {
        &self.smoothness
    }

    /// Smoothness factors, one per input dimension.
    pub fn smoothness_per_dim(&self) -> Vec<f64> {
        broadcast(&self.smoothness, self.nx())
    }

    pub fn energy_weight(&self) -> f64 {
        self.energy_weight
    }

    pub fn reg_dv(&self) -> f64 {
        self.reg_dv
    }

    pub fn reg_cons(&self) -> f64 {
        self.reg_cons
    }

    pub fn extrapolate(&self) -> bool {
        self.extrapolate
    }

    pub fn min_energy(&self) -> bool {
        self.min_energy
    }

    pub fn approx_norm(&self) -> f64 {
        self.approx_norm
    }

    pub fn use_mtx_free(&self) -> bool {
        self.use_mtx_free
    }

    pub fn solver(&self) -> SolverKind {
        self.solver
    }

    pub fn solver_tolerance(&self) -> f64 {
        self.solver_tolerance
    }

    pub fn max_nln_iter(&self) -> usize {
        self.max_nln_iter
    }

    pub fn line_search(&self) -> LineSearchKind {
        self.line_search
    }

    pub fn mg_factors(&self) -> &[usize] {
        &self.mg_factors
    }

    pub fn save_solution(&self) -> bool {
        self.save_solution
    }

    pub fn max_print_depth(&self) -> usize {
        self.max_print_depth
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn order_per_dim(&self) -> Vec<usize> {
        broadcast(&self.order, self.nx())
    }

    pub fn num_ctrl_pts(&self) -> &[usize] {
        &self.num_ctrl_pts
    }

    pub fn num_ctrl_pts_per_dim(&self) -> Vec<usize> {
        broadcast(&self.num_ctrl_pts, self.nx())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A hyper-parameter set during construction
///
/// Configures and minimizes the following objective function, for each output
/// column:
/// ```ignore
/// 0.5 * c^T (reg_dv * I + energy_weight * E) c
///     + 0.5 * sum_k ||J_k c - t_k||_p^p
/// ```
/// where `E` is the curvature energy weighted by `smoothness`, `J_k` the
/// Jacobian of the training values (`k = 0`) or derivatives and
/// `p = approx_norm`.
#[derive(Debug, Clone, PartialEq)]
pub struct RmtParams(RmtValidParams);

/// Configure and fit an RMT surrogate
impl RmtParams {
    /// Create default hyper parameters over the domain `xlimits`, an
    /// `nx × 2` array of lower and upper bounds.
    pub fn new(xlimits: Array2<f64>) -> RmtParams {
        Self(RmtValidParams {
            xlimits,
            smoothness: vec![1.],
            energy_weight: 1e-4,
            reg_dv: 1e-10,
            reg_cons: 1e-10,
            extrapolate: false,
            min_energy: true,
            approx_norm: 4.,
            use_mtx_free: false,
            solver: SolverKind::Direct,
            solver_tolerance: 1e-12,
            max_nln_iter: 10,
            line_search: LineSearchKind::Backtracking,
            mg_factors: Vec::new(),
            save_solution: false,
            max_print_depth: 100,
            order: vec![3],
            num_ctrl_pts: vec![15],
            name: "RMTB".to_string(),
        })
    }

    /// Set the smoothness factor of the curvature energy along each
    /// dimension, either one value for all dimensions or one per dimension.
    /// Defaults to `[1.0]` if not set.
    pub fn smoothness(mut self, smoothness: Vec<f64>) -> Self {
        self.0.smoothness = smoothness;
        self
    }

    /// Set the weight of the curvature energy.
    ///
    /// Defaults to `1e-4` if not set.
    pub fn energy_weight(mut self, energy_weight: f64) -> Self {
        self.0.energy_weight = energy_weight;
        self
    }

    /// Set the regularization applied to every coefficient.
    ///
    /// Defaults to `1e-10` if not set.
    pub fn reg_dv(mut self, reg_dv: f64) -> Self {
        self.0.reg_dv = reg_dv;
        self
    }

    /// Set the regularization of continuity constraints. It has no effect
    /// with the B-spline basis.
    /// Defaults to `1e-10` if not set.
    pub fn reg_cons(mut self, reg_cons: f64) -> Self {
        self.0.reg_cons = reg_cons;
        self
    }

    /// Enables linear extrapolation outside of the domain at evaluation time.
    ///
    /// Defaults to `false` if not set.
    pub fn extrapolate(mut self, extrapolate: bool) -> Self {
        self.0.extrapolate = extrapolate;
        self
    }

    /// Enables the curvature energy term.
    ///
    /// Defaults to `true` if not set.
    pub fn min_energy(mut self, min_energy: bool) -> Self {
        self.0.min_energy = min_energy;
        self
    }

    /// Set the exponent `p` of the approximation error. Values other than `2`
    /// trigger the Newton iterations.
    /// Defaults to `4` if not set.
    pub fn approx_norm(mut self, approx_norm: f64) -> Self {
        self.0.approx_norm = approx_norm;
        self
    }

    /// Applies the Hessians without assembling them. Requires an iterative
    /// solver.
    /// Defaults to `false` if not set.
    pub fn use_mtx_free(mut self, use_mtx_free: bool) -> Self {
        self.0.use_mtx_free = use_mtx_free;
        self
    }

    /// Set the linear solver.
    ///
    /// Defaults to [`SolverKind::Direct`] if not set.
    pub fn solver(mut self, solver: SolverKind) -> Self {
        self.0.solver = solver;
        self
    }

    /// Set the relative residual targeted by iterative solvers.
    ///
    /// Defaults to `1e-12` if not set.
    pub fn solver_tolerance(mut self, solver_tolerance: f64) -> Self {
        self.0.solver_tolerance = solver_tolerance;
        self
    }

    /// Set the maximum number of Newton iterations.
    ///
    /// Defaults to `10` if not set.
    pub fn max_nln_iter(mut self, max_nln_iter: usize) -> Self {
        self.0.max_nln_iter = max_nln_iter;
        self
    }

    /// Set the line search of the Newton iterations.
    ///
    /// Defaults to [`LineSearchKind::Backtracking`] if not set.
    pub fn line_search(mut self, line_search: LineSearchKind) -> Self {
        self.0.line_search = line_search;
        self
    }

    /// Set the coarsening factors of the multigrid levels, finest first.
    ///
    /// Defaults to no coarsening if not set.
    pub fn mg_factors(mut self, mg_factors: Vec<usize>) -> Self {
        self.0.mg_factors = mg_factors;
        self
    }

    /// Enables storing and reusing fitted solutions through the cache.
    ///
    /// Defaults to `false` if not set.
    pub fn save_solution(mut self, save_solution: bool) -> Self {
        self.0.save_solution = save_solution;
        self
    }

    /// Set the deepest nesting level of timing scopes that gets reported.
    ///
    /// Defaults to `100` if not set.
    pub fn max_print_depth(mut self, max_print_depth: usize) -> Self {
        self.0.max_print_depth = max_print_depth;
        self
    }

    /// Set the B-spline order (polynomial degree plus one), one value for all
    /// dimensions or one per dimension.
    /// Defaults to `[3]` if not set.
    pub fn order(mut self, order: Vec<usize>) -> Self {
        self.0.order = order;
        self
    }

    /// Set the number of control points, one value for all dimensions or one
    /// per dimension.
    /// Defaults to `[15]` if not set.
    pub fn num_ctrl_pts(mut self, num_ctrl_pts: Vec<usize>) -> Self {
        self.0.num_ctrl_pts = num_ctrl_pts;
        self
    }

    /// Set the name under which solutions are cached.
    ///
    /// Defaults to `"RMTB"` if not set.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.0.name = name.into();
        self
    }
}

fn check_per_dim_len(option: &'static str, len: usize, nx: usize) -> Result<()> {
    if len == 1 || len == nx {
        Ok(())
    } else {
        Err(RmtError::configuration(
            option,
            format!("expected 1 or {} values, found {}", nx, len),
        ))
    }
}

fn check_non_negative(option: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0. {
        Ok(())
    } else {
        Err(RmtError::configuration(
            option,
            format!("expected a finite non-negative value, found {}", value),
        ))
    }
}

impl ParamGuard for RmtParams {
    type Checked = RmtValidParams;
    type Error = RmtError;

    /// Validate the hyper parameters
    fn check_ref(&self) -> Result<&Self::Checked> {
        let params = &self.0;
        let nx = DomainBounds::new(params.xlimits.clone())?.nx();

        check_per_dim_len("smoothness", params.smoothness.len(), nx)?;
        for &s in &params.smoothness {
            check_non_negative("smoothness", s)?;
        }
        check_non_negative("energy_weight", params.energy_weight)?;
        check_non_negative("reg_dv", params.reg_dv)?;
        check_non_negative("reg_cons", params.reg_cons)?;

        if !(params.approx_norm.is_finite() && params.approx_norm >= 2.) {
            return Err(RmtError::configuration(
                "approx_norm",
                format!("expected a finite value of at least 2, found {}", params.approx_norm),
            ));
        }
        if !(params.solver_tolerance.is_finite() && params.solver_tolerance > 0.) {
            return Err(RmtError::configuration(
                "solver_tolerance",
                format!("expected a positive value, found {}", params.solver_tolerance),
            ));
        }
        if params.use_mtx_free && params.solver == SolverKind::Direct {
            return Err(RmtError::configuration(
                "use_mtx_free",
                "the direct solver needs assembled matrices",
            ));
        }
        if let Some(&factor) = params.mg_factors.iter().find(|&&f| f < 2) {
            return Err(RmtError::configuration(
                "mg_factors",
                format!("coarsening factors must be at least 2, found {}", factor),
            ));
        }

        check_per_dim_len("order", params.order.len(), nx)?;
        check_per_dim_len("num_ctrl_pts", params.num_ctrl_pts.len(), nx)?;
        let orders = broadcast(&params.order, nx);
        let num_ctrl_pts = broadcast(&params.num_ctrl_pts, nx);
        for (dim, (&order, &num_ctrl)) in orders.iter().zip(&num_ctrl_pts).enumerate() {
            if order < 2 {
                return Err(RmtError::configuration(
                    "order",
                    format!("order {} of dimension {} is below 2", order, dim),
                ));
            }
            if num_ctrl < order {
                return Err(RmtError::configuration(
                    "num_ctrl_pts",
                    format!(
                        "{} control points in dimension {} are fewer than the order {}",
                        num_ctrl, dim, order
                    ),
                ));
            }
        }

        if params.name.is_empty() {
            return Err(RmtError::configuration("name", "the name must not be empty"));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
