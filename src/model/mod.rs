use std::sync::Arc;

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::approximation::ApproxJacobianSet;
use crate::basis::{BSplineAssembler, JacobianAssembler, Sizing};
use crate::cache::{checksum, CacheRecord, SolutionCache};
use crate::datasets::TrainingSet;
use crate::diagnostics::{DiagnosticsSink, LogSink, Printer};
use crate::domain::DomainBounds;
use crate::energy::regularized_hessian;
use crate::error::{Result, RmtError};
use crate::hyperparams::RmtValidParams;
use crate::linalg::{spmm, SolverKind};
use crate::nonlinear::fit_columns;
use crate::traits::Fit;

#[cfg(test)]
mod tests;

/// Fitted state of a surrogate: the `coeff × ny` coefficient matrix and the
/// sizing record it was computed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    coefficients: Array2<f64>,
    num: Sizing,
}

impl Solution {
    pub fn coefficients(&self) -> ArrayView2<f64> {
        self.coefficients.view()
    }

    pub fn num(&self) -> Sizing {
        self.num
    }
}

/// Collaborators of a fit: where diagnostics go and where solutions are
/// cached.
#[derive(Debug, Clone)]
pub struct FitContext {
    pub diagnostics: Arc<dyn DiagnosticsSink>,
    pub cache: Option<Arc<dyn SolutionCache>>,
}

impl Default for FitContext {
    fn default() -> Self {
        FitContext {
            diagnostics: Arc::new(LogSink),
            cache: None,
        }
    }
}

impl FitContext {
    pub fn new() -> Self {
        FitContext::default()
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn SolutionCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl RmtValidParams {
    /// The B-spline assembler described by the configuration.
    pub fn assembler(&self) -> BSplineAssembler {
        BSplineAssembler::new(
            self.domain(),
            &self.order_per_dim(),
            &self.num_ctrl_pts_per_dim(),
        )
    }

    /// This method fits the surrogate to `training`, reporting to and caching
    /// through the collaborators of `context`.
    pub fn fit_with(&self, training: &TrainingSet, context: &FitContext) -> Result<Solution> {
        let printer = Printer::new(Arc::clone(&context.diagnostics), self.max_print_depth());
        let _scope = printer.timed(format!("Training {}", self.name()));

        let nx = training.nx().ok_or(RmtError::EmptyTrainingSet)?;
        if nx != self.nx() {
            return Err(RmtError::DimensionMismatch {
                what: "training input dimension",
                expected: self.nx(),
                found: nx,
            });
        }
        let ny = training.ny().ok_or(RmtError::EmptyTrainingSet)?;

        let assembler = self.assembler();
        let num = assembler.sizing(ny);

        let cache = context.cache.as_ref().filter(|_| self.save_solution());
        let key = cache.map(|_| checksum(self, training));
        if let (Some(cache), Some(key)) = (cache, key) {
            match cache.load(self.name()) {
                Ok(Some(record)) if record.checksum == key && record.num == num => {
                    printer.message(format!("Loaded solution of {} from cache", self.name()));
                    return Ok(Solution {
                        coefficients: record.coefficients,
                        num,
                    });
                }
                Ok(_) => log::debug!("no matching cached solution for {}", self.name()),
                Err(e) => log::warn!("ignoring cached solution: {}", e),
            }
        }

        let hessian = {
            let _scope = printer.timed("Initializing Hessian");
            Arc::new(regularized_hessian(self, &assembler))
        };
        let approx = {
            let _scope = printer.timed("Computing approximation terms");
            ApproxJacobianSet::build(training, &assembler, assembler.domain())?
        };
        let mg_matrices = if self.solver() == SolverKind::Multigrid {
            let _scope = printer.timed("Computing multigrid prolongation matrices");
            assembler.prolongation_matrices(self.mg_factors())
        } else {
            Vec::new()
        };

        let coefficients = fit_columns(self, hessian, &approx, training, &mg_matrices, &printer)?;

        if let (Some(cache), Some(key)) = (cache, key) {
            let record = CacheRecord {
                checksum: key,
                num,
                coefficients: coefficients.clone(),
            };
            if let Err(e) = cache.save(self.name(), &record) {
                log::warn!("cannot cache the solution: {}", e);
            }
        }
        Ok(Solution { coefficients, num })
    }
}

impl Fit<RmtError> for RmtValidParams {
    type Object = Solution;

    fn fit(&self, training: &TrainingSet) -> Result<Self::Object> {
        self.fit_with(training, &FitContext::default())
    }
}

/// A regularized minimal-energy tensor-product surrogate.
///
/// The model starts unfitted; [`RmtSurrogate::fit`] computes its solution
/// and [`RmtSurrogate::evaluate`] predicts values or partial derivatives.
#[derive(Debug, Clone)]
pub struct RmtSurrogate {
    params: RmtValidParams,
    assembler: BSplineAssembler,
    context: FitContext,
    solution: Option<Solution>,
}

impl RmtSurrogate {
    pub fn new(params: RmtValidParams) -> Self {
        RmtSurrogate {
            assembler: params.assembler(),
            params,
            context: FitContext::default(),
            solution: None,
        }
    }

    pub fn with_context(mut self, context: FitContext) -> Self {
        self.context = context;
        self
    }

    pub fn params(&self) -> &RmtValidParams {
        &self.params
    }

    pub fn domain(&self) -> &DomainBounds {
        self.assembler.domain()
    }

    pub fn is_fitted(&self) -> bool {
        self.solution.is_some()
    }

    pub fn solution(&self) -> Option<&Solution> {
        self.solution.as_ref()
    }

    /// This method fits the model, replacing any previous solution. A failed
    /// fit leaves the model unfitted.
    pub fn fit(&mut self, training: &TrainingSet) -> Result<&Solution> {
        self.solution = None;
        let solution = self.params.fit_with(training, &self.context)?;
        Ok(self.solution.insert(solution))
    }

    /// This method evaluates the model at the points `x` (`n × nx`): values
    /// when `kx` is `None`, partial derivatives along dimension `d` when it is
    /// `Some(d)`. Returns an `n × ny` array.
    ///
    /// Points outside the domain are rejected unless extrapolation is
    /// enabled. Extrapolation is linear from the nearest boundary point along
    /// every external dimension.
    pub fn evaluate(&self, x: ArrayView2<f64>, kx: Option<usize>) -> Result<Array2<f64>> {
        let solution = self.solution.as_ref().ok_or(RmtError::NotFitted)?;
        let domain = self.assembler.domain();
        let nx = domain.nx();
        if x.ncols() != nx {
            return Err(RmtError::DimensionMismatch {
                what: "point dimension",
                expected: nx,
                found: x.ncols(),
            });
        }
        if let Some(dim) = kx.filter(|&dim| dim >= nx) {
            return Err(RmtError::DimensionMismatch {
                what: "derivative dimension",
                expected: nx,
                found: dim,
            });
        }
        if !self.params.extrapolate() {
            domain.check_points(x, "query points")?;
        }

        let order = kx.map_or(0, |dim| dim + 1);
        let coefficients = solution.coefficients();
        let mut y = spmm(&self.assembler.compute_jac(order, 0, x), coefficients);
        if !self.params.extrapolate() {
            return Ok(y);
        }

        let dx = domain.external_offsets(x);
        // The extrapolant is linear along its own direction past the
        // boundary: its derivative there is the boundary derivative.
        let corrected: Vec<bool> = match kx {
            Some(dim) => dx.column(dim).iter().map(|&d| d == 0.).collect(),
            None => vec![true; x.nrows()],
        };
        for (ix, offsets) in dx.axis_iter(Axis(1)).enumerate() {
            if offsets.iter().all(|&d| d == 0.) {
                continue;
            }
            let slopes = spmm(&self.assembler.compute_jac(order, ix + 1, x), coefficients);
            for (row, (&d, slope)) in offsets.iter().zip(slopes.rows()).enumerate() {
                if d != 0. && corrected[row] {
                    y.row_mut(row).scaled_add(d, &slope);
                }
            }
        }
        Ok(y)
    }

    pub fn predict_values(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.evaluate(x, None)
    }

    pub fn predict_derivatives(&self, x: ArrayView2<f64>, dim: usize) -> Result<Array2<f64>> {
        self.evaluate(x, Some(dim))
    }
}
