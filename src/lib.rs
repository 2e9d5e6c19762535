//! Regularized minimal-energy tensor-product (RMT) surrogate models.
//!
//! A surrogate is described by [`RmtParams`], fitted to a [`TrainingSet`] of
//! values and partial derivatives, then evaluated with
//! [`RmtSurrogate::evaluate`]. Coefficients of a B-spline tensor-product
//! basis minimize a curvature energy plus a p-norm approximation error;
//! `p = 2` is solved in one sparse linear solve, larger `p` with damped
//! Newton iterations.
//!
//! ```no_run
//! use ndarray::array;
//! use sparsermt::{ParamGuard, RmtParams, RmtSurrogate, TrainingSet};
//!
//! let params = RmtParams::new(array![[0., 1.]]).check().unwrap();
//! let mut training = TrainingSet::new();
//! training
//!     .set_values(array![[0.], [0.5], [1.]], array![[0.], [0.25], [1.]])
//!     .unwrap();
//! let mut model = RmtSurrogate::new(params);
//! model.fit(&training).unwrap();
//! let y = model.predict_values(array![[0.25]].view()).unwrap();
//! ```

pub mod approximation;
pub mod basis;
pub mod cache;
pub mod datasets;
pub mod diagnostics;
pub mod domain;
pub mod energy;
pub mod error;
pub mod helpers;
pub mod hyperparams;
pub mod line_search;
pub mod linalg;
pub mod model;
pub mod nonlinear;
pub mod objective;
pub mod param_guard;
pub mod traits;

pub use datasets::TrainingSet;
pub use error::{Result, RmtError};
pub use hyperparams::{RmtParams, RmtValidParams};
pub use model::{FitContext, RmtSurrogate, Solution};
pub use param_guard::ParamGuard;
pub use traits::Fit;
