use crate::datasets::TrainingSet;

/// Fit trait
///
/// The fittable trait allows a surrogate configuration to be fitted to a
/// training set (values and derivatives sampled over the domain). More
/// formally, the model estimates the spline coefficients that minimize a
/// regularized p-norm approximation error.
pub trait Fit<E: std::error::Error> {
    type Object;

    fn fit(&self, training: &TrainingSet) -> Result<Self::Object, E>;
}
