use crate::datasets::TrainingSet;
use crate::traits::Fit;
use std::error::Error;

/// A set of hyperparameters whose values have not been checked for validity. A reference to the
/// checked hyperparameters can only be obtained after checking has completed. If the `Fit` trait
/// has been implemented on the checked hyperparameters, it is also implemented on the unchecked
/// hyperparameters with the checking step done automatically.
///
/// The hyperparameter validation done in `check_ref()` and `check()` should be identical.
pub trait ParamGuard {
    /// The checked hyperparameters
    type Checked;
    /// Error type resulting from failed hyperparameter checking
    type Error: Error;

    /// Checks the hyperparameters and returns a reference to the checked hyperparameters if
    /// successful
    fn check_ref(&self) -> Result<&Self::Checked, Self::Error>;

    /// Checks the hyperparameters and returns the checked hyperparameters if successful
    fn check(self) -> Result<Self::Checked, Self::Error>;

    /// Calls `check()` and unwraps the result
    fn check_unwrap(self) -> Self::Checked
    where
        Self: Sized,
    {
        self.check().unwrap()
    }
}

/// Performs checking step and calls `fit` on the checked hyperparameters. If checking failed, the
/// checking error is converted to the original error type of `Fit` and returned.
impl<E, P: ParamGuard> Fit<E> for P
where
    P::Checked: Fit<E>,
    E: Error + From<P::Error>,
{
    type Object = <<P as ParamGuard>::Checked as Fit<E>>::Object;

    fn fit(&self, training: &TrainingSet) -> Result<Self::Object, E> {
        let checked = self.check_ref()?;
        checked.fit(training)
    }
}
