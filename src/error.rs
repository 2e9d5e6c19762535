use thiserror::Error;

/// Simplified `Result` using [`RmtError`](crate::error::RmtError) as error type
pub type Result<T> = std::result::Result<T, RmtError>;

/// Error variants from hyperparameter construction, model fitting or model
/// evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RmtError {
    /// An option has an invalid value or is inconsistent with another option
    #[error("invalid option `{option}`: {reason}")]
    Configuration { option: &'static str, reason: String },

    /// A point lies outside of the closed domain
    #[error(
        "{context}: point {point} has x[{dim}] = {value}, outside of [{lower}, {upper}]"
    )]
    OutOfDomain {
        context: String,
        point: usize,
        dim: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    /// The linear solver failed (singular or indefinite system)
    #[error("linear solve failed: {0}")]
    LinearSolve(String),

    /// The training set holds no observation
    #[error("the training set is empty")]
    EmptyTrainingSet,

    /// The model was evaluated before being fitted
    #[error("the model must be fitted before being evaluated")]
    NotFitted,

    /// Shapes of points, targets or coefficients are inconsistent
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

impl RmtError {
    pub(crate) fn configuration(option: &'static str, reason: impl Into<String>) -> Self {
        RmtError::Configuration {
            option,
            reason: reason.into(),
        }
    }
}

impl From<sprs::errors::LinalgError> for RmtError {
    fn from(e: sprs::errors::LinalgError) -> Self {
        RmtError::LinearSolve(e.to_string())
    }
}
