use thiserror::Error;

use crate::expr::ExprError;

/// Error types for the mrtfit library.
#[derive(Error, Debug)]
pub enum MrtError {
    /// Sample arrays disagree in length, or there are fewer samples than parameters.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A symbol used in the residual expression has no entry in the value
    /// or error-std bindings.
    #[error("Missing binding for symbol '{0}'")]
    MissingBinding(String),

    /// The exact anchor-point system from the method of averages could not
    /// be solved (degenerate anchors, singular system, no convergence).
    #[error("Seed system unsolvable: {0}")]
    SeedUnsolvable(String),

    /// The stationarity system of the weighted objective admits no real root.
    #[error("No real solution to the stationarity system: {0}")]
    NoRealSolution(String),

    /// A singular Jacobian was encountered during a Newton step.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// The iterative solver failed to converge.
    #[error("Failed to converge: {0}")]
    ConvergenceFailure(String),

    /// Invalid input that is not a shape or binding problem.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error raised by the expression engine.
    #[error("Expression error: {0}")]
    Expression(#[from] ExprError),
}

/// Result type alias for mrtfit operations.
pub type Result<T> = std::result::Result<T, MrtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MrtError::ShapeMismatch("expected 20 samples, got 19".to_string());
        assert!(format!("{}", err).contains("expected 20 samples, got 19"));

        let err = MrtError::MissingBinding("z".to_string());
        assert!(format!("{}", err).contains("'z'"));
    }

    #[test]
    fn test_expression_error_conversion() {
        let expr_err = ExprError::UndefinedSymbol {
            name: "q".to_string(),
        };
        let err: MrtError = expr_err.into();
        match err {
            MrtError::Expression(ExprError::UndefinedSymbol { name }) => assert_eq!(name, "q"),
            _ => panic!("Expected Expression variant"),
        }
    }
}
