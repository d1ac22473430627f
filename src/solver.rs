//! Damped Newton iteration for small square nonlinear systems.
//!
//! Both the anchor-point seed system and the stationarity system of the
//! estimator are k×k systems with symbolically-derived Jacobians; this
//! module is their shared numeric backend.

use nalgebra::{DMatrix, DVector};

use crate::error::{MrtError, Result};

/// Configuration and driver for the Newton iteration.
///
/// Convergence is declared when the residual norm falls below
/// `tolerance * (1 + initial residual norm)`. A full Newton step shrinking
/// below `step_tolerance * (1 + |x|)` before that point is a stall and is
/// reported as a convergence failure.
#[derive(Debug, Clone)]
pub struct NewtonSolver {
    /// Maximum number of iterations. Default: 100
    pub max_iterations: usize,

    /// Residual-norm tolerance, scaled by the starting norm. Default: 1e-10
    pub tolerance: f64,

    /// Relative step-size tolerance. Default: 1e-12
    pub step_tolerance: f64,

    /// Maximum number of step halvings in the line search. Default: 30
    pub max_halvings: usize,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
            step_tolerance: 1e-12,
            max_halvings: 30,
        }
    }
}

impl NewtonSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solve f(x) = 0 from the starting point `x0`.
    ///
    /// `residual` and `jacobian` evaluate f and ∂f/∂x at a point. Returns
    /// the converged iterate, or `SingularMatrix` / `ConvergenceFailure`
    /// when a step cannot be computed or accepted.
    pub fn solve<F, J>(&self, residual: F, jacobian: J, x0: &DVector<f64>) -> Result<DVector<f64>>
    where
        F: Fn(&DVector<f64>) -> Result<DVector<f64>>,
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>>,
    {
        let mut x = x0.clone();
        let mut fx = residual(&x)?;

        if !fx.iter().all(|v| v.is_finite()) {
            return Err(MrtError::ConvergenceFailure(
                "residual is not finite at the starting point".to_string(),
            ));
        }

        let threshold = self.tolerance * (1.0 + fx.norm());

        for _ in 0..self.max_iterations {
            let norm = fx.norm();
            if norm <= threshold {
                return Ok(x);
            }

            let jac = jacobian(&x)?;
            if !jac.iter().all(|v| v.is_finite()) {
                return Err(MrtError::ConvergenceFailure(
                    "Jacobian is not finite".to_string(),
                ));
            }

            let step = jac
                .lu()
                .solve(&(-&fx))
                .ok_or(MrtError::SingularMatrix)?;

            // A vanishing full step means the iterate is at the solver's
            // precision limit for this system. The residual is still above
            // the threshold here (the loop top returns otherwise), so a
            // stalled step is a failure, not a root.
            if step.norm() <= self.step_tolerance * (1.0 + x.norm()) {
                return Err(MrtError::ConvergenceFailure(
                    "step stalled with the residual above tolerance".to_string(),
                ));
            }

            let mut lambda = 1.0;
            let mut accepted = false;
            for _ in 0..self.max_halvings {
                let candidate = &x + &step * lambda;
                let f_candidate = residual(&candidate)?;
                let candidate_norm = f_candidate.norm();
                if candidate_norm.is_finite() && candidate_norm < norm {
                    x = candidate;
                    fx = f_candidate;
                    accepted = true;
                    break;
                }
                lambda *= 0.5;
            }

            if !accepted {
                return Err(MrtError::ConvergenceFailure(
                    "line search could not reduce the residual".to_string(),
                ));
            }
        }

        Err(MrtError::ConvergenceFailure(format!(
            "no convergence within {} iterations",
            self.max_iterations
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_linear_system_single_step() {
        // 2x + y = 5, x - y = 1  =>  x = 2, y = 1
        let residual = |p: &DVector<f64>| {
            Ok(dvector![2.0 * p[0] + p[1] - 5.0, p[0] - p[1] - 1.0])
        };
        let jacobian = |_: &DVector<f64>| Ok(dmatrix![2.0, 1.0; 1.0, -1.0]);

        let solver = NewtonSolver::new();
        let solution = solver.solve(residual, jacobian, &dvector![0.0, 0.0]).unwrap();
        assert_relative_eq!(solution[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(solution[1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_nonlinear_system() {
        // x^2 + y^2 = 4 intersected with y = x: root at (sqrt(2), sqrt(2))
        let residual = |p: &DVector<f64>| {
            Ok(dvector![p[0] * p[0] + p[1] * p[1] - 4.0, p[1] - p[0]])
        };
        let jacobian =
            |p: &DVector<f64>| Ok(dmatrix![2.0 * p[0], 2.0 * p[1]; -1.0, 1.0]);

        let solver = NewtonSolver::new();
        let solution = solver.solve(residual, jacobian, &dvector![1.0, 1.0]).unwrap();
        assert_relative_eq!(solution[0], 2.0_f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(solution[1], 2.0_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_singular_jacobian_reported() {
        let residual = |p: &DVector<f64>| Ok(dvector![p[0] * p[0] - 1.0]);
        // Zero derivative at the starting point
        let jacobian = |_: &DVector<f64>| Ok(dmatrix![0.0]);

        let solver = NewtonSolver::new();
        match solver.solve(residual, jacobian, &dvector![0.0]) {
            Err(MrtError::SingularMatrix) => {}
            other => panic!("Expected SingularMatrix, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_stalled_step_is_not_a_root() {
        // Constant residual with an enormous slope: the Newton step
        // vanishes while the residual stays at 1, which must not be
        // reported as a solution.
        let residual = |_: &DVector<f64>| Ok(dvector![1.0]);
        let jacobian = |_: &DVector<f64>| Ok(dmatrix![1e20]);

        let solver = NewtonSolver::new();
        match solver.solve(residual, jacobian, &dvector![0.0]) {
            Err(MrtError::ConvergenceFailure(_)) => {}
            other => panic!(
                "Expected ConvergenceFailure, got {:?}",
                other.map(|_| ())
            ),
        }
    }

    #[test]
    fn test_starting_at_root() {
        let residual = |p: &DVector<f64>| Ok(dvector![p[0] - 3.0]);
        let jacobian = |_: &DVector<f64>| Ok(dmatrix![1.0]);

        let solver = NewtonSolver::new();
        let solution = solver.solve(residual, jacobian, &dvector![3.0]).unwrap();
        assert_relative_eq!(solution[0], 3.0);
    }
}
