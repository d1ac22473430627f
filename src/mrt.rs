//! The MRT estimator.
//!
//! `search_mrt` turns a symbolic residual (delta) expression, an ordered set
//! of free parameters, observed sample arrays and per-variable error
//! standard deviations into numeric parameter estimates. The pipeline:
//!
//! 1. seed an initial guess by the method of averages (anchor points from
//!    the Grouped-Average Seeder, residual forced to zero at each anchor);
//! 2. form the weighted sum-of-squared-residuals objective, with per-sample
//!    variance from first-order error propagation over every observed
//!    variable;
//! 3. differentiate the objective symbolically with respect to each
//!    parameter and solve the stationarity system numerically, multistarted
//!    around the seed; the root nearest the seed is the primary estimate.

use std::collections::{HashMap, HashSet};

use nalgebra::{DMatrix, DVector};
use ndarray::Array1;

use crate::error::{MrtError, Result};
use crate::expr::{CompiledExpr, Expr, ExprError};
use crate::seed::grouped_averages;
use crate::solver::NewtonSolver;

/// Roots of two numerically-found parameter vectors close enough to count
/// as the same stationary point.
const ROOT_MERGE_TOLERANCE: f64 = 1e-6;

/// Result of an MRT search: per parameter, an ordered sequence of real
/// roots of the stationarity system, the one nearest the method-of-averages
/// seed first.
#[derive(Debug, Clone)]
pub struct MrtEstimate {
    parameters: Vec<String>,
    /// roots[j] are the candidate values for parameters[j]; index 0 is the
    /// primary estimate. Every parameter has the same number of roots (one
    /// entry per stationary point found).
    roots: Vec<Vec<f64>>,
    seed: Vec<f64>,
}

impl MrtEstimate {
    /// Parameter names, in the order they were passed to [`search_mrt`].
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// All real roots found for the parameter at position `index`, primary
    /// first.
    pub fn roots(&self, index: usize) -> &[f64] {
        &self.roots[index]
    }

    /// The primary estimate (root nearest the seed) for the parameter at
    /// position `index`.
    pub fn primary(&self, index: usize) -> f64 {
        self.roots[index][0]
    }

    /// The method-of-averages initial guess the root selection was anchored
    /// to.
    pub fn seed(&self) -> &[f64] {
        &self.seed
    }
}

/// Estimate the free parameters of `delta` = 0 from noisy samples.
///
/// # Arguments
///
/// * `delta` - residual expression in the observed-variable symbols and the
///   free-parameter symbols, conventionally `y - model(x; parameters)`
/// * `parameters` - ordered, distinct free-parameter symbols (k ≥ 1), each
///   of which must appear in `delta`
/// * `values` - observed sample array for every non-parameter symbol of
///   `delta`, all of equal length N ≥ k
/// * `err_stds` - assumed error standard deviation (≥ 0) for every such
///   symbol; 0 means the variable is treated as exact
///
/// The anchor points for the initial guess come from sorting the samples by
/// the lexicographically first observed symbol and averaging per group, so
/// name the independent variable to sort before the dependent one (the
/// conventional `x`/`y` pair already does).
///
/// # Errors
///
/// * [`MrtError::MissingBinding`] - a residual symbol has no entry in
///   `values` or `err_stds`
/// * [`MrtError::ShapeMismatch`] - unequal sample lengths, or N < k
/// * [`MrtError::SeedUnsolvable`] - the anchor-point system has no solution
/// * [`MrtError::NoRealSolution`] - the stationarity system has no real root
pub fn search_mrt(
    delta: &Expr,
    parameters: &[&str],
    values: &HashMap<String, Array1<f64>>,
    err_stds: &HashMap<String, f64>,
) -> Result<MrtEstimate> {
    let k = parameters.len();
    if k == 0 {
        return Err(MrtError::InvalidInput(
            "at least one free parameter is required".to_string(),
        ));
    }

    let unique: HashSet<&str> = parameters.iter().copied().collect();
    if unique.len() != k {
        return Err(MrtError::InvalidInput(
            "free parameters must be distinct".to_string(),
        ));
    }

    let delta_vars = delta.variables();
    for parameter in parameters {
        if !delta_vars.iter().any(|v| v == parameter) {
            return Err(MrtError::InvalidInput(format!(
                "parameter '{}' does not appear in the residual expression",
                parameter
            )));
        }
    }

    // Everything in the residual that is not a free parameter is observed
    // data and must be fully bound.
    let observed: Vec<String> = delta_vars
        .into_iter()
        .filter(|v| !unique.contains(v.as_str()))
        .collect();
    if observed.is_empty() {
        return Err(MrtError::InvalidInput(
            "the residual expression references no observed variables".to_string(),
        ));
    }

    for variable in &observed {
        if !values.contains_key(variable) {
            return Err(MrtError::MissingBinding(variable.clone()));
        }
        let std = *err_stds
            .get(variable)
            .ok_or_else(|| MrtError::MissingBinding(variable.clone()))?;
        if !std.is_finite() || std < 0.0 {
            return Err(MrtError::InvalidInput(format!(
                "error std for '{}' must be finite and non-negative, got {}",
                variable, std
            )));
        }
    }

    let n = values[&observed[0]].len();
    for variable in &observed {
        let len = values[variable].len();
        if len != n {
            return Err(MrtError::ShapeMismatch(format!(
                "sample arrays must have equal length: '{}' has {}, '{}' has {}",
                observed[0], n, variable, len
            )));
        }
    }
    if n < k {
        return Err(MrtError::ShapeMismatch(format!(
            "{} parameters require at least {} samples, got {}",
            k, k, n
        )));
    }

    let param_names: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();

    // Step 1: method-of-averages seed.
    let columns: Vec<(&str, &Array1<f64>)> = observed
        .iter()
        .map(|v| (v.as_str(), &values[v]))
        .collect();
    let anchors = grouped_averages(&columns, k);

    let mut anchor_eqs = Vec::with_capacity(k);
    for i in 0..k {
        let mut equation = delta.clone();
        for variable in &observed {
            equation = equation.substitute_value(variable, anchors[variable][i]);
        }
        anchor_eqs.push(equation.simplify());
    }
    let seed = solve_anchor_system(&anchor_eqs, &param_names)?;

    // Step 2: weighted per-sample objective term. The effective variance is
    // the first-order propagation of every observed variable's error std;
    // zero-std variables contribute nothing, and when every std is zero the
    // weight degrades to one so noise-free data stays well-defined.
    let mut weight: Option<Expr> = None;
    for variable in &observed {
        let std = err_stds[variable];
        if std > 0.0 {
            let sensitivity = delta.diff(variable).simplify();
            let term = Expr::number(std * std) * (sensitivity.clone() * sensitivity);
            weight = Some(match weight {
                Some(acc) => acc + term,
                None => term,
            });
        }
    }
    let squared = delta.clone() * delta.clone();
    let term = match weight {
        Some(variance) => squared / variance,
        None => squared,
    }
    .simplify();

    // Step 3: stationarity system. Differentiate the generic per-sample
    // term once (and once more for the Hessian), then sum numerically over
    // the samples instead of carrying N symbolic data points around.
    let all_vars: Vec<String> = observed
        .iter()
        .cloned()
        .chain(param_names.iter().cloned())
        .collect();

    let grad_exprs: Vec<Expr> = param_names
        .iter()
        .map(|p| term.diff(p).simplify())
        .collect();
    let grad_fns: Vec<CompiledExpr> = grad_exprs
        .iter()
        .map(|e| e.compile(&all_vars))
        .collect::<std::result::Result<_, ExprError>>()?;
    let hess_fns: Vec<Vec<CompiledExpr>> = grad_exprs
        .iter()
        .map(|g| {
            param_names
                .iter()
                .map(|p| g.diff(p).simplify().compile(&all_vars))
                .collect::<std::result::Result<_, ExprError>>()
        })
        .collect::<std::result::Result<_, ExprError>>()?;

    let data: Vec<&Array1<f64>> = observed.iter().map(|v| &values[v]).collect();
    let m = observed.len();

    let gradient = |p: &DVector<f64>| -> Result<DVector<f64>> {
        let mut args = vec![0.0; m + k];
        args[m..].copy_from_slice(p.as_slice());
        let mut g = DVector::zeros(k);
        for i in 0..n {
            for (slot, column) in args[..m].iter_mut().zip(&data) {
                *slot = column[i];
            }
            for (j, f) in grad_fns.iter().enumerate() {
                g[j] += f.call(&args);
            }
        }
        Ok(g)
    };

    let hessian = |p: &DVector<f64>| -> Result<DMatrix<f64>> {
        let mut args = vec![0.0; m + k];
        args[m..].copy_from_slice(p.as_slice());
        let mut h = DMatrix::zeros(k, k);
        for i in 0..n {
            for (slot, column) in args[..m].iter_mut().zip(&data) {
                *slot = column[i];
            }
            for (row, fns) in hess_fns.iter().enumerate() {
                for (col, f) in fns.iter().enumerate() {
                    h[(row, col)] += f.call(&args);
                }
            }
        }
        Ok(h)
    };

    let solver = NewtonSolver::new();
    let mut stationary: Vec<DVector<f64>> = Vec::new();
    for start in stationarity_starts(&seed) {
        if let Ok(root) = solver.solve(&gradient, &hessian, &start) {
            if root.iter().all(|v| v.is_finite())
                && !stationary.iter().any(|r| roots_merge(r, &root))
            {
                stationary.push(root);
            }
        }
    }
    if stationary.is_empty() {
        return Err(MrtError::NoRealSolution(
            "no stationary point of the weighted objective was found".to_string(),
        ));
    }

    // Primary root at index 0: nearest the method-of-averages seed.
    stationary.sort_by(|a, b| (a - &seed).norm().total_cmp(&(b - &seed).norm()));

    let roots = (0..k)
        .map(|j| stationary.iter().map(|r| r[j]).collect())
        .collect();

    Ok(MrtEstimate {
        parameters: param_names,
        roots,
        seed: seed.iter().copied().collect(),
    })
}

/// Solve the k exact anchor equations for the initial guess.
fn solve_anchor_system(equations: &[Expr], params: &[String]) -> Result<DVector<f64>> {
    let k = params.len();

    let residual_fns: Vec<CompiledExpr> = equations
        .iter()
        .map(|e| e.compile(params))
        .collect::<std::result::Result<_, ExprError>>()?;
    let jacobian_fns: Vec<Vec<CompiledExpr>> = equations
        .iter()
        .map(|e| {
            params
                .iter()
                .map(|p| e.diff(p).simplify().compile(params))
                .collect::<std::result::Result<_, ExprError>>()
        })
        .collect::<std::result::Result<_, ExprError>>()?;

    let residual = |x: &DVector<f64>| -> Result<DVector<f64>> {
        let args = x.as_slice();
        Ok(DVector::from_iterator(
            k,
            residual_fns.iter().map(|f| f.call(args)),
        ))
    };
    let jacobian = |x: &DVector<f64>| -> Result<DMatrix<f64>> {
        let args = x.as_slice();
        Ok(DMatrix::from_fn(k, k, |i, j| jacobian_fns[i][j].call(args)))
    };

    let solver = NewtonSolver::new();
    for start in anchor_starts(k) {
        if let Ok(root) = solver.solve(&residual, &jacobian, &start) {
            if root.iter().all(|v| v.is_finite()) {
                return Ok(root);
            }
        }
    }

    Err(MrtError::SeedUnsolvable(
        "the anchor-point equations are singular or admit no solution".to_string(),
    ))
}

/// Generic starting points for the anchor solve; the anchor system is small
/// and well-conditioned for sorted-X bucketing, so a short ladder suffices.
fn anchor_starts(k: usize) -> Vec<DVector<f64>> {
    [0.0, 1.0, -1.0, 0.5, 2.0]
        .iter()
        .map(|&c| DVector::from_element(k, c))
        .collect()
}

/// Seed-centered starting family for the stationarity solve.
fn stationarity_starts(seed: &DVector<f64>) -> Vec<DVector<f64>> {
    vec![
        seed.clone(),
        seed * 0.5,
        seed * 2.0,
        -seed,
        DVector::zeros(seed.len()),
    ]
}

fn roots_merge(a: &DVector<f64>, b: &DVector<f64>) -> bool {
    (a - b).norm() <= ROOT_MERGE_TOLERANCE * (1.0 + a.norm())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn bindings(entries: &[(&str, Array1<f64>)]) -> HashMap<String, Array1<f64>> {
        entries
            .iter()
            .map(|(name, array)| (name.to_string(), array.clone()))
            .collect()
    }

    fn stds(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries
            .iter()
            .map(|(name, std)| (name.to_string(), *std))
            .collect()
    }

    #[test]
    fn test_exact_linear_slope() {
        let delta = Expr::parse("y - k*x").unwrap();
        let x = Array1::linspace(1.0, 20.0, 20);
        let y = x.mapv(|v| 2.0 * v);

        let estimate = search_mrt(
            &delta,
            &["k"],
            &bindings(&[("x", x), ("y", y)]),
            &stds(&[("x", 0.0), ("y", 0.0)]),
        )
        .unwrap();

        assert_relative_eq!(estimate.primary(0), 2.0, epsilon = 1e-8);
        // The method-of-averages seed is already exact for noise-free data.
        assert_relative_eq!(estimate.seed()[0], 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_exact_two_parameters() {
        let delta = Expr::parse("y - k*x - b").unwrap();
        let x = Array1::linspace(0.0, 10.0, 12);
        let y = x.mapv(|v| 3.0 * v + 1.5);

        let estimate = search_mrt(
            &delta,
            &["k", "b"],
            &bindings(&[("x", x), ("y", y)]),
            &stds(&[("x", 0.0), ("y", 0.0)]),
        )
        .unwrap();

        assert_eq!(estimate.parameters(), &["k".to_string(), "b".to_string()]);
        assert_relative_eq!(estimate.primary(0), 3.0, epsilon = 1e-8);
        assert_relative_eq!(estimate.primary(1), 1.5, epsilon = 1e-8);
    }

    #[test]
    fn test_missing_value_binding() {
        let delta = Expr::parse("y - k*x").unwrap();
        let y = Array1::linspace(1.0, 20.0, 20);

        let result = search_mrt(
            &delta,
            &["k"],
            &bindings(&[("y", y)]),
            &stds(&[("x", 0.0), ("y", 0.01)]),
        );
        match result {
            Err(MrtError::MissingBinding(name)) => assert_eq!(name, "x"),
            other => panic!("Expected MissingBinding, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_err_std_binding() {
        let delta = Expr::parse("y - k*x").unwrap();
        let x = Array1::linspace(1.0, 20.0, 20);
        let y = x.mapv(|v| 2.0 * v);

        let result = search_mrt(
            &delta,
            &["k"],
            &bindings(&[("x", x), ("y", y)]),
            &stds(&[("y", 0.01)]),
        );
        match result {
            Err(MrtError::MissingBinding(name)) => assert_eq!(name, "x"),
            other => panic!("Expected MissingBinding, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unequal_lengths_rejected() {
        let delta = Expr::parse("y - k*x").unwrap();
        let x = Array1::linspace(1.0, 20.0, 20);
        let y = Array1::linspace(1.0, 19.0, 19);

        let result = search_mrt(
            &delta,
            &["k"],
            &bindings(&[("x", x), ("y", y)]),
            &stds(&[("x", 0.0), ("y", 0.01)]),
        );
        assert!(matches!(result, Err(MrtError::ShapeMismatch(_))));
    }

    #[test]
    fn test_fewer_samples_than_parameters() {
        let delta = Expr::parse("y - k*x - b").unwrap();
        let x = Array1::from_vec(vec![1.0]);
        let y = Array1::from_vec(vec![2.0]);

        let result = search_mrt(
            &delta,
            &["k", "b"],
            &bindings(&[("x", x), ("y", y)]),
            &stds(&[("x", 0.0), ("y", 0.0)]),
        );
        assert!(matches!(result, Err(MrtError::ShapeMismatch(_))));
    }

    #[test]
    fn test_degenerate_anchors_are_seed_unsolvable() {
        // All X equal: the anchor equation loses the slope entirely.
        let delta = Expr::parse("y - k*x").unwrap();
        let x = Array1::from_elem(10, 0.0);
        let y = Array1::linspace(1.0, 10.0, 10);

        let result = search_mrt(
            &delta,
            &["k"],
            &bindings(&[("x", x), ("y", y)]),
            &stds(&[("x", 0.0), ("y", 0.01)]),
        );
        assert!(matches!(result, Err(MrtError::SeedUnsolvable(_))));
    }

    #[test]
    fn test_parameter_absent_from_residual() {
        let delta = Expr::parse("y - x").unwrap();
        let x = Array1::linspace(1.0, 10.0, 10);
        let y = x.clone();

        let result = search_mrt(
            &delta,
            &["k"],
            &bindings(&[("x", x), ("y", y)]),
            &stds(&[("x", 0.0), ("y", 0.01)]),
        );
        assert!(matches!(result, Err(MrtError::InvalidInput(_))));
    }
}
