//! # mrtfit
//!
//! `mrtfit` estimates unknown parameters of a user-supplied nonlinear model
//! relating an independent variable X to a dependent variable Y from noisy
//! samples of both, using a minimum-residual-transformation ("MRT")
//! estimator that accounts for measurement error in both variables.
//!
//! The library provides:
//! - A symbolic expression engine (parsing, substitution, differentiation,
//!   compilation to numeric closures) the estimator is built on
//! - A grouped-average seeder implementing the method of averages
//! - The MRT parameter search itself, which derives a weighted objective
//!   from the residual expression and solves its stationarity system
//!
//! ## Basic Usage
//!
//! ```
//! use mrtfit::{search_mrt, Expr};
//! use ndarray::Array1;
//! use std::collections::HashMap;
//!
//! // Fit y = k*x to exact data; the residual is zero at a perfect fit.
//! let delta = Expr::parse("y - k*x").unwrap();
//! let x = Array1::linspace(1.0, 20.0, 20);
//! let y = x.mapv(|v| 2.0 * v);
//!
//! let values: HashMap<String, Array1<f64>> =
//!     [("x".to_string(), x), ("y".to_string(), y)].into_iter().collect();
//! let err_stds: HashMap<String, f64> =
//!     [("x".to_string(), 0.0), ("y".to_string(), 0.0)].into_iter().collect();
//!
//! let estimate = search_mrt(&delta, &["k"], &values, &err_stds).unwrap();
//! assert!((estimate.primary(0) - 2.0).abs() < 1e-8);
//! ```

pub mod error;
pub mod expr;
pub mod mrt;
pub mod seed;
pub mod solver;
pub mod synth;

// Re-exports for convenience
pub use error::{MrtError, Result};
pub use expr::Expr;
pub use mrt::{search_mrt, MrtEstimate};
pub use seed::base_values_avg;
pub use solver::NewtonSolver;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
