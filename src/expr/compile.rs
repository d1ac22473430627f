//! Compilation of expressions to numeric closures.
//!
//! The compiled path trades the checked semantics of [`Expr::eval`] for
//! speed: arguments are positional, and arithmetic follows plain IEEE rules
//! (division by zero yields an infinity, domain errors yield NaN). Unbound
//! symbols are rejected once, at compile time.

use ndarray::Array1;

use super::{BinaryOp, Expr, ExprError, ExprResult, UnaryOp};

type NumericFn = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// An expression compiled against a fixed symbol ordering.
pub struct CompiledExpr {
    arity: usize,
    func: NumericFn,
}

impl CompiledExpr {
    /// Number of arguments the closure expects.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Evaluate at one argument tuple, in the symbol order given to
    /// [`Expr::compile`].
    pub fn call(&self, args: &[f64]) -> f64 {
        debug_assert_eq!(args.len(), self.arity);
        (self.func)(args)
    }

    /// Evaluate over parallel argument columns, one column per symbol.
    pub fn map_columns(&self, columns: &[&Array1<f64>]) -> Array1<f64> {
        assert_eq!(columns.len(), self.arity, "column count must match arity");
        let n = columns.first().map_or(0, |c| c.len());
        assert!(
            columns.iter().all(|c| c.len() == n),
            "columns must have equal length"
        );

        let mut args = vec![0.0; self.arity];
        Array1::from_iter((0..n).map(|i| {
            for (slot, column) in args.iter_mut().zip(columns) {
                *slot = column[i];
            }
            (self.func)(&args)
        }))
    }
}

impl Expr {
    /// Compile the expression to a numeric closure over the given symbol
    /// ordering.
    pub fn compile(&self, vars: &[String]) -> ExprResult<CompiledExpr> {
        Ok(CompiledExpr {
            arity: vars.len(),
            func: self.compile_node(vars)?,
        })
    }

    /// 1-D convenience: compile against a single symbol.
    pub fn lambdify1(&self, var: &str) -> ExprResult<impl Fn(f64) -> f64> {
        let compiled = self.compile(&[var.to_string()])?;
        Ok(move |x: f64| compiled.call(&[x]))
    }

    fn compile_node(&self, vars: &[String]) -> ExprResult<NumericFn> {
        match self {
            Expr::Number(n) => {
                let n = *n;
                Ok(Box::new(move |_| n))
            }

            Expr::Symbol(name) => {
                let index = vars.iter().position(|v| v == name).ok_or_else(|| {
                    ExprError::UndefinedSymbol { name: name.clone() }
                })?;
                Ok(Box::new(move |args| args[index]))
            }

            Expr::Unary(UnaryOp::Neg, inner) => {
                let inner = inner.compile_node(vars)?;
                Ok(Box::new(move |args| -inner(args)))
            }

            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.compile_node(vars)?;
                let rhs = rhs.compile_node(vars)?;
                let op = *op;
                Ok(Box::new(move |args| {
                    let a = lhs(args);
                    let b = rhs(args);
                    match op {
                        BinaryOp::Add => a + b,
                        BinaryOp::Sub => a - b,
                        BinaryOp::Mul => a * b,
                        BinaryOp::Div => a / b,
                        BinaryOp::Pow => a.powf(b),
                    }
                }))
            }

            Expr::Function(f, inner) => {
                let inner = inner.compile_node(vars)?;
                let f = *f;
                Ok(Box::new(move |args| f.apply(inner(args))))
            }
        }
    }
}
