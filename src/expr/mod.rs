//! Symbolic expression engine.
//!
//! This module provides the expression capability the estimator is built on:
//! an immutable AST over symbols, constants and elementary functions, with
//! parsing ([`Expr::parse`]), substitution, symbolic differentiation
//! ([`Expr::diff`]), simplification, checked evaluation and compilation to
//! numeric closures ([`Expr::compile`]).
//!
//! Expressions are never mutated in place; every transformation returns a
//! new `Expr`, so a residual and its derived forms can coexist freely.

mod calculus;
mod compile;
mod parse;

pub use compile::CompiledExpr;

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Error that can occur during expression parsing, evaluation or compilation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Failed to parse expression: {message}")]
    Parse { message: String },

    #[error("Undefined symbol: {name}")]
    UndefinedSymbol { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

/// Result type for expression operations.
pub type ExprResult<T> = Result<T, ExprError>;

/// Elementary functions understood by the engine.
///
/// The set is closed so that differentiation is total over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
}

impl MathFn {
    /// The textual name accepted by the parser.
    pub fn name(&self) -> &'static str {
        match self {
            MathFn::Sin => "sin",
            MathFn::Cos => "cos",
            MathFn::Tan => "tan",
            MathFn::Exp => "exp",
            MathFn::Ln => "ln",
            MathFn::Sqrt => "sqrt",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(MathFn::Sin),
            "cos" => Some(MathFn::Cos),
            "tan" => Some(MathFn::Tan),
            "exp" => Some(MathFn::Exp),
            "ln" | "log" => Some(MathFn::Ln),
            "sqrt" => Some(MathFn::Sqrt),
            _ => None,
        }
    }

    pub(crate) fn apply(&self, x: f64) -> f64 {
        match self {
            MathFn::Sin => x.sin(),
            MathFn::Cos => x.cos(),
            MathFn::Tan => x.tan(),
            MathFn::Exp => x.exp(),
            MathFn::Ln => x.ln(),
            MathFn::Sqrt => x.sqrt(),
        }
    }
}

/// Unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// Division (/)
    Div,
    /// Power (^)
    Pow,
}

/// Expression AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant number
    Number(f64),

    /// Symbol reference (an observed variable or a free parameter)
    Symbol(String),

    /// Unary operation
    Unary(UnaryOp, Box<Expr>),

    /// Binary operation
    Binary(BinaryOp, Box<Expr>, Box<Expr>),

    /// Elementary function application
    Function(MathFn, Box<Expr>),
}

impl Expr {
    /// Create a symbol node.
    pub fn symbol(name: &str) -> Self {
        Expr::Symbol(name.to_string())
    }

    /// Create a constant node.
    pub fn number(value: f64) -> Self {
        Expr::Number(value)
    }

    /// Raise this expression to a power.
    pub fn pow(self, exponent: Expr) -> Self {
        Expr::Binary(BinaryOp::Pow, Box::new(self), Box::new(exponent))
    }

    pub fn sin(self) -> Self {
        Expr::Function(MathFn::Sin, Box::new(self))
    }

    pub fn cos(self) -> Self {
        Expr::Function(MathFn::Cos, Box::new(self))
    }

    pub fn tan(self) -> Self {
        Expr::Function(MathFn::Tan, Box::new(self))
    }

    pub fn exp(self) -> Self {
        Expr::Function(MathFn::Exp, Box::new(self))
    }

    pub fn ln(self) -> Self {
        Expr::Function(MathFn::Ln, Box::new(self))
    }

    pub fn sqrt(self) -> Self {
        Expr::Function(MathFn::Sqrt, Box::new(self))
    }

    /// Replace every occurrence of `name` with `replacement`, yielding a new
    /// expression.
    pub fn substitute(&self, name: &str, replacement: &Expr) -> Expr {
        match self {
            Expr::Number(_) => self.clone(),
            Expr::Symbol(s) if s == name => replacement.clone(),
            Expr::Symbol(_) => self.clone(),
            Expr::Unary(op, inner) => {
                Expr::Unary(*op, Box::new(inner.substitute(name, replacement)))
            }
            Expr::Binary(op, left, right) => Expr::Binary(
                *op,
                Box::new(left.substitute(name, replacement)),
                Box::new(right.substitute(name, replacement)),
            ),
            Expr::Function(f, inner) => {
                Expr::Function(*f, Box::new(inner.substitute(name, replacement)))
            }
        }
    }

    /// Replace every occurrence of `name` with a constant.
    pub fn substitute_value(&self, name: &str, value: f64) -> Expr {
        self.substitute(name, &Expr::Number(value))
    }

    /// Evaluate the expression with the given symbol bindings.
    ///
    /// Missing symbols and division by zero are reported as errors; the
    /// compiled path ([`Expr::compile`]) uses plain IEEE semantics instead.
    pub fn eval(&self, bindings: &HashMap<String, f64>) -> ExprResult<f64> {
        match self {
            Expr::Number(n) => Ok(*n),

            Expr::Symbol(name) => {
                bindings
                    .get(name)
                    .copied()
                    .ok_or_else(|| ExprError::UndefinedSymbol {
                        name: name.clone(),
                    })
            }

            Expr::Unary(op, inner) => {
                let value = inner.eval(bindings)?;
                match op {
                    UnaryOp::Neg => Ok(-value),
                }
            }

            Expr::Binary(op, left, right) => {
                let lhs = left.eval(bindings)?;
                let rhs = right.eval(bindings)?;
                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            Err(ExprError::DivisionByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Expr::Function(f, inner) => Ok(f.apply(inner.eval(bindings)?)),
        }
    }

    /// Find all symbol names used in the expression, sorted and deduped.
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Symbol(name) => vars.push(name.clone()),
            Expr::Unary(_, inner) => inner.collect_variables(vars),
            Expr::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Expr::Function(_, inner) => inner.collect_variables(vars),
        }
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::Binary(BinaryOp::Add, Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::Binary(BinaryOp::Sub, Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::Binary(BinaryOp::Mul, Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::Binary(BinaryOp::Div, Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary(UnaryOp::Neg, Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Unary(UnaryOp::Neg, inner) => write!(f, "-({})", inner),
            Expr::Binary(op, left, right) => {
                let sym = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Pow => "^",
                };
                write!(f, "({} {} {})", left, sym, right)
            }
            Expr::Function(func, inner) => write!(f, "{}({})", func.name(), inner),
        }
    }
}
