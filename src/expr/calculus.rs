//! Symbolic differentiation and simplification.

use super::{BinaryOp, Expr, MathFn, UnaryOp};

impl Expr {
    /// Differentiate the expression with respect to `var`, yielding a new
    /// expression.
    ///
    /// The result is structurally faithful to the differentiation rules;
    /// callers that care about size run [`Expr::simplify`] on it.
    pub fn diff(&self, var: &str) -> Expr {
        match self {
            Expr::Number(_) => Expr::Number(0.0),

            Expr::Symbol(name) => {
                if name == var {
                    Expr::Number(1.0)
                } else {
                    Expr::Number(0.0)
                }
            }

            Expr::Unary(UnaryOp::Neg, inner) => -inner.diff(var),

            Expr::Binary(BinaryOp::Add, lhs, rhs) => lhs.diff(var) + rhs.diff(var),

            Expr::Binary(BinaryOp::Sub, lhs, rhs) => lhs.diff(var) - rhs.diff(var),

            Expr::Binary(BinaryOp::Mul, lhs, rhs) => {
                lhs.diff(var) * (**rhs).clone() + (**lhs).clone() * rhs.diff(var)
            }

            Expr::Binary(BinaryOp::Div, lhs, rhs) => {
                (lhs.diff(var) * (**rhs).clone() - (**lhs).clone() * rhs.diff(var))
                    / ((**rhs).clone() * (**rhs).clone())
            }

            Expr::Binary(BinaryOp::Pow, base, exponent) => match &**exponent {
                // Power rule for constant exponents
                Expr::Number(n) => {
                    Expr::Number(*n)
                        * (**base).clone().pow(Expr::Number(n - 1.0))
                        * base.diff(var)
                }
                // General case: d(a^b) = a^b * (b' ln a + b a'/a)
                _ => {
                    (**base).clone().pow((**exponent).clone())
                        * (exponent.diff(var) * (**base).clone().ln()
                            + (**exponent).clone() * base.diff(var) / (**base).clone())
                }
            },

            Expr::Function(MathFn::Sin, inner) => (**inner).clone().cos() * inner.diff(var),

            Expr::Function(MathFn::Cos, inner) => -((**inner).clone().sin() * inner.diff(var)),

            Expr::Function(MathFn::Tan, inner) => {
                inner.diff(var) / ((**inner).clone().cos() * (**inner).clone().cos())
            }

            Expr::Function(MathFn::Exp, inner) => (**inner).clone().exp() * inner.diff(var),

            Expr::Function(MathFn::Ln, inner) => inner.diff(var) / (**inner).clone(),

            Expr::Function(MathFn::Sqrt, inner) => {
                inner.diff(var) / (Expr::Number(2.0) * (**inner).clone().sqrt())
            }
        }
    }

    /// Best-effort simplification: constant folding and elimination of
    /// additive/multiplicative identities. One bottom-up pass; not a
    /// canonical form.
    pub fn simplify(&self) -> Expr {
        match self {
            Expr::Number(_) | Expr::Symbol(_) => self.clone(),

            Expr::Unary(UnaryOp::Neg, inner) => {
                let inner = inner.simplify();
                match inner {
                    Expr::Number(c) => Expr::Number(-c),
                    Expr::Unary(UnaryOp::Neg, e) => *e,
                    _ => Expr::Unary(UnaryOp::Neg, Box::new(inner)),
                }
            }

            Expr::Binary(BinaryOp::Add, lhs, rhs) => {
                let lhs = lhs.simplify();
                let rhs = rhs.simplify();
                match (&lhs, &rhs) {
                    (Expr::Number(a), Expr::Number(b)) => Expr::Number(a + b),
                    (Expr::Number(c), _) if *c == 0.0 => rhs,
                    (_, Expr::Number(c)) if *c == 0.0 => lhs,
                    _ => Expr::Binary(BinaryOp::Add, Box::new(lhs), Box::new(rhs)),
                }
            }

            Expr::Binary(BinaryOp::Sub, lhs, rhs) => {
                let lhs = lhs.simplify();
                let rhs = rhs.simplify();
                match (&lhs, &rhs) {
                    (Expr::Number(a), Expr::Number(b)) => Expr::Number(a - b),
                    (_, Expr::Number(c)) if *c == 0.0 => lhs,
                    (Expr::Number(c), _) if *c == 0.0 => {
                        Expr::Unary(UnaryOp::Neg, Box::new(rhs))
                    }
                    _ => Expr::Binary(BinaryOp::Sub, Box::new(lhs), Box::new(rhs)),
                }
            }

            Expr::Binary(BinaryOp::Mul, lhs, rhs) => {
                let lhs = lhs.simplify();
                let rhs = rhs.simplify();
                match (&lhs, &rhs) {
                    (Expr::Number(a), Expr::Number(b)) => Expr::Number(a * b),
                    (Expr::Number(c), _) | (_, Expr::Number(c)) if *c == 0.0 => Expr::Number(0.0),
                    (Expr::Number(c), _) if *c == 1.0 => rhs,
                    (_, Expr::Number(c)) if *c == 1.0 => lhs,
                    _ => Expr::Binary(BinaryOp::Mul, Box::new(lhs), Box::new(rhs)),
                }
            }

            Expr::Binary(BinaryOp::Div, lhs, rhs) => {
                let lhs = lhs.simplify();
                let rhs = rhs.simplify();
                match (&lhs, &rhs) {
                    (Expr::Number(a), Expr::Number(b)) if *b != 0.0 => Expr::Number(a / b),
                    (Expr::Number(c), _) if *c == 0.0 => Expr::Number(0.0),
                    (_, Expr::Number(c)) if *c == 1.0 => lhs,
                    _ => Expr::Binary(BinaryOp::Div, Box::new(lhs), Box::new(rhs)),
                }
            }

            Expr::Binary(BinaryOp::Pow, base, exponent) => {
                let base = base.simplify();
                let exponent = exponent.simplify();
                match (&base, &exponent) {
                    (Expr::Number(a), Expr::Number(b)) => Expr::Number(a.powf(*b)),
                    (_, Expr::Number(c)) if *c == 0.0 => Expr::Number(1.0),
                    (_, Expr::Number(c)) if *c == 1.0 => base,
                    (Expr::Number(c), _) if *c == 1.0 => Expr::Number(1.0),
                    _ => Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
                }
            }

            Expr::Function(f, inner) => {
                let inner = inner.simplify();
                match inner {
                    Expr::Number(c) => Expr::Number(f.apply(c)),
                    _ => Expr::Function(*f, Box::new(inner)),
                }
            }
        }
    }
}
