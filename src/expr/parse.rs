//! Expression grammar.
//!
//! Textual form accepted by [`Expr::parse`]: numbers, symbols, `+ - * / ^`,
//! unary minus, single-argument elementary functions and parentheses.
//! `+ - * /` are left-associative, `^` is right-associative.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::recognize,
    multi::many0,
    number::complete::double,
    sequence::{pair, preceded},
    IResult, Parser,
};

use super::{BinaryOp, Expr, ExprError, MathFn, UnaryOp};

impl Expr {
    /// Parse an expression from a string.
    pub fn parse(input: &str) -> Result<Expr, ExprError> {
        match expr_parser(input.trim()) {
            Ok((remainder, expr)) => {
                // Make sure the entire input was consumed
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExprError::Parse {
                        message: format!("Unexpected trailing characters: '{}'", remainder),
                    })
                }
            }
            Err(e) => Err(ExprError::Parse {
                message: format!("{:?}", e),
            }),
        }
    }
}

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

/// Parse an identifier (symbol or function name)
fn identifier(input: &str) -> IResult<&str, String> {
    let mut parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));

    let (input, matched) = parser.parse(input)?;
    Ok((input, matched.to_string()))
}

/// Parse a function application, e.g. `exp(x)`.
fn function_call(input: &str) -> IResult<&str, Expr> {
    let (after_name, name) = identifier(input)?;
    let (after_name, _) = ws(after_name)?;
    let (after_paren, _) = char::<&str, nom::error::Error<&str>>('(').parse(after_name)?;
    let (after_arg, arg) = expr_parser(after_paren)?;
    let (after_arg, _) = ws(after_arg)?;
    let (rest, _) = char::<&str, nom::error::Error<&str>>(')').parse(after_arg)?;

    match MathFn::from_name(&name) {
        Some(func) => Ok((rest, Expr::Function(func, Box::new(arg)))),
        // An unknown name followed by parentheses is a call to an undefined
        // function; abort the parse instead of re-reading it as a symbol.
        None => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

/// Parse a number
fn number(input: &str) -> IResult<&str, Expr> {
    let (input, num) = double(input)?;
    Ok((input, Expr::Number(num)))
}

/// Parse a symbol reference
fn symbol(input: &str) -> IResult<&str, Expr> {
    let (input, name) = identifier(input)?;
    Ok((input, Expr::Symbol(name)))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> IResult<&str, Expr> {
    let (input, _) = char::<&str, nom::error::Error<&str>>('(').parse(input)?;
    let (input, expr) = expr_parser(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = char::<&str, nom::error::Error<&str>>(')').parse(input)?;
    Ok((input, expr))
}

/// Parse a primary expression (number, function call, symbol, or parens)
fn primary(input: &str) -> IResult<&str, Expr> {
    if let Ok(result) = number(input) {
        return Ok(result);
    }

    match function_call(input) {
        Ok(result) => return Ok(result),
        Err(nom::Err::Failure(e)) => return Err(nom::Err::Failure(e)),
        Err(_) => {}
    }

    if let Ok(result) = symbol(input) {
        return Ok(result);
    }

    parens(input)
}

/// Parse a unary expression (-expr)
fn unary(input: &str) -> IResult<&str, Expr> {
    let (input, _) = ws(input)?;

    let mut neg_parser = preceded(char('-'), unary);
    match neg_parser.parse(input) {
        Ok((remaining, expr)) => Ok((remaining, Expr::Unary(UnaryOp::Neg, Box::new(expr)))),
        Err(nom::Err::Failure(e)) => Err(nom::Err::Failure(e)),
        Err(_) => primary(input),
    }
}

/// Parse a power expression (expr ^ expr), right-associative
fn power(input: &str) -> IResult<&str, Expr> {
    let (input, base) = unary(input)?;
    let (after_ws, _) = ws(input)?;

    match char::<&str, nom::error::Error<&str>>('^').parse(after_ws) {
        Ok((after_op, _)) => {
            let (remaining, exponent) = power(after_op)?;
            Ok((
                remaining,
                Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(_) => Ok((input, base)),
    }
}

/// Parse a multiplicative expression (expr * expr, expr / expr)
fn term(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut acc) = power(input)?;

    loop {
        let (after_ws, _) = ws(input)?;

        let next = if let Ok((rest, _)) =
            char::<&str, nom::error::Error<&str>>('*').parse(after_ws)
        {
            Some((rest, BinaryOp::Mul))
        } else if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>('/').parse(after_ws) {
            Some((rest, BinaryOp::Div))
        } else {
            None
        };

        match next {
            Some((rest, op)) => {
                let (rest, rhs) = power(rest)?;
                acc = Expr::Binary(op, Box::new(acc), Box::new(rhs));
                input = rest;
            }
            None => return Ok((input, acc)),
        }
    }
}

/// Parse an additive expression (expr + expr, expr - expr)
fn expr_parser(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut acc) = term(input)?;

    loop {
        let (after_ws, _) = ws(input)?;

        let next = if let Ok((rest, _)) =
            char::<&str, nom::error::Error<&str>>('+').parse(after_ws)
        {
            Some((rest, BinaryOp::Add))
        } else if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>('-').parse(after_ws) {
            Some((rest, BinaryOp::Sub))
        } else {
            None
        };

        match next {
            Some((rest, op)) => {
                let (rest, rhs) = term(rest)?;
                acc = Expr::Binary(op, Box::new(acc), Box::new(rhs));
                input = rest;
            }
            None => return Ok((input, acc)),
        }
    }
}
